//! LilyPond score rendering.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use super::theory::{instrument_name, Chord, Note, Piece};

const LILY_NAMES: [&str; 12] = [
    "c", "cis", "d", "dis", "e", "f", "fis", "g", "gis", "a", "ais", "b",
];

/// Shortest written value is a 32nd note.
const FINEST_DIVISION: u32 = 32;
const EPSILON: f64 = 1e-9;

/// LilyPond pitch; the unmarked octave is the one starting at C3.
fn pitch(note: &Note) -> String {
    let mut out = LILY_NAMES[usize::from(note.pitch % 12)].to_string();
    let shift = note.octave() - 3;
    let mark = if shift > 0 { '\'' } else { ',' };
    for _ in 0..shift.abs() {
        out.push(mark);
    }
    out
}

/// Split a length in bars into note values (1 = whole, 4 = quarter, ...).
fn durations(mut bars: f64) -> Vec<u32> {
    let mut out = Vec::new();
    let mut value = 1;
    while value <= FINEST_DIVISION && bars > EPSILON {
        let length = 1.0 / f64::from(value);
        if bars + EPSILON >= length {
            out.push(value);
            bars -= length;
        } else {
            value *= 2;
        }
    }
    if out.is_empty() {
        out.push(FINEST_DIVISION);
    }
    out
}

/// `element` written once per note value, tied together.
fn tied(element: &str, bars: f64) -> String {
    durations(bars)
        .iter()
        .map(|d| format!("{element}{d}"))
        .collect::<Vec<_>>()
        .join("~ ")
}

fn rests(bars: f64) -> String {
    durations(bars)
        .iter()
        .map(|d| format!("r{d}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Music expression of one track. Notes sharing an onset become a chord;
/// overlapping groups are cut at the next onset.
fn track_body(track: &Chord, start: f64) -> String {
    let mut groups: Vec<(f64, Vec<&Note>)> = Vec::new();
    let mut timed: Vec<(f64, &Note)> = track.timed().collect();
    timed.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (onset, note) in timed {
        let same_onset = groups
            .last()
            .is_some_and(|(at, _)| (at - onset).abs() < EPSILON);
        if same_onset {
            let last = groups.len() - 1;
            groups[last].1.push(note);
        } else {
            groups.push((onset, vec![note]));
        }
    }

    let mut parts = Vec::new();
    let mut cursor = -start;
    for (i, (onset, notes)) in groups.iter().enumerate() {
        if *onset > cursor + EPSILON {
            parts.push(rests(onset - cursor));
        }
        let mut length = notes.iter().map(|n| n.duration).fold(0.0, f64::max);
        if let Some((next, _)) = groups.get(i + 1) {
            length = length.min(next - onset);
        }
        let element = match notes.as_slice() {
            [single] => pitch(single),
            many => format!(
                "<{}>",
                many.iter().map(|n| pitch(n)).collect::<Vec<_>>().join(" ")
            ),
        };
        parts.push(tied(&element, length));
        cursor = onset + length;
    }
    if parts.is_empty() {
        parts.push("r1".to_string());
    }
    parts.join(" ")
}

fn clef(track: &Chord) -> &'static str {
    let total: u32 = track.notes.iter().map(|n| u32::from(n.pitch)).sum();
    let count = track.notes.len() as u32;
    if count > 0 && total / count < 57 {
        "bass"
    } else {
        "treble"
    }
}

/// Render `piece` as a LilyPond document, one staff per track.
pub fn render(piece: &Piece) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\\version \"2.24.0\"");
    let _ = writeln!(out, "\\header {{ tagline = ##f }}");
    let _ = writeln!(out, "\\score {{");
    let _ = writeln!(out, "  <<");
    for (i, track) in piece.tracks.iter().enumerate() {
        let _ = writeln!(
            out,
            "    \\new Staff \\with {{ instrumentName = \"{}\" }} {{",
            instrument_name(piece.programs[i])
        );
        let _ = writeln!(
            out,
            "      \\clef {} \\time 4/4 \\tempo 4 = {}",
            clef(track),
            piece.bpm.round() as u32
        );
        let _ = writeln!(
            out,
            "      {} \\bar \"|.\"",
            track_body(track, piece.start_times[i])
        );
        let _ = writeln!(out, "    }}");
    }
    let _ = writeln!(out, "  >>");
    let _ = writeln!(out, "  \\layout {{ }}");
    let _ = writeln!(out, "}}");
    out
}

/// Write the rendered score to `path`, creating parent directories as needed.
pub fn write(piece: &Piece, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(piece))
}
