//! Notes, chords and pieces.
//!
//! Durations and onsets are measured in bars of 4/4; a quarter note is 0.25.

use std::fmt;

use super::MusicError;

pub const DEFAULT_OCTAVE: i32 = 4;
pub const DEFAULT_DURATION: f64 = 0.25;
pub const DEFAULT_VOLUME: u8 = 100;
/// General MIDI program 0, acoustic grand piano.
pub const DEFAULT_PROGRAM: u8 = 0;
/// Most notes a single chord or melody may hold.
pub const MAX_NOTES: usize = 1 << 20;

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const GM_FAMILIES: [&str; 16] = [
    "Piano",
    "Chromatic Percussion",
    "Organ",
    "Guitar",
    "Bass",
    "Strings",
    "Ensemble",
    "Brass",
    "Reed",
    "Pipe",
    "Synth Lead",
    "Synth Pad",
    "Synth Effects",
    "Ethnic",
    "Percussive",
    "Sound Effects",
];

/// Parse a note name into a MIDI note number.
///
/// Format: `<letter><optional accidental><optional octave>`, where the octave
/// defaults to 4 and C4 is MIDI 60.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let (base, rest) = split_pitch_class(name)?;
    let octave = if rest.is_empty() {
        DEFAULT_OCTAVE
    } else {
        rest.parse().ok()?
    };
    midi_number(base, octave)
}

/// Split the leading letter and accidental from `name`, returning the pitch
/// class offset and whatever follows.
fn split_pitch_class(name: &str) -> Option<(i32, &str)> {
    let mut chars = name.chars();
    let base = match chars.next()? {
        'C' | 'c' => 0,
        'D' | 'd' => 2,
        'E' | 'e' => 4,
        'F' | 'f' => 5,
        'G' | 'g' => 7,
        'A' | 'a' => 9,
        'B' | 'b' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    if let Some(rest) = rest.strip_prefix('#') {
        Some((base + 1, rest))
    } else if let Some(rest) = rest.strip_prefix('b') {
        Some((base - 1, rest))
    } else {
        Some((base, rest))
    }
}

fn midi_number(pitch_class: i32, octave: i32) -> Option<u8> {
    let midi = (octave + 1) * 12 + pitch_class;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// General MIDI family name of a program number.
pub fn instrument_name(program: u8) -> &'static str {
    GM_FAMILIES[usize::from(program.min(127) / 8)]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// MIDI note number.
    pub pitch: u8,
    pub duration: f64,
    pub volume: u8,
}

impl Note {
    pub fn new(pitch: i64, duration: f64, volume: i64) -> Result<Self, MusicError> {
        let pitch = u8::try_from(pitch)
            .ok()
            .filter(|p| *p <= 127)
            .ok_or_else(|| MusicError::InvalidNote(format!("pitch {pitch} out of range")))?;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(MusicError::InvalidNote(format!(
                "duration {duration} must be positive"
            )));
        }
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| *v <= 127)
            .ok_or_else(|| MusicError::InvalidNote(format!("volume {volume} out of range")))?;
        Ok(Self {
            pitch,
            duration,
            volume,
        })
    }

    pub fn from_name(name: &str) -> Result<Self, MusicError> {
        let pitch = parse_note_name(name)
            .ok_or_else(|| MusicError::InvalidNote(format!("unknown note name '{name}'")))?;
        Ok(Self {
            pitch,
            duration: DEFAULT_DURATION,
            volume: DEFAULT_VOLUME,
        })
    }

    /// A pitch class letter with an explicit octave.
    pub fn from_name_in_octave(name: &str, octave: i64) -> Result<Self, MusicError> {
        let invalid = || MusicError::InvalidNote(format!("unknown note name '{name}'"));
        let (base, rest) = split_pitch_class(name).ok_or_else(invalid)?;
        if !rest.is_empty() {
            return Err(invalid());
        }
        let octave = i32::try_from(octave).map_err(|_| invalid())?;
        let pitch = midi_number(base, octave)
            .ok_or_else(|| MusicError::InvalidNote(format!("'{name}{octave}' out of range")))?;
        Note::new(i64::from(pitch), DEFAULT_DURATION, i64::from(DEFAULT_VOLUME))
    }

    pub fn octave(&self) -> i32 {
        i32::from(self.pitch) / 12 - 1
    }

    /// Pitch class name using sharps.
    pub fn pitch_class(&self) -> &'static str {
        PITCH_NAMES[usize::from(self.pitch % 12)]
    }

    pub fn transpose(&self, semitones: i64) -> Result<Self, MusicError> {
        let pitch = i64::from(self.pitch)
            .checked_add(semitones)
            .ok_or_else(|| MusicError::InvalidNote("transposition overflow".into()))?;
        Note::new(pitch, self.duration, i64::from(self.volume))
    }
}

impl Default for Note {
    /// Middle C quarter note.
    fn default() -> Self {
        Self {
            pitch: 60,
            duration: DEFAULT_DURATION,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

/// Notes with their onsets relative to the start of the chord.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chord {
    pub notes: Vec<Note>,
    pub onsets: Vec<f64>,
}

impl Chord {
    /// All notes sounding together.
    pub fn stacked(notes: Vec<Note>) -> Self {
        let onsets = vec![0.0; notes.len()];
        Self { notes, onsets }
    }

    /// Notes played one after another.
    pub fn sequence(notes: Vec<Note>) -> Self {
        let mut at = 0.0;
        let onsets = notes
            .iter()
            .map(|n| {
                let onset = at;
                at += n.duration;
                onset
            })
            .collect();
        Self { notes, onsets }
    }

    /// Build a chord from a name such as `C`, `Am`, `G7`, `Fmaj7` or `Bbdim`,
    /// rooted in octave 4.
    pub fn from_name(name: &str) -> Result<Self, MusicError> {
        let invalid = || MusicError::InvalidChord(format!("unknown chord name '{name}'"));
        let (base, quality) = split_pitch_class(name).ok_or_else(invalid)?;
        let intervals: &[i64] = match quality {
            "" | "M" | "maj" => &[0, 4, 7],
            "m" | "min" => &[0, 3, 7],
            "7" => &[0, 4, 7, 10],
            "maj7" | "M7" => &[0, 4, 7, 11],
            "m7" => &[0, 3, 7, 10],
            "dim" => &[0, 3, 6],
            "aug" => &[0, 4, 8],
            "sus2" => &[0, 2, 7],
            "sus4" | "sus" => &[0, 5, 7],
            _ => return Err(invalid()),
        };
        let root = midi_number(base, DEFAULT_OCTAVE).ok_or_else(invalid)?;
        let root = Note {
            pitch: root,
            ..Note::default()
        };
        let notes = intervals
            .iter()
            .map(|i| root.transpose(*i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::stacked(notes))
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Length in bars until the last note stops sounding.
    pub fn length(&self) -> f64 {
        self.timed()
            .map(|(onset, note)| onset + note.duration)
            .fold(0.0, f64::max)
    }

    pub fn timed(&self) -> impl Iterator<Item = (f64, &Note)> {
        self.onsets.iter().copied().zip(self.notes.iter())
    }

    pub fn transpose(&self, semitones: i64) -> Result<Self, MusicError> {
        let notes = self
            .notes
            .iter()
            .map(|n| n.transpose(semitones))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            notes,
            onsets: self.onsets.clone(),
        })
    }

    /// `other` starting when `self` ends.
    pub fn then(&self, other: &Chord) -> Self {
        let offset = self.length();
        let mut out = self.clone();
        for (onset, note) in other.timed() {
            out.notes.push(note.clone());
            out.onsets.push(onset + offset);
        }
        out
    }

    /// `times` back-to-back copies of `self`.
    pub fn repeat(&self, times: usize) -> Result<Self, MusicError> {
        let total = self
            .notes
            .len()
            .checked_mul(times)
            .filter(|total| *total <= MAX_NOTES)
            .ok_or_else(|| MusicError::InvalidChord(format!("repeating {times} times is too large")))?;
        if total == 0 {
            return Ok(Chord::default());
        }
        let length = self.length();
        let mut out = Chord {
            notes: Vec::with_capacity(total),
            onsets: Vec::with_capacity(total),
        };
        for i in 0..times {
            let offset = length * i as f64;
            for (onset, note) in self.timed() {
                out.notes.push(note.clone());
                out.onsets.push(onset + offset);
            }
        }
        Ok(out)
    }

    /// `self` and `other` starting together.
    pub fn stack(&self, other: &Chord) -> Self {
        let mut pairs: Vec<(f64, Note)> = self
            .timed()
            .chain(other.timed())
            .map(|(onset, note)| (onset, note.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (onsets, notes) = pairs.into_iter().unzip();
        Self { notes, onsets }
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, note) in self.notes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{note}")?;
        }
        f.write_str("}")
    }
}

/// Tracks with their instruments and start times, at one tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub tracks: Vec<Chord>,
    /// General MIDI program per track.
    pub programs: Vec<u8>,
    pub bpm: f64,
    /// Start time per track, in bars.
    pub start_times: Vec<f64>,
}

impl Piece {
    /// Missing programs and start times are filled with defaults.
    pub fn new(
        tracks: Vec<Chord>,
        mut programs: Vec<u8>,
        bpm: f64,
        mut start_times: Vec<f64>,
    ) -> Result<Self, MusicError> {
        if programs.len() > tracks.len() || start_times.len() > tracks.len() {
            return Err(MusicError::InvalidPiece(format!(
                "more track settings than the {} tracks",
                tracks.len()
            )));
        }
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(MusicError::InvalidPiece(format!("bpm {bpm} must be positive")));
        }
        if start_times.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
            return Err(MusicError::InvalidPiece(
                "start times must not be negative".into(),
            ));
        }
        programs.resize(tracks.len(), DEFAULT_PROGRAM);
        start_times.resize(tracks.len(), 0.0);
        Ok(Self {
            tracks,
            programs,
            bpm,
            start_times,
        })
    }

    /// A single-track piece.
    pub fn solo(track: Chord, bpm: f64) -> Self {
        Self {
            tracks: vec![track],
            programs: vec![DEFAULT_PROGRAM],
            bpm,
            start_times: vec![0.0],
        }
    }

    /// One line of descriptive text per track.
    pub fn track_details(&self) -> Vec<String> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(i, track)| {
                format!(
                    "track {}: {} (program {}), start {} bars, {} notes, {} bars",
                    i + 1,
                    instrument_name(self.programs[i]),
                    self.programs[i] + 1,
                    self.start_times[i],
                    track.notes.len(),
                    track.length(),
                )
            })
            .collect()
    }

    pub fn length(&self) -> f64 {
        self.tracks
            .iter()
            .zip(&self.start_times)
            .map(|(track, start)| start + track.length())
            .fold(0.0, f64::max)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "piece({} tracks, {} bpm)", self.tracks.len(), self.bpm)
    }
}

/// A constructed music value held by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicObject {
    Note(Note),
    Chord(Chord),
    Piece(Piece),
}

impl MusicObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MusicObject::Note(_) => "note",
            MusicObject::Chord(_) => "chord",
            MusicObject::Piece(_) => "piece",
        }
    }

    /// Notes and chords as a chord; pieces have no single chord form.
    pub fn as_chord(&self) -> Option<Chord> {
        match self {
            MusicObject::Note(n) => Some(Chord::stacked(vec![n.clone()])),
            MusicObject::Chord(c) => Some(c.clone()),
            MusicObject::Piece(_) => None,
        }
    }
}

impl fmt::Display for MusicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MusicObject::Note(n) => write!(f, "{n}"),
            MusicObject::Chord(c) => write!(f, "{c}"),
            MusicObject::Piece(p) => write!(f, "{p}"),
        }
    }
}
