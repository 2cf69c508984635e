//! Building music objects out of evaluator payloads, and the operators the
//! evaluator forwards when an operand is a music object.

use super::theory::{Chord, MusicObject, Note, Piece, DEFAULT_DURATION, DEFAULT_VOLUME};
use super::MusicError;
use crate::dsl::ast::BinaryOp;
use crate::dsl::value::Payload;

fn number(p: &Payload) -> Option<f64> {
    match p {
        Payload::Int(i) => Some(*i as f64),
        Payload::Float(f) => Some(*f),
        _ => None,
    }
}

/// A note from a name, a MIDI degree, or a list shaped
/// `{name, octave?, duration?, volume?}` / `{degree, duration?, volume?}`.
pub fn note(source: &Payload) -> Result<Note, MusicError> {
    match source {
        Payload::Text(name) => Note::from_name(name),
        Payload::Int(degree) => Note::new(*degree, DEFAULT_DURATION, i64::from(DEFAULT_VOLUME)),
        Payload::Music(MusicObject::Note(n)) => Ok(n.clone()),
        Payload::List(items) => note_from_list(items),
        other => Err(MusicError::InvalidNote(format!("cannot build a note from '{other}'"))),
    }
}

fn note_from_list(items: &[Payload]) -> Result<Note, MusicError> {
    let bad = |what: &str| MusicError::InvalidNote(format!("{what} in note description"));
    let (base, rest) = match items.split_first() {
        Some((Payload::Text(name), rest)) => match rest.split_first() {
            Some((Payload::Int(octave), tail)) => (Note::from_name_in_octave(name, *octave)?, tail),
            _ => (Note::from_name(name)?, rest),
        },
        Some((Payload::Int(degree), rest)) => (
            Note::new(*degree, DEFAULT_DURATION, i64::from(DEFAULT_VOLUME))?,
            rest,
        ),
        Some(_) => return Err(bad("expected name or degree")),
        None => return Err(bad("empty list")),
    };

    let duration = match rest.first() {
        Some(p) => number(p).ok_or_else(|| bad("non-numeric duration"))?,
        None => base.duration,
    };
    let volume = match rest.get(1) {
        Some(p) => p.as_int().ok_or_else(|| bad("non-integer volume"))?,
        None => i64::from(base.volume),
    };
    if rest.len() > 2 {
        return Err(bad("too many fields"));
    }
    Note::new(i64::from(base.pitch), duration, volume)
}

/// A chord from a chord name, a note, or a list played in sequence. List
/// entries may themselves be chords, which are appended whole.
pub fn chord(source: &Payload) -> Result<Chord, MusicError> {
    match source {
        Payload::Text(name) => Chord::from_name(name),
        Payload::Music(obj) => obj.as_chord().ok_or_else(|| {
            MusicError::InvalidChord(format!("cannot build a chord from a {}", obj.kind_name()))
        }),
        Payload::List(items) => {
            let mut out = Chord::default();
            for item in items {
                let part = match item {
                    Payload::Music(MusicObject::Chord(c)) => c.clone(),
                    other => Chord::stacked(vec![
                        note(other).map_err(|e| MusicError::InvalidChord(e.to_string()))?
                    ]),
                };
                out = out.then(&part);
            }
            Ok(out)
        }
        other => Err(MusicError::InvalidChord(format!("cannot build a chord from '{other}'"))),
    }
}

/// A piece from `{tracks, instruments?, bpm?, start_times?}`. Instruments are
/// 1-based General MIDI program numbers.
pub fn piece(source: &Payload, default_bpm: f64) -> Result<Piece, MusicError> {
    let bad = |what: String| MusicError::InvalidPiece(what);
    let fields = match source {
        Payload::Music(MusicObject::Piece(p)) => return Ok(p.clone()),
        Payload::List(fields) => fields,
        other => return Err(bad(format!("cannot build a piece from '{other}'"))),
    };
    if fields.len() > 4 {
        return Err(bad("too many fields in piece description".into()));
    }

    let tracks = match fields.first() {
        Some(Payload::List(tracks)) => tracks
            .iter()
            .map(chord)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| bad(e.to_string()))?,
        Some(other) => vec![chord(other).map_err(|e| bad(e.to_string()))?],
        None => return Err(bad("missing tracks".into())),
    };

    let programs = match fields.get(1) {
        None => Vec::new(),
        Some(Payload::List(items)) => items.iter().map(program).collect::<Result<_, _>>()?,
        Some(single) => vec![program(single)?],
    };

    let bpm = match fields.get(2) {
        None => default_bpm,
        Some(p) => number(p).ok_or_else(|| bad(format!("bpm '{p}' is not a number")))?,
    };

    let start_times = match fields.get(3) {
        None => Vec::new(),
        Some(Payload::List(items)) => items
            .iter()
            .map(|p| number(p).ok_or_else(|| bad(format!("start time '{p}' is not a number"))))
            .collect::<Result<_, _>>()?,
        Some(p) => vec![number(p).ok_or_else(|| bad(format!("start time '{p}' is not a number")))?],
    };

    Piece::new(tracks, programs, bpm, start_times)
}

fn program(p: &Payload) -> Result<u8, MusicError> {
    p.as_int()
        .and_then(|n| n.checked_sub(1))
        .and_then(|n| u8::try_from(n).ok())
        .filter(|n| *n <= 127)
        .ok_or_else(|| MusicError::InvalidPiece(format!("instrument '{p}' is not in 1..=128")))
}

/// The piece `play`/`score` should render for a value.
pub fn renderable(value: &Payload, default_bpm: f64) -> Result<Piece, MusicError> {
    match value {
        Payload::Music(MusicObject::Piece(p)) => Ok(p.clone()),
        Payload::Music(obj) => obj
            .as_chord()
            .map(|c| Piece::solo(c, default_bpm))
            .ok_or_else(|| MusicError::Unsupported(format!("cannot render a {}", obj.kind_name()))),
        Payload::List(_) | Payload::Text(_) => Ok(Piece::solo(chord(value)?, default_bpm)),
        other => Err(MusicError::Unsupported(format!("'{other}' is not music"))),
    }
}

/// Apply `op` where at least one operand is a music object.
pub fn operate(op: BinaryOp, l: &Payload, r: &Payload) -> Result<Payload, MusicError> {
    let unsupported = || {
        MusicError::Unsupported(format!(
            "invalid operands to binary '{op}' ({} and {})",
            describe(l),
            describe(r)
        ))
    };
    let as_chord = |p: &Payload| match p {
        Payload::Music(obj) => obj.as_chord(),
        _ => None,
    };

    let out = match (op, l, r) {
        (BinaryOp::Add | BinaryOp::Sub, Payload::Music(obj), shift) if shift.as_int().is_some() => {
            let mut semitones = shift.as_int().ok_or_else(unsupported)?;
            if op == BinaryOp::Sub {
                semitones = semitones.checked_neg().ok_or_else(unsupported)?;
            }
            transpose(obj, semitones)?
        }
        (BinaryOp::Add, shift, Payload::Music(obj)) if shift.as_int().is_some() => {
            transpose(obj, shift.as_int().ok_or_else(unsupported)?)?
        }
        (BinaryOp::Mul, Payload::Music(obj), n) | (BinaryOp::Mul, n, Payload::Music(obj))
            if n.as_int().is_some() =>
        {
            let times = n.as_int().ok_or_else(unsupported)?;
            let chord = obj.as_chord().ok_or_else(unsupported)?;
            MusicObject::Chord(chord.repeat(usize::try_from(times.max(0)).unwrap_or(usize::MAX))?)
        }
        (BinaryOp::Add, _, _) => {
            let (a, b) = as_chord(l).zip(as_chord(r)).ok_or_else(unsupported)?;
            MusicObject::Chord(a.then(&b))
        }
        (BinaryOp::Combine, _, _) => {
            let (a, b) = as_chord(l).zip(as_chord(r)).ok_or_else(unsupported)?;
            MusicObject::Chord(a.stack(&b))
        }
        _ => return Err(unsupported()),
    };
    Ok(Payload::Music(out))
}

fn transpose(obj: &MusicObject, semitones: i64) -> Result<MusicObject, MusicError> {
    match obj {
        MusicObject::Note(n) => n.transpose(semitones).map(MusicObject::Note),
        MusicObject::Chord(c) => c.transpose(semitones).map(MusicObject::Chord),
        MusicObject::Piece(p) => {
            let tracks = p
                .tracks
                .iter()
                .map(|t| t.transpose(semitones))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(MusicObject::Piece(Piece {
                tracks,
                ..p.clone()
            }))
        }
    }
}

fn describe(p: &Payload) -> &'static str {
    match p {
        Payload::Music(obj) => obj.kind_name(),
        Payload::Int(_) | Payload::Bool(_) => "int",
        Payload::Float(_) => "float",
        Payload::Text(_) => "text",
        Payload::List(_) => "list",
        Payload::Unset => "unset",
    }
}
