//! Music-domain library: note/chord/piece construction, MIDI export and
//! playback, and score rendering.
//!
//! The evaluator only talks to this module through [`MusicLibrary`].

pub mod beat;
pub mod convert;
pub mod playback;
pub mod score;
pub mod smf;
pub mod studio;
pub mod theory;

pub use studio::Studio;
pub use theory::{Chord, MusicObject, Note, Piece};

use thiserror::Error;

use crate::dsl::ast::BinaryOp;
use crate::dsl::types::MusicType;
use crate::dsl::value::Payload;

pub const DEFAULT_BPM: f64 = 120.0;

#[derive(Debug, Error)]
pub enum MusicError {
    #[error("invalid note: {0}")]
    InvalidNote(String),
    #[error("invalid chord: {0}")]
    InvalidChord(String),
    #[error("invalid piece: {0}")]
    InvalidPiece(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Boundary between the evaluator and the music domain.
///
/// Construction and operators have default implementations; implementors
/// only decide where exported and rendered music goes.
pub trait MusicLibrary {
    /// Tempo for pieces that don't name one.
    fn default_bpm(&self) -> f64 {
        DEFAULT_BPM
    }

    fn note(&mut self, source: &Payload) -> Result<MusicObject, MusicError> {
        convert::note(source).map(MusicObject::Note)
    }

    fn chord(&mut self, source: &Payload) -> Result<MusicObject, MusicError> {
        convert::chord(source).map(MusicObject::Chord)
    }

    fn piece(&mut self, source: &Payload) -> Result<MusicObject, MusicError> {
        convert::piece(source, self.default_bpm()).map(MusicObject::Piece)
    }

    /// Per-track descriptive text of a constructed piece.
    fn track_details(&self, piece: &MusicObject) -> Vec<String> {
        match piece {
            MusicObject::Piece(p) => p.track_details(),
            _ => Vec::new(),
        }
    }

    /// Value a fresh array element of type `ty` starts with, if the type
    /// has one.
    fn zero(&mut self, ty: &MusicType) -> Option<Payload> {
        match ty {
            MusicType::Note => Some(Payload::Music(MusicObject::Note(Note::default()))),
            MusicType::Chord => Some(Payload::Music(MusicObject::Chord(Chord::default()))),
            _ => None,
        }
    }

    /// Binary operator with at least one music operand.
    fn operate(&mut self, op: BinaryOp, l: &Payload, r: &Payload) -> Result<Payload, MusicError> {
        convert::operate(op, l, r)
    }

    /// Write `value` to the native transport (and play it if configured).
    fn export(&mut self, value: &Payload) -> Result<(), MusicError>;

    /// Render `value` as a score.
    fn render_score(&mut self, value: &Payload) -> Result<(), MusicError>;
}
