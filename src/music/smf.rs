//! Standard MIDI File encoding (format 1, 960 PPQN).
//!
//! The first track carries the tempo; each piece track follows on its own
//! channel, skipping the General MIDI drum channel.

use std::io;
use std::path::Path;

use super::beat::{Beat, TICKS_PER_BEAT};
use super::theory::Piece;

/// Channel-voice messages produced for a piece.
///
/// Wire format:
/// - Note On:  [0x90 | channel, note, velocity]
/// - Note Off: [0x80 | channel, note, 0]
/// - Program:  [0xC0 | channel, program]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    ProgramChange { channel: u8, program: u8 },
    NoteOff { channel: u8, note: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
}

impl MidiMessage {
    pub fn bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::ProgramChange { channel, program } => vec![0xC0 | channel, program],
            MidiMessage::NoteOff { channel, note } => vec![0x80 | channel, note, 0],
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | channel, note, velocity],
        }
    }

    /// Order among messages at the same tick: program first, then releases.
    fn rank(&self) -> u8 {
        match self {
            MidiMessage::ProgramChange { .. } => 0,
            MidiMessage::NoteOff { .. } => 1,
            MidiMessage::NoteOn { .. } => 2,
        }
    }
}

pub type TimedMessage = (Beat, MidiMessage);

/// Channel of the `index`th track; channel 9 is reserved for drums.
pub fn channel_for(index: usize) -> u8 {
    let c = (index % 15) as u8;
    if c >= 9 {
        c + 1
    } else {
        c
    }
}

/// Sorted messages for each track of `piece`.
pub fn track_messages(piece: &Piece) -> Vec<Vec<TimedMessage>> {
    piece
        .tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let channel = channel_for(i);
            let start = piece.start_times[i];
            let mut messages = vec![(
                Beat::ZERO,
                MidiMessage::ProgramChange {
                    channel,
                    program: piece.programs[i],
                },
            )];
            for (onset, note) in track.timed() {
                let on = Beat::from_bars_f64(start + onset);
                let off = Beat::from_bars_f64(start + onset + note.duration);
                messages.push((
                    on,
                    MidiMessage::NoteOn {
                        channel,
                        note: note.pitch,
                        velocity: note.volume,
                    },
                ));
                messages.push((
                    off,
                    MidiMessage::NoteOff {
                        channel,
                        note: note.pitch,
                    },
                ));
            }
            messages.sort_by_key(|(at, msg)| (*at, msg.rank()));
            messages
        })
        .collect()
}

/// All messages of `piece` merged into one timeline.
pub fn schedule(piece: &Piece) -> Vec<TimedMessage> {
    let mut all: Vec<TimedMessage> = track_messages(piece).into_iter().flatten().collect();
    all.sort_by_key(|(at, msg)| (*at, msg.rank()));
    all
}

fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let mut value = value.min(0x0FFF_FFFF);
    let mut buf = [0u8; 4];
    let mut n = 0;
    loop {
        buf[n] = (value & 0x7F) as u8;
        value >>= 7;
        n += 1;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        out.push(if i > 0 { buf[i] | 0x80 } else { buf[i] });
    }
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}

const END_OF_TRACK: [u8; 3] = [0xFF, 0x2F, 0x00];

fn tempo_track(bpm: f64) -> Vec<u8> {
    let mut body = Vec::new();
    write_vlq(&mut body, 0);
    body.extend_from_slice(&[0xFF, 0x51, 0x03]);
    body.extend_from_slice(&Beat::tempo_micros(bpm).to_be_bytes()[1..]);
    write_vlq(&mut body, 0);
    body.extend_from_slice(&[0xFF, 0x58, 0x04, 4, 2, 24, 8]);
    write_vlq(&mut body, 0);
    body.extend_from_slice(&END_OF_TRACK);
    body
}

fn event_track(messages: &[TimedMessage]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut last = Beat::ZERO;
    for (at, msg) in messages {
        let delta = (*at - last).ticks();
        write_vlq(&mut body, u32::try_from(delta).unwrap_or(u32::MAX));
        body.extend_from_slice(&msg.bytes());
        last = *at;
    }
    write_vlq(&mut body, 0);
    body.extend_from_slice(&END_OF_TRACK);
    body
}

/// Encode `piece` as a format 1 Standard MIDI File.
pub fn encode(piece: &Piece) -> Vec<u8> {
    let tracks = track_messages(piece);
    let mut out = Vec::new();

    let mut header = Vec::with_capacity(6);
    header.extend_from_slice(&1u16.to_be_bytes());
    header.extend_from_slice(&((tracks.len() + 1) as u16).to_be_bytes());
    header.extend_from_slice(&(TICKS_PER_BEAT as u16).to_be_bytes());
    write_chunk(&mut out, b"MThd", &header);

    write_chunk(&mut out, b"MTrk", &tempo_track(piece.bpm));
    for messages in &tracks {
        write_chunk(&mut out, b"MTrk", &event_track(messages));
    }
    out
}

/// Write `piece` to `path`, creating parent directories as needed.
pub fn write(piece: &Piece, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode(piece))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::theory::{Chord, Note};

    fn vlq(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_vlq(&mut out, value);
        out
    }

    #[test]
    fn variable_length_quantities() {
        assert_eq!(vlq(0), vec![0x00]);
        assert_eq!(vlq(0x7F), vec![0x7F]);
        assert_eq!(vlq(0x80), vec![0x81, 0x00]);
        assert_eq!(vlq(0x2000), vec![0xC0, 0x00]);
        assert_eq!(vlq(0x0FFF_FFFF), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn channels_skip_drums() {
        assert_eq!(channel_for(0), 0);
        assert_eq!(channel_for(8), 8);
        assert_eq!(channel_for(9), 10);
        assert_eq!(channel_for(14), 15);
        assert_eq!(channel_for(15), 0);
    }

    #[test]
    fn header_and_track_count() {
        let piece = Piece::solo(Chord::from_name("C").unwrap(), 120.0);
        let bytes = encode(&piece);
        assert_eq!(&bytes[0..4], b"MThd");
        assert_eq!(&bytes[8..14], &[0, 1, 0, 2, 0x03, 0xC0]);
        assert_eq!(bytes.windows(4).filter(|w| *w == &b"MTrk"[..]).count(), 2);
        assert_eq!(&bytes[bytes.len() - 3..], &END_OF_TRACK);
    }

    #[test]
    fn tempo_event() {
        let track = tempo_track(120.0);
        assert_eq!(&track[0..7], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    }

    #[test]
    fn note_timing_respects_start_time() {
        let melody = Chord::sequence(vec![Note::default(), Note::from_name("D4").unwrap()]);
        let piece = Piece::new(vec![melody], vec![], 120.0, vec![1.0]).unwrap();
        let messages = &track_messages(&piece)[0];
        let ticks: Vec<u64> = messages.iter().map(|(at, _)| at.ticks()).collect();
        assert_eq!(ticks, vec![0, 3840, 4800, 4800, 5760]);
        assert!(matches!(messages[3].1, MidiMessage::NoteOn { note: 62, .. }));
        assert!(matches!(messages[2].1, MidiMessage::NoteOff { note: 60, .. }));
    }

    #[test]
    fn schedule_merges_tracks() {
        let piece = Piece::new(
            vec![Chord::from_name("C").unwrap(), Chord::from_name("Am").unwrap()],
            vec![],
            120.0,
            vec![],
        )
        .unwrap();
        let all = schedule(&piece);
        assert_eq!(all.len(), 2 + 6 * 2);
        assert!(all.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("song.mid");
        write(&Piece::solo(Chord::default(), 120.0), &path).unwrap();
        assert!(path.exists());
    }
}
