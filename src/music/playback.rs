//! Live playback through a MIDI output port.

use std::thread;

use midir::{MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::beat::Beat;
use super::smf::{self, MidiMessage};
use super::theory::Piece;
use super::MusicError;

/// Open MIDI output connection.
pub struct Player {
    connection: MidiOutputConnection,
    port_name: String,
}

impl Player {
    /// Connect to the first output port whose name contains `port_filter`,
    /// or the first available port.
    pub fn connect(port_filter: Option<&str>) -> Result<Self, MusicError> {
        let midi_out =
            MidiOutput::new("mcc").map_err(|e| MusicError::Playback(format!("MIDI init: {e}")))?;

        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(MusicError::Playback("no MIDI output ports available".into()));
        }

        let (port, port_name) = if let Some(filter) = port_filter {
            ports
                .iter()
                .find_map(|p| {
                    let name = midi_out.port_name(p).unwrap_or_default();
                    name.contains(filter).then(|| (p.clone(), name))
                })
                .ok_or_else(|| {
                    MusicError::Playback(format!("MIDI port matching '{filter}' not found"))
                })?
        } else {
            let p = ports[0].clone();
            let name = midi_out
                .port_name(&p)
                .unwrap_or_else(|_| "unknown".to_string());
            (p, name)
        };

        let connection = midi_out
            .connect(&port, "mcc-output")
            .map_err(|e| MusicError::Playback(format!("MIDI connect: {e}")))?;

        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Play `piece` to completion, blocking the calling thread.
    pub fn play(&mut self, piece: &Piece) -> Result<(), MusicError> {
        let schedule = smf::schedule(piece);
        debug!(port = %self.port_name, events = schedule.len(), "playing");

        let mut now = Beat::ZERO;
        let result = schedule.iter().try_for_each(|(at, msg)| {
            if *at > now {
                thread::sleep((*at - now).to_duration(piece.bpm));
                now = *at;
            }
            self.send(msg)
        });
        self.silence(piece);
        result
    }

    fn send(&mut self, msg: &MidiMessage) -> Result<(), MusicError> {
        self.connection
            .send(&msg.bytes())
            .map_err(|e| MusicError::Playback(format!("MIDI send: {e}")))
    }

    /// All notes off on every channel the piece used.
    fn silence(&mut self, piece: &Piece) {
        for i in 0..piece.tracks.len() {
            let channel = smf::channel_for(i);
            let _ = self.connection.send(&[0xB0 | channel, 123, 0]);
        }
    }

    /// List all available MIDI output port names.
    pub fn list_ports() -> Vec<String> {
        let Ok(midi_out) = MidiOutput::new("mcc-list") else {
            return Vec::new();
        };
        midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect()
    }
}
