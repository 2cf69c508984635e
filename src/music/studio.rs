//! The default [`MusicLibrary`]: writes MIDI files and LilyPond scores next
//! to each other in the output directory and optionally plays them live.

use std::path::PathBuf;

use tracing::info;

use super::playback::Player;
use super::theory::Piece;
use super::{convert, score, smf, MusicError, MusicLibrary};
use crate::config::CompilerConfig;
use crate::dsl::value::Payload;

pub struct Studio {
    output_dir: PathBuf,
    /// File name stem of the source being compiled.
    stem: String,
    bpm: f64,
    playback: bool,
    midi_port: Option<String>,
    player: Option<Player>,
    exports: usize,
    scores: usize,
    written: Vec<PathBuf>,
}

impl Studio {
    pub fn new(config: &CompilerConfig, stem: impl Into<String>) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            stem: stem.into(),
            bpm: config.bpm,
            playback: config.playback,
            midi_port: config.midi_port.clone(),
            player: None,
            exports: 0,
            scores: 0,
            written: Vec::new(),
        }
    }

    /// Every file written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn output_path(&self, count: usize, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}-{}.{}", self.stem, count, extension))
    }

    fn play(&mut self, piece: &Piece) -> Result<(), MusicError> {
        if self.player.is_none() {
            let player = Player::connect(self.midi_port.as_deref())?;
            info!(port = player.port_name(), "connected MIDI output");
            self.player = Some(player);
        }
        if let Some(player) = self.player.as_mut() {
            player.play(piece)?;
        }
        Ok(())
    }
}

impl MusicLibrary for Studio {
    fn default_bpm(&self) -> f64 {
        self.bpm
    }

    fn export(&mut self, value: &Payload) -> Result<(), MusicError> {
        let piece = convert::renderable(value, self.bpm)?;
        self.exports += 1;
        let path = self.output_path(self.exports, "mid");
        smf::write(&piece, &path)?;
        info!(path = %path.display(), tracks = piece.tracks.len(), "wrote MIDI file");
        self.written.push(path);

        if self.playback {
            self.play(&piece)?;
        }
        Ok(())
    }

    fn render_score(&mut self, value: &Payload) -> Result<(), MusicError> {
        let piece = convert::renderable(value, self.bpm)?;
        self.scores += 1;
        let path = self.output_path(self.scores, "ly");
        score::write(&piece, &path)?;
        info!(path = %path.display(), "wrote score");
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::theory::MusicObject;

    fn studio(dir: &std::path::Path) -> Studio {
        let config = CompilerConfig {
            output_dir: dir.to_path_buf(),
            ..CompilerConfig::default()
        };
        Studio::new(&config, "song")
    }

    #[test]
    fn export_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut studio = studio(dir.path());
        studio.export(&Payload::Text("C".into())).unwrap();
        studio.export(&Payload::Text("Am".into())).unwrap();
        assert_eq!(
            studio.written(),
            &[dir.path().join("song-1.mid"), dir.path().join("song-2.mid")]
        );
        let bytes = std::fs::read(dir.path().join("song-2.mid")).unwrap();
        assert_eq!(&bytes[0..4], b"MThd");
    }

    #[test]
    fn score_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut studio = studio(dir.path());
        let chord = studio.chord(&Payload::Text("G7".into())).unwrap();
        studio.render_score(&Payload::Music(chord)).unwrap();
        let text = std::fs::read_to_string(dir.path().join("song-1.ly")).unwrap();
        assert!(text.contains("<g' b' d'' f''>4"));
    }

    #[test]
    fn non_music_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut studio = studio(dir.path());
        assert!(studio.export(&Payload::Int(3)).is_err());
        assert!(studio.written().is_empty());
    }

    #[test]
    fn pieces_use_configured_tempo() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompilerConfig {
            output_dir: dir.path().to_path_buf(),
            bpm: 72.0,
            ..CompilerConfig::default()
        };
        let mut studio = Studio::new(&config, "song");
        let piece = studio
            .piece(&Payload::List(vec![Payload::List(vec![Payload::Text("C".into())])]))
            .unwrap();
        let MusicObject::Piece(piece) = piece else {
            panic!("expected piece");
        };
        assert_eq!(piece.bpm, 72.0);
    }
}
