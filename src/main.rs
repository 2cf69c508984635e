//! mcc: compile `.mc` music files to MIDI and LilyPond.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mcc::config::CompilerConfig;
use mcc::dsl::{CompileError, Compiler, ErrorCollector};
use mcc::music::playback::Player;
use mcc::music::Studio;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Source files (.mc)
    #[arg(required_unless_present_any = ["list_ports", "save_config"])]
    files: Vec<PathBuf>,

    /// Directory for exported MIDI files and scores
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Play exported music on a MIDI output port
    #[arg(long)]
    play: bool,

    /// Leave note/chord arrays declared without an initializer unset
    #[arg(long)]
    no_array_defaults: bool,

    /// Config file (default: ~/.mcc/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings to the config file (--config or the default path)
    #[arg(long)]
    save_config: bool,

    /// List MIDI output ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("MCC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args, errors: &mut ErrorCollector) -> CompilerConfig {
    let mut config = match &args.config {
        Some(path) => CompilerConfig::load_from(path).unwrap_or_else(|e| {
            errors.add(
                CompileError::io(format!("could not load config '{}': {e}", path.display()))
                    .into_warning(),
            );
            CompilerConfig::default()
        }),
        None => CompilerConfig::load().unwrap_or_default(),
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.play {
        config.playback = true;
    }
    if args.no_array_defaults {
        config.populate_array_defaults = false;
    }
    config
}

fn save_config(config: &CompilerConfig, path: Option<&Path>, errors: &mut ErrorCollector) {
    let Some(path) = path.map(Path::to_path_buf).or_else(CompilerConfig::default_path) else {
        errors.add(CompileError::io("no home directory to save the config in"));
        return;
    };
    match config.save(&path) {
        Ok(()) => info!(path = %path.display(), "saved config"),
        Err(e) => errors.add(CompileError::io(format!(
            "could not save config '{}': {e}",
            path.display()
        ))),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_ports {
        let ports = Player::list_ports();
        if ports.is_empty() {
            println!("no MIDI output ports");
        }
        for port in ports {
            println!("{port}");
        }
        return ExitCode::SUCCESS;
    }

    let mut errors = ErrorCollector::new();
    let config = load_config(&args, &mut errors);
    debug!(?config, "configuration");

    if args.save_config {
        save_config(&config, args.config.as_deref(), &mut errors);
    }

    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        warn!(error = %e, dir = %config.output_dir.display(), "cannot create output directory");
    }

    let compiler = Compiler::new(config.eval_options());
    for path in &args.files {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        let mut studio = Studio::new(&config, stem);
        compiler.compile_file(path, &mut studio, &mut errors);
    }

    if let Err(e) = errors.show(&mut std::io::stderr()) {
        warn!(error = %e, "cannot print diagnostics");
    }
    if errors.ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_config_writes_effective_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = CompilerConfig {
            bpm: 84.0,
            populate_array_defaults: false,
            ..CompilerConfig::default()
        };
        let mut errors = ErrorCollector::new();
        save_config(&config, Some(&path), &mut errors);
        assert!(errors.is_empty());
        assert_eq!(CompilerConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn save_config_failure_is_reported() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("config.yaml");
        let mut errors = ErrorCollector::new();
        save_config(&CompilerConfig::default(), Some(&path), &mut errors);
        assert!(!errors.ok());
        assert!(errors.issues()[0].message.starts_with("could not save config"));
    }
}
