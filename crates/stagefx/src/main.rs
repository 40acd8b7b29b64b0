//! StageFX - headless show runner
//!
//! Plays a cue sheet through the effect engine and prints the merged zone
//! states, lists the built-in policies, or runs the bus classifier over
//! authored effect descriptions.

mod logging_setup;
mod show;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use stagefx_core::{infer_mix_bus, CueSheet, EffectDescriptor, EffectEngine, EngineConfig, PolicyRegistry};

use show::{FrameFormat, ShowOptions};

/// StageFX - stage-lighting effect compositor
#[derive(Parser, Debug)]
#[command(name = "stagefx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge stage-lighting effects over a baseline", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a cue sheet and print the composited frames
    Run {
        /// Cue sheet (.toml, .ron or .json)
        #[arg(long, value_name = "FILE")]
        cues: PathBuf,

        /// Engine configuration (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Stop after this many milliseconds instead of when the show goes idle
        #[arg(short, long)]
        duration_ms: Option<u64>,

        /// Override the configured frame rate
        #[arg(long)]
        fps: Option<f32>,

        /// Print every n-th frame, 0 prints none
        #[arg(long, default_value_t = 1)]
        every: u32,

        /// Print frames as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List the built-in policies
    Policies {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Infer the mix bus for authored effect descriptions
    Classify {
        /// JSON array of effect descriptors
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Run {
            cues,
            config,
            duration_ms,
            fps,
            every,
            json,
        } => {
            let config = load_config(config.as_deref(), fps)?;
            let _guard = logging_setup::init(&config.log)?;
            let format = if json { FrameFormat::Json } else { FrameFormat::Text };
            run(&cues, config, duration_ms, every, format)
        }
        Commands::Policies { json } => list_policies(json, &mut io::stdout().lock()),
        Commands::Classify { file } => classify(&file, &mut io::stdout().lock()),
    }
}

fn load_config(path: Option<&Path>, fps: Option<f32>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(fps) = fps {
        if !(fps.is_finite() && fps > 0.0) {
            bail!("Frame rate must be positive, got {}", fps);
        }
        config.frame_rate_hz = fps;
    }
    Ok(config)
}

fn run(
    cues: &Path,
    config: EngineConfig,
    duration_ms: Option<u64>,
    every: u32,
    format: FrameFormat,
) -> Result<()> {
    let sheet = CueSheet::load(cues)
        .with_context(|| format!("Failed to load cue sheet {}", cues.display()))?;
    let registry = PolicyRegistry::with_builtin();
    sheet
        .validate(&registry)
        .context("Cue sheet names an unknown policy")?;
    info!("Loaded {} cues from {}", sheet.cues.len(), cues.display());

    let options = ShowOptions {
        frame_ms: config.frame_delta_ms(),
        duration_ms,
        every,
        format,
    };
    let mut engine = EffectEngine::new(registry, config);
    let mut out = io::BufWriter::new(io::stdout().lock());
    show::run_show(&mut engine, &sheet, &options, &mut out)?;
    out.flush()?;
    Ok(())
}

fn list_policies<W: Write>(json: bool, out: &mut W) -> Result<()> {
    let registry = PolicyRegistry::with_builtin();
    if json {
        let descriptors: Vec<EffectDescriptor> =
            registry.available().map(|meta| meta.descriptor()).collect();
        serde_json::to_writer_pretty(&mut *out, &descriptors)?;
        writeln!(out)?;
        return Ok(());
    }

    for meta in registry.available() {
        writeln!(
            out,
            "{:<18} {:<8} prio {:>3}  {:>6.0}ms  {}{}",
            meta.id,
            meta.mix_bus,
            meta.priority,
            meta.duration.default_ms,
            meta.display_name,
            if meta.has_strobe { "  [strobe]" } else { "" }
        )?;
    }
    Ok(())
}

fn classify<W: Write>(path: &Path, out: &mut W) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let descriptors: Vec<EffectDescriptor> =
        serde_json::from_str(&text).context("Expected a JSON array of effect descriptors")?;

    for descriptor in &descriptors {
        let classification = infer_mix_bus(descriptor);
        writeln!(
            out,
            "{:<24} {:<8} {:?}",
            descriptor.id, classification.bus, classification.rule
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "stagefx", "run", "--cues", "show.toml", "--fps", "30", "--json", "--every", "4",
        ])
        .unwrap();
        match args.command {
            Commands::Run {
                cues, fps, json, every, ..
            } => {
                assert_eq!(cues, PathBuf::from("show.toml"));
                assert_eq!(fps, Some(30.0));
                assert!(json);
                assert_eq!(every, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_load_config_with_fps_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "frame_rate_hz = 40.0\ndefault_bpm = 128.0\n").unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.frame_rate_hz, 40.0);
        assert_eq!(config.default_bpm, Some(128.0));

        let config = load_config(Some(&path), Some(50.0)).unwrap();
        assert_eq!(config.frame_rate_hz, 50.0);
        assert!(load_config(None, Some(0.0)).is_err());
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml")), None).is_err());
    }

    #[test]
    fn test_list_policies() {
        let mut out = Vec::new();
        list_policies(false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), PolicyRegistry::with_builtin().len());
        assert!(text.contains("nuclear_strobe"));
        assert!(text.contains("[strobe]"));

        let mut out = Vec::new();
        list_policies(true, &mut out).unwrap();
        let parsed: Vec<EffectDescriptor> = serde_json::from_slice(&out).unwrap();
        assert!(parsed.iter().any(|d| d.id == "ghost_breath"));
    }

    #[test]
    fn test_classify_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("effects.json");
        fs::write(
            &path,
            r#"[
                {"id": "morning_mist", "energy_zone": "ambient"},
                {"id": "fog_wall", "has_strobe": true}
            ]"#,
        )
        .unwrap();

        let mut out = Vec::new();
        classify(&path, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("ambient") && lines[0].contains("AtmosphereKeyword"));
        assert!(lines[1].contains("global") && lines[1].contains("Strobe"));
    }

    #[test]
    fn test_run_with_ron_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("show.ron");
        fs::write(
            &path,
            r#"(cues: [(at_ms: 0, policy: "seismic_snap")], baseline: {})"#,
        )
        .unwrap();
        let sheet = CueSheet::load(&path).unwrap();
        let mut engine = EffectEngine::with_builtin();
        let options = ShowOptions {
            frame_ms: 16.0,
            duration_ms: None,
            every: 0,
            format: FrameFormat::Text,
        };
        let summary = show::run_show(&mut engine, &sheet, &options, &mut io::sink()).unwrap();
        assert_eq!(summary.cues_fired, 1);
        assert_eq!(engine.active_count(), 0);
    }
}
