//! Headless show loop: fire cues, tick the engine, dump frames

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info, warn};

use stagefx_core::{
    CompositeFrame, CueSheet, EffectEngine, EffectId, EngineEvent, Zone, ZoneState,
};

/// Idle time allowed after the last cue when no end time is given
const MAX_TAIL_MS: f64 = 60_000.0;

/// How frames are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// One JSON object per line
    Json,
    /// Human readable summary
    Text,
}

/// Loop settings
#[derive(Debug, Clone)]
pub struct ShowOptions {
    /// Frame length
    pub frame_ms: f32,
    /// Stop here; `None` runs until the last cue has played out
    pub duration_ms: Option<u64>,
    /// Write every n-th frame, 0 writes none
    pub every: u32,
    /// Output format
    pub format: FrameFormat,
}

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowSummary {
    /// Frames rendered
    pub frames: u64,
    /// Cues accepted by the engine
    pub cues_fired: usize,
    /// Cues the engine refused
    pub cues_rejected: usize,
    /// Frames in which at least one effect failed
    pub failed_frames: u64,
}

#[derive(Serialize)]
struct FrameLine<'a> {
    t_ms: u64,
    zones: &'a BTreeMap<Zone, ZoneState>,
    owners: &'a BTreeMap<Zone, EffectId>,
    failed: &'a [EffectId],
}

/// Play `sheet` through `engine`, writing frames to `out`
pub fn run_show<W: Write>(
    engine: &mut EffectEngine,
    sheet: &CueSheet,
    options: &ShowOptions,
    out: &mut W,
) -> Result<ShowSummary> {
    let frame_ms = f64::from(options.frame_ms);
    let end_ms = options.duration_ms.map(|d| d as f64);
    let last_cue_ms = sheet.last_cue_ms() as f64;
    let mut summary = ShowSummary::default();

    info!(
        "Running {} cues at {:.1} ms per frame",
        sheet.cues.len(),
        options.frame_ms
    );

    loop {
        let start = summary.frames as f64 * frame_ms;
        let done = match end_ms {
            Some(end) => start >= end,
            None => {
                (start > last_cue_ms && engine.active_count() == 0)
                    || start > last_cue_ms + MAX_TAIL_MS
            }
        };
        if done {
            break;
        }

        let (from, to) = (start as u64, (start + frame_ms) as u64);
        for cue in sheet.due(from, to) {
            match engine.trigger(&cue.policy, &cue.trigger_config()) {
                Ok(id) => {
                    debug!("Cue at {}ms fired {} as effect {}", cue.at_ms, cue.policy, id);
                    summary.cues_fired += 1;
                }
                Err(e) => {
                    warn!("Cue at {}ms ({}) rejected: {}", cue.at_ms, cue.policy, e);
                    summary.cues_rejected += 1;
                }
            }
        }

        let frame = engine.tick(options.frame_ms, &sheet.baseline);
        if !frame.failed.is_empty() {
            summary.failed_frames += 1;
        }
        log_events(engine.drain_events());

        if options.every > 0 && summary.frames % u64::from(options.every) == 0 {
            write_frame(out, options.format, to, &frame)?;
        }
        summary.frames += 1;
    }

    let stats = engine.stats();
    info!(
        "Show finished after {} frames: {} cues fired, {} rejected, {} triggers total",
        summary.frames, summary.cues_fired, summary.cues_rejected, stats.total_triggered
    );
    Ok(summary)
}

fn log_events(events: Vec<EngineEvent>) {
    for event in events {
        match event {
            EngineEvent::EffectTriggered { id, policy } => debug!("Effect {} ({}) started", id, policy),
            EngineEvent::EffectFinished { id, policy } => debug!("Effect {} ({}) finished", id, policy),
            EngineEvent::EffectFailed { id, policy } => {
                warn!("Effect {} ({}) dropped from this frame", id, policy)
            }
        }
    }
}

fn write_frame<W: Write>(
    out: &mut W,
    format: FrameFormat,
    t_ms: u64,
    frame: &CompositeFrame,
) -> Result<()> {
    match format {
        FrameFormat::Json => {
            let line = FrameLine {
                t_ms,
                zones: &frame.zones,
                owners: &frame.owners,
                failed: &frame.failed,
            };
            serde_json::to_writer(&mut *out, &line).context("Failed to encode frame")?;
            writeln!(out)?;
        }
        FrameFormat::Text => {
            writeln!(out, "t={}ms", t_ms)?;
            for (zone, state) in &frame.zones {
                let [r, g, b] = state.color.to_rgb();
                let owner = frame
                    .owners
                    .get(zone)
                    .map(|id| format!(" owner={}", id))
                    .unwrap_or_default();
                let strobe = state
                    .strobe_rate
                    .map(|hz| format!(" strobe={:.1}Hz", hz))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "  {:<14} #{:02x}{:02x}{:02x} dim={:.2} w={:.2} a={:.2}{}{}",
                    zone.name(),
                    r,
                    g,
                    b,
                    state.dimmer,
                    state.white,
                    state.amber,
                    strobe,
                    owner
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagefx_core::Hsl;

    fn sheet() -> CueSheet {
        CueSheet::from_toml_str(
            r#"
            [[cues]]
            at_ms = 0
            policy = "ghost_breath"

            [[cues]]
            at_ms = 100
            policy = "machete_spark"

            [[cues]]
            at_ms = 120
            policy = "laser_show"

            [baseline.front]
            color = { h = 30.0, s = 40.0, l = 50.0 }
            dimmer = 0.3
            "#,
        )
        .unwrap()
    }

    fn options(format: FrameFormat) -> ShowOptions {
        ShowOptions {
            frame_ms: 20.0,
            duration_ms: Some(400),
            every: 5,
            format,
        }
    }

    #[test]
    fn test_fires_and_rejects_cues() {
        let mut engine = EffectEngine::with_builtin();
        let mut out = Vec::new();
        let summary = run_show(&mut engine, &sheet(), &options(FrameFormat::Json), &mut out).unwrap();

        assert_eq!(summary.frames, 20);
        assert_eq!(summary.cues_fired, 2);
        assert_eq!(summary.cues_rejected, 1);
        assert_eq!(engine.stats().total_triggered, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["t_ms"], 20);
        assert!(first["zones"]["front"]["dimmer"].is_number());
    }

    #[test]
    fn test_runs_until_idle_without_end_time() {
        let mut engine = EffectEngine::with_builtin();
        let sheet = CueSheet::from_toml_str(
            r#"
            [[cues]]
            at_ms = 50
            policy = "machete_spark"
            "#,
        )
        .unwrap();
        let options = ShowOptions {
            duration_ms: None,
            every: 0,
            ..options(FrameFormat::Text)
        };
        let mut out = Vec::new();
        let summary = run_show(&mut engine, &sheet, &options, &mut out).unwrap();

        assert!(out.is_empty());
        assert_eq!(engine.active_count(), 0);
        // Two 195 ms cuts, fired in the third frame
        assert!(summary.frames >= 22 && summary.frames <= 26, "{}", summary.frames);
    }

    #[test]
    fn test_text_format() {
        let mut frame = CompositeFrame::default();
        frame
            .zones
            .insert(Zone::FRONT, ZoneState::lit(Hsl::new(0.0, 100.0, 50.0), 0.5));
        frame.owners.insert(Zone::FRONT, 3);
        let mut out = Vec::new();
        write_frame(&mut out, FrameFormat::Text, 16, &frame).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("t=16ms"));
        assert!(text.contains("#ff0000 dim=0.50"));
        assert!(text.contains("owner=3"));
    }
}
