//! Musical timing
//!
//! Tempo-synced effects turn `(bpm, beats)` into a duration exactly once,
//! when they are triggered. A tempo change while the effect runs never
//! stretches or shrinks it.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Lowest tempo accepted as a real reading
pub const MIN_BPM: f32 = 20.0;
/// Highest tempo accepted as a real reading
pub const MAX_BPM: f32 = 400.0;

/// Musical state at trigger time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicalContext {
    /// Tempo in beats per minute
    pub bpm: f32,
    /// Position inside the current beat `[0, 1)`
    #[serde(default)]
    pub beat_phase: f32,
    /// Overall energy `[0, 1]`
    #[serde(default)]
    pub energy: f32,
    /// Energy z-score relative to the recent average
    #[serde(default)]
    pub z_score: f32,
    /// True while a drop is playing
    #[serde(default)]
    pub in_drop: bool,
}

impl MusicalContext {
    /// Context carrying only a tempo
    pub fn with_bpm(bpm: f32) -> Self {
        Self {
            bpm,
            beat_phase: 0.0,
            energy: 0.0,
            z_score: 0.0,
            in_drop: false,
        }
    }

    /// Milliseconds per beat, or `None` when the tempo reading is unusable
    pub fn beat_ms(&self) -> Option<f32> {
        if self.bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            Some(60_000.0 / self.bpm)
        } else {
            None
        }
    }
}

/// How a policy derives its duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationPolicy {
    /// Duration used when no usable tempo is available
    pub default_ms: f32,
    /// Hard safety ceiling, applied to every derived duration
    pub ceiling_ms: f32,
    /// Beat count for tempo sync; `None` means the policy ignores tempo
    pub beats: Option<f32>,
}

impl DurationPolicy {
    /// Fixed-length policy
    pub const fn fixed(default_ms: f32, ceiling_ms: f32) -> Self {
        Self {
            default_ms,
            ceiling_ms,
            beats: None,
        }
    }

    /// Tempo-synced policy
    pub const fn synced(beats: f32, default_ms: f32, ceiling_ms: f32) -> Self {
        Self {
            default_ms,
            ceiling_ms,
            beats: Some(beats),
        }
    }

    /// Resolve the duration for one trigger.
    ///
    /// Tempo sync without a context, or with an unusable tempo, falls back to
    /// the fixed default instead of failing. The result never exceeds the
    /// ceiling.
    pub fn resolve(&self, context: Option<&MusicalContext>) -> f32 {
        let derived = match (self.beats, context) {
            (Some(beats), Some(ctx)) => beats_to_ms(ctx.bpm, beats).unwrap_or(self.default_ms),
            _ => self.default_ms,
        };
        self.clamp(derived)
    }

    /// Clamp any candidate duration to `(0, ceiling]`
    pub fn clamp(&self, ms: f32) -> f32 {
        if !ms.is_finite() || ms <= 0.0 {
            return self.default_ms.min(self.ceiling_ms);
        }
        ms.min(self.ceiling_ms)
    }
}

/// `60000 / bpm * beats`, or `None` for an unusable tempo or beat count
pub fn beats_to_ms(bpm: f32, beats: f32) -> Option<f32> {
    if !beats.is_finite() || beats <= 0.0 {
        return None;
    }
    MusicalContext::with_bpm(bpm).beat_ms().map(|beat| beat * beats)
}

/// Sharp pulse at the start of every beat, fading linearly
pub fn beat_pulse(beat_phase: f32) -> f32 {
    1.0 - beat_phase.rem_euclid(1.0)
}

/// Smooth pulse peaking mid-beat: `(sin((phase - 0.25) * 2pi) + 1) / 2`
pub fn sine_pulse(beat_phase: f32) -> f32 {
    (((beat_phase - 0.25) * TAU).sin() + 1.0) / 2.0
}

/// Map energy `[0, 1]` to a gentle multiplier `[0.5, 1.0]`
pub fn energy_factor(energy: f32) -> f32 {
    0.5 + energy.clamp(0.0, 1.0) * 0.5
}

/// Scale `base` by how far the energy z-score sits above a typical peak.
///
/// A z-score of 1.5 leaves `base` unchanged; each unit above or below moves
/// it by `scale`, within half to one-and-a-half times.
pub fn intensity_from_z_score(base: f32, z_score: f32, scale: f32) -> f32 {
    let factor = (1.0 + (z_score - 1.5) * scale).clamp(0.5, 1.5);
    (base * factor).clamp(0.0, 1.0)
}

/// Cubic ease in and out
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Linear interpolation
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
