//! Ghost breath: slow violet breathing on the back wash and movers.
//!
//! Each breath is a quick eased inhale followed by a long cosine exhale. The
//! breath length comes from the tempo (four beats), the breath count from the
//! `breaths` trigger field.

use std::f32::consts::PI;

use super::{PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{BlendMode, FrameOutput, ZoneOverride};
use crate::registry::PolicyMeta;
use crate::timing::{intensity_from_z_score, lerp, DurationPolicy};
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "ghost_breath",
    display_name: "Ghost Breath",
    category: EffectCategory::Color,
    priority: 50,
    mix_bus: MixBus::Ambient,
    default_zones: &[Zone::BACK, Zone::ALL_MOVERS],
    duration: DurationPolicy::synced(4.0, 3000.0, 10_000.0),
    has_strobe: false,
    energy_zone: Some(EnergyZone::Valley),
    tags: &["ambient", "breath", "dark"],
};

const MIN_BREATH_MS: f32 = 1000.0;
const MAX_BREATHS: f32 = 4.0;
const INHALE_SHARE: f32 = 0.35;
const FLOOR: f32 = 0.15;
const PEAK: f32 = 0.7;
const DEFAULT_Z: f32 = 1.5;
const Z_SCALE: f32 = 0.15;
const MOVER_SHARE: f32 = 0.7;

const DEEP_VIOLET: Hsl = Hsl::new(270.0, 100.0, 40.0);
const GHOST_VIOLET: Hsl = Hsl::new(285.0, 100.0, 45.0);

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostBreath {
    breath_ms: f32,
    z_score: f32,
}

impl Default for GhostBreath {
    fn default() -> Self {
        Self {
            breath_ms: META.duration.default_ms,
            z_score: DEFAULT_Z,
        }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::GhostBreath(GhostBreath::default())
}

impl GhostBreath {
    /// Length of one breath for this run
    pub fn breath_ms(&self) -> f32 {
        self.breath_ms
    }

    /// Breath curve `[0, 1]` at `t` within one breath
    fn curve(t: f32) -> f32 {
        if t < INHALE_SHARE {
            let x = t / INHALE_SHARE;
            1.0 - (1.0 - x) * (1.0 - x)
        } else {
            let x = (t - INHALE_SHARE) / (1.0 - INHALE_SHARE);
            ((x * PI).cos() + 1.0) / 2.0
        }
    }

    fn breath_position(&self, elapsed_ms: f32) -> f32 {
        (elapsed_ms.rem_euclid(self.breath_ms) / self.breath_ms).clamp(0.0, 1.0)
    }
}

impl PolicyBehavior for GhostBreath {
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        let breaths = config
            .param("breaths")
            .unwrap_or(1.0)
            .round()
            .clamp(1.0, MAX_BREATHS);
        self.breath_ms = core.duration_ms.max(MIN_BREATH_MS);
        core.set_duration(self.breath_ms * breaths);
        self.z_score = core
            .musical_context
            .map(|ctx| ctx.z_score)
            .filter(|z| z.is_finite() && *z != 0.0)
            .unwrap_or(DEFAULT_Z);
        core.enter(EffectPhase::Breathe);
    }

    fn update(&mut self, _core: &mut EffectCore, _delta_ms: f32) {}

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let breath = Self::curve(self.breath_position(core.elapsed_ms));
        let raw = lerp(FLOOR, PEAK, breath);
        let level = intensity_from_z_score(raw * core.intensity, self.z_score, Z_SCALE);
        let color = DEEP_VIOLET.lerp(&GHOST_VIOLET, breath);

        let mut frame = core.frame(level);
        for zone in &core.zones {
            let zone_override = if zone.is_movers() {
                ZoneOverride::lit(color, level * MOVER_SHARE)
            } else {
                ZoneOverride::lit(color, level).with_blend(BlendMode::Replace)
            };
            frame = frame.with_zone(zone.clone(), zone_override);
        }
        Ok(frame)
    }
}
