//! Strobe storm: an enveloped strobe layered on top of the running look.
//!
//! Runs on the htp bus, so its dark half-cycles let the baseline through
//! instead of painting black. Rate scales from 8 Hz to the strobe ceiling
//! with trigger intensity; `rate_hz` overrides it.

use super::{PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::config::STROBE_CEILING_HZ;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{FrameOutput, ZoneOverride};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "strobe_storm",
    display_name: "Strobe Storm",
    category: EffectCategory::Physical,
    priority: 90,
    mix_bus: MixBus::Htp,
    default_zones: &[Zone::FRONT, Zone::PARS, Zone::BACK],
    duration: DurationPolicy::fixed(800.0, 800.0),
    has_strobe: true,
    energy_zone: Some(EnergyZone::Intense),
    tags: &["strobe"],
};

const ATTACK_MS: f32 = 100.0;
const SUSTAIN_MS: f32 = 500.0;
const BASE_HZ: f32 = 8.0;

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrobeStorm {
    rate_hz: f32,
}

impl Default for StrobeStorm {
    fn default() -> Self {
        Self { rate_hz: BASE_HZ }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::StrobeStorm(StrobeStorm::default())
}

impl StrobeStorm {
    fn envelope(&self, core: &EffectCore) -> f32 {
        let decay_start = ATTACK_MS + SUSTAIN_MS;
        match core.phase {
            EffectPhase::Attack => (core.elapsed_ms / ATTACK_MS).clamp(0.0, 1.0),
            EffectPhase::Sustain => 1.0,
            EffectPhase::Decay => {
                let span = (core.duration_ms - decay_start).max(1.0);
                1.0 - ((core.elapsed_ms - decay_start) / span).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

impl PolicyBehavior for StrobeStorm {
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        let scaled = BASE_HZ + (STROBE_CEILING_HZ - BASE_HZ) * core.intensity;
        self.rate_hz = config
            .param("rate_hz")
            .unwrap_or(scaled)
            .clamp(1.0, STROBE_CEILING_HZ);
        core.enter(EffectPhase::Attack);
    }

    fn update(&mut self, core: &mut EffectCore, _delta_ms: f32) {
        if core.elapsed_ms >= ATTACK_MS + SUSTAIN_MS {
            core.enter(EffectPhase::Decay);
        } else if core.elapsed_ms >= ATTACK_MS {
            core.enter(EffectPhase::Sustain);
        }
    }

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let cycle = 1000.0 / self.rate_hz;
        let lit = core.elapsed_ms.rem_euclid(cycle) < cycle / 2.0;
        let level = if lit {
            core.intensity * self.envelope(core)
        } else {
            0.0
        };

        let mut frame = core.frame(level);
        frame.strobe_rate = Some(self.rate_hz);
        for zone in &core.zones {
            frame = frame.with_zone(
                zone.clone(),
                ZoneOverride::lit(Hsl::WHITE, level).with_white(level),
            );
        }
        Ok(frame)
    }
}
