//! Stadium blinder: audience-facing white hit that takes over its zones.
//!
//! Tempo-synced to two beats. Envelope: fast attack, hold, squared decay.

use super::{PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{BlendMode, FrameOutput, ZoneOverride};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "stadium_blinder",
    display_name: "Stadium Blinder",
    category: EffectCategory::Physical,
    priority: 95,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT],
    duration: DurationPolicy::synced(2.0, 1500.0, 3000.0),
    has_strobe: false,
    energy_zone: Some(EnergyZone::Peak),
    tags: &["blinder", "white", "audience"],
};

const ATTACK_MS: f32 = 60.0;
const DECAY_SHARE: f32 = 0.4;
const BLINDER_WHITE: Hsl = Hsl::new(40.0, 20.0, 95.0);

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StadiumBlinder {
    decay_start_ms: f32,
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::StadiumBlinder(StadiumBlinder::default())
}

impl StadiumBlinder {
    fn envelope(&self, core: &EffectCore) -> f32 {
        match core.phase {
            EffectPhase::Attack => (core.elapsed_ms / ATTACK_MS).clamp(0.0, 1.0),
            EffectPhase::Sustain => 1.0,
            EffectPhase::Decay => {
                let span = (core.duration_ms - self.decay_start_ms).max(1.0);
                let t = ((core.elapsed_ms - self.decay_start_ms) / span).clamp(0.0, 1.0);
                (1.0 - t) * (1.0 - t)
            }
            _ => 0.0,
        }
    }
}

impl PolicyBehavior for StadiumBlinder {
    fn trigger(&mut self, core: &mut EffectCore, _config: &TriggerConfig) {
        self.decay_start_ms = core.duration_ms * (1.0 - DECAY_SHARE);
        core.enter(EffectPhase::Attack);
    }

    fn update(&mut self, core: &mut EffectCore, _delta_ms: f32) {
        if core.elapsed_ms >= self.decay_start_ms {
            core.enter(EffectPhase::Decay);
        } else if core.elapsed_ms >= ATTACK_MS {
            core.enter(EffectPhase::Sustain);
        }
    }

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let level = core.intensity * self.envelope(core);
        let zone_override = ZoneOverride::lit(BLINDER_WHITE, level)
            .with_white(level)
            .with_amber(level * 0.3)
            .with_blend(BlendMode::Replace);

        let mut frame = core.frame(level);
        for zone in &core.zones {
            frame = frame.with_zone(zone.clone(), zone_override.clone());
        }
        Ok(frame)
    }
}
