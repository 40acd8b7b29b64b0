//! Nuclear strobe: full intensity against full black, nothing in between.
//!
//! Trigger fields: `max_intensity` (default 1.0), `strobe_rate_hz`
//! (default 10, never above the strobe ceiling) and `duration_ms`.

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
    id: "nuclear_strobe",
    display_name: "Nuclear Strobe",
    category: EffectCategory::Physical,
    priority: 99,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT, Zone::PARS, Zone::BACK, Zone::ALL_MOVERS],
    duration: DurationPolicy::fixed(800.0, 2000.0),
    has_strobe: true,
    energy_zone: Some(EnergyZone::Peak),
    tags: &["strobe", "peak", "white"],
};

const DEFAULT_RATE_HZ: f32 = 10.0;

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NuclearStrobe {
    level: f32,
    rate_hz: f32,
}

impl Default for NuclearStrobe {
    fn default() -> Self {
        Self {
            level: 1.0,
            rate_hz: DEFAULT_RATE_HZ,
        }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::NuclearStrobe(NuclearStrobe::default())
}

impl NuclearStrobe {
    /// Flash rate in effect for this run
    pub fn rate_hz(&self) -> f32 {
        self.rate_hz
    }

    fn is_lit(&self, elapsed_ms: f32) -> bool {
        let cycle = 1000.0 / self.rate_hz;
        elapsed_ms.rem_euclid(cycle) < cycle / 2.0
    }
}

impl PolicyBehavior for NuclearStrobe {
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        let max = config.param("max_intensity").unwrap_or(1.0).clamp(0.0, 1.0);
        self.level = max * core.intensity;
        self.rate_hz = config
            .param("strobe_rate_hz")
            .unwrap_or(DEFAULT_RATE_HZ)
            .clamp(1.0, STROBE_CEILING_HZ);
        if let Some(ms) = config.param("duration_ms") {
            core.set_duration(ms);
        }
        core.enter(EffectPhase::Sustain);
    }

    fn update(&mut self, _core: &mut EffectCore, _delta_ms: f32) {}

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let lit = self.is_lit(core.elapsed_ms);
        let zone_override = if lit {
            ZoneOverride::lit(Hsl::WHITE, self.level).with_white(self.level)
        } else {
            ZoneOverride::dark()
        };

        let mut frame = core.frame(if lit { self.level } else { 0.0 });
        frame.strobe_rate = Some(self.rate_hz);
        for zone in &core.zones {
            frame = frame.with_zone(zone.clone(), zone_override.clone());
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PolicyRegistry;

    #[test]
    fn test_rate_is_clamped_to_ceiling() {
        let mut effect = PolicyRegistry::with_builtin()
            .instantiate("nuclear_strobe", 1)
            .unwrap();
        effect.trigger(&TriggerConfig::new(1.0).with_param("strobe_rate_hz", 40.0));
        let frame = effect.output().unwrap().unwrap();
        assert_eq!(frame.strobe_rate, Some(STROBE_CEILING_HZ));
    }

    #[test]
    fn test_duration_param_respects_ceiling() {
        let mut effect = PolicyRegistry::with_builtin()
            .instantiate("nuclear_strobe", 1)
            .unwrap();
        effect.trigger(&TriggerConfig::new(1.0).with_param("duration_ms", 60_000.0));
        assert_eq!(effect.duration_ms(), 2000.0);
    }

    #[test]
    fn test_first_half_cycle_is_lit() {
        let strobe = NuclearStrobe {
            level: 1.0,
            rate_hz: 12.0,
        };
        assert!(strobe.is_lit(0.0));
        assert!(strobe.is_lit(40.0));
        assert!(!strobe.is_lit(42.0));
        assert!(!strobe.is_lit(83.0));
        assert!(strobe.is_lit(84.0));
    }
}
