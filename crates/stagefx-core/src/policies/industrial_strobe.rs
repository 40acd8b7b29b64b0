//! Industrial strobe: a short duck to black, a burst of hard flashes, then a
//! quick fade back to whatever runs underneath.
//!
//! The flash color follows the spectral character of the hit: harsh
//! material gets acid cyan, noisy material gets magenta, everything else
//! plain white.

use super::{min_cycle_ms, PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{FrameOutput, ZoneOverride};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "industrial_strobe",
    display_name: "Industrial Strobe",
    category: EffectCategory::Physical,
    priority: 95,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT, Zone::PARS, Zone::BACK, Zone::ALL_MOVERS],
    duration: DurationPolicy::fixed(450.0, 800.0),
    has_strobe: true,
    energy_zone: Some(EnergyZone::Intense),
    tags: &["strobe", "techno"],
};

const PRE_DUCK_MS: f32 = 50.0;
const FLASH_MS: f32 = 35.0;
const GAP_MS: f32 = 65.0;
const FADE_MS: f32 = 100.0;
const MAX_RATE_HZ: f32 = 10.0;
const DEFAULT_FLASHES: u32 = 3;

const ACID_CYAN: Hsl = Hsl::new(180.0, 100.0, 70.0);
const NOISE_MAGENTA: Hsl = Hsl::new(300.0, 100.0, 75.0);

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndustrialStrobe {
    flashes: u32,
    cycle_ms: f32,
    color: Hsl,
}

impl Default for IndustrialStrobe {
    fn default() -> Self {
        Self {
            flashes: DEFAULT_FLASHES,
            cycle_ms: FLASH_MS + GAP_MS,
            color: Hsl::WHITE,
        }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::IndustrialStrobe(IndustrialStrobe::default())
}

/// Flash color for the given spectral harshness and flatness
pub fn flash_color(harshness: f32, flatness: f32) -> Hsl {
    if harshness > 0.6 {
        ACID_CYAN
    } else if flatness > 0.7 {
        NOISE_MAGENTA
    } else {
        Hsl::WHITE
    }
}

impl IndustrialStrobe {
    fn burst_end(&self) -> f32 {
        PRE_DUCK_MS + self.flashes as f32 * self.cycle_ms
    }

    fn flash_override(&self, level: f32) -> ZoneOverride {
        let lit = ZoneOverride::lit(self.color, level);
        if self.color == Hsl::WHITE {
            lit.with_white(level)
        } else {
            lit
        }
    }
}

impl PolicyBehavior for IndustrialStrobe {
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        self.flashes = config
            .param("flash_count")
            .map(|n| n.round().clamp(1.0, 4.0) as u32)
            .unwrap_or(DEFAULT_FLASHES);
        self.cycle_ms = (FLASH_MS + GAP_MS).max(min_cycle_ms(MAX_RATE_HZ));
        self.color = flash_color(
            config.param("harshness").unwrap_or(0.0),
            config.param("flatness").unwrap_or(0.0),
        );
        core.set_duration(self.burst_end() + FADE_MS);
        core.enter(EffectPhase::PreDuck);
    }

    fn update(&mut self, core: &mut EffectCore, _delta_ms: f32) {
        if core.elapsed_ms >= self.burst_end() {
            core.enter(EffectPhase::Fade);
        } else if core.elapsed_ms >= PRE_DUCK_MS {
            core.enter(EffectPhase::Burst);
        }
    }

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let level = core.intensity;
        let (zone_override, frame_level, composition, strobe) = match core.phase {
            EffectPhase::Burst => {
                let t = (core.elapsed_ms - PRE_DUCK_MS).rem_euclid(self.cycle_ms);
                if t < FLASH_MS {
                    (self.flash_override(level), level, None, Some(1000.0 / self.cycle_ms))
                } else {
                    (ZoneOverride::dark(), 0.0, None, Some(1000.0 / self.cycle_ms))
                }
            }
            EffectPhase::Fade => {
                let remaining = (core.duration_ms - core.elapsed_ms).max(0.0);
                let opacity = (remaining / FADE_MS).clamp(0.0, 1.0).powf(1.5);
                (self.flash_override(level), level, Some(opacity), None)
            }
            _ => (ZoneOverride::dark(), 0.0, None, None),
        };

        let mut frame = core.frame(frame_level);
        frame.global_composition = composition;
        frame.strobe_rate = strobe;
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
    fn test_color_selection() {
        assert_eq!(flash_color(0.9, 0.9), ACID_CYAN);
        assert_eq!(flash_color(0.2, 0.8), NOISE_MAGENTA);
        assert_eq!(flash_color(0.2, 0.2), Hsl::WHITE);
    }

    #[test]
    fn test_phase_sequence() {
        let mut effect = PolicyRegistry::with_builtin()
            .instantiate("industrial_strobe", 1)
            .unwrap();
        effect.trigger(&TriggerConfig::new(1.0));
        assert_eq!(effect.phase(), EffectPhase::PreDuck);
        assert_eq!(effect.duration_ms(), 450.0);

        let frame = effect.output().unwrap().unwrap();
        assert!(frame.zone_overrides.values().all(|o| o.dimmer == 0.0));

        effect.update(60.0);
        assert_eq!(effect.phase(), EffectPhase::Burst);
        let frame = effect.output().unwrap().unwrap();
        assert!(frame.zone_overrides.values().all(|o| o.dimmer == 1.0));

        effect.update(300.0);
        assert_eq!(effect.phase(), EffectPhase::Fade);
        let frame = effect.output().unwrap().unwrap();
        let opacity = frame.global_composition.unwrap();
        assert!(opacity > 0.0 && opacity < 1.0);

        effect.update(100.0);
        assert!(effect.is_finished());
    }
}
