//! Machete spark: short white slashes that alternate stage sides.
//!
//! Each cut is a tiny pre-dark, a 25 ms spark on one side and an amber
//! ember gap. Left is front plus the left movers, right is back plus the
//! right movers. Runs on the global bus: the pre-dark blacks out whatever
//! the look had on those zones, so the spark reads as a cut.

use super::{PolicyBehavior, PolicyState};
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
    id: "machete_spark",
    display_name: "Machete Spark",
    category: EffectCategory::Physical,
    priority: 78,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT, Zone::BACK, Zone::MOVERS_LEFT, Zone::MOVERS_RIGHT],
    duration: DurationPolicy::fixed(390.0, 1200.0),
    has_strobe: false,
    energy_zone: Some(EnergyZone::Active),
    tags: &["spark", "cut"],
};

const PRE_MS: f32 = 50.0;
const SPARK_MS: f32 = 25.0;
const GAP_MS: f32 = 120.0;
const CUT_MS: f32 = PRE_MS + SPARK_MS + GAP_MS;
const DEFAULT_CUTS: f32 = 2.0;
const MAX_CUTS: f32 = 6.0;

const SPARK_WHITE: Hsl = Hsl::new(210.0, 10.0, 95.0);
const EMBER: Hsl = Hsl::new(35.0, 80.0, 30.0);
const SPARK_LEVEL: f32 = 0.95;
const SPARK_WHITE_CHANNEL: f32 = 0.7;
const EMBER_LEVEL: f32 = 0.08;

/// Stage side a zone belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

fn side_of(zone: &Zone) -> Side {
    match zone.name() {
        "back" | "movers_right" => Side::Right,
        _ => Side::Left,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slice {
    Pre,
    Spark(Side),
    Gap,
}

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacheteSpark {
    cuts: u32,
}

impl Default for MacheteSpark {
    fn default() -> Self {
        Self {
            cuts: DEFAULT_CUTS as u32,
        }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::MacheteSpark(MacheteSpark::default())
}

impl MacheteSpark {
    /// Number of cuts in this run
    pub fn cuts(&self) -> u32 {
        self.cuts
    }

    fn slice_at(&self, elapsed_ms: f32) -> Slice {
        let cut = (elapsed_ms / CUT_MS) as u32;
        if cut >= self.cuts {
            return Slice::Gap;
        }
        let t = elapsed_ms - cut as f32 * CUT_MS;
        if t < PRE_MS {
            Slice::Pre
        } else if t < PRE_MS + SPARK_MS {
            Slice::Spark(if cut % 2 == 0 { Side::Left } else { Side::Right })
        } else {
            Slice::Gap
        }
    }
}

impl PolicyBehavior for MacheteSpark {
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        let cuts = config
            .param("cuts")
            .unwrap_or(DEFAULT_CUTS)
            .round()
            .clamp(1.0, MAX_CUTS);
        self.cuts = cuts as u32;
        core.set_duration(CUT_MS * cuts);
        core.enter(EffectPhase::PreDuck);
    }

    fn update(&mut self, core: &mut EffectCore, _delta_ms: f32) {
        if core.elapsed_ms >= PRE_MS {
            core.enter(EffectPhase::Burst);
        }
    }

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let slice = self.slice_at(core.elapsed_ms);
        let spark = SPARK_LEVEL * core.intensity;
        let ember = EMBER_LEVEL * core.intensity;

        let mut frame = core.frame(match slice {
            Slice::Spark(_) => spark,
            Slice::Gap => ember,
            Slice::Pre => 0.0,
        });
        for zone in &core.zones {
            let zone_override = match slice {
                Slice::Spark(side) if side == side_of(zone) => {
                    ZoneOverride::lit(SPARK_WHITE, spark).with_white(SPARK_WHITE_CHANNEL * core.intensity)
                }
                Slice::Gap | Slice::Spark(_) => ZoneOverride::lit(EMBER, ember),
                Slice::Pre => ZoneOverride::lit(EMBER, 0.0),
            };
            frame = frame.with_zone(zone.clone(), zone_override);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PolicyRegistry;

    #[test]
    fn test_default_run_is_two_cuts() {
        let mut effect = PolicyRegistry::with_builtin()
            .instantiate("machete_spark", 1)
            .unwrap();
        effect.trigger(&TriggerConfig::new(1.0));
        assert_eq!(effect.duration_ms(), 390.0);
        assert_eq!(effect.phase(), EffectPhase::PreDuck);
    }

    #[test]
    fn test_cuts_alternate_sides() {
        let spark = MacheteSpark { cuts: 2 };
        assert_eq!(spark.slice_at(10.0), Slice::Pre);
        assert_eq!(spark.slice_at(60.0), Slice::Spark(Side::Left));
        assert_eq!(spark.slice_at(100.0), Slice::Gap);
        assert_eq!(spark.slice_at(CUT_MS + 60.0), Slice::Spark(Side::Right));
        assert_eq!(spark.slice_at(CUT_MS * 2.0 + 60.0), Slice::Gap);
    }

    #[test]
    fn test_spark_lights_one_side() {
        let mut effect = PolicyRegistry::with_builtin()
            .instantiate("machete_spark", 1)
            .unwrap();
        effect.trigger(&TriggerConfig::new(1.0));
        effect.update(60.0);
        assert_eq!(effect.phase(), EffectPhase::Burst);

        let frame = effect.output().unwrap().unwrap();
        assert_eq!(frame.zone_overrides[&Zone::FRONT].dimmer, SPARK_LEVEL);
        assert_eq!(frame.zone_overrides[&Zone::MOVERS_LEFT].dimmer, SPARK_LEVEL);
        assert_eq!(frame.zone_overrides[&Zone::BACK].dimmer, EMBER_LEVEL);
    }

    #[test]
    fn test_cut_count_bounded_by_ceiling() {
        let mut effect = PolicyRegistry::with_builtin()
            .instantiate("machete_spark", 1)
            .unwrap();
        effect.trigger(&TriggerConfig::new(1.0).with_param("cuts", 50.0));
        assert!(effect.duration_ms() <= META.duration.ceiling_ms);
    }
}
