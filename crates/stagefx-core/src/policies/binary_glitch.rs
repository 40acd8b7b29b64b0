//! Binary glitch: hard on/off stutter patterns, no fades at all.
//!
//! The pattern is picked from the trigger timestamp through the seeded
//! generator, so the same timestamp always replays the same stutter.
//! Patterns loop when the effect outlives them.
//!
//! Every lit segment plus its neighbouring dark segment lasts at least one
//! period at the strobe ceiling; see `test_patterns_respect_strobe_ceiling`.

use super::{PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{FrameOutput, ZoneOverride};
use crate::prng::{seeded_random, timestamp_seed};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "binary_glitch",
    display_name: "Binary Glitch",
    category: EffectCategory::Physical,
    priority: 72,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT, Zone::PARS, Zone::BACK, Zone::ALL_MOVERS],
    duration: DurationPolicy::fixed(1200.0, 1200.0),
    has_strobe: true,
    energy_zone: Some(EnergyZone::Active),
    tags: &["glitch", "techno", "digital"],
};

const SALT: u32 = 0xb1a7_0001;
const COLOR_SALT: u32 = 0xb1a7_0002;

const ELECTRIC_BLUE: Hsl = Hsl::new(200.0, 100.0, 50.0);
const HOT_CYAN: Hsl = Hsl::new(180.0, 85.0, 55.0);

/// `(duration_ms, lit)` segments
type Pattern = &'static [(f32, bool)];

/// Stutter patterns
pub const PATTERNS: &[Pattern] = &[
    // stutter
    &[
        (40.0, false),
        (40.0, true),
        (30.0, false),
        (40.0, true),
        (30.0, false),
        (40.0, true),
        (120.0, false),
        (100.0, true),
        (60.0, false),
        (100.0, true),
        (60.0, false),
        (100.0, true),
        (120.0, false),
        (60.0, true),
        (40.0, false),
        (60.0, true),
        (40.0, false),
        (60.0, true),
    ],
    // morse
    &[
        (80.0, false),
        (40.0, true),
        (30.0, false),
        (40.0, true),
        (30.0, false),
        (40.0, true),
        (150.0, false),
        (80.0, true),
        (50.0, false),
        (40.0, true),
        (30.0, false),
        (40.0, true),
        (200.0, false),
        (120.0, true),
        (50.0, false),
        (120.0, true),
    ],
    // sparse
    &[
        (200.0, false),
        (50.0, true),
        (100.0, false),
        (50.0, true),
        (300.0, false),
        (50.0, true),
        (100.0, false),
        (50.0, true),
        (300.0, false),
    ],
    // syncopated
    &[
        (50.0, false),
        (80.0, true),
        (80.0, false),
        (80.0, true),
        (40.0, false),
        (40.0, true),
        (80.0, false),
        (40.0, true),
        (40.0, false),
        (80.0, true),
        (80.0, false),
        (40.0, true),
        (40.0, false),
        (80.0, true),
        (120.0, false),
        (120.0, true),
        (50.0, false),
    ],
    // hammer
    &[
        (30.0, false),
        (100.0, true),
        (30.0, false),
        (80.0, true),
        (30.0, false),
        (120.0, true),
        (30.0, false),
        (60.0, true),
        (30.0, false),
        (100.0, true),
        (50.0, false),
        (150.0, true),
        (30.0, false),
        (80.0, true),
        (30.0, false),
        (150.0, true),
        (80.0, false),
    ],
];

/// Pattern index for a trigger timestamp
pub fn select_pattern(timestamp_ms: u64) -> usize {
    let r = seeded_random(timestamp_seed(timestamp_ms) ^ SALT);
    ((r * PATTERNS.len() as f32) as usize).min(PATTERNS.len() - 1)
}

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryGlitch {
    pattern: usize,
    color: Hsl,
}

impl Default for BinaryGlitch {
    fn default() -> Self {
        Self {
            pattern: 0,
            color: HOT_CYAN,
        }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::BinaryGlitch(BinaryGlitch::default())
}

impl BinaryGlitch {
    /// Index of the pattern chosen at trigger time
    pub fn pattern_index(&self) -> usize {
        self.pattern
    }

    fn is_lit(&self, elapsed_ms: f32) -> bool {
        let pattern = PATTERNS[self.pattern];
        let length: f32 = pattern.iter().map(|(ms, _)| ms).sum();
        let mut t = elapsed_ms.rem_euclid(length);
        for &(ms, lit) in pattern {
            if t < ms {
                return lit;
            }
            t -= ms;
        }
        false
    }
}

impl PolicyBehavior for BinaryGlitch {
    fn trigger(&mut self, core: &mut EffectCore, _config: &TriggerConfig) {
        self.pattern = select_pattern(core.timestamp_ms);
        self.color = if seeded_random(timestamp_seed(core.timestamp_ms) ^ COLOR_SALT) < 0.5 {
            HOT_CYAN
        } else {
            ELECTRIC_BLUE
        };
        core.enter(EffectPhase::Burst);
    }

    fn update(&mut self, _core: &mut EffectCore, _delta_ms: f32) {}

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let lit = self.is_lit(core.elapsed_ms);
        let level = if lit { core.intensity } else { 0.0 };
        let zone_override = if lit {
            ZoneOverride::lit(self.color, level)
        } else {
            ZoneOverride::dark()
        };

        let mut frame = core.frame(level);
        for zone in &core.zones {
            frame = frame.with_zone(zone.clone(), zone_override.clone());
        }
        Ok(frame)
    }
}

/// Shortest lit-plus-dark pair in a pattern, wrapping around its end
pub fn shortest_toggle_cycle_ms(pattern: &[(f32, bool)]) -> f32 {
    let n = pattern.len();
    (0..n)
        .map(|i| pattern[i].0 + pattern[(i + 1) % n].0)
        .fold(f32::INFINITY, f32::min)
}
