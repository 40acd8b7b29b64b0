//! Seismic snap: blackout, impact, rumble, long squared fade.
//!
//! Movers tremble during the rumble; the tremble is drawn from the seeded
//! generator per 40 ms bucket so replays match.

use super::{PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{FrameOutput, Movement, ZoneOverride};
use crate::prng::{effect_seed, seeded_random, time_bucket};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "seismic_snap",
    display_name: "Seismic Snap",
    category: EffectCategory::Physical,
    priority: 78,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT, Zone::PARS, Zone::BACK, Zone::ALL_MOVERS],
    duration: DurationPolicy::fixed(1500.0, 1500.0),
    has_strobe: false,
    energy_zone: Some(EnergyZone::Intense),
    tags: &["impact", "drop"],
};

const BLACKOUT_MS: f32 = 150.0;
const SNAP_MS: f32 = 150.0;
const SHAKE_MS: f32 = 300.0;
const SHAKE_FLOOR: f32 = 0.7;
const SHAKE_BUCKET_MS: f32 = 40.0;
const SHAKE_TILT: f32 = 0.2;
const SALT: u32 = 0x5e15_0001;

const IMPACT_RED: Hsl = Hsl::new(0.0, 90.0, 55.0);
const WARM_WHITE: Hsl = Hsl::new(40.0, 30.0, 95.0);

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeismicSnap {
    color: Hsl,
}

impl Default for SeismicSnap {
    fn default() -> Self {
        Self { color: IMPACT_RED }
    }
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::SeismicSnap(SeismicSnap::default())
}

/// Impact color for a trigger timestamp: red on even seconds, warm white on odd
pub fn impact_color(timestamp_ms: u64) -> Hsl {
    if (timestamp_ms / 1000) % 2 == 0 {
        IMPACT_RED
    } else {
        WARM_WHITE
    }
}

impl SeismicSnap {
    fn level(&self, core: &EffectCore) -> f32 {
        let snap_end = BLACKOUT_MS + SNAP_MS;
        let shake_end = snap_end + SHAKE_MS;
        let envelope = match core.phase {
            EffectPhase::Snap => 1.0,
            EffectPhase::Shake => {
                let t = ((core.elapsed_ms - snap_end) / SHAKE_MS).clamp(0.0, 1.0);
                1.0 - (1.0 - SHAKE_FLOOR) * t
            }
            EffectPhase::Fade => {
                let span = (core.duration_ms - shake_end).max(1.0);
                let t = ((core.elapsed_ms - shake_end) / span).clamp(0.0, 1.0);
                SHAKE_FLOOR * (1.0 - t) * (1.0 - t)
            }
            _ => 0.0,
        };
        core.intensity * envelope
    }

    fn tremble(&self, core: &EffectCore, zone: &Zone) -> Option<Movement> {
        if core.phase != EffectPhase::Shake || !zone.is_movers() {
            return None;
        }
        let shake_start = BLACKOUT_MS + SNAP_MS;
        let fade = 1.0 - ((core.elapsed_ms - shake_start) / SHAKE_MS).clamp(0.0, 1.0);
        let bucket = time_bucket(core.elapsed_ms, SHAKE_BUCKET_MS);
        let r = seeded_random(effect_seed(SALT, bucket, Some(zone)));
        Some(Movement::relative(0.0, (r - 0.5) * SHAKE_TILT * fade).with_speed(1.0))
    }
}

impl PolicyBehavior for SeismicSnap {
    fn trigger(&mut self, core: &mut EffectCore, _config: &TriggerConfig) {
        self.color = impact_color(core.timestamp_ms);
        core.enter(EffectPhase::Blackout);
    }

    fn update(&mut self, core: &mut EffectCore, _delta_ms: f32) {
        let t = core.elapsed_ms;
        if t >= BLACKOUT_MS + SNAP_MS + SHAKE_MS {
            core.enter(EffectPhase::Fade);
        } else if t >= BLACKOUT_MS + SNAP_MS {
            core.enter(EffectPhase::Shake);
        } else if t >= BLACKOUT_MS {
            core.enter(EffectPhase::Snap);
        }
    }

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let level = self.level(core);
        let mut frame = core.frame(level);
        for zone in &core.zones {
            let mut zone_override = if core.phase == EffectPhase::Blackout {
                ZoneOverride::dark()
            } else {
                ZoneOverride::lit(self.color, level)
            };
            zone_override.movement = self.tremble(core, zone);
            frame = frame.with_zone(zone.clone(), zone_override);
        }
        Ok(frame)
    }
}
