//! Chaos flicker: a jittery ~10 Hz flicker in a toxic palette, with the odd
//! frozen flash.
//!
//! The whole on/off schedule is drawn once at trigger time from a generator
//! seeded with the trigger timestamp; colors are picked per zone and per
//! flash from the seeded hash. Nothing here reads a clock.

use super::{min_cycle_ms, PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{FrameOutput, ZoneOverride};
use crate::prng::{effect_seed, seeded_random, timestamp_seed, Xorshift32};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "chaos_flicker",
    display_name: "Chaos Flicker",
    category: EffectCategory::Physical,
    priority: 88,
    mix_bus: MixBus::Global,
    default_zones: &[Zone::FRONT, Zone::PARS, Zone::BACK, Zone::ALL_MOVERS],
    duration: DurationPolicy::fixed(1400.0, 1400.0),
    has_strobe: true,
    energy_zone: Some(EnergyZone::Intense),
    tags: &["glitch", "flicker", "latin"],
};

const SALT: u32 = 0xc4a0_5001;
const COLOR_SALT: u32 = 0xc4a0_5002;
const BASE_HZ: f32 = 10.0;
const MAX_HZ: f32 = 12.0;
const JITTER: f32 = 0.4;
const FREEZE_CHANCE: f32 = 0.08;
const FREEZE_MS: f32 = 100.0;
const DEFAULT_CHAOS: f32 = 0.7;

const TOXIC_PALETTE: [Hsl; 4] = [
    Hsl::new(90.0, 100.0, 50.0),
    Hsl::new(300.0, 100.0, 55.0),
    Hsl::new(275.0, 100.0, 45.0),
    Hsl::new(180.0, 100.0, 50.0),
];
const MOVER_MAGENTA: Hsl = Hsl::new(300.0, 100.0, 55.0);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start_ms: f32,
    len_ms: f32,
    lit: bool,
}

/// Per-instance state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaosFlicker {
    schedule: Vec<Segment>,
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::ChaosFlicker(ChaosFlicker::default())
}

impl ChaosFlicker {
    fn build_schedule(timestamp_ms: u64, duration_ms: f32, chaos: f32) -> Vec<Segment> {
        let mut rng = Xorshift32::new(timestamp_seed(timestamp_ms) ^ SALT);
        let min_cycle = min_cycle_ms(MAX_HZ);
        let base_cycle = 1000.0 / BASE_HZ;
        let mut schedule = Vec::new();
        let mut t = 0.0;

        while t < duration_ms {
            let (lit_ms, dark_ms) = if rng.next_f32() < FREEZE_CHANCE {
                (FREEZE_MS, min_cycle / 2.0)
            } else {
                let cycle = (base_cycle * (1.0 + JITTER * chaos * rng.range(-1.0, 1.0))).max(min_cycle);
                (cycle / 2.0, cycle / 2.0)
            };
            schedule.push(Segment {
                start_ms: t,
                len_ms: lit_ms,
                lit: true,
            });
            schedule.push(Segment {
                start_ms: t + lit_ms,
                len_ms: dark_ms,
                lit: false,
            });
            t += lit_ms + dark_ms;
        }
        schedule
    }

    /// Index of the segment covering `elapsed_ms`
    fn segment_at(&self, elapsed_ms: f32) -> Option<(usize, &Segment)> {
        let idx = self
            .schedule
            .partition_point(|s| s.start_ms + s.len_ms <= elapsed_ms);
        self.schedule.get(idx).map(|s| (idx, s))
    }

    fn zone_color(&self, zone: &Zone, flash: usize) -> Hsl {
        if zone.is_movers() {
            return MOVER_MAGENTA;
        }
        let r = seeded_random(effect_seed(COLOR_SALT, flash as u32, Some(zone)));
        TOXIC_PALETTE[((r * TOXIC_PALETTE.len() as f32) as usize).min(TOXIC_PALETTE.len() - 1)]
    }
}

impl PolicyBehavior for ChaosFlicker {
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        let chaos = config.param("chaos").unwrap_or(DEFAULT_CHAOS).clamp(0.0, 1.0);
        self.schedule = Self::build_schedule(core.timestamp_ms, core.duration_ms, chaos);
        core.enter(EffectPhase::Burst);
    }

    fn update(&mut self, _core: &mut EffectCore, _delta_ms: f32) {}

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let lit = self.segment_at(core.elapsed_ms).filter(|(_, s)| s.lit);
        let mut frame = core.frame(if lit.is_some() { core.intensity } else { 0.0 });
        frame.strobe_rate = Some(MAX_HZ);

        for zone in &core.zones {
            let zone_override = match lit {
                Some((idx, _)) => ZoneOverride::lit(self.zone_color(zone, idx / 2), core.intensity),
                None => ZoneOverride::dark(),
            };
            frame = frame.with_zone(zone.clone(), zone_override);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_covers_duration_and_alternates() {
        let schedule = ChaosFlicker::build_schedule(12_345, 1400.0, 1.0);
        let last = schedule.last().unwrap();
        assert!(last.start_ms + last.len_ms >= 1400.0);
        for pair in schedule.windows(2) {
            assert_ne!(pair[0].lit, pair[1].lit);
            assert!((pair[0].start_ms + pair[0].len_ms - pair[1].start_ms).abs() < 1e-3);
        }
    }

    #[test]
    fn test_cycles_never_exceed_rate_cap() {
        for ts in [0, 7, 99_999, 1_700_000_123_456] {
            let schedule = ChaosFlicker::build_schedule(ts, 1400.0, 1.0);
            for pair in schedule.chunks(2) {
                let cycle: f32 = pair.iter().map(|s| s.len_ms).sum();
                assert!(cycle >= min_cycle_ms(MAX_HZ) - 1e-3);
            }
        }
    }

    #[test]
    fn test_same_timestamp_same_schedule() {
        assert_eq!(
            ChaosFlicker::build_schedule(42, 1400.0, 0.7),
            ChaosFlicker::build_schedule(42, 1400.0, 0.7)
        );
    }

    #[test]
    fn test_movers_stay_magenta() {
        let flicker = ChaosFlicker::default();
        assert_eq!(flicker.zone_color(&Zone::ALL_MOVERS, 3), MOVER_MAGENTA);
    }
}
