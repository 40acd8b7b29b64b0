//! Arena sweep: movers swing side to side in big tempo-locked arcs while the
//! washes add a warm fill.
//!
//! Four sweeps of four beats each; the direction flips every sweep. The
//! mover pan follows its target with inertia, so the result depends on the
//! frame deltas, and identical delta sequences give identical motion.

use std::f32::consts::PI;

use super::{PolicyBehavior, PolicyState};
use crate::classify::EnergyZone;
use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectCore, EffectPhase, MixBus, TriggerConfig};
use crate::error::Result;
use crate::output::{FrameOutput, Movement, ZoneOverride};
use crate::registry::PolicyMeta;
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Policy description
pub const META: PolicyMeta = PolicyMeta {
    id: "arena_sweep",
    display_name: "Arena Sweep",
    category: EffectCategory::Movement,
    priority: 70,
    mix_bus: MixBus::Htp,
    default_zones: &[Zone::MOVERS_LEFT, Zone::MOVERS_RIGHT, Zone::BACK, Zone::FRONT],
    duration: DurationPolicy::synced(16.0, 8000.0, 16_000.0),
    has_strobe: false,
    energy_zone: Some(EnergyZone::Active),
    tags: &["sweep", "movement", "rock"],
};

const SWEEPS: u32 = 4;
const PAN_AMPLITUDE: f32 = 0.6;
const TILT_OFFSET: f32 = -0.15;
const MOVER_SPEED: f32 = 0.5;
const INERTIA: f32 = 0.85;
const INERTIA_FRAME_MS: f32 = 16.0;
const BASE_INTENSITY: f32 = 0.85;
const EDGE_FADE: f32 = 0.1;

const AMBER: Hsl = Hsl::new(35.0, 60.0, 60.0);
const WARM_WHITE: Hsl = Hsl::new(40.0, 10.0, 85.0);

/// Per-instance state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArenaSweep {
    pan: f32,
    sweep: u32,
}

/// Factory
pub fn create() -> PolicyState {
    PolicyState::ArenaSweep(ArenaSweep::default())
}

impl ArenaSweep {
    /// Current smoothed pan `[-0.6, 0.6]`
    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Index of the sweep in progress
    pub fn sweep(&self) -> u32 {
        self.sweep
    }

    fn target_pan(core: &EffectCore) -> (u32, f32) {
        let sweep_ms = core.duration_ms / SWEEPS as f32;
        let sweep = ((core.elapsed_ms / sweep_ms) as u32).min(SWEEPS - 1);
        let direction = if sweep % 2 == 0 { 1.0 } else { -1.0 };
        let phase = ((core.elapsed_ms - sweep as f32 * sweep_ms) / sweep_ms).clamp(0.0, 1.0);
        (sweep, (phase * PI).sin() * direction * PAN_AMPLITUDE)
    }

    /// Square-root fade over the first and last tenth of the run
    fn edge_envelope(progress: f32) -> f32 {
        if progress < EDGE_FADE {
            (progress / EDGE_FADE).sqrt()
        } else if progress > 1.0 - EDGE_FADE {
            ((1.0 - progress) / EDGE_FADE).max(0.0).sqrt()
        } else {
            1.0
        }
    }
}

impl PolicyBehavior for ArenaSweep {
    fn trigger(&mut self, core: &mut EffectCore, _config: &TriggerConfig) {
        self.pan = 0.0;
        self.sweep = 0;
        core.enter(EffectPhase::Sweep);
    }

    fn update(&mut self, core: &mut EffectCore, delta_ms: f32) {
        let (sweep, target) = Self::target_pan(core);
        let follow = 1.0 - INERTIA.powf(delta_ms / INERTIA_FRAME_MS);
        self.pan += (target - self.pan) * follow;
        self.sweep = sweep;
    }

    fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        let level = BASE_INTENSITY * core.intensity * Self::edge_envelope(core.progress());
        let extreme = (self.pan.abs() / PAN_AMPLITUDE).clamp(0.0, 1.0);

        let mut frame = core.frame(level);
        for zone in &core.zones {
            let zone_override = match zone.name() {
                "movers_left" => ZoneOverride::lit(WARM_WHITE, level).with_movement(
                    Movement::relative(self.pan, TILT_OFFSET).with_speed(MOVER_SPEED),
                ),
                "movers_right" => ZoneOverride::lit(WARM_WHITE, level).with_movement(
                    Movement::relative(-self.pan, TILT_OFFSET).with_speed(MOVER_SPEED),
                ),
                "back" => ZoneOverride::lit(AMBER, level * (0.3 + extreme * 0.3))
                    .with_amber(level * extreme),
                _ => ZoneOverride::lit(WARM_WHITE, level * 0.2),
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
    fn test_duration_from_tempo() {
        let mut sweep = PolicyRegistry::with_builtin()
            .instantiate("arena_sweep", 1)
            .unwrap();
        sweep.trigger(&TriggerConfig::new(1.0).with_bpm(120.0));
        assert_eq!(sweep.duration_ms(), 8000.0);
        sweep.trigger(&TriggerConfig::new(1.0).with_bpm(50.0));
        assert_eq!(sweep.duration_ms(), 16_000.0);
    }

    #[test]
    fn test_direction_flips_each_sweep() {
        let mut sweep = PolicyRegistry::with_builtin()
            .instantiate("arena_sweep", 1)
            .unwrap();
        sweep.trigger(&TriggerConfig::new(1.0));

        // Mid first sweep: pan heads positive
        for _ in 0..60 {
            sweep.update(16.0);
        }
        let first = sweep.output().unwrap().unwrap();
        let left = first.zone_overrides[&Zone::MOVERS_LEFT].movement.unwrap();
        assert!(left.pan > 0.3);
        assert!(!left.is_absolute);

        // Mid second sweep: pan heads negative
        for _ in 0..125 {
            sweep.update(16.0);
        }
        let second = sweep.output().unwrap().unwrap();
        let left = second.zone_overrides[&Zone::MOVERS_LEFT].movement.unwrap();
        let right = second.zone_overrides[&Zone::MOVERS_RIGHT].movement.unwrap();
        assert!(left.pan < -0.3);
        assert_eq!(right.pan, -left.pan);
    }

    #[test]
    fn test_edges_fade() {
        assert_eq!(ArenaSweep::edge_envelope(0.0), 0.0);
        assert_eq!(ArenaSweep::edge_envelope(0.5), 1.0);
        assert!((ArenaSweep::edge_envelope(0.95) - 0.5f32.sqrt()).abs() < 1e-3);
    }
}
