//! Built-in effect policies
//!
//! Each policy is a module with a `META` description, a small state struct
//! implementing [`PolicyBehavior`], and a `create` factory. [`PolicyState`]
//! is the tagged union the engine dispatches over; policies registered from
//! outside the crate ride along in [`PolicyState::External`].

use std::fmt;

use crate::effect::{EffectCore, TriggerConfig};
use crate::error::Result;
use crate::output::FrameOutput;
use crate::registry::{PolicyFactory, PolicyMeta};

pub mod arena_sweep;
pub mod binary_glitch;
pub mod chaos_flicker;
pub mod ghost_breath;
pub mod industrial_strobe;
pub mod machete_spark;
pub mod nuclear_strobe;
pub mod seismic_snap;
pub mod stadium_blinder;
pub mod strobe_storm;

/// Behavior half of a policy
pub trait PolicyBehavior: fmt::Debug + Send {
    /// Initialize state for a fresh run. `core` is already reset: elapsed
    /// time is zero, zones and duration are resolved, phase is idle.
    fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig);

    /// Advance internal phases. `core.elapsed_ms` already includes `delta_ms`.
    fn update(&mut self, core: &mut EffectCore, delta_ms: f32);

    /// Frame for the current state. Only called while the effect is active.
    fn output(&self, core: &EffectCore) -> Result<FrameOutput>;
}

/// Per-instance state of any policy
#[derive(Debug)]
pub enum PolicyState {
    /// See [`nuclear_strobe`]
    NuclearStrobe(nuclear_strobe::NuclearStrobe),
    /// See [`industrial_strobe`]
    IndustrialStrobe(industrial_strobe::IndustrialStrobe),
    /// See [`stadium_blinder`]
    StadiumBlinder(stadium_blinder::StadiumBlinder),
    /// See [`seismic_snap`]
    SeismicSnap(seismic_snap::SeismicSnap),
    /// See [`binary_glitch`]
    BinaryGlitch(binary_glitch::BinaryGlitch),
    /// See [`chaos_flicker`]
    ChaosFlicker(chaos_flicker::ChaosFlicker),
    /// See [`strobe_storm`]
    StrobeStorm(strobe_storm::StrobeStorm),
    /// See [`arena_sweep`]
    ArenaSweep(arena_sweep::ArenaSweep),
    /// See [`ghost_breath`]
    GhostBreath(ghost_breath::GhostBreath),
    /// See [`machete_spark`]
    MacheteSpark(machete_spark::MacheteSpark),
    /// Policy registered from outside this crate
    External(Box<dyn PolicyBehavior>),
}

impl PolicyState {
    fn behavior(&self) -> &dyn PolicyBehavior {
        match self {
            PolicyState::NuclearStrobe(s) => s,
            PolicyState::IndustrialStrobe(s) => s,
            PolicyState::StadiumBlinder(s) => s,
            PolicyState::SeismicSnap(s) => s,
            PolicyState::BinaryGlitch(s) => s,
            PolicyState::ChaosFlicker(s) => s,
            PolicyState::StrobeStorm(s) => s,
            PolicyState::ArenaSweep(s) => s,
            PolicyState::GhostBreath(s) => s,
            PolicyState::MacheteSpark(s) => s,
            PolicyState::External(s) => s.as_ref(),
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn PolicyBehavior {
        match self {
            PolicyState::NuclearStrobe(s) => s,
            PolicyState::IndustrialStrobe(s) => s,
            PolicyState::StadiumBlinder(s) => s,
            PolicyState::SeismicSnap(s) => s,
            PolicyState::BinaryGlitch(s) => s,
            PolicyState::ChaosFlicker(s) => s,
            PolicyState::StrobeStorm(s) => s,
            PolicyState::ArenaSweep(s) => s,
            PolicyState::GhostBreath(s) => s,
            PolicyState::MacheteSpark(s) => s,
            PolicyState::External(s) => s.as_mut(),
        }
    }

    pub(crate) fn trigger(&mut self, core: &mut EffectCore, config: &TriggerConfig) {
        self.behavior_mut().trigger(core, config);
    }

    pub(crate) fn update(&mut self, core: &mut EffectCore, delta_ms: f32) {
        self.behavior_mut().update(core, delta_ms);
    }

    pub(crate) fn output(&self, core: &EffectCore) -> Result<FrameOutput> {
        self.behavior().output(core)
    }
}

/// Every built-in policy with its factory
pub fn builtin() -> Vec<(PolicyMeta, PolicyFactory)> {
    vec![
        (nuclear_strobe::META, nuclear_strobe::create as PolicyFactory),
        (industrial_strobe::META, industrial_strobe::create as PolicyFactory),
        (stadium_blinder::META, stadium_blinder::create as PolicyFactory),
        (seismic_snap::META, seismic_snap::create as PolicyFactory),
        (binary_glitch::META, binary_glitch::create as PolicyFactory),
        (chaos_flicker::META, chaos_flicker::create as PolicyFactory),
        (strobe_storm::META, strobe_storm::create as PolicyFactory),
        (arena_sweep::META, arena_sweep::create as PolicyFactory),
        (ghost_breath::META, ghost_breath::create as PolicyFactory),
        (machete_spark::META, machete_spark::create as PolicyFactory),
    ]
}

/// Shortest lit-plus-dark cycle allowed at `max_hz`, in milliseconds
pub(crate) fn min_cycle_ms(max_hz: f32) -> f32 {
    1000.0 / max_hz.clamp(0.1, crate::config::STROBE_CEILING_HZ)
}
