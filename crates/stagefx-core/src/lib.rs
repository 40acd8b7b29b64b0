//! StageFX Core - Effect Merge Engine
//!
//! This crate contains the real-time core of the lighting effect engine:
//! - Effect lifecycle and the forward-only phase machine
//! - Zone overrides and per-frame effect output
//! - Bus-priority compositing over an upstream baseline
//! - Policy registry and the built-in effect policies
//! - Deterministic pseudo-random numbers and tempo math
//! - Bus inference for authored effects

#![warn(missing_docs)]

pub mod classify;
pub mod color;
pub mod compositor;
pub mod config;
pub mod cue;
pub mod effect;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod policies;
pub mod prng;
pub mod registry;
pub mod timing;
pub mod zone;

// --- Re-exports grouped by category ---

// Effects
pub use effect::{
    Effect, EffectCategory, EffectCore, EffectId, EffectPhase, MixBus, TriggerConfig,
    TriggerSource,
};
pub use output::{BlendMode, FrameOutput, Movement, ZoneOverride};
pub use policies::{PolicyBehavior, PolicyState};
pub use registry::{PolicyFactory, PolicyMeta, PolicyRegistry};

// Compositing & Scheduling
pub use compositor::{CompositeFrame, Compositor, Contribution, ZoneState};
pub use engine::{EffectEngine, EngineEvent, EngineStats};

// Primitives
pub use color::Hsl;
pub use timing::{DurationPolicy, MusicalContext};
pub use zone::Zone;

// Authoring
pub use classify::{infer_mix_bus, Classification, ClassificationRule, EffectDescriptor, EnergyZone};
pub use cue::{Cue, CueSheet};

// Configuration & Errors
pub use config::{EngineConfig, STROBE_CEILING_HZ};
pub use error::{EffectError, Result};
pub use logging::LogConfig;
