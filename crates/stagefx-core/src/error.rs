//! Error types for the effect engine
use thiserror::Error;

use crate::effect::EffectId;

/// Effect engine errors
#[derive(Error, Debug)]
pub enum EffectError {
    /// No policy registered under this identifier
    #[error("Unknown effect policy: {0}")]
    UnknownPolicy(String),

    /// A policy with this identifier is already registered
    #[error("Effect policy already registered: {0}")]
    DuplicatePolicy(String),

    /// No active effect with this id
    #[error("Effect not found: {0}")]
    EffectNotFound(EffectId),

    /// The engine already runs its maximum number of effects
    #[error("Active effect limit reached ({0})")]
    CapacityExceeded(usize),

    /// An effect produced a frame that cannot be composited
    #[error("Invalid output from effect {effect_id}: {reason}")]
    InvalidOutput {
        /// Offending effect
        effect_id: EffectId,
        /// What was wrong with the frame
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// RON deserialization error
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for effect engine operations
pub type Result<T> = std::result::Result<T, EffectError>;
