//! Cue sheets
//!
//! A cue sheet is a timed list of triggers plus the upstream baseline the
//! effects are merged over. It stands in for the timeline and the physics
//! layer when the engine runs headless.
//!
//! ```toml
//! [[cues]]
//! at_ms = 0
//! policy = "arena_sweep"
//! trigger = { intensity = 0.8, musical_context = { bpm = 128.0 } }
//!
//! [baseline.front]
//! color = { h = 30.0, s = 40.0, l = 50.0 }
//! dimmer = 0.3
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::compositor::ZoneState;
use crate::effect::TriggerConfig;
use crate::error::{EffectError, Result};
use crate::registry::PolicyRegistry;
use crate::zone::Zone;

/// One scheduled trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Show time of the trigger
    pub at_ms: u64,
    /// Policy to trigger
    pub policy: String,
    /// Trigger parameters; `timestamp_ms` defaults to `at_ms`
    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl Cue {
    /// Trigger config with the timestamp filled in
    pub fn trigger_config(&self) -> TriggerConfig {
        let mut config = self.trigger.clone();
        if config.timestamp_ms == 0 {
            config.timestamp_ms = self.at_ms;
        }
        config
    }
}

/// Timed triggers plus a baseline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CueSheet {
    /// Triggers, kept sorted by `at_ms`
    #[serde(default)]
    pub cues: Vec<Cue>,
    /// Upstream state per zone
    #[serde(default)]
    pub baseline: BTreeMap<Zone, ZoneState>,
}

impl CueSheet {
    /// Parse TOML
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(Self::sorted(toml::from_str(text)?))
    }

    /// Parse RON
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Ok(Self::sorted(ron::from_str(text)?))
    }

    /// Parse JSON
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(Self::sorted(serde_json::from_str(text)?))
    }

    /// Load a cue sheet, picking the format from the file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("ron") => Self::from_ron_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(EffectError::InvalidConfig(format!(
                "unsupported cue sheet format: {:?}",
                other.unwrap_or("")
            ))),
        }
    }

    fn sorted(mut sheet: CueSheet) -> CueSheet {
        sheet.cues.sort_by_key(|c| c.at_ms);
        sheet
    }

    /// Check every cue names a registered policy
    pub fn validate(&self, registry: &PolicyRegistry) -> Result<()> {
        match self.cues.iter().find(|c| !registry.contains(&c.policy)) {
            Some(cue) => Err(EffectError::UnknownPolicy(cue.policy.clone())),
            None => Ok(()),
        }
    }

    /// Cues with `from_ms <= at_ms < to_ms`
    pub fn due(&self, from_ms: u64, to_ms: u64) -> impl Iterator<Item = &Cue> {
        self.cues
            .iter()
            .filter(move |c| c.at_ms >= from_ms && c.at_ms < to_ms)
    }

    /// Time of the last cue
    pub fn last_cue_ms(&self) -> u64 {
        self.cues.last().map_or(0, |c| c.at_ms)
    }
}
