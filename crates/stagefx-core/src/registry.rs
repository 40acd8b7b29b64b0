//! Policy registry
//!
//! Maps a policy identifier to its static description and a factory for
//! fresh per-instance state. Registries are plain owned values: a show
//! builds one (usually via [`PolicyRegistry::with_builtin`]) and hands it to
//! its engine.

use std::collections::BTreeMap;
use tracing::debug;

use crate::classify::{EffectDescriptor, EnergyZone};
use crate::effect::{Effect, EffectCategory, EffectId, MixBus};
use crate::error::{EffectError, Result};
use crate::policies::{self, PolicyState};
use crate::timing::DurationPolicy;
use crate::zone::Zone;

/// Builds fresh per-instance policy state
pub type PolicyFactory = fn() -> PolicyState;

/// Static description of a policy
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyMeta {
    /// Stable identifier used to trigger the policy
    pub id: &'static str,
    /// Human readable name
    pub display_name: &'static str,
    /// Broad family
    pub category: EffectCategory,
    /// Tie-break weight `0..=100`
    pub priority: u8,
    /// Arbitration lane
    pub mix_bus: MixBus,
    /// Zones addressed when the trigger names none
    pub default_zones: &'static [Zone],
    /// Duration rules
    pub duration: DurationPolicy,
    /// True for binary on/off policies, which are held to the strobe ceiling
    pub has_strobe: bool,
    /// Energy zone the policy was authored for
    pub energy_zone: Option<EnergyZone>,
    /// Free-form tags
    pub tags: &'static [&'static str],
}

impl PolicyMeta {
    /// Authoring-side description, as fed to the bus classifier
    pub fn descriptor(&self) -> EffectDescriptor {
        EffectDescriptor {
            id: self.id.to_string(),
            display_name: self.display_name.to_string(),
            energy_zone: self.energy_zone,
            has_strobe: self.has_strobe,
            is_dynamic: self.duration.beats.is_some(),
            suggested_duration_ms: Some(self.duration.default_ms),
            mix_bus: Some(self.mix_bus),
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct PolicyEntry {
    meta: PolicyMeta,
    factory: PolicyFactory,
}

/// Registry of available policies
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    entries: BTreeMap<&'static str, PolicyEntry>,
}

impl PolicyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in policy
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (meta, factory) in policies::builtin() {
            registry.entries.insert(meta.id, PolicyEntry { meta, factory });
        }
        registry
    }

    /// Register a policy. Identifiers must be unique.
    pub fn register(&mut self, meta: PolicyMeta, factory: PolicyFactory) -> Result<()> {
        if self.entries.contains_key(meta.id) {
            return Err(EffectError::DuplicatePolicy(meta.id.to_string()));
        }
        if meta.priority > 100 {
            return Err(EffectError::InvalidConfig(format!(
                "priority {} of '{}' exceeds 100",
                meta.priority, meta.id
            )));
        }
        let ceiling = meta.duration.ceiling_ms;
        if !ceiling.is_finite() || ceiling <= 0.0 {
            return Err(EffectError::InvalidConfig(format!(
                "'{}' needs a positive duration ceiling",
                meta.id
            )));
        }
        debug!("Registered effect policy '{}' on {} bus", meta.id, meta.mix_bus);
        self.entries.insert(meta.id, PolicyEntry { meta, factory });
        Ok(())
    }

    /// Look up a policy description
    pub fn get(&self, id: &str) -> Option<&PolicyMeta> {
        self.entries.get(id).map(|entry| &entry.meta)
    }

    /// Check if a policy is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All registered policies, ordered by identifier
    pub fn available(&self) -> impl Iterator<Item = &PolicyMeta> {
        self.entries.values().map(|entry| &entry.meta)
    }

    /// Number of registered policies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create an idle instance of a policy
    pub fn instantiate(&self, id: &str, effect_id: EffectId) -> Result<Effect> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| EffectError::UnknownPolicy(id.to_string()))?;
        Ok(Effect::new(effect_id, entry.meta.clone(), entry.factory))
    }
}
