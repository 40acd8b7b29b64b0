//! Effect scheduler
//!
//! [`EffectEngine`] is an ordinary owned object: build one per show, feed it
//! triggers and frame deltas, and ask it for a composite frame. Nothing in
//! here is global, so several engines can run side by side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::compositor::{CompositeFrame, Compositor, ZoneState};
use crate::config::EngineConfig;
use crate::effect::{Effect, EffectId, TriggerConfig};
use crate::error::{EffectError, Result};
use crate::registry::PolicyRegistry;
use crate::timing::MusicalContext;
use crate::zone::Zone;

/// Something that happened inside the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An effect was triggered or re-triggered
    EffectTriggered {
        /// Effect instance
        id: EffectId,
        /// Policy identifier
        policy: String,
    },
    /// An effect finished, was aborted or completed its release
    EffectFinished {
        /// Effect instance
        id: EffectId,
        /// Policy identifier
        policy: String,
    },
    /// An effect's frame was rejected
    EffectFailed {
        /// Effect instance
        id: EffectId,
        /// Policy identifier
        policy: String,
    },
}

/// Engine counters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Effects currently held
    pub active_effects: usize,
    /// Triggers accepted since the engine was built
    pub total_triggered: u64,
    /// Policy of the latest trigger
    pub last_triggered: Option<String>,
    /// Scheduler timestamp of the latest trigger
    pub last_trigger_ms: Option<u64>,
}

/// Owns the registry and the compositor and runs the show
#[derive(Debug)]
pub struct EffectEngine {
    registry: PolicyRegistry,
    compositor: Compositor,
    config: EngineConfig,
    next_id: EffectId,
    trigger_seq: u64,
    clock_ms: f64,
    stats: EngineStats,
    events: Vec<EngineEvent>,
}

impl EffectEngine {
    /// Create an engine over `registry`
    pub fn new(registry: PolicyRegistry, config: EngineConfig) -> Self {
        info!(
            "Effect engine ready: {} policies, max {} active, strobe ceiling {} Hz",
            registry.len(),
            config.max_active_effects,
            config.strobe_ceiling_hz
        );
        Self {
            compositor: Compositor::new().with_strobe_ceiling(config.strobe_ceiling_hz),
            registry,
            config,
            next_id: 1,
            trigger_seq: 0,
            clock_ms: 0.0,
            stats: EngineStats::default(),
            events: Vec::new(),
        }
    }

    /// Engine with the built-in policies and default settings
    pub fn with_builtin() -> Self {
        Self::new(PolicyRegistry::with_builtin(), EngineConfig::default())
    }

    /// Policy registry
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Mutable policy registry, for registering external policies
    pub fn registry_mut(&mut self) -> &mut PolicyRegistry {
        &mut self.registry
    }

    /// Active settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Time accumulated through [`EffectEngine::update`]
    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    /// Start a new instance of `policy_id`
    pub fn trigger(&mut self, policy_id: &str, config: &TriggerConfig) -> Result<EffectId> {
        self.reap();
        if self.compositor.len() >= self.config.max_active_effects {
            warn!(
                "Refusing to trigger {}: {} effects already active",
                policy_id,
                self.compositor.len()
            );
            return Err(EffectError::CapacityExceeded(self.config.max_active_effects));
        }

        let id = self.next_id;
        let mut effect = self.registry.instantiate(policy_id, id)?;
        self.next_id += 1;

        let config = self.prepare(config);
        effect.trigger(&config);
        self.trigger_seq += 1;
        self.compositor.add_effect(effect, self.trigger_seq);
        self.record_trigger(id, policy_id, &config);
        Ok(id)
    }

    /// Restart a held effect from scratch
    pub fn retrigger(&mut self, id: EffectId, config: &TriggerConfig) -> Result<()> {
        let config = self.prepare(config);
        let effect = self
            .compositor
            .get_effect_mut(id)
            .ok_or(EffectError::EffectNotFound(id))?;
        effect.trigger(&config);
        let policy = effect.policy_id();

        self.trigger_seq += 1;
        self.compositor.set_trigger_seq(id, self.trigger_seq);
        self.record_trigger(id, policy, &config);
        Ok(())
    }

    /// Advance every effect by `delta_ms` and drop the finished ones
    pub fn update(&mut self, delta_ms: f32) {
        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.clock_ms += f64::from(delta_ms);
        }
        self.compositor.update(delta_ms);
        self.reap();
    }

    /// Merge the active effects over `baseline`
    pub fn render(&mut self, baseline: &BTreeMap<Zone, ZoneState>) -> CompositeFrame {
        let frame = self.compositor.render(baseline);
        for &id in &frame.failed {
            let policy = self
                .compositor
                .get_effect(id)
                .map(|e| e.policy_id().to_string())
                .unwrap_or_default();
            self.events.push(EngineEvent::EffectFailed { id, policy });
        }
        frame
    }

    /// `update` followed by `render`
    pub fn tick(&mut self, delta_ms: f32, baseline: &BTreeMap<Zone, ZoneState>) -> CompositeFrame {
        self.update(delta_ms);
        self.render(baseline)
    }

    /// Stop an effect now. Returns false when no such effect is held.
    pub fn abort(&mut self, id: EffectId) -> bool {
        match self.compositor.remove_effect(id) {
            Some(mut effect) => {
                effect.abort();
                self.finished(&effect);
                true
            }
            None => false,
        }
    }

    /// Stop every effect now
    pub fn abort_all(&mut self) {
        let drained = self.compositor.clear();
        if !drained.is_empty() {
            info!("Aborted {} active effects", drained.len());
        }
        for effect in &drained {
            self.finished(effect);
        }
    }

    /// Fade an effect out over `fade_ms`
    pub fn release(&mut self, id: EffectId, fade_ms: f32) -> Result<()> {
        self.compositor
            .get_effect_mut(id)
            .ok_or(EffectError::EffectNotFound(id))?
            .release(fade_ms);
        Ok(())
    }

    /// Fade every effect out over the configured release time
    pub fn release_all(&mut self) {
        let fade_ms = self.config.default_release_ms;
        let ids: Vec<EffectId> = self.compositor.effects().map(Effect::id).collect();
        for id in ids {
            if let Some(effect) = self.compositor.get_effect_mut(id) {
                effect.release(fade_ms);
            }
        }
    }

    /// A held effect
    pub fn effect(&self, id: EffectId) -> Option<&Effect> {
        self.compositor.get_effect(id)
    }

    /// All held effects
    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.compositor.effects()
    }

    /// Number of held effects
    pub fn active_count(&self) -> usize {
        self.compositor.len()
    }

    /// Counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            active_effects: self.compositor.len(),
            ..self.stats.clone()
        }
    }

    /// Take every event recorded since the last call
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fill in the engine-wide defaults a trigger left out
    fn prepare(&self, config: &TriggerConfig) -> TriggerConfig {
        let mut config = config.clone();
        if config.musical_context.is_none() {
            config.musical_context = self.config.default_bpm.map(MusicalContext::with_bpm);
        }
        let ceiling = self.config.strobe_ceiling_hz;
        for (name, value) in config.params.iter_mut() {
            if name.ends_with("_hz") && *value > ceiling {
                warn!("Trigger field {} = {} above {} Hz, clamping", name, value, ceiling);
                *value = ceiling;
            }
        }
        config
    }

    fn record_trigger(&mut self, id: EffectId, policy: &str, config: &TriggerConfig) {
        self.stats.total_triggered += 1;
        self.stats.last_triggered = Some(policy.to_string());
        self.stats.last_trigger_ms = Some(config.timestamp_ms);
        if let Some(reason) = &config.reason {
            debug!("Trigger {} for {}: {}", id, policy, reason);
        }
        self.events.push(EngineEvent::EffectTriggered {
            id,
            policy: policy.to_string(),
        });
    }

    fn reap(&mut self) {
        for effect in self.compositor.reap_finished() {
            self.finished(&effect);
        }
    }

    fn finished(&mut self, effect: &Effect) {
        self.events.push(EngineEvent::EffectFinished {
            id: effect.id(),
            policy: effect.policy_id().to_string(),
        });
    }
}
