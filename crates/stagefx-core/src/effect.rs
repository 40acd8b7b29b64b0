//! Effect lifecycle
//!
//! An [`Effect`] is one running instance of a policy. The instance owns the
//! shared bookkeeping ([`EffectCore`]: phase, elapsed time, resolved zones
//! and duration) and a per-policy state struct; the policy itself only ever
//! sees those two through the [`PolicyBehavior`](crate::policies::PolicyBehavior) trait.
//!
//! Lifecycle: `trigger` → `update`/`output` once per frame → `finished`,
//! either on its own, after a `release` fade, or via `abort`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::output::{FrameOutput, ZoneOverride};
use crate::policies::PolicyState;
use crate::registry::{PolicyFactory, PolicyMeta};
use crate::timing::MusicalContext;
use crate::zone::Zone;

/// Unique identifier of an effect instance
pub type EffectId = u64;

/// Broad family of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EffectCategory {
    /// Intensity and strobing
    #[default]
    Physical,
    /// Color washes
    Color,
    /// Pan/tilt movement
    Movement,
}

/// Phase of an effect.
///
/// Variants are declared in the one order every policy walks through them;
/// a policy uses a subset, and [`EffectCore::enter`] refuses to go back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectPhase {
    /// Never triggered
    #[default]
    Idle,
    /// Darkness before a hit
    PreDuck,
    /// Blackout before an impact
    Blackout,
    /// Ramping up
    Attack,
    /// Impact flash
    Snap,
    /// Rumble after an impact
    Shake,
    /// Repeating flashes or cuts
    Burst,
    /// Repeating movement cycles
    Sweep,
    /// Slow breathing cycles
    Breathe,
    /// Holding level
    Sustain,
    /// Ramping down
    Decay,
    /// Fading out
    Fade,
    /// Done; produces no output
    Finished,
}

impl EffectPhase {
    /// True while the effect produces output
    pub fn is_active(&self) -> bool {
        !matches!(self, EffectPhase::Idle | EffectPhase::Finished)
    }
}

/// Arbitration lane an effect competes in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixBus {
    /// Dictator: the winner replaces the zone outright
    Global,
    /// Highest-takes-precedence foreground layer
    Htp,
    /// Background atmosphere
    Ambient,
    /// Short detail hits
    Accent,
}

impl MixBus {
    /// Additive buses in evaluation order
    pub const ADDITIVE: [MixBus; 3] = [MixBus::Htp, MixBus::Ambient, MixBus::Accent];

    /// List all buses
    pub fn all() -> &'static [MixBus] {
        &[MixBus::Global, MixBus::Htp, MixBus::Ambient, MixBus::Accent]
    }

    /// Timeline track that hosts clips of this bus
    pub fn track_id(&self) -> &'static str {
        match self {
            MixBus::Global => "fx1",
            MixBus::Htp => "fx2",
            MixBus::Ambient => "fx3",
            MixBus::Accent => "fx4",
        }
    }

    /// True for the channel-wise max buses
    pub fn is_additive(&self) -> bool {
        !matches!(self, MixBus::Global)
    }
}

impl std::fmt::Display for MixBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MixBus::Global => "global",
            MixBus::Htp => "htp",
            MixBus::Ambient => "ambient",
            MixBus::Accent => "accent",
        };
        f.pad(name)
    }
}

/// Who asked for the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Audio-reactive hunt decided this is the moment
    HuntStrike,
    /// Predicted upcoming musical event
    Prediction,
    /// Operator pad or timeline clip
    #[default]
    Manual,
    /// Automated physics layer
    Physics,
    /// Vibe/genre rules
    Vibe,
}

/// Trigger parameters, consumed once by [`Effect::trigger`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Overall intensity `[0, 1]`
    pub intensity: f32,
    /// Zones to address; the policy default is used when absent
    #[serde(default)]
    pub zones: Option<Vec<Zone>>,
    /// Who triggered
    #[serde(default)]
    pub source: TriggerSource,
    /// Free-form reason for logs
    #[serde(default)]
    pub reason: Option<String>,
    /// Tempo and energy at trigger time
    #[serde(default)]
    pub musical_context: Option<MusicalContext>,
    /// Trigger timestamp supplied by the scheduler, in milliseconds
    #[serde(default)]
    pub timestamp_ms: u64,
    /// Policy-specific numeric fields
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl TriggerConfig {
    /// Config with the given intensity and everything else defaulted
    pub fn new(intensity: f32) -> Self {
        Self {
            intensity,
            zones: None,
            source: TriggerSource::default(),
            reason: None,
            musical_context: None,
            timestamp_ms: 0,
            params: BTreeMap::new(),
        }
    }

    /// Address explicit zones
    pub fn with_zones(mut self, zones: impl IntoIterator<Item = Zone>) -> Self {
        self.zones = Some(zones.into_iter().collect());
        self
    }

    /// Attach a tempo
    pub fn with_bpm(mut self, bpm: f32) -> Self {
        self.musical_context = Some(MusicalContext::with_bpm(bpm));
        self
    }

    /// Attach a full musical context
    pub fn with_context(mut self, context: MusicalContext) -> Self {
        self.musical_context = Some(context);
        self
    }

    /// Set the trigger source
    pub fn with_source(mut self, source: TriggerSource) -> Self {
        self.source = source;
        self
    }

    /// Set the trigger timestamp
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// Set a policy-specific field
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Read a policy-specific field, ignoring non-finite values
    pub fn param(&self, name: &str) -> Option<f32> {
        self.params.get(name).copied().filter(|v| v.is_finite())
    }
}

/// Bookkeeping shared by every policy
#[derive(Debug, Clone, PartialEq)]
pub struct EffectCore {
    /// Instance id
    pub id: EffectId,
    /// Category of the owning policy
    pub category: EffectCategory,
    /// Current phase
    pub phase: EffectPhase,
    /// Time since trigger
    pub elapsed_ms: f32,
    /// Resolved total duration
    pub duration_ms: f32,
    /// Hard ceiling the duration may never exceed
    pub ceiling_ms: f32,
    /// Trigger intensity `[0, 1]`
    pub intensity: f32,
    /// Zones resolved at trigger time
    pub zones: Vec<Zone>,
    /// Musical context captured at trigger time
    pub musical_context: Option<MusicalContext>,
    /// Scheduler timestamp of the trigger
    pub timestamp_ms: u64,
}

impl EffectCore {
    fn new(id: EffectId, meta: &PolicyMeta) -> Self {
        Self {
            id,
            category: meta.category,
            phase: EffectPhase::Idle,
            elapsed_ms: 0.0,
            duration_ms: meta.duration.default_ms,
            ceiling_ms: meta.duration.ceiling_ms,
            intensity: 0.0,
            zones: meta.default_zones.to_vec(),
            musical_context: None,
            timestamp_ms: 0,
        }
    }

    fn reset(&mut self, meta: &PolicyMeta, config: &TriggerConfig) {
        self.phase = EffectPhase::Idle;
        self.elapsed_ms = 0.0;
        self.ceiling_ms = meta.duration.ceiling_ms;
        self.duration_ms = meta.duration.resolve(config.musical_context.as_ref());
        self.intensity = if config.intensity.is_finite() {
            config.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.zones = match &config.zones {
            Some(zones) if !zones.is_empty() => zones.clone(),
            _ => meta.default_zones.to_vec(),
        };
        self.musical_context = config.musical_context;
        self.timestamp_ms = config.timestamp_ms;
    }

    /// Move forward to `phase`; moving backwards is ignored
    pub fn enter(&mut self, phase: EffectPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }

    /// Jump straight to `finished`
    pub fn finish(&mut self) {
        self.phase = EffectPhase::Finished;
    }

    /// Replace the resolved duration, still bounded by the ceiling
    pub fn set_duration(&mut self, duration_ms: f32) {
        if duration_ms.is_finite() && duration_ms > 0.0 {
            self.duration_ms = duration_ms.min(self.ceiling_ms);
        }
    }

    /// Progress through the resolved duration `[0, 1]`
    pub fn progress(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
    }

    /// Empty frame stamped with this effect's id, phase and progress
    pub fn frame(&self, intensity: f32) -> FrameOutput {
        FrameOutput::new(self.id, self.category, self.phase).with_progress(self.progress(), intensity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Release {
    started_ms: f32,
    fade_ms: f32,
    /// Output factor when this fade began
    from: f32,
}

impl Release {
    fn factor(&self, elapsed_ms: f32) -> f32 {
        let p = ((elapsed_ms - self.started_ms) / self.fade_ms).clamp(0.0, 1.0);
        self.from * (1.0 - p * p)
    }

    fn remaining_ms(&self, elapsed_ms: f32) -> f32 {
        (self.fade_ms - (elapsed_ms - self.started_ms)).max(0.0)
    }
}

/// One running instance of a policy
#[derive(Debug)]
pub struct Effect {
    meta: PolicyMeta,
    factory: PolicyFactory,
    core: EffectCore,
    state: PolicyState,
    release: Option<Release>,
}

impl Effect {
    /// Create an idle instance
    pub fn new(id: EffectId, meta: PolicyMeta, factory: PolicyFactory) -> Self {
        let core = EffectCore::new(id, &meta);
        Self {
            state: factory(),
            meta,
            factory,
            core,
            release: None,
        }
    }

    /// Start (or restart) the effect.
    ///
    /// Re-triggering throws away all previous state; the two runs never blend.
    pub fn trigger(&mut self, config: &TriggerConfig) {
        self.state = (self.factory)();
        self.release = None;
        self.core.reset(&self.meta, config);
        self.state.trigger(&mut self.core, config);
        if self.core.phase == EffectPhase::Idle {
            self.core.phase = EffectPhase::Sustain;
        }
        debug!(
            "Effect {} ({}) triggered: intensity={:.2} duration={:.0}ms zones={:?} source={:?}",
            self.core.id,
            self.meta.id,
            self.core.intensity,
            self.core.duration_ms,
            self.core.zones,
            config.source
        );
    }

    /// Advance by `delta_ms`.
    ///
    /// Zero, negative and non-finite deltas are ignored, as is any call while
    /// idle or finished. A long frame finishes the effect on that frame, so
    /// the overshoot past the duration is at most one delta.
    pub fn update(&mut self, delta_ms: f32) {
        if !delta_ms.is_finite() || delta_ms <= 0.0 || !self.core.phase.is_active() {
            return;
        }

        self.core.elapsed_ms += delta_ms;
        self.state.update(&mut self.core, delta_ms);

        if let Some(release) = self.release {
            if self.core.elapsed_ms - release.started_ms >= release.fade_ms {
                self.core.finish();
            }
        }
        if self.core.elapsed_ms >= self.core.duration_ms {
            self.core.finish();
        }
        if self.core.phase == EffectPhase::Finished {
            debug!(
                "Effect {} ({}) finished after {:.0}ms",
                self.core.id, self.meta.id, self.core.elapsed_ms
            );
        }
    }

    /// Frame for the current state, `None` while idle or finished.
    ///
    /// Global-bus effects always address every zone they control: zones the
    /// policy left out are painted with an explicit zero dimmer.
    pub fn output(&self) -> Result<Option<FrameOutput>> {
        if !self.core.phase.is_active() {
            return Ok(None);
        }

        let mut frame = self.state.output(&self.core)?;

        if self.meta.mix_bus == MixBus::Global {
            let mut overrides = frame.resolved_overrides();
            for zone in &self.core.zones {
                overrides
                    .entry(zone.clone())
                    .or_insert_with(ZoneOverride::dark);
            }
            for zone in overrides.keys() {
                if !frame.zones.contains(zone) {
                    frame.zones.push(zone.clone());
                }
            }
            frame.zone_overrides = overrides;
        }

        if let Some(release) = self.release {
            let factor = release.factor(self.core.elapsed_ms);
            frame.global_composition = Some(frame.composition() * factor);
            frame.intensity *= factor;
        }

        Ok(Some(frame))
    }

    /// Stop immediately. Idempotent.
    pub fn abort(&mut self) {
        if self.core.phase != EffectPhase::Finished {
            debug!("Effect {} ({}) aborted", self.core.id, self.meta.id);
        }
        self.core.finish();
    }

    /// Let the effect fade out over `fade_ms` instead of cutting it.
    ///
    /// A release during a running fade only takes effect if it ends sooner;
    /// the new fade starts from the current level.
    pub fn release(&mut self, fade_ms: f32) {
        if !self.core.phase.is_active() {
            return;
        }
        let fade_ms = if fade_ms.is_finite() { fade_ms.max(1.0) } else { 1.0 };
        let elapsed = self.core.elapsed_ms;
        let from = match self.release {
            Some(running) if running.remaining_ms(elapsed) <= fade_ms => return,
            Some(running) => running.factor(elapsed),
            None => 1.0,
        };
        self.release = Some(Release {
            started_ms: elapsed,
            fade_ms,
            from,
        });
    }

    /// Instance id
    pub fn id(&self) -> EffectId {
        self.core.id
    }

    /// Static description of the policy
    pub fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    /// Policy identifier
    pub fn policy_id(&self) -> &'static str {
        self.meta.id
    }

    /// Arbitration lane
    pub fn mix_bus(&self) -> MixBus {
        self.meta.mix_bus
    }

    /// Tie-break weight
    pub fn priority(&self) -> u8 {
        self.meta.priority
    }

    /// Current phase
    pub fn phase(&self) -> EffectPhase {
        self.core.phase
    }

    /// Time since the last trigger
    pub fn elapsed_ms(&self) -> f32 {
        self.core.elapsed_ms
    }

    /// Duration resolved at the last trigger
    pub fn duration_ms(&self) -> f32 {
        self.core.duration_ms
    }

    /// Zones resolved at the last trigger
    pub fn zones(&self) -> &[Zone] {
        &self.core.zones
    }

    /// Shared bookkeeping
    pub fn core(&self) -> &EffectCore {
        &self.core
    }

    /// Policy-specific state
    pub fn state(&self) -> &PolicyState {
        &self.state
    }

    /// True while producing output
    pub fn is_active(&self) -> bool {
        self.core.phase.is_active()
    }

    /// True once done
    pub fn is_finished(&self) -> bool {
        self.core.phase == EffectPhase::Finished
    }

    /// True while a release fade is running
    pub fn is_releasing(&self) -> bool {
        self.release.is_some() && self.is_active()
    }
}
