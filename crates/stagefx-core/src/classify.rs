//! Mix bus inference for authored effects
//!
//! Runs once at authoring/import time, never per frame. Rules are tried in
//! a fixed order and the first match wins:
//!
//! 1. an explicit `mix_bus` field
//! 2. structural signature (strobe, peak/silence energy zones)
//! 3. name/tag keywords
//! 4. short duration means accent
//! 5. remaining energy-zone hints
//! 6. `htp` as the safe default
//!
//! # Example
//!
//! ```
//! use stagefx_core::classify::{infer_mix_bus, EffectDescriptor};
//! use stagefx_core::MixBus;
//!
//! let fog = EffectDescriptor::named("fog_bank", "Fog Bank");
//! assert_eq!(infer_mix_bus(&fog).bus, MixBus::Ambient);
//! ```

use serde::{Deserialize, Serialize};

use crate::effect::MixBus;

/// Energy zone an effect was authored for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyZone {
    /// Near-silent passages
    Silence,
    /// Breakdowns between peaks
    Valley,
    /// Low background energy
    Ambient,
    /// Soft grooves
    Gentle,
    /// Normal driving sections
    Active,
    /// Build-ups and heavy sections
    Intense,
    /// Drops and climaxes
    Peak,
}

/// Authoring-side description of an effect
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectDescriptor {
    /// Policy identifier
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub display_name: String,
    /// Energy zone the effect targets
    #[serde(default)]
    pub energy_zone: Option<EnergyZone>,
    /// True for binary on/off effects
    #[serde(default)]
    pub has_strobe: bool,
    /// True when the effect's shape reacts to the music while running
    #[serde(default)]
    pub is_dynamic: bool,
    /// Suggested clip length
    #[serde(default)]
    pub suggested_duration_ms: Option<f32>,
    /// Explicitly authored bus
    #[serde(default)]
    pub mix_bus: Option<MixBus>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EffectDescriptor {
    /// Descriptor with only an id and a name
    pub fn named(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }
}

/// Which rule decided the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRule {
    /// Authored `mix_bus` field
    Explicit,
    /// Binary on/off effect
    Strobe,
    /// Authored for peak energy
    PeakZone,
    /// Name or tag suggests a takeover
    DictatorKeyword,
    /// Authored for silence or valleys
    QuietZone,
    /// Name or tag suggests atmosphere
    AtmosphereKeyword,
    /// Name or tag suggests rhythmic motion
    RhythmKeyword,
    /// Short clip
    ShortDuration,
    /// Name or tag suggests a hit
    HitKeyword,
    /// Authored for active or intense energy
    DrivingZone,
    /// Nothing matched
    Fallback,
}

/// Result of bus inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Chosen bus
    pub bus: MixBus,
    /// Rule that chose it
    pub rule: ClassificationRule,
}

/// Clips at or below this length default to the accent bus
pub const SHORT_CLIP_MS: f32 = 2000.0;

const DICTATOR_KEYWORDS: &[&str] = &["meltdown", "blinder", "storm", "explosion"];
const ATMOSPHERE_KEYWORDS: &[&str] = &[
    "mist", "rain", "breath", "void", "ambient", "moon", "aurora", "fog",
];
const RHYTHM_KEYWORDS: &[&str] = &["sweep", "chase", "scan", "wave", "pulse", "rhythm"];
const RHYTHM_IDS: &[&str] = &["acid", "gatling"];
const HIT_KEYWORDS: &[&str] = &["spark", "flash", "hit", "stab"];

/// Infer the bus for an authored effect
pub fn infer_mix_bus(descriptor: &EffectDescriptor) -> Classification {
    let decide = |bus, rule| Classification { bus, rule };

    if let Some(bus) = descriptor.mix_bus {
        return decide(bus, ClassificationRule::Explicit);
    }
    if descriptor.has_strobe {
        return decide(MixBus::Global, ClassificationRule::Strobe);
    }
    if descriptor.energy_zone == Some(EnergyZone::Peak) {
        return decide(MixBus::Global, ClassificationRule::PeakZone);
    }

    let text = search_text(descriptor);
    if contains_any(&text, DICTATOR_KEYWORDS) {
        return decide(MixBus::Global, ClassificationRule::DictatorKeyword);
    }
    if matches!(
        descriptor.energy_zone,
        Some(EnergyZone::Silence | EnergyZone::Valley)
    ) {
        return decide(MixBus::Ambient, ClassificationRule::QuietZone);
    }
    if contains_any(&text, ATMOSPHERE_KEYWORDS) {
        return decide(MixBus::Ambient, ClassificationRule::AtmosphereKeyword);
    }
    let id = descriptor.id.to_lowercase();
    if contains_any(&text, RHYTHM_KEYWORDS) || contains_any(&id, RHYTHM_IDS) {
        return decide(MixBus::Htp, ClassificationRule::RhythmKeyword);
    }
    if descriptor
        .suggested_duration_ms
        .is_some_and(|ms| ms.is_finite() && ms <= SHORT_CLIP_MS)
    {
        return decide(MixBus::Accent, ClassificationRule::ShortDuration);
    }
    if contains_any(&text, HIT_KEYWORDS) {
        return decide(MixBus::Accent, ClassificationRule::HitKeyword);
    }
    if matches!(
        descriptor.energy_zone,
        Some(EnergyZone::Active | EnergyZone::Intense)
    ) {
        return decide(MixBus::Htp, ClassificationRule::DrivingZone);
    }

    decide(MixBus::Htp, ClassificationRule::Fallback)
}

/// Lowercased id, name and tags, space separated
fn search_text(descriptor: &EffectDescriptor) -> String {
    let mut text = format!("{} {}", descriptor.id, descriptor.display_name);
    for tag in &descriptor.tags {
        text.push(' ');
        text.push_str(tag);
    }
    text.to_lowercase()
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}
