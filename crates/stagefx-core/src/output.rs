//! Per-frame effect output
//!
//! A [`FrameOutput`] is what one effect proposes for one frame: a map of
//! zone to [`ZoneOverride`] plus a few frame-wide values (progress, strobe
//! rate, fade opacity). The compositor decides what survives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::color::Hsl;
use crate::effect::{EffectCategory, EffectId, EffectPhase};
use crate::zone::Zone;

/// How a zone override combines on the additive buses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Highest value wins per channel
    #[default]
    Max,
    /// The override claims the zone's color outright
    Replace,
}

impl BlendMode {
    /// List all blend modes
    pub fn all() -> &'static [BlendMode] {
        &[BlendMode::Max, BlendMode::Replace]
    }
}

/// Pan/tilt request for moving heads, normalized to `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Horizontal position or offset
    pub pan: f32,
    /// Vertical position or offset
    pub tilt: f32,
    /// Absolute positions replace the upstream trajectory; relative ones add to it
    #[serde(default)]
    pub is_absolute: bool,
    /// Motor speed hint `[0, 1]`
    #[serde(default)]
    pub speed: Option<f32>,
}

impl Movement {
    /// Absolute pan/tilt
    pub fn absolute(pan: f32, tilt: f32) -> Self {
        Self {
            pan,
            tilt,
            is_absolute: true,
            speed: None,
        }
    }

    /// Offset on top of the upstream trajectory
    pub fn relative(pan: f32, tilt: f32) -> Self {
        Self {
            pan,
            tilt,
            is_absolute: false,
            speed: None,
        }
    }

    /// Attach a speed hint
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    fn is_finite(&self) -> bool {
        self.pan.is_finite() && self.tilt.is_finite() && self.speed.map_or(true, f32::is_finite)
    }
}

/// One effect's proposal for one zone in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOverride {
    /// Color, if the effect has an opinion
    #[serde(default)]
    pub color: Option<Hsl>,
    /// Intensity `[0, 1]`; an explicit 0 paints black
    pub dimmer: f32,
    /// White channel `[0, 1]`
    #[serde(default)]
    pub white: Option<f32>,
    /// Amber channel `[0, 1]`
    #[serde(default)]
    pub amber: Option<f32>,
    /// Pan/tilt request
    #[serde(default)]
    pub movement: Option<Movement>,
    /// Blend mode on the additive buses
    #[serde(default)]
    pub blend_mode: BlendMode,
}

impl ZoneOverride {
    /// Explicit darkness
    pub fn dark() -> Self {
        Self {
            color: None,
            dimmer: 0.0,
            white: None,
            amber: None,
            movement: None,
            blend_mode: BlendMode::Replace,
        }
    }

    /// Colored light at the given intensity
    pub fn lit(color: Hsl, dimmer: f32) -> Self {
        Self {
            color: Some(color),
            dimmer,
            white: None,
            amber: None,
            movement: None,
            blend_mode: BlendMode::Max,
        }
    }

    /// Set the white channel
    pub fn with_white(mut self, white: f32) -> Self {
        self.white = Some(white);
        self
    }

    /// Set the amber channel
    pub fn with_amber(mut self, amber: f32) -> Self {
        self.amber = Some(amber);
        self
    }

    /// Set a movement request
    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.movement = Some(movement);
        self
    }

    /// Set the blend mode
    pub fn with_blend(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Scale every intensity channel by `factor`
    pub fn scaled(mut self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        self.dimmer *= factor;
        self.white = self.white.map(|w| w * factor);
        self.amber = self.amber.map(|a| a * factor);
        self
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !unit(self.dimmer) {
            return Err(format!("dimmer {} outside [0, 1]", self.dimmer));
        }
        if let Some(white) = self.white.filter(|w| !unit(*w)) {
            return Err(format!("white {white} outside [0, 1]"));
        }
        if let Some(amber) = self.amber.filter(|a| !unit(*a)) {
            return Err(format!("amber {amber} outside [0, 1]"));
        }
        if self.color.is_some_and(|c| !c.is_finite()) {
            return Err("non-finite color".to_string());
        }
        if self.movement.is_some_and(|m| !m.is_finite()) {
            return Err("non-finite movement".to_string());
        }
        Ok(())
    }
}

fn unit(v: f32) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

/// Everything one effect emits for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    /// Emitting effect
    pub effect_id: EffectId,
    /// Effect category
    pub category: EffectCategory,
    /// Phase at the time of the frame
    pub phase: EffectPhase,
    /// Overall progress `[0, 1]`
    pub progress: f32,
    /// Overall intensity `[0, 1]`
    pub intensity: f32,
    /// Zones this frame touches
    pub zones: Vec<Zone>,
    /// Per-zone proposals
    #[serde(default)]
    pub zone_overrides: BTreeMap<Zone, ZoneOverride>,
    /// Single-color shorthand applied to every zone in `zones` without an override
    #[serde(default)]
    pub color_override: Option<Hsl>,
    /// Single-dimmer shorthand applied to every zone in `zones` without an override
    #[serde(default)]
    pub dimmer_override: Option<f32>,
    /// White channel shorthand
    #[serde(default)]
    pub white_override: Option<f32>,
    /// Fade opacity for cross-fading the whole effect in or out
    #[serde(default)]
    pub global_composition: Option<f32>,
    /// Strobe rate the fixtures should run, in Hz
    #[serde(default)]
    pub strobe_rate: Option<f32>,
}

impl FrameOutput {
    /// Empty frame for an effect
    pub fn new(effect_id: EffectId, category: EffectCategory, phase: EffectPhase) -> Self {
        Self {
            effect_id,
            category,
            phase,
            progress: 0.0,
            intensity: 0.0,
            zones: Vec::new(),
            zone_overrides: BTreeMap::new(),
            color_override: None,
            dimmer_override: None,
            white_override: None,
            global_composition: None,
            strobe_rate: None,
        }
    }

    /// Add a zone override and record the zone as touched
    pub fn with_zone(mut self, zone: Zone, zone_override: ZoneOverride) -> Self {
        if !self.zones.contains(&zone) {
            self.zones.push(zone.clone());
        }
        self.zone_overrides.insert(zone, zone_override);
        self
    }

    /// Set progress and intensity
    pub fn with_progress(mut self, progress: f32, intensity: f32) -> Self {
        self.progress = progress.clamp(0.0, 1.0);
        self.intensity = intensity;
        self
    }

    /// Effective per-zone overrides, with the legacy shorthand expanded
    pub fn resolved_overrides(&self) -> BTreeMap<Zone, ZoneOverride> {
        let mut resolved = self.zone_overrides.clone();
        if self.dimmer_override.is_none() && self.color_override.is_none() {
            return resolved;
        }
        for zone in &self.zones {
            resolved.entry(zone.clone()).or_insert_with(|| ZoneOverride {
                color: self.color_override,
                dimmer: self.dimmer_override.unwrap_or(self.intensity),
                white: self.white_override,
                amber: None,
                movement: None,
                blend_mode: BlendMode::Max,
            });
        }
        resolved
    }

    /// Opacity multiplier, 1.0 when the effect does not fade itself
    pub fn composition(&self) -> f32 {
        self.global_composition.unwrap_or(1.0)
    }

    /// Reject frames the compositor cannot use
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.progress.is_finite() || !self.intensity.is_finite() {
            return Err("non-finite progress or intensity".to_string());
        }
        if let Some(gc) = self.global_composition.filter(|gc| !unit(*gc)) {
            return Err(format!("global composition {gc} outside [0, 1]"));
        }
        if let Some(rate) = self
            .strobe_rate
            .filter(|r| !r.is_finite() || *r < 0.0)
        {
            return Err(format!("invalid strobe rate {rate}"));
        }
        for (zone, zone_override) in self.resolved_overrides() {
            zone_override
                .check()
                .map_err(|reason| format!("zone {zone}: {reason}"))?;
        }
        Ok(())
    }
}
