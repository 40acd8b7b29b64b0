//! Engine configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no
//! file at all) gives a working engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{EffectError, Result};
use crate::logging::LogConfig;
use crate::timing::{MAX_BPM, MIN_BPM};

/// Highest flash rate any output may request, in Hz
pub const STROBE_CEILING_HZ: f32 = 15.0;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Render rate of the show runner
    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: f32,
    /// Flash rate limit; values above [`STROBE_CEILING_HZ`] are lowered to it
    #[serde(default = "default_strobe_ceiling_hz")]
    pub strobe_ceiling_hz: f32,
    /// Tempo applied to triggers that carry no musical context
    #[serde(default)]
    pub default_bpm: Option<f32>,
    /// Maximum number of simultaneously active effects
    #[serde(default = "default_max_active_effects")]
    pub max_active_effects: usize,
    /// Fade used by `release_all`
    #[serde(default = "default_release_ms")]
    pub default_release_ms: f32,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

fn default_frame_rate_hz() -> f32 {
    60.0
}

fn default_strobe_ceiling_hz() -> f32 {
    STROBE_CEILING_HZ
}

fn default_max_active_effects() -> usize {
    64
}

fn default_release_ms() -> f32 {
    500.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: default_frame_rate_hz(),
            strobe_ceiling_hz: default_strobe_ceiling_hz(),
            default_bpm: None,
            max_active_effects: default_max_active_effects(),
            default_release_ms: default_release_ms(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Reject unusable values and pull soft limits back into range
    pub fn validate(&mut self) -> Result<()> {
        if !self.frame_rate_hz.is_finite() || self.frame_rate_hz <= 0.0 {
            return Err(EffectError::InvalidConfig(format!(
                "frame_rate_hz must be positive, got {}",
                self.frame_rate_hz
            )));
        }
        if self.max_active_effects == 0 {
            return Err(EffectError::InvalidConfig(
                "max_active_effects must be at least 1".to_string(),
            ));
        }
        if !self.strobe_ceiling_hz.is_finite() || self.strobe_ceiling_hz <= 0.0 {
            return Err(EffectError::InvalidConfig(format!(
                "strobe_ceiling_hz must be positive, got {}",
                self.strobe_ceiling_hz
            )));
        }
        if self.strobe_ceiling_hz > STROBE_CEILING_HZ {
            warn!(
                "strobe_ceiling_hz {} above the {} Hz limit, clamping",
                self.strobe_ceiling_hz, STROBE_CEILING_HZ
            );
            self.strobe_ceiling_hz = STROBE_CEILING_HZ;
        }
        if let Some(bpm) = self.default_bpm {
            if !bpm.is_finite() || !(MIN_BPM..=MAX_BPM).contains(&bpm) {
                warn!("default_bpm {} outside {}..={}, ignoring", bpm, MIN_BPM, MAX_BPM);
                self.default_bpm = None;
            }
        }
        if !self.default_release_ms.is_finite() || self.default_release_ms < 1.0 {
            return Err(EffectError::InvalidConfig(format!(
                "default_release_ms must be at least 1, got {}",
                self.default_release_ms
            )));
        }
        Ok(())
    }

    /// Milliseconds per frame at `frame_rate_hz`
    pub fn frame_delta_ms(&self) -> f32 {
        1000.0 / self.frame_rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_active_effects, 64);
        assert_eq!(config.strobe_ceiling_hz, 15.0);
    }

    #[test]
    fn test_partial_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            frame_rate_hz = 40.0
            default_bpm = 128.0

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.frame_delta_ms(), 25.0);
        assert_eq!(config.default_bpm, Some(128.0));
        assert_eq!(config.log.level, "debug");
        assert!(config.log.console_output);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("frame_rate_hz = 0.0"),
            Err(EffectError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_active_effects = 0"),
            Err(EffectError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("frame_rate_hz = \"fast\""),
            Err(EffectError::Toml(_))
        ));
    }

    #[test]
    fn test_soft_limits_are_clamped() {
        let config =
            EngineConfig::from_toml_str("strobe_ceiling_hz = 30.0\ndefault_bpm = 9000.0").unwrap();
        assert_eq!(config.strobe_ceiling_hz, STROBE_CEILING_HZ);
        assert_eq!(config.default_bpm, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_active_effects = 8").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_active_effects, 8);

        assert!(matches!(
            EngineConfig::load("/nonexistent/stagefx.toml"),
            Err(EffectError::Io(_))
        ));
    }
}
