use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SpectrographError};

/// Top-level configuration for a render run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    /// Caller-supplied block unit. Sessions read `2 * block_size_unit`
    /// samples per step.
    pub block_size_unit: usize,
    pub image: ImageConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            block_size_unit: 512,
            image: ImageConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Parses a configuration from JSON. Missing fields fall back to their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size_unit == 0 {
            return Err(SpectrographError::Config(
                "block_size_unit must be at least 1".to_string(),
            ));
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(SpectrographError::Config(format!(
                "image size {}x{} must be non-zero",
                self.image.width, self.image.height
            )));
        }
        Ok(())
    }
}

/// Output canvas dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
        }
    }
}
