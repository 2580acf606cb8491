// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BLUR_SIGMA, DEFAULT_BLUR_WORKING_SIGMA,
    DEFAULT_DETECTION_MAX_DIMENSION, DEFAULT_FACE_DETECTING_FRAME_INTERVAL,
};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pipeline settings consumed from the session layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run the face detector once every this many frames
    pub face_detecting_frame_interval: u32,
    /// Gaussian sigma for frames without a face
    pub blur_sigma: f32,
    /// Longest edge of the image handed to the face detector
    pub detection_max_dimension: u32,
    /// Largest sigma applied at working resolution (see [`crate::blur`])
    pub blur_working_sigma: f32,
    /// Camera frames initially come from
    pub camera_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            face_detecting_frame_interval: DEFAULT_FACE_DETECTING_FRAME_INTERVAL,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            detection_max_dimension: DEFAULT_DETECTION_MAX_DIMENSION,
            blur_working_sigma: DEFAULT_BLUR_WORKING_SIGMA,
            camera_id: None,
        }
    }
}

impl Config {
    /// Check every tunable is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.face_detecting_frame_interval == 0 {
            return Err(ConfigError::InvalidInterval(
                self.face_detecting_frame_interval,
            ));
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(ConfigError::InvalidSigma(self.blur_sigma));
        }
        if self.detection_max_dimension == 0 {
            return Err(ConfigError::InvalidMaxDimension);
        }
        if !(self.blur_working_sigma.is_finite() && self.blur_working_sigma > 0.0) {
            return Err(ConfigError::InvalidWorkingSigma(self.blur_working_sigma));
        }
        Ok(())
    }

    /// Default location: `<config dir>/privacy-gate/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            face_detecting_frame_interval: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterval(0)));

        let config = Config {
            blur_sigma: f32::NAN,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSigma(_))));

        let config = Config {
            blur_sigma: -1.0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidSigma(-1.0)));

        let config = Config {
            detection_max_dimension: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxDimension));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"blur_sigma": 12.5}"#).unwrap();
        assert_eq!(config.blur_sigma, 12.5);
        assert_eq!(
            config.face_detecting_frame_interval,
            DEFAULT_FACE_DETECTING_FRAME_INTERVAL
        );
    }
}
