use std::path::{Path, PathBuf};

use egomotion_3d::camera::{CameraError, CameraIntrinsics};
use egomotion_3d::pose::{RansacError, RansacParams};
use egomotion_image::ImageSize;
use egomotion_imgproc::features::GoodFeaturesParams;
use egomotion_imgproc::FeatureError;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`TrackerConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config value `{name}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Camera resolution and focal length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Focal length in pixels, shared by both axes.
    pub focal: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            focal: 270.0,
        }
    }
}

/// Corner detection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum number of corners per frame.
    pub max_corners: usize,
    /// Minimum corner response relative to the strongest one.
    pub quality_level: f32,
    /// Minimum distance in pixels between two corners.
    pub min_distance: f32,
    /// Size reported on every keypoint.
    pub keypoint_size: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let params = GoodFeaturesParams::default();
        Self {
            max_corners: params.max_corners,
            quality_level: params.quality_level,
            min_distance: params.min_distance,
            keypoint_size: 20.0,
        }
    }
}

impl DetectorConfig {
    /// The corner detector parameters.
    pub fn good_features_params(&self) -> GoodFeaturesParams {
        GoodFeaturesParams {
            max_corners: self.max_corners,
            quality_level: self.quality_level,
            min_distance: self.min_distance,
        }
    }
}

/// Descriptor matching settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum ratio between the nearest and the second nearest distance.
    pub ratio: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { ratio: 0.75 }
    }
}

/// Configuration of a [`crate::FrameTracker`].
///
/// Every field has a default, so a JSON file only needs the values it changes:
///
/// ```
/// use egomotion::TrackerConfig;
///
/// let config = TrackerConfig::from_json_str(r#"{ "ransac": { "random_seed": 7 } }"#).unwrap();
/// assert_eq!(config.ransac.random_seed, Some(7));
/// assert_eq!(config.ransac.max_iterations, 200);
/// assert_eq!(config.camera.width, 960);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Camera settings.
    pub camera: CameraConfig,
    /// Corner detection settings.
    pub detector: DetectorConfig,
    /// Descriptor matching settings.
    pub matcher: MatcherConfig,
    /// Robust estimation settings.
    pub ransac: RansacParams,
}

impl TrackerConfig {
    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Serialize the configuration as pretty printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid {
                name: "camera.width/height",
                reason: format!(
                    "must be positive, got {}x{}",
                    self.camera.width, self.camera.height
                ),
            });
        }
        if !self.camera.focal.is_finite() || self.camera.focal <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "camera.focal",
                reason: format!("must be positive and finite, got {}", self.camera.focal),
            });
        }

        self.detector
            .good_features_params()
            .validate()
            .map_err(|err| match err {
                FeatureError::InvalidParameter { name, reason } => {
                    ConfigError::Invalid { name, reason }
                }
                other => ConfigError::Invalid {
                    name: "detector",
                    reason: other.to_string(),
                },
            })?;
        if self.detector.keypoint_size.is_nan() || self.detector.keypoint_size <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "keypoint_size",
                reason: format!("must be positive, got {}", self.detector.keypoint_size),
            });
        }

        if self.matcher.ratio.is_nan() || self.matcher.ratio <= 0.0 || self.matcher.ratio > 1.0 {
            return Err(ConfigError::Invalid {
                name: "ratio",
                reason: format!("must be in (0, 1], got {}", self.matcher.ratio),
            });
        }

        self.ransac.validate().map_err(|err| match err {
            RansacError::InvalidParameter { name, reason } => ConfigError::Invalid { name, reason },
            other => ConfigError::Invalid {
                name: "ransac",
                reason: other.to_string(),
            },
        })
    }

    /// The configured frame size.
    pub fn image_size(&self) -> ImageSize {
        ImageSize {
            width: self.camera.width,
            height: self.camera.height,
        }
    }

    /// The camera intrinsics, with the principal point at the frame centre.
    pub fn intrinsics(&self) -> Result<CameraIntrinsics, CameraError> {
        CameraIntrinsics::from_focal_and_size(
            self.camera.focal,
            self.camera.width,
            self.camera.height,
        )
    }
}
