//! Configuration for the feed, the viewer and image acquisition.
//!
//! Loaded from `config.toml` in the glimpse home directory. Every field has
//! a default, so a missing file or an empty file yields the stock behaviour:
//! 3s per story, 50-unit swipe threshold, 24h retention, sweep every minute.

use crate::repository::STORIES_KEY;
use crate::store::validate_key;
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind};
use std::time::Duration;

// ============================================================================
// Default Functions
// ============================================================================

fn default_story_duration_ms() -> u64 {
    3000
}

fn default_swipe_threshold() -> f32 {
    50.0
}

fn default_retention_hours() -> u64 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_storage_key() -> String {
    STORIES_KEY.to_string()
}

fn default_frame_interval_ms() -> u64 {
    250
}

fn default_max_width() -> u32 {
    1080
}

fn default_max_height() -> u32 {
    1920
}

fn default_jpeg_quality() -> u8 {
    90
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Bounds applied by the image-acquisition pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Longest allowed width in pixels
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Longest allowed height in pixels
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// JPEG quality used when an image has to be downscaled (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// How long each story stays on screen before auto-advancing
    #[serde(default = "default_story_duration_ms")]
    pub story_duration_ms: u64,
    /// Minimum horizontal travel for a touch gesture to count as a swipe
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,
    /// Stories older than this are expired
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Period of the feed's expiry sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Key the story list is persisted under
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Redraw period of the viewer while a story is playing
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default)]
    pub image: ImageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            story_duration_ms: default_story_duration_ms(),
            swipe_threshold: default_swipe_threshold(),
            retention_hours: default_retention_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            storage_key: default_storage_key(),
            frame_interval_ms: default_frame_interval_ms(),
            image: ImageConfig::default(),
        }
    }
}

impl Config {
    /// Parse TOML and validate.
    pub fn from_toml(content: &str) -> io::Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("Failed to parse config: {}", e),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> io::Result<()> {
        let invalid = |msg: &str| -> io::Result<()> {
            Err(io::Error::new(ErrorKind::InvalidData, msg.to_string()))
        };

        if self.story_duration_ms == 0 {
            return invalid("story_duration_ms must be greater than 0");
        }
        if self.retention_hours == 0 {
            return invalid("retention_hours must be greater than 0");
        }
        if self.sweep_interval_secs == 0 {
            return invalid("sweep_interval_secs must be greater than 0");
        }
        if self.frame_interval_ms == 0 {
            return invalid("frame_interval_ms must be greater than 0");
        }
        if !self.swipe_threshold.is_finite() || self.swipe_threshold < 0.0 {
            return invalid("swipe_threshold must be a non-negative number");
        }
        if self.image.max_width == 0 || self.image.max_height == 0 {
            return invalid("image bounds must be greater than 0");
        }
        if !(1..=100).contains(&self.image.jpeg_quality) {
            return invalid("image.jpeg_quality must be between 1 and 100");
        }
        if validate_key(&self.storage_key).is_err() {
            return invalid("storage_key must be alphanumeric with dashes and underscores only");
        }
        Ok(())
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_hours.saturating_mul(60 * 60 * 1000)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
