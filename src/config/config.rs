//! # Configuration Module
//!
//! Configuration structures and validation shared by the CLI and the library.
//! Nothing here is global: callers build a config and pass it down explicitly.
//!
//! ## Acquisition Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `facing_mode` | `FacingMode` | user/environment | Preferred camera |
//! | `resolution` | `ResolutionHint` | 1-8192 per side | Ideal or exact capture size |
//! | `jpeg_quality` | `u8` | 1-100 | Snapshot JPEG quality |
//! | `instructions` | `String` | any | Text shown on the live overlay |
//!
//! ## Panel Parameters
//!
//! | Parameter | Type | Default |
//! |-----------|------|---------|
//! | `vision_endpoint` | `String` | hosted chat-completion URL |
//! | `vision_model` | `String` | `llama-3.2-90b-vision-preview` |
//! | `api_key_env` | `String` | `KITCHEN_VISION_API_KEY` |
//! | `timeout_secs` | `u64` | 30 |
//! | `max_upload_side` | `Option<u32>` | 1280 |
//! | `volume_base_url` | `String` | `http://localhost:5001` |
//! | `freshness_base_url` | `String` | `http://localhost:5015` |
//!
//! Panel settings can also be loaded from a JSON file; missing keys keep their
//! defaults.
//!
//! ## Examples
//!
//! ```rust
//! use kitchen_capture::config::config::{AcquisitionConfig, PanelConfig};
//!
//! let acquisition = AcquisitionConfig::default();
//! assert!(acquisition.validate().is_ok());
//!
//! let panels: PanelConfig = serde_json::from_str(r#"{"timeout_secs": 10}"#).unwrap();
//! assert_eq!(panels.timeout_secs, 10);
//! assert_eq!(panels.volume_base_url, "http://localhost:5001");
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::{FacingMode, MediaConstraints, ResolutionHint};
use crate::processing::DEFAULT_JPEG_QUALITY;

/// Largest accepted resolution side, in pixels.
const MAX_RESOLUTION_SIDE: u32 = 8192;

/// Camera acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Preferred camera. Defaults to the rear (environment) camera.
    pub facing_mode: FacingMode,

    /// Requested resolution. Defaults to an ideal 1280x720.
    pub resolution: ResolutionHint,

    /// JPEG quality for snapshots, 1 to 100. Defaults to 80.
    pub jpeg_quality: u8,

    /// Instruction line shown alongside the live preview.
    pub instructions: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            resolution: ResolutionHint::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            instructions: "Position the item in the frame and tap Capture".to_string(),
        }
    }
}

impl AcquisitionConfig {
    pub fn new(
        facing_mode: FacingMode,
        resolution: ResolutionHint,
        jpeg_quality: u8,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            facing_mode,
            resolution,
            jpeg_quality,
            instructions: instructions.into(),
        }
    }

    /// Replace the overlay instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        let r = self.resolution;
        if r.width == 0 || r.height == 0 {
            return Err("Resolution must be greater than 0 in both dimensions".to_string());
        }
        if r.width > MAX_RESOLUTION_SIDE || r.height > MAX_RESOLUTION_SIDE {
            return Err(format!(
                "Resolution must not exceed {} pixels per side",
                MAX_RESOLUTION_SIDE
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        Ok(())
    }

    /// Device constraints derived from this configuration.
    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            facing_mode: self.facing_mode,
            resolution: self.resolution,
        }
    }
}

/// Backend endpoints and request settings for the panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Chat-completion endpoint of the hosted vision model.
    pub vision_endpoint: String,

    /// Model identifier sent with every vision request.
    pub vision_model: String,

    /// Name of the environment variable holding the vision API key.
    ///
    /// The key itself is never stored in configuration.
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Cap on the longest image side sent to the vision backend. `None` sends
    /// the image untouched.
    pub max_upload_side: Option<u32>,

    /// Base URL of the bottle volume estimator.
    pub volume_base_url: String,

    /// Base URL of the fruit freshness detector.
    pub freshness_base_url: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            vision_endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            vision_model: "llama-3.2-90b-vision-preview".to_string(),
            api_key_env: "KITCHEN_VISION_API_KEY".to_string(),
            timeout_secs: 30,
            max_upload_side: Some(1280),
            volume_base_url: "http://localhost:5001".to_string(),
            freshness_base_url: "http://localhost:5015".to_string(),
        }
    }
}

impl PanelConfig {
    /// Load from a JSON file. Keys not present keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config '{}': {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| format!("Invalid config '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0 seconds".to_string());
        }
        if self.vision_model.trim().is_empty() {
            return Err("Vision model must not be empty".to_string());
        }
        if self.api_key_env.trim().is_empty() {
            return Err("API key environment variable name must not be empty".to_string());
        }
        if self.max_upload_side == Some(0) {
            return Err("Maximum upload side must be greater than 0".to_string());
        }
        for (name, url) in [
            ("vision_endpoint", &self.vision_endpoint),
            ("volume_base_url", &self.volume_base_url),
            ("freshness_base_url", &self.freshness_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} must be an http(s) URL (got '{}')", name, url));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the vision API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}
