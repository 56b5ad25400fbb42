//! # Kitchen Capture
//!
//! Image acquisition for the smart-kitchen panels: every panel needs exactly
//! one image, taken either from a file the user picks or from a live camera
//! snapshot, and then sent to an analysis backend.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: camera backends behind the `MediaDevices` / `MediaStream` traits
//! - `session`: the camera session lifecycle and overlay view-state
//! - `acquisition`: file pick and camera capture, producing a `CapturedImage`
//! - `processing`: data URIs, JPEG encoding, and upload downscaling
//! - `panels`: vision-model and local-service clients that consume images
//! - `config`: acquisition and panel configuration
//! - `error`: typed errors with user-readable messages and recovery hints
//!
//! ## Features
//!
//! - **Graceful degradation**: every camera failure maps to a typed error and a
//!   message; file upload always remains available
//! - **No leaked hardware**: every camera exit path stops all tracks
//! - **Async/await**: built on Tokio; cancellation arrives as a message
//!
//! ## Example
//!
//! ```rust,no_run
//! use kitchen_capture::{AcquisitionConfig, ImageAcquisition, PanelConfig};
//! use kitchen_capture::panels::{VisionClient, food_waste};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut acquisition = ImageAcquisition::new(
//!     kitchen_capture::capture::default_media_devices(),
//!     AcquisitionConfig::default(),
//! );
//! let image = acquisition.acquire_from_file("plate.jpg").await?;
//!
//! let client = VisionClient::from_config(&PanelConfig::default())?;
//! let result = food_waste::classify(&client, &image).await;
//! println!("{} ({}%)", result.category.label, result.confidence);
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod capture;
pub mod config;
pub mod error;
pub mod panels;
pub mod processing;
pub mod session;

/// Re-export error types for convenience
pub use error::{
    AcquisitionError, AcquisitionResult, PanelError, PanelResult, Recoverable, RecoveryStrategy,
    Retryable,
};

pub use acquisition::{CapturedImage, ImageAcquisition, ImageSource};
pub use config::{AcquisitionConfig, PanelConfig};
pub use session::{CameraSession, CaptureControl, OverlayState, SessionState};
