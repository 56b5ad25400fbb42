//! # Camera Capture Backends
//!
//! Media-capture devices sit behind two traits so the acquisition flow never
//! touches hardware directly:
//!
//! - [`MediaDevices`]: grants (or refuses) access to a camera under constraints
//! - [`MediaStream`]: a granted stream whose tracks must be stopped when done
//!
//! Concrete backends:
//! - [`pattern`]: synthetic test-pattern camera, always available
//! - `v4l`: Linux webcams through V4L2 (feature `v4l-camera`)

use std::sync::Arc;

use async_trait::async_trait;

pub mod pattern;
#[cfg(all(target_os = "linux", feature = "v4l-camera"))]
pub mod v4l;

/// Which physical camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Front camera, facing the user
    User,
    /// Rear camera, facing the scene
    #[default]
    Environment,
}

impl FacingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

/// Requested capture resolution.
///
/// An `ideal` hint is a preference the device may ignore; an `exact` request
/// fails with an overconstrained error when the device cannot honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionHint {
    pub width: u32,
    pub height: u32,
    pub exact: bool,
}

impl ResolutionHint {
    pub fn ideal(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            exact: false,
        }
    }

    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            exact: true,
        }
    }
}

impl Default for ResolutionHint {
    fn default() -> Self {
        Self::ideal(1280, 720)
    }
}

/// Video-only constraints passed to [`MediaDevices::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub facing_mode: FacingMode,
    pub resolution: ResolutionHint,
}

/// Dimensions of the frames a stream delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// One decoded video frame, tightly packed RGBA8.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
}

impl Frame {
    pub fn size(&self) -> FrameSize {
        FrameSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Why a device refused or lost a stream.
///
/// Mirrors the rejection reasons platforms report when a camera is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFailure {
    Denied(String),
    NotFound(String),
    Busy(String),
    Overconstrained(String),
    Other(String),
}

impl DeviceFailure {
    /// Classify a rejection by its reason name.
    ///
    /// Recognizes DOM exception names (`NotAllowedError`, `NotFoundError`,
    /// `NotReadableError`, `OverconstrainedError` and their legacy aliases) as
    /// well as plain reasons such as `"denied"` or `"not found"`.
    pub fn from_name(name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "notallowederror" | "permissiondeniederror" | "securityerror" | "denied"
            | "permission denied" => DeviceFailure::Denied(message),
            "notfounderror" | "devicesnotfounderror" | "not found" | "notfound" => {
                DeviceFailure::NotFound(message)
            }
            "notreadableerror" | "trackstarterror" | "busy" | "not readable" => {
                DeviceFailure::Busy(message)
            }
            "overconstrainederror" | "constraintnotsatisfiederror" | "overconstrained" => {
                DeviceFailure::Overconstrained(message)
            }
            _ if message.is_empty() => DeviceFailure::Other(name.to_string()),
            _ => DeviceFailure::Other(message),
        }
    }
}

impl std::fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceFailure::Denied(m) => write!(f, "denied: {}", m),
            DeviceFailure::NotFound(m) => write!(f, "not found: {}", m),
            DeviceFailure::Busy(m) => write!(f, "busy: {}", m),
            DeviceFailure::Overconstrained(m) => write!(f, "overconstrained: {}", m),
            DeviceFailure::Other(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for DeviceFailure {}

/// Grants access to camera streams.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request a video stream under the given constraints.
    ///
    /// May wait indefinitely for a permission decision.
    async fn open(&self, constraints: &MediaConstraints)
    -> Result<Box<dyn MediaStream>, DeviceFailure>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}

/// A granted camera stream.
///
/// Tracks stay live until [`MediaStream::stop`] is called.
#[async_trait]
pub trait MediaStream: Send {
    /// Wait for the first decodable frame and report its size.
    async fn ready(&mut self) -> Result<FrameSize, DeviceFailure>;

    /// Copy the current frame.
    fn snapshot(&mut self) -> Result<Frame, DeviceFailure>;

    /// Stop every underlying hardware track.
    fn stop(&mut self);

    /// Number of tracks still delivering frames.
    fn active_tracks(&self) -> usize;
}

/// Pick the media devices backend for this platform.
///
/// Returns `None` when the build has no camera support, which the acquisition
/// flow reports as a missing capability.
pub fn default_media_devices() -> Option<Arc<dyn MediaDevices>> {
    #[cfg(all(target_os = "linux", feature = "v4l-camera"))]
    return Some(Arc::new(v4l::V4lDevices::default()));

    #[allow(unreachable_code)]
    None
}
