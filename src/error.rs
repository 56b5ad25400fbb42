//! # Error Handling
//!
//! Two error families live here:
//!
//! - [`AcquisitionError`]: every way obtaining an image can fail, whether from a
//!   file or a live camera. Each kind carries a short user-readable message
//!   ([`AcquisitionError::user_message`]) that panels display verbatim.
//! - [`PanelError`]: failures talking to the vision or analytics backends.
//!
//! Nothing in either family is fatal. Classification traits tell callers what
//! to do next:
//!
//! - `Recoverable`: which [`RecoveryStrategy`] applies (retry, file upload, simulated result)
//! - `Retryable`: whether repeating the same request can succeed
//!
//! ## Usage
//!
//! ```rust
//! use kitchen_capture::error::{AcquisitionError, Recoverable, RecoveryStrategy};
//!
//! let error = AcquisitionError::from_reason("NotAllowedError", "Permission denied");
//! assert_eq!(error.kind(), "permission_denied");
//! assert!(error.user_message().starts_with("Camera access was denied"));
//! assert!(error
//!     .recovery_strategies()
//!     .contains(&RecoveryStrategy::FallbackToFileUpload));
//! ```

use std::{error::Error as StdError, fmt, io};

use crate::capture::DeviceFailure;

/// Failure to obtain an image.
#[derive(Debug)]
pub enum AcquisitionError {
    /// The platform exposes no media-capture capability at all.
    CapabilityUnavailable,
    /// The user or a policy blocked camera access.
    PermissionDenied { reason: String },
    /// No camera hardware is present.
    DeviceNotFound { reason: String },
    /// The camera is held by another process.
    DeviceBusy { reason: String },
    /// The requested facing mode or resolution cannot be satisfied.
    ConstraintUnsatisfiable { reason: String },
    /// Turning the live frame into a still image failed.
    CaptureEncodingError {
        reason: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// The selected file could not be read.
    FileReadError { path: String, source: io::Error },
    /// Any other platform failure, with the raw diagnostic message.
    UnknownAcquisitionError { message: String },
}

impl AcquisitionError {
    /// Create a capture encoding error without an underlying source.
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::CaptureEncodingError {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a capture encoding error wrapping the codec failure.
    pub fn encoding_with(
        reason: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::CaptureEncodingError {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a file read error.
    pub fn file_read(path: impl Into<String>, source: io::Error) -> Self {
        Self::FileReadError {
            path: path.into(),
            source,
        }
    }

    /// Classify a platform rejection by its reason name.
    ///
    /// Accepts both DOM-style exception names (`NotAllowedError`) and plain
    /// reasons (`"denied"`).
    pub fn from_reason(name: &str, message: impl Into<String>) -> Self {
        DeviceFailure::from_name(name, message).into()
    }

    /// Stable identifier for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapabilityUnavailable => "capability_unavailable",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::DeviceNotFound { .. } => "device_not_found",
            Self::DeviceBusy { .. } => "device_busy",
            Self::ConstraintUnsatisfiable { .. } => "constraint_unsatisfiable",
            Self::CaptureEncodingError { .. } => "capture_encoding_error",
            Self::FileReadError { .. } => "file_read_error",
            Self::UnknownAcquisitionError { .. } => "unknown_acquisition_error",
        }
    }

    /// Short, human-readable message for display in a panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::CapabilityUnavailable => "Camera access is not supported on this system. \
Try using the file upload option instead."
                .to_string(),
            Self::PermissionDenied { .. } => "Camera access was denied. Please check your settings \
and grant permission to use the camera."
                .to_string(),
            Self::DeviceNotFound { .. } => "No camera device was found. Please ensure your device \
has a camera that's connected and not in use by another application."
                .to_string(),
            Self::DeviceBusy { .. } => {
                "Could not access your camera. It may be in use by another application.".to_string()
            }
            Self::ConstraintUnsatisfiable { .. } => {
                "The requested camera settings are not supported by your device.".to_string()
            }
            Self::CaptureEncodingError { .. } => {
                "Failed to capture image. Please try again or use file upload instead.".to_string()
            }
            Self::FileReadError { .. } => {
                "Could not read the selected file. Please try again or choose another image."
                    .to_string()
            }
            Self::UnknownAcquisitionError { message } => {
                let message = if message.trim().is_empty() {
                    "Unknown error"
                } else {
                    message.as_str()
                };
                format!("Could not access camera: {}", message)
            }
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityUnavailable => write!(f, "media capture is not available"),
            Self::PermissionDenied { reason } => write!(f, "camera permission denied: {}", reason),
            Self::DeviceNotFound { reason } => write!(f, "camera not found: {}", reason),
            Self::DeviceBusy { reason } => write!(f, "camera busy: {}", reason),
            Self::ConstraintUnsatisfiable { reason } => {
                write!(f, "camera constraints unsatisfiable: {}", reason)
            }
            Self::CaptureEncodingError { reason, .. } => {
                write!(f, "capture encoding failed: {}", reason)
            }
            Self::FileReadError { path, source } => {
                write!(f, "failed to read '{}': {}", path, source)
            }
            Self::UnknownAcquisitionError { message } => {
                write!(f, "acquisition failed: {}", message)
            }
        }
    }
}

impl StdError for AcquisitionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::FileReadError { source, .. } => Some(source),
            Self::CaptureEncodingError {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<DeviceFailure> for AcquisitionError {
    fn from(failure: DeviceFailure) -> Self {
        match failure {
            DeviceFailure::Denied(reason) => Self::PermissionDenied { reason },
            DeviceFailure::NotFound(reason) => Self::DeviceNotFound { reason },
            DeviceFailure::Busy(reason) => Self::DeviceBusy { reason },
            DeviceFailure::Overconstrained(reason) => Self::ConstraintUnsatisfiable { reason },
            DeviceFailure::Other(message) => Self::UnknownAcquisitionError { message },
        }
    }
}

/// Result type alias for acquisition operations
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

/// Failure talking to a vision or analytics backend.
#[derive(Debug)]
pub enum PanelError {
    /// No API key is configured for the hosted vision service.
    MissingCredentials { env_var: String },
    /// Connection-level failure.
    Network {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The request exceeded its time budget.
    Timeout { endpoint: String, duration_ms: u64 },
    /// Non-success HTTP status.
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// The response body did not have the expected shape.
    Decode { endpoint: String, reason: String },
    /// The backend answered with an explicit `error` field.
    Backend { endpoint: String, message: String },
    /// Preparing the image for upload failed.
    Image { operation: String, reason: String },
}

impl PanelError {
    /// Map a `reqwest` failure, separating timeouts from other network errors.
    pub fn from_reqwest(endpoint: impl Into<String>, timeout_ms: u64, error: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if error.is_timeout() {
            Self::Timeout {
                endpoint,
                duration_ms: timeout_ms,
            }
        } else if error.is_decode() {
            Self::Decode {
                endpoint,
                reason: error.to_string(),
            }
        } else {
            Self::Network {
                endpoint,
                source: error,
            }
        }
    }

    /// Create an image preparation error.
    pub fn image(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Image {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Stable identifier for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials { .. } => "missing_credentials",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Backend { .. } => "backend",
            Self::Image { .. } => "image",
        }
    }
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials { env_var } => {
                write!(f, "no vision API key configured (set {})", env_var)
            }
            Self::Network { endpoint, source } => {
                write!(f, "request to {} failed: {}", endpoint, source)
            }
            Self::Timeout {
                endpoint,
                duration_ms,
            } => write!(f, "request to {} timed out after {}ms", endpoint, duration_ms),
            Self::Status {
                endpoint,
                status,
                message,
            } => {
                if message.is_empty() {
                    write!(f, "{} responded with status {}", endpoint, status)
                } else {
                    write!(f, "{} responded with status {}: {}", endpoint, status, message)
                }
            }
            Self::Decode { endpoint, reason } => {
                write!(f, "unexpected response from {}: {}", endpoint, reason)
            }
            Self::Backend { endpoint, message } => write!(f, "{} reported: {}", endpoint, message),
            Self::Image { operation, reason } => {
                write!(f, "image preparation failed during {}: {}", operation, reason)
            }
        }
    }
}

impl StdError for PanelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Network { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for panel operations
pub type PanelResult<T> = Result<T, PanelError>;

/// What a caller can do after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Repeat the same operation
    Retry { max_attempts: usize, delay_ms: u64 },
    /// Ask the user to pick a file instead of using the camera
    FallbackToFileUpload,
    /// Ask the user to change camera permissions, then retry
    GrantPermission,
    /// Show a locally simulated result so the panel never dead-ends
    SimulatedResult,
}

/// Trait for errors that can be recovered from
pub trait Recoverable {
    /// Check if this error can be recovered from
    fn is_recoverable(&self) -> bool {
        !self.recovery_strategies().is_empty()
    }

    /// Recovery strategies, most preferred first
    fn recovery_strategies(&self) -> Vec<RecoveryStrategy>;
}

impl Recoverable for AcquisitionError {
    fn recovery_strategies(&self) -> Vec<RecoveryStrategy> {
        match self {
            Self::CapabilityUnavailable | Self::DeviceNotFound { .. } => {
                vec![RecoveryStrategy::FallbackToFileUpload]
            }
            Self::PermissionDenied { .. } => vec![
                RecoveryStrategy::GrantPermission,
                RecoveryStrategy::FallbackToFileUpload,
            ],
            Self::DeviceBusy { .. } | Self::UnknownAcquisitionError { .. } => vec![
                RecoveryStrategy::Retry {
                    max_attempts: 3,
                    delay_ms: 1000,
                },
                RecoveryStrategy::FallbackToFileUpload,
            ],
            Self::ConstraintUnsatisfiable { .. } => vec![RecoveryStrategy::FallbackToFileUpload],
            Self::CaptureEncodingError { .. } => vec![
                RecoveryStrategy::Retry {
                    max_attempts: 1,
                    delay_ms: 0,
                },
                RecoveryStrategy::FallbackToFileUpload,
            ],
            Self::FileReadError { .. } => vec![RecoveryStrategy::Retry {
                max_attempts: 1,
                delay_ms: 0,
            }],
        }
    }
}

impl Recoverable for PanelError {
    fn recovery_strategies(&self) -> Vec<RecoveryStrategy> {
        if self.is_retryable() {
            vec![
                RecoveryStrategy::Retry {
                    max_attempts: 3,
                    delay_ms: self.retry_delay_ms().unwrap_or(1000),
                },
                RecoveryStrategy::SimulatedResult,
            ]
        } else {
            vec![RecoveryStrategy::SimulatedResult]
        }
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for PanelError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Timeout { .. } => Some(1000),
            Self::Network { .. } => Some(2000),
            Self::Status { status: 429, .. } => Some(5000),
            Self::Status { .. } => Some(1000),
            _ => None,
        }
    }
}
