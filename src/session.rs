//! # Camera Session Lifecycle
//!
//! A [`CameraSession`] wraps one live camera stream for the duration of a
//! single acquisition attempt:
//!
//! ```text
//! Requesting ──grant──▶ (first frame) ──▶ Active ──capture/cancel/reset/error──▶ Closed
//!      │                                                                          ▲
//!      └──────────────────────────rejection / cancel──────────────────────────────┘
//! ```
//!
//! The session owns the stream exclusively and publishes the overlay view-state
//! that a frontend renders. Closing stops every hardware track and hides the
//! overlay in the same step; `close` is idempotent and also runs on drop, so
//! abandoning an acquisition mid-flight cannot leak the camera.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::capture::{DeviceFailure, Frame, FrameSize, MediaStream};

/// Lifecycle state of a camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the device to grant access (and deliver a first frame).
    Requesting,
    /// Live preview is showing; Capture and Cancel are accepted.
    Active,
    /// All tracks stopped, overlay hidden.
    Closed,
}

/// Declarative view-state for the camera overlay.
///
/// Frontends subscribe through [`crate::acquisition::ImageAcquisition::overlay`]
/// and render whatever the current value describes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OverlayState {
    /// Nothing to show.
    #[default]
    Hidden,
    /// Waiting on the camera permission prompt.
    Requesting,
    /// Live preview with Capture and Cancel controls.
    Live {
        width: u32,
        height: u32,
        instructions: String,
    },
}

impl OverlayState {
    /// Whether Capture would be honored right now.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

/// User input delivered to a running camera acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureControl {
    /// Take the snapshot. Ignored until the preview is live.
    Capture,
    /// Dismiss the camera without an image.
    Cancel,
    /// Dismiss the camera and clear any image already held.
    Reset,
}

/// One live camera stream and its overlay.
pub struct CameraSession {
    state: SessionState,
    stream: Option<Box<dyn MediaStream>>,
    overlay: Arc<watch::Sender<OverlayState>>,
    frame_size: Option<FrameSize>,
}

impl CameraSession {
    /// Start a session in the `Requesting` state.
    pub fn requesting(overlay: Arc<watch::Sender<OverlayState>>) -> Self {
        overlay.send_replace(OverlayState::Requesting);
        debug!("camera session requesting access");
        Self {
            state: SessionState::Requesting,
            stream: None,
            overlay,
            frame_size: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Size of the live frames, once the session is active.
    pub fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size
    }

    /// Hardware tracks still live in this session.
    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.active_tracks())
    }

    /// Take ownership of a granted stream.
    ///
    /// The session stays in `Requesting` until [`CameraSession::activate`]
    /// confirms the first frame.
    pub fn attach(&mut self, stream: Box<dyn MediaStream>) {
        if let Some(mut previous) = self.stream.replace(stream) {
            previous.stop();
        }
    }

    /// Wait for the first frame, then switch the overlay to the live preview.
    pub async fn activate(&mut self, instructions: &str) -> Result<FrameSize, DeviceFailure> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| DeviceFailure::Other("no stream attached".into()))?;
        let size = stream.ready().await?;

        self.frame_size = Some(size);
        self.state = SessionState::Active;
        self.overlay.send_replace(OverlayState::Live {
            width: size.width,
            height: size.height,
            instructions: instructions.to_string(),
        });
        info!(width = size.width, height = size.height, "camera preview live");
        Ok(size)
    }

    /// Copy the current preview frame.
    pub fn snapshot(&mut self) -> Result<Frame, DeviceFailure> {
        if self.state != SessionState::Active {
            return Err(DeviceFailure::Other(format!(
                "cannot snapshot a session in state {:?}",
                self.state
            )));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| DeviceFailure::Other("no stream attached".into()))?
            .snapshot()
    }

    /// Stop all tracks, hide the overlay, and move to `Closed`.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("camera tracks stopped");
        }
        self.overlay.send_replace(OverlayState::Hidden);
        self.state = SessionState::Closed;
        debug!("camera session closed");
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}
