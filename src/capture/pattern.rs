//! # Synthetic Test-Pattern Camera
//!
//! A camera that needs no hardware: frames are a horizontal/vertical gradient
//! at the requested resolution. Used by the CLI `--camera pattern` mode and as
//! a deterministic backend in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{DeviceFailure, Frame, FrameSize, MediaConstraints, MediaDevices, MediaStream};

/// Largest frame the pattern camera produces, like a 4K webcam.
pub const MAX_FRAME: FrameSize = FrameSize {
    width: 3840,
    height: 2160,
};

/// Test-pattern device.
///
/// `active_tracks` is shared with every stream it opens so callers can observe
/// whether hardware would still be held.
#[derive(Debug, Clone, Default)]
pub struct PatternDevices {
    fail_with: Option<DeviceFailure>,
    active_tracks: Arc<AtomicUsize>,
}

impl PatternDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` call is rejected with `failure`.
    pub fn failing(failure: DeviceFailure) -> Self {
        Self {
            fail_with: Some(failure),
            active_tracks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Tracks currently live across all streams from this device.
    pub fn active_tracks(&self) -> usize {
        self.active_tracks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for PatternDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, DeviceFailure> {
        if let Some(failure) = &self.fail_with {
            return Err(failure.clone());
        }
        let hint = constraints.resolution;
        if hint.exact && (hint.width > MAX_FRAME.width || hint.height > MAX_FRAME.height) {
            return Err(DeviceFailure::Overconstrained(format!(
                "{}x{} exceeds {}x{}",
                hint.width, hint.height, MAX_FRAME.width, MAX_FRAME.height
            )));
        }
        let width = hint.width.clamp(1, MAX_FRAME.width);
        let height = hint.height.clamp(1, MAX_FRAME.height);
        self.active_tracks.fetch_add(1, Ordering::SeqCst);
        debug!(width, height, facing = constraints.facing_mode.as_str(), "pattern stream opened");
        Ok(Box::new(PatternStream {
            width,
            height,
            frame_index: 0,
            live: true,
            active_tracks: Arc::clone(&self.active_tracks),
        }))
    }

    fn name(&self) -> &str {
        "pattern"
    }
}

struct PatternStream {
    width: u32,
    height: u32,
    frame_index: u32,
    live: bool,
    active_tracks: Arc<AtomicUsize>,
}

impl PatternStream {
    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.frame_index % 256) as u8;
        let mut data = vec![0u8; w * h * 4];
        for (y, row) in data.chunks_exact_mut(w * 4).enumerate() {
            let green = (y * 255 / h) as u8;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                px[0] = (x * 255 / w) as u8;
                px[1] = green;
                px[2] = 128u8.wrapping_add(shift);
                px[3] = 255;
            }
        }
        data
    }
}

#[async_trait]
impl MediaStream for PatternStream {
    async fn ready(&mut self) -> Result<FrameSize, DeviceFailure> {
        if !self.live {
            return Err(DeviceFailure::Other("stream already stopped".into()));
        }
        tokio::task::yield_now().await;
        Ok(FrameSize {
            width: self.width,
            height: self.height,
        })
    }

    fn snapshot(&mut self) -> Result<Frame, DeviceFailure> {
        if !self.live {
            return Err(DeviceFailure::Other("stream already stopped".into()));
        }
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(Frame {
            width: self.width,
            height: self.height,
            data: Arc::new(self.render()),
        })
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.active_tracks.fetch_sub(1, Ordering::SeqCst);
            debug!("pattern stream stopped");
        }
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.live)
    }
}

impl Drop for PatternStream {
    fn drop(&mut self) {
        self.stop();
    }
}
