//! # V4L2 Webcam Backend
//!
//! Linux webcams through the `v4l` crate. The device is opened and configured
//! on a blocking task so open errors surface from `MediaDevices::open`; frames
//! are then pulled by a dedicated worker thread that keeps only the latest
//! decoded frame. Dequeues wait at most [`DEQUEUE_TIMEOUT`], so a stalled or
//! unplugged camera still lets the worker notice the cleared running flag;
//! stopping the stream joins the worker, which releases the device handle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use super::{DeviceFailure, Frame, FrameSize, MediaConstraints, MediaDevices, MediaStream};

const EBUSY: i32 = 16;
const BUFFER_COUNT: u32 = 4;

/// Upper bound on a single buffer dequeue, and so on how long `stop` waits.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(250);

/// V4L2 device selected by path (default `/dev/video0`).
#[derive(Debug, Clone)]
pub struct V4lDevices {
    path: String,
}

impl V4lDevices {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for V4lDevices {
    fn default() -> Self {
        Self::with_path("/dev/video0")
    }
}

#[async_trait]
impl MediaDevices for V4lDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, DeviceFailure> {
        let path = self.path.clone();
        let constraints = *constraints;
        // V4L2 exposes no facing information; every device is treated as a match.
        debug!(
            path = %path,
            facing = constraints.facing_mode.as_str(),
            "facing mode is not selectable on V4L2"
        );

        let (dev, fourcc, size) =
            tokio::task::spawn_blocking(move || configure_device(&path, &constraints))
                .await
                .map_err(|e| DeviceFailure::Other(format!("device setup task failed: {}", e)))??;

        info!(
            path = %self.path,
            width = size.width,
            height = size.height,
            fourcc = %fourcc,
            "V4L2 stream granted"
        );

        let running = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = {
            let running = Arc::clone(&running);
            let latest = Arc::clone(&latest);
            std::thread::Builder::new()
                .name("v4l-capture".into())
                .spawn(move || capture_loop(dev, fourcc, size, running, latest, ready_tx))
                .map_err(|e| DeviceFailure::Other(format!("failed to start capture thread: {}", e)))?
        };

        Ok(Box::new(V4lStream {
            running,
            latest,
            ready_rx: Some(ready_rx),
            worker: Some(worker),
        }))
    }

    fn name(&self) -> &str {
        "v4l2"
    }
}

fn configure_device(
    path: &str,
    constraints: &MediaConstraints,
) -> Result<(Device, FourCC, FrameSize), DeviceFailure> {
    let dev = Device::with_path(path).map_err(failure_from_io)?;

    let mut format = dev.format().map_err(failure_from_io)?;
    format.width = constraints.resolution.width;
    format.height = constraints.resolution.height;
    format.fourcc = FourCC::new(b"MJPG");

    let granted = match dev.set_format(&format) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "could not set MJPG format, falling back to YUYV");
            format.fourcc = FourCC::new(b"YUYV");
            dev.set_format(&format).map_err(failure_from_io)?
        }
    };

    if constraints.resolution.exact
        && (granted.width != constraints.resolution.width
            || granted.height != constraints.resolution.height)
    {
        return Err(DeviceFailure::Overconstrained(format!(
            "requested {}x{}, device offers {}x{}",
            constraints.resolution.width,
            constraints.resolution.height,
            granted.width,
            granted.height
        )));
    }

    let fourcc = granted.fourcc;
    if fourcc != FourCC::new(b"MJPG") && fourcc != FourCC::new(b"YUYV") {
        return Err(DeviceFailure::Overconstrained(format!(
            "unsupported pixel format {}",
            fourcc
        )));
    }

    Ok((
        dev,
        fourcc,
        FrameSize {
            width: granted.width,
            height: granted.height,
        },
    ))
}

/// Classify an I/O failure from the V4L2 layer.
fn failure_from_io(error: io::Error) -> DeviceFailure {
    let message = error.to_string();
    match error.kind() {
        io::ErrorKind::NotFound => DeviceFailure::NotFound(message),
        io::ErrorKind::PermissionDenied => DeviceFailure::Denied(message),
        _ if error.raw_os_error() == Some(EBUSY) => DeviceFailure::Busy(message),
        _ => DeviceFailure::Other(message),
    }
}

fn capture_loop(
    mut dev: Device,
    fourcc: FourCC,
    size: FrameSize,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<Frame>>>,
    ready_tx: oneshot::Sender<Result<FrameSize, DeviceFailure>>,
) {
    let mut ready_tx = Some(ready_tx);

    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, BUFFER_COUNT) {
        Ok(stream) => stream,
        Err(e) => {
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(Err(failure_from_io(e)));
            }
            return;
        }
    };
    stream.set_timeout(DEQUEUE_TIMEOUT);

    while running.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if is_stall(&e) => {
                debug!("no V4L2 buffer within {:?}", DEQUEUE_TIMEOUT);
                continue;
            }
            Err(e) => {
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Err(failure_from_io(e)));
                    return;
                }
                warn!(error = %e, "failed to dequeue V4L2 buffer");
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        let rgba = match decode_frame(fourcc, buf, size) {
            Some(rgba) => rgba,
            None => {
                debug!(sequence = meta.sequence, "skipping undecodable frame");
                continue;
            }
        };

        if let Ok(mut slot) = latest.lock() {
            *slot = Some(Frame {
                width: size.width,
                height: size.height,
                data: Arc::new(rgba),
            });
        }
        if let Some(tx) = ready_tx.take() {
            let _ = tx.send(Ok(size));
        }
    }

    debug!("V4L2 capture loop ended");
}

/// A dequeue that ran out of time rather than failed.
fn is_stall(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn decode_frame(fourcc: FourCC, buf: &[u8], size: FrameSize) -> Option<Vec<u8>> {
    if fourcc == FourCC::new(b"MJPG") {
        let decoded = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg).ok()?;
        let rgba = decoded.to_rgba8();
        if rgba.width() != size.width || rgba.height() != size.height {
            return None;
        }
        Some(rgba.into_raw())
    } else {
        yuyv_to_rgba(buf, size.width, size.height)
    }
}

/// Convert packed YUYV 4:2:2 to RGBA8 (BT.601, limited range).
pub fn yuyv_to_rgba(buf: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = (width as usize) * (height as usize);
    if buf.len() < pixels * 2 || width % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(pixels * 4);
    for chunk in buf[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        for y in [y0, y1] {
            let c = y as f32 - 16.0;
            let d = u as f32 - 128.0;
            let e = v as f32 - 128.0;
            let r = 1.164 * c + 1.596 * e;
            let g = 1.164 * c - 0.392 * d - 0.813 * e;
            let b = 1.164 * c + 2.017 * d;
            out.extend_from_slice(&[clamp_u8(r), clamp_u8(g), clamp_u8(b), 255]);
        }
    }
    Some(out)
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

struct V4lStream {
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<Frame>>>,
    ready_rx: Option<oneshot::Receiver<Result<FrameSize, DeviceFailure>>>,
    worker: Option<JoinHandle<()>>,
}

#[async_trait]
impl MediaStream for V4lStream {
    async fn ready(&mut self) -> Result<FrameSize, DeviceFailure> {
        let rx = self
            .ready_rx
            .take()
            .ok_or_else(|| DeviceFailure::Other("stream readiness already consumed".into()))?;
        rx.await
            .map_err(|_| DeviceFailure::Other("capture thread exited before first frame".into()))?
    }

    fn snapshot(&mut self) -> Result<Frame, DeviceFailure> {
        let slot = self
            .latest
            .lock()
            .map_err(|_| DeviceFailure::Other("frame slot poisoned".into()))?;
        slot.clone()
            .ok_or_else(|| DeviceFailure::Other("no frame captured yet".into()))
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("V4L2 capture thread panicked");
            }
            info!("V4L2 stream stopped");
        }
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.worker.is_some())
    }
}

impl Drop for V4lStream {
    fn drop(&mut self) {
        self.stop();
    }
}
