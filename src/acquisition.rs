//! # Image Acquisition
//!
//! Obtains one image per request, either from a file the user picked or from
//! a live camera snapshot, and hands it to panels as a [`CapturedImage`].
//!
//! ## Sources
//!
//! - **File pick**: the file is read asynchronously and wrapped in a base64
//!   data URI. Works everywhere and is the fallback whenever the camera path
//!   fails.
//! - **Camera capture**: runs a [`CameraSession`] against the configured
//!   [`MediaDevices`]. The caller drives it with [`CaptureControl`] messages
//!   and renders the [`OverlayState`] published through
//!   [`ImageAcquisition::overlay`].
//!
//! ## Guarantees
//!
//! - Every camera exit path (capture, cancel, reset, rejection, encoding
//!   failure, a dropped future) stops all hardware tracks.
//! - `acquire_from_camera` takes `&mut self`, so one acquisition owns at most
//!   one session at a time.
//! - Failures are returned as [`AcquisitionError`] values carrying a
//!   user-readable message; the acquisition stays usable afterwards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kitchen_capture::acquisition::ImageAcquisition;
//! use kitchen_capture::capture::pattern::PatternDevices;
//! use kitchen_capture::config::AcquisitionConfig;
//! use kitchen_capture::session::CaptureControl;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let devices = Arc::new(PatternDevices::new());
//! let mut acquisition = ImageAcquisition::new(Some(devices), AcquisitionConfig::default());
//!
//! let (controls, mut rx) = tokio::sync::mpsc::channel(4);
//! let mut overlay = acquisition.overlay();
//! tokio::spawn(async move {
//!     // Capture is ignored until the preview is live
//!     if overlay.wait_for(|state| state.is_live()).await.is_ok() {
//!         let _ = controls.send(CaptureControl::Capture).await;
//!     }
//! });
//! if let Some(image) = acquisition.acquire_from_camera(&mut rx).await? {
//!     println!("captured {} bytes", image.byte_size());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::capture::{FrameSize, MediaDevices};
use crate::config::AcquisitionConfig;
use crate::error::{AcquisitionError, AcquisitionResult};
use crate::processing::data_uri::{self, DataUri, OCTET_STREAM};
use crate::processing::frame_to_jpeg;
use crate::session::{CameraSession, CaptureControl, OverlayState};

/// Where an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    FilePick,
    CameraCapture,
}

impl ImageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FilePick => "file",
            Self::CameraCapture => "camera",
        }
    }
}

/// An acquired image, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    data_uri: String,
    origin: ImageSource,
    byte_size: usize,
    mime: String,
    dimensions: Option<FrameSize>,
}

impl CapturedImage {
    /// Wrap raw image bytes.
    pub fn from_bytes(
        bytes: &[u8],
        mime: impl Into<String>,
        origin: ImageSource,
        dimensions: Option<FrameSize>,
    ) -> Self {
        let mime = mime.into();
        Self {
            data_uri: data_uri::encode(&mime, bytes),
            origin,
            byte_size: bytes.len(),
            mime,
            dimensions,
        }
    }

    /// The image as `data:<mime>;base64,<payload>`.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn origin(&self) -> ImageSource {
        self.origin
    }

    /// Size of the decoded image bytes.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Pixel size, known for camera captures.
    pub fn dimensions(&self) -> Option<FrameSize> {
        self.dimensions
    }

    /// Decode the data URI back to raw bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, String> {
        DataUri::parse(&self.data_uri).map(|parsed| parsed.bytes)
    }

    /// File name to use for multipart uploads.
    pub fn upload_file_name(&self) -> String {
        let ext = match self.mime.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "bin",
        };
        format!("{}.{}", self.origin.as_str(), ext)
    }
}

/// Why a camera acquisition ended without an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dismissal {
    Cancel,
    Reset,
}

enum Step<T> {
    Done(T),
    Dismissed(Dismissal),
}

/// Wait for a Cancel or Reset. Capture requests are ignored; a closed
/// control channel counts as Cancel.
async fn until_dismissed(controls: &mut mpsc::Receiver<CaptureControl>) -> Dismissal {
    loop {
        match controls.recv().await {
            Some(CaptureControl::Capture) => {
                debug!("capture requested before preview is live, ignoring");
            }
            Some(CaptureControl::Cancel) | None => return Dismissal::Cancel,
            Some(CaptureControl::Reset) => return Dismissal::Reset,
        }
    }
}

/// Image acquisition for one panel.
pub struct ImageAcquisition {
    devices: Option<Arc<dyn MediaDevices>>,
    config: AcquisitionConfig,
    overlay: Arc<watch::Sender<OverlayState>>,
    held: Option<CapturedImage>,
}

impl ImageAcquisition {
    /// `devices` is `None` when the platform has no capture capability.
    pub fn new(devices: Option<Arc<dyn MediaDevices>>, config: AcquisitionConfig) -> Self {
        let (overlay, _) = watch::channel(OverlayState::Hidden);
        Self {
            devices,
            config,
            overlay: Arc::new(overlay),
            held: None,
        }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Whether camera capture can be offered at all.
    pub fn camera_available(&self) -> bool {
        self.devices.is_some()
    }

    /// Subscribe to overlay view-state changes.
    pub fn overlay(&self) -> watch::Receiver<OverlayState> {
        self.overlay.subscribe()
    }

    /// The image currently held, if any.
    pub fn current(&self) -> Option<&CapturedImage> {
        self.held.as_ref()
    }

    /// Drop the held image and return to the empty state.
    pub fn reset(&mut self) {
        if self.held.take().is_some() {
            debug!("held image cleared");
        }
        self.overlay.send_replace(OverlayState::Hidden);
    }

    /// Read a user-selected file into a data URI.
    ///
    /// The mime type comes from the extension, then from the content, then
    /// falls back to `application/octet-stream`.
    pub async fn acquire_from_file(&mut self, path: impl AsRef<Path>) -> AcquisitionResult<CapturedImage> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "file read failed");
            AcquisitionError::file_read(path.display().to_string(), e)
        })?;

        let mime = data_uri::mime_from_extension(path)
            .or_else(|| data_uri::mime_from_content(&bytes))
            .unwrap_or(OCTET_STREAM);
        info!(path = %path.display(), bytes = bytes.len(), mime, "image acquired from file");

        Ok(self.hold(CapturedImage::from_bytes(&bytes, mime, ImageSource::FilePick, None)))
    }

    /// Wrap bytes that were already read (e.g. from stdin). `name` is only
    /// consulted for its extension.
    pub fn acquire_from_bytes(&mut self, name: &str, bytes: &[u8]) -> CapturedImage {
        let mime = data_uri::mime_from_extension(Path::new(name))
            .or_else(|| data_uri::mime_from_content(bytes))
            .unwrap_or(OCTET_STREAM);
        info!(name, bytes = bytes.len(), mime, "image acquired from memory");
        self.hold(CapturedImage::from_bytes(bytes, mime, ImageSource::FilePick, None))
    }

    /// Run one camera session until the user captures or dismisses it.
    ///
    /// Returns `Ok(None)` on Cancel or Reset (Reset also clears the held
    /// image), `Ok(Some(_))` on a successful capture, and an error when the
    /// camera is unavailable, rejected, or the snapshot cannot be encoded.
    /// In every case all tracks are stopped and the overlay is hidden before
    /// this returns.
    pub async fn acquire_from_camera(
        &mut self,
        controls: &mut mpsc::Receiver<CaptureControl>,
    ) -> AcquisitionResult<Option<CapturedImage>> {
        let Some(devices) = self.devices.clone() else {
            warn!("camera requested but media capture is unavailable");
            return Err(AcquisitionError::CapabilityUnavailable);
        };

        let constraints = self.config.constraints();
        debug!(
            device = devices.name(),
            facing = constraints.facing_mode.as_str(),
            width = constraints.resolution.width,
            height = constraints.resolution.height,
            exact = constraints.resolution.exact,
            "requesting camera"
        );
        let mut session = CameraSession::requesting(Arc::clone(&self.overlay));

        // Capture is only honored once the overlay is live; until then only
        // Cancel and Reset end the session.
        let opened = tokio::select! {
            biased;
            opened = devices.open(&constraints) => Step::Done(opened),
            dismissal = until_dismissed(controls) => Step::Dismissed(dismissal),
        };
        match opened {
            Step::Done(Ok(stream)) => session.attach(stream),
            Step::Done(Err(failure)) => {
                session.close();
                let error = AcquisitionError::from(failure);
                warn!(kind = error.kind(), error = %error, "camera request rejected");
                return Err(error);
            }
            Step::Dismissed(dismissal) => return Ok(self.dismiss(&mut session, dismissal)),
        }

        let ready = tokio::select! {
            biased;
            ready = session.activate(&self.config.instructions) => Step::Done(ready),
            dismissal = until_dismissed(controls) => Step::Dismissed(dismissal),
        };
        match ready {
            Step::Done(Ok(_)) => {}
            Step::Done(Err(failure)) => {
                session.close();
                let error = AcquisitionError::from(failure);
                warn!(kind = error.kind(), error = %error, "camera stream failed to start");
                return Err(error);
            }
            Step::Dismissed(dismissal) => return Ok(self.dismiss(&mut session, dismissal)),
        }

        let dismissal = match controls.recv().await {
            Some(CaptureControl::Capture) => {
                let captured = self.snapshot(&mut session);
                session.close();
                return captured.map(|image| Some(self.hold(image)));
            }
            Some(CaptureControl::Cancel) | None => Dismissal::Cancel,
            Some(CaptureControl::Reset) => Dismissal::Reset,
        };
        Ok(self.dismiss(&mut session, dismissal))
    }

    fn snapshot(&self, session: &mut CameraSession) -> AcquisitionResult<CapturedImage> {
        let frame = session.snapshot().map_err(|e| {
            warn!(error = %e, "could not read preview frame");
            AcquisitionError::encoding_with("could not read preview frame", e)
        })?;
        let jpeg = frame_to_jpeg(&frame, self.config.jpeg_quality).map_err(|e| {
            warn!(error = %e, "snapshot encoding failed");
            AcquisitionError::encoding_with("could not encode snapshot as JPEG", e)
        })?;
        info!(
            width = frame.width,
            height = frame.height,
            bytes = jpeg.len(),
            "image captured from camera"
        );
        Ok(CapturedImage::from_bytes(
            &jpeg,
            "image/jpeg",
            ImageSource::CameraCapture,
            Some(frame.size()),
        ))
    }

    fn dismiss(&mut self, session: &mut CameraSession, dismissal: Dismissal) -> Option<CapturedImage> {
        session.close();
        match dismissal {
            Dismissal::Cancel => info!("camera cancelled"),
            Dismissal::Reset => {
                info!("camera reset");
                self.reset();
            }
        }
        None
    }

    fn hold(&mut self, image: CapturedImage) -> CapturedImage {
        self.held = Some(image.clone());
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::DeviceFailure;
    use crate::capture::pattern::PatternDevices;

    fn acquisition(devices: &PatternDevices) -> ImageAcquisition {
        let devices: Arc<dyn MediaDevices> = Arc::new(devices.clone());
        ImageAcquisition::new(Some(devices), AcquisitionConfig::default())
    }

    /// Send Capture as soon as the preview goes live.
    fn capture_when_live(acq: &ImageAcquisition, tx: mpsc::Sender<CaptureControl>) {
        let mut overlay = acq.overlay();
        tokio::spawn(async move {
            if overlay.wait_for(OverlayState::is_live).await.is_ok() {
                let _ = tx.send(CaptureControl::Capture).await;
            }
        });
    }

    #[tokio::test]
    async fn test_capture_produces_jpeg_and_releases_tracks() {
        let devices = PatternDevices::new();
        let mut acq = acquisition(&devices);
        let (tx, mut rx) = mpsc::channel(4);
        capture_when_live(&acq, tx);

        let image = acq.acquire_from_camera(&mut rx).await.unwrap().unwrap();
        assert_eq!(image.origin(), ImageSource::CameraCapture);
        assert_eq!(image.mime(), "image/jpeg");
        assert!(image.data_uri().starts_with("data:image/jpeg;base64,"));
        assert_eq!(image.decode_bytes().unwrap().len(), image.byte_size());
        assert_eq!(
            image.dimensions(),
            Some(FrameSize {
                width: 1280,
                height: 720
            })
        );
        assert_eq!(devices.active_tracks(), 0);
        assert_eq!(acq.current(), Some(&image));
        assert_eq!(*acq.overlay().borrow(), OverlayState::Hidden);
    }

    #[tokio::test]
    async fn test_capture_before_preview_is_ignored() {
        let devices = PatternDevices::new();
        let mut acq = acquisition(&devices);
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(CaptureControl::Capture).await.unwrap();
        capture_when_live(&acq, tx);

        let image = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            acq.acquire_from_camera(&mut rx),
        )
        .await
        .expect("acquisition stalled")
        .unwrap();
        assert!(image.is_some());
        assert_eq!(devices.active_tracks(), 0);
    }

    #[tokio::test]
    async fn test_cancel_returns_nothing() {
        let devices = PatternDevices::new();
        let mut acq = acquisition(&devices);
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(CaptureControl::Cancel).await.unwrap();

        assert!(acq.acquire_from_camera(&mut rx).await.unwrap().is_none());
        assert_eq!(devices.active_tracks(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_held_image() {
        let devices = PatternDevices::new();
        let mut acq = acquisition(&devices);
        acq.acquire_from_bytes("note.txt", b"not an image");
        assert!(acq.current().is_some());

        let (tx, mut rx) = mpsc::channel(4);
        tx.send(CaptureControl::Reset).await.unwrap();
        assert!(acq.acquire_from_camera(&mut rx).await.unwrap().is_none());
        assert!(acq.current().is_none());
        assert_eq!(devices.active_tracks(), 0);
    }

    #[tokio::test]
    async fn test_no_capability() {
        let mut acq = ImageAcquisition::new(None, AcquisitionConfig::default());
        let (_tx, mut rx) = mpsc::channel(1);
        let err = acq.acquire_from_camera(&mut rx).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::CapabilityUnavailable));
        assert!(!acq.camera_available());
    }

    #[tokio::test]
    async fn test_rejection_maps_to_kind() {
        let devices = PatternDevices::failing(DeviceFailure::Busy("Could not start video source".into()));
        let mut acq = acquisition(&devices);
        let (_tx, mut rx) = mpsc::channel(1);
        let err = acq.acquire_from_camera(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), "device_busy");
        assert_eq!(*acq.overlay().borrow(), OverlayState::Hidden);
    }

    #[test]
    fn test_upload_file_name() {
        let image = CapturedImage::from_bytes(&[1, 2], "image/png", ImageSource::FilePick, None);
        assert_eq!(image.upload_file_name(), "file.png");
        let image = CapturedImage::from_bytes(&[1, 2], OCTET_STREAM, ImageSource::CameraCapture, None);
        assert_eq!(image.upload_file_name(), "camera.bin");
    }
}
