//! Still-image encoding for camera snapshots.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageError, RgbaImage};

use crate::capture::Frame;

/// Default JPEG quality for snapshots (0.8 on a 0–1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encoding failure for a snapshot.
#[derive(Debug)]
pub enum EncodeError {
    /// Pixel buffer length does not match the frame dimensions.
    FrameShape { width: u32, height: u32, len: usize },
    /// The frame has no pixels.
    EmptyFrame,
    /// The codec rejected the image.
    Codec(ImageError),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::FrameShape { width, height, len } => write!(
                f,
                "frame buffer of {} bytes does not match {}x{} RGBA",
                len, width, height
            ),
            EncodeError::EmptyFrame => write!(f, "frame has no pixels"),
            EncodeError::Codec(e) => write!(f, "JPEG encoder error: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ImageError> for EncodeError {
    fn from(e: ImageError) -> Self {
        Self::Codec(e)
    }
}

/// Encode an RGBA frame as JPEG at `quality` (1–100), keeping its dimensions.
pub fn frame_to_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(EncodeError::EmptyFrame);
    }
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.as_ref().clone()).ok_or(
        EncodeError::FrameShape {
            width: frame.width,
            height: frame.height,
            len: frame.data.len(),
        },
    )?;
    rgba_to_jpeg(rgba, quality)
}

/// Encode an owned RGBA image as JPEG. Alpha is discarded.
pub fn rgba_to_jpeg(rgba: RgbaImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = rgba.dimensions();
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}
