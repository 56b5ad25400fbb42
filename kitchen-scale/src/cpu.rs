// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, direct write into caller-provided dst buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::presets::{ScalePlan, Size};

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall => write!(f, "Output buffer too small"),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Resize tightly packed RGBA8 pixels according to `plan`.
///
/// `dst` must hold at least `plan.out.w * plan.out.h * 4` bytes.
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    plan: &ScalePlan,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    let dst_len = (plan.out.w as usize) * (plan.out.h as usize) * 4;
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, src_rgba)?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, &mut dst[..dst_len])?;

    // Photos are opaque; alpha premultiplication would only cost time.
    let opts = ResizeOptions::new().use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;

    Ok(())
}

/// Allocate the output buffer and resize in one call.
pub fn scale_rgba_to_vec(src_rgba: &[u8], src: Size, plan: &ScalePlan) -> Result<Vec<u8>, ScaleError> {
    let mut out = vec![0u8; (plan.out.w as usize) * (plan.out.h as usize) * 4];
    let mut resizer = Resizer::new();
    scale_rgba_cpu(&mut resizer, src_rgba, src, plan, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::build_plan;

    #[test]
    fn test_solid_color_survives_downscale() {
        let src = Size { w: 8, h: 4 };
        let data: Vec<u8> = [200u8, 40, 10, 255].repeat(32);
        let plan = build_plan(src, 4);
        let out = scale_rgba_to_vec(&data, src, &plan).unwrap();

        assert_eq!(out.len(), 4 * 2 * 4);
        for px in out.chunks_exact(4) {
            assert!(px[0].abs_diff(200) <= 1);
            assert!(px[1].abs_diff(40) <= 1);
            assert!(px[2].abs_diff(10) <= 1);
        }
    }

    #[test]
    fn test_rejects_short_destination() {
        let src = Size { w: 4, h: 4 };
        let data = vec![0u8; 64];
        let plan = build_plan(src, 2);
        let mut dst = vec![0u8; 3];
        let mut resizer = Resizer::new();
        let err = scale_rgba_cpu(&mut resizer, &data, src, &plan, &mut dst).unwrap_err();
        assert!(matches!(err, ScaleError::BufferTooSmall));
    }
}
