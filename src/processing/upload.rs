//! Upload preparation: cap the longest side of an image before it is sent to a
//! vision backend. Images already within the cap pass through byte-for-byte.

use image::RgbaImage;
use kitchen_scale::cpu::scale_rgba_to_vec;
use kitchen_scale::presets::{Size, build_plan};
use tracing::debug;

use super::data_uri::{self, DataUri};
use super::encode::rgba_to_jpeg;

/// JPEG quality used when a downscaled copy has to be re-encoded.
pub const UPLOAD_JPEG_QUALITY: u8 = 85;

/// Return a data URI whose image is at most `max_long_side` pixels on its
/// longest side. `None` disables scaling.
pub fn fit_data_uri(uri: &str, max_long_side: Option<u32>) -> Result<String, String> {
    let Some(max_long_side) = max_long_side else {
        return Ok(uri.to_string());
    };

    let parsed = DataUri::parse(uri)?;
    let decoded = image::load_from_memory(&parsed.bytes)
        .map_err(|e| format!("cannot decode {} image: {}", parsed.mime, e))?;
    let input = Size {
        w: decoded.width(),
        h: decoded.height(),
    };

    let plan = build_plan(input, max_long_side);
    if plan.is_identity() {
        return Ok(uri.to_string());
    }

    let rgba = decoded.to_rgba8();
    let scaled = scale_rgba_to_vec(rgba.as_raw(), input, &plan).map_err(|e| e.to_string())?;
    let scaled = RgbaImage::from_raw(plan.out.w, plan.out.h, scaled)
        .ok_or_else(|| "scaled buffer has unexpected length".to_string())?;
    let jpeg = rgba_to_jpeg(scaled, UPLOAD_JPEG_QUALITY).map_err(|e| e.to_string())?;

    debug!(
        from_w = input.w,
        from_h = input.h,
        to_w = plan.out.w,
        to_h = plan.out.h,
        bytes = jpeg.len(),
        "downscaled image for upload"
    );
    Ok(data_uri::encode("image/jpeg", &jpeg))
}
