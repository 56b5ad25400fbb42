// SPDX-License-Identifier: MIT
//! # Scaling Presets and Plan Computation
//!
//! Plans are computed once per image and describe the output size of a resize.
//! The only constraint is a cap on the longest side; the other side follows
//! from the source aspect ratio.
//!
//! Rounding happens after the floating-point scale factor is applied and every
//! dimension is clamped to at least 1px. Sources smaller than the cap are left
//! unchanged.

/// A 2D size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// Scaling plan computed from the input parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Longest-side cap used for planning
    pub max_long_side: u32,
    /// Final output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the plan would produce the input unchanged.
    pub fn is_identity(&self) -> bool {
        self.input == self.out
    }
}

/// Compute a plan that fits `input` within `max_long_side` on its longest
/// side, preserving aspect ratio. Never upscales.
pub fn build_plan(input: Size, max_long_side: u32) -> ScalePlan {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let s = (max_long_side.max(1) as f64 / w.max(h)).min(1.0);
    ScalePlan {
        input,
        max_long_side,
        out: Size {
            w: ((w * s).round() as u32).max(1),
            h: ((h * s).round() as u32).max(1),
        },
    }
}

/// Upload presets for vision requests.
///
/// Each preset caps the longest side of the uploaded image. `Original` sends the
/// capture untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UploadPreset {
    /// No downscaling
    #[clap(name = "original")]
    Original,
    /// Longest side 1280px, keeps label text legible
    #[clap(name = "long1280")]
    Long1280,
    /// Longest side 1024px
    #[clap(name = "long1024")]
    Long1024,
    /// Longest side 640px, smallest payload
    #[clap(name = "long640")]
    Long640,
}

impl UploadPreset {
    /// Longest-side cap in pixels, or `None` for [`UploadPreset::Original`].
    pub fn max_long_side(self) -> Option<u32> {
        match self {
            UploadPreset::Original => None,
            UploadPreset::Long1280 => Some(1280),
            UploadPreset::Long1024 => Some(1024),
            UploadPreset::Long640 => Some(640),
        }
    }
}
