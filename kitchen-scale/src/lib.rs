// SPDX-License-Identifier: MIT
//! # kitchen-scale: Upload Downscaling for Vision Backends
//!
//! Captured kitchen photos are usually far larger than a hosted vision model
//! needs. This crate computes aspect-preserving scaling plans and performs the
//! actual RGBA resize on the CPU so the payload sent upstream stays small.
//!
//! ## Key Components
//!
//! - [`presets`]: Scaling plan computation and upload presets
//! - [`cpu`]: CPU scaling using `fast_image_resize` (SIMD accelerated)
//!
//! ## Usage Example
//!
//! ```rust
//! use kitchen_scale::presets::{build_plan, Size};
//!
//! let plan = build_plan(Size { w: 1280, h: 720 }, 640);
//! assert_eq!((plan.out.w, plan.out.h), (640, 360));
//! ```
//!
//! Images already within the target are never upscaled; [`presets::ScalePlan::is_identity`]
//! lets callers skip the resize entirely.

pub mod cpu;
pub mod presets;
