//! # Processing Module
//!
//! In-memory image transformations between acquisition and upload: data URI
//! encoding, snapshot JPEG encoding, and upload downscaling.

pub mod data_uri;
pub mod encode;
pub mod upload;

// Re-export commonly used items for convenience
pub use data_uri::DataUri;
pub use encode::{DEFAULT_JPEG_QUALITY, EncodeError, frame_to_jpeg};
pub use upload::fit_data_uri;
