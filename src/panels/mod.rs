//! # Panels
//!
//! Each panel takes one [`CapturedImage`](crate::acquisition::CapturedImage)
//! and sends it to an analysis backend:
//!
//! | Panel | Backend | Without credentials / on failure |
//! |-------|---------|----------------------------------|
//! | [`food_waste`] | hosted vision model | simulated classification |
//! | [`recognition`] | hosted vision model | simulated description |
//! | [`garbage`] | hosted vision model | `PanelError` |
//! | [`expiry`] | hosted vision model | `PanelError` |
//! | [`inventory`] | hosted vision model | `PanelError`; unparseable replies become placeholder items |
//! | [`local`] volume | local estimator service | `PanelError` |
//! | [`local`] freshness | local detector service | `PanelError` |
//!
//! Simulated results are derived from a hash of the image payload, so the same
//! image always simulates the same way.

pub mod expiry;
pub mod food_waste;
pub mod garbage;
pub mod inventory;
pub mod local;
pub mod recognition;
pub mod vision;

pub use vision::{ChatMessage, Sampling, VisionClient};

/// Stable 64-bit FNV-1a hash of an image payload.
pub(crate) fn payload_seed(data: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    data.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}
