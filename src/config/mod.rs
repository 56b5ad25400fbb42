//! # Configuration Module
//!
//! Acquisition and panel configuration, passed explicitly to the components that need it.

pub mod config;

pub use config::{AcquisitionConfig, PanelConfig};
