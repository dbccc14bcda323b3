//! Watermark persistence
//!
//! Tracks how far each resource has been extracted (sync watermark) and how
//! far each table has been loaded (load watermark). Values survive between
//! runs so the next run only fetches and loads what changed.
//!
//! # Overview
//!
//! - `WatermarkKind` - sync or load
//! - `WatermarkStore` - one atomically replaced file per watermark

mod manager;
mod types;

pub use manager::WatermarkStore;
pub use types::{Watermark, WatermarkKind};

#[cfg(test)]
mod manager_tests;
