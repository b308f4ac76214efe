//! Per-sensor feature extraction.
//!
//! The spinning scanner yields line (sharp) and plane (smooth) features
//! by curvature sorting within each ring; the solid-state scanner is
//! partitioned into planar and non-planar points by neighbourhood
//! eigen-decomposition and then re-expressed in the spin-LiDAR frame.

mod solid;
mod spin;

pub use solid::{SolidExtractor, SolidExtractorConfig};
pub use spin::{SpinExtractor, SpinExtractorConfig};

/// A frame that did not yield enough features to register safely.
///
/// Soft error: the frame is dropped with a log line and no state
/// advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotEnoughFeatures {
    /// Short human-readable reason, e.g. "spin features not enough".
    pub reason: String,
}

impl std::fmt::Display for NotEnoughFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}
