//! Error types for the surfacing pipeline.

use glam::Vec3;
use thiserror::Error;

/// Errors surfaced to callers of the extraction pipeline and decimator.
///
/// Per-cell and per-line failures are recoverable: the pipeline logs them and
/// skips the offending feature rather than aborting the volume. Internal
/// invariant violations are debug assertions, not error values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfacingError {
    /// A ray marched from `origin` never reached the iso-surface within
    /// tolerance. Usually a misconfigured starting point or direction.
    #[error("no surface found within tolerance from {origin} along {direction}")]
    SurfaceNotFound {
        /// Ray origin.
        origin: Vec3,
        /// Ray direction.
        direction: Vec3,
    },

    /// A line aggregate had too few contours to pick a farthest endpoint
    /// pair. Needs at least two.
    #[error("line aggregate needs at least two contours, got {have}")]
    InsufficientSamples {
        /// Number of contours the aggregate held.
        have: usize,
    },

    /// Cooperative cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,
}
