//! # isoedge
//!
//! Sharp-feature edge extraction from signed distance fields.
//!
//! Instead of polygonizing the whole iso-surface, this crate samples a
//! caller-supplied distance function on a cell grid, detects where surface
//! normals disagree (the sharp creases and corners of the solid), aggregates
//! those detections into feature lines and stitches them into one clean
//! wireframe edge-set. A quadric-error decimator for triangle meshes is
//! included for reducing companion surface geometry.
//!
//! ## Example
//!
//! ```rust
//! use isoedge::prelude::*;
//! use glam::Vec3;
//!
//! // Unit cube as a signed distance function
//! let cube = |p: Vec3| {
//!     let q = p.abs() - Vec3::splat(1.0);
//!     q.max(Vec3::ZERO).length() + q.x.max(q.y).max(q.z).min(0.0)
//! };
//!
//! let config = SurfacingConfig::new(0.05, 1.0, 4);
//! let edges = extract_edges(&cube, &config).expect("extraction failed");
//! assert!(!edges.is_empty());
//! ```

#![warn(missing_docs)]

pub mod contour;
pub mod decimate;
pub mod error;
pub mod lines;
pub mod merge;
pub mod pipeline;
pub mod sampling;
pub mod spatial;
pub mod topology;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::contour::Contour;
    pub use crate::decimate::{simplify, DecimateOptions, TriangleMesh};
    pub use crate::error::SurfacingError;
    pub use crate::pipeline::{extract_edges, extract_edges_with, extract_edges_within};
    pub use crate::sampling::{find_surfacing_start, scene_grid_bounds};
    pub use crate::types::{
        CancelFlag, DistanceFn, EdgeSet, GridBounds, SurfacingConfig, Thresholds,
    };
    pub use glam::{IVec3, Vec3};
}

// Re-exports for convenience
pub use error::SurfacingError;
pub use pipeline::{extract_edges, extract_edges_with};
pub use types::{CancelFlag, EdgeSet, SurfacingConfig};
