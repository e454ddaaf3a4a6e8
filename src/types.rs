//! Core data model for the surfacing pipeline.
//!
//! The distance function is always supplied by the caller and never owned
//! here. Edge connectivity uses an arena of vertices plus integer index
//! pairs; all "same vertex" decisions go through a tolerance-based spatial
//! lookup rather than float equality.

use crate::spatial::PointGrid;
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A signed distance field: positive outside the solid, negative inside,
/// magnitude approximately the distance to the boundary.
///
/// Must be deterministic and reasonably smooth so finite-difference normals
/// are stable. Called many times per point.
pub type DistanceFn = dyn Fn(Vec3) -> f32;

/// Empirically tuned alignment constants used across the pipeline.
///
/// These started life as literals in the detection and merge code. None of
/// the specific values are load-bearing beyond "roughly aligned" or "roughly
/// opposite"; they are exposed here so callers can calibrate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum `|dot|` between contour directions for two contours to join
    /// the same line aggregate.
    pub line_alignment: f32,
    /// Minimum `|dot|` for a group of coincident contours to count as pure
    /// duplicates rather than a pivot (line intersection).
    pub pivot_alignment: f32,
    /// Minimum `|dot|` between two edges meeting at a degree-2 vertex for
    /// them to be unified into one spanning edge.
    pub colinear_merge: f32,
    /// `|dot|` above which a collapsed triangle's outgoing edges count as
    /// degenerate (near-colinear).
    pub degenerate_edge: f32,
    /// Dot product below which a collapse is rejected for flipping a
    /// neighboring triangle's normal.
    pub normal_flip: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            line_alignment: 0.9,
            pivot_alignment: 0.82,
            colinear_merge: 0.8,
            degenerate_edge: 0.999,
            normal_flip: 0.2,
        }
    }
}

/// Sampling configuration for the surfacing pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SurfacingConfig {
    /// Minimum normal variance for a sample pair to yield a contour.
    pub tolerance: f32,
    /// World-space size of one grid cell.
    pub cell_size: f32,
    /// Sub-samples per axis per cell.
    pub sub_cells: u32,
    /// Alignment calibration constants.
    pub thresholds: Thresholds,
}

impl SurfacingConfig {
    /// Create a config with default thresholds.
    pub fn new(tolerance: f32, cell_size: f32, sub_cells: u32) -> Self {
        SurfacingConfig {
            tolerance,
            cell_size,
            sub_cells,
            thresholds: Thresholds::default(),
        }
    }

    /// World-space distance between two adjacent sub-samples.
    #[inline]
    pub fn sub_step(&self) -> f32 {
        self.cell_size / self.sub_cells as f32
    }

    /// Distance within which two feature points are considered the same.
    #[inline]
    pub fn distance_tolerance(&self) -> f32 {
        self.sub_step() * 2.0
    }
}

/// Shared cooperative cancellation flag.
///
/// Long-running passes poll this at cell or iteration granularity and bail
/// out with [`SurfacingError::Cancelled`](crate::error::SurfacingError)
/// when it trips. Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, untripped flag.
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Request cancellation. Irrevocable for this flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Inclusive-exclusive integer cell-coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    /// First cell index along each axis.
    pub start: IVec3,
    /// One past the last cell index along each axis.
    pub end: IVec3,
}

impl GridBounds {
    /// Construct bounds from start and end cell indices.
    pub fn new(start: IVec3, end: IVec3) -> Self {
        GridBounds { start, end }
    }

    /// Grow both ends symmetrically by `amount` cells.
    pub fn pad(&self, amount: i32) -> Self {
        GridBounds {
            start: self.start - IVec3::splat(amount),
            end: self.end + IVec3::splat(amount),
        }
    }

    /// Cell count along each axis.
    #[inline]
    pub fn dimensions(&self) -> IVec3 {
        self.end - self.start
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        let d = self.dimensions();
        (d.x.max(0) as usize) * (d.y.max(0) as usize) * (d.z.max(0) as usize)
    }

    /// Grid coordinates of the `index`-th cell in row-major (x fastest) order.
    pub fn cell_start(&self, index: usize) -> IVec3 {
        let d = self.dimensions();
        let slice = (d.x * d.y) as usize;
        let z = index / slice;
        let rem = index - z * slice;
        let y = rem / d.x as usize;
        let x = rem - y * d.x as usize;
        self.start + IVec3::new(x as i32, y as i32, z as i32)
    }
}

/// World-space axis-aligned bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimalBounds {
    /// Minimum corner.
    pub start: Vec3,
    /// Maximum corner.
    pub end: Vec3,
}

impl DecimalBounds {
    /// Half-open containment test.
    pub fn contains(&self, position: Vec3) -> bool {
        position.cmpge(self.start).all() && position.cmplt(self.end).all()
    }
}

/// An edge-set over an arena of vertices.
///
/// Vertices live in a flat array and edges reference them by index, so
/// "the same vertex" is an index comparison rather than a float comparison.
/// Tolerance-based identity is applied once, when positions enter the arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeSet {
    vertices: Vec<Vec3>,
    edges: Vec<[u32; 2]>,
}

impl EdgeSet {
    /// Empty edge-set.
    pub fn new() -> Self {
        EdgeSet::default()
    }

    /// Build an edge-set from raw endpoint pairs, clustering endpoints that
    /// lie within `tolerance` of each other onto their shared centroid.
    ///
    /// Edges whose endpoints fall into the same cluster are dropped as
    /// degenerate.
    pub fn from_endpoint_pairs(tolerance: f32, pairs: &[(Vec3, Vec3)]) -> Self {
        let mut grid = PointGrid::new(tolerance);
        // cluster id -> (position sum, member count)
        let mut clusters: Vec<(Vec3, u32)> = Vec::new();
        let assign = |point: Vec3, grid: &mut PointGrid, clusters: &mut Vec<(Vec3, u32)>| {
            if let Some(id) = grid.nearest_within(point, tolerance) {
                let (sum, count) = &mut clusters[id as usize];
                *sum += point;
                *count += 1;
                id
            } else {
                let id = clusters.len() as u32;
                clusters.push((point, 1));
                grid.insert(id, point);
                id
            }
        };

        let mut indexed = Vec::with_capacity(pairs.len());
        for &(a, b) in pairs {
            let first = assign(a, &mut grid, &mut clusters);
            let second = assign(b, &mut grid, &mut clusters);
            indexed.push([first, second]);
        }

        let vertices = clusters
            .into_iter()
            .map(|(sum, count)| sum / count as f32)
            .collect();
        let mut set = EdgeSet {
            vertices,
            edges: Vec::new(),
        };
        for [a, b] in indexed {
            if a != b {
                set.push_edge(a, b);
            }
        }
        set.compact();
        set
    }

    /// Vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Edge index pairs.
    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    /// Number of vertices in the arena (including unreferenced ones until
    /// the next [`compact`](Self::compact)).
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when the set holds no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Position of vertex `id`.
    #[inline]
    pub fn position(&self, id: u32) -> Vec3 {
        self.vertices[id as usize]
    }

    /// World-space endpoints of edge `index`.
    pub fn endpoints(&self, index: usize) -> (Vec3, Vec3) {
        let [a, b] = self.edges[index];
        (self.position(a), self.position(b))
    }

    /// Normalized direction of edge `index`.
    pub fn edge_vector(&self, index: usize) -> Vec3 {
        let (a, b) = self.endpoints(index);
        (b - a).normalize_or_zero()
    }

    /// Append a vertex, returning its id.
    pub fn push_vertex(&mut self, position: Vec3) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    /// Append an edge between existing vertex ids. Self-loops are ignored.
    pub fn push_edge(&mut self, a: u32, b: u32) {
        debug_assert!((a as usize) < self.vertices.len() && (b as usize) < self.vertices.len());
        if a != b {
            self.edges.push([a, b]);
        }
    }

    /// Per-vertex edge degree.
    pub fn degrees(&self) -> Vec<u32> {
        let mut degrees = vec![0u32; self.vertices.len()];
        for &[a, b] in &self.edges {
            degrees[a as usize] += 1;
            degrees[b as usize] += 1;
        }
        degrees
    }

    /// Keep only edges for which the predicate returns true.
    pub fn retain_edges(&mut self, mut keep: impl FnMut(usize, [u32; 2]) -> bool) {
        let mut index = 0;
        self.edges.retain(|&edge| {
            let kept = keep(index, edge);
            index += 1;
            kept
        });
    }

    /// Drop vertices referenced by no edge and re-index contiguously.
    pub fn compact(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for &[a, b] in &self.edges {
            used[a as usize] = true;
            used[b as usize] = true;
        }
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut next = 0u32;
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (i, &keep) in used.iter().enumerate() {
            if keep {
                remap[i] = next;
                vertices.push(self.vertices[i]);
                next += 1;
            }
        }
        for edge in &mut self.edges {
            edge[0] = remap[edge[0] as usize];
            edge[1] = remap[edge[1] as usize];
        }
        self.vertices = vertices;
    }
}
