//! Geometric helpers shared by the surfacing pipeline.
//!
//! Contains the infinite-line/sphere test used for contour alignment and a
//! quantized spatial hash for tolerance-based nearest-vertex queries.

use glam::Vec3;
use std::collections::HashMap;

/// Test whether the infinite line through `origin` along `direction` passes
/// within `radius` of `center`.
///
/// `direction` must be normalized. The line extends in both directions, so a
/// point behind the origin still intersects.
#[inline]
pub fn line_intersects_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> bool {
    let to_center = center - origin;
    let rejection = to_center - direction * to_center.dot(direction);
    rejection.length_squared() < radius * radius
}

/// Midpoint of two points.
#[inline]
pub fn center(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5
}

/// Spatial hash over quantized positions.
///
/// Buckets points into cubic cells of `cell_size` so that a radius query only
/// scans the 27 neighboring cells. Queries are deterministic: among equally
/// near candidates the first-inserted id wins.
#[derive(Debug, Clone)]
pub struct PointGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32, i32), Vec<(u32, Vec3)>>,
}

impl PointGrid {
    /// Create a grid whose bucket size matches the largest radius that will
    /// be queried.
    pub fn new(cell_size: f32) -> Self {
        PointGrid {
            cell_size: cell_size.max(f32::MIN_POSITIVE),
            cells: HashMap::new(),
        }
    }

    #[inline]
    fn key(&self, position: Vec3) -> (i32, i32, i32) {
        let scaled = position / self.cell_size;
        (
            scaled.x.floor() as i32,
            scaled.y.floor() as i32,
            scaled.z.floor() as i32,
        )
    }

    /// Insert a point with an external id.
    pub fn insert(&mut self, id: u32, position: Vec3) {
        self.cells
            .entry(self.key(position))
            .or_default()
            .push((id, position));
    }

    /// Find the id of the nearest inserted point within `radius`, if any.
    pub fn nearest_within(&self, position: Vec3, radius: f32) -> Option<u32> {
        let (cx, cy, cz) = self.key(position);
        let radius_sq = radius * radius;
        let mut best: Option<(u32, f32)> = None;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &(id, point) in bucket {
                        let dist_sq = point.distance_squared(position);
                        if dist_sq < radius_sq {
                            match best {
                                Some((_, best_sq)) if best_sq <= dist_sq => {}
                                _ => best = Some((id, dist_sq)),
                            }
                        }
                    }
                }
            }
        }
        best.map(|(id, _)| id)
    }

    /// Number of inserted points.
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// True when nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
