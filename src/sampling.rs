//! Grid sampling of the distance field.
//!
//! Each grid cell is sampled on a regular sub-grid (with a one-sample apron
//! so neighboring cells see overlapping data). Sub-samples that straddle the
//! surface are projected onto it; everything else is left empty. A coarse
//! per-cell distance sample rejects cells with no geometry before any
//! sub-sampling happens.

use crate::error::SurfacingError;
use crate::types::{DecimalBounds, DistanceFn, GridBounds, SurfacingConfig};
use glam::{IVec3, Vec3};

/// Offset used for finite-difference gradient estimation.
const NORMAL_EPSILON: f32 = 1e-3;

/// Distance from which the scene bounds probe rays start.
const BOUNDS_PROBE_DISTANCE: f32 = 100_000.0;

/// Step cap for [`snap_to_surface`].
const MAX_SNAP_STEPS: u32 = 5;

/// Step cap for [`find_surfacing_start`].
const MAX_MARCH_STEPS: u32 = 1_000;

/// One surface-straddling sample of the distance field.
///
/// Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSample {
    /// Sample center projected onto the surface.
    pub position: Vec3,
    /// Center of the sub-cell this sample was taken at.
    pub center: Vec3,
    /// Unit gradient of the field at the sample center.
    pub normal: Vec3,
    /// Raw signed distance at the sample center.
    pub distance: f32,
}

/// All sub-samples of one grid cell.
///
/// `samples` is a flat row-major array of `grid_length³` entries, `None`
/// where the sub-cell does not straddle the surface.
#[derive(Debug, Clone)]
pub struct CellSample {
    /// Sparse sub-sample array.
    pub samples: Vec<Option<SubSample>>,
    /// World-space center of the cell.
    pub center: Vec3,
}

/// Surface normal at `point` from a central-difference gradient.
///
/// Degenerate gradients (flat or symmetric regions) fall back to +Y rather
/// than producing NaN.
#[inline]
pub fn normal_at(df: &DistanceFn, point: Vec3) -> Vec3 {
    let ex = Vec3::new(NORMAL_EPSILON, 0.0, 0.0);
    let ey = Vec3::new(0.0, NORMAL_EPSILON, 0.0);
    let ez = Vec3::new(0.0, 0.0, NORMAL_EPSILON);

    let gradient = Vec3::new(
        df(point + ex) - df(point - ex),
        df(point + ey) - df(point - ey),
        df(point + ez) - df(point - ez),
    );

    let length_sq = gradient.length_squared();
    if length_sq < 1e-20 {
        return Vec3::Y;
    }
    gradient / length_sq.sqrt()
}

/// Pull a point onto the iso-surface with a short fixed-point iteration:
/// `p ← p − normal(p) · distance(p)` until `|distance| ≤ tolerance`.
pub fn snap_to_surface(df: &DistanceFn, tolerance: f32, start: Vec3) -> Vec3 {
    let mut position = start;
    let mut distance = df(position);
    for _ in 0..MAX_SNAP_STEPS {
        if distance.abs() <= tolerance {
            break;
        }
        position -= normal_at(df, position) * distance;
        distance = df(position);
    }
    position
}

/// Sample one cell's sub-grid.
///
/// `start` is the world position of the first sub-sample and `dimensions`
/// the sub-sample count per axis (normally `sub_cells + 2`, one apron sample
/// each side). Sub-cells whose raw distance exceeds `sub_cell_range` stay
/// empty.
pub fn sample_cell_grid(
    df: &DistanceFn,
    config: &SurfacingConfig,
    center: Vec3,
    start: Vec3,
    dimensions: IVec3,
    sub_cell_range: f32,
) -> CellSample {
    let sub_step = config.sub_step();
    let snap_tolerance = sub_step * 0.09;
    let slice = (dimensions.x * dimensions.y) as usize;
    let count = slice * dimensions.z as usize;

    let samples = (0..count)
        .map(|i| {
            let z = i / slice;
            let rem = i - slice * z;
            let y = rem / dimensions.x as usize;
            let x = rem - y * dimensions.x as usize;

            let sample_center =
                start + Vec3::new(x as f32, y as f32, z as f32) * sub_step;
            let distance = df(sample_center);
            if distance.abs() > sub_cell_range {
                None
            } else {
                let normal = normal_at(df, sample_center);
                let position =
                    snap_to_surface(df, snap_tolerance, sample_center - normal * distance);
                Some(SubSample {
                    position,
                    center: sample_center,
                    normal,
                    distance,
                })
            }
        })
        .collect();

    CellSample { samples, center }
}

/// Cell-by-cell sampler over a bounded grid.
///
/// Performs one coarse distance sample per cell up front and skips the full
/// sub-grid for cells whose coarse distance exceeds the cell half-diagonal.
pub struct GridSampler<'a> {
    df: &'a DistanceFn,
    config: &'a SurfacingConfig,
    bounds: GridBounds,
    active: Vec<bool>,
}

impl<'a> GridSampler<'a> {
    /// Probe every cell of `bounds` for geometry.
    pub fn new(df: &'a DistanceFn, config: &'a SurfacingConfig, bounds: GridBounds) -> Self {
        let half_cell = config.cell_size / 2.0;
        let max_cell_range = Vec3::splat(half_cell).length();
        let count = bounds.cell_count();
        let active = (0..count)
            .map(|i| {
                let center =
                    bounds.cell_start(i).as_vec3() * config.cell_size + Vec3::splat(half_cell);
                df(center).abs() <= max_cell_range
            })
            .collect();
        GridSampler {
            df,
            config,
            bounds,
            active,
        }
    }

    /// Number of sub-samples per axis, including the apron.
    #[inline]
    pub fn grid_length(&self) -> usize {
        self.config.sub_cells as usize + 2
    }

    /// Whether the coarse probe found geometry in cell `index`.
    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    /// Sample cell `index`, or `None` when the coarse probe rejected it.
    pub fn sample_cell(&self, index: usize) -> Option<CellSample> {
        if !self.is_active(index) {
            return None;
        }
        let config = self.config;
        let cell_size = config.cell_size;
        let half_cell = cell_size / 2.0;
        let max_cell_range = Vec3::splat(half_cell).length();
        let sub_cell_range = max_cell_range / (config.sub_cells as f32 / 2.0);
        let sub_step = config.sub_step();

        let grid_start = self.bounds.cell_start(index).as_vec3() * cell_size;
        let center = grid_start + Vec3::splat(half_cell);
        let start = grid_start - Vec3::splat(sub_step);
        let dimensions = IVec3::splat(self.grid_length() as i32);
        Some(sample_cell_grid(
            self.df,
            config,
            center,
            start,
            dimensions,
            sub_cell_range,
        ))
    }
}

/// Probe the distance field along the six axis directions to bound the solid.
///
/// The result can be slightly smaller than the true bounds for shapes whose
/// extremes lie off-axis; callers usually pad by a cell.
pub fn scene_decimal_bounds(df: &DistanceFn) -> DecimalBounds {
    let axes = [Vec3::X, Vec3::Y, Vec3::Z];
    let measure = |facing: f32| {
        let coords: Vec<f32> = axes
            .iter()
            .map(|&axis| {
                let origin = axis * facing * BOUNDS_PROBE_DISTANCE;
                let distance = df(origin);
                (BOUNDS_PROBE_DISTANCE - distance) * facing
            })
            .collect();
        Vec3::new(coords[0], coords[1], coords[2])
    };
    DecimalBounds {
        start: measure(-1.0),
        end: measure(1.0),
    }
}

/// Grid-cell bounds enclosing the solid at the given cell size.
pub fn scene_grid_bounds(df: &DistanceFn, cell_size: f32) -> GridBounds {
    let decimal = scene_decimal_bounds(df);
    GridBounds {
        start: (decimal.start / cell_size).floor().as_ivec3(),
        end: (decimal.end / cell_size).ceil().as_ivec3(),
    }
}

/// Sphere-trace from `origin` along `direction` until the iso-surface is
/// within `tolerance`.
///
/// Fails with [`SurfacingError::SurfaceNotFound`] when the march ends up
/// deeper than `-tolerance` inside the solid or runs out of steps — both
/// signal a misconfigured starting point or direction.
pub fn find_surfacing_start(
    df: &DistanceFn,
    tolerance: f32,
    origin: Vec3,
    direction: Vec3,
) -> Result<Vec3, SurfacingError> {
    let mut position = origin;
    for _ in 0..MAX_MARCH_STEPS {
        let distance = df(position);
        if distance.abs() <= tolerance {
            return Ok(position);
        }
        if distance < -tolerance {
            return Err(SurfacingError::SurfaceNotFound { origin, direction });
        }
        position += direction * distance;
    }
    Err(SurfacingError::SurfaceNotFound { origin, direction })
}
