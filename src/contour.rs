//! Contour detection: locating sharp-feature points between adjacent samples.
//!
//! Neighboring sub-samples whose normals disagree mark a crossing of a sharp
//! feature. The crossing position is a normal-weighted blend of the two
//! projected sample positions, re-snapped onto the surface. Three axis passes
//! plus six corner diagonals cover the cell; the diagonals close a blind spot
//! where axis-only differencing misses a feature at a cell corner.

use crate::sampling::{normal_at, snap_to_surface, CellSample, SubSample};
use crate::spatial::center;
use crate::types::{DistanceFn, SurfacingConfig};
use glam::{IVec3, Vec3};

/// A detected sharp-feature crossing between two adjacent samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Normal variance of the sample pair: 0 = identical normals,
    /// 1 = opposite.
    pub strength: f32,
    /// Unit direction of the feature line (`normal_a × normal_b`).
    pub direction: Vec3,
    /// Refined crossing position on the surface.
    pub position: Vec3,
    /// Surface normal at the crossing position.
    pub normal: Vec3,
    /// First sample of the pair.
    pub first_sample: SubSample,
    /// Second sample of the pair.
    pub second_sample: SubSample,
}

/// Variance between two unit normals: `(1 − a·b) / 2`.
#[inline]
pub fn normal_variance(a: Vec3, b: Vec3) -> f32 {
    (1.0 - a.dot(b)) / 2.0
}

/// Blend the two sample positions weighted by how much each sample's normal
/// diverges from the local normal at the blend point, then re-snap.
fn weighted_middle(
    df: &DistanceFn,
    snap_tolerance: f32,
    a: &SubSample,
    b: &SubSample,
    position: Vec3,
) -> Vec3 {
    let normal = normal_at(df, position);
    let strength_a = normal_variance(normal, a.normal);
    let strength_b = normal_variance(normal, b.normal);
    let scale = strength_a + strength_b;
    if scale <= f32::EPSILON {
        return position;
    }
    let middle = a.position * (strength_a / scale) + b.position * (strength_b / scale);
    snap_to_surface(df, snap_tolerance, middle)
}

fn refine_middle(df: &DistanceFn, snap_tolerance: f32, a: &SubSample, b: &SubSample) -> Vec3 {
    let middle = center(a.position, b.position);
    let position = snap_to_surface(df, snap_tolerance, middle);
    weighted_middle(df, snap_tolerance, a, b, position)
}

/// Compare two sub-samples and produce a contour when both are present and
/// their normals differ.
///
/// Symmetric in its arguments up to the sign of `direction` (the cross
/// product flips); `strength` and `position` are identical either way.
pub fn diff_samples(
    df: &DistanceFn,
    snap_tolerance: f32,
    a: Option<&SubSample>,
    b: Option<&SubSample>,
) -> Option<Contour> {
    let a = a?;
    let b = b?;
    if a.normal == b.normal {
        return None;
    }
    let direction = a.normal.cross(b.normal).try_normalize()?;
    let position = refine_middle(df, snap_tolerance, a, b);
    Some(Contour {
        strength: normal_variance(a.normal, b.normal),
        direction,
        position,
        normal: normal_at(df, position),
        first_sample: *a,
        second_sample: *b,
    })
}

/// One differencing pass over the sample grid along `axis`, comparing each
/// sample with its neighbor at `offset` in the flat array.
fn diff_sample_grid(
    df: &DistanceFn,
    snap_tolerance: f32,
    samples: &[Option<SubSample>],
    grid_length: usize,
    axis: IVec3,
    offset: usize,
) -> Vec<Contour> {
    let sub_lengths = IVec3::splat(grid_length as i32 - 2) + axis;
    let start = IVec3::ONE - axis;
    let end = start + sub_lengths;
    let mut buffer = Vec::new();
    for z in start.z..end.z {
        for y in start.y..end.y {
            for x in start.x..end.x {
                let first =
                    x as usize + y as usize * grid_length + z as usize * grid_length * grid_length;
                let second = first + offset;
                if let Some(contour) = diff_samples(
                    df,
                    snap_tolerance,
                    samples[first].as_ref(),
                    samples[second].as_ref(),
                ) {
                    buffer.push(contour);
                }
            }
        }
    }
    buffer
}

/// Diagonal comparisons at six cell corners.
///
/// Axis-only differencing has a slight blind spot at cell corners; these
/// diagonal diffs cover it.
fn corner_contours(
    df: &DistanceFn,
    snap_tolerance: f32,
    samples: &[Option<SubSample>],
    grid_length: usize,
) -> Vec<Contour> {
    let bases = [
        IVec3::new(0, 0, 0),
        IVec3::new(1, 1, 1),
        IVec3::new(0, 1, 1),
        IVec3::new(1, 0, 1),
        IVec3::new(1, 0, 0),
        IVec3::new(1, 1, 0),
    ];
    let flatten = |v: IVec3| {
        v.x as usize + v.y as usize * grid_length + v.z as usize * grid_length * grid_length
    };
    bases
        .iter()
        .filter_map(|&base| {
            let a = base * (grid_length as i32 - 3) + IVec3::ONE;
            let c = a + base * 2 - IVec3::ONE;
            diff_samples(
                df,
                snap_tolerance,
                samples[flatten(a)].as_ref(),
                samples[flatten(c)].as_ref(),
            )
        })
        .collect()
}

/// All contours of one sampled cell: three axis passes plus the corner
/// diagonals.
pub fn contour_cell(
    df: &DistanceFn,
    config: &SurfacingConfig,
    cell: &CellSample,
    grid_length: usize,
) -> Vec<Contour> {
    let snap_tolerance = config.sub_step() * 0.09;
    let samples = &cell.samples;
    let mut contours = diff_sample_grid(df, snap_tolerance, samples, grid_length, IVec3::X, 1);
    contours.extend(diff_sample_grid(
        df,
        snap_tolerance,
        samples,
        grid_length,
        IVec3::Y,
        grid_length,
    ));
    contours.extend(diff_sample_grid(
        df,
        snap_tolerance,
        samples,
        grid_length,
        IVec3::Z,
        grid_length * grid_length,
    ));
    contours.extend(corner_contours(df, snap_tolerance, samples, grid_length));
    contours
}

/// Keep only contours stronger than the normal tolerance.
pub fn isolate_contours(tolerance: f32, contours: Vec<Contour>) -> Vec<Contour> {
    contours
        .into_iter()
        .filter(|c| c.strength > tolerance)
        .collect()
}
