//! Quadric-error mesh decimation (Garland & Heckbert).
//!
//! Iterative edge-collapse driven by a per-iteration error threshold sweep
//! rather than a global priority queue: each of up to 100 iterations visits
//! every non-dirty triangle and collapses edges whose quadric error falls
//! under `1e-9 * (iteration + 3)^aggressiveness`. Border vertices only
//! collapse onto other border vertices, and collapses that would flip a
//! neighboring triangle's normal are rejected.

use crate::error::SurfacingError;
use crate::types::{CancelFlag, Thresholds};
use glam::{DVec3, Vec3};

/// Iteration cap for the threshold sweep.
const MAX_ITERATIONS: u32 = 100;

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Triangle vertex indices, three per triangle.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Decimation parameters.
#[derive(Debug, Clone, Copy)]
pub struct DecimateOptions {
    /// Stop once the triangle count drops to this value.
    pub target_count: usize,
    /// Exponent of the per-iteration error threshold. Higher values admit
    /// costlier collapses sooner.
    pub aggressiveness: f64,
    /// `|dot|` above which a collapsed edge pair counts as degenerate.
    pub degenerate_edge: f32,
    /// Normal dot below which a collapse is rejected as a flip.
    pub normal_flip: f32,
}

impl DecimateOptions {
    /// Options targeting `target_count` triangles with default calibration.
    pub fn target(target_count: usize) -> Self {
        let thresholds = Thresholds::default();
        DecimateOptions {
            target_count,
            aggressiveness: 7.0,
            degenerate_edge: thresholds.degenerate_edge,
            normal_flip: thresholds.normal_flip,
        }
    }
}

/// Upper triangle of a symmetric 4x4 quadric matrix.
#[derive(Debug, Clone, Copy)]
struct SymmetricMatrix {
    m: [f64; 10],
}

impl SymmetricMatrix {
    fn zero() -> Self {
        SymmetricMatrix { m: [0.0; 10] }
    }

    /// Quadric of the plane `ax + by + cz + d = 0`.
    fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        SymmetricMatrix {
            m: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    fn add(&self, other: &SymmetricMatrix) -> SymmetricMatrix {
        let mut m = [0.0; 10];
        for i in 0..10 {
            m[i] = self.m[i] + other.m[i];
        }
        SymmetricMatrix { m }
    }

    /// Determinant of the 3x3 submatrix picked out by the given indices.
    #[allow(clippy::too_many_arguments)]
    fn det(
        &self,
        a11: usize,
        a12: usize,
        a13: usize,
        a21: usize,
        a22: usize,
        a23: usize,
        a31: usize,
        a32: usize,
        a33: usize,
    ) -> f64 {
        let m = &self.m;
        m[a11] * m[a22] * m[a33] + m[a13] * m[a21] * m[a32] + m[a12] * m[a23] * m[a31]
            - m[a13] * m[a22] * m[a31]
            - m[a11] * m[a23] * m[a32]
            - m[a12] * m[a21] * m[a33]
    }

    /// Evaluate `v^T Q v` for `v = [x, y, z, 1]`.
    fn vertex_error(&self, p: DVec3) -> f64 {
        let m = &self.m;
        let (x, y, z) = (p.x, p.y, p.z);
        m[0] * x * x
            + 2.0 * m[1] * x * y
            + 2.0 * m[2] * x * z
            + 2.0 * m[3] * x
            + m[4] * y * y
            + 2.0 * m[5] * y * z
            + 2.0 * m[6] * y
            + m[7] * z * z
            + 2.0 * m[8] * z
            + m[9]
    }
}

#[derive(Debug, Clone, Copy)]
struct WorkVertex {
    position: Vec3,
    quadric: SymmetricMatrix,
    border: bool,
    tstart: usize,
    tcount: usize,
}

#[derive(Debug, Clone, Copy)]
struct WorkTriangle {
    v: [usize; 3],
    /// Per-edge collapse errors plus their minimum in `err[3]`.
    err: [f64; 4],
    deleted: bool,
    dirty: bool,
    normal: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct TriRef {
    tid: usize,
    tvertex: usize,
}

/// Collapse cost of the edge `(id1, id2)` and the optimal merged position.
///
/// Solves the combined quadric via cofactors; on a singular matrix or a
/// border edge, the best of the two endpoints and their midpoint is used.
fn calculate_error(vertices: &[WorkVertex], id1: usize, id2: usize) -> (f64, Vec3) {
    let q = vertices[id1].quadric.add(&vertices[id2].quadric);
    let border = vertices[id1].border && vertices[id2].border;
    let det = q.det(0, 1, 2, 1, 4, 5, 2, 5, 7);

    if det.abs() > 1e-10 && !border {
        let p = DVec3::new(
            -1.0 / det * q.det(1, 2, 3, 4, 5, 6, 5, 7, 8),
            1.0 / det * q.det(0, 2, 3, 1, 5, 6, 2, 7, 8),
            -1.0 / det * q.det(0, 1, 3, 1, 4, 6, 2, 5, 8),
        );
        (q.vertex_error(p), p.as_vec3())
    } else {
        let p1 = vertices[id1].position.as_dvec3();
        let p2 = vertices[id2].position.as_dvec3();
        let p3 = (p1 + p2) * 0.5;
        let mut best = (q.vertex_error(p1), p1);
        for candidate in [p2, p3] {
            let error = q.vertex_error(candidate);
            if error < best.0 {
                best = (error, candidate);
            }
        }
        (best.0, best.1.as_vec3())
    }
}

/// Would moving `v0` to `p` flip or degenerate any triangle around it?
///
/// Triangles shared with `i1` collapse and are flagged in `deleted` instead.
fn flipped(
    vertices: &[WorkVertex],
    triangles: &[WorkTriangle],
    refs: &[TriRef],
    options: &DecimateOptions,
    p: Vec3,
    i1: usize,
    v0: &WorkVertex,
    deleted: &mut [bool],
) -> bool {
    for k in 0..v0.tcount {
        let r = refs[v0.tstart + k];
        let t = &triangles[r.tid];
        if t.deleted {
            continue;
        }
        let s = r.tvertex;
        let id1 = t.v[(s + 1) % 3];
        let id2 = t.v[(s + 2) % 3];
        if id1 == i1 || id2 == i1 {
            deleted[k] = true;
            continue;
        }
        let d1 = (vertices[id1].position - p).normalize_or_zero();
        let d2 = (vertices[id2].position - p).normalize_or_zero();
        if d1.dot(d2).abs() > options.degenerate_edge {
            return true;
        }
        let n = d1.cross(d2).normalize_or_zero();
        deleted[k] = false;
        if n.dot(t.normal) < options.normal_flip {
            return true;
        }
    }
    false
}

/// Re-point the triangles around `v` at `i0`, recompute their edge errors
/// and append fresh refs.
fn update_triangles(
    i0: usize,
    v: &WorkVertex,
    deleted: &[bool],
    vertices: &[WorkVertex],
    triangles: &mut [WorkTriangle],
    refs: &mut Vec<TriRef>,
    deleted_triangles: &mut usize,
) {
    for k in 0..v.tcount {
        let r = refs[v.tstart + k];
        if triangles[r.tid].deleted {
            continue;
        }
        if deleted[k] {
            triangles[r.tid].deleted = true;
            *deleted_triangles += 1;
            continue;
        }
        let mut t = triangles[r.tid];
        t.v[r.tvertex] = i0;
        t.dirty = true;
        t.err[0] = calculate_error(vertices, t.v[0], t.v[1]).0;
        t.err[1] = calculate_error(vertices, t.v[1], t.v[2]).0;
        t.err[2] = calculate_error(vertices, t.v[2], t.v[0]).0;
        t.err[3] = t.err[0].min(t.err[1]).min(t.err[2]);
        triangles[r.tid] = t;
        refs.push(r);
    }
}

/// Rebuild the vertex-to-triangle reference table. On the first iteration
/// also accumulate the per-vertex quadrics, seed the edge errors and mark
/// border vertices.
fn update_mesh(
    iteration: u32,
    vertices: &mut Vec<WorkVertex>,
    triangles: &mut Vec<WorkTriangle>,
    refs: &mut Vec<TriRef>,
) {
    if iteration > 0 {
        triangles.retain(|t| !t.deleted);
    }

    if iteration == 0 {
        for v in vertices.iter_mut() {
            v.quadric = SymmetricMatrix::zero();
        }
        for t in triangles.iter_mut() {
            let p0 = vertices[t.v[0]].position;
            let p1 = vertices[t.v[1]].position;
            let p2 = vertices[t.v[2]].position;
            let n = (p1 - p0).cross(p2 - p0).normalize_or_zero();
            t.normal = n;
            let q = SymmetricMatrix::from_plane(
                n.x as f64,
                n.y as f64,
                n.z as f64,
                -(n.as_dvec3().dot(p0.as_dvec3())),
            );
            for &vi in &t.v {
                vertices[vi].quadric = vertices[vi].quadric.add(&q);
            }
        }
        for t in triangles.iter_mut() {
            t.err[0] = calculate_error(vertices, t.v[0], t.v[1]).0;
            t.err[1] = calculate_error(vertices, t.v[1], t.v[2]).0;
            t.err[2] = calculate_error(vertices, t.v[2], t.v[0]).0;
            t.err[3] = t.err[0].min(t.err[1]).min(t.err[2]);
        }
    }

    for v in vertices.iter_mut() {
        v.tstart = 0;
        v.tcount = 0;
    }
    for t in triangles.iter() {
        for &vi in &t.v {
            vertices[vi].tcount += 1;
        }
    }
    let mut tstart = 0;
    for v in vertices.iter_mut() {
        v.tstart = tstart;
        tstart += v.tcount;
        v.tcount = 0;
    }
    refs.clear();
    refs.resize(triangles.len() * 3, TriRef { tid: 0, tvertex: 0 });
    for (tid, t) in triangles.iter().enumerate() {
        for (tvertex, &vi) in t.v.iter().enumerate() {
            let v = &mut vertices[vi];
            refs[v.tstart + v.tcount] = TriRef { tid, tvertex };
            v.tcount += 1;
        }
    }

    if iteration == 0 {
        // A vertex is on the mesh border when one of its one-ring neighbors
        // appears in exactly one incident triangle.
        for v in vertices.iter_mut() {
            v.border = false;
        }
        let mut vcount: Vec<usize> = Vec::new();
        let mut vids: Vec<usize> = Vec::new();
        let mut borders: Vec<usize> = Vec::new();
        for i in 0..vertices.len() {
            vcount.clear();
            vids.clear();
            let v = vertices[i];
            for k in 0..v.tcount {
                let t = &triangles[refs[v.tstart + k].tid];
                for &id in &t.v {
                    if id == i {
                        continue;
                    }
                    match vids.iter().position(|&known| known == id) {
                        Some(ofs) => vcount[ofs] += 1,
                        None => {
                            vcount.push(1);
                            vids.push(id);
                        }
                    }
                }
            }
            for (j, &count) in vcount.iter().enumerate() {
                if count == 1 {
                    borders.push(vids[j]);
                }
            }
        }
        for id in borders {
            vertices[id].border = true;
        }
    }
}

/// Drop deleted triangles and unreferenced vertices, re-indexing the rest.
fn compact_mesh(vertices: &[WorkVertex], triangles: &[WorkTriangle]) -> TriangleMesh {
    let mut remap = vec![u32::MAX; vertices.len()];
    let mut positions = Vec::new();
    let mut indices = Vec::with_capacity(triangles.len() * 3);
    for t in triangles {
        if t.deleted {
            continue;
        }
        for &vi in &t.v {
            if remap[vi] == u32::MAX {
                remap[vi] = positions.len() as u32;
                positions.push(vertices[vi].position);
            }
            indices.push(remap[vi]);
        }
    }
    TriangleMesh { positions, indices }
}

/// Decimate `mesh` toward `options.target_count` triangles.
///
/// The input is left untouched; the result is a compacted copy. Meshes at or
/// under the target are returned as-is (compacted). Polls `cancel` once per
/// iteration.
pub fn simplify(
    mesh: &TriangleMesh,
    options: &DecimateOptions,
    cancel: &CancelFlag,
) -> Result<TriangleMesh, SurfacingError> {
    let triangle_count = mesh.triangle_count();

    let mut vertices: Vec<WorkVertex> = mesh
        .positions
        .iter()
        .map(|&position| WorkVertex {
            position,
            quadric: SymmetricMatrix::zero(),
            border: false,
            tstart: 0,
            tcount: 0,
        })
        .collect();
    let mut triangles: Vec<WorkTriangle> = (0..triangle_count)
        .map(|t| WorkTriangle {
            v: [
                mesh.indices[t * 3] as usize,
                mesh.indices[t * 3 + 1] as usize,
                mesh.indices[t * 3 + 2] as usize,
            ],
            err: [0.0; 4],
            deleted: false,
            dirty: false,
            normal: Vec3::ZERO,
        })
        .collect();
    let mut refs: Vec<TriRef> = Vec::new();

    let mut deleted_triangles = 0usize;
    let mut deleted0: Vec<bool> = Vec::new();
    let mut deleted1: Vec<bool> = Vec::new();

    for iteration in 0..MAX_ITERATIONS {
        if cancel.is_cancelled() {
            return Err(SurfacingError::Cancelled);
        }
        if triangle_count - deleted_triangles <= options.target_count {
            break;
        }

        if iteration % 5 == 0 {
            update_mesh(iteration, &mut vertices, &mut triangles, &mut refs);
        }

        for t in triangles.iter_mut() {
            t.dirty = false;
        }

        let threshold = 1e-9 * f64::powf(iteration as f64 + 3.0, options.aggressiveness);

        'triangles: for ti in 0..triangles.len() {
            let t = triangles[ti];
            if t.err[3] > threshold || t.deleted || t.dirty {
                continue;
            }
            for j in 0..3 {
                if t.err[j] >= threshold {
                    continue;
                }
                let i0 = t.v[j];
                let i1 = t.v[(j + 1) % 3];
                if vertices[i0].border != vertices[i1].border {
                    continue;
                }

                let (_, p) = calculate_error(&vertices, i0, i1);
                let v0 = vertices[i0];
                let v1 = vertices[i1];
                deleted0.clear();
                deleted0.resize(v0.tcount, false);
                deleted1.clear();
                deleted1.resize(v1.tcount, false);
                if flipped(&vertices, &triangles, &refs, options, p, i1, &v0, &mut deleted0)
                    || flipped(&vertices, &triangles, &refs, options, p, i0, &v1, &mut deleted1)
                {
                    continue;
                }

                vertices[i0].position = p;
                vertices[i0].quadric = v0.quadric.add(&v1.quadric);

                let tstart = refs.len();
                update_triangles(
                    i0,
                    &v0,
                    &deleted0,
                    &vertices,
                    &mut triangles,
                    &mut refs,
                    &mut deleted_triangles,
                );
                update_triangles(
                    i0,
                    &v1,
                    &deleted1,
                    &vertices,
                    &mut triangles,
                    &mut refs,
                    &mut deleted_triangles,
                );
                let tcount = refs.len() - tstart;
                vertices[i0].tstart = tstart;
                vertices[i0].tcount = tcount;
                break;
            }
            if triangle_count - deleted_triangles <= options.target_count {
                break 'triangles;
            }
        }
    }

    Ok(compact_mesh(&vertices, &triangles))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned unit cube: 8 vertices, 12 triangles.
    fn cube() -> TriangleMesh {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            2, 3, 7, 2, 7, 6, // +y
            1, 2, 6, 1, 6, 5, // +x
            0, 4, 7, 0, 7, 3, // -x
        ];
        TriangleMesh { positions, indices }
    }

    /// Flat fan of near-coplanar triangles, easy to collapse.
    fn flat_fan(spokes: usize) -> TriangleMesh {
        let mut positions = vec![Vec3::ZERO];
        for i in 0..=spokes {
            let angle = std::f32::consts::PI * i as f32 / spokes as f32;
            positions.push(Vec3::new(angle.cos(), 0.0, angle.sin()));
        }
        let mut indices = Vec::new();
        for i in 0..spokes {
            indices.extend_from_slice(&[0, (i + 1) as u32, (i + 2) as u32]);
        }
        TriangleMesh { positions, indices }
    }

    #[test]
    fn flat_fan_collapses_toward_target() {
        let mesh = flat_fan(16);
        let before = mesh.triangle_count();
        let result = simplify(&mesh, &DecimateOptions::target(4), &CancelFlag::new())
            .expect("decimation should succeed");
        let after = result.triangle_count();
        assert!(after < before, "before {before}, after {after}");
        for &idx in &result.indices {
            assert!((idx as usize) < result.positions.len(), "index {idx} out of bounds");
        }
    }

    #[test]
    fn cube_collapses_to_two_triangles() {
        let mesh = cube();
        let result = simplify(&mesh, &DecimateOptions::target(2), &CancelFlag::new())
            .expect("decimation should succeed");
        assert_eq!(result.triangle_count(), 2);
        for &idx in &result.indices {
            assert!((idx as usize) < result.positions.len());
        }
    }

    #[test]
    fn mesh_at_target_is_returned_unchanged() {
        let mesh = cube();
        let result = simplify(&mesh, &DecimateOptions::target(12), &CancelFlag::new())
            .expect("decimation should succeed");
        assert_eq!(result.triangle_count(), 12);
    }

    #[test]
    fn lower_targets_never_yield_more_triangles() {
        let mesh = flat_fan(16);
        let loose = simplify(&mesh, &DecimateOptions::target(12), &CancelFlag::new())
            .expect("decimation should succeed");
        let tight = simplify(&mesh, &DecimateOptions::target(2), &CancelFlag::new())
            .expect("decimation should succeed");
        assert!(tight.triangle_count() <= loose.triangle_count());
    }

    #[test]
    fn cancelled_flag_aborts() {
        let mesh = flat_fan(16);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = simplify(&mesh, &DecimateOptions::target(2), &cancel);
        assert_eq!(result.unwrap_err(), SurfacingError::Cancelled);
    }

    #[test]
    fn empty_mesh_is_a_no_op() {
        let mesh = TriangleMesh::default();
        let result = simplify(&mesh, &DecimateOptions::target(0), &CancelFlag::new())
            .expect("decimation should succeed");
        assert_eq!(result.triangle_count(), 0);
        assert!(result.positions.is_empty());
    }
}
