//! Common test helpers for isoedge integration tests

use glam::Vec3;
use isoedge::prelude::*;

/// Initialize test logging. Safe to call from every test.
#[allow(dead_code)]
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Standard distance fields
// ============================================================================

/// Sphere of the given radius at the origin.
#[allow(dead_code)]
pub fn sphere(radius: f32) -> impl Fn(Vec3) -> f32 {
    move |p: Vec3| p.length() - radius
}

/// Axis-aligned box with the given half-extents at the origin.
#[allow(dead_code)]
pub fn boxed(half: Vec3) -> impl Fn(Vec3) -> f32 {
    move |p: Vec3| {
        let q = p.abs() - half;
        q.max(Vec3::ZERO).length() + q.x.max(q.y).max(q.z).min(0.0)
    }
}

/// Cube with the given half-extent at the origin.
#[allow(dead_code)]
pub fn cube(half: f32) -> impl Fn(Vec3) -> f32 {
    boxed(Vec3::splat(half))
}

/// Translate a distance field.
#[allow(dead_code)]
pub fn translate(df: impl Fn(Vec3) -> f32, offset: Vec3) -> impl Fn(Vec3) -> f32 {
    move |p: Vec3| df(p - offset)
}

// ============================================================================
// Triangle mesh fixtures
// ============================================================================

/// Closed cube surface with each face subdivided into an `n` by `n` quad
/// grid, two triangles per quad. Spans the unit cube `[0, 1]^3`.
#[allow(dead_code)]
pub fn grid_cube_mesh(n: u32) -> TriangleMesh {
    let mut mesh = TriangleMesh::default();
    // (origin, u axis, v axis) per face, wound outward
    let faces = [
        (Vec3::ZERO, Vec3::Y, Vec3::X), // z = 0
        (Vec3::Z, Vec3::X, Vec3::Y),    // z = 1
        (Vec3::ZERO, Vec3::X, Vec3::Z), // y = 0
        (Vec3::Y, Vec3::Z, Vec3::X),    // y = 1
        (Vec3::ZERO, Vec3::Z, Vec3::Y), // x = 0
        (Vec3::X, Vec3::Y, Vec3::Z),    // x = 1
    ];
    let step = 1.0 / n as f32;
    for (origin, u, v) in faces {
        let base = mesh.positions.len() as u32;
        for j in 0..=n {
            for i in 0..=n {
                mesh.positions
                    .push(origin + u * (i as f32 * step) + v * (j as f32 * step));
            }
        }
        let stride = n + 1;
        for j in 0..n {
            for i in 0..n {
                let a = base + j * stride + i;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                mesh.indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }
    }
    mesh
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert every edge vertex lies within `tolerance` of the zero iso-surface.
#[allow(dead_code)]
pub fn assert_on_surface(df: &dyn Fn(Vec3) -> f32, edges: &EdgeSet, tolerance: f32) {
    for &position in edges.positions() {
        let distance = df(position);
        assert!(
            distance.abs() < tolerance,
            "vertex {position:?} is {distance} off the surface (tol {tolerance})"
        );
    }
}

/// Assert all triangle indices reference existing vertices.
#[allow(dead_code)]
pub fn assert_valid_indices(mesh: &TriangleMesh) {
    for &idx in &mesh.indices {
        assert!(
            (idx as usize) < mesh.positions.len(),
            "index {} out of bounds (vertex count: {})",
            idx,
            mesh.positions.len()
        );
    }
}
