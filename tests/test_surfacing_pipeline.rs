//! End-to-end extraction tests over analytic distance fields.

mod common;

use common::*;
use glam::Vec3;
use isoedge::prelude::*;

#[test]
fn cube_extraction_produces_surface_edges() {
    init_logs();
    let df = cube(1.0);
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let edges = extract_edges(&df, &config).expect("extraction should succeed");

    assert!(!edges.is_empty(), "cube should yield feature edges");
    assert_on_surface(&df, &edges, config.distance_tolerance());

    // Cleanup guarantees no loose ends survive.
    for (id, &degree) in edges.degrees().iter().enumerate() {
        assert!(degree >= 2, "vertex {id} has degree {degree}");
    }
}

#[test]
fn cube_edge_vertices_sit_near_creases() {
    // Feature vertices of an axis-aligned cube lie where at least two
    // coordinates are near the +-1 faces.
    let df = cube(1.0);
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let edges = extract_edges(&df, &config).expect("extraction should succeed");

    let near_face = |value: f32| (value.abs() - 1.0).abs() < config.distance_tolerance();
    for &p in edges.positions() {
        let on_faces = [p.x, p.y, p.z].into_iter().filter(|&c| near_face(c)).count();
        assert!(on_faces >= 2, "vertex {p:?} is not on a crease");
    }
}

#[test]
fn off_center_solids_are_still_found() {
    let offset = Vec3::new(3.0, -2.0, 1.5);
    let df = translate(cube(1.0), offset);
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let edges = extract_edges(&df, &config).expect("extraction should succeed");

    assert!(!edges.is_empty());
    for &p in edges.positions() {
        assert!(
            (p - offset).abs().max_element() < 1.5,
            "vertex {p:?} far from the translated cube"
        );
    }
}

#[test]
fn smooth_solid_yields_empty_edge_set() {
    let df = sphere(1.0);
    let config = SurfacingConfig::new(0.05, 0.5, 4);
    let edges = extract_edges(&df, &config).expect("extraction should succeed");
    assert!(edges.is_empty(), "got {} edges", edges.edge_count());
}

#[test]
fn flat_slab_over_explicit_bounds() {
    // A wide, thin slab surfaced over a fixed 4x4x4 cell volume: every
    // feature edge runs along the four long sides.
    let df = boxed(Vec3::new(1.5, 0.25, 1.5));
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let bounds = GridBounds::new(IVec3::splat(-2), IVec3::splat(2));
    let edges = extract_edges_within(&df, &config, bounds, &CancelFlag::new())
        .expect("extraction should succeed");
    assert!(!edges.is_empty());
    assert_on_surface(&df, &edges, config.distance_tolerance());
    for &degree in edges.degrees().iter() {
        assert!(degree >= 2, "dangling vertex after cleanup");
    }
}

#[test]
fn grid_bounds_enclose_the_solid() {
    let df = translate(cube(1.0), Vec3::new(3.0, 0.0, 0.0));
    let bounds = scene_grid_bounds(&df, 1.0);
    // Cube spans [2, 4] x [-1, 1] x [-1, 1]
    assert!(bounds.start.x <= 2 && bounds.end.x >= 4, "bounds {bounds:?}");
    assert!(bounds.start.y <= -1 && bounds.end.y >= 1, "bounds {bounds:?}");
}

#[test]
fn surfacing_start_marches_onto_the_cube() {
    let df = cube(1.0);
    let start = find_surfacing_start(&df, 0.01, Vec3::new(0.0, 0.0, -6.0), Vec3::Z)
        .expect("the cube face should be reachable");
    assert!((start.z + 1.0).abs() < 0.05, "hit {start:?}");
}

#[test]
fn cancellation_is_reported() {
    let df = cube(1.0);
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let cancel = CancelFlag::new();
    cancel.cancel();
    assert_eq!(
        extract_edges_with(&df, &config, &cancel),
        Err(SurfacingError::Cancelled)
    );
}

#[test]
fn extraction_is_deterministic() {
    let df = cube(1.0);
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let first = extract_edges(&df, &config).expect("extraction should succeed");
    let second = extract_edges(&df, &config).expect("extraction should succeed");
    assert_eq!(first, second);
}

#[test]
fn config_round_trips_through_serde() {
    let config = SurfacingConfig::new(0.05, 1.0, 4);
    let json = serde_json::to_string(&config).expect("serialize");
    let back: SurfacingConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.tolerance, config.tolerance);
    assert_eq!(back.sub_cells, config.sub_cells);
    assert_eq!(
        back.thresholds.line_alignment,
        config.thresholds.line_alignment
    );
}
