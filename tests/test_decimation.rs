//! Decimation tests over synthetic triangle meshes.

mod common;

use common::*;
use isoedge::decimate::{simplify, DecimateOptions};
use isoedge::prelude::*;

#[test]
fn subdivided_cube_decimates_substantially() {
    init_logs();
    let mesh = grid_cube_mesh(8);
    let before = mesh.triangle_count();
    assert_eq!(before, 12 * 64);

    let result = simplify(&mesh, &DecimateOptions::target(12), &CancelFlag::new())
        .expect("decimation should succeed");
    let after = result.triangle_count();

    assert!(after < before / 2, "before={before}, after={after}");
    assert!(after >= 2, "decimated to nothing");
    assert_valid_indices(&result);
}

#[test]
fn decimated_vertices_stay_near_the_cube() {
    let mesh = grid_cube_mesh(8);
    let result = simplify(&mesh, &DecimateOptions::target(50), &CancelFlag::new())
        .expect("decimation should succeed");
    for &p in &result.positions {
        assert!(
            p.min_element() > -0.5 && p.max_element() < 1.5,
            "vertex {p:?} drifted off the unit cube"
        );
    }
}

#[test]
fn tighter_targets_remove_at_least_as_much() {
    let mesh = grid_cube_mesh(6);
    let loose = simplify(&mesh, &DecimateOptions::target(200), &CancelFlag::new())
        .expect("decimation should succeed");
    let tight = simplify(&mesh, &DecimateOptions::target(12), &CancelFlag::new())
        .expect("decimation should succeed");
    assert!(tight.triangle_count() <= loose.triangle_count());
}

#[test]
fn decimating_twice_is_stable() {
    let mesh = grid_cube_mesh(6);
    let options = DecimateOptions::target(40);
    let once = simplify(&mesh, &options, &CancelFlag::new()).expect("first pass");
    let twice = simplify(&once, &options, &CancelFlag::new()).expect("second pass");
    assert!(twice.triangle_count() <= once.triangle_count());
    assert_valid_indices(&twice);
}

#[test]
fn small_meshes_pass_through() {
    let mesh = grid_cube_mesh(1);
    let result = simplify(&mesh, &DecimateOptions::target(12), &CancelFlag::new())
        .expect("decimation should succeed");
    assert_eq!(result.triangle_count(), 12);
}
