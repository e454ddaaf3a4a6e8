//! Stitching per-cell edge-sets into one coherent volume edge-set.
//!
//! Merging runs in three passes matching the grid axes: cells merge into
//! rows along X, rows into floors along Y, floors into the volume along Z.
//! Each pairwise merge clumps near-coincident boundary vertices; the first
//! (lower cell index) set's vertex always becomes the canonical one, which
//! keeps repeated merges idempotent and avoids order-dependent drift.

use crate::types::{EdgeSet, GridBounds, SurfacingConfig};
use std::collections::{HashMap, HashSet};

use crate::spatial::PointGrid;

/// Parameters for one axis pass of the merge.
#[derive(Debug, Clone, Copy)]
pub struct MergeConfig {
    /// Max distance between two boundary vertices that clump together.
    pub distance_tolerance: f32,
    /// Axis (0..3) the pass merges along.
    pub axis: usize,
    /// How far from the boundary plane a vertex may sit and still count as a
    /// boundary vertex.
    pub boundary_range: f32,
    /// World-space cell size (boundary planes advance by this much).
    pub cell_size: f32,
}

fn normalized(edge: [u32; 2]) -> (u32, u32) {
    if edge[0] <= edge[1] {
        (edge[0], edge[1])
    } else {
        (edge[1], edge[0])
    }
}

/// Merge `second` into `first`, clumping the given candidate vertices.
///
/// For every candidate vertex of `second`, the nearest candidate vertex of
/// `first` within `tolerance` becomes its canonical replacement ("first
/// wins"). Rewritten edges of `second` that duplicate an edge of `first` in
/// either orientation are dropped. Where exactly one edge from each side
/// meets at a clumped vertex and the two run colinear (above
/// `colinear_threshold`), the stubs are unified into one spanning edge.
fn merge_sets(
    tolerance: f32,
    colinear_threshold: f32,
    first: &mut EdgeSet,
    second: &EdgeSet,
    first_candidates: &[u32],
    second_candidates: &[u32],
) {
    let input_edges = first.edge_count() + second.edge_count();

    let mut grid = PointGrid::new(tolerance);
    for &id in first_candidates {
        grid.insert(id, first.position(id));
    }

    // second vertex id -> canonical first vertex id
    let mut clumps: HashMap<u32, u32> = HashMap::new();
    for &id in second_candidates {
        if let Some(target) = grid.nearest_within(second.position(id), tolerance) {
            clumps.insert(id, target);
        }
    }

    let existing: HashSet<(u32, u32)> = first.edges().iter().map(|&e| normalized(e)).collect();
    let first_edge_count = first.edge_count();

    // Append second's vertices, routing clumped ones to their canonical id.
    let mut vertex_map = vec![u32::MAX; second.vertex_count()];
    for id in 0..second.vertex_count() as u32 {
        vertex_map[id as usize] = match clumps.get(&id) {
            Some(&target) => target,
            None => first.push_vertex(second.position(id)),
        };
    }

    for &[a, b] in second.edges() {
        let a = vertex_map[a as usize];
        let b = vertex_map[b as usize];
        if a == b {
            continue;
        }
        if existing.contains(&normalized([a, b])) {
            continue;
        }
        first.push_edge(a, b);
    }

    // Unify colinear stubs meeting at a clumped vertex: one edge from each
    // side becomes a single spanning edge. Earlier splices change what later
    // candidates see, so the canonical ids are visited in sorted order to
    // keep the result deterministic.
    let mut canonical: Vec<u32> = clumps.values().copied().collect();
    canonical.sort_unstable();
    canonical.dedup();
    let mut removals: HashSet<usize> = HashSet::new();
    let mut additions: Vec<[u32; 2]> = Vec::new();
    for &vertex in &canonical {
        let incident: Vec<usize> = first
            .edges()
            .iter()
            .enumerate()
            .filter(|(i, e)| !removals.contains(i) && (e[0] == vertex || e[1] == vertex))
            .map(|(i, _)| i)
            .collect();
        let from_first: Vec<usize> = incident
            .iter()
            .copied()
            .filter(|&i| i < first_edge_count)
            .collect();
        let from_second: Vec<usize> = incident
            .iter()
            .copied()
            .filter(|&i| i >= first_edge_count)
            .collect();
        if from_first.len() != 1 || from_second.len() != 1 {
            continue;
        }
        let a = from_first[0];
        let b = from_second[0];
        let dot = first.edge_vector(a).dot(first.edge_vector(b));
        if dot.abs() <= colinear_threshold {
            continue;
        }
        let other = |index: usize| {
            let [p, q] = first.edges()[index];
            if p == vertex {
                q
            } else {
                p
            }
        };
        let (start, end) = (other(a), other(b));
        if start == end {
            continue;
        }
        removals.insert(a);
        removals.insert(b);
        additions.push([start, end]);
    }
    if !removals.is_empty() {
        first.retain_edges(|i, _| !removals.contains(&i));
        for [a, b] in additions {
            first.push_edge(a, b);
        }
    }

    debug_assert!(
        first.edge_count() <= input_edges,
        "merge grew the edge set: {} > {}",
        first.edge_count(),
        input_edges
    );
}

/// Merge two cell edge-sets that share the boundary plane at `boundary`
/// along `config.axis`.
pub fn merge_cells(
    config: &MergeConfig,
    colinear_threshold: f32,
    boundary: f32,
    first: &mut EdgeSet,
    second: &EdgeSet,
) {
    let first_boundary = boundary - config.boundary_range;
    let second_boundary = boundary + config.boundary_range;

    let first_candidates: Vec<u32> = (0..first.vertex_count() as u32)
        .filter(|&id| first.position(id)[config.axis] > first_boundary)
        .collect();
    let second_candidates: Vec<u32> = (0..second.vertex_count() as u32)
        .filter(|&id| second.position(id)[config.axis] < second_boundary)
        .collect();

    merge_sets(
        config.distance_tolerance,
        colinear_threshold,
        first,
        second,
        &first_candidates,
        &second_candidates,
    );
}

/// Fold a run of adjacent cell edge-sets into one, advancing the boundary
/// plane by a cell each step.
pub fn accumulate_row(
    config: &MergeConfig,
    colinear_threshold: f32,
    cells: Vec<EdgeSet>,
    first_boundary: f32,
) -> EdgeSet {
    let mut iter = cells.into_iter();
    let mut accumulator = iter.next().unwrap_or_default();
    let mut boundary = first_boundary;
    for next in iter {
        merge_cells(config, colinear_threshold, boundary, &mut accumulator, &next);
        boundary += config.cell_size;
    }
    accumulator
}

/// Merge every `dimensions[axis]`-length run of `groups` into one set.
pub fn accumulate_rows(
    config: &MergeConfig,
    colinear_threshold: f32,
    bounds: &GridBounds,
    groups: Vec<EdgeSet>,
    row_count: usize,
) -> Vec<EdgeSet> {
    let dimensions = bounds.dimensions();
    let row_length = dimensions[config.axis] as usize;
    let first_division = bounds.start[config.axis] as f32 * config.cell_size + config.cell_size;

    let mut iter = groups.into_iter();
    let mut rows = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        let row: Vec<EdgeSet> = iter.by_ref().take(row_length).collect();
        debug_assert_eq!(row.len(), row_length);
        rows.push(accumulate_row(config, colinear_threshold, row, first_division));
    }
    rows
}

/// Reduce per-cell edge-sets (row-major order) into one edge-set for the
/// whole bounded volume: X rows, then Y floors, then the Z merge.
pub fn aggregate_cells(
    config: &SurfacingConfig,
    bounds: &GridBounds,
    cells: Vec<EdgeSet>,
) -> EdgeSet {
    let sub_step = config.sub_step();
    let colinear = config.thresholds.colinear_merge;
    let mut merge_config = MergeConfig {
        distance_tolerance: sub_step * 2.5,
        axis: 0,
        boundary_range: sub_step * 2.0,
        cell_size: config.cell_size,
    };

    let dimensions = bounds.dimensions();
    let row_count = (dimensions.y * dimensions.z) as usize;
    let rows = accumulate_rows(&merge_config, colinear, bounds, cells, row_count);

    merge_config.axis = 1;
    let floors = accumulate_rows(&merge_config, colinear, bounds, rows, dimensions.z as usize);

    merge_config.axis = 2;
    let first_division = bounds.start.z as f32 * config.cell_size + config.cell_size;
    accumulate_row(&merge_config, colinear, floors, first_division)
}
