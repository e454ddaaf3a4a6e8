//! End-to-end sharp-feature edge extraction.
//!
//! Per cell: sample the sub-grid, detect contours, fold duplicates into
//! pivots, aggregate into lines and emit an edge-set. The per-cell sets are
//! then stitched across cell boundaries and topologically cleaned. Cells are
//! processed in index order so results are deterministic.

use crate::contour::{contour_cell, isolate_contours, Contour};
use crate::error::SurfacingError;
use crate::lines::{detect_lines, lines_to_edge_set, separate_duplicates};
use crate::merge::aggregate_cells;
use crate::sampling::{scene_grid_bounds, CellSample, GridSampler};
use crate::topology::clean_topology;
use crate::types::{CancelFlag, DistanceFn, EdgeSet, GridBounds, SurfacingConfig};

/// Contours and pivots of one sampled cell.
pub fn trace_cell_contours(
    df: &DistanceFn,
    config: &SurfacingConfig,
    cell: &CellSample,
    grid_length: usize,
) -> (Vec<Contour>, Vec<Contour>) {
    let contours = isolate_contours(
        config.tolerance,
        contour_cell(df, config, cell, grid_length),
    );
    separate_duplicates(config, contours)
}

/// Feature edges of one sampled cell.
pub fn trace_cell_edges(
    df: &DistanceFn,
    config: &SurfacingConfig,
    cell: &CellSample,
    grid_length: usize,
) -> EdgeSet {
    let (contours, pivots) = trace_cell_contours(df, config, cell, grid_length);
    if contours.is_empty() {
        return EdgeSet::new();
    }
    let lines = detect_lines(config, contours, pivots);
    lines_to_edge_set(config, &lines)
}

/// Extract feature edges over an explicit cell range.
///
/// Polls `cancel` once per cell and fails with
/// [`SurfacingError::Cancelled`] when it trips.
pub fn extract_edges_within(
    df: &DistanceFn,
    config: &SurfacingConfig,
    bounds: GridBounds,
    cancel: &CancelFlag,
) -> Result<EdgeSet, SurfacingError> {
    let sampler = GridSampler::new(df, config, bounds);
    let grid_length = sampler.grid_length();
    let cell_count = bounds.cell_count();
    let active = (0..cell_count).filter(|&i| sampler.is_active(i)).count();
    log::info!("surfacing {cell_count} cells, {active} active");

    let mut cells = Vec::with_capacity(cell_count);
    for index in 0..cell_count {
        if cancel.is_cancelled() {
            return Err(SurfacingError::Cancelled);
        }
        let set = match sampler.sample_cell(index) {
            Some(cell) => trace_cell_edges(df, config, &cell, grid_length),
            None => EdgeSet::new(),
        };
        cells.push(set);
    }

    let mut merged = aggregate_cells(config, &bounds, cells);
    clean_topology(&mut merged, config.thresholds.colinear_merge);
    log::info!(
        "extracted {} edges over {} vertices",
        merged.edge_count(),
        merged.vertex_count()
    );
    Ok(merged)
}

/// Extract feature edges over the whole solid, with cancellation.
///
/// Bounds come from axis probes of the distance field, padded by one cell so
/// off-axis extremes are still covered.
pub fn extract_edges_with(
    df: &DistanceFn,
    config: &SurfacingConfig,
    cancel: &CancelFlag,
) -> Result<EdgeSet, SurfacingError> {
    let bounds = scene_grid_bounds(df, config.cell_size).pad(1);
    extract_edges_within(df, config, bounds, cancel)
}

/// Extract feature edges over the whole solid.
pub fn extract_edges(
    df: &DistanceFn,
    config: &SurfacingConfig,
) -> Result<EdgeSet, SurfacingError> {
    extract_edges_with(df, config, &CancelFlag::new())
}
