//! Line aggregation: grouping aligned contours into feature lines.
//!
//! Contours belonging to one continuous sharp feature are collected greedily:
//! a base contour claims every remaining contour that is strongly aligned
//! with it and lies within tolerance of its infinite line. Contours that
//! match nothing become pivots — intersection points of multiple lines whose
//! own direction is unreliable, so they may terminate a line but never seed
//! one. Short ("weak") lines are dissolved and re-attached to aligned strong
//! lines.

use crate::contour::Contour;
use crate::error::SurfacingError;
use crate::spatial::{line_intersects_sphere, PointGrid};
use crate::types::{EdgeSet, SurfacingConfig};
use glam::Vec3;

/// An ordered run of contours representing one sharp feature line.
pub type LineAggregate = Vec<Contour>;

/// Lines with more members than this are "strong" and kept as real features.
const STRONG_LINE_MIN: usize = 3;

/// Candidate lies within `tolerance` of the infinite line through `base`.
#[inline]
fn contours_align(tolerance: f32, base: &Contour, candidate: &Contour) -> bool {
    line_intersects_sphere(base.position, base.direction, candidate.position, tolerance)
}

/// Alignment plus a direction agreement requirement.
#[inline]
fn contours_align_strong(
    tolerance: f32,
    direction_threshold: f32,
    base: &Contour,
    candidate: &Contour,
) -> bool {
    base.direction.dot(candidate.direction).abs() > direction_threshold
        && contours_align(tolerance, base, candidate)
}

/// Dissolved weak-line members are appended to every strong line whose base
/// they align with.
fn incorporate_weak_contours(
    tolerance: f32,
    weak: Vec<Contour>,
    mut strong: Vec<LineAggregate>,
) -> Vec<LineAggregate> {
    for contour in weak {
        for line in &mut strong {
            if contours_align(tolerance, &line[0], &contour) {
                line.push(contour.clone());
            }
        }
    }
    strong
}

/// Collapse coincident contours, splitting out pivots.
///
/// The three axis passes and the corner diagonals can each detect the same
/// crossing; those duplicates land within a fraction of a sub-step of each
/// other. When every pair in such a group agrees in direction (above the
/// pivot threshold) the strongest member stands in for the group. A group
/// with disagreeing directions sits where feature lines cross; its strongest
/// member becomes a pivot, repositioned at the group centroid since its own
/// direction is unreliable there.
pub fn separate_duplicates(
    config: &SurfacingConfig,
    contours: Vec<Contour>,
) -> (Vec<Contour>, Vec<Contour>) {
    let tolerance = config.sub_step() * 0.5;
    let pivot_threshold = config.thresholds.pivot_alignment;

    let mut grid = PointGrid::new(tolerance);
    let mut groups: Vec<Vec<Contour>> = Vec::new();
    for contour in contours {
        match grid.nearest_within(contour.position, tolerance) {
            Some(id) => groups[id as usize].push(contour),
            None => {
                let id = groups.len() as u32;
                grid.insert(id, contour.position);
                groups.push(vec![contour]);
            }
        }
    }

    let mut kept = Vec::new();
    let mut pivots = Vec::new();
    for group in groups {
        let aligned = group.iter().enumerate().all(|(i, a)| {
            group[i + 1..]
                .iter()
                .all(|b| a.direction.dot(b.direction).abs() > pivot_threshold)
        });
        let centroid =
            group.iter().map(|c| c.position).sum::<Vec3>() / group.len() as f32;
        let Some(mut strongest) = group
            .into_iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
        else {
            continue;
        };
        if aligned {
            kept.push(strongest);
        } else {
            strongest.position = centroid;
            pivots.push(strongest);
        }
    }
    (kept, pivots)
}

/// Group contours into line aggregates.
///
/// Greedy worklist: each pass pops the first unprocessed contour as a line
/// base and claims all strongly aligned contours plus any tolerant pivots. A
/// contour consumed by one line cannot seed or join another line in the same
/// pass. Bases that match nothing become pivots themselves.
pub fn detect_lines(
    config: &SurfacingConfig,
    contours: Vec<Contour>,
    pivots: Vec<Contour>,
) -> Vec<LineAggregate> {
    let tolerance = config.distance_tolerance();
    let direction_threshold = config.thresholds.line_alignment;

    let mut remaining = contours;
    let mut pivots = pivots;
    let mut lines: Vec<LineAggregate> = Vec::new();

    while !remaining.is_empty() {
        let base = remaining.remove(0);
        let mut matched = Vec::new();
        let mut rest = Vec::with_capacity(remaining.len());
        for contour in remaining {
            if contours_align_strong(tolerance, direction_threshold, &base, &contour) {
                matched.push(contour);
            } else {
                rest.push(contour);
            }
        }
        remaining = rest;

        let pivot_matches: Vec<Contour> = pivots
            .iter()
            .filter(|pivot| contours_align(tolerance, &base, pivot))
            .cloned()
            .collect();

        if matched.is_empty() && pivot_matches.is_empty() {
            pivots.push(base);
        } else {
            let mut line = vec![base];
            line.extend(matched);
            line.extend(pivot_matches);
            lines.push(line);
        }
    }

    let (strong, weak): (Vec<_>, Vec<_>) = lines
        .into_iter()
        .partition(|line| line.len() > STRONG_LINE_MIN);
    incorporate_weak_contours(tolerance, weak.into_iter().flatten().collect(), strong)
}

fn farthest_points(points: &[Vec3]) -> (Vec3, Vec3) {
    debug_assert!(points.len() >= 2);
    let mut first = points[0];
    let mut second = points[1];
    let mut best = first.distance_squared(second);
    for &point in &points[2..] {
        let to_first = point.distance_squared(first);
        let to_second = point.distance_squared(second);
        if to_first > best && to_first >= to_second {
            second = point;
            best = to_first;
        } else if to_second > best {
            first = point;
            best = to_second;
        }
    }
    (first, second)
}

/// Convert a line aggregate to its spanning endpoint pair — the farthest two
/// contour positions.
///
/// Fails with [`SurfacingError::InsufficientSamples`] for aggregates of
/// fewer than two contours; returns `Ok(None)` when the farthest pair is
/// coincident (a zero-length feature).
pub fn line_to_edge(line: &LineAggregate) -> Result<Option<(Vec3, Vec3)>, SurfacingError> {
    if line.len() < 2 {
        return Err(SurfacingError::InsufficientSamples { have: line.len() });
    }
    let positions: Vec<Vec3> = line.iter().map(|c| c.position).collect();
    let (first, second) = farthest_points(&positions);
    if first == second {
        return Ok(None);
    }
    Ok(Some((first, second)))
}

/// Convert line aggregates to an edge-set with tolerance-clustered
/// endpoints.
///
/// Degenerate aggregates are logged and skipped; one bad line never aborts
/// the cell.
pub fn lines_to_edge_set(config: &SurfacingConfig, lines: &[LineAggregate]) -> EdgeSet {
    let mut pairs = Vec::with_capacity(lines.len());
    for line in lines {
        match line_to_edge(line) {
            Ok(Some(pair)) => pairs.push(pair),
            Ok(None) => {}
            Err(error) => {
                log::warn!("skipping degenerate line aggregate: {error}");
            }
        }
    }
    EdgeSet::from_endpoint_pairs(config.distance_tolerance(), &pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SubSample;

    fn contour_at(position: Vec3, direction: Vec3) -> Contour {
        let sample = SubSample {
            position,
            center: position,
            normal: Vec3::Z,
            distance: 0.0,
        };
        Contour {
            strength: 0.5,
            direction: direction.normalize(),
            position,
            normal: Vec3::Z,
            first_sample: sample,
            second_sample: sample,
        }
    }

    fn config() -> SurfacingConfig {
        SurfacingConfig::new(0.01, 1.0, 4)
    }

    #[test]
    fn coincident_aligned_contours_collapse_to_strongest() {
        let mut a = contour_at(Vec3::ZERO, Vec3::X);
        a.strength = 0.3;
        let mut b = contour_at(Vec3::new(0.01, 0.0, 0.0), Vec3::X);
        b.strength = 0.7;
        let (kept, pivots) = separate_duplicates(&config(), vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert!(pivots.is_empty());
        assert_eq!(kept[0].strength, 0.7);
    }

    #[test]
    fn crossing_directions_become_a_pivot() {
        let a = contour_at(Vec3::ZERO, Vec3::X);
        let b = contour_at(Vec3::new(0.01, 0.0, 0.0), Vec3::Y);
        let (kept, pivots) = separate_duplicates(&config(), vec![a, b]);
        assert!(kept.is_empty());
        assert_eq!(pivots.len(), 1);
    }

    #[test]
    fn isolated_contours_pass_through() {
        let a = contour_at(Vec3::ZERO, Vec3::X);
        let b = contour_at(Vec3::new(3.0, 0.0, 0.0), Vec3::Y);
        let (kept, pivots) = separate_duplicates(&config(), vec![a, b]);
        assert_eq!(kept.len(), 2);
        assert!(pivots.is_empty());
    }

    #[test]
    fn aligned_contours_form_one_line() {
        let contours: Vec<Contour> = (0..5)
            .map(|i| contour_at(Vec3::new(i as f32 * 0.1, 0.0, 0.0), Vec3::X))
            .collect();
        let lines = detect_lines(&config(), contours, Vec::new());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 5);
    }

    #[test]
    fn opposite_directions_still_align() {
        // |dot| is used, so antiparallel contour directions join one line.
        let contours: Vec<Contour> = (0..6)
            .map(|i| {
                let dir = if i % 2 == 0 { Vec3::X } else { -Vec3::X };
                contour_at(Vec3::new(i as f32 * 0.1, 0.0, 0.0), dir)
            })
            .collect();
        let lines = detect_lines(&config(), contours, Vec::new());
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn off_line_contours_are_excluded() {
        let mut contours: Vec<Contour> = (0..5)
            .map(|i| contour_at(Vec3::new(i as f32 * 0.1, 0.0, 0.0), Vec3::X))
            .collect();
        // Aligned in direction but far off the base's infinite line
        contours.push(contour_at(Vec3::new(0.2, 5.0, 0.0), Vec3::X));
        let lines = detect_lines(&config(), contours, Vec::new());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 5);
    }

    #[test]
    fn weak_lines_dissolve_into_pivots() {
        // Five contours along x (strong), two along y sharing the origin
        // (weak: only 2 members).
        let mut contours: Vec<Contour> = (0..5)
            .map(|i| contour_at(Vec3::new(i as f32 * 0.1, 0.0, 0.0), Vec3::X))
            .collect();
        contours.push(contour_at(Vec3::new(0.0, 0.3, 0.0), Vec3::Y));
        contours.push(contour_at(Vec3::new(0.0, 0.6, 0.0), Vec3::Y));
        let lines = detect_lines(&config(), contours, Vec::new());
        // The weak y-line dissolves; its members attach to the strong line
        // only if aligned with its infinite line (they sit on x=0, which the
        // x-axis line passes through at the origin — off-line by 0.3/0.6).
        assert_eq!(lines.len(), 1);
        assert!(lines[0].len() >= 5);
    }

    #[test]
    fn line_to_edge_picks_farthest_pair() {
        let line: LineAggregate = [0.0f32, 0.4, 0.1, 0.9, 0.3]
            .iter()
            .map(|&x| contour_at(Vec3::new(x, 0.0, 0.0), Vec3::X))
            .collect();
        let (a, b) = line_to_edge(&line).unwrap().unwrap();
        let span = a.distance(b);
        assert!((span - 0.9).abs() < 1e-6, "span {span}");
    }

    #[test]
    fn line_to_edge_rejects_single_contour() {
        let line = vec![contour_at(Vec3::ZERO, Vec3::X)];
        assert_eq!(
            line_to_edge(&line),
            Err(SurfacingError::InsufficientSamples { have: 1 })
        );
    }

    #[test]
    fn lines_to_edge_set_skips_bad_lines() {
        let good: LineAggregate = (0..4)
            .map(|i| contour_at(Vec3::new(i as f32 * 0.3, 0.0, 0.0), Vec3::X))
            .collect();
        let bad = vec![contour_at(Vec3::splat(2.0), Vec3::X)];
        let set = lines_to_edge_set(&config(), &[good, bad]);
        assert_eq!(set.edge_count(), 1);
    }
}
