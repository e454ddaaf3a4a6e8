//! Topology cleanup of the merged edge-set.
//!
//! The volume merge can leave duplicated edges, dangling stubs at cell
//! boundaries and chains of short colinear segments. Cleanup removes
//! duplicates, strips degree-1 stubs to a fixpoint and splices colinear
//! chains at degree-2 vertices into single edges.

use crate::types::EdgeSet;
use std::collections::HashSet;

/// Drop every edge that repeats an earlier edge in either orientation.
pub fn remove_duplicate_edges(set: &mut EdgeSet) {
    let mut seen: HashSet<(u32, u32)> = HashSet::with_capacity(set.edge_count());
    set.retain_edges(|_, edge| {
        let key = if edge[0] <= edge[1] {
            (edge[0], edge[1])
        } else {
            (edge[1], edge[0])
        };
        seen.insert(key)
    });
}

/// Strip edges with a degree-1 endpoint until a pass removes nothing.
///
/// Each pass can expose new degree-1 vertices, so this iterates to a
/// fixpoint. Terminates because every productive pass removes at least one
/// edge.
pub fn remove_dangling_edges(set: &mut EdgeSet) {
    loop {
        let degrees = set.degrees();
        let before = set.edge_count();
        set.retain_edges(|_, edge| {
            degrees[edge[0] as usize] > 1 && degrees[edge[1] as usize] > 1
        });
        if set.edge_count() == before {
            break;
        }
    }
}

/// Splice pairs of colinear edges meeting at a degree-2 vertex.
///
/// A vertex with exactly two incident edges whose directions agree above
/// `colinear_threshold` contributes no geometric information; its two edges
/// are replaced with one spanning edge. Runs to a fixpoint so chains of any
/// length collapse.
pub fn unify_linear_edges(set: &mut EdgeSet, colinear_threshold: f32) {
    loop {
        let degrees = set.degrees();
        let mut spliced: Option<(usize, usize, [u32; 2])> = None;

        'scan: for vertex in 0..set.vertex_count() as u32 {
            if degrees[vertex as usize] != 2 {
                continue;
            }
            let mut incident = [usize::MAX; 2];
            let mut found = 0;
            for (i, edge) in set.edges().iter().enumerate() {
                if edge[0] == vertex || edge[1] == vertex {
                    incident[found] = i;
                    found += 1;
                    if found == 2 {
                        break;
                    }
                }
            }
            if found != 2 {
                continue;
            }
            let (a, b) = (incident[0], incident[1]);
            let dot = set.edge_vector(a).dot(set.edge_vector(b));
            if dot.abs() <= colinear_threshold {
                continue;
            }
            let other = |index: usize| {
                let [p, q] = set.edges()[index];
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
            spliced = Some((a, b, [start, end]));
            break 'scan;
        }

        match spliced {
            Some((a, b, replacement)) => {
                set.retain_edges(|i, _| i != a && i != b);
                set.push_edge(replacement[0], replacement[1]);
            }
            None => break,
        }
    }
}

/// Full cleanup pass: duplicates, dangling stubs, colinear splices, then a
/// compaction that drops unreferenced vertices.
pub fn clean_topology(set: &mut EdgeSet, colinear_threshold: f32) {
    remove_duplicate_edges(set);
    remove_dangling_edges(set);
    unify_linear_edges(set, colinear_threshold);
    set.compact();
}
