//! Sublines merger.
//!
//! `coordinates.json` describes each railway as a list of polyline
//! fragments. Fragments of type `sub` borrow a range of another railway's
//! polyline between two anchor points. This module resolves the references,
//! orders the fragments into a single continuous path, and deduplicates the
//! joining vertices.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::{debug, warn};

/// `(lon, lat)` pair, the coordinate order used by the source files.
pub type Coord = (f64, f64);

#[derive(Debug, Clone, Deserialize)]
pub struct RawCoordinates {
    #[serde(default)]
    pub railways: Vec<RawRailwayCoords>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRailwayCoords {
    pub id: String,
    #[serde(default)]
    pub sublines: Vec<RawSubline>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubline {
    /// `main` carries its own coordinates; `sub` references another railway.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub coords: Vec<[f64; 2]>,
    /// Referenced railway id (`sub` only).
    pub railway: Option<String>,
    /// Anchor near the start of the borrowed range (`sub` only).
    pub start: Option<[f64; 2]>,
    /// Anchor near the end of the borrowed range (`sub` only).
    pub end: Option<[f64; 2]>,
}

fn default_kind() -> String {
    "main".to_string()
}

/// Vertex equality is decided after rounding to 8 decimal places.
fn vertex_key(c: Coord) -> (i64, i64) {
    ((c.0 * 1e8).round() as i64, (c.1 * 1e8).round() as i64)
}

fn dist_sq(a: Coord, b: Coord) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Index of the polyline vertex closest to `coord` (squared Euclidean in
/// lon/lat space).
pub fn nearest_vertex_index(poly: &[Coord], coord: Coord) -> Option<usize> {
    poly.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            dist_sq(**a, coord)
                .partial_cmp(&dist_sq(**b, coord))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Merge every railway in the file into a single polyline each.
///
/// `is_loop` reports whether a railway id is a loop line, which changes the
/// traversal start. Railways that resolve to an empty polyline are omitted
/// from the result; the caller decides whether that is fatal.
pub fn merge_railways(
    raw: &RawCoordinates,
    is_loop: impl Fn(&str) -> bool,
) -> HashMap<String, Vec<Coord>> {
    let by_id: HashMap<&str, &RawRailwayCoords> =
        raw.railways.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut merged: HashMap<String, Vec<Coord>> = HashMap::new();
    let mut visiting: HashSet<String> = HashSet::new();

    for railway in &raw.railways {
        merge_line(&railway.id, &by_id, &mut merged, &mut visiting, &is_loop);
    }

    merged.retain(|id, poly| {
        if poly.is_empty() {
            warn!(railway = %id, "merged polyline is empty");
            false
        } else {
            true
        }
    });

    merged
}

fn merge_line(
    id: &str,
    by_id: &HashMap<&str, &RawRailwayCoords>,
    merged: &mut HashMap<String, Vec<Coord>>,
    visiting: &mut HashSet<String>,
    is_loop: &impl Fn(&str) -> bool,
) -> Option<Vec<Coord>> {
    if let Some(done) = merged.get(id) {
        return Some(done.clone());
    }
    if !visiting.insert(id.to_string()) {
        warn!(railway = %id, "cyclic subline reference, skipping");
        return None;
    }

    let result = by_id.get(id).copied().map(|railway| {
        let fragments = resolve_fragments(railway, by_id, merged, visiting, is_loop);
        assemble(&fragments, is_loop(id))
    });

    visiting.remove(id);

    if let Some(poly) = &result {
        merged.insert(id.to_string(), poly.clone());
    }
    result
}

/// Turn each subline into a concrete coordinate list.
fn resolve_fragments(
    railway: &RawRailwayCoords,
    by_id: &HashMap<&str, &RawRailwayCoords>,
    merged: &mut HashMap<String, Vec<Coord>>,
    visiting: &mut HashSet<String>,
    is_loop: &impl Fn(&str) -> bool,
) -> Vec<Vec<Coord>> {
    let mut fragments = Vec::with_capacity(railway.sublines.len());

    for (i, subline) in railway.sublines.iter().enumerate() {
        let coords = if subline.kind == "sub" {
            match resolve_reference(subline, by_id, merged, visiting, is_loop) {
                Some(coords) => coords,
                None => {
                    warn!(
                        railway = %railway.id,
                        subline = i,
                        referenced = subline.railway.as_deref().unwrap_or("?"),
                        "could not resolve subline reference, skipping fragment"
                    );
                    continue;
                }
            }
        } else {
            subline.coords.iter().map(|c| (c[0], c[1])).collect()
        };

        if coords.is_empty() {
            continue;
        }
        fragments.push(coords);
    }

    fragments
}

/// Slice the referenced railway's polyline between the vertices nearest the
/// anchors, reversing when the end lands before the start.
fn resolve_reference(
    subline: &RawSubline,
    by_id: &HashMap<&str, &RawRailwayCoords>,
    merged: &mut HashMap<String, Vec<Coord>>,
    visiting: &mut HashSet<String>,
    is_loop: &impl Fn(&str) -> bool,
) -> Option<Vec<Coord>> {
    let referenced = subline.railway.as_deref()?;
    let start = subline.start.map(|c| (c[0], c[1]))?;
    let end = subline.end.map(|c| (c[0], c[1]))?;

    let poly = merge_line(referenced, by_id, merged, visiting, is_loop)?;

    let s = nearest_vertex_index(&poly, start)?;
    let e = nearest_vertex_index(&poly, end)?;

    let slice: Vec<Coord> = if s <= e {
        poly[s..=e].to_vec()
    } else {
        let mut v = poly[e..=s].to_vec();
        v.reverse();
        v
    };
    Some(slice)
}

/// Order the fragments and concatenate them, deduplicating joining vertices.
fn assemble(fragments: &[Vec<Coord>], is_loop: bool) -> Vec<Coord> {
    if fragments.is_empty() {
        return Vec::new();
    }

    let order = match order_by_adjacency(fragments, is_loop) {
        Some(order) => order,
        None => greedy_chain(fragments),
    };

    let mut path: Vec<Coord> = Vec::new();
    for (idx, reversed) in order {
        let fragment = &fragments[idx];
        let iter: Box<dyn Iterator<Item = Coord> + '_> = if reversed {
            Box::new(fragment.iter().rev().copied())
        } else {
            Box::new(fragment.iter().copied())
        };

        let mut iter = iter.peekable();
        if let (Some(last), Some(first)) = (path.last(), iter.peek()) {
            if vertex_key(*last) == vertex_key(*first) {
                iter.next();
            }
        }
        path.extend(iter);
    }

    path
}

/// Depth-first ordering over the endpoint-adjacency graph.
///
/// An edge runs `a -> b` when `a`'s last vertex equals `b`'s first vertex
/// after rounding. Non-loop lines start from an in-degree-zero fragment,
/// loop lines from the first. Returns `None` when the graph carries no
/// edges at all or no start can be chosen, in which case the greedy chain
/// takes over.
fn order_by_adjacency(fragments: &[Vec<Coord>], is_loop: bool) -> Option<Vec<(usize, bool)>> {
    let n = fragments.len();
    if n == 1 {
        return Some(vec![(0, false)]);
    }

    // first-vertex key -> fragment indices
    let mut heads: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, f) in fragments.iter().enumerate() {
        heads.entry(vertex_key(f[0])).or_default().push(i);
    }

    let mut in_degree = vec![0usize; n];
    let mut edge_count = 0usize;
    for (i, f) in fragments.iter().enumerate() {
        let tail = vertex_key(*f.last().unwrap());
        if let Some(next) = heads.get(&tail) {
            for &j in next {
                if j != i {
                    in_degree[j] += 1;
                    edge_count += 1;
                }
            }
        }
    }
    if edge_count == 0 {
        return None;
    }

    let start = if is_loop {
        0
    } else {
        (0..n).find(|&i| in_degree[i] == 0)?
    };

    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        order.push((i, false));
        let tail = vertex_key(*fragments[i].last().unwrap());
        if let Some(next) = heads.get(&tail) {
            for &j in next.iter().rev() {
                if !visited[j] {
                    stack.push(j);
                }
            }
        }
    }

    // Disjoint leftovers are appended in file order.
    for (i, seen) in visited.iter().enumerate() {
        if !seen {
            debug!(fragment = i, "appending disjoint subline fragment");
            order.push((i, false));
        }
    }

    Some(order)
}

/// Fallback ordering: starting from fragment 0, repeatedly attach the unused
/// fragment whose nearer endpoint is closest to the current tail, reversing
/// it when its far endpoint is the closer one.
fn greedy_chain(fragments: &[Vec<Coord>]) -> Vec<(usize, bool)> {
    let n = fragments.len();
    let mut order = vec![(0usize, false)];
    let mut used = vec![false; n];
    used[0] = true;
    let mut tail = *fragments[0].last().unwrap();

    for _ in 1..n {
        let mut best: Option<(usize, bool, f64)> = None;
        for (i, fragment) in fragments.iter().enumerate() {
            if used[i] {
                continue;
            }
            let d_head = dist_sq(tail, fragment[0]);
            let d_tail = dist_sq(tail, *fragment.last().unwrap());
            let (reversed, d) = if d_tail < d_head {
                (true, d_tail)
            } else {
                (false, d_head)
            };
            if best.is_none_or(|(_, _, bd)| d < bd) {
                best = Some((i, reversed, d));
            }
        }
        let Some((i, reversed, _)) = best else { break };
        used[i] = true;
        tail = if reversed {
            fragments[i][0]
        } else {
            *fragments[i].last().unwrap()
        };
        order.push((i, reversed));
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(points: &[(f64, f64)]) -> Vec<[f64; 2]> {
        points.iter().map(|&(x, y)| [x, y]).collect()
    }

    fn main_subline(points: &[(f64, f64)]) -> RawSubline {
        RawSubline {
            kind: "main".to_string(),
            coords: coords(points),
            railway: None,
            start: None,
            end: None,
        }
    }

    fn railway(id: &str, sublines: Vec<RawSubline>) -> RawRailwayCoords {
        RawRailwayCoords {
            id: id.to_string(),
            sublines,
        }
    }

    fn not_loop(_: &str) -> bool {
        false
    }

    #[test]
    fn connected_fragments_merge_without_duplicate_join() {
        let raw = RawCoordinates {
            railways: vec![railway(
                "L",
                vec![
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                    main_subline(&[(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(
            merged["L"],
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]
        );
    }

    #[test]
    fn out_of_order_fragments_are_reordered_from_in_degree_zero() {
        // B follows A but is listed first; A has in-degree zero.
        let raw = RawCoordinates {
            railways: vec![railway(
                "L",
                vec![
                    main_subline(&[(1.0, 0.0), (2.0, 0.0)]),
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(merged["L"], vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
    }

    #[test]
    fn second_fragment_is_reversed_to_attach() {
        // No directed edge exists, so the greedy chain reverses the second
        // fragment and drops the duplicated joining vertex.
        let raw = RawCoordinates {
            railways: vec![railway(
                "L",
                vec![
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                    main_subline(&[(2.0, 0.0), (1.0, 0.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(merged["L"], vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
    }

    #[test]
    fn loop_line_starts_at_first_fragment() {
        // A ring of three fragments; every fragment has in-degree 1, so only
        // the loop flag makes the traversal start at index 0.
        let raw = RawCoordinates {
            railways: vec![railway(
                "Ring",
                vec![
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                    main_subline(&[(1.0, 0.0), (1.0, 1.0)]),
                    main_subline(&[(1.0, 1.0), (0.0, 0.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, |id| id == "Ring");
        assert_eq!(
            merged["Ring"],
            vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn ring_without_loop_flag_falls_back_to_greedy() {
        let raw = RawCoordinates {
            railways: vec![railway(
                "NotRing",
                vec![
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                    main_subline(&[(1.0, 0.0), (1.0, 1.0)]),
                    main_subline(&[(1.0, 1.0), (0.0, 0.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        // Greedy chain from fragment 0 still walks the ring.
        assert_eq!(
            merged["NotRing"],
            vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn disjoint_fragment_is_appended() {
        let raw = RawCoordinates {
            railways: vec![railway(
                "L",
                vec![
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                    main_subline(&[(1.0, 0.0), (2.0, 0.0)]),
                    main_subline(&[(9.0, 9.0), (10.0, 9.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(
            merged["L"],
            vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (9.0, 9.0), (10.0, 9.0)]
        );
    }

    #[test]
    fn sub_reference_slices_the_other_line() {
        let trunk = railway(
            "Trunk",
            vec![main_subline(&[
                (0.0, 0.0),
                (1.0, 0.0),
                (2.0, 0.0),
                (3.0, 0.0),
            ])],
        );
        let branch = railway(
            "Branch",
            vec![RawSubline {
                kind: "sub".to_string(),
                coords: vec![],
                railway: Some("Trunk".to_string()),
                start: Some([1.01, 0.0]),
                end: Some([3.0, 0.01]),
            }],
        );
        let raw = RawCoordinates {
            railways: vec![trunk, branch],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(merged["Branch"], vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
    }

    #[test]
    fn sub_reference_with_reversed_anchors_is_reversed() {
        let trunk = railway(
            "Trunk",
            vec![main_subline(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])],
        );
        let branch = railway(
            "Branch",
            vec![RawSubline {
                kind: "sub".to_string(),
                coords: vec![],
                railway: Some("Trunk".to_string()),
                start: Some([2.0, 0.0]),
                end: Some([0.0, 0.0]),
            }],
        );
        let raw = RawCoordinates {
            railways: vec![trunk, branch],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(merged["Branch"], vec![(2.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
    }

    #[test]
    fn reference_to_unknown_line_drops_the_fragment_only() {
        let raw = RawCoordinates {
            railways: vec![railway(
                "L",
                vec![
                    main_subline(&[(0.0, 0.0), (1.0, 0.0)]),
                    RawSubline {
                        kind: "sub".to_string(),
                        coords: vec![],
                        railway: Some("Ghost".to_string()),
                        start: Some([0.0, 0.0]),
                        end: Some([1.0, 0.0]),
                    },
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(merged["L"], vec![(0.0, 0.0), (1.0, 0.0)]);
    }

    #[test]
    fn cyclic_references_do_not_recurse_forever() {
        let a = railway(
            "A",
            vec![RawSubline {
                kind: "sub".to_string(),
                coords: vec![],
                railway: Some("B".to_string()),
                start: Some([0.0, 0.0]),
                end: Some([1.0, 0.0]),
            }],
        );
        let b = railway(
            "B",
            vec![RawSubline {
                kind: "sub".to_string(),
                coords: vec![],
                railway: Some("A".to_string()),
                start: Some([0.0, 0.0]),
                end: Some([1.0, 0.0]),
            }],
        );
        let raw = RawCoordinates {
            railways: vec![a, b],
        };
        let merged = merge_railways(&raw, not_loop);
        // Both collapse to empty and are dropped.
        assert!(merged.is_empty());
    }

    #[test]
    fn rounding_decides_vertex_equality() {
        // Differ at the 9th decimal: equal after rounding, join deduplicated.
        let raw = RawCoordinates {
            railways: vec![railway(
                "L",
                vec![
                    main_subline(&[(0.0, 0.0), (1.000000001, 0.0)]),
                    main_subline(&[(1.000000004, 0.0), (2.0, 0.0)]),
                ],
            )],
        };
        let merged = merge_railways(&raw, not_loop);
        assert_eq!(merged["L"].len(), 3);
    }

    #[test]
    fn nearest_vertex_picks_closest() {
        let poly = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        assert_eq!(nearest_vertex_index(&poly, (0.9, 0.1)), Some(1));
        assert_eq!(nearest_vertex_index(&poly, (5.0, 0.0)), Some(2));
        assert_eq!(nearest_vertex_index(&[], (0.0, 0.0)), None);
    }
}
