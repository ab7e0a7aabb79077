//! Tree nodes: a segment is a set of selectors plus an ordered list of
//! children, supporting merge, branch-equivalence, and deduplication
//! (spec §3, §4.2).

use crate::selector::{contains, exactly_contains, order_rank, slice_contains_slice, Selector};

/// Handle into a `Tree`'s segment arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(pub usize);

#[derive(Debug, Clone)]
pub struct Segment {
    pub descendant: bool,
    pub selectors: Vec<Selector>,
    pub children: Vec<SegmentId>,
}

impl Segment {
    pub fn new(descendant: bool, selectors: Vec<Selector>) -> Self {
        Self {
            descendant,
            selectors,
            children: Vec::new(),
        }
    }

    pub fn root() -> Self {
        Self {
            descendant: false,
            selectors: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Add every selector in `from` into `into` unless it is already loosely
/// contained; re-sorts and re-collapses wildcard afterward (spec §4.2).
pub fn merge_selectors(into: &mut Vec<Selector>, from: &[Selector]) {
    for s in from {
        if !contains(into, s) {
            into.push(s.clone());
        }
    }
    collapse_wildcard(into);
    sort_selectors(into);
}

/// If a wildcard is present, drop everything else (spec §3 invariant 2).
pub(crate) fn collapse_wildcard(selectors: &mut Vec<Selector>) {
    if selectors.iter().any(|s| matches!(s, Selector::Wildcard)) {
        selectors.retain(|s| matches!(s, Selector::Wildcard));
        selectors.truncate(1);
    }
}

/// Stable sort: slices first, then names/indexes (insertion order
/// preserved among themselves), filters last.
pub(crate) fn sort_selectors(selectors: &mut [Selector]) {
    // `sort_by_key` is stable, so entries with equal rank keep their
    // relative order.
    selectors.sort_by_key(order_rank);
}

/// Pairwise scan of all `Slice` members, replacing any slice strictly
/// contained by another with the containing one, to a fixed point
/// (spec §4.2 `merge_slices`).
pub fn merge_slices(selectors: &mut Vec<Selector>) {
    loop {
        let slice_idxs: Vec<usize> = selectors
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Selector::Slice { .. }))
            .map(|(i, _)| i)
            .collect();

        let mut absorbed: Option<usize> = None;
        'outer: for &i in &slice_idxs {
            for &j in &slice_idxs {
                if i == j {
                    continue;
                }
                let (Selector::Slice {
                    start: si,
                    end: ei,
                    step: ti,
                }) = selectors[i].clone() else { unreachable!() };
                let (Selector::Slice {
                    start: sj,
                    end: ej,
                    step: tj,
                }) = selectors[j].clone() else { unreachable!() };
                if slice_contains_slice((si, ei, ti), (sj, ej, tj)) {
                    absorbed = Some(i);
                    break 'outer;
                }
            }
        }

        match absorbed {
            Some(idx) => {
                selectors.remove(idx);
            }
            None => break,
        }
    }
    sort_selectors(selectors);
}

/// Same selectors (order-insensitive, loose) — spec §4.2.
pub fn same_selectors_loose(a: &[Selector], b: &[Selector]) -> bool {
    a.len() == b.len()
        && a.iter().all(|s| contains(b, s))
        && b.iter().all(|s| contains(a, s))
}

/// Exact selectors (order-insensitive, strict) — spec §4.2.
pub fn same_selectors_strict(a: &[Selector], b: &[Selector]) -> bool {
    a.len() == b.len()
        && a.iter().all(|s| exactly_contains(b, s))
        && b.iter().all(|s| exactly_contains(a, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_selectors_drops_redundant_index() {
        let mut into = vec![Selector::Slice {
            start: Some(0),
            end: Some(4),
            step: Some(1),
        }];
        merge_selectors(&mut into, &[Selector::Index(2)]);
        assert_eq!(into.len(), 1);
    }

    #[test]
    fn merge_selectors_collapses_to_wildcard() {
        let mut into = vec![Selector::Name("a".into())];
        merge_selectors(&mut into, &[Selector::Wildcard]);
        assert_eq!(into, vec![Selector::Wildcard]);
    }

    #[test]
    fn merge_slices_reduces_to_superset() {
        let mut selectors = vec![
            Selector::Slice {
                start: Some(2),
                end: Some(4),
                step: Some(1),
            },
            Selector::Slice {
                start: Some(0),
                end: Some(10),
                step: Some(1),
            },
        ];
        merge_slices(&mut selectors);
        assert_eq!(selectors.len(), 1);
        assert_eq!(
            selectors[0],
            Selector::Slice {
                start: Some(0),
                end: Some(10),
                step: Some(1)
            }
        );
    }
}
