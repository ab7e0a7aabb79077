//! Compiler: folds a batch of parsed paths into a single minimized segment
//! tree (spec §4.3), plus the tree's display form (spec §6).

use crate::eval::select as eval_select;
use crate::parsed::{ParsedPath, ParsedSegment};
use crate::segment::{collapse_wildcard, merge_selectors, merge_slices, sort_selectors, Segment, SegmentId};
use crate::selector::{contains, exactly_contains, Selector};
use serde_json::Value;
use std::fmt::Write as _;

/// A compiled query: a read-only segment tree plus the array output mode
/// it was compiled for.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) arena: Vec<Segment>,
    pub(crate) root: SegmentId,
    pub(crate) fixed_mode: bool,
}

impl Tree {
    /// Compile in ordered array mode.
    pub fn compile<P: ParsedPath>(paths: &[P]) -> Self {
        Self::compile_with_mode(paths, false)
    }

    /// Compile in fixed array mode.
    pub fn compile_fixed<P: ParsedPath>(paths: &[P]) -> Self {
        Self::compile_with_mode(paths, true)
    }

    fn compile_with_mode<P: ParsedPath>(paths: &[P], fixed_mode: bool) -> Self {
        let mut tree = Tree {
            arena: vec![Segment::root()],
            root: SegmentId(0),
            fixed_mode,
        };
        for path in paths {
            tree.fold_path(path.segments());
        }
        let root = tree.root;
        tree.deduplicate(root);
        tree
    }

    /// Evaluate the tree against `value`, producing a structure-preserving
    /// projection (spec §4.4).
    pub fn select(&self, value: &Value) -> Value {
        eval_select(self, value)
    }

    /// Pretty-print the tree as a box-drawing diagram (spec §6).
    pub fn display(&self) -> String {
        let mut out = String::from("$\n");
        let children = &self.arena[self.root.0].children;
        for (idx, &child) in children.iter().enumerate() {
            let is_last = idx + 1 == children.len();
            self.write_node(&mut out, child, "", is_last);
        }
        out
    }

    fn write_node(&self, out: &mut String, id: SegmentId, prefix: &str, is_last: bool) {
        let seg = &self.arena[id.0];
        let connector = if is_last { "└── " } else { "├── " };
        let label = self.segment_label(seg);
        let _ = writeln!(out, "{prefix}{connector}{label}");

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        for (idx, &child) in seg.children.iter().enumerate() {
            let child_is_last = idx + 1 == seg.children.len();
            self.write_node(out, child, &child_prefix, child_is_last);
        }
    }

    fn segment_label(&self, seg: &Segment) -> String {
        let mut out = String::new();
        if seg.descendant {
            out.push_str("..");
        }
        out.push('[');
        for (idx, selector) in seg.selectors.iter().enumerate() {
            if idx > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{selector}");
        }
        out.push(']');
        out
    }

    // ---- compiler internals ----

    /// Normalize a raw selector list per spec §4.3 step 1: sort so
    /// wildcard/slice come first, dedupe (absorbing indexes into slices
    /// that cover them, collapsing slice supersets), collapse to a single
    /// wildcard if any is present.
    fn normalize<S: ParsedSegment>(seg: &S) -> (Vec<Selector>, bool) {
        let mut sorted: Vec<Selector> = seg.selectors().to_vec();
        sort_selectors(&mut sorted);

        let mut result: Vec<Selector> = Vec::new();
        for s in sorted {
            if !contains(&result, &s) {
                result.push(s);
            }
        }
        merge_slices(&mut result);
        collapse_wildcard(&mut result);
        sort_selectors(&mut result);

        let is_wild = matches!(result.as_slice(), [Selector::Wildcard]);
        (result, is_wild)
    }

    fn fold_path<S: ParsedSegment>(&mut self, segs: &[S]) {
        let n = segs.len();
        let mut cur = self.root;
        let mut i = 0usize;

        'path: while i < n {
            let seg = &segs[i];
            let (selectors, is_wild) = Self::normalize(seg);

            if is_wild && i + 1 == n {
                return;
            }

            let candidates = self.arena[cur.0].children.clone();
            for cid in candidates {
                let (c_descendant, c_selectors) = {
                    let c = &self.arena[cid.0];
                    (c.descendant, c.selectors.clone())
                };

                if c_descendant == seg.is_descendant() {
                    if self.is_branch(cid, &segs[i + 1..]) {
                        merge_selectors(&mut self.arena[cid.0].selectors, &selectors);
                        cur = cid;
                        i += 1;
                        continue 'path;
                    } else if Self::same_loose(&c_selectors, &selectors) {
                        if self.arena[cid.0].children.is_empty() {
                            return;
                        } else if i + 1 == n {
                            self.arena[cid.0].children.clear();
                            return;
                        } else {
                            cur = cid;
                            i += 1;
                            continue 'path;
                        }
                    }
                } else if is_wild
                    && !c_descendant
                    && matches!(c_selectors.as_slice(), [Selector::Wildcard])
                    && self.is_branch(cid, &segs[i + 1..])
                {
                    self.arena[cid.0].descendant = true;
                    cur = cid;
                    i += 1;
                    continue 'path;
                }
            }

            let new_id = SegmentId(self.arena.len());
            self.arena.push(Segment::new(seg.is_descendant(), selectors));
            self.arena[cur.0].children.push(new_id);
            cur = new_id;
            i += 1;
        }
    }

    fn same_loose(a: &[Selector], b: &[Selector]) -> bool {
        a.len() == b.len() && a.iter().all(|s| contains(b, s)) && b.iter().all(|s| contains(a, s))
    }

    fn same_strict(a: &[Selector], b: &[Selector]) -> bool {
        a.len() == b.len()
            && a.iter().all(|s| exactly_contains(b, s))
            && b.iter().all(|s| exactly_contains(a, s))
    }

    /// `is_branch`: does `id`'s descendant chain match `remaining` exactly,
    /// one child per level, terminating at a leaf? (spec §4.2)
    fn is_branch<S: ParsedSegment>(&self, id: SegmentId, remaining: &[S]) -> bool {
        if remaining.is_empty() {
            return self.arena[id.0].is_leaf();
        }
        let node = &self.arena[id.0];
        if node.children.len() != 1 {
            return false;
        }
        let child_id = node.children[0];
        let child = &self.arena[child_id.0];
        let next = &remaining[0];
        if child.descendant != next.is_descendant() {
            return false;
        }
        let (normalized, _) = Self::normalize(next);
        if !Self::same_loose(&child.selectors, &normalized) {
            return false;
        }
        self.is_branch(child_id, &remaining[1..])
    }

    /// Recursive structural equality of two segments' descendant subtrees
    /// (spec §4.2 "same branches"): every child of one has a counterpart
    /// in the other with exactly the same selectors and the same branches.
    fn same_branches(&self, a: SegmentId, b: SegmentId) -> bool {
        let ac = &self.arena[a.0].children;
        let bc = &self.arena[b.0].children;
        if ac.len() != bc.len() {
            return false;
        }
        let ac = ac.clone();
        let bc = bc.clone();
        let mut used = vec![false; bc.len()];
        'outer: for &ca in &ac {
            for (idx, &cb) in bc.iter().enumerate() {
                if used[idx] {
                    continue;
                }
                let descendant_matches =
                    self.arena[ca.0].descendant == self.arena[cb.0].descendant;
                let selectors_match =
                    Self::same_strict(&self.arena[ca.0].selectors, &self.arena[cb.0].selectors);
                if descendant_matches && selectors_match && self.same_branches(ca, cb) {
                    used[idx] = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }

    /// Final pass (spec §4.3 "Final pass" / §4.2 `deduplicate`): post-order
    /// reconcile siblings that are branch-equivalent.
    fn deduplicate(&mut self, id: SegmentId) {
        let children = self.arena[id.0].children.clone();
        for &c in &children {
            self.deduplicate(c);
        }

        let mut merged_out: Vec<SegmentId> = Vec::new();
        for cur_id in children {
            let mut matched = false;
            for idx in 0..merged_out.len() {
                let prev_id = merged_out[idx];
                if !self.same_branches(prev_id, cur_id) {
                    continue;
                }
                let prev_descendant = self.arena[prev_id.0].descendant;
                let cur_descendant = self.arena[cur_id.0].descendant;

                if prev_descendant == cur_descendant {
                    let cur_selectors = self.arena[cur_id.0].selectors.clone();
                    merge_selectors(&mut self.arena[prev_id.0].selectors, &cur_selectors);
                    merge_slices(&mut self.arena[prev_id.0].selectors);
                } else if !prev_descendant && cur_descendant {
                    let cur_selectors = self.arena[cur_id.0].selectors.clone();
                    self.arena[prev_id.0]
                        .selectors
                        .retain(|s| !contains(&cur_selectors, s));
                    if self.arena[prev_id.0].selectors.is_empty() {
                        merged_out[idx] = cur_id;
                    } else {
                        merged_out.push(cur_id);
                    }
                } else {
                    let prev_selectors = self.arena[prev_id.0].selectors.clone();
                    self.arena[cur_id.0]
                        .selectors
                        .retain(|s| !contains(&prev_selectors, s));
                    if !self.arena[cur_id.0].selectors.is_empty() {
                        merged_out.push(cur_id);
                    }
                }
                matched = true;
                break;
            }
            if !matched {
                merged_out.push(cur_id);
            }
        }

        self.arena[id.0].children = merged_out;
        merge_slices(&mut self.arena[id.0].selectors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed::{OwnedPath, OwnedSegment};
    use serde_json::json;

    fn name(n: &str) -> Selector {
        Selector::Name(n.to_string())
    }

    fn path(segs: Vec<(bool, Vec<Selector>)>) -> OwnedPath {
        OwnedPath::new(
            segs.into_iter()
                .map(|(d, s)| OwnedSegment::new(d, s))
                .collect(),
        )
    }

    #[test]
    fn s1_merge_of_two_simple_paths() {
        let paths = vec![
            path(vec![(false, vec![name("a")])]),
            path(vec![(false, vec![name("b")])]),
        ];
        let tree = Tree::compile(&paths);
        let input = json!({"a": 1, "b": 2, "c": 3});
        assert_eq!(tree.select(&input), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn s4_wildcard_absorption_yields_identity() {
        let paths = vec![
            path(vec![(
                false,
                vec![name("x"), Selector::Index(4), Selector::Wildcard],
            )]),
            path(vec![(false, vec![Selector::Wildcard, Selector::Index(1)])]),
        ];
        let tree = Tree::compile(&paths);
        assert!(tree.arena[tree.root.0].children.is_empty());
        let input = json!({"anything": [1, 2, 3]});
        assert_eq!(tree.select(&input), input);
    }

    #[test]
    fn s5_index_absorbed_into_slice() {
        let paths = vec![path(vec![(
            false,
            vec![
                Selector::Index(1),
                Selector::Index(2),
                Selector::Index(3),
                Selector::Slice {
                    start: Some(0),
                    end: Some(4),
                    step: Some(1),
                },
            ],
        )])];
        let tree = Tree::compile(&paths);
        let child = tree.arena[tree.root.0].children[0];
        let selectors = &tree.arena[child.0].selectors;
        assert_eq!(selectors.len(), 1);
        assert!(matches!(selectors[0], Selector::Slice { .. }));
    }

    #[test]
    fn deduplicate_collapses_overlapping_slices_on_sibling_merge() {
        // Built by hand rather than via `Tree::compile`/fold_path: two
        // already-distinct sibling segments (same branches below, both
        // non-descendant) whose own selectors are pairwise-contained
        // slices. `deduplicate`'s same/same sibling-merge branch must
        // leave only the superset slice behind, not both.
        let slice = |start: i64, end: i64| Selector::Slice {
            start: Some(start),
            end: Some(end),
            step: Some(1),
        };
        let mut tree = Tree {
            arena: vec![Segment::root()],
            root: SegmentId(0),
            fixed_mode: false,
        };
        let leaf_a = SegmentId(tree.arena.len());
        tree.arena.push(Segment::new(false, vec![name("x")]));
        let child_a = SegmentId(tree.arena.len());
        tree.arena.push(Segment::new(false, vec![slice(0, 5)]));
        tree.arena[child_a.0].children.push(leaf_a);

        let leaf_b = SegmentId(tree.arena.len());
        tree.arena.push(Segment::new(false, vec![name("x")]));
        let child_b = SegmentId(tree.arena.len());
        tree.arena.push(Segment::new(false, vec![slice(0, 10)]));
        tree.arena[child_b.0].children.push(leaf_b);

        tree.arena[tree.root.0].children = vec![child_a, child_b];

        let root = tree.root;
        tree.deduplicate(root);

        let root_children = &tree.arena[tree.root.0].children;
        assert_eq!(root_children.len(), 1);
        let merged = root_children[0];
        assert_eq!(tree.arena[merged.0].selectors, vec![slice(0, 10)]);
    }

    #[test]
    fn s6_branch_merging_with_sibling_names() {
        let paths = vec![
            path(vec![
                (false, vec![name("a")]),
                (false, vec![name("x")]),
                (false, vec![name("b")]),
            ]),
            path(vec![
                (false, vec![name("a")]),
                (false, vec![name("y")]),
                (false, vec![name("c")]),
            ]),
            path(vec![
                (false, vec![name("a")]),
                (false, vec![name("x")]),
                (false, vec![name("c")]),
            ]),
            path(vec![
                (false, vec![name("a")]),
                (false, vec![name("y")]),
                (false, vec![name("b")]),
            ]),
        ];
        let tree = Tree::compile(&paths);
        let root_children = &tree.arena[tree.root.0].children;
        assert_eq!(root_children.len(), 1);
        let a = root_children[0];
        assert_eq!(tree.arena[a.0].selectors, vec![name("a")]);
        assert_eq!(tree.arena[a.0].children.len(), 1);
        let xy = tree.arena[a.0].children[0];
        let mut xy_sel = tree.arena[xy.0].selectors.clone();
        xy_sel.sort_by_key(|s| s.to_string());
        assert_eq!(xy_sel, vec![name("x"), name("y")]);
        assert_eq!(tree.arena[xy.0].children.len(), 1);
        let bc = tree.arena[xy.0].children[0];
        let mut bc_sel = tree.arena[bc.0].selectors.clone();
        bc_sel.sort_by_key(|s| s.to_string());
        assert_eq!(bc_sel, vec![name("b"), name("c")]);
    }

    #[test]
    fn s7_descendant_dominates_child() {
        let paths = vec![
            path(vec![(false, vec![name("a")]), (true, vec![name("b")])]),
            path(vec![(false, vec![name("a")]), (false, vec![name("b")])]),
        ];
        let tree = Tree::compile(&paths);
        let a = tree.arena[tree.root.0].children[0];
        assert_eq!(tree.arena[a.0].children.len(), 1);
        let b = tree.arena[a.0].children[0];
        assert!(tree.arena[b.0].descendant);
    }

    #[test]
    fn duplicate_path_is_a_no_op() {
        let paths = vec![
            path(vec![(false, vec![name("a")])]),
            path(vec![(false, vec![name("a")])]),
        ];
        let once = Tree::compile(&paths[..1]);
        let twice = Tree::compile(&paths);
        assert_eq!(once.display(), twice.display());
    }

    #[test]
    fn prefix_path_does_not_enlarge_tree() {
        let long = path(vec![(false, vec![name("a")]), (false, vec![name("b")])]);
        let prefix = path(vec![(false, vec![name("a")])]);
        let without_prefix = Tree::compile(std::slice::from_ref(&long));
        let with_prefix = Tree::compile(&[long, prefix]);
        assert_eq!(without_prefix.display(), with_prefix.display());
    }
}
