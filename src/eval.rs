//! Evaluator: walks the compiled tree against a JSON value, writing
//! selections into a destination value that preserves input structure
//! (spec §4.4).
//!
//! The destination is built against a small internal `Proj` tree rather
//! than directly into `serde_json::Value`, so that "selected json null"
//! and "unselected array slot" are distinguished by the Rust type system
//! instead of an in-band sentinel value (spec §9 suggests a private
//! marker object; this is the typed equivalent of that trick).

use crate::segment::SegmentId;
use crate::selector::Selector;
use crate::tree::Tree;
use serde_json::{Map, Value};

enum Proj {
    Leaf(Value),
    Object(Vec<(String, Proj)>),
    Array(Vec<ArraySlot>),
}

enum ArraySlot {
    Unselected,
    Selected(Proj),
}

fn proj_kind(p: &Proj) -> &'static str {
    match p {
        Proj::Leaf(Value::Object(_)) => "object (raw)",
        Proj::Leaf(Value::Array(_)) => "array (raw)",
        Proj::Leaf(_) => "scalar",
        Proj::Object(_) => "object",
        Proj::Array(_) => "array",
    }
}

pub fn select(tree: &Tree, value: &Value) -> Value {
    if tree.arena[tree.root.0].children.is_empty() {
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            let mut dst = Vec::new();
            for &child in &tree.arena[tree.root.0].children {
                select_object(tree, child, value, map, &mut dst);
            }
            finalize_object(dst, tree.fixed_mode)
        }
        Value::Array(arr) => {
            let mut dst = Vec::new();
            for &child in &tree.arena[tree.root.0].children {
                select_array(tree, child, value, arr, &mut dst);
            }
            if dst.is_empty() {
                Value::Array(Vec::new())
            } else {
                finalize_array(dst, tree.fixed_mode)
            }
        }
        _ => Value::Null,
    }
}

fn finalize(proj: Proj, fixed_mode: bool) -> Value {
    match proj {
        Proj::Leaf(v) => v,
        Proj::Object(entries) => finalize_object(entries, fixed_mode),
        Proj::Array(slots) => finalize_array(slots, fixed_mode),
    }
}

fn finalize_object(entries: Vec<(String, Proj)>, fixed_mode: bool) -> Value {
    let mut map = Map::new();
    for (k, v) in entries {
        map.insert(k, finalize(v, fixed_mode));
    }
    Value::Object(map)
}

fn finalize_array(slots: Vec<ArraySlot>, fixed_mode: bool) -> Value {
    if fixed_mode {
        Value::Array(
            slots
                .into_iter()
                .map(|slot| match slot {
                    ArraySlot::Unselected => Value::Null,
                    ArraySlot::Selected(p) => finalize(p, fixed_mode),
                })
                .collect(),
        )
    } else {
        Value::Array(
            slots
                .into_iter()
                .filter_map(|slot| match slot {
                    ArraySlot::Unselected => None,
                    ArraySlot::Selected(p) => Some(finalize(p, fixed_mode)),
                })
                .collect(),
        )
    }
}

// ---- object side ----

/// Apply one segment's own selectors to `cur`, writing matches into `dst`;
/// plus, if the segment is a descendant, recurse into every object/array
/// member of `cur` re-applying the same segment (spec §4.4 `select_object`).
fn select_object(
    tree: &Tree,
    seg_id: SegmentId,
    root: &Value,
    cur: &Map<String, Value>,
    dst: &mut Vec<(String, Proj)>,
) {
    let segment = &tree.arena[seg_id.0];
    for selector in &segment.selectors {
        match selector {
            Selector::Name(name) => process_key(tree, seg_id, root, cur, dst, name),
            Selector::Wildcard => {
                let keys: Vec<String> = cur.keys().cloned().collect();
                for k in &keys {
                    process_key(tree, seg_id, root, cur, dst, k);
                }
            }
            Selector::Filter(p) => {
                let mut keys: Vec<String> = Vec::new();
                for (k, v) in cur.iter() {
                    if p.evaluate(v, root) {
                        keys.push(k.clone());
                    }
                }
                for k in &keys {
                    process_key(tree, seg_id, root, cur, dst, k);
                }
            }
            Selector::Index(_) | Selector::Slice { .. } => {}
        }
    }

    if segment.descendant {
        for (k, v) in cur.iter() {
            match v {
                Value::Object(sub) => {
                    let (idx, existed) = obj_slot(dst, k, ObjKind::Object);
                    {
                        let entries = obj_entries_mut(dst, idx);
                        select_object(tree, seg_id, root, sub, entries);
                    }
                    if !existed && obj_is_empty(&dst[idx].1) {
                        dst.remove(idx);
                    }
                }
                Value::Array(sub) => {
                    let (idx, existed) = obj_slot(dst, k, ObjKind::Array);
                    {
                        let slots = arr_slots_mut(dst, idx);
                        select_array(tree, seg_id, root, sub, slots);
                    }
                    if !existed && obj_is_empty(&dst[idx].1) {
                        dst.remove(idx);
                    }
                }
                _ => {}
            }
        }
    }
}

/// `process_key`: a selector of `seg` matched key `k`. Leaf segments copy
/// the raw value; otherwise recurse one level down using `seg`'s children.
fn process_key(
    tree: &Tree,
    seg_id: SegmentId,
    root: &Value,
    cur: &Map<String, Value>,
    dst: &mut Vec<(String, Proj)>,
    k: &str,
) {
    let Some(v) = cur.get(k) else { return };
    let segment = &tree.arena[seg_id.0];

    if segment.is_leaf() {
        set_leaf(dst, k, v.clone());
        return;
    }

    match v {
        Value::Object(sub) => {
            let (idx, existed) = obj_slot(dst, k, ObjKind::Object);
            {
                let entries = obj_entries_mut(dst, idx);
                for &child in &segment.children {
                    select_object(tree, child, root, sub, entries);
                }
            }
            if !existed && obj_is_empty(&dst[idx].1) {
                dst.remove(idx);
            }
        }
        Value::Array(sub) => {
            let (idx, existed) = obj_slot(dst, k, ObjKind::Array);
            {
                let slots = arr_slots_mut(dst, idx);
                for &child in &segment.children {
                    select_array(tree, child, root, sub, slots);
                }
            }
            if !existed && obj_is_empty(&dst[idx].1) {
                dst.remove(idx);
            }
        }
        _ => {}
    }
}

// ---- array side ----

fn select_array(
    tree: &Tree,
    seg_id: SegmentId,
    root: &Value,
    cur: &[Value],
    dst: &mut Vec<ArraySlot>,
) {
    let segment = &tree.arena[seg_id.0];
    let len = cur.len() as i64;
    for selector in &segment.selectors {
        match selector {
            Selector::Index(i) => {
                if let Some(idx) = normalize_index(*i, len) {
                    process_index(tree, seg_id, root, cur, dst, idx);
                }
            }
            Selector::Wildcard => {
                for idx in 0..cur.len() {
                    process_index(tree, seg_id, root, cur, dst, idx);
                }
            }
            Selector::Slice { start, end, step } => {
                for idx in slice_indexes(*start, *end, *step, len) {
                    process_index(tree, seg_id, root, cur, dst, idx);
                }
            }
            Selector::Filter(p) => {
                let mut idxs: Vec<usize> = Vec::new();
                for (i, v) in cur.iter().enumerate() {
                    if p.evaluate(v, root) {
                        idxs.push(i);
                    }
                }
                for idx in idxs {
                    process_index(tree, seg_id, root, cur, dst, idx);
                }
            }
            Selector::Name(_) => {}
        }
    }

    if segment.descendant {
        for (idx, v) in cur.iter().enumerate() {
            match v {
                Value::Object(sub) => {
                    let before = dst.len();
                    extend_to(dst, idx + 1);
                    let existed = matches!(dst[idx], ArraySlot::Selected(_));
                    let entries = arr_obj_entries_mut(dst, idx);
                    select_object(tree, seg_id, root, sub, entries);
                    finish_array_slot(dst, idx, before, existed);
                }
                Value::Array(sub) => {
                    let before = dst.len();
                    extend_to(dst, idx + 1);
                    let existed = matches!(dst[idx], ArraySlot::Selected(_));
                    let slots = arr_arr_slots_mut(dst, idx);
                    select_array(tree, seg_id, root, sub, slots);
                    finish_array_slot(dst, idx, before, existed);
                }
                _ => {}
            }
        }
    }
}

fn process_index(
    tree: &Tree,
    seg_id: SegmentId,
    root: &Value,
    cur: &[Value],
    dst: &mut Vec<ArraySlot>,
    idx: usize,
) {
    let before = dst.len();
    extend_to(dst, idx + 1);
    let segment = &tree.arena[seg_id.0];
    let v = &cur[idx];

    if segment.is_leaf() {
        dst[idx] = ArraySlot::Selected(Proj::Leaf(v.clone()));
        return;
    }

    match v {
        Value::Object(sub) => {
            let existed = matches!(dst[idx], ArraySlot::Selected(_));
            let entries = arr_obj_entries_mut(dst, idx);
            for &child in &segment.children {
                select_object(tree, child, root, sub, entries);
            }
            finish_array_slot(dst, idx, before, existed);
        }
        Value::Array(sub) => {
            let existed = matches!(dst[idx], ArraySlot::Selected(_));
            let slots = arr_arr_slots_mut(dst, idx);
            for &child in &segment.children {
                select_array(tree, child, root, sub, slots);
            }
            finish_array_slot(dst, idx, before, existed);
        }
        _ => {
            // scalar with children present: nothing can match; undo growth.
            if dst.len() > before {
                dst.truncate(before);
            }
        }
    }
}

/// After recursing into `dst[idx]`, if it ended up empty and this call is
/// the one that grew the array to reach it, shrink back so absence of a
/// match doesn't leave a trailing sentinel (spec §4.4 `process_index`).
fn finish_array_slot(dst: &mut Vec<ArraySlot>, idx: usize, before: usize, existed: bool) {
    let empty = match &dst[idx] {
        ArraySlot::Selected(Proj::Object(e)) => e.is_empty(),
        ArraySlot::Selected(Proj::Array(e)) => e.is_empty(),
        ArraySlot::Selected(Proj::Leaf(_)) => false,
        ArraySlot::Unselected => true,
    };
    if empty && !existed {
        if before <= idx {
            // this call grew dst to reach idx: nothing matched, undo the growth.
            dst.truncate(before);
        } else {
            dst[idx] = ArraySlot::Unselected;
        }
    }
}

// ---- small helpers ----

enum ObjKind {
    Object,
    Array,
}

fn obj_slot(dst: &mut Vec<(String, Proj)>, key: &str, kind: ObjKind) -> (usize, bool) {
    if let Some(pos) = dst.iter().position(|(k, _)| k == key) {
        (pos, true)
    } else {
        let placeholder = match kind {
            ObjKind::Object => Proj::Object(Vec::new()),
            ObjKind::Array => Proj::Array(Vec::new()),
        };
        dst.push((key.to_string(), placeholder));
        (dst.len() - 1, false)
    }
}

fn obj_entries_mut(dst: &mut [(String, Proj)], idx: usize) -> &mut Vec<(String, Proj)> {
    match &mut dst[idx].1 {
        Proj::Object(entries) => entries,
        other => panic!(
            "jsonpath-tree: destination corrupt — expected object at key {:?}, found {}",
            dst[idx].0,
            proj_kind(other)
        ),
    }
}

fn arr_slots_mut(dst: &mut [(String, Proj)], idx: usize) -> &mut Vec<ArraySlot> {
    match &mut dst[idx].1 {
        Proj::Array(slots) => slots,
        other => panic!(
            "jsonpath-tree: destination corrupt — expected array at key {:?}, found {}",
            dst[idx].0,
            proj_kind(other)
        ),
    }
}

fn obj_is_empty(p: &Proj) -> bool {
    match p {
        Proj::Object(e) => e.is_empty(),
        Proj::Array(e) => e.is_empty(),
        Proj::Leaf(_) => false,
    }
}

fn set_leaf(dst: &mut Vec<(String, Proj)>, key: &str, v: Value) {
    if let Some(pos) = dst.iter().position(|(k, _)| k == key) {
        dst[pos].1 = Proj::Leaf(v);
    } else {
        dst.push((key.to_string(), Proj::Leaf(v)));
    }
}

fn extend_to(dst: &mut Vec<ArraySlot>, len: usize) {
    while dst.len() < len {
        dst.push(ArraySlot::Unselected);
    }
}

fn arr_obj_entries_mut(dst: &mut [ArraySlot], idx: usize) -> &mut Vec<(String, Proj)> {
    match &mut dst[idx] {
        ArraySlot::Unselected => {
            dst[idx] = ArraySlot::Selected(Proj::Object(Vec::new()));
            match &mut dst[idx] {
                ArraySlot::Selected(Proj::Object(e)) => e,
                _ => unreachable!(),
            }
        }
        ArraySlot::Selected(Proj::Object(_)) => match &mut dst[idx] {
            ArraySlot::Selected(Proj::Object(e)) => e,
            _ => unreachable!(),
        },
        ArraySlot::Selected(other) => panic!(
            "jsonpath-tree: destination corrupt — expected object at index {idx}, found {}",
            proj_kind(other)
        ),
    }
}

fn arr_arr_slots_mut(dst: &mut [ArraySlot], idx: usize) -> &mut Vec<ArraySlot> {
    match &mut dst[idx] {
        ArraySlot::Unselected => {
            dst[idx] = ArraySlot::Selected(Proj::Array(Vec::new()));
            match &mut dst[idx] {
                ArraySlot::Selected(Proj::Array(e)) => e,
                _ => unreachable!(),
            }
        }
        ArraySlot::Selected(Proj::Array(_)) => match &mut dst[idx] {
            ArraySlot::Selected(Proj::Array(e)) => e,
            _ => unreachable!(),
        },
        ArraySlot::Selected(other) => panic!(
            "jsonpath-tree: destination corrupt — expected array at index {idx}, found {}",
            proj_kind(other)
        ),
    }
}

fn normalize_index(i: i64, len: i64) -> Option<usize> {
    let idx = if i < 0 { len + i } else { i };
    if idx >= 0 && idx < len {
        Some(idx as usize)
    } else {
        None
    }
}

fn slice_indexes(start: Option<i64>, end: Option<i64>, step: Option<i64>, len: i64) -> Vec<usize> {
    let step_val = step.unwrap_or(1);
    if step_val == 0 || len == 0 {
        return Vec::new();
    }
    let (lower, upper) = Selector::slice_bounds(start, end, step, len);
    let mut out = Vec::new();
    if step_val > 0 {
        let mut i = lower;
        while i < upper {
            if i >= 0 && i < len {
                out.push(i as usize);
            }
            i += step_val;
        }
    } else {
        let mut i = upper;
        while i > lower {
            if i >= 0 && i < len {
                out.push(i as usize);
            }
            i += step_val;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed::{OwnedPath, OwnedSegment};
    use serde_json::json;

    fn idx_path(idxs: Vec<i64>) -> OwnedPath {
        OwnedPath::new(vec![OwnedSegment::new(
            false,
            idxs.into_iter().map(Selector::Index).collect(),
        )])
    }

    #[test]
    fn s3_ordered_vs_fixed_array_selection() {
        let input = json!(["zero", "one", null, null, "four", "five"]);
        let paths = vec![idx_path(vec![1, 4, 3])];

        let ordered = Tree::compile(&paths).select(&input);
        assert_eq!(ordered, json!(["one", null, "four"]));

        let fixed = Tree::compile_fixed(&paths).select(&input);
        assert_eq!(fixed, json!([null, "one", null, null, "four"]));
    }

    #[test]
    fn identity_tree_returns_input_unchanged() {
        let tree = Tree::compile::<OwnedPath>(&[]);
        let input = json!({"a": 1, "b": [1, 2, 3]});
        assert_eq!(tree.select(&input), input);
    }

    #[test]
    fn projection_is_idempotent() {
        let paths = vec![idx_path(vec![0, 2])];
        let tree = Tree::compile(&paths);
        let input = json!(["a", "b", "c"]);
        let once = tree.select(&input);
        let twice = tree.select(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn scalar_input_with_non_empty_tree_is_null() {
        let paths = vec![idx_path(vec![0])];
        let tree = Tree::compile(&paths);
        assert_eq!(tree.select(&json!(42)), Value::Null);
        assert_eq!(tree.select(&Value::Null), Value::Null);
    }
}
