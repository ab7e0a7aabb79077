//! Table-driven coverage of the seed scenarios (S1-S7) and the universal
//! invariants: merging paths into one tree, then evaluating it in both
//! array output modes.

use jsonpath_tree::refparser::parse;
use jsonpath_tree::{OwnedPath, Tree};
use serde_json::{json, Value};

fn compile(paths: &[&str]) -> Tree {
    let parsed: Vec<OwnedPath> = paths.iter().map(|p| parse(p).unwrap()).collect();
    Tree::compile(&parsed)
}

fn compile_fixed(paths: &[&str]) -> Tree {
    let parsed: Vec<OwnedPath> = paths.iter().map(|p| parse(p).unwrap()).collect();
    Tree::compile_fixed(&parsed)
}

#[test]
fn s1_merge_of_two_simple_paths() {
    let tree = compile(&["$.a", "$.b"]);
    let input = json!({"a": 1, "b": 2, "c": 3});
    assert_eq!(tree.select(&input), json!({"a": 1, "b": 2}));
}

fn profile_fixture() -> Value {
    json!({
        "profile": {
            "name": {"first": "Ada", "last": "Lovelace"},
            "contacts": {
                "email": {"primary": "ada@example.com", "secondary": "a@example.com"},
                "phones": {"primary": "555-0100", "secondary": "555-0101"},
                "addresses": {"primary": "1 Analytical Way", "secondary": "2 Engine Row"}
            }
        }
    })
}

#[test]
fn s2_descendant_merge_preserves_last_and_only_primary_contacts() {
    // The README fixture this scenario is drawn from nests `primary` one
    // level inside each of `contacts.{email,phones,addresses}`, so reaching
    // it needs a wildcard between the descendant `contacts` match and the
    // final `primary` selector (see DESIGN.md's resolution of this
    // scenario's path ambiguity).
    let tree = compile(&["$..last", "$..contacts.*.primary"]);
    let input = profile_fixture();
    let expected = json!({
        "profile": {
            "name": {"last": "Lovelace"},
            "contacts": {
                "email": {"primary": "ada@example.com"},
                "phones": {"primary": "555-0100"},
                "addresses": {"primary": "1 Analytical Way"}
            }
        }
    });
    assert_eq!(tree.select(&input), expected);
}

#[test]
fn s3_ordered_mode_array_selection() {
    let input = json!(["zero", "one", null, null, "four", "five"]);

    let ordered = compile(&["$[1,4,3]"]).select(&input);
    assert_eq!(ordered, json!(["one", null, "four"]));

    let fixed = compile_fixed(&["$[1,4,3]"]).select(&input);
    assert_eq!(fixed, json!([null, "one", null, null, "four"]));
}

#[test]
fn s4_wildcard_absorption_yields_identity_tree() {
    let tree = compile(&["$['x',4,*]", "$[*,1]"]);
    assert_eq!(tree.display(), "$\n");
    let input = json!({"anything": [1, 2, 3], "x": "y"});
    assert_eq!(tree.select(&input), input);
}

#[test]
fn s5_index_absorbed_into_slice() {
    let tree = compile(&["$[1,2,3,0:4]"]);
    // A tree that reduces [1,2,3,0:4:1] to a single slice selects every
    // index the slice covers and nothing more.
    let input = json!([10, 11, 12, 13, 14]);
    assert_eq!(tree.select(&input), json!([10, 11, 12, 13]));
}

#[test]
fn s6_branch_merging_with_sibling_names() {
    let tree = compile(&["$.a.x.b", "$.a.y.c", "$.a.x.c", "$.a.y.b"]);
    let input = json!({
        "a": {
            "x": {"b": 1, "c": 2, "d": 99},
            "y": {"b": 3, "c": 4, "d": 98}
        }
    });
    let expected = json!({
        "a": {
            "x": {"b": 1, "c": 2},
            "y": {"b": 3, "c": 4}
        }
    });
    assert_eq!(tree.select(&input), expected);
}

#[test]
fn s7_descendant_dominates_non_descendant_sibling() {
    let tree = compile(&["$.a..b", "$.a.b"]);
    let input = json!({
        "a": {
            "b": 1,
            "nested": {"b": 2, "c": 3}
        }
    });
    let expected = json!({
        "a": {
            "b": 1,
            "nested": {"b": 2}
        }
    });
    assert_eq!(tree.select(&input), expected);
}

#[test]
fn invariant_empty_tree_is_identity() {
    let tree = Tree::compile::<OwnedPath>(&[]);
    let input = json!({"a": 1, "b": [1, 2, {"c": true}], "d": null});
    assert_eq!(tree.select(&input), input);
}

#[test]
fn invariant_projection_is_idempotent() {
    let tree = compile(&["$.a[0:2]", "$..x"]);
    let input = json!({"a": [1, 2, 3], "x": 1, "nested": {"x": 2, "y": 3}});
    let once = tree.select(&input);
    let twice = tree.select(&once);
    assert_eq!(once, twice);
}

#[test]
fn invariant_recompiling_same_paths_is_deterministic() {
    let a = compile(&["$.a..b", "$.c[0,2]"]);
    let b = compile(&["$.a..b", "$.c[0,2]"]);
    assert_eq!(a.display(), b.display());
}

#[test]
fn invariant_duplicate_path_is_a_no_op() {
    let once = compile(&["$.a.b"]);
    let twice = compile(&["$.a.b", "$.a.b"]);
    assert_eq!(once.display(), twice.display());
}

#[test]
fn invariant_prefix_path_does_not_enlarge_tree() {
    let without_prefix = compile(&["$.a.b"]);
    let with_prefix = compile(&["$.a.b", "$.a"]);
    assert_eq!(without_prefix.display(), with_prefix.display());
}

#[test]
fn ordered_and_fixed_modes_agree_on_a_contiguous_prefix() {
    let input = json!(["a", "b", "c", "d", "e"]);
    let ordered = compile(&["$[0:3]"]).select(&input);
    let fixed = compile_fixed(&["$[0:3]"]).select(&input);
    assert_eq!(ordered, fixed);
}

#[test]
fn fixed_mode_pads_single_index_selection_with_leading_nulls() {
    let input = json!(["a", "b", "c", "d"]);
    let fixed = compile_fixed(&["$[2]"]).select(&input);
    assert_eq!(fixed, json!([null, null, "c"]));
}

#[test]
fn ordered_mode_never_leaves_unselected_slots() {
    let input = json!(["a", null, "c", null, "e"]);
    let ordered = compile(&["$[1,3]"]).select(&input);
    // both selected slots are the JSON null at indexes 1 and 3: both must
    // survive compression as explicit selected nulls, not be dropped.
    assert_eq!(ordered, json!([null, null]));
}

#[test]
fn tree_display_matches_box_drawing_rules() {
    let tree = compile(&["$.foo.x", "$.foo.y.*.a", "$.foo.y.*.b", "$.bar.go", "$.bar.hi"]);
    let expected = "$\n\
├── [\"foo\"]\n\
│   ├── [\"x\"]\n\
│   └── [\"y\"]\n\
│       └── [*]\n\
│           ├── [\"a\"]\n\
│           └── [\"b\"]\n\
└── [\"bar\"]\n\
    ├── [\"go\"]\n\
    └── [\"hi\"]\n";
    assert_eq!(tree.display(), expected);
}
