//! JSONPath selectors and the containment predicates the compiler merges on.

use std::fmt;
use std::sync::Arc;

/// One RFC 9535 selector. Mirrors `json-joy-json-path`'s `Selector` enum,
/// with `Filter` made opaque (delegated to an external predicate) rather
/// than carrying its own filter-expression AST — filter evaluation is an
/// external collaborator, not the core's concern.
#[derive(Debug, Clone)]
pub enum Selector {
    Name(String),
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Wildcard,
    Filter(Arc<dyn FilterPredicate>),
}

/// Contract the core expects from a filter expression: evaluate it against
/// a candidate value, and expose a canonical string used as an identity key
/// for deduplication (see spec §4.1, §9 — semantic filter equivalence is an
/// explicit non-goal). `Send + Sync` so a compiled `Tree` can be shared
/// across threads (spec §5).
pub trait FilterPredicate: fmt::Debug + Send + Sync {
    fn evaluate(&self, current: &serde_json::Value, root: &serde_json::Value) -> bool;
    fn canonical(&self) -> &str;
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Selector::Name(a), Selector::Name(b)) => a == b,
            (Selector::Index(a), Selector::Index(b)) => a == b,
            (
                Selector::Slice {
                    start: s1,
                    end: e1,
                    step: t1,
                },
                Selector::Slice {
                    start: s2,
                    end: e2,
                    step: t2,
                },
            ) => s1 == s2 && e1 == e2 && t1 == t2,
            (Selector::Wildcard, Selector::Wildcard) => true,
            (Selector::Filter(a), Selector::Filter(b)) => a.canonical() == b.canonical(),
            _ => false,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name(name) => write!(f, "{:?}", name),
            Selector::Index(idx) => write!(f, "{idx}"),
            Selector::Slice { start, end, step } => {
                write_opt(f, *start)?;
                write!(f, ":")?;
                write_opt(f, *end)?;
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                Ok(())
            }
            Selector::Wildcard => write!(f, "*"),
            Selector::Filter(p) => write!(f, "?{}", p.canonical()),
        }
    }
}

fn write_opt(f: &mut fmt::Formatter<'_>, v: Option<i64>) -> fmt::Result {
    if let Some(v) = v {
        write!(f, "{v}")
    } else {
        Ok(())
    }
}

/// Rank used to order selectors within a segment per spec §3 invariant 3:
/// slices first, then names/indexes (insertion order), filters last,
/// wildcard alone.
pub fn order_rank(s: &Selector) -> u8 {
    match s {
        Selector::Wildcard => 0,
        Selector::Slice { .. } => 1,
        Selector::Name(_) | Selector::Index(_) => 2,
        Selector::Filter(_) => 3,
    }
}

impl Selector {
    /// Effective step, defaulting missing step to 1 per RFC 9535.
    pub fn step(start: Option<i64>, end: Option<i64>, step: Option<i64>) -> i64 {
        let _ = (start, end);
        step.unwrap_or(1)
    }

    /// Compute `(lower, upper)` bounds of a slice against an array of `len`,
    /// per RFC 9535 §2.3.4.2.2. `len` may be a "virtual" length used by the
    /// compile-time containment checks (see `slice_contains_index`).
    pub fn slice_bounds(
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
        len: i64,
    ) -> (i64, i64) {
        let step = step.unwrap_or(1);
        if step == 0 {
            return (0, 0);
        }
        let normalize = |i: i64| -> i64 {
            if i >= 0 {
                i
            } else {
                len + i
            }
        };
        if step > 0 {
            let lower = start
                .map(normalize)
                .map(|v| v.clamp(0, len))
                .unwrap_or(0);
            let upper = end.map(normalize).map(|v| v.clamp(0, len)).unwrap_or(len);
            (lower, upper)
        } else {
            let upper = start
                .map(normalize)
                .map(|v| v.clamp(-1, len - 1))
                .unwrap_or(len - 1);
            let lower = end
                .map(normalize)
                .map(|v| v.clamp(-1, len - 1))
                .unwrap_or(-1);
            (lower, upper)
        }
    }
}

/// Loose containment: is `needle` already dominated by some selector in
/// `selectors`? Used by merge to decide whether adding `needle` is
/// redundant. See spec §4.1.
pub fn contains(selectors: &[Selector], needle: &Selector) -> bool {
    if selectors.iter().any(|s| matches!(s, Selector::Wildcard)) {
        return true;
    }
    match needle {
        Selector::Name(name) => selectors
            .iter()
            .any(|s| matches!(s, Selector::Name(n) if n == name)),
        Selector::Index(i) => selectors.iter().any(|s| match s {
            Selector::Index(j) => j == i,
            Selector::Slice { start, end, step } => {
                slice_contains_index(*start, *end, *step, *i)
            }
            _ => false,
        }),
        Selector::Slice { start, end, step } => selectors.iter().any(|s| match s {
            Selector::Slice {
                start: s2,
                end: e2,
                step: t2,
            } => slice_contains_slice((*start, *end, *step), (*s2, *e2, *t2)),
            Selector::Index(i) => is_single_element_slice(*start, *end, *step, *i),
            _ => false,
        }),
        Selector::Wildcard => false,
        Selector::Filter(p) => selectors
            .iter()
            .any(|s| matches!(s, Selector::Filter(q) if q.canonical() == p.canonical())),
    }
}

/// Strict containment: used to detect identical branches. `Index` matches
/// only `Index`, `Slice` only identical `Slice`, `Wildcard` only
/// `Wildcard`, `Filter` only same-canonical `Filter`, `Name` only same
/// `Name`.
pub fn exactly_contains(selectors: &[Selector], needle: &Selector) -> bool {
    selectors.iter().any(|s| s == needle)
}

/// `Slice(start, end, step)` is a single-element slice equal to `Index(i)`.
fn is_single_element_slice(start: Option<i64>, end: Option<i64>, step: Option<i64>, i: i64) -> bool {
    let step_val = step.unwrap_or(1);
    if step_val == 0 {
        return false;
    }
    match (start, end) {
        (Some(s), Some(e)) => {
            if step_val > 0 {
                s == i && e == i + 1
            } else {
                s == i && e == i - 1
            }
        }
        _ => false,
    }
}

/// Slice-contains-index rule per spec §4.1. Returns `false` whenever the
/// answer would depend on runtime array length (negative start, or a
/// backward slice with `|step| > 1`) rather than guess.
pub fn slice_contains_index(start: Option<i64>, end: Option<i64>, step: Option<i64>, i: i64) -> bool {
    let step_val = step.unwrap_or(1);
    if step_val == 0 {
        return false;
    }
    if let Some(s) = start {
        if s < 0 {
            return false;
        }
    } else if step_val < 0 {
        // missing start on a backward slice defaults to len-1: length-dependent.
        return false;
    }
    if step_val < -1 {
        return false;
    }

    let virt_len = i.unsigned_abs().max(start.unwrap_or(0).unsigned_abs()).max(
        end.unwrap_or(0).unsigned_abs(),
    ) as i64
        + 1;
    let (lower, upper) = Selector::slice_bounds(start, end, step, virt_len);

    let i_eff = if i < 0 { upper + i } else { i };

    if step_val > 0 {
        i_eff >= lower && i_eff < upper && (i_eff - lower) % step_val == 0
    } else {
        // step_val == -1 here (we rejected step_val < -1 above).
        lower < i_eff && i_eff <= upper
    }
}

/// Slice-contains-slice rule per spec §4.1.
pub fn slice_contains_slice(
    sub: (Option<i64>, Option<i64>, Option<i64>),
    sup: (Option<i64>, Option<i64>, Option<i64>),
) -> bool {
    let (sub_start, sub_end, sub_step_opt) = sub;
    let (sup_start, sup_end, sup_step_opt) = sup;
    let sub_step = sub_step_opt.unwrap_or(1);
    let sup_step = sup_step_opt.unwrap_or(1);

    if is_degenerate(sub_start, sub_end, sub_step_opt) {
        return true;
    }
    if sup_step == 0 {
        return false;
    }
    if sub_step % sup_step != 0 {
        return false;
    }

    match (sub_step > 0, sup_step > 0) {
        (true, true) => match (sub_start, sub_end, sup_start, sup_end) {
            (Some(ss), Some(se), Some(ps), Some(pe)) => ss >= ps && se <= pe,
            _ => false,
        },
        (false, false) => match (sub_start, sub_end, sup_start, sup_end) {
            (Some(ss), Some(se), Some(ps), Some(pe)) => ss <= ps && se >= pe,
            _ => false,
        },
        (false, true) => match (sub_start, sub_end, sup_start, sup_end) {
            (Some(ss), Some(se), Some(ps), Some(pe)) => ss < pe && se >= ps - 1,
            _ => false,
        },
        (true, false) => match (sub_start, sub_end, sup_start, sup_end) {
            (Some(ss), Some(se), Some(ps), Some(pe)) => ss > pe && se <= ps + 1,
            _ => false,
        },
    }
}

fn is_degenerate(start: Option<i64>, end: Option<i64>, step: Option<i64>) -> bool {
    let step_val = step.unwrap_or(1);
    if step_val == 0 {
        return true;
    }
    match (start, end) {
        (Some(s), Some(e)) => {
            if s == e {
                return true;
            }
            if step_val > 0 && s > e {
                return true;
            }
            if step_val < 0 && s < e {
                return true;
            }
            false
        }
        _ => false,
    }
}
