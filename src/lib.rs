//! Merge a batch of RFC 9535 JSONPath queries into a single minimized
//! selector tree and evaluate it once against a JSON value, producing a
//! structure-preserving projection that contains exactly the union of
//! the selected locations plus their ancestor containers.
//!
//! The core is parser-agnostic: it consumes anything implementing
//! [`ParsedPath`]/[`ParsedSegment`] and never parses path text itself.
//! A small bundled reference parser lives in [`refparser`] for callers
//! that don't already have a JSONPath parser on hand.

mod eval;
mod parsed;
mod segment;
mod selector;
mod tree;

pub mod refparser;

pub use parsed::{OwnedPath, OwnedSegment, ParsedPath, ParsedSegment};
pub use selector::{FilterPredicate, Selector};
pub use tree::Tree;
