//! Tree Module - Arena-based term definition tree
//!
//! Implements the terminology model using:
//! - Arena allocation for terms
//! - TermId (u32) indices for parent/child links
//! - Per-term caches of derived XPath queries with subtree invalidation

pub mod node;
pub mod terminology;

mod proptests;

pub use node::{DerivedQueries, TermId, TermNode, DEFAULT_DATA_TYPE, DEFAULT_NAMESPACE_PREFIX};
pub use terminology::{Descendants, TermRef, Terminology};
