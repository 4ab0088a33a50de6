//! RustyTerms - Term definition trees with derived XPath queries
//!
//! Layers:
//! - record: definition documents (`<mapper>` / `<attribute>` records)
//! - builder: dynamic-setting term builders
//! - tree: arena terminology with parent/child linkage and path resolution
//! - xpath: query derivation (absolute, relative, constrained)
//! - NIFs: terminology_* functions over a shared ResourceArc

pub mod builder;
mod deserialize;
pub mod error;
pub mod record;
mod resource;
mod term;
pub mod tree;
pub mod xpath;

use rustler::types::atom;
use rustler::{Binary, Encoder, Env, NifResult, Term};
use tracing::warn;

pub use builder::{SettingKey, SettingValue, TermBuilder};
pub use error::{Result, TermError};
pub use record::DefinitionRecord;
pub use tree::{DerivedQueries, TermId, TermNode, TermRef, Terminology};
pub use xpath::{QueryGenerator, XPathGenerator};

use resource::{TerminologyRef, TerminologyResource};
use term::{child_names_to_list, queries_to_tuple, str_to_binary, term_to_map};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Terminology NIFs
// ============================================================================

/// Empty pointers address the root; otherwise follow child names from it
fn resolve<S: AsRef<str>>(tree: &Terminology, pointers: &[S]) -> Option<TermId> {
    if pointers.is_empty() {
        Some(tree.root_id())
    } else {
        tree.retrieve(pointers)
    }
}

/// Lock failure → `{:error, reason}`
fn lock_error<'a>(env: Env<'a>, reason: &'static str) -> Term<'a> {
    warn!(reason, "terminology resource unavailable");
    (atom::error(), reason).encode(env)
}

/// Parse a definition document into a terminology (returns {:ok, ref} or {:error, reason})
/// Runs on a dirty CPU scheduler since large definitions are read and derived in one pass
#[rustler::nif(schedule = "DirtyCpu")]
fn terminology_parse<'a>(env: Env<'a>, input: Binary<'a>) -> NifResult<Term<'a>> {
    match TerminologyResource::parse(input.as_slice()) {
        Ok(resource) => {
            let arc = TerminologyRef::new(resource);
            Ok((atom::ok(), arc).encode(env))
        }
        Err(e) => Ok((atom::error(), e.to_string()).encode(env)),
    }
}

/// Term metadata as a map, nil when the pointers miss
#[rustler::nif]
fn terminology_term<'a>(env: Env<'a>, tree_ref: TerminologyRef, pointers: Vec<String>) -> NifResult<Term<'a>> {
    let result = tree_ref.with_tree(|tree| match resolve(tree, &pointers).and_then(|id| tree.term(id)) {
        Some(term) => term_to_map(env, term),
        None => Ok(atom::nil().encode(env)),
    });

    match result {
        Ok(term) => term,
        Err(reason) => Ok(lock_error(env, reason)),
    }
}

/// Derived queries as {absolute, relative, constrained}
#[rustler::nif]
fn terminology_xpath<'a>(env: Env<'a>, tree_ref: TerminologyRef, pointers: Vec<String>) -> NifResult<Term<'a>> {
    let result = tree_ref.with_tree(|tree| match resolve(tree, &pointers).and_then(|id| tree.term(id)) {
        Some(term) => queries_to_tuple(env, term),
        None => atom::nil().encode(env),
    });

    match result {
        Ok(term) => Ok(term),
        Err(reason) => Ok(lock_error(env, reason)),
    }
}

/// Absolute query restricted to terms whose content contains `value`
#[rustler::nif]
fn terminology_value_query<'a>(
    env: Env<'a>,
    tree_ref: TerminologyRef,
    pointers: Vec<String>,
    value: &str,
) -> NifResult<Term<'a>> {
    let result = tree_ref.with_tree(|tree| match resolve(tree, &pointers).and_then(|id| tree.term(id)) {
        Some(term) => str_to_binary(env, &XPathGenerator.value_query(term, value)),
        None => atom::nil().encode(env),
    });

    match result {
        Ok(term) => Ok(term),
        Err(reason) => Ok(lock_error(env, reason)),
    }
}

/// Child names of the addressed term (the root's children for empty pointers)
#[rustler::nif]
fn terminology_term_names<'a>(env: Env<'a>, tree_ref: TerminologyRef, pointers: Vec<String>) -> NifResult<Term<'a>> {
    let result = tree_ref.with_tree(|tree| match resolve(tree, &pointers).and_then(|id| tree.term(id)) {
        Some(term) => child_names_to_list(env, term),
        None => Term::list_new_empty(env),
    });

    match result {
        Ok(term) => Ok(term),
        Err(reason) => Ok(lock_error(env, reason)),
    }
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.RustyTerms.Native");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_empty_is_root() {
        let tree = Terminology::new(TermNode::new("people"));
        let empty: [&str; 0] = [];
        assert_eq!(resolve(&tree, &empty), Some(tree.root_id()));
        assert_eq!(resolve(&tree, &["missing"]), None);
    }
}
