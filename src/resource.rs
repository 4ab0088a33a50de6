//! ResourceArc Wrappers
//!
//! Persistent state for terminologies handed to the BEAM.

use std::sync::RwLock;

use rustler::ResourceArc;
use tracing::debug;

use crate::error::Result;
use crate::tree::Terminology;

/// Wrapper for a finished Terminology that can be stored in a ResourceArc
///
/// The tree is read-mostly after construction, so readers share the lock.
pub struct TerminologyResource {
    pub tree: RwLock<Terminology>,
}

impl TerminologyResource {
    /// Read a definition document, mark its root term and derive all queries
    pub fn parse(input: &[u8]) -> Result<Self> {
        let tree = prepare(input)?;
        debug!(terms = tree.len(), root = tree.root().name(), "terminology loaded");
        Ok(TerminologyResource {
            tree: RwLock::new(tree),
        })
    }

    /// Run `f` against the tree.
    ///
    /// # Errors
    ///
    /// Returns `"lock_poisoned"` if a writer panicked while holding the lock.
    pub fn with_tree<F, R>(&self, f: F) -> std::result::Result<R, &'static str>
    where
        F: FnOnce(&Terminology) -> R,
    {
        let guard = self.tree.read().map_err(|_| "lock_poisoned")?;
        Ok(f(&guard))
    }
}

/// Definition document → ready-to-query terminology
pub(crate) fn prepare(input: &[u8]) -> Result<Terminology> {
    let mut tree = Terminology::from_definition(input)?;
    let root = tree.root_id();
    if let Some(node) = tree.get_mut(root) {
        node.set_root_term(true);
    }
    tree.generate_all_queries();
    Ok(tree)
}

#[rustler::resource_impl]
impl rustler::Resource for TerminologyResource {}

/// Type alias for terminology ResourceArc
pub type TerminologyRef = ResourceArc<TerminologyResource>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_marks_root_and_derives() {
        let tree = prepare(b"<mapper name=\"people\"><mapper name=\"person\"/></mapper>").unwrap();
        assert!(tree.is_root_term(tree.root_id()));
        let person = tree.retrieve(&["person"]).unwrap();
        assert!(!tree.is_root_term(person));
        assert_eq!(tree.get(person).unwrap().xpath(), Some("//oxns:people/oxns:person"));
    }

    #[test]
    fn test_with_tree() {
        let resource = TerminologyResource::parse(b"<mapper name=\"people\"/>").unwrap();
        let name = resource.with_tree(|tree| tree.root().name().to_string());
        assert_eq!(name, Ok("people".to_string()));
    }

    #[test]
    fn test_parse_error_propagates() {
        assert!(TerminologyResource::parse(b"<mapper/>").is_err());
    }
}
