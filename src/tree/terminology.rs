//! Terminology - Arena-based term tree
//!
//! Terms are stored in a flat arena and addressed by TermId:
//! - children map names to ids, so re-inserting a name overwrites the slot
//! - each term keeps a single parent id; ancestor chains are walked on demand
//! - derived queries are cached per term and cleared for a whole subtree
//!   whenever a query-relevant field or the parent link changes

use tracing::{debug, trace, warn};

use super::node::{DerivedQueries, TermId, TermNode};
use crate::xpath::{QueryGenerator, XPathGenerator};

/// A rooted tree of terms
#[derive(Debug, Clone)]
pub struct Terminology {
    nodes: Vec<TermNode>,
    root: TermId,
}

impl Terminology {
    /// Create a terminology whose root is `root`
    pub fn new(root: TermNode) -> Self {
        let mut root = root;
        root.parent = None;
        root.children.clear();
        Terminology {
            nodes: vec![root],
            root: 0,
        }
    }

    /// Get root term ID
    #[inline]
    pub fn root_id(&self) -> TermId {
        self.root
    }

    /// Borrowed handle to the root term
    pub fn root(&self) -> TermRef<'_> {
        TermRef { tree: self, id: self.root }
    }

    /// Get a term by ID
    pub fn get(&self, id: TermId) -> Option<&TermNode> {
        self.nodes.get(id as usize)
    }

    /// Get a mutable term by ID
    ///
    /// Only fields that do not feed into derived queries can be changed
    /// through the returned reference.
    pub fn get_mut(&mut self, id: TermId) -> Option<&mut TermNode> {
        self.nodes.get_mut(id as usize)
    }

    /// Borrowed handle to a term
    pub fn term(&self, id: TermId) -> Option<TermRef<'_>> {
        self.get(id).map(|_| TermRef { tree: self, id })
    }

    /// Total number of terms in the arena, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Add a detached term to the arena
    pub fn insert(&mut self, node: TermNode) -> TermId {
        let mut node = node;
        node.parent = None;
        node.children.clear();
        node.queries = None;
        let id = self.nodes.len() as TermId;
        self.nodes.push(node);
        id
    }

    // =========================================================================
    // Linkage
    // =========================================================================

    /// Register `child` under `parent`, keyed by the child's name
    ///
    /// Returns false (and leaves the tree untouched) if either id is unknown
    /// or the edge would create a cycle.
    pub fn add_child(&mut self, parent: TermId, child: TermId) -> bool {
        self.link(parent, child)
    }

    /// Inverse view of `add_child`: place `child` under `parent`
    pub fn set_parent(&mut self, child: TermId, parent: TermId) -> bool {
        self.link(parent, child)
    }

    fn link(&mut self, parent: TermId, child: TermId) -> bool {
        if self.get(parent).is_none() || self.get(child).is_none() {
            warn!(parent, child, "link between unknown terms ignored");
            return false;
        }
        if parent == child || self.is_ancestor(child, parent) {
            warn!(parent, child, "link would create a cycle; ignored");
            return false;
        }

        // Detach from a previous parent
        if let Some(old_parent) = self.nodes[child as usize].parent {
            let name = self.nodes[child as usize].name.clone();
            let slot = &mut self.nodes[old_parent as usize].children;
            if slot.get(&name) == Some(&child) {
                slot.remove(&name);
            }
        }

        let name = self.nodes[child as usize].name.clone();
        if let Some(displaced) = self.nodes[parent as usize].children.insert(name, child) {
            if displaced != child {
                debug!(parent, displaced, "child slot overwritten");
                self.nodes[displaced as usize].parent = None;
                self.invalidate(displaced);
            }
        }
        self.nodes[child as usize].parent = Some(parent);
        self.invalidate(child);
        true
    }

    /// Is `candidate` an ancestor of `id`?
    fn is_ancestor(&self, candidate: TermId, id: TermId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == candidate {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// One-level lookup
    pub fn retrieve_child(&self, parent: TermId, name: &str) -> Option<TermId> {
        self.get(parent)?.children.get(name).copied()
    }

    /// Immediate parent, None for the root
    pub fn parent(&self, id: TermId) -> Option<TermId> {
        self.get(id)?.parent
    }

    pub fn is_root_term(&self, id: TermId) -> bool {
        self.get(id).map_or(false, |n| n.is_root_term)
    }

    /// Ancestor chain, outermost first; the immediate parent is last
    pub fn ancestors(&self, id: TermId) -> Vec<TermId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            chain.push(p);
            current = self.parent(p);
        }
        chain.reverse();
        chain
    }

    /// Child ids of a term, ordered by child name
    pub fn children(&self, id: TermId) -> impl Iterator<Item = TermId> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(|n| n.children.values().copied())
    }

    /// Iterate over a term and all its descendants, parents before children
    pub fn descendants(&self, id: TermId) -> Descendants<'_> {
        let stack = if self.get(id).is_some() { vec![id] } else { Vec::new() };
        Descendants { tree: self, stack }
    }

    // =========================================================================
    // Path resolution
    // =========================================================================

    /// Follow child names from the root
    ///
    /// Returns None if any name is missing. An empty pointer list resolves to
    /// nothing.
    pub fn retrieve<S: AsRef<str>>(&self, pointers: &[S]) -> Option<TermId> {
        let mut target: Option<TermId> = None;
        let mut current = self.root;
        for pointer in pointers {
            match self.retrieve_child(current, pointer.as_ref()) {
                Some(id) => {
                    current = id;
                    target = Some(id);
                }
                None => {
                    trace!(pointer = pointer.as_ref(), "pointer path miss");
                    return None;
                }
            }
        }
        target
    }

    /// Names leading from the root to `id`; the inverse of `retrieve`
    pub fn pointer_path(&self, id: TermId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .skip(1)
            .filter_map(|a| self.get(a).map(|n| n.name.as_str()))
            .collect();
        if id != self.root {
            if let Some(node) = self.get(id) {
                names.push(&node.name);
            }
        }
        names
    }

    // =========================================================================
    // Query-relevant setters
    // =========================================================================

    pub fn set_path(&mut self, id: TermId, path: &str) {
        if let Some(node) = self.get_mut(id) {
            node.assign_path(path);
            self.invalidate(id);
        }
    }

    pub fn set_namespace_prefix(&mut self, id: TermId, prefix: impl Into<String>) {
        if let Some(node) = self.get_mut(id) {
            node.namespace_prefix = prefix.into();
            self.invalidate(id);
        }
    }

    pub fn set_variant_of(&mut self, id: TermId, variant: Option<String>) {
        if let Some(node) = self.get_mut(id) {
            node.variant_of = variant;
            self.invalidate(id);
        }
    }

    pub fn set_attribute(&mut self, id: TermId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(node) = self.get_mut(id) {
            node.attributes.insert(name.into(), value.into());
            self.invalidate(id);
        }
    }

    pub fn remove_attribute(&mut self, id: TermId, name: &str) -> Option<String> {
        let removed = self.get_mut(id)?.attributes.remove(name);
        if removed.is_some() {
            self.invalidate(id);
        }
        removed
    }

    /// Clear cached queries for a term and all its descendants
    pub fn invalidate(&mut self, id: TermId) {
        let stale: Vec<TermId> = self.descendants(id).collect();
        debug!(term = id, count = stale.len(), "invalidating derived queries");
        for term in stale {
            self.nodes[term as usize].queries = None;
        }
    }

    // =========================================================================
    // Query derivation
    // =========================================================================

    /// Derive queries for a term and its subtree with the default XPath generator
    pub fn generate_queries(&mut self, id: TermId) {
        self.generate_queries_with(id, &XPathGenerator);
    }

    /// Derive queries for a term and its subtree, parents before children
    pub fn generate_queries_with<G: QueryGenerator + ?Sized>(&mut self, id: TermId, generator: &G) {
        let order: Vec<TermId> = self.descendants(id).collect();
        debug!(term = id, count = order.len(), "deriving queries");
        for term in order {
            let queries = {
                let term_ref = TermRef { tree: &*self, id: term };
                DerivedQueries {
                    absolute: generator.compute_absolute(term_ref),
                    relative: generator.compute_relative(term_ref),
                    constrained: generator.compute_constrained(term_ref),
                }
            };
            self.nodes[term as usize].queries = Some(queries);
        }
    }

    /// Derive queries for the whole tree
    pub fn generate_all_queries(&mut self) {
        self.generate_queries(self.root);
    }
}

/// Depth-first iterator over a subtree
pub struct Descendants<'a> {
    tree: &'a Terminology,
    stack: Vec<TermId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = TermId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(node) = self.tree.get(current) {
            // Reverse so the first child is visited first
            self.stack.extend(node.children.values().rev().copied());
        }
        Some(current)
    }
}

/// Borrowed view of one term together with the terminology that owns it
#[derive(Clone, Copy)]
pub struct TermRef<'a> {
    tree: &'a Terminology,
    id: TermId,
}

impl<'a> TermRef<'a> {
    #[inline]
    pub fn id(&self) -> TermId {
        self.id
    }

    /// Owning terminology
    #[inline]
    pub fn terminology(&self) -> &'a Terminology {
        self.tree
    }

    /// Underlying node; the handle is only built for ids present in the arena
    #[inline]
    pub fn node(&self) -> &'a TermNode {
        &self.tree.nodes[self.id as usize]
    }

    pub fn name(&self) -> &'a str {
        self.node().name()
    }

    pub fn path(&self) -> &'a str {
        self.node().path()
    }

    pub fn parent(&self) -> Option<TermRef<'a>> {
        self.tree.parent(self.id).and_then(|p| self.tree.term(p))
    }

    /// Ancestors, outermost first
    pub fn ancestors(&self) -> impl Iterator<Item = TermRef<'a>> + 'a {
        let tree = self.tree;
        tree.ancestors(self.id)
            .into_iter()
            .map(move |id| TermRef { tree, id })
    }

    pub fn children(&self) -> impl Iterator<Item = TermRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id).map(move |id| TermRef { tree, id })
    }

    pub fn retrieve_child(&self, name: &str) -> Option<TermRef<'a>> {
        self.tree
            .retrieve_child(self.id, name)
            .map(|id| TermRef { tree: self.tree, id })
    }

    pub fn is_root_term(&self) -> bool {
        self.node().is_root_term()
    }
}

impl std::fmt::Debug for TermRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// people -> person -> title
    fn sample() -> (Terminology, TermId, TermId) {
        let mut tree = Terminology::new(TermNode::new("people"));
        let person = tree.insert(TermNode::new("person"));
        let title = tree.insert(TermNode::new("title"));
        assert!(tree.add_child(tree.root_id(), person));
        assert!(tree.set_parent(title, person));
        (tree, person, title)
    }

    #[test]
    fn test_linkage_both_directions() {
        let (tree, person, title) = sample();
        assert_eq!(tree.parent(person), Some(tree.root_id()));
        assert_eq!(tree.parent(title), Some(person));
        assert_eq!(tree.retrieve_child(person, "title"), Some(title));
        assert_eq!(tree.retrieve_child(person, "missing"), None);
        assert_eq!(tree.parent(tree.root_id()), None);
    }

    #[test]
    fn test_repeated_link_does_not_duplicate_ancestors() {
        let (mut tree, person, title) = sample();
        assert!(tree.add_child(person, title));
        assert!(tree.set_parent(title, person));
        assert_eq!(tree.ancestors(title), vec![tree.root_id(), person]);
    }

    #[test]
    fn test_reparent_moves_child() {
        let (mut tree, person, title) = sample();
        let root = tree.root_id();
        assert!(tree.add_child(root, title));
        assert_eq!(tree.parent(title), Some(root));
        assert_eq!(tree.retrieve_child(person, "title"), None);
        assert_eq!(tree.retrieve_child(root, "title"), Some(title));
    }

    #[test]
    fn test_overwrite_detaches_previous_child() {
        let (mut tree, person, title) = sample();
        let replacement = tree.insert(TermNode::new("title"));
        assert!(tree.add_child(person, replacement));
        assert_eq!(tree.retrieve_child(person, "title"), Some(replacement));
        assert_eq!(tree.parent(title), None);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut tree, person, title) = sample();
        assert!(!tree.add_child(title, person));
        assert!(!tree.add_child(person, person));
        assert_eq!(tree.parent(person), Some(tree.root_id()));
    }

    #[test]
    fn test_retrieve() {
        let (tree, person, title) = sample();
        assert_eq!(tree.retrieve(&["person"]), Some(person));
        assert_eq!(tree.retrieve(&["person", "title"]), Some(title));
        assert_eq!(tree.retrieve(&["person", "zzz"]), None);
        assert_eq!(tree.retrieve(&["zzz"]), None);
        assert_eq!(tree.retrieve::<&str>(&[]), None);
    }

    #[test]
    fn test_pointer_path_inverts_retrieve() {
        let (tree, _, title) = sample();
        let path = tree.pointer_path(title);
        assert_eq!(path, vec!["person", "title"]);
        assert_eq!(tree.retrieve(&path[..]), Some(title));
        assert!(tree.pointer_path(tree.root_id()).is_empty());
    }

    #[test]
    fn test_descendants_parent_first() {
        let (tree, person, title) = sample();
        let order: Vec<_> = tree.descendants(tree.root_id()).collect();
        assert_eq!(order, vec![tree.root_id(), person, title]);
    }

    #[test]
    fn test_generate_and_invalidate() {
        let (mut tree, person, title) = sample();
        tree.generate_all_queries();
        assert_eq!(tree.get(title).unwrap().xpath(), Some("//oxns:people/oxns:person/oxns:title"));

        tree.set_path(person, "individual");
        assert!(tree.get(person).unwrap().xpath().is_none());
        assert!(tree.get(title).unwrap().xpath().is_none());
        assert!(tree.get(tree.root_id()).unwrap().xpath().is_some());

        tree.generate_all_queries();
        assert_eq!(
            tree.get(title).unwrap().xpath(),
            Some("//oxns:people/oxns:individual/oxns:title")
        );
    }

    #[test]
    fn test_attribute_change_invalidates_subtree() {
        let (mut tree, person, title) = sample();
        tree.generate_all_queries();
        tree.set_attribute(person, "type", "actor");
        assert!(tree.get(title).unwrap().queries().is_none());
        assert_eq!(tree.remove_attribute(person, "type"), Some("actor".to_string()));
        assert_eq!(tree.remove_attribute(person, "type"), None);
    }

    #[test]
    fn test_term_ref_navigation() {
        let (tree, person, _) = sample();
        let title = tree.root().retrieve_child("person").unwrap().retrieve_child("title").unwrap();
        assert_eq!(title.name(), "title");
        assert_eq!(title.parent().map(|p| p.id()), Some(person));
        let names: Vec<_> = title.ancestors().map(|a| a.name()).collect();
        assert_eq!(names, vec!["people", "person"]);
        assert!(std::ptr::eq(title.terminology(), &tree));
    }
}
