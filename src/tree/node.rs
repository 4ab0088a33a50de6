//! Term node representation
//!
//! Uses TermId (u32) indices into the owning `Terminology` arena for
//! parent and child links.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::SettingValue;
use crate::record::DefinitionRecord;

/// Compact term identifier (index into arena)
pub type TermId = u32;

/// Namespace alias applied to term paths unless overridden
pub const DEFAULT_NAMESPACE_PREFIX: &str = "oxns";

/// Value type tag applied when none is given
pub const DEFAULT_DATA_TYPE: &str = "string";

/// Cached query strings produced by a derivation pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivedQueries {
    /// Path from the document root to the term
    pub absolute: String,
    /// The term's own step, scoped to an already-located ancestor
    pub relative: String,
    /// Absolute query with attribute-equality predicates
    pub constrained: String,
}

/// One addressable field of the document schema
#[derive(Debug, Clone)]
pub struct TermNode {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) required: bool,
    pub(crate) data_type: String,
    pub(crate) index_as: Vec<String>,
    pub(crate) variant_of: Option<String>,
    pub(crate) default_content_path: Option<String>,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) namespace_prefix: String,
    pub(crate) is_root_term: bool,
    /// Settings with no matching field, kept for forward compatibility
    pub(crate) extensions: BTreeMap<String, SettingValue>,
    /// Current parent (None for the root or detached terms)
    pub(crate) parent: Option<TermId>,
    pub(crate) children: BTreeMap<String, TermId>,
    pub(crate) queries: Option<DerivedQueries>,
    pub(crate) internal_source: Option<Arc<DefinitionRecord>>,
}

impl TermNode {
    /// Create a detached term with default settings; the path defaults to the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        TermNode {
            path: name.clone(),
            name,
            required: false,
            data_type: DEFAULT_DATA_TYPE.to_string(),
            index_as: Vec::new(),
            variant_of: None,
            default_content_path: None,
            attributes: BTreeMap::new(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            is_root_term: false,
            extensions: BTreeMap::new(),
            parent: None,
            children: BTreeMap::new(),
            queries: None,
            internal_source: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn required(&self) -> bool {
        self.required
    }

    #[inline]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn index_as(&self) -> &[String] {
        &self.index_as
    }

    pub fn variant_of(&self) -> Option<&str> {
        self.variant_of.as_deref()
    }

    pub fn default_content_path(&self) -> Option<&str> {
        self.default_content_path.as_deref()
    }

    /// Attribute constraints used to tell structurally identical siblings apart
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Namespace alias for this term's path; empty means unqualified
    pub fn namespace_prefix(&self) -> &str {
        &self.namespace_prefix
    }

    #[inline]
    pub fn is_root_term(&self) -> bool {
        self.is_root_term
    }

    pub fn extensions(&self) -> &BTreeMap<String, SettingValue> {
        &self.extensions
    }

    /// Definition record this term was read from, if any
    pub fn internal_source(&self) -> Option<&DefinitionRecord> {
        self.internal_source.as_deref()
    }

    pub fn xpath(&self) -> Option<&str> {
        self.queries.as_ref().map(|q| q.absolute.as_str())
    }

    /// Same as `xpath`
    pub fn xpath_absolute(&self) -> Option<&str> {
        self.xpath()
    }

    pub fn xpath_relative(&self) -> Option<&str> {
        self.queries.as_ref().map(|q| q.relative.as_str())
    }

    pub fn xpath_constrained(&self) -> Option<&str> {
        self.queries.as_ref().map(|q| q.constrained.as_str())
    }

    pub fn queries(&self) -> Option<&DerivedQueries> {
        self.queries.as_ref()
    }

    // Setters for fields that do not feed into derived queries. Query-relevant
    // fields are changed through `Terminology` so caches get invalidated.

    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    pub fn set_data_type(&mut self, data_type: impl Into<String>) {
        self.data_type = data_type.into();
    }

    pub fn set_index_as(&mut self, hints: Vec<String>) {
        self.index_as = hints;
    }

    pub fn set_default_content_path(&mut self, path: Option<String>) {
        self.default_content_path = path;
    }

    pub fn set_root_term(&mut self, is_root: bool) {
        self.is_root_term = is_root;
    }

    /// Assign a path, falling back to the name when empty
    pub(crate) fn assign_path(&mut self, path: &str) {
        if path.is_empty() {
            self.path = self.name.clone();
        } else {
            self.path = path.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_term_defaults() {
        let term = TermNode::new("title");
        assert_eq!(term.name(), "title");
        assert_eq!(term.path(), "title");
        assert!(!term.required());
        assert_eq!(term.data_type(), "string");
        assert_eq!(term.namespace_prefix(), "oxns");
        assert!(term.attributes().is_empty());
        assert!(term.xpath().is_none());
        assert!(term.parent.is_none());
    }

    #[test]
    fn test_xpath_absolute_matches_xpath() {
        let mut term = TermNode::new("title");
        assert!(term.xpath_absolute().is_none());
        term.queries = Some(DerivedQueries {
            absolute: "//oxns:title".to_string(),
            relative: "oxns:title".to_string(),
            constrained: "//oxns:title".to_string(),
        });
        assert_eq!(term.xpath_absolute(), Some("//oxns:title"));
        assert_eq!(term.xpath_absolute(), term.xpath());
    }

    #[test]
    fn test_empty_path_falls_back_to_name() {
        let mut term = TermNode::new("person");
        term.assign_path("@title");
        assert_eq!(term.path(), "@title");
        term.assign_path("");
        assert_eq!(term.path(), "person");
    }
}
