//! Definition Records
//!
//! Attribute-bearing, nestable records that describe a terminology:
//!
//! ```xml
//! <mapper name="people" path="people">
//!   <mapper name="person">
//!     <attribute name="title" value="@title"/>
//!   </mapper>
//! </mapper>
//! ```

pub mod reader;

use std::sync::Arc;

use crate::error::Result;

/// Tag of records that describe a term
pub const MAPPER_TAG: &str = "mapper";

/// Tag of records that describe an attribute constraint
pub const ATTRIBUTE_TAG: &str = "attribute";

/// One element of a definition document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRecord {
    tag: String,
    /// Attributes in document order
    attributes: Vec<(String, String)>,
    children: Vec<Arc<DefinitionRecord>>,
}

impl DefinitionRecord {
    pub fn new(tag: impl Into<String>) -> Self {
        DefinitionRecord {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A `mapper` record carrying a `name`
    pub fn mapper(name: impl Into<String>) -> Self {
        DefinitionRecord::new(MAPPER_TAG).with_attribute("name", name)
    }

    /// An `attribute` constraint record
    pub fn constraint(name: impl Into<String>, value: impl Into<String>) -> Self {
        DefinitionRecord::new(ATTRIBUTE_TAG)
            .with_attribute("name", name)
            .with_attribute("value", value)
    }

    /// Read the root record of a definition document
    pub fn parse(input: &[u8]) -> Result<Self> {
        reader::read_record(input)
    }

    /// Set an attribute, replacing an existing value of the same name
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: DefinitionRecord) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub(crate) fn push_child(&mut self, child: Arc<DefinitionRecord>) {
        self.children.push(child);
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Arc<DefinitionRecord>] {
        &self.children
    }

    /// Direct children with the given tag, in document order
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Arc<DefinitionRecord>> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}

impl Drop for DefinitionRecord {
    // Unlink nested records one at a time so deep documents drop without recursion
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Some(mut record) = Arc::into_inner(child) {
                pending.append(&mut record.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let record = DefinitionRecord::mapper("person")
            .with_attribute("path", "individual")
            .with_child(DefinitionRecord::constraint("title", "@title"))
            .with_child(DefinitionRecord::mapper("name"));
        assert_eq!(record.tag(), "mapper");
        assert_eq!(record.attribute("name"), Some("person"));
        assert_eq!(record.attribute("path"), Some("individual"));
        assert_eq!(record.attribute("type"), None);
        assert_eq!(record.children().len(), 2);
        assert_eq!(record.children_tagged(MAPPER_TAG).count(), 1);
        assert_eq!(record.children_tagged(ATTRIBUTE_TAG).count(), 1);
    }

    #[test]
    fn test_deep_chain_drops() {
        let mut record = DefinitionRecord::mapper("leaf");
        for _ in 0..100_000 {
            record = DefinitionRecord::mapper("a").with_child(record);
        }
        drop(record);
    }

    #[test]
    fn test_shared_child_survives_parent_drop() {
        let child = Arc::new(DefinitionRecord::mapper("child"));
        let mut parent = DefinitionRecord::mapper("parent");
        parent.push_child(Arc::clone(&child));
        drop(parent);
        assert_eq!(child.attribute("name"), Some("child"));
    }

    #[test]
    fn test_set_attribute_replaces() {
        let record = DefinitionRecord::mapper("a").with_attribute("name", "b");
        assert_eq!(record.attributes().len(), 1);
        assert_eq!(record.attribute("name"), Some("b"));
    }
}
