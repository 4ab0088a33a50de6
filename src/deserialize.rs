//! Tree-from-record reconstruction
//!
//! Builds a `Terminology` straight from `mapper` definition records without
//! going through `TermBuilder`. Queries are not derived here; the owner runs
//! `generate_all_queries` once the whole tree is assembled.

use std::sync::Arc;

use crate::builder::{parse_required, split_hints};
use crate::error::{Result, TermError};
use crate::record::{DefinitionRecord, ATTRIBUTE_TAG, MAPPER_TAG};
use crate::tree::{TermId, TermNode, Terminology};

impl Terminology {
    /// Reconstruct a tree from a root `mapper` record
    pub fn from_record(record: impl Into<Arc<DefinitionRecord>>) -> Result<Terminology> {
        let record = record.into();
        let root = term_from_record(&record)?;
        let mut tree = Terminology::new(root);
        let root_id = tree.root_id();
        attach_children(&mut tree, root_id, &record)?;
        Ok(tree)
    }

    /// Read a definition document and reconstruct its tree
    pub fn from_definition(input: &[u8]) -> Result<Terminology> {
        Terminology::from_record(DefinitionRecord::parse(input)?)
    }
}

fn attach_children(tree: &mut Terminology, root: TermId, record: &Arc<DefinitionRecord>) -> Result<()> {
    let mut pending: Vec<(TermId, Arc<DefinitionRecord>)> = vec![(root, Arc::clone(record))];
    while let Some((parent, parent_record)) = pending.pop() {
        for child_record in parent_record.children_tagged(MAPPER_TAG) {
            let child = term_from_record(child_record)?;
            let id = tree.insert(child);
            let linked = tree.add_child(parent, id);
            debug_assert!(linked, "fresh term {} rejected under {}", id, parent);
            pending.push((id, Arc::clone(child_record)));
        }
    }
    Ok(())
}

/// One term from one record; nested mappers are handled by the caller
fn term_from_record(record: &Arc<DefinitionRecord>) -> Result<TermNode> {
    let name = record
        .attribute("name")
        .ok_or_else(|| TermError::missing_name(record.tag()))?;
    let mut node = TermNode::new(name);

    for constraint in record.children_tagged(ATTRIBUTE_TAG) {
        let attr_name = constraint
            .attribute("name")
            .ok_or_else(|| TermError::missing_name(constraint.tag()))?;
        let value = constraint
            .attribute("value")
            .ok_or_else(|| TermError::missing_value(attr_name))?;
        node.attributes.insert(attr_name.to_string(), value.to_string());
    }

    if let Some(hints) = record.attribute("index_as") {
        node.index_as = split_hints(hints);
    }
    if let Some(required) = record.attribute("required") {
        node.required = parse_required(required)?;
    }
    if let Some(data_type) = record.attribute("type") {
        node.data_type = data_type.to_string();
    }
    if let Some(variant) = record.attribute("variant_of") {
        node.variant_of = Some(variant.to_string());
    }
    if let Some(path) = record.attribute("path") {
        node.assign_path(path);
    }
    if let Some(path) = record.attribute("default_content_path") {
        node.default_content_path = Some(path.to_string());
    }
    if let Some(prefix) = record.attribute("namespace_prefix") {
        node.namespace_prefix = prefix.to_string();
    }

    node.internal_source = Some(Arc::clone(record));
    Ok(node)
}
