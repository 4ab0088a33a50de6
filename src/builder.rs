//! Term Builder
//!
//! Collects named settings and child builders, then materializes a
//! `Terminology`. Settings are captured by name so definitions read like
//! declarations:
//!
//! ```ignore
//! let tree = TermBuilder::new("people")
//!     .with_child(TermBuilder::new("person").with_child(
//!         TermBuilder::new("title").path("@title").required(true),
//!     ))
//!     .build()?;
//! ```
//!
//! Known setting names are applied through `SettingKey`; anything else is
//! kept in the term's extension map (lenient) or rejected (strict).

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{Result, TermError};
use crate::tree::{TermId, TermNode, Terminology, DEFAULT_DATA_TYPE};

/// Captured setting value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
    /// Several values supplied to one setting, in order
    List(Vec<SettingValue>),
    Map(BTreeMap<String, String>),
}

impl SettingValue {
    fn describe(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Text(_) => "text",
            SettingValue::List(_) => "list",
            SettingValue::Map(_) => "map",
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl<T: Into<SettingValue>> From<Vec<T>> for SettingValue {
    fn from(values: Vec<T>) -> Self {
        SettingValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, String>> for SettingValue {
    fn from(map: BTreeMap<String, String>) -> Self {
        SettingValue::Map(map)
    }
}

/// Setting names that map onto term fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Path,
    Required,
    DataType,
    IndexAs,
    VariantOf,
    DefaultContentPath,
    NamespacePrefix,
    Attributes,
    RootTerm,
}

type Setter = fn(&mut TermNode, &SettingValue) -> Result<()>;

/// Accepted setting names; aliases share a key
const SETTING_NAMES: &[(&str, SettingKey)] = &[
    ("path", SettingKey::Path),
    ("required", SettingKey::Required),
    ("data_type", SettingKey::DataType),
    ("type", SettingKey::DataType),
    ("index_as", SettingKey::IndexAs),
    ("variant_of", SettingKey::VariantOf),
    ("default_content_path", SettingKey::DefaultContentPath),
    ("namespace_prefix", SettingKey::NamespacePrefix),
    ("attributes", SettingKey::Attributes),
    ("is_root_term", SettingKey::RootTerm),
    ("root_term", SettingKey::RootTerm),
];

impl SettingKey {
    /// Look up a setting name, aliases included
    pub fn from_name(name: &str) -> Option<Self> {
        SETTING_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, key)| *key)
    }

    /// Canonical setting name
    pub fn name(self) -> &'static str {
        match self {
            SettingKey::Path => "path",
            SettingKey::Required => "required",
            SettingKey::DataType => "data_type",
            SettingKey::IndexAs => "index_as",
            SettingKey::VariantOf => "variant_of",
            SettingKey::DefaultContentPath => "default_content_path",
            SettingKey::NamespacePrefix => "namespace_prefix",
            SettingKey::Attributes => "attributes",
            SettingKey::RootTerm => "is_root_term",
        }
    }

    fn setter(self) -> Setter {
        match self {
            SettingKey::Path => set_path,
            SettingKey::Required => set_required,
            SettingKey::DataType => set_data_type,
            SettingKey::IndexAs => set_index_as,
            SettingKey::VariantOf => set_variant_of,
            SettingKey::DefaultContentPath => set_default_content_path,
            SettingKey::NamespacePrefix => set_namespace_prefix,
            SettingKey::Attributes => set_attributes,
            SettingKey::RootTerm => set_root_term,
        }
    }

    /// Assign `value` to the matching field of `node`
    pub fn apply(self, node: &mut TermNode, value: &SettingValue) -> Result<()> {
        (self.setter())(node, value)
    }
}

fn invalid(key: SettingKey, expected: &str, got: &SettingValue) -> TermError {
    TermError::InvalidSetting {
        key: key.name().to_string(),
        reason: format!("expected {}, got {}", expected, got.describe()),
    }
}

fn expect_text(key: SettingKey, value: &SettingValue) -> Result<String> {
    match value {
        SettingValue::Text(text) => Ok(text.clone()),
        other => Err(invalid(key, "text", other)),
    }
}

fn set_path(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    let path = expect_text(SettingKey::Path, value)?;
    node.assign_path(&path);
    Ok(())
}

fn set_required(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.required = match value {
        SettingValue::Bool(b) => *b,
        SettingValue::Text(text) => parse_required(text)?,
        other => return Err(invalid(SettingKey::Required, "boolean", other)),
    };
    Ok(())
}

fn set_data_type(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.data_type = expect_text(SettingKey::DataType, value)?;
    Ok(())
}

fn set_index_as(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.index_as = match value {
        SettingValue::Text(text) => split_hints(text),
        SettingValue::List(items) => items
            .iter()
            .map(|item| expect_text(SettingKey::IndexAs, item))
            .collect::<Result<Vec<_>>>()?,
        other => return Err(invalid(SettingKey::IndexAs, "text or list", other)),
    };
    Ok(())
}

fn set_variant_of(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.variant_of = Some(expect_text(SettingKey::VariantOf, value)?);
    Ok(())
}

fn set_default_content_path(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.default_content_path = Some(expect_text(SettingKey::DefaultContentPath, value)?);
    Ok(())
}

fn set_namespace_prefix(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.namespace_prefix = expect_text(SettingKey::NamespacePrefix, value)?;
    Ok(())
}

fn set_attributes(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    match value {
        SettingValue::Map(map) => {
            node.attributes = map.clone();
            Ok(())
        }
        other => Err(invalid(SettingKey::Attributes, "map", other)),
    }
}

fn set_root_term(node: &mut TermNode, value: &SettingValue) -> Result<()> {
    node.is_root_term = match value {
        SettingValue::Bool(b) => *b,
        SettingValue::Text(text) => parse_required(text)?,
        other => return Err(invalid(SettingKey::RootTerm, "boolean", other)),
    };
    Ok(())
}

/// Coerce textual booleans: `true`/`false`, case-insensitive, whitespace ignored
pub(crate) fn parse_required(text: &str) -> Result<bool> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(TermError::InvalidSetting {
            key: SettingKey::Required.name().to_string(),
            reason: format!("`{}` is not `true` or `false`", text),
        })
    }
}

/// Split an index hint list on commas and whitespace
pub(crate) fn split_hints(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|hint| !hint.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mutable accumulator for one term and its children
#[derive(Debug, Clone)]
pub struct TermBuilder {
    name: String,
    settings: BTreeMap<String, SettingValue>,
    children: BTreeMap<String, TermBuilder>,
}

impl TermBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut settings = BTreeMap::new();
        settings.insert("required".to_string(), SettingValue::Bool(false));
        settings.insert("data_type".to_string(), SettingValue::from(DEFAULT_DATA_TYPE));
        TermBuilder {
            name: name.into(),
            settings,
            children: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BTreeMap<String, SettingValue> {
        &self.settings
    }

    pub fn children(&self) -> &BTreeMap<String, TermBuilder> {
        &self.children
    }

    /// Capture a setting by name; a later value for the same name replaces it
    pub fn set(mut self, name: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }

    /// Capture several values; a single value is stored unwrapped
    pub fn set_many<I, V>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SettingValue>,
    {
        let mut values: Vec<SettingValue> = values.into_iter().map(Into::into).collect();
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            SettingValue::List(values)
        };
        self.set(name, value)
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        self.set("path", path.into())
    }

    pub fn required(self, required: bool) -> Self {
        self.set("required", required)
    }

    pub fn data_type(self, data_type: impl Into<String>) -> Self {
        self.set("data_type", data_type.into())
    }

    pub fn index_as<I, V>(self, hints: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let hints: Vec<SettingValue> = hints.into_iter().map(|h| SettingValue::Text(h.into())).collect();
        self.set("index_as", SettingValue::List(hints))
    }

    pub fn variant_of(self, variant: impl Into<String>) -> Self {
        self.set("variant_of", variant.into())
    }

    pub fn default_content_path(self, path: impl Into<String>) -> Self {
        self.set("default_content_path", path.into())
    }

    pub fn namespace_prefix(self, prefix: impl Into<String>) -> Self {
        self.set("namespace_prefix", prefix.into())
    }

    pub fn root_term(self, is_root: bool) -> Self {
        self.set("is_root_term", is_root)
    }

    /// Add one attribute constraint, keeping those already captured
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let entry = self
            .settings
            .entry("attributes".to_string())
            .or_insert_with(|| SettingValue::Map(BTreeMap::new()));
        match entry {
            SettingValue::Map(map) => {
                map.insert(name.into(), value.into());
            }
            other => {
                let mut map = BTreeMap::new();
                map.insert(name.into(), value.into());
                *other = SettingValue::Map(map);
            }
        }
        self
    }

    /// Register a child builder under its name, replacing any previous one
    pub fn add_child(&mut self, child: TermBuilder) {
        self.children.insert(child.name.clone(), child);
    }

    pub fn with_child(mut self, child: TermBuilder) -> Self {
        self.add_child(child);
        self
    }

    /// Build the tree and derive queries; unknown settings become extensions
    pub fn build(self) -> Result<Terminology> {
        self.build_with(false)
    }

    /// Build the tree and derive queries; unknown settings are an error
    pub fn build_strict(self) -> Result<Terminology> {
        self.build_with(true)
    }

    fn build_with(self, strict: bool) -> Result<Terminology> {
        let TermBuilder { name, settings, children } = self;
        let root = make_node(name, settings, strict)?;
        let mut tree = Terminology::new(root);
        let root_id = tree.root_id();
        for child in children.into_values() {
            child.build_into(&mut tree, root_id, strict)?;
        }
        tree.generate_queries(root_id);
        Ok(tree)
    }

    fn build_into(self, tree: &mut Terminology, parent: TermId, strict: bool) -> Result<()> {
        let TermBuilder { name, settings, children } = self;
        let node = make_node(name, settings, strict)?;
        let id = tree.insert(node);
        let linked = tree.add_child(parent, id);
        debug_assert!(linked, "fresh term {} rejected under {}", id, parent);
        for child in children.into_values() {
            child.build_into(tree, id, strict)?;
        }
        Ok(())
    }
}

fn make_node(name: String, settings: BTreeMap<String, SettingValue>, strict: bool) -> Result<TermNode> {
    let mut node = TermNode::new(name);
    for (key, value) in settings {
        match SettingKey::from_name(&key) {
            Some(setting) => setting.apply(&mut node, &value)?,
            None if strict => return Err(TermError::UnknownSetting { key }),
            None => {
                warn!(term = %node.name, setting = %key, "unrecognized setting kept as extension");
                node.extensions.insert(key, value);
            }
        }
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_defaults() {
        let tree = TermBuilder::new("title").build().unwrap();
        let root = tree.root().node();
        assert_eq!(root.name(), "title");
        assert_eq!(root.path(), "title");
        assert!(!root.required());
        assert_eq!(root.data_type(), "string");
        assert_eq!(root.xpath(), Some("//oxns:title"));
    }

    #[test]
    fn test_path_setting() {
        let tree = TermBuilder::new("title").path("@title").build().unwrap();
        assert_eq!(tree.root().path(), "@title");

        let tree = TermBuilder::new("title").set("path", "").build().unwrap();
        assert_eq!(tree.root().path(), "title");
    }

    #[test]
    fn test_dynamic_settings() {
        let tree = TermBuilder::new("name")
            .set("required", true)
            .set("type", "date")
            .set_many("index_as", ["facetable", "displayable"])
            .set("namespace_prefix", "mods")
            .build()
            .unwrap();
        let node = tree.root().node();
        assert!(node.required());
        assert_eq!(node.data_type(), "date");
        assert_eq!(node.index_as(), ["facetable".to_string(), "displayable".to_string()]);
        assert_eq!(node.xpath(), Some("//mods:name"));
    }

    #[test]
    fn test_set_many_single_value_unwrapped() {
        let builder = TermBuilder::new("t").set_many("index_as", ["searchable"]);
        assert_eq!(
            builder.settings().get("index_as"),
            Some(&SettingValue::Text("searchable".to_string()))
        );
        let tree = builder.build().unwrap();
        assert_eq!(tree.root().node().index_as(), ["searchable".to_string()]);
    }

    #[test]
    fn test_unknown_setting_lenient_and_strict() {
        let tree = TermBuilder::new("t").set("colour", "blue").build().unwrap();
        assert_eq!(
            tree.root().node().extensions().get("colour"),
            Some(&SettingValue::Text("blue".to_string()))
        );

        let err = TermBuilder::new("t").set("colour", "blue").build_strict().unwrap_err();
        assert_eq!(err, TermError::UnknownSetting { key: "colour".to_string() });
    }

    #[test]
    fn test_invalid_setting_value() {
        let err = TermBuilder::new("t").set("required", vec!["a", "b"]).build().unwrap_err();
        assert!(matches!(err, TermError::InvalidSetting { ref key, .. } if key == "required"));

        let err = TermBuilder::new("t").set("required", "maybe").build().unwrap_err();
        assert!(matches!(err, TermError::InvalidSetting { .. }));
    }

    #[test]
    fn test_children_linked() {
        let tree = TermBuilder::new("people")
            .with_child(TermBuilder::new("person").with_child(TermBuilder::new("title").path("@title")))
            .build()
            .unwrap();
        let person = tree.retrieve(&["person"]).unwrap();
        let title = tree.retrieve(&["person", "title"]).unwrap();
        assert_eq!(tree.retrieve_child(tree.root_id(), "person"), Some(person));
        assert_eq!(tree.parent(title), Some(person));
        assert_eq!(tree.ancestors(title).last(), Some(&person));
        assert_eq!(
            tree.get(title).unwrap().xpath(),
            Some("//oxns:people/oxns:person/@title")
        );
    }

    #[test]
    fn test_add_child_overwrites_same_name() {
        let mut root = TermBuilder::new("people");
        root.add_child(TermBuilder::new("person").path("first"));
        root.add_child(TermBuilder::new("person").path("second"));
        let tree = root.build().unwrap();
        let person = tree.retrieve(&["person"]).unwrap();
        assert_eq!(tree.get(person).unwrap().path(), "second");
        assert_eq!(tree.root().children().count(), 1);
    }

    #[test]
    fn test_attribute_constraints() {
        let tree = TermBuilder::new("name")
            .attribute("type", "personal")
            .attribute("authority", "local")
            .build()
            .unwrap();
        let node = tree.root().node();
        assert_eq!(node.attributes().get("type").map(String::as_str), Some("personal"));
        assert_eq!(
            node.xpath_constrained(),
            Some("//oxns:name[@authority=\"local\" and @type=\"personal\"]")
        );
    }

    #[test]
    fn test_setting_key_aliases() {
        assert_eq!(SettingKey::from_name("type"), Some(SettingKey::DataType));
        assert_eq!(SettingKey::from_name("root_term"), Some(SettingKey::RootTerm));
        assert_eq!(SettingKey::from_name("add_child"), None);
        assert_eq!(SettingKey::DataType.name(), "data_type");
    }

    #[test]
    fn test_parse_required_and_hints() {
        assert_eq!(parse_required(" TRUE "), Ok(true));
        assert_eq!(parse_required("false"), Ok(false));
        assert!(parse_required("1").is_err());
        assert_eq!(split_hints("facetable, searchable  displayable"), vec!["facetable", "searchable", "displayable"]);
    }
}
