//! XPath Query Generation
//!
//! Builds the three cached queries for a term from its position in the tree:
//! - absolute: `//` plus every qualified step from the root to the term
//! - relative: the term's own step with attribute predicates
//! - constrained: the absolute query with attribute predicates
//!
//! Generation reads only `path`, `namespace_prefix`, `attributes` and
//! `variant_of` of the term and its ancestors, so it is pure and repeatable.

use crate::tree::{TermNode, TermRef};

/// Collaborator that turns a linked term into query strings
pub trait QueryGenerator {
    /// Query from the document root to the term
    fn compute_absolute(&self, term: TermRef<'_>) -> String;

    /// Absolute query with the term's attribute constraints applied
    fn compute_constrained(&self, term: TermRef<'_>) -> String;

    /// Query scoped to an already-located ancestor
    fn compute_relative(&self, term: TermRef<'_>) -> String;
}

/// Default XPath 1.0 generator
#[derive(Debug, Clone, Copy, Default)]
pub struct XPathGenerator;

impl QueryGenerator for XPathGenerator {
    fn compute_absolute(&self, term: TermRef<'_>) -> String {
        let prefix = ancestor_prefix(term);
        let primary = format!("{}{}", prefix, qualified_step(term.node(), term.path()));
        match term.node().variant_of() {
            Some(variant) if !variant.is_empty() => {
                let alternate = format!("{}{}", prefix, qualified_step(term.node(), variant));
                format!("{} | {}", primary, alternate)
            }
            _ => primary,
        }
    }

    fn compute_constrained(&self, term: TermRef<'_>) -> String {
        let absolute = self.compute_absolute(term);
        match attribute_predicates(term.node()) {
            Some(predicates) => add_predicate(&absolute, &predicates),
            None => absolute,
        }
    }

    fn compute_relative(&self, term: TermRef<'_>) -> String {
        let mut query = qualified_step(term.node(), term.path());
        if let Some(predicates) = attribute_predicates(term.node()) {
            query.push('[');
            query.push_str(&predicates);
            query.push(']');
        }
        query
    }
}

impl XPathGenerator {
    /// Absolute query restricted to terms whose content contains `value`
    ///
    /// Content is read from `default_content_path` when set, the term's own
    /// text otherwise.
    pub fn value_query(&self, term: TermRef<'_>, value: &str) -> String {
        let node = term.node();
        let target = match node.default_content_path() {
            Some(path) if !path.is_empty() => qualified_step(node, path),
            _ => ".".to_string(),
        };
        let predicate = format!("contains({}, {})", target, xpath_literal(value));
        add_predicate(&self.compute_absolute(term), &predicate)
    }
}

/// `//` followed by each ancestor's qualified step and a trailing `/`
fn ancestor_prefix(term: TermRef<'_>) -> String {
    let mut prefix = String::from("//");
    for ancestor in term.ancestors() {
        prefix.push_str(&qualified_step(ancestor.node(), ancestor.path()));
        prefix.push('/');
    }
    prefix
}

/// Qualify a path step with the term's namespace prefix
///
/// Attribute steps, node tests such as `text()`, self/parent steps and steps
/// that already carry a prefix are left as they are.
pub fn qualified_step(node: &TermNode, step: &str) -> String {
    let prefix = node.namespace_prefix();
    let unqualified = prefix.is_empty()
        || step.starts_with('@')
        || step.ends_with(')')
        || step == "."
        || step == ".."
        || step.contains(':')
        || step.contains('/');
    if unqualified {
        step.to_string()
    } else {
        format!("{}:{}", prefix, step)
    }
}

/// `@name="value"` clauses joined with `and`, or None without attributes
fn attribute_predicates(node: &TermNode) -> Option<String> {
    if node.attributes().is_empty() {
        return None;
    }
    let clauses: Vec<String> = node
        .attributes()
        .iter()
        .map(|(name, value)| format!("@{}={}", name, xpath_literal(value)))
        .collect();
    Some(clauses.join(" and "))
}

/// Append a predicate, parenthesizing unions first
fn add_predicate(query: &str, predicate: &str) -> String {
    if query.contains(" | ") {
        format!("({})[{}]", query, predicate)
    } else {
        format!("{}[{}]", query, predicate)
    }
}

/// Quote a string as an XPath 1.0 literal
///
/// XPath has no escapes inside literals, so values holding both quote
/// characters are assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{}\"", part))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}
