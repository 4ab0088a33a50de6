//! Elixir Term Conversion Utilities
//!
//! Converts terminology structures to Elixir terms.

use rustler::{Encoder, Env, NewBinary, NifResult, Term};

use crate::tree::TermRef;

mod atoms {
    rustler::atoms! {
        name,
        path,
        required,
        data_type,
        index_as,
        variant_of,
        default_content_path,
        namespace_prefix,
        attributes,
        is_root_term,
        xpath,
        xpath_relative,
        xpath_constrained,
        children,
    }
}

/// Convert a term definition to an Elixir map
///
/// Derived queries are `nil` until a derivation pass has run.
pub fn term_to_map<'a>(env: Env<'a>, term: TermRef<'_>) -> NifResult<Term<'a>> {
    let node = term.node();

    let attribute_pairs: Vec<(Term<'a>, Term<'a>)> = node
        .attributes()
        .iter()
        .map(|(k, v)| (str_to_binary(env, k), str_to_binary(env, v)))
        .collect();
    let attribute_map = Term::map_from_pairs(env, &attribute_pairs)?;

    let pairs: Vec<(Term<'a>, Term<'a>)> = vec![
        (atoms::name().encode(env), str_to_binary(env, node.name())),
        (atoms::path().encode(env), str_to_binary(env, node.path())),
        (atoms::required().encode(env), node.required().encode(env)),
        (atoms::data_type().encode(env), str_to_binary(env, node.data_type())),
        (atoms::index_as().encode(env), strings_to_list(env, node.index_as().iter().map(String::as_str))),
        (atoms::variant_of().encode(env), node.variant_of().encode(env)),
        (
            atoms::default_content_path().encode(env),
            node.default_content_path().encode(env),
        ),
        (atoms::namespace_prefix().encode(env), str_to_binary(env, node.namespace_prefix())),
        (atoms::attributes().encode(env), attribute_map),
        (atoms::is_root_term().encode(env), node.is_root_term().encode(env)),
        (atoms::xpath().encode(env), node.xpath().encode(env)),
        (atoms::xpath_relative().encode(env), node.xpath_relative().encode(env)),
        (atoms::xpath_constrained().encode(env), node.xpath_constrained().encode(env)),
        (atoms::children().encode(env), child_names_to_list(env, term)),
    ];

    Term::map_from_pairs(env, &pairs)
}

/// Child names of a term as a list of binaries
pub fn child_names_to_list<'a>(env: Env<'a>, term: TermRef<'_>) -> Term<'a> {
    let names: Vec<&str> = term.children().map(|c| c.name()).collect();
    strings_to_list(env, names.into_iter())
}

/// `{absolute, relative, constrained}`, or nil before derivation
pub fn queries_to_tuple<'a>(env: Env<'a>, term: TermRef<'_>) -> Term<'a> {
    match term.node().queries() {
        Some(q) => (
            str_to_binary(env, &q.absolute),
            str_to_binary(env, &q.relative),
            str_to_binary(env, &q.constrained),
        )
            .encode(env),
        None => rustler::types::atom::nil().encode(env),
    }
}

fn strings_to_list<'a, 's, I>(env: Env<'a>, items: I) -> Term<'a>
where
    I: DoubleEndedIterator<Item = &'s str>,
{
    let mut list = Term::list_new_empty(env);
    for item in items.rev() {
        list = list.list_prepend(str_to_binary(env, item));
    }
    list
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}
