//! XPath query derivation for terms

pub mod generator;

pub use generator::{qualified_step, xpath_literal, QueryGenerator, XPathGenerator};
