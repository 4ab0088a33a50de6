//! Property-based tests for the terminology tree.
