//! Source-language support.
//!
//! Only Python is analyzed. The grammar-specific extraction lives in
//! [`python`]; [`tree_sitter_utils`] holds helpers that do not depend on the
//! grammar.

pub mod python;
pub mod tree_sitter_utils;
