//! The search box query language.
//!
//! ```text
//! #tag        records carrying a tag
//! _type       records of a type (image, video, document, ...)
//! word        name or description contains the word
//! a b         both (same as `a and b`)
//! a, b        either (same as `a or b`)
//! a xor b     both first, then either
//! not a       negate the next term; not(a b) negates the group
//! folder:tag  tags restricted to a collection (or tag) named folder
//! ```
//!
//! # Examples
//!
//! ```
//! use tagdex::query::parse_query;
//!
//! let expr = parse_query("#vacances not(travail)").unwrap();
//! assert_eq!(expr.to_string(), "(#vacances and not(travail))");
//! ```

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::evaluate;
pub use parser::{Expr, ParseError, parse_query};
