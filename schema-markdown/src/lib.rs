//! `schema-markdown`: parser and validator for Schema Markdown.
//!
//! Schema Markdown is a compact, line-oriented language for defining the
//! types of a JSON web API: structs and unions, enumerations, typedefs and
//! actions. This crate parses it into a [`Types`] map, checks the result for
//! consistency, validates (and coerces) JSON values against it, and converts
//! values to and from query strings.
//!
//! # Quick start
//!
//! ```
//! use serde_json::json;
//!
//! let types = schema_markdown::parse_schema_markdown(
//!     "# A widget\nstruct Widget\n    string(len > 0) name\n    optional int(>= 0) count\n",
//! )
//! .unwrap();
//!
//! let query = schema_markdown::decode_query_string("name=gear&count=3").unwrap();
//! let widget = schema_markdown::validate_type(&types, "Widget", &query).unwrap();
//! assert_eq!(widget, json!({"name": "gear", "count": 3}));
//! ```

pub mod attrs;
pub mod check;
pub mod encode;
pub mod error;
pub mod parse;
pub mod resolve;
pub mod type_model;
pub mod types;
pub mod validate;

pub use check::{TypeModelError, type_model_errors};
pub use encode::{decode_query_string, encode_query_string};
pub use error::*;
pub use parse::{SchemaMarkdownParser, parse_schema_markdown, parse_schema_markdown_sources};
pub use resolve::{effective_type, effective_user_type, enum_values, referenced_types, struct_members};
pub use type_model::{type_model, type_model_types, validate_type_model, validate_type_model_types};
pub use types::*;
pub use validate::validate_type;
