//! The type model's own schema.
//!
//! Compiled type models are plain JSON, so loading one back is a validation
//! problem like any other: the document is validated against the built-in
//! `TypeModel` schema (written in Schema Markdown), checked for consistency,
//! then deserialized into [`TypeModel`].

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::check::type_model_errors;
use crate::error::ValidationError;
use crate::parse::parse_schema_markdown;
use crate::types::{TypeModel, Types};
use crate::validate::validate_type;

/// The Schema Markdown source of the type model schema.
pub const TYPE_MODEL_SOURCE: &str = include_str!("type_model.smd");

static TYPE_MODEL_TYPES: Lazy<Types> =
    Lazy::new(|| parse_schema_markdown(TYPE_MODEL_SOURCE).expect("built-in type model schema must parse"));

/// The user types of the type model schema, parsed once per process.
pub fn type_model_types() -> &'static Types {
    &TYPE_MODEL_TYPES
}

/// The type model schema as a titled type model.
pub fn type_model() -> TypeModel {
    TypeModel {
        title: "Type Model".to_string(),
        types: type_model_types().clone(),
    }
}

/// Validate a JSON type model document and return it as a [`TypeModel`].
///
/// Structural problems fail with the first validation error; consistency
/// problems (unknown types, invalid attributes, bad bases) fail with every
/// message joined by newlines.
///
/// ```
/// use serde_json::json;
///
/// let model = schema_markdown::validate_type_model(&json!({
///     "title": "Widgets",
///     "types": {"Count": {"typedef": {"name": "Count", "type": {"builtin": "int"}}}}
/// }))
/// .unwrap();
/// assert_eq!(model.title, "Widgets");
/// ```
pub fn validate_type_model(value: &Value) -> Result<TypeModel, ValidationError> {
    let model: TypeModel = validated(value, "TypeModel")?;
    check_consistency(&model.types)?;
    Ok(model)
}

/// Validate a bare JSON types map (the `types` of a type model).
pub fn validate_type_model_types(value: &Value) -> Result<Types, ValidationError> {
    let types: Types = validated(value, "Types")?;
    check_consistency(&types)?;
    Ok(types)
}

fn validated<T: DeserializeOwned>(value: &Value, type_name: &str) -> Result<T, ValidationError> {
    let value = validate_type(type_model_types(), type_name, value)?;
    serde_json::from_value(value).map_err(|err| ValidationError::new(err.to_string()))
}

fn check_consistency(types: &Types) -> Result<(), ValidationError> {
    let mut errors = type_model_errors(types);
    if errors.is_empty() {
        return Ok(());
    }
    errors.sort();
    debug!(count = errors.len(), "type model consistency check failed");
    let message = errors
        .into_iter()
        .map(|err| err.message)
        .collect::<Vec<_>>()
        .join("\n");
    Err(ValidationError::new(message))
}
