//! Value validation against a type model.
//!
//! Validation walks the value depth-first and stops at the first violation.
//! Values are coerced toward their declared types (the query-string codec
//! produces only strings), so a validated value is returned as a new,
//! canonical `serde_json::Value`.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use serde_json::{Map, Number, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ValidationError, truncate};
use crate::resolve::{effective_type, enum_values, struct_members};
use crate::types::{Attr, Bound, BuiltinType, Type, Types, UserType, is_nullable};

const MAX_VALUE_TEXT: usize = 1000;
const MAX_MEMBER_TEXT: usize = 100;

/// Validate `value` against the user type `type_name`, returning the
/// validated, canonical value.
///
/// ```
/// use serde_json::json;
///
/// let types = schema_markdown::parse_schema_markdown("struct Point\n    int x\n    optional int y\n").unwrap();
/// let point = schema_markdown::validate_type(&types, "Point", &json!({"x": "5"})).unwrap();
/// assert_eq!(point, json!({"x": 5}));
/// ```
pub fn validate_type(types: &Types, type_name: &str, value: &Value) -> Result<Value, ValidationError> {
    if !types.contains_key(type_name) {
        return Err(ValidationError::new(format!("Unknown type '{type_name}'")));
    }
    let result = Validator { types }.value(&Type::User(type_name.to_string()), None, value, None);
    if let Err(err) = &result {
        debug!(type_name = %type_name, member = ?err.member, error = %err, "validation failed");
    }
    result
}

struct Validator<'a> {
    types: &'a Types,
}

impl Validator<'_> {
    /// Validate a value at a position with optional attributes: nullable
    /// handling, type validation, then attribute bounds.
    fn value(&self, ty: &Type, attr: Option<&Attr>, value: &Value, member: Option<&str>) -> Result<Value, ValidationError> {
        let nullable = is_nullable(attr) || self.typedef_nullable(ty);
        if value.is_null() || (nullable && value.as_str() == Some("null")) {
            return if nullable {
                Ok(Value::Null)
            } else {
                Err(member_error(effective_type(self.types, ty), value, member, None))
            };
        }

        let validated = self.typed(ty, value, member)?;
        if let Some(attr) = attr {
            check_attr(ty, attr, &validated, member)?;
        }
        Ok(validated)
    }

    /// Whether `ty` is a typedef (or typedef chain) marked nullable.
    fn typedef_nullable(&self, ty: &Type) -> bool {
        let mut current = ty;
        let mut seen = HashSet::new();
        while let Type::User(name) = current {
            match self.types.get(name) {
                Some(UserType::Typedef(typedef)) if seen.insert(name.as_str()) => {
                    if is_nullable(typedef.attr.as_ref()) {
                        return true;
                    }
                    current = &typedef.ty;
                }
                _ => break,
            }
        }
        false
    }

    fn typed(&self, ty: &Type, value: &Value, member: Option<&str>) -> Result<Value, ValidationError> {
        match ty {
            Type::Builtin(builtin) => {
                coerce_builtin(*builtin, value).ok_or_else(|| member_error(ty, value, member, None))
            }

            Type::Array(array) => {
                let empty = Vec::new();
                let items = match value {
                    Value::String(text) if text.is_empty() => &empty,
                    Value::Array(items) => items,
                    _ => return Err(member_error(ty, value, member, None)),
                };
                let mut validated = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_member = member_path(member, &index.to_string());
                    validated.push(self.value(&array.ty, array.attr.as_ref(), item, Some(&item_member))?);
                }
                Ok(Value::Array(validated))
            }

            Type::Dict(dict) => {
                let empty = Map::new();
                let entries = match value {
                    Value::String(text) if text.is_empty() => &empty,
                    Value::Object(entries) => entries,
                    _ => return Err(member_error(ty, value, member, None)),
                };
                let string_key = Type::Builtin(BuiltinType::String);
                let key_type = dict.key_type.as_ref().unwrap_or(&string_key);
                let key_nullable = is_nullable(dict.key_attr.as_ref());

                let mut validated = Map::new();
                for (key, item) in entries {
                    // Keys are validated at the dict's own member path.
                    let key = if key_nullable && key == "null" {
                        key.clone()
                    } else {
                        match self.value(key_type, dict.key_attr.as_ref(), &Value::String(key.clone()), member)? {
                            Value::String(key) => key,
                            other => other.to_string(),
                        }
                    };
                    let item_member = member_path(member, &key);
                    let item = self.value(&dict.ty, dict.attr.as_ref(), item, Some(&item_member))?;
                    validated.insert(key, item);
                }
                Ok(Value::Object(validated))
            }

            Type::User(name) => {
                let user_type = self
                    .types
                    .get(name)
                    .ok_or_else(|| ValidationError::new(format!("Unknown type '{name}'")))?;
                match user_type {
                    UserType::Typedef(typedef) => {
                        let validated = self.typed(&typedef.ty, value, member)?;
                        if let Some(attr) = &typedef.attr {
                            check_attr(ty, attr, &validated, member)?;
                        }
                        Ok(validated)
                    }

                    UserType::Enum(enm) => {
                        let text = value.as_str().ok_or_else(|| member_error(ty, value, member, None))?;
                        let values = enum_values(self.types, enm)?;
                        if values.iter().any(|v| v.name == text) {
                            Ok(value.clone())
                        } else {
                            Err(member_error(ty, value, member, None))
                        }
                    }

                    UserType::Struct(strct) => {
                        let empty = Map::new();
                        let fields = match value {
                            Value::String(text) if text.is_empty() => &empty,
                            Value::Object(fields) => fields,
                            _ => return Err(member_error(ty, value, member, None)),
                        };
                        if strct.union && fields.len() != 1 {
                            return Err(member_error(ty, value, member, None));
                        }

                        let members = struct_members(self.types, strct)?;
                        let mut validated = Map::new();
                        for struct_member in &members {
                            let path = member_path(member, &struct_member.name);
                            match fields.get(&struct_member.name) {
                                Some(field) => {
                                    let field = self.value(
                                        &struct_member.ty,
                                        struct_member.attr.as_ref(),
                                        field,
                                        Some(&path),
                                    )?;
                                    validated.insert(struct_member.name.clone(), field);
                                }
                                None if !struct_member.optional && !strct.union => {
                                    return Err(ValidationError::for_member(
                                        format!("Required member '{path}' missing"),
                                        Some(&path),
                                    ));
                                }
                                None => {}
                            }
                        }

                        if validated.len() != fields.len() {
                            let known: HashSet<&str> = members.iter().map(|m| m.name.as_str()).collect();
                            if let Some(unknown) = fields.keys().find(|key| !known.contains(key.as_str())) {
                                let path = member_path(member, unknown);
                                let quoted = format!("'{path}'");
                                return Err(ValidationError::for_member(
                                    format!("Unknown member {}", truncate(&quoted, MAX_MEMBER_TEXT)),
                                    Some(&path),
                                ));
                            }
                        }
                        Ok(Value::Object(validated))
                    }

                    UserType::Action(_) => Err(member_error(ty, value, member, None)),
                }
            }
        }
    }
}

fn member_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

/// Coerce a non-null value to a builtin type's canonical form.
fn coerce_builtin(builtin: BuiltinType, value: &Value) -> Option<Value> {
    match builtin {
        BuiltinType::String => value.is_string().then(|| value.clone()),

        BuiltinType::Int => match value {
            Value::String(text) => text.trim().parse::<i64>().ok().map(Value::from),
            Value::Number(number) if number.is_i64() || number.is_u64() => Some(value.clone()),
            Value::Number(number) => {
                let float = number.as_f64()?;
                let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
                (float.fract() == 0.0 && in_range).then(|| Value::from(float as i64))
            }
            _ => None,
        },

        BuiltinType::Float => {
            let float = match value {
                Value::String(text) => text.trim().parse::<f64>().ok()?,
                Value::Number(number) => number.as_f64()?,
                _ => return None,
            };
            Number::from_f64(float).map(Value::Number)
        }

        BuiltinType::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(text) if text == "true" => Some(Value::Bool(true)),
            Value::String(text) if text == "false" => Some(Value::Bool(false)),
            _ => None,
        },

        BuiltinType::Date => {
            let date = parse_date(value.as_str()?)?;
            Some(Value::String(date.format("%Y-%m-%d").to_string()))
        }

        BuiltinType::Datetime => {
            let datetime = parse_datetime(value.as_str()?)?;
            Some(Value::String(datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        }

        BuiltinType::Uuid => {
            let uuid = Uuid::parse_str(value.as_str()?).ok()?;
            Some(Value::String(uuid.hyphenated().to_string()))
        }

        BuiltinType::Object => Some(value.clone()),
    }
}

/// Parse an ISO 8601 date, or the local date of an ISO 8601 datetime.
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(text).map(|datetime| datetime.date_naive()))
}

/// Parse an ISO 8601 datetime. A missing offset means UTC and a bare date
/// means midnight UTC.
fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime);
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
}

fn check_attr(ty: &Type, attr: &Attr, value: &Value, member: Option<&str>) -> Result<(), ValidationError> {
    for bound in attr.bounds() {
        let measured = if bound.is_length() {
            value_length(value).map(|len| len as f64)
        } else {
            value.as_f64()
        };
        if !measured.is_some_and(|n| bound.holds(n)) {
            return Err(member_error(ty, value, member, Some(bound)));
        }
    }
    Ok(())
}

fn value_length(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(fields) => Some(fields.len()),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "dict",
    }
}

fn member_error(ty: &Type, value: &Value, member: Option<&str>, bound: Option<Bound>) -> ValidationError {
    let value_text = value.to_string();
    let member_part = match member {
        Some(member) if !member.is_empty() => format!(" for member '{member}'"),
        _ => String::new(),
    };
    let bound_part = bound.map(|bound| format!(" [{bound}]")).unwrap_or_default();
    ValidationError::for_member(
        format!(
            "Invalid value {} (type '{}'){member_part}, expected type '{}'{bound_part}",
            truncate(&value_text, MAX_VALUE_TEXT),
            value_kind(value),
            ty.display_name(),
        ),
        member,
    )
}
