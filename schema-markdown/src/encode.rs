//! Query-string codec.
//!
//! Nested values are flattened to dotted keys: `a.b=1` sets member `b` of
//! object `a`, and `a.0=1` sets index 0 of array `a`. Decoded scalars are
//! always strings; the validator coerces them to their declared types.

use serde_json::{Map, Value};

use crate::error::{QueryStringError, truncate};

const MAX_KEY_TEXT: usize = 100;

/// Decode a query string into a JSON object or array.
///
/// Keys are split on `.` before percent-decoding, so `%2E` is a literal dot
/// within a key segment. Whether a key path (the root included) is an array
/// or an object is decided by the first key segment seen below it. Array
/// indexes must start at 0 and be contiguous. Pairs without `=` are ignored.
///
/// ```
/// use serde_json::json;
///
/// let value = schema_markdown::decode_query_string("a=7&b.0=x&b.1=y&c.d=%20").unwrap();
/// assert_eq!(value, json!({"a": "7", "b": ["x", "y"], "c": {"d": " "}}));
/// ```
pub fn decode_query_string(query: &str) -> Result<Value, QueryStringError> {
    let mut root: Option<Value> = None;
    for pair in query.split('&') {
        let Some((raw_key, raw_value)) = pair.split_once('=') else {
            continue;
        };
        let invalid_pair = || QueryStringError::InvalidKeyValue(truncate(pair, MAX_KEY_TEXT).to_string());
        if raw_value.contains('=') {
            return Err(invalid_pair());
        }

        let segments = raw_key
            .split('.')
            .map(|segment| urlencoding::decode(segment).map(|segment| segment.into_owned()))
            .collect::<Result<Vec<String>, _>>()
            .map_err(|_| invalid_pair())?;
        let value = urlencoding::decode(raw_value).map_err(|_| invalid_pair())?;

        let root = root.get_or_insert_with(|| new_container(&segments[0]));
        insert(root, raw_key, &segments, value.into_owned())?;
    }
    Ok(root.unwrap_or_else(|| Value::Object(Map::new())))
}

fn insert(root: &mut Value, key: &str, segments: &[String], value: String) -> Result<(), QueryStringError> {
    let duplicate = || QueryStringError::DuplicateKey(truncate(key, MAX_KEY_TEXT).to_string());

    let mut parent = root;
    for (position, segment) in segments.iter().enumerate() {
        let next = segments.get(position + 1);
        parent = match parent {
            Value::Object(fields) => match next {
                Some(next) => fields
                    .entry(segment.clone())
                    .or_insert_with(|| new_container(next)),
                None => {
                    if fields.contains_key(segment) {
                        return Err(duplicate());
                    }
                    fields.insert(segment.clone(), Value::String(value));
                    return Ok(());
                }
            },

            Value::Array(items) => {
                let index = array_index(segment)
                    .filter(|index| *index <= items.len())
                    .ok_or_else(|| QueryStringError::InvalidArrayIndex {
                        index: truncate(segment, MAX_KEY_TEXT).to_string(),
                        key: truncate(key, MAX_KEY_TEXT).to_string(),
                    })?;
                match next {
                    Some(next) => {
                        if index == items.len() {
                            items.push(new_container(next));
                        }
                        &mut items[index]
                    }
                    None => {
                        if index < items.len() {
                            return Err(duplicate());
                        }
                        items.push(Value::String(value));
                        return Ok(());
                    }
                }
            }

            // A scalar already occupies a container's path.
            _ => return Err(duplicate()),
        };
    }
    Ok(())
}

/// The container for a path whose first child segment is `segment`.
fn new_container(segment: &str) -> Value {
    if array_index(segment).is_some() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

/// Parse a canonical array index: `0` or digits without a leading zero.
fn array_index(segment: &str) -> Option<usize> {
    let canonical = segment == "0"
        || (segment.starts_with(|c: char| matches!(c, '1'..='9'))
            && segment.chars().all(|c| c.is_ascii_digit()));
    if canonical { segment.parse().ok() } else { None }
}

/// Encode a JSON value as a query string.
///
/// Object keys are sorted, array items keep their order, and an empty nested
/// container encodes as `key=`. Dots in object keys are escaped as `%2E`.
/// A top-level scalar encodes as its bare percent-encoded text.
///
/// ```
/// use serde_json::json;
///
/// let query = schema_markdown::encode_query_string(&json!({"b": [1, true], "a": "x y"}));
/// assert_eq!(query, "a=x%20y&b.0=1&b.1=true");
/// ```
pub fn encode_query_string(value: &Value) -> String {
    let mut pairs = Vec::new();
    encode_value(value, None, &mut pairs);
    pairs.join("&")
}

fn encode_value(value: &Value, prefix: Option<&str>, pairs: &mut Vec<String>) {
    let child_key = |segment: &str| match prefix {
        Some(prefix) => format!("{prefix}.{segment}"),
        None => segment.to_string(),
    };

    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, field) in entries {
                encode_value(field, Some(&child_key(&encode_key(key))), pairs);
            }
            if fields.is_empty()
                && let Some(prefix) = prefix
            {
                pairs.push(format!("{prefix}="));
            }
        }

        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                encode_value(item, Some(&child_key(&index.to_string())), pairs);
            }
            if items.is_empty()
                && let Some(prefix) = prefix
            {
                pairs.push(format!("{prefix}="));
            }
        }

        scalar => {
            let text = match scalar {
                Value::String(text) => urlencoding::encode(text).into_owned(),
                other => urlencoding::encode(&other.to_string()).into_owned(),
            };
            match prefix {
                Some(prefix) => pairs.push(format!("{prefix}={text}")),
                None => pairs.push(text),
            }
        }
    }
}

/// Percent-encode an object key as one key segment.
fn encode_key(key: &str) -> String {
    urlencoding::encode(key).replace('.', "%2E")
}
