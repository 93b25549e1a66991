use std::fmt;

use serde::{Deserialize, Serialize};

/// A single parser error, attributed to a source name and 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub source: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: error: {}", self.source, self.line, self.message)
    }
}

/// Aggregate Schema Markdown parser failure.
///
/// Parsing never stops at the first problem: every syntax and consistency
/// error found is reported, sorted by source, line and message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", join_lines(.diagnostics))]
pub struct ParserError {
    pub diagnostics: Vec<Diagnostic>,
}

impl ParserError {
    /// The formatted error lines (`source:line: error: message`).
    pub fn errors(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

/// A value failed validation against a type model.
///
/// Validation is fail-fast: this describes the first violation found in a
/// depth-first walk of the value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    /// Dotted path of the offending member, if the error is member-specific.
    pub member: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            member: None,
        }
    }

    pub fn for_member(message: impl Into<String>, member: Option<&str>) -> Self {
        Self {
            message: message.into(),
            member: member.map(str::to_string),
        }
    }
}

/// Malformed attribute clause (`(...)`, `[...]` or `{...}` contents).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid attribute syntax: {message} at position {position}")]
pub struct AttrsError {
    pub message: String,
    pub position: usize,
}

/// Errors decoding a query string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryStringError {
    #[error("Invalid key/value pair '{0}'")]
    InvalidKeyValue(String),

    #[error("Duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("Invalid array index '{index}' in key '{key}'")]
    InvalidArrayIndex { index: String, key: String },
}

/// Errors resolving inherited struct members or enum values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Circular base type detected for type '{0}'")]
    CircularBase(String),

    #[error("Unknown type '{0}'")]
    UnknownType(String),
}

impl From<ResolveError> for ValidationError {
    fn from(err: ResolveError) -> Self {
        ValidationError::new(err.to_string())
    }
}

fn join_lines(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate `text` to at most `max` characters for diagnostics.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic {
            source: "api.smd".into(),
            line: 12,
            message: "Syntax error".into(),
        };
        assert_eq!(diag.to_string(), "api.smd:12: error: Syntax error");
    }

    #[test]
    fn parser_error_joins_lines() {
        let err = ParserError {
            diagnostics: vec![
                Diagnostic {
                    source: String::new(),
                    line: 2,
                    message: "Syntax error".into(),
                },
                Diagnostic {
                    source: String::new(),
                    line: 4,
                    message: "Redefinition of type 'Foo'".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            ":2: error: Syntax error\n:4: error: Redefinition of type 'Foo'"
        );
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("\u{a000}\u{a000}x", 2), "\u{a000}\u{a000}");
    }
}
