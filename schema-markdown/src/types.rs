use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Map of user type name to user type definition.
///
/// Sorted by name so that compiled type models serialize deterministically.
pub type Types = BTreeMap<String, UserType>;

/// A titled type model, as produced by `schema-markdown compile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeModel {
    pub title: String,
    pub types: Types,
}

/// A user-defined type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Struct(Struct),
    Enum(Enum),
    Typedef(Typedef),
    Action(Action),
}

impl UserType {
    /// The declared name of the user type.
    pub fn name(&self) -> &str {
        match self {
            UserType::Struct(s) => &s.name,
            UserType::Enum(e) => &e.name,
            UserType::Typedef(t) => &t.name,
            UserType::Action(a) => &a.name,
        }
    }

    /// The documentation markdown lines of the user type.
    pub fn doc(&self) -> &[String] {
        match self {
            UserType::Struct(s) => &s.doc,
            UserType::Enum(e) => &e.doc,
            UserType::Typedef(t) => &t.doc,
            UserType::Action(a) => &a.doc,
        }
    }

    /// The documentation group of the user type, if any.
    pub fn doc_group(&self) -> Option<&str> {
        match self {
            UserType::Struct(s) => s.doc_group.as_deref(),
            UserType::Enum(e) => e.doc_group.as_deref(),
            UserType::Typedef(t) => t.doc_group.as_deref(),
            UserType::Action(a) => a.doc_group.as_deref(),
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            UserType::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Enum> {
        match self {
            UserType::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_typedef(&self) -> Option<&Typedef> {
        match self {
            UserType::Typedef(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            UserType::Action(a) => Some(a),
            _ => None,
        }
    }
}

/// A struct (or union) type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Struct {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_group: Option<String>,

    /// Base struct names whose members are inherited, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,

    /// If true, exactly one member must be present.
    #[serde(default, skip_serializing_if = "is_false")]
    pub union: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<StructMember>,
}

/// A struct member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,

    #[serde(rename = "type")]
    pub ty: Type,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<Attr>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

/// An enumeration type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_group: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<EnumValue>,
}

/// An enumeration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,
}

/// A named type alias with optional extra attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typedef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_group: Option<String>,

    #[serde(rename = "type")]
    pub ty: Type,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<Attr>,
}

/// A JSON web API action. Actions are documentation metadata only and are
/// never a value-validation target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_group: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<ActionUrl>,

    /// Path parameters struct type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Query parameters struct type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Content body struct type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Response body struct type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Custom error codes enum type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl Action {
    /// Returns the section type name for `section` (`path`, `query`, `input`,
    /// `output` or `errors`).
    pub fn section(&self, section: Section) -> Option<&str> {
        match section {
            Section::Path => self.path.as_deref(),
            Section::Query => self.query.as_deref(),
            Section::Input => self.input.as_deref(),
            Section::Output => self.output.as_deref(),
            Section::Errors => self.errors.as_deref(),
        }
    }

    pub(crate) fn section_mut(&mut self, section: Section) -> &mut Option<String> {
        match section {
            Section::Path => &mut self.path,
            Section::Query => &mut self.query,
            Section::Input => &mut self.input,
            Section::Output => &mut self.output,
            Section::Errors => &mut self.errors,
        }
    }

    /// The default URL path of the action, `/<name>`.
    pub fn default_path(&self) -> String {
        format!("/{}", self.name)
    }
}

/// A type-bearing action section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Path,
    Query,
    Input,
    Output,
    Errors,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Path,
        Section::Query,
        Section::Input,
        Section::Output,
        Section::Errors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Path => "path",
            Section::Query => "query",
            Section::Input => "input",
            Section::Output => "output",
            Section::Errors => "errors",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.as_str() == keyword)
    }
}

/// An action URL binding. A missing method matches every HTTP method; a
/// missing path means the action's default path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionUrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ActionUrl {
    /// The URL path, falling back to the action's default path.
    pub fn effective_path(&self, action: &Action) -> String {
        self.path.clone().unwrap_or_else(|| action.default_path())
    }
}

/// A type reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Builtin(BuiltinType),
    Array(Box<ArrayType>),
    Dict(Box<DictType>),
    /// A user type name, resolved against the enclosing type model.
    User(String),
}

impl Type {
    /// Create a builtin type reference for a builtin name, otherwise a user
    /// type reference.
    pub fn from_name(name: &str) -> Type {
        match BuiltinType::from_name(name) {
            Some(builtin) => Type::Builtin(builtin),
            None => Type::User(name.to_string()),
        }
    }

    /// The type name used in validation messages.
    pub fn display_name(&self) -> &str {
        match self {
            Type::Builtin(b) => b.as_str(),
            Type::Array(_) => "array",
            Type::Dict(_) => "dict",
            Type::User(name) => name,
        }
    }
}

/// An array type: element type plus element attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayType {
    #[serde(rename = "type")]
    pub ty: Type,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<Attr>,
}

/// A dictionary type: value type and attributes, plus an optional key type
/// (string when absent) and key attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictType {
    #[serde(rename = "type")]
    pub ty: Type,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<Attr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<Type>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_attr: Option<Attr>,
}

/// Built-in types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinType {
    String,
    Int,
    Float,
    Bool,
    Date,
    Datetime,
    Uuid,
    Object,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 8] = [
        BuiltinType::String,
        BuiltinType::Int,
        BuiltinType::Float,
        BuiltinType::Bool,
        BuiltinType::Date,
        BuiltinType::Datetime,
        BuiltinType::Uuid,
        BuiltinType::Object,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinType::String => "string",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
            BuiltinType::Bool => "bool",
            BuiltinType::Date => "date",
            BuiltinType::Datetime => "datetime",
            BuiltinType::Uuid => "uuid",
            BuiltinType::Object => "object",
        }
    }

    pub fn from_name(name: &str) -> Option<BuiltinType> {
        BuiltinType::ALL.into_iter().find(|b| b.as_str() == name)
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute constraints attached to a type reference.
///
/// Each configured bound is applied independently; range emptiness is never
/// checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attr {
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,

    #[serde(rename = "lenEq", default, skip_serializing_if = "Option::is_none")]
    pub len_eq: Option<u64>,
    #[serde(rename = "lenLT", default, skip_serializing_if = "Option::is_none")]
    pub len_lt: Option<u64>,
    #[serde(rename = "lenLTE", default, skip_serializing_if = "Option::is_none")]
    pub len_lte: Option<u64>,
    #[serde(rename = "lenGT", default, skip_serializing_if = "Option::is_none")]
    pub len_gt: Option<u64>,
    #[serde(rename = "lenGTE", default, skip_serializing_if = "Option::is_none")]
    pub len_gte: Option<u64>,
}

/// A single attribute bound, used for messages and attribute checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Eq(f64),
    Lt(f64),
    Lte(f64),
    Gt(f64),
    Gte(f64),
    LenEq(u64),
    LenLt(u64),
    LenLte(u64),
    LenGt(u64),
    LenGte(u64),
}

impl Bound {
    /// True for length bounds (`len ...`), false for numeric bounds.
    pub fn is_length(self) -> bool {
        matches!(
            self,
            Bound::LenEq(_) | Bound::LenLt(_) | Bound::LenLte(_) | Bound::LenGt(_) | Bound::LenGte(_)
        )
    }

    /// Check the bound against a numeric value (numeric bounds) or a length
    /// (length bounds).
    pub fn holds(self, n: f64) -> bool {
        match self {
            Bound::Eq(b) => n == b,
            Bound::Lt(b) => n < b,
            Bound::Lte(b) => n <= b,
            Bound::Gt(b) => n > b,
            Bound::Gte(b) => n >= b,
            Bound::LenEq(b) => n == b as f64,
            Bound::LenLt(b) => n < b as f64,
            Bound::LenLte(b) => n <= b as f64,
            Bound::LenGt(b) => n > b as f64,
            Bound::LenGte(b) => n >= b as f64,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Bound::Eq(v) => write!(f, "== {}", format_number(v)),
            Bound::Lt(v) => write!(f, "< {}", format_number(v)),
            Bound::Lte(v) => write!(f, "<= {}", format_number(v)),
            Bound::Gt(v) => write!(f, "> {}", format_number(v)),
            Bound::Gte(v) => write!(f, ">= {}", format_number(v)),
            Bound::LenEq(v) => write!(f, "len == {v}"),
            Bound::LenLt(v) => write!(f, "len < {v}"),
            Bound::LenLte(v) => write!(f, "len <= {v}"),
            Bound::LenGt(v) => write!(f, "len > {v}"),
            Bound::LenGte(v) => write!(f, "len >= {v}"),
        }
    }
}

impl Attr {
    /// The configured bounds, in check order.
    pub fn bounds(&self) -> Vec<Bound> {
        let numeric = [
            self.eq.map(Bound::Eq),
            self.lt.map(Bound::Lt),
            self.lte.map(Bound::Lte),
            self.gt.map(Bound::Gt),
            self.gte.map(Bound::Gte),
        ];
        let length = [
            self.len_eq.map(Bound::LenEq),
            self.len_lt.map(Bound::LenLt),
            self.len_lte.map(Bound::LenLte),
            self.len_gt.map(Bound::LenGt),
            self.len_gte.map(Bound::LenGte),
        ];
        numeric.into_iter().chain(length).flatten().collect()
    }
}

/// Whether the optional attributes mark the position nullable.
pub fn is_nullable(attr: Option<&Attr>) -> bool {
    attr.is_some_and(|a| a.nullable)
}

/// Format a number with at most six decimals and no trailing zeros
/// (`5.0` -> `5`, `0.5` -> `0.5`).
pub fn format_number(value: f64) -> String {
    let text = format!("{value:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}
