use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::attrs::parse_attrs;
use crate::check::type_model_errors;
use crate::error::{Diagnostic, ParserError};
use crate::types::{
    Action, ActionUrl, ArrayType, Attr, BuiltinType, DictType, Enum, EnumValue, Section, Struct,
    StructMember, Type, Typedef, Types, UserType,
};

/// Parse a single Schema Markdown string into a finalized type model.
///
/// ```
/// let types = schema_markdown::parse_schema_markdown("struct Point\n    int x\n    int y\n").unwrap();
/// assert_eq!(types["Point"].as_struct().unwrap().members.len(), 2);
/// ```
pub fn parse_schema_markdown(text: &str) -> Result<Types, ParserError> {
    parse_schema_markdown_sources([("", text)])
}

/// Parse several named Schema Markdown sources into one type model. The
/// sources share a namespace, so types may reference types defined in any
/// other source. Consistency checks run once, after the last source.
pub fn parse_schema_markdown_sources<I, S, T>(sources: I) -> Result<Types, ParserError>
where
    I: IntoIterator<Item = (S, T)>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    let mut parser = SchemaMarkdownParser::new();
    for (source, text) in sources {
        parser.parse(source.as_ref(), text.as_ref());
    }
    parser.finalize()?;
    Ok(parser.into_types())
}

/// An accumulating Schema Markdown parser.
///
/// `parse` may be called any number of times; every call adds to the same
/// type model. Syntax errors are collected rather than raised, and
/// `finalize` runs the type-model consistency checks and reports every
/// error found so far.
#[derive(Debug, Default)]
pub struct SchemaMarkdownParser {
    types: Types,
    errors: BTreeSet<Diagnostic>,
    /// Definition positions keyed by `Type` or `Type.member`.
    positions: HashMap<String, (String, usize)>,
}

impl SchemaMarkdownParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser seeded with an existing type model.
    pub fn with_types(types: Types) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    pub fn types(&self) -> &Types {
        &self.types
    }

    pub fn into_types(self) -> Types {
        self.types
    }

    /// The errors collected so far, sorted, as `source:line: error: message`.
    pub fn errors(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Run the type-model consistency checks and fail with every collected
    /// error, if any.
    pub fn finalize(&mut self) -> Result<(), ParserError> {
        let check_errors = type_model_errors(&self.types);
        debug!(
            types = self.types.len(),
            syntax_errors = self.errors.len(),
            check_errors = check_errors.len(),
            "finalize schema"
        );
        for error in check_errors {
            let (source, line) = self.position(&error.type_name, error.member.as_deref());
            self.errors.insert(Diagnostic {
                source,
                line,
                message: error.message,
            });
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ParserError {
                diagnostics: self.errors.iter().cloned().collect(),
            })
        }
    }

    /// Parse Schema Markdown text. `source` names the text in error messages.
    pub fn parse(&mut self, source: &str, text: &str) {
        let mut state = LineState::default();
        let mut continued = String::new();
        let mut line_number = 0;

        // The trailing empty line flushes a dangling line continuation.
        for physical in text.lines().chain(std::iter::once("")) {
            line_number += 1;

            if let Some(head) = physical.trim_end().strip_suffix('\\') {
                continued.push_str(head);
                continue;
            }
            let joined;
            let line = if continued.is_empty() {
                physical
            } else {
                continued.push_str(physical);
                joined = std::mem::take(&mut continued);
                joined.as_str()
            };

            match classify(line, &state, &self.types) {
                Some(parsed) => {
                    trace!(source = %source, line = line_number, kind = parsed.kind(), "schema line");
                    self.apply(parsed, &mut state, source, line_number);
                }
                None => self.error("Syntax error".into(), source, line_number),
            }
        }

        debug!(source = %source, lines = line_number - 1, types = self.types.len(), "parsed schema source");
    }

    fn error(&mut self, message: String, source: &str, line: usize) {
        self.errors.insert(Diagnostic {
            source: source.to_string(),
            line,
            message,
        });
    }

    fn record_position(&mut self, key: String, source: &str, line: usize) {
        self.positions.insert(key, (source.to_string(), line));
    }

    fn position(&self, type_name: &str, member: Option<&str>) -> (String, usize) {
        member
            .and_then(|member| self.positions.get(&format!("{type_name}.{member}")))
            .or_else(|| self.positions.get(type_name))
            .cloned()
            .unwrap_or_else(|| (String::new(), 1))
    }

    fn is_defined(&self, name: &str) -> bool {
        BuiltinType::from_name(name).is_some() || self.types.contains_key(name)
    }

    fn apply(&mut self, parsed: Line<'_>, state: &mut LineState, source: &str, line: usize) {
        match parsed {
            Line::Comment(doc) => {
                if let Some(doc) = doc {
                    state.doc.push(doc.strip_prefix(' ').unwrap_or(doc).to_string());
                }
            }

            Line::Group(group) => {
                state.doc_group = group.map(|g| g.trim().to_string());
            }

            Line::Action(name) => {
                if self.types.contains_key(name) {
                    self.error(format!("Redefinition of action '{name}'"), source, line);
                }
                state.urls = None;
                state.user_type = None;
                state.action = Some(name.to_string());

                let action = Action {
                    name: name.to_string(),
                    doc: state.take_doc(),
                    doc_group: state.doc_group.clone(),
                    ..Default::default()
                };
                self.types.insert(name.to_string(), UserType::Action(action));
                self.record_position(name.to_string(), source, line);
            }

            Line::Definition { kind, name, bases } => {
                if self.is_defined(name) {
                    self.error(format!("Redefinition of type '{name}'"), source, line);
                }
                state.action = None;
                state.urls = None;
                state.user_type = Some(name.to_string());

                let doc = state.take_doc();
                let doc_group = state.doc_group.clone();
                let user_type = match kind {
                    DefinitionKind::Struct | DefinitionKind::Union => UserType::Struct(Struct {
                        name: name.to_string(),
                        doc,
                        doc_group,
                        bases,
                        union: kind == DefinitionKind::Union,
                        members: Vec::new(),
                    }),
                    DefinitionKind::Enum => UserType::Enum(Enum {
                        name: name.to_string(),
                        doc,
                        doc_group,
                        bases,
                        values: Vec::new(),
                    }),
                };
                self.types.insert(name.to_string(), user_type);
                self.record_position(name.to_string(), source, line);
            }

            Line::Section { section, bases } => {
                let Some(action_name) = state.action.clone() else {
                    return;
                };
                let section_type_name = format!("{action_name}_{}", section.as_str());
                let mut redefined = false;
                if let Some(UserType::Action(action)) = self.types.get_mut(&action_name) {
                    let slot = action.section_mut(section);
                    redefined = slot.is_some();
                    *slot = Some(section_type_name.clone());
                }
                if redefined {
                    self.error(format!("Redefinition of action {}", section.as_str()), source, line);
                }
                state.urls = None;
                state.user_type = Some(section_type_name.clone());

                let user_type = if section == Section::Errors {
                    UserType::Enum(Enum {
                        name: section_type_name.clone(),
                        bases,
                        ..Default::default()
                    })
                } else {
                    UserType::Struct(Struct {
                        name: section_type_name.clone(),
                        bases,
                        ..Default::default()
                    })
                };
                self.types.insert(section_type_name.clone(), user_type);
                self.record_position(section_type_name, source, line);
            }

            Line::Urls => {
                let has_urls = state
                    .action
                    .as_ref()
                    .and_then(|name| self.types.get(name))
                    .and_then(UserType::as_action)
                    .is_some_and(|action| !action.urls.is_empty());
                if has_urls {
                    self.error("Redefinition of action urls".into(), source, line);
                }
                state.user_type = None;
                state.urls = Some(Vec::new());
            }

            Line::Value(name) => {
                let doc = state.take_doc();
                let Some(enum_name) = state.user_type.clone() else {
                    return;
                };
                if let Some(UserType::Enum(enm)) = self.types.get_mut(&enum_name) {
                    enm.values.push(EnumValue {
                        name: name.to_string(),
                        doc,
                    });
                }
                self.record_position(format!("{enum_name}.{name}"), source, line);
            }

            Line::Member {
                optional,
                name,
                ty,
                attr,
            } => {
                let doc = state.take_doc();
                let Some(struct_name) = state.user_type.clone() else {
                    return;
                };
                if let Some(UserType::Struct(strct)) = self.types.get_mut(&struct_name) {
                    strct.members.push(StructMember {
                        name: name.to_string(),
                        doc,
                        ty,
                        attr,
                        optional,
                    });
                }
                self.record_position(format!("{struct_name}.{name}"), source, line);
            }

            Line::Url { method, path } => {
                let url = ActionUrl {
                    method: (method != "*").then(|| method.to_string()),
                    path: path.map(str::to_string),
                };
                let Some(urls) = state.urls.as_mut() else {
                    return;
                };
                if urls.contains(&url) {
                    self.error(
                        format!("Duplicate URL: {method} {}", path.unwrap_or("")),
                        source,
                        line,
                    );
                }
                urls.push(url.clone());

                if let Some(action_name) = &state.action
                    && let Some(UserType::Action(action)) = self.types.get_mut(action_name)
                {
                    action.urls.push(url);
                }
            }

            Line::Typedef { name, ty, attr } => {
                if self.is_defined(name) {
                    self.error(format!("Redefinition of type '{name}'"), source, line);
                }
                state.action = None;
                state.urls = None;
                state.user_type = None;

                let typedef = Typedef {
                    name: name.to_string(),
                    doc: state.take_doc(),
                    doc_group: state.doc_group.clone(),
                    ty,
                    attr,
                };
                self.types.insert(name.to_string(), UserType::Typedef(typedef));
                self.record_position(name.to_string(), source, line);
            }
        }
    }
}

// ------------------------------------------------------------------
// Parser state
// ------------------------------------------------------------------

/// State threaded through the lines of one source.
#[derive(Debug, Default)]
struct LineState {
    /// The open action, if any.
    action: Option<String>,
    /// URLs of the open `urls` section, if any.
    urls: Option<Vec<ActionUrl>>,
    /// The open struct or enum that receives members or values.
    user_type: Option<String>,
    /// Pending documentation lines for the next definition, member or value.
    doc: Vec<String>,
    /// The current documentation group.
    doc_group: Option<String>,
}

impl LineState {
    fn take_doc(&mut self) -> Vec<String> {
        std::mem::take(&mut self.doc)
    }
}

// ------------------------------------------------------------------
// Line classification
// ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionKind {
    Struct,
    Union,
    Enum,
}

/// A recognized Schema Markdown line.
#[derive(Debug)]
enum Line<'a> {
    /// A blank line, an ignored `#-` comment or a `#` documentation line.
    Comment(Option<&'a str>),
    Group(Option<&'a str>),
    Action(&'a str),
    Definition {
        kind: DefinitionKind,
        name: &'a str,
        bases: Vec<String>,
    },
    Section {
        section: Section,
        bases: Vec<String>,
    },
    Urls,
    Value(&'a str),
    Member {
        optional: bool,
        name: &'a str,
        ty: Type,
        attr: Option<Attr>,
    },
    Url {
        method: &'a str,
        path: Option<&'a str>,
    },
    Typedef {
        name: &'a str,
        ty: Type,
        attr: Option<Attr>,
    },
}

impl Line<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Line::Comment(_) => "comment",
            Line::Group(_) => "group",
            Line::Action(_) => "action",
            Line::Definition { .. } => "definition",
            Line::Section { .. } => "section",
            Line::Urls => "urls",
            Line::Value(_) => "value",
            Line::Member { .. } => "member",
            Line::Url { .. } => "url",
            Line::Typedef { .. } => "typedef",
        }
    }
}

/// Classify a line. Context-dependent forms (sections, values, members and
/// URLs) are only tried while an enclosing definition is open. Returns
/// `None` for a syntax error.
fn classify<'a>(line: &'a str, state: &LineState, types: &Types) -> Option<Line<'a>> {
    if let Some(comment) = scan_comment(line) {
        return Some(comment);
    }
    if let Some(group) = scan_group(line) {
        return Some(group);
    }
    if let Some(action) = scan_action(line) {
        return Some(action);
    }
    if let Some(definition) = scan_definition(line) {
        return Some(definition);
    }
    if state.action.is_some() {
        if let Some(section) = scan_section(line) {
            return Some(section);
        }
        if scan_urls_section(line) {
            return Some(Line::Urls);
        }
    }

    let open_type = state.user_type.as_ref().and_then(|name| types.get(name));
    if let Some(UserType::Enum(_)) = open_type
        && let Some(value) = scan_value(line)
    {
        return Some(value);
    }
    if let Some(UserType::Struct(_)) = open_type
        && let Some(member) = scan_member(line)
    {
        return Some(member);
    }
    if state.urls.is_some()
        && let Some(url) = scan_url(line)
    {
        return Some(url);
    }

    scan_typedef(line)
}

fn scan_comment(line: &str) -> Option<Line<'_>> {
    let text = line.trim_start();
    if text.is_empty() || text.starts_with("#-") {
        Some(Line::Comment(None))
    } else {
        text.strip_prefix('#').map(|doc| Line::Comment(Some(doc)))
    }
}

fn scan_group(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if cur.ident()? != "group" {
        return None;
    }
    let rest = cur.rest();
    if rest.trim().is_empty() {
        return Some(Line::Group(None));
    }
    if !cur.skip_whitespace() {
        return None;
    }
    let quoted = cur.rest().trim_end().strip_prefix('"')?.strip_suffix('"')?;
    if quoted.is_empty() {
        return None;
    }
    Some(Line::Group(Some(quoted)))
}

fn scan_action(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if cur.ident()? != "action" || !cur.skip_whitespace() {
        return None;
    }
    cur.ident().map(Line::Action)
}

fn scan_definition(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    let kind = match cur.ident()? {
        "struct" => DefinitionKind::Struct,
        "union" => DefinitionKind::Union,
        "enum" => DefinitionKind::Enum,
        _ => return None,
    };
    if !cur.skip_whitespace() {
        return None;
    }
    let name = cur.ident()?;
    let bases = scan_bases(&mut cur)?;
    cur.at_end().then_some(Line::Definition { kind, name, bases })
}

fn scan_section(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if !cur.skip_whitespace() {
        return None;
    }
    let section = Section::from_keyword(cur.ident()?)?;
    let bases = scan_bases(&mut cur)?;
    cur.at_end().then_some(Line::Section { section, bases })
}

fn scan_urls_section(line: &str) -> bool {
    let mut cur = Cursor::new(line);
    cur.skip_whitespace() && cur.ident() == Some("urls") && cur.at_end()
}

fn scan_value(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if !cur.skip_whitespace() {
        return None;
    }

    // Quoted values may contain any text but must start with a letter.
    if let Some(quoted) = cur.rest().trim_end().strip_prefix('"') {
        let value = quoted.strip_suffix('"')?;
        return value
            .starts_with(|c: char| c.is_ascii_alphabetic())
            .then_some(Line::Value(value));
    }

    let name = cur.ident()?;
    cur.at_end().then_some(Line::Value(name))
}

fn scan_member(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if !cur.skip_whitespace() {
        return None;
    }

    // `optional` is a modifier only when a full member follows it;
    // otherwise it is read as a type name.
    let start = cur.clone();
    if cur.ident() == Some("optional")
        && cur.skip_whitespace()
        && let Some((name, ty, attr)) = scan_typed_name(&mut cur)
    {
        return Some(Line::Member {
            optional: true,
            name,
            ty,
            attr,
        });
    }

    let mut cur = start;
    let (name, ty, attr) = scan_typed_name(&mut cur)?;
    Some(Line::Member {
        optional: false,
        name,
        ty,
        attr,
    })
}

fn scan_url(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if !cur.skip_whitespace() {
        return None;
    }
    let method = if cur.eat('*') {
        "*"
    } else {
        cur.take_while(|c| c.is_ascii_alphabetic())
    };
    if method.is_empty() {
        return None;
    }

    let mut path_cur = cur.clone();
    let path = if path_cur.skip_whitespace() && path_cur.peek() == Some('/') {
        Some(path_cur.take_while(|c| !c.is_whitespace()))
    } else {
        None
    };
    Some(Line::Url { method, path })
}

fn scan_typedef(line: &str) -> Option<Line<'_>> {
    let mut cur = Cursor::new(line);
    if cur.ident()? != "typedef" || !cur.skip_whitespace() {
        return None;
    }
    let (name, ty, attr) = scan_typed_name(&mut cur)?;
    Some(Line::Typedef { name, ty, attr })
}

/// Scan `(Base1, Base2, ...)`. Returns an empty list when there is no base
/// clause and `None` when the clause is malformed.
fn scan_bases(cur: &mut Cursor<'_>) -> Option<Vec<String>> {
    let mut lookahead = cur.clone();
    lookahead.skip_whitespace();
    if !lookahead.eat('(') {
        return Some(Vec::new());
    }
    *cur = lookahead;

    let mut bases = Vec::new();
    loop {
        cur.skip_whitespace();
        bases.push(cur.ident()?.to_string());
        cur.skip_whitespace();
        if cur.eat(')') {
            return Some(bases);
        }
        if !cur.eat(',') {
            return None;
        }
    }
}

// ------------------------------------------------------------------
// Type specifications
// ------------------------------------------------------------------

/// Scan `TYPESPEC NAME` to the end of the line, where TYPESPEC is one of
///
/// - `ID[(ATTRS)]`
/// - `ID[(ATTRS)] [ATTRS]` (array; bracket attributes apply to the array)
/// - `ID[(ATTRS)] {ATTRS}` (dict with string keys)
/// - `KEYID[(ATTRS)] : ID[(ATTRS)] {ATTRS}` (dict with explicit key type)
fn scan_typed_name<'a>(cur: &mut Cursor<'a>) -> Option<(&'a str, Type, Option<Attr>)> {
    let (ty, attr) = scan_type_spec(cur)?;
    if !cur.skip_whitespace() {
        return None;
    }
    let name = cur.ident()?;
    cur.at_end().then_some((name, ty, attr))
}

fn scan_type_spec(cur: &mut Cursor<'_>) -> Option<(Type, Option<Attr>)> {
    let type_name = cur.ident()?;
    let type_attr = scan_attr_clause(cur, '(', ')')?.flatten();

    // Array?
    if let Some(array_attr) = scan_attr_clause(cur, '[', ']')? {
        let array = ArrayType {
            ty: Type::from_name(type_name),
            attr: type_attr,
        };
        return Some((Type::Array(Box::new(array)), array_attr));
    }

    // Dict with an explicit key type?
    let mut lookahead = cur.clone();
    lookahead.skip_whitespace();
    if lookahead.eat(':') {
        *cur = lookahead;
        cur.skip_whitespace();
        let value_name = cur.ident()?;
        let value_attr = scan_attr_clause(cur, '(', ')')?.flatten();
        let dict_attr = scan_attr_clause(cur, '{', '}')??;
        let dict = DictType {
            ty: Type::from_name(value_name),
            attr: value_attr,
            key_type: Some(Type::from_name(type_name)),
            key_attr: type_attr,
        };
        return Some((Type::Dict(Box::new(dict)), dict_attr));
    }

    // Dict with string keys?
    if let Some(dict_attr) = scan_attr_clause(cur, '{', '}')? {
        let dict = DictType {
            ty: Type::from_name(type_name),
            attr: type_attr,
            key_type: None,
            key_attr: None,
        };
        return Some((Type::Dict(Box::new(dict)), dict_attr));
    }

    Some((Type::from_name(type_name), type_attr))
}

/// Scan an optional attribute clause delimited by `open` and `close`.
///
/// Returns `None` when the clause is malformed, `Some(None)` when there is
/// no clause, and `Some(Some(attr))` otherwise. Parenthesized clauses must
/// not be empty; bracket and brace clauses may be.
fn scan_attr_clause(cur: &mut Cursor<'_>, open: char, close: char) -> Option<Option<Option<Attr>>> {
    let mut lookahead = cur.clone();
    lookahead.skip_whitespace();
    if !lookahead.eat(open) {
        return Some(None);
    }

    let inner = lookahead.take_while(|c| c != close);
    if !lookahead.eat(close) {
        return None;
    }
    let attr = parse_attrs(inner).ok()?;
    if attr.is_none() && open == '(' {
        return None;
    }
    *cur = lookahead;
    Some(Some(attr))
}

// ------------------------------------------------------------------
// Cursor
// ------------------------------------------------------------------

/// A forward-only cursor over one line.
#[derive(Debug, Clone)]
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Skip whitespace, returning whether any was skipped.
    fn skip_whitespace(&mut self) -> bool {
        !self.take_while(char::is_whitespace).is_empty()
    }

    /// Scan an identifier: a letter followed by letters, digits or `_`.
    fn ident(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(self.take_while(|c| c.is_alphanumeric() || c == '_'))
    }

    /// Skip trailing whitespace and report whether the line is exhausted.
    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_errors(text: &str) -> Vec<String> {
        parse_schema_markdown(text).unwrap_err().errors()
    }

    #[test]
    fn parse_struct_with_docs() {
        let types = parse_schema_markdown(
            "# A point\n#\n#  indented\nstruct Point\n    # X coordinate\n    int x\n    optional float(>= 0) y\n",
        )
        .unwrap();
        let point = types["Point"].as_struct().unwrap();
        assert_eq!(point.doc, vec!["A point", "", " indented"]);
        assert_eq!(point.members.len(), 2);
        assert_eq!(point.members[0].doc, vec!["X coordinate"]);
        assert!(!point.members[0].optional);
        assert!(point.members[1].optional);
        assert_eq!(point.members[1].attr.as_ref().unwrap().gte, Some(0.0));
    }

    #[test]
    fn parse_union_and_bases() {
        let types = parse_schema_markdown(
            "union Shape\n    int circle\n\nunion Shape3 (Shape)\n    int sphere\n",
        )
        .unwrap();
        let shape3 = types["Shape3"].as_struct().unwrap();
        assert!(shape3.union);
        assert_eq!(shape3.bases, vec!["Shape"]);
    }

    #[test]
    fn parse_enum_values() {
        let types = parse_schema_markdown("enum Color\n    Red\n    # Green\n    \"Light Blue\"\n").unwrap();
        let color = types["Color"].as_enum().unwrap();
        let names: Vec<&str> = color.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Red", "Light Blue"]);
        assert_eq!(color.values[1].doc, vec!["Green"]);
    }

    #[test]
    fn parse_typedef_containers() {
        let types = parse_schema_markdown(
            "enum Color\n    Red\n\n\
             typedef int(>= 0)[len > 0] Counts\n\
             typedef string(len < 10){} Labels\n\
             typedef Color(nullable) : float(> 0) {len <= 3} Weights\n",
        )
        .unwrap();

        let counts = types["Counts"].as_typedef().unwrap();
        match &counts.ty {
            Type::Array(array) => {
                assert_eq!(array.ty, Type::Builtin(BuiltinType::Int));
                assert_eq!(array.attr.as_ref().unwrap().gte, Some(0.0));
            }
            other => panic!("Expected array, got {other:?}"),
        }
        assert_eq!(counts.attr.as_ref().unwrap().len_gt, Some(0));

        let labels = types["Labels"].as_typedef().unwrap();
        match &labels.ty {
            Type::Dict(dict) => {
                assert_eq!(dict.ty, Type::Builtin(BuiltinType::String));
                assert!(dict.key_type.is_none());
            }
            other => panic!("Expected dict, got {other:?}"),
        }
        assert!(labels.attr.is_none());

        let weights = types["Weights"].as_typedef().unwrap();
        match &weights.ty {
            Type::Dict(dict) => {
                assert_eq!(dict.key_type, Some(Type::User("Color".into())));
                assert!(dict.key_attr.as_ref().unwrap().nullable);
                assert_eq!(dict.attr.as_ref().unwrap().gt, Some(0.0));
            }
            other => panic!("Expected dict, got {other:?}"),
        }
        assert_eq!(weights.attr.as_ref().unwrap().len_lte, Some(3));
    }

    #[test]
    fn parse_action_sections() {
        let types = parse_schema_markdown(
            "group \"Widgets\"\n\n\
             # Get a widget\n\
             action getWidget\n\
             \x20   urls\n\
             \x20       GET /widgets/{id}\n\
             \x20       *\n\
             \x20   path\n\
             \x20       int id\n\
             \x20   query\n\
             \x20       optional bool verbose\n\
             \x20   output\n\
             \x20       string name\n\
             \x20   errors\n\
             \x20       NotFound\n",
        )
        .unwrap();

        let action = types["getWidget"].as_action().unwrap();
        assert_eq!(action.doc, vec!["Get a widget"]);
        assert_eq!(action.doc_group.as_deref(), Some("Widgets"));
        assert_eq!(
            action.urls,
            vec![
                ActionUrl {
                    method: Some("GET".into()),
                    path: Some("/widgets/{id}".into()),
                },
                ActionUrl::default(),
            ]
        );
        assert_eq!(action.path.as_deref(), Some("getWidget_path"));
        assert_eq!(action.query.as_deref(), Some("getWidget_query"));
        assert_eq!(action.input, None);
        assert_eq!(action.errors.as_deref(), Some("getWidget_errors"));
        assert!(types["getWidget_errors"].as_enum().is_some());
        assert!(types["getWidget_output"].doc_group().is_none());
    }

    #[test]
    fn group_is_sticky_until_cleared() {
        let types = parse_schema_markdown(
            "group \"Shapes\"\nstruct A\n    int a\nenum B\n    X\ngroup\ntypedef int C\n",
        )
        .unwrap();
        assert_eq!(types["A"].doc_group(), Some("Shapes"));
        assert_eq!(types["B"].doc_group(), Some("Shapes"));
        assert_eq!(types["C"].doc_group(), None);
    }

    #[test]
    fn line_continuation() {
        let types = parse_schema_markdown("struct Foo\n    int(> 0,\\\n < 10) x\n").unwrap();
        let member = &types["Foo"].as_struct().unwrap().members[0];
        assert_eq!(member.attr.as_ref().unwrap().lt, Some(10.0));
    }

    #[test]
    fn line_continuation_trailing_whitespace() {
        let types = parse_schema_markdown("struct Foo\n    optional \\  \n        float b\n").unwrap();
        let member = &types["Foo"].as_struct().unwrap().members[0];
        assert_eq!(member.name, "b");
        assert!(member.optional);
    }

    #[test]
    fn optional_as_type_name() {
        let types = parse_schema_markdown("struct optional\n    int a\n\nstruct Foo\n    optional bar\n").unwrap();
        let member = &types["Foo"].as_struct().unwrap().members[0];
        assert_eq!(member.name, "bar");
        assert_eq!(member.ty, Type::User("optional".into()));
        assert!(!member.optional);
    }

    #[test]
    fn syntax_errors_are_collected() {
        assert_eq!(
            parse_errors("struct Foo\n    int x y\n\nfoo bar\nstruct Bar\n    int() z\n"),
            vec![
                ":2: error: Syntax error",
                ":4: error: Syntax error",
                ":6: error: Syntax error",
            ]
        );
    }

    #[test]
    fn redefinitions() {
        assert_eq!(
            parse_errors("struct Foo\n    int a\n\nenum Foo\n    A\n\ntypedef int string\n"),
            vec![
                ":4: error: Redefinition of type 'Foo'",
                ":7: error: Redefinition of type 'string'",
            ]
        );
        assert_eq!(
            parse_errors("action Foo\n    input\n        int a\n    input\n        int b\n"),
            vec![":4: error: Redefinition of action input"]
        );
    }

    #[test]
    fn duplicate_url() {
        assert_eq!(
            parse_errors("action Foo\n    urls\n        GET /foo\n        GET /foo\n        *\n        *\n"),
            vec![
                ":4: error: Duplicate URL: GET /foo",
                ":6: error: Duplicate URL: * ",
            ]
        );
    }

    #[test]
    fn unknown_types_attributed_to_members() {
        let mut parser = SchemaMarkdownParser::new();
        parser.parse("a.smd", "struct A\n    B b\n    int a\n");
        parser.parse("b.smd", "struct B\n    C c\n    D d\n");
        let err = parser.finalize().unwrap_err();
        assert_eq!(
            err.errors(),
            vec![
                "b.smd:2: error: Unknown type 'C' from 'B' member 'c'",
                "b.smd:3: error: Unknown type 'D' from 'B' member 'd'",
            ]
        );
    }

    #[test]
    fn action_section_member_conflict() {
        assert_eq!(
            parse_errors("action Foo\n    query\n        int a\n    input\n        int a\n"),
            vec![
                ":3: error: Redefinition of 'Foo_query' member 'a'",
                ":5: error: Redefinition of 'Foo_input' member 'a'",
            ]
        );
    }

    #[test]
    fn sources_share_a_namespace() {
        let types = parse_schema_markdown_sources([
            ("a.smd", "struct A\n    B b\n"),
            ("b.smd", "struct B\n    int x\n"),
        ])
        .unwrap();
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn seeded_parser() {
        let seed = parse_schema_markdown("enum Color\n    Red\n").unwrap();
        let mut parser = SchemaMarkdownParser::with_types(seed);
        parser.parse("", "struct Car\n    Color color\n");
        parser.finalize().unwrap();
        assert!(parser.types().contains_key("Color"));
        assert!(parser.errors().is_empty());
    }
}
