//! `schema-markdown compile`: compile Schema Markdown files into a type model.
//!
//! Schema arguments may be files or directories; directories are walked
//! recursively for files with the configured extension. All sources share
//! one namespace and are checked together.

use anyhow::{Context, Result};
use colored::Colorize;
use schema_markdown::{ParserError, TypeModel, Types};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// Source name used for schema text read from stdin.
pub const STDIN_SOURCE: &str = "<stdin>";

/// Options passed from CLI to the compiler.
pub struct CompileOpts<'a> {
    pub title: &'a str,
    pub compact: bool,
    pub output: Option<&'a str>,
    pub extension: &'a str,
    pub quiet: bool,
}

/// Read the Schema Markdown sources named by `paths`, as `(source, text)`
/// pairs in load order. Reads stdin when `paths` is empty.
pub fn load_sources(paths: &[String], extension: &str) -> Result<Vec<(String, String)>> {
    let mut sources = Vec::new();

    if paths.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read schema from stdin")?;
        sources.push((STDIN_SOURCE.to_string(), text));
        return Ok(sources);
    }

    for path in paths {
        if Path::new(path).is_dir() {
            for entry in WalkDir::new(path).min_depth(1).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk '{path}'"))?;
                let is_schema = entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(extension);
                if is_schema {
                    let source = entry.path().display().to_string();
                    sources.push((source.clone(), read_source(&source)?));
                }
            }
        } else {
            sources.push((path.clone(), read_source(path)?));
        }
    }

    tracing::debug!(count = sources.len(), "loaded schema sources");
    Ok(sources)
}

fn read_source(path: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{path}'"))
}

/// Parse schema sources into one type model.
pub fn parse_sources(sources: &[(String, String)]) -> Result<Types, ParserError> {
    schema_markdown::parse_schema_markdown_sources(
        sources.iter().map(|(source, text)| (source.as_str(), text.as_str())),
    )
}

/// Print parser errors to stderr, one per line.
pub fn print_parser_errors(err: &ParserError) {
    for diag in &err.diagnostics {
        eprintln!("{}:{}: {}: {}", diag.source, diag.line, "error".red().bold(), diag.message);
    }
}

/// Serialize a type model as JSON with object keys sorted.
pub fn type_model_json(model: &TypeModel, compact: bool) -> Result<String> {
    let value = sort_keys(serde_json::to_value(model)?);
    if compact {
        return Ok(serde_json::to_string(&value)?);
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = fields.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, field)| (key, sort_keys(field)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Compile the schemas named by `paths`. Returns `false` when the schemas
/// have errors, after printing them.
pub fn handle_compile(paths: &[String], opts: &CompileOpts<'_>) -> Result<bool> {
    let sources = load_sources(paths, opts.extension)?;
    let types = match parse_sources(&sources) {
        Ok(types) => types,
        Err(err) => {
            print_parser_errors(&err);
            return Ok(false);
        }
    };

    let model = TypeModel {
        title: opts.title.to_string(),
        types,
    };
    let mut json = type_model_json(&model, opts.compact)?;
    json.push('\n');

    match opts.output {
        Some(output) => {
            std::fs::write(output, &json).with_context(|| format!("Failed to write '{output}'"))?;
            if !opts.quiet {
                eprintln!(
                    "{} {} ({} types)",
                    "Compiled".green().bold(),
                    output,
                    model.types.len()
                );
            }
        }
        None => print!("{json}"),
    }

    Ok(true)
}
