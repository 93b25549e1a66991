use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod compile;
mod config;

#[derive(Parser)]
#[command(name = "schema-markdown", version, about = "Schema Markdown compiler and schema validator")]
struct Cli {
    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile Schema Markdown files into a type model JSON document
    Compile {
        /// Schema files or directories (default: configured schemas, then stdin)
        schemas: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Type model title
        #[arg(short, long)]
        title: Option<String>,

        /// Write JSON without indentation
        #[arg(long)]
        compact: bool,
    },

    /// Validate JSON documents against a schema type
    Validate {
        /// Schema files or directories (default: configured schemas)
        #[arg(short, long = "schema")]
        schemas: Vec<String>,

        /// The type to validate against
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// JSON files to validate (default: stdin)
        files: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(Path::new("."))?;

    let ok = match cli.command {
        Commands::Compile {
            schemas,
            output,
            title,
            compact,
        } => {
            let schemas = if schemas.is_empty() { config.schemas.clone() } else { schemas };
            let opts = compile::CompileOpts {
                title: title.as_deref().unwrap_or(&config.title),
                compact: compact || config.compact,
                output: output.as_deref(),
                extension: &config.extension,
                quiet: cli.quiet,
            };
            compile::handle_compile(&schemas, &opts)?
        }
        Commands::Validate {
            schemas,
            type_name,
            files,
        } => {
            let schemas = if schemas.is_empty() { config.schemas.clone() } else { schemas };
            if schemas.is_empty() {
                anyhow::bail!("No schema given (use --schema or configure \"schemas\")");
            }
            handle_validate(&schemas, &type_name, &files, &config.extension, cli.quiet)?
        }
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

fn handle_validate(schemas: &[String], type_name: &str, files: &[String], extension: &str, quiet: bool) -> Result<bool> {
    let sources = compile::load_sources(schemas, extension)?;
    let types = match compile::parse_sources(&sources) {
        Ok(types) => types,
        Err(err) => {
            compile::print_parser_errors(&err);
            return Ok(false);
        }
    };

    let documents = if files.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read JSON from stdin")?;
        vec![(compile::STDIN_SOURCE.to_string(), text)]
    } else {
        files
            .iter()
            .map(|file| {
                std::fs::read_to_string(file)
                    .with_context(|| format!("Failed to read '{file}'"))
                    .map(|text| (file.clone(), text))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut has_errors = false;
    for (file, text) in &documents {
        let result = serde_json::from_str::<serde_json::Value>(text)
            .map_err(|e| e.to_string())
            .and_then(|value| schema_markdown::validate_type(&types, type_name, &value).map_err(|e| e.to_string()));

        match result {
            Ok(_) => {
                if !quiet {
                    println!("{}: {}", file, "OK".green());
                }
            }
            Err(message) => {
                has_errors = true;
                eprintln!("{}: {}: {}", file, "error".red().bold(), message);
            }
        }
    }

    Ok(!has_errors)
}
