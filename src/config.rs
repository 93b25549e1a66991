use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Name of the optional configuration file read from the working directory.
pub const CONFIG_FILE: &str = "schema-markdown.json";

/// Top-level schema-markdown.json schema.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfig {
    /// Schema files or directories used when none are given on the command line.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Compiled type model title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Write compiled type models without indentation.
    #[serde(default)]
    pub compact: bool,

    /// Extension of schema files found when walking directories.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            schemas: Vec::new(),
            title: default_title(),
            compact: false,
            extension: default_extension(),
        }
    }
}

fn default_title() -> String {
    "Index".to_string()
}

fn default_extension() -> String {
    ".smd".to_string()
}

/// Load config from a schema-markdown.json file, or return defaults if missing.
pub fn load_config(dir: &Path) -> Result<SchemaConfig> {
    let config_path = dir.join(CONFIG_FILE);

    if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: SchemaConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        Ok(SchemaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "schemas": ["schema", "common.smd"],
            "title": "Widget API",
            "compact": true,
            "extension": ".mds"
        }"#;

        let config: SchemaConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.schemas, vec!["schema", "common.smd"]);
        assert_eq!(config.title, "Widget API");
        assert!(config.compact);
        assert_eq!(config.extension, ".mds");
    }

    #[test]
    fn test_defaults() {
        let config: SchemaConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SchemaConfig::default());
        assert_eq!(config.title, "Index");
        assert_eq!(config.extension, ".smd");
    }

    #[test]
    fn test_missing_file() {
        let dir = std::env::temp_dir().join("schema-markdown-config-missing");
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(load_config(&dir).unwrap(), SchemaConfig::default());
    }

    #[test]
    fn test_invalid_file() {
        let dir = std::env::temp_dir().join("schema-markdown-config-invalid");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), "{ \"compact\": \"yes\" }").unwrap();
        let err = load_config(&dir).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"), "{err}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
