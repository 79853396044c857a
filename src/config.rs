//! Configuration management for schema families
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-family.toml)
//! - Environment variables (`SCHEMA_FAMILY__SECTION__KEY`, e.g. `SCHEMA_FAMILY__VALIDATION__DRAFT`)
//!
//! ## Example config file (schema-family.toml):
//! ```toml
//! [family]
//! family_field = "dashboardFamily"
//! seqs_field = "seqs"
//!
//! [validation]
//! draft = "draft7"
//! lens_keyword = "x-lens"
//!
//! [compatibility]
//! enforce_minor_compatibility = true
//! warn_on_default_backfill = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::builder::{DEFAULT_LENS_KEYWORD, DEFAULT_SEQS_FIELD};
use crate::source::DEFAULT_FAMILY_FIELD;
use crate::validate::SchemaDraft;

/// Main configuration for building schema families
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Where the family lives in raw documents
    #[serde(default)]
    pub family: FamilySection,

    /// How leaves are compiled
    #[serde(default)]
    pub validation: ValidationSection,

    /// Compatibility rules between consecutive versions
    #[serde(default)]
    pub compatibility: CompatibilitySection,
}

/// Field names in raw family documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySection {
    /// Field of a document that holds the family value
    #[serde(default = "default_family_field")]
    pub family_field: String,

    /// Field of the family value that holds the sequence of sequences
    #[serde(default = "default_seqs_field")]
    pub seqs_field: String,
}

/// Leaf compilation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSection {
    /// JSON Schema draft for every leaf
    #[serde(default)]
    pub draft: SchemaDraft,

    /// Keyword inside a leaf that declares its lens
    #[serde(default = "default_lens_keyword")]
    pub lens_keyword: String,
}

/// Compatibility settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilitySection {
    /// Fail the build when a minor bump breaks compatibility
    #[serde(default)]
    pub enforce_minor_compatibility: bool,

    /// Log a warning for every required field backfilled with a default
    #[serde(default = "default_true")]
    pub warn_on_default_backfill: bool,
}

/// Environment layer: SCHEMA_FAMILY__VALIDATION__DRAFT=draft4 and so on
fn environment() -> Environment {
    Environment::with_prefix("SCHEMA_FAMILY")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

// Default value functions
fn default_family_field() -> String {
    DEFAULT_FAMILY_FIELD.to_string()
}

fn default_seqs_field() -> String {
    DEFAULT_SEQS_FIELD.to_string()
}

fn default_lens_keyword() -> String {
    DEFAULT_LENS_KEYWORD.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FamilySection {
    fn default() -> Self {
        Self {
            family_field: default_family_field(),
            seqs_field: default_seqs_field(),
        }
    }
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            draft: SchemaDraft::default(),
            lens_keyword: default_lens_keyword(),
        }
    }
}

impl Default for CompatibilitySection {
    fn default() -> Self {
        Self {
            enforce_minor_compatibility: false,
            warn_on_default_backfill: true,
        }
    }
}

impl FamilyConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_layers(config_path, environment())
    }

    fn load_layers(config_path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-family.toml",
            ".schema-family.toml",
            "config/schema-family.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("dev", "schema-family", "schema-family") {
            let xdg_config = dirs.config_dir().join("schema-family.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.add_source(env).build()?.try_deserialize()
    }

    /// Parse configuration from a TOML string, without consulting other sources
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FamilyConfig::default();
        assert_eq!(config.family.seqs_field, "seqs");
        assert_eq!(config.family.family_field, "dashboardFamily");
        assert_eq!(config.validation.draft, SchemaDraft::Draft7);
        assert!(!config.compatibility.enforce_minor_compatibility);
        assert!(config.compatibility.warn_on_default_backfill);
    }

    #[test]
    fn test_serialize_config() {
        let config = FamilyConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[family]"));
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("draft = \"draft7\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FamilyConfig::from_toml_str(
            r#"
            [validation]
            draft = "draft4"

            [compatibility]
            enforce_minor_compatibility = true
            "#,
        )
        .unwrap();
        assert_eq!(config.validation.draft, SchemaDraft::Draft4);
        assert_eq!(config.validation.lens_keyword, "x-lens");
        assert!(config.compatibility.enforce_minor_compatibility);
        assert!(config.compatibility.warn_on_default_backfill);
        assert_eq!(config.family.seqs_field, "seqs");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("family.toml");

        let mut config = FamilyConfig::default();
        config.family.seqs_field = "versions".to_string();
        config.validation.draft = SchemaDraft::Draft6;
        config.save(&path).unwrap();

        let loaded = FamilyConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.family.seqs_field, "versions");
        assert_eq!(loaded.validation.draft, SchemaDraft::Draft6);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("family.toml");

        let mut config = FamilyConfig::default();
        config.family.seqs_field = "versions".to_string();
        config.validation.draft = SchemaDraft::Draft6;
        config.save(&path).unwrap();

        let mut vars = config_crate::Map::new();
        vars.insert("SCHEMA_FAMILY__VALIDATION__DRAFT".to_string(), "draft4".to_string());
        vars.insert(
            "SCHEMA_FAMILY__COMPATIBILITY__ENFORCE_MINOR_COMPATIBILITY".to_string(),
            "true".to_string(),
        );
        vars.insert("OTHER__VALIDATION__DRAFT".to_string(), "draft7".to_string());

        let loaded = FamilyConfig::load_layers(Some(&path), environment().source(Some(vars))).unwrap();
        assert_eq!(loaded.validation.draft, SchemaDraft::Draft4);
        assert!(loaded.compatibility.enforce_minor_compatibility);
        assert_eq!(loaded.family.seqs_field, "versions");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FamilyConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
