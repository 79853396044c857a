//! Artifact validation
//!
//! A [`Validate`] implementation is the validation capability bound to a
//! single versioned schema. Validation never mutates the artifact and reports
//! every violated constraint, not just pass/fail.

use std::fmt;

use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::SchemaVersion;

/// A single violated constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the artifact (e.g. `/panels/0/title`)
    pub instance_path: String,
    /// JSON pointer into the schema to the failing keyword
    pub schema_path: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = if self.instance_path.is_empty() { "/" } else { &self.instance_path };
        write!(f, "{} at {} (schema {})", self.message, at, self.schema_path)
    }
}

/// An artifact failed validation against a versioned schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Artifact is not valid against {version}: {}", summarize(.violations))]
pub struct ValidationError {
    pub version: SchemaVersion,
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validation capability over artifacts of the family's document type
pub trait Validate: Send + Sync {
    /// Check an artifact, returning every violation on failure
    fn validate(&self, artifact: &serde_json::Value) -> Result<(), Vec<Violation>>;
}

/// JSON Schema draft used to compile leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaDraft {
    Draft4,
    Draft6,
    #[default]
    Draft7,
}

impl From<SchemaDraft> for Draft {
    fn from(draft: SchemaDraft) -> Self {
        match draft {
            SchemaDraft::Draft4 => Draft::Draft4,
            SchemaDraft::Draft6 => Draft::Draft6,
            SchemaDraft::Draft7 => Draft::Draft7,
        }
    }
}

/// Validator backed by a compiled JSON Schema
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    /// Compile a raw schema value. The error is the compiler's message.
    pub fn compile(schema: &serde_json::Value, draft: SchemaDraft) -> Result<Self, String> {
        let compiled = JSONSchema::options()
            .with_draft(draft.into())
            .compile(schema)
            .map_err(|e| format!("{} (at schema path {})", e, e.schema_path))?;
        Ok(Self { compiled })
    }
}

impl Validate for JsonSchemaValidator {
    fn validate(&self, artifact: &serde_json::Value) -> Result<(), Vec<Violation>> {
        match self.compiled.validate(artifact) {
            Ok(()) => Ok(()),
            Err(errors) => Err(errors
                .map(|e| Violation {
                    instance_path: e.instance_path.to_string(),
                    schema_path: e.schema_path.to_string(),
                    message: e.to_string(),
                })
                .collect()),
        }
    }
}
