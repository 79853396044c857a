//! Schema Families
//!
//! A versioned family of schemas for a single evolving document type (for
//! example a dashboard definition), with validation at any version and
//! forward migration between versions.
//!
//! ## Features
//!
//! - **Positional Versioning**: major and minor numbers come from position, so
//!   gaps and duplicates cannot exist
//! - **Pluggable Compilation**: leaves become capabilities through an injected
//!   [`SchemaCompiler`]; JSON Schema is the default
//! - **Lenses**: forward-only, one step at a time, failing closed on a missing step
//! - **Compatibility Checking**: breaking minor bumps and default backfills are detected
//!
//! ## Layout
//!
//! ```text
//! {
//!   "seqs": [
//!     [ schema v0.0, schema v0.1 ],          <- major 0
//!     [ schema v1.0, schema v1.1, ... ]      <- major 1
//!   ]
//! }
//! ```
//!
//! ## Example
//!
//! ```
//! use schema_family::FamilyBuilder;
//! use serde_json::json;
//!
//! let family = FamilyBuilder::new().build(&json!({
//!     "seqs": [[
//!         {"type": "object", "properties": {"name": {"type": "string"}}},
//!         {
//!             "type": "object",
//!             "required": ["title"],
//!             "properties": {"title": {"type": "string"}},
//!             "x-lens": [{"op": "rename", "from": "/name", "to": "/title"}]
//!         }
//!     ]]
//! }))?;
//!
//! let migrated = family.migrate_to_latest(&json!({"name": "ops"}), (0, 0))?;
//! assert_eq!(migrated, json!({"title": "ops"}));
//! family.validate_latest(&migrated)?;
//! # Ok::<(), schema_family::FamilyError>(())
//! ```

pub mod builder;
pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod family;
pub mod lens;
pub mod schema;
pub mod source;
pub mod validate;
pub mod version;

pub use builder::{FamilyBuilder, JsonSchemaCompiler, SchemaCompiler};
pub use checksum::Checksum;
pub use compatibility::{CompatibilityChecker, CompatibilityReport, CompatibilityResult};
pub use config::FamilyConfig;
pub use error::{FamilyError, Result};
pub use family::Family;
pub use lens::{DeclarativeLens, Lens, LensError, LensOp, LensRegistry};
pub use schema::{Capabilities, Seq, VersionedSchema};
pub use validate::{SchemaDraft, Validate, ValidationError, Violation};
pub use version::SchemaVersion;
