//! Family construction
//!
//! [`FamilyBuilder`] turns a raw, nested sequence-of-sequences value into a
//! [`Family`]. Version numbers come from position alone: the `j`-th outer
//! element is major `j` and the `i`-th element inside it is minor `i`. Any
//! version number carried by the raw value is ignored.
//!
//! Each raw leaf is handed to a [`SchemaCompiler`], the injected strategy that
//! produces the leaf's capabilities (validation plus an optional lens). A
//! failure on any leaf aborts the whole build, so a partially numbered family
//! is never observable.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::FamilyConfig;
use crate::error::{FamilyError, Result};
use crate::family::Family;
use crate::lens::{DeclarativeLens, LensRegistry};
use crate::schema::{Capabilities, Seq, VersionedSchema};
use crate::source;
use crate::validate::{JsonSchemaValidator, SchemaDraft};
use crate::version::SchemaVersion;

/// Default name of the sequence-of-sequences field
pub const DEFAULT_SEQS_FIELD: &str = "seqs";

/// Default keyword holding a declarative lens inside a schema leaf
pub const DEFAULT_LENS_KEYWORD: &str = "x-lens";

/// Turns one raw schema leaf into its capability set
pub trait SchemaCompiler: Send + Sync {
    /// Compile the leaf found at `version`. The error is a human-readable reason.
    fn compile(&self, version: SchemaVersion, raw: &Value) -> std::result::Result<Capabilities, String>;
}

impl<F> SchemaCompiler for F
where
    F: Fn(SchemaVersion, &Value) -> std::result::Result<Capabilities, String> + Send + Sync,
{
    fn compile(&self, version: SchemaVersion, raw: &Value) -> std::result::Result<Capabilities, String> {
        self(version, raw)
    }
}

/// Compiles leaves as JSON Schema, reading a declarative lens from the lens keyword
#[derive(Debug, Clone)]
pub struct JsonSchemaCompiler {
    draft: SchemaDraft,
    lens_keyword: String,
}

impl JsonSchemaCompiler {
    pub fn new(draft: SchemaDraft, lens_keyword: impl Into<String>) -> Self {
        Self {
            draft,
            lens_keyword: lens_keyword.into(),
        }
    }
}

impl Default for JsonSchemaCompiler {
    fn default() -> Self {
        Self::new(SchemaDraft::default(), DEFAULT_LENS_KEYWORD)
    }
}

impl SchemaCompiler for JsonSchemaCompiler {
    fn compile(&self, _version: SchemaVersion, raw: &Value) -> std::result::Result<Capabilities, String> {
        if !(raw.is_object() || raw.is_boolean()) {
            return Err(format!("expected a schema object, found {}", raw));
        }

        let validator = JsonSchemaValidator::compile(raw, self.draft)?;
        let mut capabilities = Capabilities::new(validator);

        if let Some(declared) = raw.get(&self.lens_keyword) {
            let lens = DeclarativeLens::from_value(declared)
                .map_err(|e| format!("invalid '{}' lens: {}", self.lens_keyword, e))?;
            capabilities = capabilities.with_lens(lens);
        }

        Ok(capabilities)
    }
}

/// Builds a validated [`Family`] from raw nested values
#[derive(Clone)]
pub struct FamilyBuilder {
    compiler: Arc<dyn SchemaCompiler>,
    lenses: LensRegistry,
    seqs_field: String,
    family_field: String,
    enforce_minor_compatibility: bool,
    warn_on_default_backfill: bool,
}

impl Default for FamilyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FamilyBuilder {
    /// Builder with the JSON Schema compiler and default field names
    pub fn new() -> Self {
        Self {
            compiler: Arc::new(JsonSchemaCompiler::default()),
            lenses: LensRegistry::new(),
            seqs_field: DEFAULT_SEQS_FIELD.to_string(),
            family_field: source::DEFAULT_FAMILY_FIELD.to_string(),
            enforce_minor_compatibility: false,
            warn_on_default_backfill: true,
        }
    }

    /// Builder configured from a [`FamilyConfig`]
    pub fn from_config(config: &FamilyConfig) -> Self {
        Self {
            compiler: Arc::new(JsonSchemaCompiler::new(
                config.validation.draft,
                config.validation.lens_keyword.clone(),
            )),
            lenses: LensRegistry::new(),
            seqs_field: config.family.seqs_field.clone(),
            family_field: config.family.family_field.clone(),
            enforce_minor_compatibility: config.compatibility.enforce_minor_compatibility,
            warn_on_default_backfill: config.compatibility.warn_on_default_backfill,
        }
    }

    /// Replace the strategy that compiles raw leaves
    pub fn with_compiler(mut self, compiler: impl SchemaCompiler + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Rust-authored lenses; these replace any lens the compiler produced
    pub fn with_lenses(mut self, lenses: LensRegistry) -> Self {
        self.lenses = lenses;
        self
    }

    pub fn seqs_field(mut self, field: impl Into<String>) -> Self {
        self.seqs_field = field.into();
        self
    }

    pub fn family_field(mut self, field: impl Into<String>) -> Self {
        self.family_field = field.into();
        self
    }

    /// Fail the build when a minor bump contains a breaking change
    pub fn enforce_minor_compatibility(mut self, enforce: bool) -> Self {
        self.enforce_minor_compatibility = enforce;
        self
    }

    pub fn warn_on_default_backfill(mut self, warn: bool) -> Self {
        self.warn_on_default_backfill = warn;
        self
    }

    /// Build a family from its root value
    pub fn build(&self, root: &Value) -> Result<Family> {
        let outer = root
            .get(&self.seqs_field)
            .ok_or_else(|| FamilyError::MalformedFamily {
                reason: format!("'{}' field has to exist in the family definition", self.seqs_field),
            })?
            .as_array()
            .ok_or_else(|| FamilyError::MalformedFamily {
                reason: format!("'{}' must be a list of lists", self.seqs_field),
            })?;

        let mut seqs = Vec::with_capacity(outer.len());
        for (major, inner) in outer.iter().enumerate() {
            let leaves = inner.as_array().ok_or_else(|| FamilyError::MalformedFamily {
                reason: format!("major version {} is not a list of schemas", major),
            })?;

            let mut schemas = Vec::with_capacity(leaves.len());
            for (minor, leaf) in leaves.iter().enumerate() {
                schemas.push(self.build_schema(SchemaVersion::new(major, minor), leaf)?);
            }
            seqs.push(Seq::new(major, schemas));
        }

        let family = Family::new(seqs);
        self.report_orphan_lenses(&family);
        self.check_compatibility(&family)?;

        info!(
            majors = family.len(),
            schemas = family.schema_count(),
            "built schema family"
        );
        Ok(family)
    }

    /// Locate the family value inside a larger document, then build it
    pub fn build_document(&self, document: &Value) -> Result<Family> {
        let root = source::find_family(document, &self.family_field).ok_or_else(|| {
            FamilyError::MalformedFamily {
                reason: format!("document has no '{}' field", self.family_field),
            }
        })?;
        self.build(root)
    }

    fn build_schema(&self, version: SchemaVersion, leaf: &Value) -> Result<VersionedSchema> {
        let mut capabilities = self
            .compiler
            .compile(version, leaf)
            .map_err(|reason| FamilyError::SchemaConstruction {
                major: version.major,
                minor: version.minor,
                reason,
            })?;

        if let Some(lens) = self.lenses.get(version) {
            capabilities.lens = Some(lens);
        }

        debug!(%version, has_lens = capabilities.lens.is_some(), "compiled schema");
        Ok(VersionedSchema::new(version, leaf.clone(), capabilities))
    }

    fn report_orphan_lenses(&self, family: &Family) {
        for version in self.lenses.versions() {
            if family.get(version).is_err() {
                warn!(%version, "lens registered for a version the family does not define");
            }
        }
    }

    fn check_compatibility(&self, family: &Family) -> Result<()> {
        if !self.enforce_minor_compatibility && !self.warn_on_default_backfill {
            return Ok(());
        }

        let report = family.check_compatibility();

        if self.warn_on_default_backfill {
            for (step, change) in report.backfills() {
                warn!(
                    from = %step.from,
                    to = %step.to,
                    path = %change.path,
                    "required field is backfilled with a default; prior variations of it will be overwritten"
                );
            }
            for schema in family.schemas() {
                for path in schema.backfilled_paths() {
                    warn!(
                        version = %schema.version(),
                        %path,
                        "lens writes a default; prior variations of this field will be overwritten"
                    );
                }
            }
        }

        if self.enforce_minor_compatibility {
            if let Some(step) = report.violations().next() {
                let summary = if step.result.is_compatible {
                    format!(
                        "{} backfills required fields with defaults but has no lens",
                        step.to
                    )
                } else {
                    step.result.summary.clone()
                };
                return Err(FamilyError::IncompatibleMinor {
                    version: step.to,
                    summary,
                });
            }
        }
        Ok(())
    }
}
