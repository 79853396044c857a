//! Versioned schemas and major-version sequences

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::{FamilyError, Result};
use crate::lens::{Lens, LensError};
use crate::validate::{Validate, ValidationError};
use crate::version::SchemaVersion;

/// Capability set produced for one raw schema leaf
#[derive(Clone)]
pub struct Capabilities {
    /// Validates artifacts against this schema
    pub validator: Arc<dyn Validate>,
    /// Migrates artifacts from the previous version to this one
    pub lens: Option<Arc<dyn Lens>>,
}

impl Capabilities {
    pub fn new(validator: impl Validate + 'static) -> Self {
        Self {
            validator: Arc::new(validator),
            lens: None,
        }
    }

    pub fn with_lens(mut self, lens: impl Lens + 'static) -> Self {
        self.lens = Some(Arc::new(lens));
        self
    }
}

/// One schema at a specific `(major, minor)` coordinate
#[derive(Clone)]
pub struct VersionedSchema {
    version: SchemaVersion,
    raw: Value,
    checksum: Checksum,
    validator: Arc<dyn Validate>,
    lens: Option<Arc<dyn Lens>>,
}

impl VersionedSchema {
    pub(crate) fn new(version: SchemaVersion, raw: Value, capabilities: Capabilities) -> Self {
        let checksum = Checksum::from_json(&raw);
        Self {
            version,
            raw,
            checksum,
            validator: capabilities.validator,
            lens: capabilities.lens,
        }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn major(&self) -> usize {
        self.version.major
    }

    pub fn minor(&self) -> usize {
        self.version.minor
    }

    /// The raw schema value this schema was built from
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Checksum of the raw schema value
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Whether a lens from the previous version is wired
    pub fn has_lens(&self) -> bool {
        self.lens.is_some()
    }

    /// Validate an artifact against this schema
    pub fn validate(&self, artifact: &Value) -> std::result::Result<(), ValidationError> {
        self.validator
            .validate(artifact)
            .map_err(|violations| ValidationError {
                version: self.version,
                violations,
            })
    }

    /// Whether an artifact is valid against this schema
    pub fn is_valid(&self, artifact: &Value) -> bool {
        self.validate(artifact).is_ok()
    }

    /// Migrate an artifact valid at the previous version to this version.
    ///
    /// Returns `None` when no lens is wired for this version.
    pub fn migrate_from_previous(&self, artifact: &Value) -> Option<std::result::Result<Value, LensError>> {
        self.lens.as_ref().map(|lens| lens.forward(artifact))
    }

    /// Pointers the wired lens backfills with a default
    pub fn backfilled_paths(&self) -> Vec<String> {
        self.lens.as_ref().map(|lens| lens.backfilled_paths()).unwrap_or_default()
    }

    pub(crate) fn lens(&self) -> Option<&Arc<dyn Lens>> {
        self.lens.as_ref()
    }
}

impl fmt::Debug for VersionedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedSchema")
            .field("version", &self.version)
            .field("checksum", &self.checksum)
            .field("has_lens", &self.has_lens())
            .finish()
    }
}

/// All minor versions sharing one major version; index is the minor number
#[derive(Debug, Clone)]
pub struct Seq {
    major: usize,
    schemas: Vec<VersionedSchema>,
}

impl Seq {
    pub(crate) fn new(major: usize, schemas: Vec<VersionedSchema>) -> Self {
        Self { major, schemas }
    }

    pub fn major(&self) -> usize {
        self.major
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Schema at a minor version within this sequence
    pub fn get(&self, minor: usize) -> Option<&VersionedSchema> {
        self.schemas.get(minor)
    }

    /// Last minor version of this sequence
    pub fn latest(&self) -> Result<&VersionedSchema> {
        self.schemas
            .last()
            .ok_or(FamilyError::EmptySeq { major: self.major })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VersionedSchema> {
        self.schemas.iter()
    }
}

impl<'a> IntoIterator for &'a Seq {
    type Item = &'a VersionedSchema;
    type IntoIter = std::slice::Iter<'a, VersionedSchema>;

    fn into_iter(self) -> Self::IntoIter {
        self.schemas.iter()
    }
}
