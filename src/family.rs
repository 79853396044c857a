//! Schema families
//!
//! A [`Family`] is the ordered set of every schema version for one document
//! type. Index `j` of the family is major version `j`; index `i` of each
//! [`Seq`] is minor version `i`. The family is immutable once built, so it can
//! be shared across threads and queried without locking.

use serde_json::Value;
use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::compatibility::{CompatibilityChecker, CompatibilityReport, StepReport};
use crate::error::{FamilyError, Result};
use crate::schema::{Seq, VersionedSchema};
use crate::version::SchemaVersion;

/// The full ordered set of schema versions for one document type
#[derive(Debug, Clone, Default)]
pub struct Family {
    seqs: Vec<Seq>,
}

impl Family {
    pub(crate) fn new(seqs: Vec<Seq>) -> Self {
        Self { seqs }
    }

    /// Number of major versions
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    /// True when no major version is defined yet
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Total number of schemas across all major versions
    pub fn schema_count(&self) -> usize {
        self.seqs.iter().map(Seq::len).sum()
    }

    pub fn seqs(&self) -> &[Seq] {
        &self.seqs
    }

    pub fn seq(&self, major: usize) -> Option<&Seq> {
        self.seqs.get(major)
    }

    /// Schema at `(major, minor)`
    pub fn at(&self, major: usize, minor: usize) -> Result<&VersionedSchema> {
        self.seqs
            .get(major)
            .and_then(|seq| seq.get(minor))
            .ok_or(FamilyError::NotFound { major, minor })
    }

    /// Schema at a version coordinate
    pub fn get(&self, version: impl Into<SchemaVersion>) -> Result<&VersionedSchema> {
        let version = version.into();
        self.at(version.major, version.minor)
    }

    /// Last minor version of the last major version
    pub fn latest(&self) -> Result<&VersionedSchema> {
        self.seqs.last().ok_or(FamilyError::EmptyFamily)?.latest()
    }

    /// Last minor version of a given major version
    pub fn latest_in(&self, major: usize) -> Result<&VersionedSchema> {
        self.seqs
            .get(major)
            .ok_or(FamilyError::NotFound { major, minor: 0 })?
            .latest()
    }

    /// Every schema in version order
    pub fn schemas(&self) -> impl Iterator<Item = &VersionedSchema> {
        self.seqs.iter().flat_map(Seq::iter)
    }

    /// Every version coordinate in version order
    pub fn versions(&self) -> impl Iterator<Item = SchemaVersion> + '_ {
        self.schemas().map(VersionedSchema::version)
    }

    /// The version immediately after `version`: the next minor in the same
    /// major, else minor 0 of the next non-empty major. `None` for the latest
    /// version and for versions the family does not contain.
    pub fn successor(&self, version: SchemaVersion) -> Option<SchemaVersion> {
        let seq = self.seqs.get(version.major)?;
        seq.get(version.minor)?;
        let next_minor = version.minor.checked_add(1)?;
        if seq.get(next_minor).is_some() {
            return Some(SchemaVersion::new(version.major, next_minor));
        }
        self.seqs
            .iter()
            .skip(version.major.saturating_add(1))
            .find(|seq| !seq.is_empty())
            .map(|seq| SchemaVersion::new(seq.major(), 0))
    }

    /// Validate an artifact against the schema at `version`
    pub fn validate_at(&self, artifact: &Value, version: impl Into<SchemaVersion>) -> Result<()> {
        self.get(version)?.validate(artifact)?;
        Ok(())
    }

    /// Validate an artifact against the latest schema
    pub fn validate_latest(&self, artifact: &Value) -> Result<()> {
        self.latest()?.validate(artifact)?;
        Ok(())
    }

    /// Schemas whose lenses carry an artifact from `from` to `to`, in order.
    ///
    /// Fails on the first step that has no lens; nothing is applied.
    pub fn migration_path(
        &self,
        from: impl Into<SchemaVersion>,
        to: impl Into<SchemaVersion>,
    ) -> Result<Vec<&VersionedSchema>> {
        let (from, to) = (from.into(), to.into());
        if to < from {
            return Err(FamilyError::InvalidMigrationDirection { from, to });
        }
        self.get(from)?;
        self.get(to)?;

        let mut path = Vec::new();
        let mut current = from;
        while current < to {
            let next = self
                .successor(current)
                .ok_or_else(|| FamilyError::not_found(to))?;
            let schema = self.get(next)?;
            if !schema.has_lens() {
                return Err(FamilyError::NoMigrationPath {
                    major: next.major,
                    minor: next.minor,
                });
            }
            path.push(schema);
            current = next;
        }
        Ok(path)
    }

    /// Migrate an artifact forward from `from` to `to`, one lens at a time.
    ///
    /// The input is never modified; on error no partial result is returned.
    pub fn migrate(
        &self,
        artifact: &Value,
        from: impl Into<SchemaVersion>,
        to: impl Into<SchemaVersion>,
    ) -> Result<Value> {
        let (from, to) = (from.into(), to.into());
        let path = self.migration_path(from, to)?;
        info!(%from, %to, steps = path.len(), "migrating artifact");

        let mut current = artifact.clone();
        for schema in path {
            let Some(lens) = schema.lens() else {
                return Err(FamilyError::NoMigrationPath {
                    major: schema.major(),
                    minor: schema.minor(),
                });
            };
            debug!(version = %schema.version(), "applying lens");
            current = lens.forward(&current).map_err(|source| FamilyError::Lens {
                version: schema.version(),
                source,
            })?;
        }
        Ok(current)
    }

    /// Migrate an artifact from `from` to the latest version
    pub fn migrate_to_latest(&self, artifact: &Value, from: impl Into<SchemaVersion>) -> Result<Value> {
        let latest = self.latest()?.version();
        self.migrate(artifact, from, latest)
    }

    /// Validate at `from`, migrate, then validate the result at `to`
    pub fn migrate_checked(
        &self,
        artifact: &Value,
        from: impl Into<SchemaVersion>,
        to: impl Into<SchemaVersion>,
    ) -> Result<Value> {
        let (from, to) = (from.into(), to.into());
        if to < from {
            return Err(FamilyError::InvalidMigrationDirection { from, to });
        }
        self.validate_at(artifact, from)?;
        let migrated = self.migrate(artifact, from, to)?;
        self.validate_at(&migrated, to)?;
        Ok(migrated)
    }

    /// Compare every consecutive pair of schemas
    pub fn check_compatibility(&self) -> CompatibilityReport {
        self.check_compatibility_with(&CompatibilityChecker::new())
    }

    /// Compare every consecutive pair of schemas with a configured checker
    pub fn check_compatibility_with(&self, checker: &CompatibilityChecker) -> CompatibilityReport {
        let schemas: Vec<&VersionedSchema> = self.schemas().collect();
        let steps = schemas
            .windows(2)
            .map(|pair| {
                let (old, new) = (pair[0], pair[1]);
                StepReport {
                    from: old.version(),
                    to: new.version(),
                    major_bump: new.version().is_major_bump_from(&old.version()),
                    has_lens: new.has_lens(),
                    result: checker.check(old.raw(), new.raw()),
                }
            })
            .collect();
        CompatibilityReport { steps }
    }

    /// Checksum over every coordinate and schema checksum, in version order
    pub fn fingerprint(&self) -> Checksum {
        let shape: Vec<String> = self.seqs.iter().map(|seq| seq.len().to_string()).collect();
        let shape = Checksum::from_bytes(shape.join(",").as_bytes());
        let parts = std::iter::once(("shape".to_string(), &shape))
            .chain(self.schemas().map(|s| (s.version().to_string(), s.checksum())));
        Checksum::combine(parts)
    }
}
