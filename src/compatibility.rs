//! Schema compatibility checking
//!
//! Compares consecutive schemas in a family. Minor bumps must stay backward
//! compatible; major bumps may break, but then need a lens.
//!
//! Steps that make a field required while giving it a default are reported as
//! [`ChangeType::DefaultBackfill`]. A schema default is only an annotation, so
//! old artifacts fail the new schema until a lens writes the value; such a step
//! needs a lens even as a minor bump. Any artifact that expressed the same
//! intent under a different name or shape will be silently filled with the
//! default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::version::SchemaVersion;

/// Result of comparing two schemas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Whether the step has no breaking structural change. Backfilled fields
    /// are not breaking here but still need a lens, see [`StepReport::needs_lens`].
    pub is_compatible: bool,
    /// List of changes detected
    pub changes: Vec<SchemaChange>,
    /// Summary of the compatibility check
    pub summary: String,
}

impl CompatibilityResult {
    fn from_changes(changes: Vec<SchemaChange>, strict: bool) -> Self {
        let breaking = changes.iter().filter(|c| c.is_breaking).count();
        if strict && !changes.is_empty() {
            Self {
                is_compatible: false,
                summary: format!("Strict mode: {} changes detected", changes.len()),
                changes,
            }
        } else if breaking > 0 {
            Self {
                is_compatible: false,
                summary: format!("{} breaking changes detected", breaking),
                changes,
            }
        } else {
            let summary = if changes.is_empty() {
                "No changes detected".to_string()
            } else {
                format!("{} compatible changes detected", changes.len())
            };
            Self {
                is_compatible: true,
                changes,
                summary,
            }
        }
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.is_breaking)
    }

    pub fn backfills(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes
            .iter()
            .filter(|c| c.change_type == ChangeType::DefaultBackfill)
    }

    pub fn has_backfills(&self) -> bool {
        self.backfills().next().is_some()
    }
}

/// A detected change between schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub change_type: ChangeType,
    /// Path to the changed element (e.g. `properties.panels.properties.id`)
    pub path: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub is_breaking: bool,
    pub description: String,
}

/// Type of schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// An optional property was added
    FieldAdded,
    /// A property was removed
    FieldRemoved,
    /// A property's type changed
    TypeChanged,
    /// A property became required without a default
    RequiredAdded,
    /// A property became required and is filled by a default
    DefaultBackfill,
    /// Enum value added
    EnumVariantAdded,
    /// Enum value removed
    EnumVariantRemoved,
}

/// Structural comparison of JSON Schemas
#[derive(Debug, Clone, Default)]
pub struct CompatibilityChecker {
    /// Strict mode - any change is considered breaking
    strict_mode: bool,
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Enable strict mode
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Compare an older schema against its successor
    pub fn check(&self, old: &Value, new: &Value) -> CompatibilityResult {
        let mut changes = Vec::new();
        detect_changes(old, new, "", &mut changes);
        CompatibilityResult::from_changes(changes, self.strict_mode)
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        format!("properties.{}", name)
    } else {
        format!("{}.properties.{}", path, name)
    }
}

fn required_set(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn is_object_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object") || schema.get("properties").is_some()
}

fn detect_changes(old: &Value, new: &Value, path: &str, changes: &mut Vec<SchemaChange>) {
    let empty = serde_json::Map::new();
    let old_props = old.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let new_props = new.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let old_required = required_set(old);
    let new_required = required_set(new);

    for (name, old_prop) in old_props {
        if !new_props.contains_key(name) {
            changes.push(SchemaChange {
                change_type: ChangeType::FieldRemoved,
                path: join_path(path, name),
                old_value: Some(old_prop.to_string()),
                new_value: None,
                is_breaking: true,
                description: format!("Property '{}' was removed", name),
            });
        }
    }

    for (name, new_prop) in new_props {
        let prop_path = join_path(path, name);
        let now_required = new_required.contains(&name.as_str());
        let was_required = old_required.contains(&name.as_str());
        let has_default = new_prop.get("default").is_some();

        let Some(old_prop) = old_props.get(name) else {
            let change = match (now_required, has_default) {
                (true, true) => SchemaChange {
                    change_type: ChangeType::DefaultBackfill,
                    path: prop_path,
                    old_value: None,
                    new_value: new_prop.get("default").map(ToString::to_string),
                    is_breaking: false,
                    description: format!("Required property '{}' was added with a default", name),
                },
                (true, false) => SchemaChange {
                    change_type: ChangeType::RequiredAdded,
                    path: prop_path,
                    old_value: None,
                    new_value: Some(new_prop.to_string()),
                    is_breaking: true,
                    description: format!("Required property '{}' was added without a default", name),
                },
                (false, _) => SchemaChange {
                    change_type: ChangeType::FieldAdded,
                    path: prop_path,
                    old_value: None,
                    new_value: Some(new_prop.to_string()),
                    is_breaking: false,
                    description: format!("Optional property '{}' was added", name),
                },
            };
            changes.push(change);
            continue;
        };

        let old_type = old_prop.get("type");
        let new_type = new_prop.get("type");
        if old_type != new_type {
            changes.push(SchemaChange {
                change_type: ChangeType::TypeChanged,
                path: format!("{}.type", prop_path),
                old_value: old_type.map(ToString::to_string),
                new_value: new_type.map(ToString::to_string),
                is_breaking: true,
                description: format!("Property '{}' type changed", name),
            });
        }

        if now_required && !was_required {
            changes.push(if has_default {
                SchemaChange {
                    change_type: ChangeType::DefaultBackfill,
                    path: prop_path.clone(),
                    old_value: None,
                    new_value: new_prop.get("default").map(ToString::to_string),
                    is_breaking: false,
                    description: format!("Property '{}' became required with a default", name),
                }
            } else {
                SchemaChange {
                    change_type: ChangeType::RequiredAdded,
                    path: prop_path.clone(),
                    old_value: None,
                    new_value: None,
                    is_breaking: true,
                    description: format!("Property '{}' became required", name),
                }
            });
        }

        if is_object_schema(old_prop) && is_object_schema(new_prop) {
            detect_changes(old_prop, new_prop, &prop_path, changes);
        } else {
            detect_enum_changes(old_prop, new_prop, &prop_path, changes);
        }
    }

    detect_enum_changes(old, new, path, changes);
}

fn detect_enum_changes(old: &Value, new: &Value, path: &str, changes: &mut Vec<SchemaChange>) {
    let (Some(old_enum), Some(new_enum)) = (
        old.get("enum").and_then(Value::as_array),
        new.get("enum").and_then(Value::as_array),
    ) else {
        return;
    };

    let enum_path = if path.is_empty() { "enum".to_string() } else { format!("{}.enum", path) };
    for removed in old_enum.iter().filter(|v| !new_enum.contains(v)) {
        changes.push(SchemaChange {
            change_type: ChangeType::EnumVariantRemoved,
            path: enum_path.clone(),
            old_value: Some(removed.to_string()),
            new_value: None,
            is_breaking: true,
            description: format!("Enum variant {} was removed", removed),
        });
    }
    for added in new_enum.iter().filter(|v| !old_enum.contains(v)) {
        changes.push(SchemaChange {
            change_type: ChangeType::EnumVariantAdded,
            path: enum_path.clone(),
            old_value: None,
            new_value: Some(added.to_string()),
            is_breaking: false,
            description: format!("Enum variant {} was added", added),
        });
    }
}

/// Compatibility of one step between consecutive versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    /// True when `to` starts a new major version
    pub major_bump: bool,
    /// Whether `to` has a lens from `from`
    pub has_lens: bool,
    pub result: CompatibilityResult,
}

impl StepReport {
    /// A minor bump with breaking changes, or with backfills no lens writes
    pub fn is_violation(&self) -> bool {
        !self.major_bump && (!self.result.is_compatible || self.needs_lens())
    }

    /// A breaking or backfilling step that no lens covers
    pub fn needs_lens(&self) -> bool {
        (!self.result.is_compatible || self.result.has_backfills()) && !self.has_lens
    }
}

/// Compatibility of every consecutive step in a family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub steps: Vec<StepReport>,
}

impl CompatibilityReport {
    pub fn violations(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.is_violation())
    }

    pub fn missing_lenses(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.needs_lens())
    }

    pub fn backfills(&self) -> impl Iterator<Item = (&StepReport, &SchemaChange)> {
        self.steps
            .iter()
            .flat_map(|s| s.result.backfills().map(move |c| (s, c)))
    }

    pub fn is_clean(&self) -> bool {
        self.violations().next().is_none()
    }
}
