//! Forward-migration lenses
//!
//! A lens is attached to a versioned schema and maps an artifact that is valid
//! at the immediately preceding version to one valid at the lens's version.
//! Lenses are authored, never derived: either as Rust closures registered in a
//! [`LensRegistry`], or as a list of [`LensOp`]s declared inside the schema
//! leaf itself.
//!
//! A lens that backfills a newly required field with a default value cannot
//! tell whether the old artifact carried the same intent under a different
//! name or shape. Prefer [`LensOp::Rename`] over [`LensOp::Default`] whenever
//! a prior variation is known.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::version::SchemaVersion;

/// Errors raised while applying a lens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    #[error("Invalid JSON pointer '{0}'")]
    InvalidPointer(String),

    #[error("Cannot write at '{path}': parent is not an object or array")]
    NotAContainer { path: String },

    #[error("Array index '{index}' out of bounds at '{path}'")]
    IndexOutOfBounds { path: String, index: String },

    #[error("{0}")]
    Custom(String),
}

impl LensError {
    /// Error with a free-form message, for hand-written lenses
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// Migrate-from-previous capability
pub trait Lens: Send + Sync {
    /// Produce the artifact at this lens's version from one at the previous version
    fn forward(&self, artifact: &Value) -> Result<Value, LensError>;

    /// Pointers this lens fills with a default when the artifact lacks them
    fn backfilled_paths(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> Lens for F
where
    F: Fn(&Value) -> Result<Value, LensError> + Send + Sync,
{
    fn forward(&self, artifact: &Value) -> Result<Value, LensError> {
        self(artifact)
    }
}

/// A single declarative lens operation. Paths are JSON pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LensOp {
    /// Move a value; a missing source is left alone
    Rename { from: String, to: String },
    /// Write a value, replacing whatever was there
    Set { path: String, value: Value },
    /// Write a value only when nothing is present at `path`
    Default { path: String, value: Value },
    /// Delete a value if present
    Remove { path: String },
}

impl LensOp {
    fn apply(&self, doc: &mut Value) -> Result<(), LensError> {
        match self {
            LensOp::Rename { from, to } => {
                if let Some(value) = remove_at(doc, from)? {
                    insert_at(doc, to, value)?;
                }
                Ok(())
            }
            LensOp::Set { path, value } => insert_at(doc, path, value.clone()),
            LensOp::Default { path, value } => {
                if doc.pointer(path).is_none() {
                    insert_at(doc, path, value.clone())?;
                }
                Ok(())
            }
            LensOp::Remove { path } => remove_at(doc, path).map(|_| ()),
        }
    }

    /// Pointer this operation fills with a default, if it is a backfill
    pub fn backfill_path(&self) -> Option<&str> {
        match self {
            LensOp::Default { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Lens made of ordered declarative operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarativeLens {
    ops: Vec<LensOp>,
}

impl DeclarativeLens {
    pub fn new(ops: Vec<LensOp>) -> Self {
        Self { ops }
    }

    /// Parse the lens keyword value of a schema leaf
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn ops(&self) -> &[LensOp] {
        &self.ops
    }
}

impl Lens for DeclarativeLens {
    fn forward(&self, artifact: &Value) -> Result<Value, LensError> {
        let mut doc = artifact.clone();
        for op in &self.ops {
            op.apply(&mut doc)?;
        }
        Ok(doc)
    }

    fn backfilled_paths(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(LensOp::backfill_path)
            .map(str::to_string)
            .collect()
    }
}

/// Rust-authored lenses keyed by the version they migrate *to*
#[derive(Clone, Default)]
pub struct LensRegistry {
    lenses: HashMap<SchemaVersion, Arc<dyn Lens>>,
}

impl LensRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a lens to a version, replacing any earlier registration
    pub fn register(&mut self, version: SchemaVersion, lens: impl Lens + 'static) -> &mut Self {
        self.lenses.insert(version, Arc::new(lens));
        self
    }

    /// Bind a closure as the lens for a version
    pub fn register_fn<F>(&mut self, version: SchemaVersion, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Value, LensError> + Send + Sync + 'static,
    {
        self.register(version, f)
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with(mut self, version: SchemaVersion, lens: impl Lens + 'static) -> Self {
        self.register(version, lens);
        self
    }

    /// Builder-style variant of [`register_fn`](Self::register_fn)
    pub fn with_fn<F>(mut self, version: SchemaVersion, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, LensError> + Send + Sync + 'static,
    {
        self.register_fn(version, f);
        self
    }

    pub fn get(&self, version: SchemaVersion) -> Option<Arc<dyn Lens>> {
        self.lenses.get(&version).cloned()
    }

    /// Registered versions in ascending order
    pub fn versions(&self) -> Vec<SchemaVersion> {
        let mut versions: Vec<_> = self.lenses.keys().copied().collect();
        versions.sort();
        versions
    }

    pub fn is_empty(&self) -> bool {
        self.lenses.is_empty()
    }
}

impl fmt::Debug for LensRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LensRegistry")
            .field("versions", &self.versions())
            .finish()
    }
}

/// Split a JSON pointer into its parent pointer and unescaped last token
fn split_pointer(path: &str) -> Result<(&str, String), LensError> {
    if !path.starts_with('/') {
        return Err(LensError::InvalidPointer(path.to_string()));
    }
    let idx = path.rfind('/').unwrap_or(0);
    let token = path[idx + 1..].replace("~1", "/").replace("~0", "~");
    Ok((&path[..idx], token))
}

fn parse_index(parent: &str, token: &str, len: usize, allow_end: bool) -> Result<usize, LensError> {
    let out_of_bounds = || LensError::IndexOutOfBounds {
        path: parent.to_string(),
        index: token.to_string(),
    };
    if token == "-" && allow_end {
        return Ok(len);
    }
    let index: usize = token.parse().map_err(|_| out_of_bounds())?;
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    if index > limit || (!allow_end && len == 0) {
        return Err(out_of_bounds());
    }
    Ok(index)
}

/// Write `value` at `path`, creating missing intermediate objects
fn insert_at(doc: &mut Value, path: &str, value: Value) -> Result<(), LensError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent_path, token) = split_pointer(path)?;
    let parent = ensure_object_path(doc, parent_path)?;
    match parent {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(parent_path, &token, items.len(), true)?;
            if index == items.len() {
                items.push(value);
            } else {
                items[index] = value;
            }
            Ok(())
        }
        _ => Err(LensError::NotAContainer { path: path.to_string() }),
    }
}

/// Remove and return the value at `path`, if present
fn remove_at(doc: &mut Value, path: &str) -> Result<Option<Value>, LensError> {
    if path.is_empty() {
        return Ok(Some(std::mem::take(doc)));
    }
    let (parent_path, token) = split_pointer(path)?;
    match doc.pointer_mut(parent_path) {
        Some(Value::Object(map)) => Ok(map.remove(&token)),
        Some(Value::Array(items)) => match token.parse::<usize>() {
            Ok(index) if index < items.len() => Ok(Some(items.remove(index))),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Walk `path`, inserting empty objects for missing object members
fn ensure_object_path<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value, LensError> {
    if path.is_empty() {
        return Ok(doc);
    }
    if !path.starts_with('/') {
        return Err(LensError::InvalidPointer(path.to_string()));
    }

    let mut current = doc;
    let mut walked = String::new();
    for raw in path[1..].split('/') {
        let token = raw.replace("~1", "/").replace("~0", "~");
        walked.push('/');
        walked.push_str(raw);
        if current.is_null() {
            *current = Value::Object(Default::default());
        }
        current = match current {
            Value::Object(map) => map
                .entry(token)
                .or_insert_with(|| Value::Object(Default::default())),
            Value::Array(items) => {
                let index = parse_index(&walked, &token, items.len(), false)?;
                &mut items[index]
            }
            _ => return Err(LensError::NotAContainer { path: walked }),
        };
    }
    Ok(current)
}
