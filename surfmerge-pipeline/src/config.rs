//! Batch input resolution
//!
//! Decodes the `{"files": [...]}` batch document and resolves it into an
//! ordered, deduplicated list of [`MeshDescriptor`] records. The first entry
//! for a name wins; later entries with the same name are dropped together
//! with their overrides.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use surfmerge_core::{Error, Result};
use tracing::debug;

/// Sentinel for an unspecified length override
pub const UNSPECIFIED: f64 = -1.0;

/// How a present field with the wrong JSON type is handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Fall back to the field's default
    #[default]
    Lenient,
    /// Reject the batch with [`Error::Config`]
    Strict,
}

/// One entry of the batch document, before resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFileEntry {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub target_edge_length: Option<Value>,
    #[serde(default)]
    pub epsa: Option<Value>,
    /// Spelled-out alternative to `epsa`, read only when `epsa` is absent
    #[serde(default)]
    pub epsilon: Option<Value>,
    #[serde(default)]
    pub skip_simplify: Option<Value>,
}

impl RawFileEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(Value::String(name.into())),
            ..Default::default()
        }
    }

    pub fn with_target_edge_length(mut self, value: impl Into<Value>) -> Self {
        self.target_edge_length = Some(value.into());
        self
    }

    pub fn with_epsilon(mut self, value: impl Into<Value>) -> Self {
        self.epsa = Some(value.into());
        self
    }

    pub fn with_skip_simplify(mut self, value: impl Into<Value>) -> Self {
        self.skip_simplify = Some(value.into());
        self
    }
}

/// The batch document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFiles {
    pub files: Vec<RawFileEntry>,
}

impl InputFiles {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid batch document: {}", e)))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Resolved identity and overrides of one input mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDescriptor {
    pub name: String,
    pub target_edge_length: f64,
    pub epsilon: f64,
    pub skip_simplify: bool,
}

impl MeshDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_edge_length: UNSPECIFIED,
            epsilon: UNSPECIFIED,
            skip_simplify: false,
        }
    }

    /// Absolute epsilon, if one was given
    pub fn epsilon_override(&self) -> Option<f64> {
        (self.epsilon > 0.0).then_some(self.epsilon)
    }

    /// Absolute target edge length, if one was given
    pub fn target_edge_length_override(&self) -> Option<f64> {
        (self.target_edge_length > 0.0).then_some(self.target_edge_length)
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.name)
    }
}

fn resolve_number(entry: usize, field: &str, value: Option<&Value>, policy: FieldPolicy) -> Result<f64> {
    match value {
        None => Ok(UNSPECIFIED),
        Some(v) => match v.as_f64() {
            Some(n) => Ok(n),
            None => mistyped(entry, field, v, "a number", policy).map(|_| UNSPECIFIED),
        },
    }
}

fn resolve_bool(entry: usize, field: &str, value: Option<&Value>, policy: FieldPolicy) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(v) => mistyped(entry, field, v, "a boolean", policy).map(|_| false),
    }
}

fn mistyped(entry: usize, field: &str, value: &Value, expected: &str, policy: FieldPolicy) -> Result<()> {
    match policy {
        FieldPolicy::Strict => Err(Error::Config(format!(
            "files[{}].{} must be {}, got {}",
            entry, field, expected, value
        ))),
        FieldPolicy::Lenient => {
            debug!(entry, field, %value, "mistyped field, using default");
            Ok(())
        }
    }
}

/// Resolve raw entries into unique descriptors in first-seen order
pub fn resolve(entries: &[RawFileEntry], policy: FieldPolicy) -> Result<Vec<MeshDescriptor>> {
    let mut seen = HashSet::new();
    let mut descriptors = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let name = match &entry.name {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(Error::Config(format!("files[{}].name must be a string, got {}", i, other)))
            }
            None => return Err(Error::Config(format!("files[{}] has no name", i))),
        };

        if !seen.insert(name.clone()) {
            debug!(entry = i, name = %name, "dropping duplicate entry");
            continue;
        }

        descriptors.push(MeshDescriptor {
            name: name.clone(),
            target_edge_length: resolve_number(
                i,
                "target_edge_length",
                entry.target_edge_length.as_ref(),
                policy,
            )?,
            epsilon: match (&entry.epsa, &entry.epsilon) {
                (Some(epsa), _) => resolve_number(i, "epsa", Some(epsa), policy)?,
                (None, epsilon) => resolve_number(i, "epsilon", epsilon.as_ref(), policy)?,
            },
            skip_simplify: resolve_bool(i, "skip_simplify", entry.skip_simplify.as_ref(), policy)?,
        });
    }

    Ok(descriptors)
}

/// Decode and resolve a batch document in one step
pub fn resolve_json(json: &str, policy: FieldPolicy) -> Result<Vec<MeshDescriptor>> {
    resolve(&InputFiles::from_json(json)?.files, policy)
}
