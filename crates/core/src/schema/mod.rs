//! Schema extraction and binding generation
//!
//! Turns the host's type table into Rust source for the matching records.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 RuntimeHost (type table)                    │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ extract_schema()
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SchemaSet { records, enums }  <->  JSON schema snapshot    │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ Emitter::new()
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  GraphNode per record / top-level enum (rendered body)      │
//! │    DependencyGraph::build() -> sort() -> SortOutcome        │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │ Emitter::emit(order)
//!                               ▼
//!                      generated_types.rs
//! ```
//!
//! Descriptors keep host names untouched apart from list normalisation
//! (`List`1<T>` becomes `Vec<T>`); mapping to Rust names happens in the
//! emitter.

pub mod emit;
pub mod extract;
pub mod graph;
pub mod types;

use std::path::Path;

use serde::{Deserialize, Serialize};

use mbinbridge_sdk::IntWidth;

pub use emit::{EmitOptions, Emitter};
pub use extract::{extract_schema, ExtractOptions};
pub use graph::{DependencyGraph, GraphNode, SortOutcome};

/// Error type for schema snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("IO error on schema snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// What to do with a record whose direct base type is missing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseTypePolicy {
    /// Log and keep the record
    #[default]
    Warn,
    /// Log and drop the record
    Reject,
}

/// One field of a record, in host declaration order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Host type name with list markers rewritten to `Vec<..>`
    pub type_name: String,
    pub is_enum: bool,
    /// Size attribute value, 0 when absent
    #[serde(default)]
    pub fixed_size: u32,
}

/// A host class that maps to a generated record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Class name; nested classes use `Outer/Inner`
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_namespace: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    /// `Namespace.Name` as the host prints it in field types
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }
}

/// A host enum
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub name: String,
    /// Host name of the enclosing record for nested enums
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_record: Option<String>,
    pub namespace: String,
    pub underlying_width: IntWidth,
    /// Entries in declaration order
    pub entries: Vec<(String, i64)>,
}

impl EnumDescriptor {
    /// Value of the entry called `name`
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| *value)
    }

    /// Name as the host prints it in field types
    pub fn full_name(&self) -> String {
        match &self.enclosing_record {
            Some(record) => format!("{}/{}", qualify(&self.namespace, record), self.name),
            None => qualify(&self.namespace, &self.name),
        }
    }
}

/// Everything extracted from one assembly
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSet {
    pub records: Vec<RecordDescriptor>,
    pub enums: Vec<EnumDescriptor>,
}

impl SchemaSet {
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a schema snapshot file
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Write a schema snapshot file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let io_err = |source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_json()?).map_err(io_err)
    }

    /// Find a record by namespace and name
    pub fn record(&self, namespace: &str, name: &str) -> Option<&RecordDescriptor> {
        self.records
            .iter()
            .find(|r| r.namespace == namespace && r.name == name)
    }

    /// Enums declared inside `record`
    pub fn nested_enums<'a>(
        &'a self,
        record: &'a RecordDescriptor,
    ) -> impl Iterator<Item = &'a EnumDescriptor> + 'a {
        self.enums.iter().filter(move |e| {
            e.namespace == record.namespace && e.enclosing_record.as_deref() == Some(&record.name)
        })
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}
