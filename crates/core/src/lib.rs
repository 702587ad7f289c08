//! mbinbridge Core - Schema Bridge and Marshalling Engine
//!
//! This crate bridges native record types with the hosted asset object model:
//!
//! - [`schema`] - Extract type metadata from the host, order it by
//!   dependency and emit native record declarations
//! - [`marshal`] - Move data field-by-field between native records and live
//!   host objects
//! - [`handle`] - Ownership of a host object loaded from (or destined for) a file
//! - [`io`] - Asset load/write entry points and raw byte helpers
//! - [`pak`] - External archive tool handshake
//! - [`config`] - TOML configuration
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and host crates for convenience:
//! - [`sdk`] - Host reference and value types
//! - [`host`] - Runtime host trait, session and mock host

// Allow the crate to refer to itself as `mbinbridge_core` for proc macro compatibility
extern crate self as mbinbridge_core;

// Re-export SDK and host crates
pub use mbinbridge_host as host;
pub use mbinbridge_sdk as sdk;

pub use mbinbridge_macros::{HostEnum, HostRecord};

pub mod config;
pub mod generate;
pub mod handle;
pub mod io;
pub mod marshal;
pub mod pak;
pub mod schema;

// Re-export commonly used items
pub use config::{BridgeConfig, ConfigError, ConfigResult};
pub use generate::{generate_bindings, generate_from_snapshot, GenerateError, GenerateReport};
pub use handle::ResourceHandle;
pub use host::{HostError, HostSession, RuntimeHost, SessionLayout};
pub use io::FileError;
pub use marshal::{
    immediate_edit, push_new, read_from_host, write_to_host, FieldMatching, Marshal,
    MarshalContext, MarshalError, Record,
};
pub use pak::{ArchiveTool, PakError};
pub use schema::{
    extract_schema, DependencyGraph, Emitter, EnumDescriptor, FieldDescriptor, RecordDescriptor,
    SchemaError, SchemaSet,
};
