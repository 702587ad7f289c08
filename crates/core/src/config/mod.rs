//! Configuration system for mbinbridge
//!
//! A single TOML file configures every part of the bridge:
//! - `[host]` - where the asset library lives and its entry point classes
//! - `[codegen]` - extraction and emission rules for binding generation
//! - `[marshal]` - field matching mode
//! - `[io]` - which file extensions select which writer
//! - `[pak]` - the external archive tool
//!
//! Missing files are created with defaults on load. Every section is
//! `#[serde(default)]`, so a config only needs the keys it changes.
//!
//! # Example
//!
//! ```toml
//! [host]
//! assembly = "lib/libMBIN.dll"
//!
//! [codegen]
//! output = "src/generated_types.rs"
//! base_type_policy = "reject"
//!
//! [marshal]
//! field_matching = "by_name"
//! ```

mod loader;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mbinbridge_host::SessionLayout;
use mbinbridge_sdk::names;

use crate::marshal::FieldMatching;
use crate::schema::BaseTypePolicy;

pub use loader::{base_dir, config_path, resolve, CONFIG_ENV, CONFIG_FILE};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine the directory holding the config file
    #[error("Config directory not available - could not resolve config base path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Bridge configuration.
///
/// Loaded from `mbinbridge.toml` (or `$MBINBRIDGE_CONFIG`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Config version for future migration support
    pub version: u32,

    pub host: HostConfig,
    pub codegen: CodegenConfig,
    pub marshal: MarshalConfig,
    pub io: IoConfig,
    pub pak: PakConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            host: HostConfig::default(),
            codegen: CodegenConfig::default(),
            marshal: MarshalConfig::default(),
            io: IoConfig::default(),
            pak: PakConfig::default(),
        }
    }
}

/// `[host]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Path of the managed asset library
    pub assembly: PathBuf,
    /// Namespace holding the template and file-IO classes
    pub root_namespace: String,
    /// Root class every asset record derives from
    pub template_class: String,
    /// Class exposing `LoadFile`
    pub file_io_class: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            assembly: PathBuf::from("libMBIN.dll"),
            root_namespace: names::ROOT_NAMESPACE.to_string(),
            template_class: names::TEMPLATE_CLASS.to_string(),
            file_io_class: names::FILE_IO_CLASS.to_string(),
        }
    }
}

impl HostConfig {
    /// Session layout with the assembly path resolved against `base`
    pub fn layout(&self, base: &Path) -> SessionLayout {
        SessionLayout {
            assembly: resolve(base, &self.assembly),
            root_namespace: self.root_namespace.clone(),
            template_class: self.template_class.clone(),
            file_io_class: self.file_io_class.clone(),
        }
    }
}

/// `[codegen]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Output file, relative to the config directory
    pub output: PathBuf,
    /// Namespace prefix removed before turning namespaces into module names
    pub strip_namespace_prefix: String,
    /// Type names never emitted
    pub skip_types: Vec<String>,
    /// Namespaces never emitted
    pub skip_namespaces: Vec<String>,
    /// Records whose direct base has one of these names are not emitted
    pub skip_bases: Vec<String>,
    /// Field attribute carrying the fixed size
    pub size_attribute: String,
    /// Property of `size_attribute` holding the size
    pub size_property: String,
    /// Type name prefixes rewritten to `Vec<..>`
    pub list_markers: Vec<String>,
    /// What to do with records that have no base type
    pub base_type_policy: BaseTypePolicy,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("generated/generated_types.rs"),
            strip_namespace_prefix: format!("{}.", names::ROOT_NAMESPACE),
            skip_types: vec!["HashMap`1".to_string()],
            skip_namespaces: vec![names::ROOT_NAMESPACE.to_string()],
            skip_bases: vec!["Object".to_string()],
            size_attribute: names::SIZE_ATTRIBUTE.to_string(),
            size_property: names::SIZE_PROPERTY.to_string(),
            list_markers: vec![
                names::LIST_MARKER.to_string(),
                names::HASHMAP_MARKER.to_string(),
            ],
            base_type_policy: BaseTypePolicy::default(),
        }
    }
}

/// `[marshal]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    pub field_matching: FieldMatching,
}

/// `[io]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Extensions written with the binary writer (case-insensitive, no dot)
    pub binary_extensions: Vec<String>,
    /// Extensions written with the markup writer (case-insensitive, no dot)
    pub markup_extensions: Vec<String>,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            binary_extensions: vec!["MBIN".to_string()],
            markup_extensions: vec!["EXML".to_string(), "MXML".to_string()],
        }
    }
}

/// `[pak]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PakConfig {
    /// Archive tool executable
    pub program: PathBuf,
    /// Arguments placed before the directory argument
    pub args: Vec<String>,
    /// File the tool writes when it is done, relative to the packed directory's parent
    pub marker: PathBuf,
    /// Marker poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Give up after this many seconds
    pub timeout_secs: u64,
}

impl Default for PakConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("psarc"),
            args: vec!["create".to_string()],
            marker: PathBuf::from("psarc.pak"),
            poll_interval_ms: 250,
            timeout_secs: 300,
        }
    }
}

impl PakConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BridgeConfig {
    /// Load config from the default location, creating it if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from `path`, creating a default file if missing.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_path()?)
    }

    /// Save config to `path`.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reload config from `path`.
    ///
    /// Updates self with the current file contents.
    pub fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded config from {:?}", path);
        Ok(())
    }
}
