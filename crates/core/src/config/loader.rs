//! Config path resolution
//!
//! Handles resolving the config file location and paths named inside it.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MBINBRIDGE_CONFIG";

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "mbinbridge.toml";

/// Returns the config file path.
///
/// `$MBINBRIDGE_CONFIG` if set, otherwise `./mbinbridge.toml`.
pub fn config_path() -> ConfigResult<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let cwd = std::env::current_dir().map_err(ConfigError::IoError)?;
    Ok(cwd.join(CONFIG_FILE))
}

/// Returns the directory relative config paths are resolved against.
///
/// This is the directory holding the config file.
pub fn base_dir(config_file: &Path) -> ConfigResult<PathBuf> {
    match config_file.parent() {
        Some(parent) if parent.as_os_str().is_empty() => {
            std::env::current_dir().map_err(ConfigError::IoError)
        }
        Some(parent) => Ok(parent.to_path_buf()),
        None => Err(ConfigError::NoConfigDirectory),
    }
}

/// Resolve a path from the config against `base`.
///
/// Absolute paths are returned unchanged.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = PathBuf::from("/work/mods");
        assert_eq!(
            resolve(&base, Path::new("generated/generated_types.rs")),
            PathBuf::from("/work/mods/generated/generated_types.rs")
        );
        assert_eq!(resolve(&base, Path::new("/opt/libMBIN.dll")), PathBuf::from("/opt/libMBIN.dll"));
    }

    #[test]
    fn test_base_dir_of_config_file() {
        let base = base_dir(Path::new("/work/mods/mbinbridge.toml")).unwrap();
        assert_eq!(base, PathBuf::from("/work/mods"));
    }
}
