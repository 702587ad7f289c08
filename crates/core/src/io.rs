//! Asset file entry points
//!
//! Loading goes through the library's `FileIO.LoadFile`. Writing picks the
//! serializer from the file extension and invokes it on the root template
//! class with the object as receiver. Raw byte helpers cover files that
//! never pass through the host.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use mbinbridge_host::{HostError, HostSession};
use mbinbridge_sdk::{names, HostValue, ObjectRef};

use crate::config::IoConfig;

/// File operation errors
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is empty: {0}")]
    Empty(PathBuf),

    #[error("No file extension: {0}")]
    MissingExtension(PathBuf),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    /// The handle was created without a file path
    #[error("Handle has no file path")]
    NoPath,

    /// The handle does not reference a host object
    #[error("Handle is not bound to a host object")]
    Unbound,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Serialized asset format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Compiled binary (`WriteToMbin`)
    Binary,
    /// Markup (`WriteToExml`)
    Markup,
}

impl FileFormat {
    /// Format for `path`'s extension, compared case-insensitively
    pub fn from_path(path: &Path, config: &IoConfig) -> Result<Self, FileError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| FileError::MissingExtension(path.to_path_buf()))?;

        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(ext));
        if matches(&config.binary_extensions) {
            Ok(FileFormat::Binary)
        } else if matches(&config.markup_extensions) {
            Ok(FileFormat::Markup)
        } else {
            Err(FileError::UnsupportedExtension(ext.to_string()))
        }
    }

    /// Template method that writes this format
    pub fn writer(self) -> &'static str {
        match self {
            FileFormat::Binary => names::WRITE_MBIN,
            FileFormat::Markup => names::WRITE_EXML,
        }
    }
}

/// Load an asset file into a new host object
#[tracing::instrument(skip(session))]
pub fn load_file(session: &HostSession, path: &Path) -> Result<ObjectRef, FileError> {
    let arg = session.host().new_string(&path.to_string_lossy())?;
    let result = session.invoke(
        session.file_io_class(),
        names::LOAD_FILE,
        Some(session.file_io()),
        &[HostValue::Object(arg)],
    )?;

    match result {
        HostValue::Object(obj) => {
            info!("Loaded {} as {}", path.display(), obj);
            Ok(obj)
        }
        other => Err(HostError::mismatch("template object", other.kind_name()).into()),
    }
}

/// Write `obj` to `path` with the default extension table
pub fn write(session: &HostSession, obj: ObjectRef, path: &Path) -> Result<(), FileError> {
    write_with(session, obj, path, &IoConfig::default())
}

/// Write `obj` to `path`, choosing the serializer by extension
#[tracing::instrument(skip(session, config))]
pub fn write_with(
    session: &HostSession,
    obj: ObjectRef,
    path: &Path,
    config: &IoConfig,
) -> Result<(), FileError> {
    let format = FileFormat::from_path(path, config)?;
    let arg = session.host().new_string(&path.to_string_lossy())?;
    session.invoke(
        session.template_class(),
        format.writer(),
        Some(obj),
        &[HostValue::Object(arg)],
    )?;
    info!("Wrote {} via {}", path.display(), format.writer());
    Ok(())
}

/// Read a whole file; an empty file is an error
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, FileError> {
    let bytes = std::fs::read(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(FileError::Empty(path.to_path_buf()));
    }
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Write a whole file, creating its parent directory
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    let io_err = |source| FileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, bytes).map_err(io_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbinbridge_host::mock::MockHost;
    use mbinbridge_host::SessionLayout;
    use mbinbridge_sdk::PrimitiveType;
    use tempfile::TempDir;

    fn session(mock: &MockHost) -> HostSession {
        HostSession::open(Box::new(mock.clone()), &SessionLayout::new("libMBIN.dll")).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        let config = IoConfig::default();
        assert_eq!(
            FileFormat::from_path(Path::new("a/B.MBIN"), &config).unwrap(),
            FileFormat::Binary
        );
        assert_eq!(
            FileFormat::from_path(Path::new("a/b.exml"), &config).unwrap(),
            FileFormat::Markup
        );
        assert_eq!(
            FileFormat::from_path(Path::new("b.MXML"), &config).unwrap(),
            FileFormat::Markup
        );
        assert!(matches!(
            FileFormat::from_path(Path::new("b.txt"), &config),
            Err(FileError::UnsupportedExtension(ext)) if ext == "txt"
        ));
        assert!(matches!(
            FileFormat::from_path(Path::new("noext"), &config),
            Err(FileError::MissingExtension(_))
        ));
    }

    #[test]
    fn test_write_dispatches_on_extension() {
        let mock = MockHost::new();
        let session = session(&mock);
        let class = mock.define_class("libMBIN.NMS", "GcThing");
        mock.add_field(class, "Count", mock.primitive(PrimitiveType::I32));
        let obj = mock.instantiate(class);

        write(&session, obj, Path::new("out/thing.MBIN")).unwrap();
        write(&session, obj, Path::new("out/thing.exml")).unwrap();
        assert!(write(&session, obj, Path::new("out/thing.json")).is_err());

        assert_eq!(
            mock.writes(),
            vec![
                (names::WRITE_MBIN.to_string(), PathBuf::from("out/thing.MBIN")),
                (names::WRITE_EXML.to_string(), PathBuf::from("out/thing.exml")),
            ]
        );
        assert_eq!(mock.call_count(session.template_class(), names::WRITE_MBIN), 1);
    }

    #[test]
    fn test_load_file() {
        let mock = MockHost::new();
        let session = session(&mock);
        let class = mock.define_class("libMBIN.NMS", "GcThing");
        mock.add_field(class, "Count", mock.primitive(PrimitiveType::I32));
        let obj = mock.instantiate(class);
        mock.set(obj, "Count", HostValue::I32(9));
        mock.store_file("in/thing.MBIN", obj);

        let loaded = load_file(&session, Path::new("in/thing.MBIN")).unwrap();
        assert_ne!(loaded, obj);
        assert_eq!(mock.get(loaded, "Count"), HostValue::I32(9));

        let missing = load_file(&session, Path::new("in/missing.MBIN"));
        assert!(matches!(missing, Err(FileError::Host(HostError::Exception(_)))));
    }

    #[test]
    fn test_byte_helpers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/data.bin");

        write_bytes(&path, &[1, 2, 3]).unwrap();
        assert_eq!(read_bytes(&path).unwrap(), vec![1, 2, 3]);

        write_bytes(&path, &[]).unwrap();
        assert!(matches!(read_bytes(&path), Err(FileError::Empty(_))));
        assert!(matches!(
            read_bytes(&dir.path().join("missing")),
            Err(FileError::Io { .. })
        ));
    }
}
