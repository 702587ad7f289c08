//! Ownership of a host object tied to an asset file
//!
//! A [`ResourceHandle`] moves through three states:
//!
//! ```text
//!   new(path) ──load──▶ Bound ──release──▶ Released
//!   open(path) ────────▶ Bound
//!   from_object(obj) ──▶ Bound
//! ```
//!
//! There is no way back to the unbound state. Marshalling through an
//! unbound handle is an ordinary error; touching a released handle is a
//! programming error and panics.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use mbinbridge_host::HostSession;
use mbinbridge_sdk::ObjectRef;

use crate::config::IoConfig;
use crate::io::{self, FileError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandleState {
    Unbound,
    Bound(ObjectRef),
    Released,
}

/// A host object plus the file it was loaded from or will be saved to
///
/// Not `Clone`: a handle is the single owner of its host reference.
#[derive(Debug)]
pub struct ResourceHandle {
    path: Option<PathBuf>,
    state: HandleState,
}

impl ResourceHandle {
    /// Unbound handle for `path`; nothing is loaded until [`load`](Self::load)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            state: HandleState::Unbound,
        }
    }

    /// Handle for `path`, loaded immediately
    pub fn open(session: &HostSession, path: impl Into<PathBuf>) -> Result<Self, FileError> {
        let mut handle = Self::new(path);
        handle.load(session)?;
        Ok(handle)
    }

    /// Bound handle for an object that has no file yet
    pub fn from_object(obj: ObjectRef) -> Self {
        Self {
            path: None,
            state: HandleState::Bound(obj),
        }
    }

    /// Load the handle's file, replacing any bound object
    ///
    /// # Panics
    ///
    /// If the handle has been released.
    pub fn load(&mut self, session: &HostSession) -> Result<ObjectRef, FileError> {
        self.assert_live();
        let path = self.path.as_deref().ok_or(FileError::NoPath)?;
        let obj = io::load_file(session, path)?;
        self.state = HandleState::Bound(obj);
        Ok(obj)
    }

    /// The bound object, `None` while unbound
    ///
    /// # Panics
    ///
    /// If the handle has been released.
    pub fn object(&self) -> Option<ObjectRef> {
        match self.state {
            HandleState::Bound(obj) => Some(obj),
            HandleState::Unbound => None,
            HandleState::Released => panic!("{self} used after release"),
        }
    }

    /// Drop the host reference; the handle cannot be used afterwards
    pub fn release(&mut self) {
        if let HandleState::Bound(obj) = self.state {
            debug!("Releasing {}", obj);
        }
        self.state = HandleState::Released;
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, HandleState::Bound(_))
    }

    pub fn is_released(&self) -> bool {
        self.state == HandleState::Released
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Save the bound object to the handle's own path
    pub fn persist(&self, session: &HostSession) -> Result<(), FileError> {
        self.persist_with(session, &IoConfig::default())
    }

    /// Save to the handle's own path using `config`'s extension table
    pub fn persist_with(&self, session: &HostSession, config: &IoConfig) -> Result<(), FileError> {
        let path = self.path.as_deref().ok_or(FileError::NoPath)?;
        self.save(session, path, config)
    }

    /// Save the bound object to another path
    pub fn persist_to(&self, session: &HostSession, path: &Path) -> Result<(), FileError> {
        self.save(session, path, &IoConfig::default())
    }

    fn save(&self, session: &HostSession, path: &Path, config: &IoConfig) -> Result<(), FileError> {
        let obj = self.object().ok_or(FileError::Unbound)?;
        io::write_with(session, obj, path, config)
    }

    fn assert_live(&self) {
        if self.is_released() {
            panic!("{self} used after release");
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "ResourceHandle({})", path.display()),
            None => f.write_str("ResourceHandle(<memory>)"),
        }
    }
}
