//! Error types for host operations

use mbinbridge_sdk::{ClassRef, FieldRef, HostException, ObjectRef};

/// Error type for runtime host operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Assembly could not be opened or loaded
    #[error("Failed to load assembly {path}: {reason}")]
    AssemblyLoad { path: String, reason: String },

    /// No class with this namespace and name
    #[error("Class not found: {namespace}.{name}")]
    ClassNotFound { namespace: String, name: String },

    /// Class reference is not known to the host
    #[error("Unknown class: {0}")]
    UnknownClass(ClassRef),

    /// Field reference is not known to the host
    #[error("Unknown field: {0}")]
    UnknownField(FieldRef),

    /// Object reference is dead or was never issued
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectRef),

    /// Method lookup by name and arity failed
    #[error("Method not found: {class}::{method}/{arity}")]
    MethodNotFound {
        class: String,
        method: String,
        arity: usize,
    },

    /// The host raised an exception
    #[error("Host exception: {0}")]
    Exception(HostException),

    /// A value of the wrong kind was passed or returned
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Operation needs an object but got null
    #[error("Null reference: {0}")]
    NullReference(String),

    /// Object is not an array
    #[error("Not an array: {0}")]
    NotAnArray(ObjectRef),

    /// Class is not an array class
    #[error("Not an array class: {0}")]
    NotAnArrayClass(String),

    /// Index past the end of an array or table
    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Type table entry that the host cannot resolve into a class
    #[error("Unresolvable type: {0}")]
    UnresolvableType(String),
}

impl HostError {
    /// Build a type mismatch error
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        HostError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// The host exception, if this error carries one
    pub fn exception(&self) -> Option<&HostException> {
        match self {
            HostError::Exception(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HostException> for HostError {
    fn from(e: HostException) -> Self {
        HostError::Exception(e)
    }
}
