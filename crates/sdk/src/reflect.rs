//! Reflection records returned by the host
//!
//! These are plain owned snapshots. The host builds them on request; nothing
//! here keeps a host object alive.

use std::fmt;

use crate::handles::ClassRef;
use crate::value::HostValue;

/// Class-level metadata
#[derive(Clone, Debug, PartialEq)]
pub struct ClassInfo {
    /// Simple class name (for nested classes, the inner name only)
    pub name: String,
    /// Declaring namespace (empty for nested classes on most hosts)
    pub namespace: String,
    pub is_enum: bool,
    /// Direct base class, `None` for roots or when it cannot be resolved
    pub parent: Option<ClassRef>,
    /// Enclosing class for nested types
    pub nesting: Option<ClassRef>,
}

impl ClassInfo {
    /// `Namespace.Name`, or just `Name` when there is no namespace
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Field-level metadata
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    /// Host type name as the host prints it, e.g. `System.Int32`,
    /// `libMBIN.NMS.Colour[]`, `System.Collections.Generic.List<...>`
    pub type_name: String,
    /// Resolved class of the field type, `None` if the host could not load it
    pub type_class: Option<ClassRef>,
}

/// A custom attribute attached to a field
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeInfo {
    /// Attribute class name without namespace
    pub class_name: String,
    /// Property values set on the attribute instance
    pub properties: Vec<(String, HostValue)>,
}

impl AttributeInfo {
    /// Look up a property value by name
    pub fn property(&self, name: &str) -> Option<HostValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }
}

/// An exception raised inside the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostException {
    /// Exception class, e.g. `System.NullReferenceException`
    pub class_name: String,
    pub message: String,
    pub stack_trace: Option<String>,
    /// The exception that caused this one
    pub inner: Option<Box<HostException>>,
}

impl HostException {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
            stack_trace: None,
            inner: None,
        }
    }

    /// Attach a stack trace
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// Attach an inner exception
    pub fn caused_by(mut self, inner: HostException) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Iterate this exception followed by its inner chain, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &HostException> {
        std::iter::successors(Some(self), |e| e.inner.as_deref())
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)
    }
}

impl std::error::Error for HostException {}
