//! Values crossing the host boundary
//!
//! [`HostValue`] is what the host returns from a field read, an array slot,
//! an unboxed list item or a method invocation. Primitive values travel by
//! value; everything else (strings, arrays, lists, records, boxed values) is
//! an [`ObjectRef`].

use std::fmt;

use crate::handles::ObjectRef;

/// A value read from or written to the host
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostValue {
    /// Null object reference
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Reference to a host object
    Object(ObjectRef),
}

impl HostValue {
    /// Widen an integral value to `i64`
    ///
    /// Returns `None` for non-integral values. `u64` values above `i64::MAX`
    /// wrap, matching how the host stores enum constants.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            HostValue::I8(v) => Some(v as i64),
            HostValue::U8(v) => Some(v as i64),
            HostValue::I16(v) => Some(v as i64),
            HostValue::U16(v) => Some(v as i64),
            HostValue::I32(v) => Some(v as i64),
            HostValue::U32(v) => Some(v as i64),
            HostValue::I64(v) => Some(v),
            HostValue::U64(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Build an integral value of the given width (truncating)
    pub fn integral(width: IntWidth, value: i64) -> Self {
        match width {
            IntWidth::I8 => HostValue::I8(value as i8),
            IntWidth::U8 => HostValue::U8(value as u8),
            IntWidth::I16 => HostValue::I16(value as i16),
            IntWidth::U16 => HostValue::U16(value as u16),
            IntWidth::I32 => HostValue::I32(value as i32),
            IntWidth::U32 => HostValue::U32(value as u32),
            IntWidth::I64 => HostValue::I64(value),
            IntWidth::U64 => HostValue::U64(value as u64),
        }
    }

    /// Get the object reference, if this is a non-null object
    pub fn as_object(&self) -> Option<ObjectRef> {
        match *self {
            HostValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Check for the null reference
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Short label of the value's kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::I8(_) => "i8",
            HostValue::U8(_) => "u8",
            HostValue::I16(_) => "i16",
            HostValue::U16(_) => "u16",
            HostValue::I32(_) => "i32",
            HostValue::U32(_) => "u32",
            HostValue::I64(_) => "i64",
            HostValue::U64(_) => "u64",
            HostValue::F32(_) => "f32",
            HostValue::F64(_) => "f64",
            HostValue::Object(_) => "object",
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(v) => write!(f, "{v}"),
            HostValue::I8(v) => write!(f, "{v}"),
            HostValue::U8(v) => write!(f, "{v}"),
            HostValue::I16(v) => write!(f, "{v}"),
            HostValue::U16(v) => write!(f, "{v}"),
            HostValue::I32(v) => write!(f, "{v}"),
            HostValue::U32(v) => write!(f, "{v}"),
            HostValue::I64(v) => write!(f, "{v}"),
            HostValue::U64(v) => write!(f, "{v}"),
            HostValue::F32(v) => write!(f, "{v}"),
            HostValue::F64(v) => write!(f, "{v}"),
            HostValue::Object(obj) => write!(f, "{obj}"),
        }
    }
}

/// Underlying integer width of a host enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IntWidth {
    I8,
    U8,
    I16,
    U16,
    #[default]
    I32,
    U32,
    I64,
    U64,
}

impl IntWidth {
    /// Native Rust integer type name (used in `#[repr(..)]`)
    pub const fn rust_name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::U8 => "u8",
            IntWidth::I16 => "i16",
            IntWidth::U16 => "u16",
            IntWidth::I32 => "i32",
            IntWidth::U32 => "u32",
            IntWidth::I64 => "i64",
            IntWidth::U64 => "u64",
        }
    }

    /// Map a host integral type name (e.g. `System.Int32`)
    pub fn from_host_name(name: &str) -> Option<Self> {
        match PrimitiveType::from_host_name(name)? {
            PrimitiveType::I8 => Some(IntWidth::I8),
            PrimitiveType::U8 => Some(IntWidth::U8),
            PrimitiveType::I16 => Some(IntWidth::I16),
            PrimitiveType::U16 => Some(IntWidth::U16),
            PrimitiveType::I32 => Some(IntWidth::I32),
            PrimitiveType::U32 => Some(IntWidth::U32),
            PrimitiveType::I64 => Some(IntWidth::I64),
            PrimitiveType::U64 => Some(IntWidth::U64),
            _ => None,
        }
    }

    /// Width of an integral value
    pub fn of(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::I8(_) => Some(IntWidth::I8),
            HostValue::U8(_) => Some(IntWidth::U8),
            HostValue::I16(_) => Some(IntWidth::I16),
            HostValue::U16(_) => Some(IntWidth::U16),
            HostValue::I32(_) => Some(IntWidth::I32),
            HostValue::U32(_) => Some(IntWidth::U32),
            HostValue::I64(_) => Some(IntWidth::I64),
            HostValue::U64(_) => Some(IntWidth::U64),
            _ => None,
        }
    }
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rust_name())
    }
}

/// The closed set of host primitive types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
}

impl PrimitiveType {
    /// Every primitive type, in table order
    pub const ALL: [PrimitiveType; 12] = [
        PrimitiveType::Bool,
        PrimitiveType::I8,
        PrimitiveType::U8,
        PrimitiveType::I16,
        PrimitiveType::U16,
        PrimitiveType::I32,
        PrimitiveType::U32,
        PrimitiveType::I64,
        PrimitiveType::U64,
        PrimitiveType::F32,
        PrimitiveType::F64,
        PrimitiveType::String,
    ];

    /// Fully qualified host type name
    pub const fn host_name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "System.Boolean",
            PrimitiveType::I8 => "System.SByte",
            PrimitiveType::U8 => "System.Byte",
            PrimitiveType::I16 => "System.Int16",
            PrimitiveType::U16 => "System.UInt16",
            PrimitiveType::I32 => "System.Int32",
            PrimitiveType::U32 => "System.UInt32",
            PrimitiveType::I64 => "System.Int64",
            PrimitiveType::U64 => "System.UInt64",
            PrimitiveType::F32 => "System.Single",
            PrimitiveType::F64 => "System.Double",
            PrimitiveType::String => "System.String",
        }
    }

    /// Native Rust type name
    pub const fn rust_name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "i8",
            PrimitiveType::U8 => "u8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::U16 => "u16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::U32 => "u32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::String => "::std::string::String",
        }
    }

    /// Look up a primitive by its host type name
    pub fn from_host_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.host_name() == name)
    }

    /// Zero value as stored by the host (strings default to null)
    pub const fn default_value(self) -> HostValue {
        match self {
            PrimitiveType::Bool => HostValue::Bool(false),
            PrimitiveType::I8 => HostValue::I8(0),
            PrimitiveType::U8 => HostValue::U8(0),
            PrimitiveType::I16 => HostValue::I16(0),
            PrimitiveType::U16 => HostValue::U16(0),
            PrimitiveType::I32 => HostValue::I32(0),
            PrimitiveType::U32 => HostValue::U32(0),
            PrimitiveType::I64 => HostValue::I64(0),
            PrimitiveType::U64 => HostValue::U64(0),
            PrimitiveType::F32 => HostValue::F32(0.0),
            PrimitiveType::F64 => HostValue::F64(0.0),
            PrimitiveType::String => HostValue::Null,
        }
    }
}
