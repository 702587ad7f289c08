//! Marshalling engine
//!
//! Moves values between generated native records and live host objects,
//! field by field and recursively, in both directions.
//!
//! # Field kinds
//!
//! Every field type implements [`Marshal`], which fixes its kind at compile
//! time:
//!
//! | Kind | Native types | Host side |
//! |------|--------------|-----------|
//! | [`FieldKind::Value`] | `bool`, integers, floats, `#[derive(HostEnum)]` enums | unboxed [`HostValue`] |
//! | [`FieldKind::Reference`] | `String`, `[T; N]`, `Vec<T>` | string, array or list object |
//! | [`FieldKind::Record`] | `#[derive(HostRecord)]` structs, `Option<Box<R>>` | record object or null |
//!
//! # Field matching
//!
//! Host fields are matched to native fields by position: the i-th native
//! field is the i-th field the host reports for the object's class. Before a
//! record is touched, the host's live field count is compared with the
//! native declaration and any difference fails the call with
//! [`MarshalError::FieldCountMismatch`]. Writes additionally check every
//! nested record class up front, so a stale schema never leaves an object
//! half-written.
//!
//! Position alone cannot detect two fields swapping places, so in positional
//! mode a name difference is logged once per class and record type. With
//! [`FieldMatching::ByName`] fields are looked up by name instead and a
//! missing name is an error.
//!
//! # Example
//!
//! ```ignore
//! use mbinbridge_core::{immediate_edit, MarshalContext, ResourceHandle};
//!
//! let cx = MarshalContext::new(&session);
//! let mut handle = ResourceHandle::new("METADATA/SIMULATION/BIOME.MBIN");
//! immediate_edit(&cx, &mut handle, |biome: &mut GcBiomeData| {
//!     biome.Fuel *= 2.0;
//! })?;
//! ```

mod collections;
mod scalar;
#[cfg(test)]
mod tests;

use std::collections::HashSet;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use mbinbridge_host::{HostError, HostSession, RuntimeHost};
use mbinbridge_sdk::{ClassRef, FieldRef, HostValue, ObjectRef};

use crate::config::{BridgeConfig, IoConfig};
use crate::handle::ResourceHandle;
use crate::io::FileError;

/// How native fields are paired with host fields
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatching {
    /// i-th native field to i-th host field
    #[default]
    Positional,
    /// Each native field to the host field of the same name
    ByName,
}

/// Compile-time kind of a field type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Copied by value; boxed when stored in a list
    Value,
    /// Strings, arrays and lists
    Reference,
    /// Nested records
    Record,
}

/// Where a value is being written: the current content and declared class
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot {
    /// Current value of the field or element
    pub existing: HostValue,
    /// Declared class of the field or element, if the host resolved it
    pub class: Option<ClassRef>,
}

impl Slot {
    /// A slot with nothing in it yet
    pub fn empty(class: Option<ClassRef>) -> Self {
        Self {
            existing: HostValue::Null,
            class,
        }
    }
}

/// Marshalling errors
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    /// The handle does not reference a host object
    #[error("Handle is not bound to a host object")]
    UnboundHandle,

    /// The generated record no longer matches the host class
    #[error("Field count mismatch for {type_name}: host reports {host}, native declares {native}")]
    FieldCountMismatch {
        type_name: &'static str,
        host: usize,
        native: usize,
    },

    #[error("{type_name} has no host field named {field}")]
    FieldNotFound {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{value} is not a value of {type_name}")]
    InvalidEnumValue { type_name: &'static str, value: i64 },

    /// A host object had to be created but its class is unknown
    #[error("No host class to allocate for {0}")]
    MissingClass(&'static str),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl MarshalError {
    /// Field count mismatch for record `R`
    pub fn field_count<R: Record>(host: usize) -> Self {
        MarshalError::FieldCountMismatch {
            type_name: R::TYPE_NAME,
            host,
            native: R::FIELD_NAMES.len(),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: &HostValue) -> Self {
        MarshalError::TypeMismatch {
            expected,
            found: found.kind_name(),
        }
    }

    /// Whether this is an exception thrown inside the host
    pub fn is_host_exception(&self) -> bool {
        matches!(self, MarshalError::Host(HostError::Exception(_)))
    }
}

/// A native type that can cross the host boundary
pub trait Marshal: Sized {
    const KIND: FieldKind;

    /// Name used in diagnostics
    const TYPE_NAME: &'static str;

    /// Value used for missing data (null references, failed list items)
    fn zero() -> Self;

    /// Convert a host value read from a field or element
    fn read_value(cx: &MarshalContext<'_>, value: HostValue) -> Result<Self, MarshalError>;

    /// Produce the host value to store in `slot`
    ///
    /// Reference and record types reuse `slot.existing` where they can and
    /// allocate an instance of `slot.class` otherwise.
    fn write_value(&self, cx: &MarshalContext<'_>, slot: Slot) -> Result<HostValue, MarshalError>;

    /// Check, without touching any object, that values of this type can be
    /// written to a slot of `class`
    fn verify_class(
        _cx: &MarshalContext<'_>,
        _class: Option<ClassRef>,
        _seen: &mut HashSet<ClassRef>,
    ) -> Result<(), MarshalError> {
        Ok(())
    }
}

/// A generated record; implemented by `#[derive(HostRecord)]`
pub trait Record: Marshal {
    const NAMESPACE: &'static str;
    const CLASS_NAME: &'static str;
    /// Host field names in declaration order
    const FIELD_NAMES: &'static [&'static str];

    /// Read every field; `fields` is the matched host layout
    fn read_fields(
        cx: &MarshalContext<'_>,
        obj: ObjectRef,
        fields: &[FieldRef],
    ) -> Result<Self, MarshalError>;

    /// Write every field; `fields` is the matched host layout
    fn write_fields(
        &self,
        cx: &MarshalContext<'_>,
        obj: ObjectRef,
        fields: &[FieldRef],
    ) -> Result<(), MarshalError>;

    /// Verify every field type against the matched host layout
    fn verify_fields(
        cx: &MarshalContext<'_>,
        fields: &[FieldRef],
        seen: &mut HashSet<ClassRef>,
    ) -> Result<(), MarshalError>;
}

/// Per-call state threaded through every marshalling operation
pub struct MarshalContext<'s> {
    session: &'s HostSession,
    matching: FieldMatching,
    io: IoConfig,
    /// Host field lists per class
    layouts: DashMap<ClassRef, Vec<FieldRef>>,
    /// (class, native record type) pairs already checked for positional name drift
    drift_checked: DashSet<(ClassRef, &'static str)>,
}

impl<'s> MarshalContext<'s> {
    /// Positional matching, default file extensions
    pub fn new(session: &'s HostSession) -> Self {
        Self {
            session,
            matching: FieldMatching::default(),
            io: IoConfig::default(),
            layouts: DashMap::new(),
            drift_checked: DashSet::new(),
        }
    }

    /// Context configured from the `[marshal]` and `[io]` sections
    pub fn from_config(session: &'s HostSession, config: &BridgeConfig) -> Self {
        Self {
            matching: config.marshal.field_matching,
            io: config.io.clone(),
            ..Self::new(session)
        }
    }

    pub fn with_matching(mut self, matching: FieldMatching) -> Self {
        self.matching = matching;
        self
    }

    pub fn session(&self) -> &'s HostSession {
        self.session
    }

    pub fn host(&self) -> &'s dyn RuntimeHost {
        self.session.host()
    }

    pub fn matching(&self) -> FieldMatching {
        self.matching
    }

    /// File extension settings used when persisting
    pub fn io(&self) -> &IoConfig {
        &self.io
    }

    /// Allocate and construct an instance of `class`
    pub fn allocate(&self, class: ClassRef) -> Result<ObjectRef, MarshalError> {
        let obj = self.session.create_instance(class)?;
        trace!("Allocated {} of {}", obj, class);
        Ok(obj)
    }

    fn host_fields(&self, class: ClassRef) -> Result<Vec<FieldRef>, MarshalError> {
        if let Some(fields) = self.layouts.get(&class) {
            return Ok(fields.clone());
        }
        let fields = self.host().class_fields(class)?;
        self.layouts.insert(class, fields.clone());
        Ok(fields)
    }

    /// Host fields of `class` in the order `R` declares its fields
    pub fn class_layout<R: Record>(&self, class: ClassRef) -> Result<Vec<FieldRef>, MarshalError> {
        let fields = self.host_fields(class)?;
        if fields.len() != R::FIELD_NAMES.len() {
            error!(
                "Field count mismatch for {}: host {} has {} fields, native declares {}",
                R::TYPE_NAME,
                class,
                fields.len(),
                R::FIELD_NAMES.len()
            );
            return Err(MarshalError::field_count::<R>(fields.len()));
        }

        match self.matching {
            FieldMatching::Positional => {
                if self.drift_checked.insert((class, std::any::type_name::<R>())) {
                    self.check_drift::<R>(&fields)?;
                }
                Ok(fields)
            }
            FieldMatching::ByName => self.match_by_name::<R>(&fields),
        }
    }

    fn check_drift<R: Record>(&self, fields: &[FieldRef]) -> Result<(), MarshalError> {
        for (position, (&field, native)) in fields.iter().zip(R::FIELD_NAMES).enumerate() {
            let host_name = self.host().field_info(field)?.name;
            if host_name != *native {
                warn!(
                    "{} field {} ({}) is matched by position with host field {}",
                    R::TYPE_NAME,
                    position,
                    native,
                    host_name
                );
            }
        }
        Ok(())
    }

    fn match_by_name<R: Record>(&self, fields: &[FieldRef]) -> Result<Vec<FieldRef>, MarshalError> {
        let named = fields
            .iter()
            .map(|&f| Ok((self.host().field_info(f)?.name, f)))
            .collect::<Result<Vec<_>, HostError>>()?;

        R::FIELD_NAMES
            .iter()
            .map(|&native| {
                let mut matches = named.iter().filter(|(name, _)| name == native);
                match (matches.next(), matches.next()) {
                    (Some(&(_, field)), None) => Ok(field),
                    _ => Err(MarshalError::FieldNotFound {
                        type_name: R::TYPE_NAME,
                        field: native,
                    }),
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for MarshalContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarshalContext")
            .field("matching", &self.matching)
            .field("cached_layouts", &self.layouts.len())
            .finish()
    }
}

// ============================================================================
// Building blocks used by the derive macros
// ============================================================================

/// Read one field of `obj`
pub fn read_field<T: Marshal>(
    cx: &MarshalContext<'_>,
    obj: ObjectRef,
    field: FieldRef,
) -> Result<T, MarshalError> {
    let value = cx.host().get_field(obj, field)?;
    trace!("Read {} = {} as {}", field, value, T::TYPE_NAME);
    T::read_value(cx, value)
}

/// Write one field of `obj`
pub fn write_field<T: Marshal>(
    cx: &MarshalContext<'_>,
    obj: ObjectRef,
    field: FieldRef,
    value: &T,
) -> Result<(), MarshalError> {
    let host = cx.host();
    let slot = Slot {
        existing: host.get_field(obj, field)?,
        class: host.field_info(field)?.type_class,
    };
    let new_value = value.write_value(cx, slot)?;
    trace!("Write {} = {} from {}", field, new_value, T::TYPE_NAME);
    host.set_field(obj, field, new_value)?;
    Ok(())
}

/// Verify one field's type
pub fn verify_field<T: Marshal>(
    cx: &MarshalContext<'_>,
    field: FieldRef,
    seen: &mut HashSet<ClassRef>,
) -> Result<(), MarshalError> {
    let class = cx.host().field_info(field)?.type_class;
    T::verify_class(cx, class, seen)
}

/// Read a record from a host object
pub fn read_record<R: Record>(cx: &MarshalContext<'_>, obj: ObjectRef) -> Result<R, MarshalError> {
    let class = cx.host().object_class(obj)?;
    let fields = cx.class_layout::<R>(class)?;
    debug!("Reading {} from {}", R::TYPE_NAME, obj);
    R::read_fields(cx, obj, &fields)
}

/// Read a nested record; a null reference reads as the zero record
pub fn read_record_value<R: Record>(
    cx: &MarshalContext<'_>,
    value: HostValue,
) -> Result<R, MarshalError> {
    match value {
        HostValue::Null => Ok(R::zero()),
        HostValue::Object(obj) => read_record(cx, obj),
        other => Err(MarshalError::mismatch(R::TYPE_NAME, &other)),
    }
}

/// Write a record into an existing host object
pub fn write_record<R: Record>(
    cx: &MarshalContext<'_>,
    value: &R,
    obj: ObjectRef,
) -> Result<(), MarshalError> {
    let class = cx.host().object_class(obj)?;
    let fields = cx.class_layout::<R>(class)?;
    debug!("Writing {} to {}", R::TYPE_NAME, obj);
    value.write_fields(cx, obj, &fields)
}

/// Write a nested record, reusing the existing object or allocating one
pub fn write_record_value<R: Record>(
    cx: &MarshalContext<'_>,
    value: &R,
    slot: Slot,
) -> Result<HostValue, MarshalError> {
    let obj = match slot.existing {
        HostValue::Object(obj) => obj,
        HostValue::Null => {
            let class = match slot.class {
                Some(class) => class,
                None => cx.session().class(R::NAMESPACE, R::CLASS_NAME)?,
            };
            cx.allocate(class)?
        }
        other => return Err(MarshalError::mismatch(R::TYPE_NAME, &other)),
    };
    write_record(cx, value, obj)?;
    Ok(HostValue::Object(obj))
}

/// Verify a record class and, recursively, every class reachable from it
pub fn verify_record_class<R: Record>(
    cx: &MarshalContext<'_>,
    class: Option<ClassRef>,
    seen: &mut HashSet<ClassRef>,
) -> Result<(), MarshalError> {
    let Some(class) = class else {
        return Ok(());
    };
    if !seen.insert(class) {
        return Ok(());
    }
    let fields = cx.class_layout::<R>(class)?;
    R::verify_fields(cx, &fields, seen)
}

/// Nullable record reference; generated code uses it where records reach
/// each other by value
impl<R: Record> Marshal for Option<Box<R>> {
    const KIND: FieldKind = FieldKind::Record;
    const TYPE_NAME: &'static str = R::TYPE_NAME;

    fn zero() -> Self {
        None
    }

    fn read_value(cx: &MarshalContext<'_>, value: HostValue) -> Result<Self, MarshalError> {
        match value {
            HostValue::Null => Ok(None),
            other => read_record_value::<R>(cx, other).map(|record| Some(Box::new(record))),
        }
    }

    /// `None` clears the reference
    fn write_value(&self, cx: &MarshalContext<'_>, slot: Slot) -> Result<HostValue, MarshalError> {
        match self {
            Some(record) => write_record_value(cx, record.as_ref(), slot),
            None => Ok(HostValue::Null),
        }
    }

    fn verify_class(
        cx: &MarshalContext<'_>,
        class: Option<ClassRef>,
        seen: &mut HashSet<ClassRef>,
    ) -> Result<(), MarshalError> {
        verify_record_class::<R>(cx, class, seen)
    }
}

/// Read an enum from its underlying integer
pub fn read_enum_value<E>(
    value: HostValue,
    type_name: &'static str,
    from_raw: impl FnOnce(i64) -> Option<E>,
) -> Result<E, MarshalError> {
    let raw = value
        .as_i64()
        .ok_or_else(|| MarshalError::mismatch(type_name, &value))?;
    from_raw(raw).ok_or(MarshalError::InvalidEnumValue {
        type_name,
        value: raw,
    })
}

// ============================================================================
// Public API
// ============================================================================

/// Read the record a handle references
///
/// # Panics
///
/// If the handle has been released.
#[tracing::instrument(skip_all, fields(record = R::TYPE_NAME))]
pub fn read_from_host<R: Record>(
    cx: &MarshalContext<'_>,
    handle: &ResourceHandle,
) -> Result<R, MarshalError> {
    let obj = handle.object().ok_or(MarshalError::UnboundHandle)?;
    read_record(cx, obj)
}

/// Overwrite the record a handle references
///
/// Every record class reachable from the object is checked before the
/// first field is written; on error nothing has been modified.
///
/// # Panics
///
/// If the handle has been released.
#[tracing::instrument(skip_all, fields(record = R::TYPE_NAME))]
pub fn write_to_host<R: Record>(
    cx: &MarshalContext<'_>,
    value: &R,
    handle: &ResourceHandle,
) -> Result<(), MarshalError> {
    let obj = handle.object().ok_or(MarshalError::UnboundHandle)?;
    let class = cx.host().object_class(obj)?;
    R::verify_class(cx, Some(class), &mut HashSet::new())?;
    write_record(cx, value, obj)
}

/// Write a record into a freshly allocated host object
#[tracing::instrument(skip_all, fields(record = R::TYPE_NAME))]
pub fn push_new<R: Record>(
    cx: &MarshalContext<'_>,
    value: &R,
) -> Result<ResourceHandle, MarshalError> {
    let class = cx.session().class(R::NAMESPACE, R::CLASS_NAME)?;
    R::verify_class(cx, Some(class), &mut HashSet::new())?;
    let obj = cx.allocate(class)?;
    write_record(cx, value, obj)?;
    Ok(ResourceHandle::from_object(obj))
}

/// Load (if needed), read, edit, write back and persist to the handle's path
///
/// Returns the edited value.
#[tracing::instrument(skip_all, fields(record = R::TYPE_NAME))]
pub fn immediate_edit<R: Record>(
    cx: &MarshalContext<'_>,
    handle: &mut ResourceHandle,
    edit: impl FnOnce(&mut R),
) -> Result<R, MarshalError> {
    if !handle.is_bound() {
        handle.load(cx.session())?;
    }
    let mut value = read_from_host::<R>(cx, handle)?;
    edit(&mut value);
    write_to_host(cx, &value, handle)?;
    handle.persist_with(cx.session(), cx.io())?;
    Ok(value)
}
