//! Fixed arrays and dynamic lists
//!
//! `[T; N]` maps to a host array of exactly `N` elements. `Vec<T>` maps to
//! either a host array (for unsized `T[]` fields) or a generic list, decided
//! by the host class at run time. Lists are driven through their
//! `get_Count`/`get_Item`/`Clear`/`Add` members.

use std::collections::HashSet;

use tracing::{debug, warn};

use mbinbridge_host::HostError;
use mbinbridge_sdk::{names, ClassRef, HostValue, ObjectRef};

use super::{FieldKind, Marshal, MarshalContext, MarshalError, Slot};

impl<T: Marshal, const N: usize> Marshal for [T; N] {
    const KIND: FieldKind = FieldKind::Reference;
    const TYPE_NAME: &'static str = "array";

    fn zero() -> Self {
        std::array::from_fn(|_| T::zero())
    }

    /// Elements past the host array's end read as zero
    fn read_value(cx: &MarshalContext<'_>, value: HostValue) -> Result<Self, MarshalError> {
        let array = match value {
            HostValue::Null => return Ok(Self::zero()),
            HostValue::Object(array) => array,
            other => return Err(MarshalError::mismatch(Self::TYPE_NAME, &other)),
        };

        let len = cx.host().array_len(array)?;
        if len != N {
            warn!(
                "Host array {} has {} elements, native array of {} has {}",
                array,
                len,
                T::TYPE_NAME,
                N
            );
        }

        let mut out = Self::zero();
        for (i, item) in out.iter_mut().enumerate().take(len) {
            *item = T::read_value(cx, cx.host().array_get(array, i)?)?;
        }
        Ok(out)
    }

    fn write_value(&self, cx: &MarshalContext<'_>, slot: Slot) -> Result<HostValue, MarshalError> {
        let host = cx.host();
        let reuse = match slot.existing {
            HostValue::Object(array) => {
                let len = host.array_len(array)?;
                if len != N {
                    debug!("Replacing host array {} of {} elements with {}", array, len, N);
                }
                (len == N).then_some(array)
            }
            HostValue::Null => None,
            other => return Err(MarshalError::mismatch(Self::TYPE_NAME, &other)),
        };

        let array = match reuse {
            Some(array) => array,
            None => {
                let array_class = slot.class.ok_or(MarshalError::MissingClass(Self::TYPE_NAME))?;
                host.new_array(host.array_element_class(array_class)?, N)?
            }
        };
        write_elements(cx, array, self)?;
        Ok(HostValue::Object(array))
    }

    fn verify_class(
        cx: &MarshalContext<'_>,
        class: Option<ClassRef>,
        seen: &mut HashSet<ClassRef>,
    ) -> Result<(), MarshalError> {
        let Some(class) = class else {
            return Ok(());
        };
        let element = cx.host().array_element_class(class)?;
        T::verify_class(cx, Some(element), seen)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    const KIND: FieldKind = FieldKind::Reference;
    const TYPE_NAME: &'static str = "Vec";

    fn zero() -> Self {
        Vec::new()
    }

    fn read_value(cx: &MarshalContext<'_>, value: HostValue) -> Result<Self, MarshalError> {
        let obj = match value {
            HostValue::Null => return Ok(Vec::new()),
            HostValue::Object(obj) => obj,
            other => return Err(MarshalError::mismatch(Self::TYPE_NAME, &other)),
        };

        let host = cx.host();
        let class = host.object_class(obj)?;
        if array_element(cx, class)?.is_some() {
            let len = host.array_len(obj)?;
            return (0..len)
                .map(|i| T::read_value(cx, host.array_get(obj, i)?))
                .collect();
        }
        read_list(cx, class, obj)
    }

    fn write_value(&self, cx: &MarshalContext<'_>, slot: Slot) -> Result<HostValue, MarshalError> {
        let host = cx.host();
        let class = match slot.existing {
            HostValue::Object(obj) => host.object_class(obj)?,
            HostValue::Null => slot.class.ok_or(MarshalError::MissingClass(Self::TYPE_NAME))?,
            other => return Err(MarshalError::mismatch(Self::TYPE_NAME, &other)),
        };

        if let Some(element) = array_element(cx, class)? {
            let array = match slot.existing {
                HostValue::Object(array) if host.array_len(array)? == self.len() => array,
                _ => host.new_array(element, self.len())?,
            };
            write_elements(cx, array, self)?;
            return Ok(HostValue::Object(array));
        }

        let list = match slot.existing {
            HostValue::Object(list) => list,
            _ => cx.allocate(class)?,
        };
        write_list(cx, class, list, self)?;
        Ok(HostValue::Object(list))
    }

    fn verify_class(
        cx: &MarshalContext<'_>,
        class: Option<ClassRef>,
        seen: &mut HashSet<ClassRef>,
    ) -> Result<(), MarshalError> {
        let Some(class) = class else {
            return Ok(());
        };
        let element = match array_element(cx, class)? {
            Some(element) => element,
            None => cx.host().method_param_class(class, names::ADD, 1, 0)?,
        };
        T::verify_class(cx, Some(element), seen)
    }
}

/// Element class of `class`, or `None` if it is not an array class
fn array_element(
    cx: &MarshalContext<'_>,
    class: ClassRef,
) -> Result<Option<ClassRef>, MarshalError> {
    match cx.host().array_element_class(class) {
        Ok(element) => Ok(Some(element)),
        Err(HostError::NotAnArrayClass(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Transfer `items` into a host array of the same length by index
fn write_elements<T: Marshal>(
    cx: &MarshalContext<'_>,
    array: ObjectRef,
    items: &[T],
) -> Result<(), MarshalError> {
    let host = cx.host();
    let element = host.array_element_class(host.object_class(array)?)?;
    for (i, item) in items.iter().enumerate() {
        let slot = Slot {
            existing: host.array_get(array, i)?,
            class: Some(element),
        };
        let value = item.write_value(cx, slot)?;
        host.array_set(array, i, value)?;
    }
    Ok(())
}

/// Read every list item; an item the host fails to produce reads as zero
fn read_list<T: Marshal>(
    cx: &MarshalContext<'_>,
    class: ClassRef,
    list: ObjectRef,
) -> Result<Vec<T>, MarshalError> {
    let session = cx.session();
    let count = match session.invoke(class, names::GET_COUNT, Some(list), &[])? {
        HostValue::I32(count) => usize::try_from(count).unwrap_or(0),
        other => return Err(MarshalError::mismatch("System.Int32", &other)),
    };

    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let index = HostValue::I32(i as i32);
        let item = match session.invoke(class, names::GET_ITEM, Some(list), &[index]) {
            Ok(item) => item,
            Err(HostError::Exception(_)) => {
                warn!("List {} item {} unavailable, using zero {}", list, i, T::TYPE_NAME);
                items.push(T::zero());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let item = match item {
            HostValue::Object(boxed) if T::KIND == FieldKind::Value => cx.host().unbox(boxed)?,
            other => other,
        };
        items.push(T::read_value(cx, item)?);
    }
    Ok(items)
}

/// Replace the list's content with `items`
///
/// Elements the host fails to construct or add are logged and skipped.
fn write_list<T: Marshal>(
    cx: &MarshalContext<'_>,
    class: ClassRef,
    list: ObjectRef,
    items: &[T],
) -> Result<(), MarshalError> {
    let session = cx.session();
    let host = cx.host();
    session.invoke(class, names::CLEAR, Some(list), &[])?;
    let element = host.method_param_class(class, names::ADD, 1, 0)?;

    for (i, item) in items.iter().enumerate() {
        let value = match item.write_value(cx, Slot::empty(Some(element))) {
            Ok(value) => value,
            Err(e) if e.is_host_exception() => {
                warn!("Skipping element {} of list {}: {}", i, list, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let arg = match T::KIND {
            FieldKind::Value => HostValue::Object(host.box_value(element, value)?),
            _ => value,
        };
        match session.invoke(class, names::ADD, Some(list), &[arg]) {
            Ok(_) => {}
            Err(HostError::Exception(exception)) => {
                warn!("Skipping element {} of list {}: {}", i, list, exception);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
