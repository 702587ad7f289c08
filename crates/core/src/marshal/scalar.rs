//! Scalar and string field types

use mbinbridge_sdk::HostValue;

use super::{FieldKind, Marshal, MarshalContext, MarshalError, Slot};

macro_rules! marshal_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Marshal for $ty {
                const KIND: FieldKind = FieldKind::Value;
                const TYPE_NAME: &'static str = stringify!($ty);

                fn zero() -> Self {
                    <$ty>::default()
                }

                fn read_value(_cx: &MarshalContext<'_>, value: HostValue) -> Result<Self, MarshalError> {
                    match value {
                        HostValue::$variant(v) => Ok(v),
                        other => Err(MarshalError::mismatch(Self::TYPE_NAME, &other)),
                    }
                }

                fn write_value(&self, _cx: &MarshalContext<'_>, _slot: Slot) -> Result<HostValue, MarshalError> {
                    Ok(HostValue::$variant(*self))
                }
            }
        )*
    };
}

marshal_value! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl Marshal for String {
    const KIND: FieldKind = FieldKind::Reference;
    const TYPE_NAME: &'static str = "String";

    fn zero() -> Self {
        String::new()
    }

    /// Null strings read as empty
    fn read_value(cx: &MarshalContext<'_>, value: HostValue) -> Result<Self, MarshalError> {
        match value {
            HostValue::Null => Ok(String::new()),
            HostValue::Object(obj) => Ok(cx.host().read_string(obj)?),
            other => Err(MarshalError::mismatch(Self::TYPE_NAME, &other)),
        }
    }

    /// Always a new host string; host strings are immutable
    fn write_value(&self, cx: &MarshalContext<'_>, _slot: Slot) -> Result<HostValue, MarshalError> {
        Ok(HostValue::Object(cx.host().new_string(self)?))
    }
}
