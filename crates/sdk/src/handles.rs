//! Opaque host reference types
//!
//! The hosted runtime hands out references to its assemblies, classes, fields
//! and object instances. We never look inside them - they are just tokens the
//! host understands. Each reference is a plain `u64` so that any host backend
//! (an embedded runtime, a mock) can encode its own identifiers.

use std::fmt;

macro_rules! host_ref {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw host identifier
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw host identifier
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{:x}"), self.0)
            }
        }
    };
}

host_ref!(
    /// Reference to a loaded host assembly
    AssemblyRef,
    "assembly"
);

host_ref!(
    /// Reference to a host class (type definition)
    ClassRef,
    "class"
);

host_ref!(
    /// Reference to a field declared by a host class
    FieldRef,
    "field"
);

host_ref!(
    /// Reference to a live host object instance
    ///
    /// Strings, arrays, lists and boxed values are all objects on the host side.
    ObjectRef,
    "object"
);
