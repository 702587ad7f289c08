//! mbinbridge SDK - Runtime Host Boundary Types
//!
//! This crate contains the opaque reference types and plain data records that
//! cross the boundary between native code and the hosted object model.
//! It has no required dependencies and compiles quickly, allowing parallel
//! compilation of dependent crates.
//!
//! # Modules
//!
//! - [`handles`] - Opaque references to host assemblies, classes, objects and fields
//! - [`value`] - Values moved across the boundary and primitive type tables
//! - [`reflect`] - Reflection records returned by the host
//! - [`names`] - Well-known host member and type names

pub mod handles;
pub mod names;
pub mod reflect;
pub mod value;

pub use handles::*;
pub use reflect::*;
pub use value::*;
