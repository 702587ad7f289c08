//! mbinbridge Proc Macros
//!
//! This crate provides the derive macros that connect generated record types
//! to the marshalling engine:
//!
//! - `#[derive(HostRecord)]` - Positional field marshalling for a host record
//! - `#[derive(HostEnum)]` - Integer conversion for a host enum
//!
//! # Example
//!
//! ```ignore
//! use mbinbridge_core::{HostEnum, HostRecord};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, HostEnum)]
//! #[repr(i32)]
//! pub enum GcBiomeType {
//!     Lush = 0,
//!     Toxic = 1,
//! }
//!
//! #[derive(Debug, Clone, PartialEq, HostRecord)]
//! #[record(namespace = "libMBIN.NMS.GameComponents", class = "GcBiomeData")]
//! pub struct GcBiomeData {
//!     pub Biome: GcBiomeType,
//!     pub FuelMultiplier: f32,
//!     #[record(rename = "Type")]
//!     pub r#Type: i32,
//! }
//! ```
//!
//! # Attributes
//!
//! ## Struct Attributes (HostRecord)
//!
//! - `#[record(namespace = "...")]` - **Required.** The host namespace.
//! - `#[record(class = "...")]` - Optional. The host class name (default: struct name).
//!
//! ## Field Attributes (HostRecord)
//!
//! - `#[record(rename = "...")]` - Host field name when it is not a valid identifier.
//!
//! ## Enum Attributes (HostEnum)
//!
//! - `#[repr(..)]` - Underlying integer width (default: `i32`).
//! - `#[host_enum(name = "...")]` - Optional. The host type name.
//!
//! Field order is significant: fields are matched to host fields by position,
//! so the struct must declare them in the host's declaration order.

mod host_enum;
mod parse;
mod record;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for host records
///
/// # Generated Code
///
/// - `impl Record` - namespace, class name, host field names in declaration
///   order, and positional read/write/verify over a resolved field layout
/// - `impl Marshal` - so the record can appear as a field, array element or
///   list element of another record
#[proc_macro_derive(HostRecord, attributes(record))]
pub fn derive_host_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::derive_host_record(input).into()
}

/// Derive macro for host enums
///
/// Only unit variants are supported. The enum must have at least one variant.
///
/// # Generated Code
///
/// - `fn from_raw(i64) -> Option<Self>` and `fn to_raw(&self) -> i64`
/// - `impl Marshal` - copies the underlying integer at the declared width;
///   unknown values read from the host are an error
#[proc_macro_derive(HostEnum, attributes(host_enum))]
pub fn derive_host_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    host_enum::derive_host_enum(input).into()
}
