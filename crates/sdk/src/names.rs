//! Well-known host type and member names
//!
//! These match the managed asset library the bridge is built against.
//! Anything here that varies between library versions is also exposed
//! through configuration in the core crate.

/// Generic list type prefix
pub const LIST_MARKER: &str = "System.Collections.Generic.List";
/// Fixed-map type prefix (serialized as a list of entries)
pub const HASHMAP_MARKER: &str = "libMBIN.NMS.HashMap";

/// Implicit instance field holding an enum's underlying value
pub const ENUM_BACKING_FIELD: &str = "value__";

/// Instance constructor
pub const CTOR: &str = ".ctor";

// List members
pub const GET_COUNT: &str = "get_Count";
pub const GET_ITEM: &str = "get_Item";
pub const ADD: &str = "Add";
pub const CLEAR: &str = "Clear";

// File IO members
pub const LOAD_FILE: &str = "LoadFile";
pub const WRITE_MBIN: &str = "WriteToMbin";
pub const WRITE_EXML: &str = "WriteToExml";

/// Field attribute carrying size metadata
pub const SIZE_ATTRIBUTE: &str = "NMSAttribute";
/// Property of [`SIZE_ATTRIBUTE`] holding the fixed element count
pub const SIZE_PROPERTY: &str = "Size";

/// Root namespace of the asset library
pub const ROOT_NAMESPACE: &str = "libMBIN";
/// Root class every asset record derives from
pub const TEMPLATE_CLASS: &str = "NMSTemplate";
/// Class exposing the asset load entry point
pub const FILE_IO_CLASS: &str = "FileIO";
