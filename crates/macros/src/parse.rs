//! Attribute parsing for the HostRecord and HostEnum derive macros

use darling::{FromDeriveInput, FromField, FromVariant};
use syn::ext::IdentExt;
use syn::{Attribute, DeriveInput, Generics, Ident, Type};

/// Parsed #[record(...)] attributes on the struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(record), supports(struct_named))]
pub struct RecordArgs {
    /// Struct identifier
    pub ident: Ident,

    pub generics: Generics,

    /// Struct fields
    pub data: darling::ast::Data<(), RecordFieldArgs>,

    /// Host namespace (e.g., "libMBIN.NMS.GameComponents")
    pub namespace: String,

    /// Host class name, defaults to the struct name
    #[darling(rename = "class")]
    pub class_name: Option<String>,
}

impl RecordArgs {
    /// Host class name
    pub fn class_name(&self) -> String {
        self.class_name
            .clone()
            .unwrap_or_else(|| self.ident.unraw().to_string())
    }
}

/// Parsed #[record(...)] attributes on a field
#[derive(Debug, FromField)]
#[darling(attributes(record))]
pub struct RecordFieldArgs {
    /// Field identifier
    pub ident: Option<Ident>,

    /// Field type
    pub ty: Type,

    /// Host field name when it differs from the Rust identifier
    pub rename: Option<String>,
}

impl RecordFieldArgs {
    /// Host field name (raw identifiers lose their `r#`)
    pub fn host_name(&self) -> Option<String> {
        self.rename
            .clone()
            .or_else(|| self.ident.as_ref().map(|i| i.unraw().to_string()))
    }
}

/// Parsed #[host_enum(...)] attributes on the enum
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(host_enum), supports(enum_unit), forward_attrs(repr))]
pub struct EnumArgs {
    /// Enum identifier
    pub ident: Ident,

    pub generics: Generics,

    /// Forwarded #[repr(...)] attributes
    pub attrs: Vec<Attribute>,

    pub data: darling::ast::Data<EnumVariantArgs, ()>,

    /// Host type name, defaults to the enum name
    pub name: Option<String>,
}

/// A single unit variant
#[derive(Debug, FromVariant)]
#[darling(attributes(host_enum))]
pub struct EnumVariantArgs {
    pub ident: Ident,
}

/// Parse a DeriveInput into RecordArgs
pub fn parse_record(input: &DeriveInput) -> darling::Result<RecordArgs> {
    RecordArgs::from_derive_input(input)
}

/// Parse a DeriveInput into EnumArgs
pub fn parse_enum(input: &DeriveInput) -> darling::Result<EnumArgs> {
    EnumArgs::from_derive_input(input)
}

/// Integer type named by `#[repr(..)]`, or `i32` when there is none
pub fn repr_type(attrs: &[Attribute]) -> syn::Result<Ident> {
    const INTEGERS: [&str; 8] = ["i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64"];

    let mut found = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("repr")) {
        attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                if INTEGERS.contains(&ident.to_string().as_str()) {
                    found = Some(ident.clone());
                }
            }
            Ok(())
        })?;
    }

    Ok(found.unwrap_or_else(|| Ident::new("i32", proc_macro2::Span::call_site())))
}
