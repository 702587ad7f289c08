//! HostEnum derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::parse::{parse_enum, repr_type, EnumArgs};

/// Generate the HostEnum implementation
pub fn derive_host_enum(input: DeriveInput) -> TokenStream {
    match parse_enum(&input) {
        Ok(args) => generate_impl(args),
        Err(e) => e.write_errors(),
    }
}

fn width_variant(repr: &syn::Ident) -> TokenStream {
    let variant = match repr.to_string().as_str() {
        "i8" => quote!(I8),
        "u8" => quote!(U8),
        "i16" => quote!(I16),
        "u16" => quote!(U16),
        "u32" => quote!(U32),
        "i64" => quote!(I64),
        "u64" => quote!(U64),
        _ => quote!(I32),
    };
    quote!(::mbinbridge_core::sdk::IntWidth::#variant)
}

fn generate_impl(args: EnumArgs) -> TokenStream {
    if !args.generics.params.is_empty() {
        return syn::Error::new_spanned(&args.generics, "HostEnum cannot be derived for generic enums")
            .to_compile_error();
    }

    let enum_name = &args.ident;
    let type_name = args
        .name
        .clone()
        .unwrap_or_else(|| enum_name.to_string());

    let repr = match repr_type(&args.attrs) {
        Ok(repr) => repr,
        Err(e) => return e.to_compile_error(),
    };
    let width = width_variant(&repr);

    let variants: Vec<_> = match &args.data {
        darling::ast::Data::Enum(variants) => variants.iter().map(|v| &v.ident).collect(),
        _ => {
            return syn::Error::new_spanned(enum_name, "HostEnum can only be derived for enums")
                .to_compile_error()
        }
    };
    let Some(first) = variants.first() else {
        return syn::Error::new_spanned(enum_name, "HostEnum requires at least one variant")
            .to_compile_error();
    };

    let core = quote!(::mbinbridge_core);
    let marshal = quote!(#core::marshal);
    let result = quote!(::std::result::Result);

    quote! {
        impl #enum_name {
            /// Host type name
            pub const HOST_NAME: &'static str = #type_name;

            /// Variant with the given underlying value
            pub fn from_raw(raw: i64) -> ::std::option::Option<Self> {
                #(
                    if raw == Self::#variants as #repr as i64 {
                        return ::std::option::Option::Some(Self::#variants);
                    }
                )*
                ::std::option::Option::None
            }

            /// Underlying value
            pub fn to_raw(&self) -> i64 {
                match self {
                    #(Self::#variants => Self::#variants as #repr as i64,)*
                }
            }
        }

        impl #marshal::Marshal for #enum_name {
            const KIND: #marshal::FieldKind = #marshal::FieldKind::Value;
            const TYPE_NAME: &'static str = #type_name;

            fn zero() -> Self {
                Self::from_raw(0).unwrap_or(Self::#first)
            }

            fn read_value(
                _cx: &#marshal::MarshalContext<'_>,
                value: #core::sdk::HostValue,
            ) -> #result<Self, #marshal::MarshalError> {
                #marshal::read_enum_value(value, Self::TYPE_NAME, Self::from_raw)
            }

            fn write_value(
                &self,
                _cx: &#marshal::MarshalContext<'_>,
                _slot: #marshal::Slot,
            ) -> #result<#core::sdk::HostValue, #marshal::MarshalError> {
                #result::Ok(#core::sdk::HostValue::integral(#width, self.to_raw()))
            }
        }
    }
}
