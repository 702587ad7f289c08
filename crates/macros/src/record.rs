//! HostRecord derive macro implementation

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::DeriveInput;

use crate::parse::{parse_record, RecordArgs};

/// Generate the HostRecord implementation
pub fn derive_host_record(input: DeriveInput) -> TokenStream {
    match parse_record(&input) {
        Ok(args) => generate_impl(args),
        Err(e) => e.write_errors(),
    }
}

fn generate_impl(args: RecordArgs) -> TokenStream {
    if !args.generics.params.is_empty() {
        return syn::Error::new_spanned(&args.generics, "HostRecord cannot be derived for generic structs")
            .to_compile_error();
    }

    let struct_name = &args.ident;
    let namespace = &args.namespace;
    let class_name = args.class_name();
    let type_name = format!("{namespace}.{class_name}");

    let fields = match &args.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        _ => {
            return syn::Error::new_spanned(struct_name, "HostRecord can only be derived for structs")
                .to_compile_error()
        }
    };

    let idents: Vec<_> = fields.iter().filter_map(|f| f.ident.as_ref()).collect();
    let types: Vec<_> = fields.iter().map(|f| &f.ty).collect();
    let host_names: Vec<_> = fields.iter().filter_map(|f| f.host_name()).collect();
    let slots: Vec<_> = (0..fields.len()).map(|i| format_ident!("__field{}", i)).collect();

    let core = quote!(::mbinbridge_core);
    let marshal = quote!(#core::marshal);
    let result = quote!(::std::result::Result);

    quote! {
        impl #marshal::Record for #struct_name {
            const NAMESPACE: &'static str = #namespace;
            const CLASS_NAME: &'static str = #class_name;
            const FIELD_NAMES: &'static [&'static str] = &[#(#host_names),*];

            #[allow(unused_variables)]
            fn read_fields(
                cx: &#marshal::MarshalContext<'_>,
                obj: #core::sdk::ObjectRef,
                fields: &[#core::sdk::FieldRef],
            ) -> #result<Self, #marshal::MarshalError> {
                let &[#(#slots),*] = fields else {
                    return #result::Err(#marshal::MarshalError::field_count::<Self>(fields.len()));
                };
                #result::Ok(Self {
                    #(#idents: #marshal::read_field(cx, obj, #slots)?,)*
                })
            }

            #[allow(unused_variables)]
            fn write_fields(
                &self,
                cx: &#marshal::MarshalContext<'_>,
                obj: #core::sdk::ObjectRef,
                fields: &[#core::sdk::FieldRef],
            ) -> #result<(), #marshal::MarshalError> {
                let &[#(#slots),*] = fields else {
                    return #result::Err(#marshal::MarshalError::field_count::<Self>(fields.len()));
                };
                #(#marshal::write_field(cx, obj, #slots, &self.#idents)?;)*
                #result::Ok(())
            }

            #[allow(unused_variables)]
            fn verify_fields(
                cx: &#marshal::MarshalContext<'_>,
                fields: &[#core::sdk::FieldRef],
                seen: &mut ::std::collections::HashSet<#core::sdk::ClassRef>,
            ) -> #result<(), #marshal::MarshalError> {
                let &[#(#slots),*] = fields else {
                    return #result::Err(#marshal::MarshalError::field_count::<Self>(fields.len()));
                };
                #(#marshal::verify_field::<#types>(cx, #slots, seen)?;)*
                #result::Ok(())
            }
        }

        impl #marshal::Marshal for #struct_name {
            const KIND: #marshal::FieldKind = #marshal::FieldKind::Record;
            const TYPE_NAME: &'static str = #type_name;

            fn zero() -> Self {
                Self {
                    #(#idents: <#types as #marshal::Marshal>::zero(),)*
                }
            }

            fn read_value(
                cx: &#marshal::MarshalContext<'_>,
                value: #core::sdk::HostValue,
            ) -> #result<Self, #marshal::MarshalError> {
                #marshal::read_record_value::<Self>(cx, value)
            }

            fn write_value(
                &self,
                cx: &#marshal::MarshalContext<'_>,
                slot: #marshal::Slot,
            ) -> #result<#core::sdk::HostValue, #marshal::MarshalError> {
                #marshal::write_record_value(cx, self, slot)
            }

            fn verify_class(
                cx: &#marshal::MarshalContext<'_>,
                class: ::std::option::Option<#core::sdk::ClassRef>,
                seen: &mut ::std::collections::HashSet<#core::sdk::ClassRef>,
            ) -> #result<(), #marshal::MarshalError> {
                #marshal::verify_record_class::<Self>(cx, class, seen)
            }
        }
    }
}
