//! Descriptor shim appended to every compiled crate.
//!
//! The shim lets the host read back what actually got compiled: size and
//! alignment of every described struct, plus name, type and offset of each
//! named field, measured inside the module itself.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Fields, Item, ItemMod, Type};

use crate::generator::module_items_mut;
use crate::loader::DESCRIBE_SYMBOL;
use crate::naming::{self, TypePath};

const MODULE_DESCRIBE_FN: &str = "__typeforge_describe_module";

pub(super) struct DescribedType {
    module: Vec<String>,
    full_name: TypePath,
    fields: Vec<(syn::Ident, Type)>,
}

fn collect_items(items: &[Item], path: &mut Vec<String>, out: &mut Vec<DescribedType>) {
    for item in items {
        match item {
            Item::Struct(item) if item.generics.params.is_empty() => {
                let fields = match &item.fields {
                    Fields::Named(fields) => fields
                        .named
                        .iter()
                        .filter_map(|f| Some((f.ident.clone()?, f.ty.clone())))
                        .collect(),
                    _ => Vec::new(),
                };
                out.push(DescribedType {
                    module: path.clone(),
                    full_name: TypePath::new(path.clone(), item.ident.to_string()),
                    fields,
                });
            }
            Item::Mod(ItemMod {
                ident,
                content: Some((_, items)),
                ..
            }) => {
                path.push(ident.to_string());
                collect_items(items, path, out);
                path.pop();
            }
            _ => {}
        }
    }
}

/// Every non-generic struct defined by the target units.
pub(super) fn collect(targets: &[syn::File]) -> Vec<DescribedType> {
    let mut out = Vec::new();
    for target in targets {
        collect_items(&target.items, &mut Vec::new(), &mut out);
    }
    out
}

fn describe_type(described: &DescribedType) -> TokenStream {
    let full_name = described.full_name.to_string();
    let ident = naming::ident(described.full_name.name());
    let fields = described.fields.iter().map(|(field, ty)| {
        let field_name = field.to_string();
        quote! {
            out.push_str(&::std::format!(
                "field\t{}\t{}\t{}\t{}\n",
                #full_name,
                #field_name,
                ::std::any::type_name::<#ty>(),
                ::std::mem::offset_of!(#ident, #field),
            ));
        }
    });
    quote! {
        out.push_str(&::std::format!(
            "type\t{}\t{}\t{}\n",
            #full_name,
            ::std::mem::size_of::<#ident>(),
            ::std::mem::align_of::<#ident>(),
        ));
        #(#fields)*
    }
}

/// Adds a describe function to every module holding described types and the
/// exported entry point at the crate root.
pub(super) fn append(krate: &mut syn::File, described: &[DescribedType]) {
    let module_fn = naming::ident(MODULE_DESCRIBE_FN);
    let mut modules: Vec<&[String]> = Vec::new();
    for d in described {
        if !modules.contains(&d.module.as_slice()) {
            modules.push(&d.module);
        }
    }

    let mut calls = Vec::with_capacity(modules.len());
    for module in modules {
        let body = described
            .iter()
            .filter(|d| d.module == module)
            .map(describe_type);
        let function: Item = syn::parse_quote! {
            #[doc(hidden)]
            pub(crate) fn #module_fn(out: &mut ::std::string::String) {
                #(#body)*
            }
        };
        // the module exists: it was created from the very units being described
        if let Some(items) = module_items_mut(&mut krate.items, module) {
            items.push(function);
            let path = TypePath::new(module.to_vec(), MODULE_DESCRIBE_FN).to_crate_path();
            calls.push(path);
        }
    }

    let entry = naming::ident(DESCRIBE_SYMBOL);
    krate.items.push(syn::parse_quote! {
        #[doc(hidden)]
        #[no_mangle]
        pub extern "C" fn #entry() -> *const ::std::os::raw::c_char {
            static DESCRIPTOR: ::std::sync::OnceLock<::std::ffi::CString> =
                ::std::sync::OnceLock::new();
            DESCRIPTOR
                .get_or_init(|| {
                    let mut out = ::std::string::String::new();
                    #(#calls(&mut out);)*
                    ::std::ffi::CString::new(out).unwrap_or_default()
                })
                .as_ptr()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_type;

    #[test]
    fn collects_named_structs_with_their_modules() {
        let unit = syn::parse_file(
            "pub mod models { pub mod generated {
                pub struct Employee { pub id: u128, pub Salary: f64 }
                pub struct Wrapper<T> { pub inner: T }
                pub struct Marker;
            } }",
        )
        .unwrap();
        let described = collect(&[unit]);
        let names: Vec<String> = described.iter().map(|d| d.full_name.to_string()).collect();
        assert_eq!(
            names,
            ["models::generated::Employee", "models::generated::Marker"]
        );
        assert_eq!(described[0].module, ["models", "generated"]);
        assert_eq!(described[0].fields.len(), 2);
        assert!(described[1].fields.is_empty());
    }

    #[test]
    fn shim_is_placed_next_to_the_types() {
        let unit = syn::parse_file(&generate_type(
            "Employee",
            &["models".into(), "generated".into()],
        ))
        .unwrap();
        let described = collect(std::slice::from_ref(&unit));
        let mut krate = unit;
        append(&mut krate, &described);
        let text = prettyplease::unparse(&krate);

        assert!(text.contains("#[no_mangle]"));
        assert!(text.contains("pub extern \"C\" fn __typeforge_describe()"));
        assert!(text.contains("crate::models::generated::__typeforge_describe_module(&mut out)"));
        assert!(text.contains("fn __typeforge_describe_module(out: &mut ::std::string::String)"));
        assert!(text.contains("offset_of"));
        assert!(text.contains("size_of"));
        syn::parse_file(&text).unwrap();
    }
}
