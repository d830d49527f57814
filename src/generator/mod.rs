//! Source synthesis for generated types.
//!
//! A generated unit is an ordinary Rust file: the namespace is spelled out as
//! nested `pub mod` items and the type is a single struct inside the innermost
//! module. Edits always go through the syntax tree and the whole unit is
//! re-printed, so the persisted text stays well-formed.

mod resolve;

pub use resolve::TypeResolver;

use quote::ToTokens;
use syn::{parse_quote, Field, FieldMutability, Fields, Item, ItemMod, ItemStruct, Type};

use crate::error::{ForgeError, Result};
use crate::naming::{self, TypePath};
use crate::schema::{FieldKind, FieldSchema};

/// Field holding the identity of every generated type, a UUID kept as `u128`.
pub const IDENTITY_FIELD: &str = "id";
/// Field holding the required display name of every generated type.
pub const DISPLAY_NAME_FIELD: &str = "name";

fn wrap_in_namespace(namespace: &[String], items: Vec<Item>) -> Vec<Item> {
    namespace.iter().rev().fold(items, |items, segment| {
        let segment = naming::ident(segment);
        vec![parse_quote! {
            pub mod #segment {
                #(#items)*
            }
        }]
    })
}

/// Emits the initial unit for `type_name`: identity and display name only.
pub fn generate_type(type_name: &str, namespace: &[String]) -> String {
    let name = naming::ident(type_name);
    let id = naming::ident(IDENTITY_FIELD);
    let display_name = naming::ident(DISPLAY_NAME_FIELD);
    let item: Item = parse_quote! {
        #[derive(Default)]
        pub struct #name {
            /// UUID, stored as its 128-bit value.
            pub #id: u128,
            pub #display_name: String,
        }
    };

    let doc_comment = concat!("Generated by ", env!("CARGO_PKG_NAME"));
    let root = syn::File {
        shebang: None,
        attrs: vec![
            parse_quote!(#![doc = #doc_comment]),
            parse_quote!(#![allow(dead_code, non_snake_case, unused_imports)]),
        ],
        items: wrap_in_namespace(namespace, vec![item]),
    };
    prettyplease::unparse(&root)
}

fn locate<'a>(items: &'a [Item], type_name: &str, path: &mut Vec<String>) -> Option<&'a ItemStruct> {
    for item in items {
        match item {
            Item::Struct(item) if item.ident == type_name => return Some(item),
            Item::Mod(ItemMod {
                ident,
                content: Some((_, items)),
                ..
            }) => {
                path.push(ident.to_string());
                if let Some(found) = locate(items, type_name, path) {
                    return Some(found);
                }
                path.pop();
            }
            _ => {}
        }
    }
    None
}

/// Items of the inline module at `path`, the root items for an empty path.
pub(crate) fn module_items_mut<'a>(items: &'a mut Vec<Item>, path: &[String]) -> Option<&'a mut Vec<Item>> {
    let Some((first, rest)) = path.split_first() else {
        return Some(items);
    };
    items
        .iter_mut()
        .find_map(|item| match item {
            Item::Mod(ItemMod {
                ident,
                content: Some((_, items)),
                ..
            }) if ident == first => Some(items),
            _ => None,
        })
        .and_then(|items| module_items_mut(items, rest))
}

fn primitive_type(kind: FieldKind) -> Option<Type> {
    let ty = match kind {
        FieldKind::Int => parse_quote!(i32),
        FieldKind::Long => parse_quote!(i64),
        FieldKind::Double => parse_quote!(f64),
        FieldKind::Bool => parse_quote!(bool),
        FieldKind::String => parse_quote!(String),
        FieldKind::Reference => return None,
    };
    Some(ty)
}

/// Adds `field` to the struct `type_name` defined in `source` and returns the
/// re-printed unit. Persisting the result is up to the caller.
pub fn add_field(
    source: &str,
    type_name: &str,
    field: &FieldSchema,
    resolver: &dyn TypeResolver,
) -> Result<String> {
    let mut file =
        syn::parse_file(source).map_err(|e| ForgeError::malformed(type_name, e.to_string()))?;

    let mut namespace = Vec::new();
    let existing = locate(&file.items, type_name, &mut namespace)
        .ok_or_else(|| ForgeError::malformed(type_name, "no struct with that name"))?;
    let Fields::Named(fields) = &existing.fields else {
        return Err(ForgeError::malformed(type_name, "struct has no named fields"));
    };
    if fields
        .named
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|i| i == &field.name))
    {
        return Err(ForgeError::DuplicateField {
            type_name: type_name.to_string(),
            field: field.name.clone(),
        });
    }

    let (ty, import) = match primitive_type(field.kind) {
        Some(ty) => (ty, None),
        None => resolve::reference_type(field, &namespace, resolver)?,
    };

    let module = module_items_mut(&mut file.items, &namespace)
        .ok_or_else(|| ForgeError::malformed(type_name, "namespace module vanished"))?;
    if let Some(import) = import {
        resolve::insert_import(module, import);
    }
    let target = module
        .iter_mut()
        .find_map(|item| match item {
            Item::Struct(item) if item.ident == type_name => Some(item),
            _ => None,
        })
        .ok_or_else(|| ForgeError::malformed(type_name, "no struct with that name"))?;
    if let Fields::Named(fields) = &mut target.fields {
        fields.named.push(Field {
            attrs: vec![],
            vis: parse_quote!(pub),
            mutability: FieldMutability::None,
            ident: Some(naming::ident(&field.name)),
            colon_token: Some(Default::default()),
            ty,
        });
    }

    Ok(prettyplease::unparse(&file))
}

/// Fields declared on `type_name` in `source`, as `(name, type)` pairs.
pub fn declared_fields(source: &str, type_name: &str) -> Result<Vec<(String, String)>> {
    let file =
        syn::parse_file(source).map_err(|e| ForgeError::malformed(type_name, e.to_string()))?;
    let item = locate(&file.items, type_name, &mut Vec::new())
        .ok_or_else(|| ForgeError::malformed(type_name, "no struct with that name"))?;
    Ok(item
        .fields
        .iter()
        .filter_map(|f| {
            let name = f.ident.as_ref()?.to_string();
            let ty = f.ty.to_token_stream().to_string().replace(' ', "");
            Some((name, ty))
        })
        .collect())
}

/// Full path of `type_name` as declared by the module nesting of `source`.
pub fn type_path(source: &str, type_name: &str) -> Result<TypePath> {
    let file =
        syn::parse_file(source).map_err(|e| ForgeError::malformed(type_name, e.to_string()))?;
    let mut namespace = Vec::new();
    locate(&file.items, type_name, &mut namespace)
        .ok_or_else(|| ForgeError::malformed(type_name, "no struct with that name"))?;
    Ok(TypePath::new(namespace, type_name))
}
