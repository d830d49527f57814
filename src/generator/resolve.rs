use syn::{parse_quote, Item, ItemUse, Type};

use crate::error::{ForgeError, Result};
use crate::naming::{self, TypePath};
use crate::schema::FieldSchema;

/// Looks up types that are loaded in the process.
pub trait TypeResolver {
    /// The full path of the most recently loaded type named `path`.
    fn resolve(&self, path: &TypePath) -> Option<TypePath>;
}

/// Field type and optional namespace import for a reference field declared
/// inside `current_namespace`.
pub(super) fn reference_type(
    field: &FieldSchema,
    current_namespace: &[String],
    resolver: &dyn TypeResolver,
) -> Result<(Type, Option<ItemUse>)> {
    let requested = field
        .reference_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ForgeError::InvalidReference(field.name.clone()))?;
    let resolved = TypePath::parse(requested)
        .and_then(|path| resolver.resolve(&path))
        .ok_or_else(|| ForgeError::UnknownReferenceType(requested.to_string()))?;

    // boxed so that types referencing each other still have a finite size;
    // the full path keeps glob imports of other units from shadowing it
    let path = resolved.to_crate_path();
    let ty = parse_quote!(Option<Box<#path>>);
    let import =
        (resolved.namespace() != current_namespace).then(|| namespace_import(resolved.namespace()));
    Ok((ty, import))
}

fn namespace_import(namespace: &[String]) -> ItemUse {
    let segments = namespace.iter().map(|s| naming::ident(s));
    parse_quote!(use crate #(::#segments)*::*;)
}

/// Inserts `import` after the existing imports of a module, unless it is
/// already there.
pub(super) fn insert_import(items: &mut Vec<Item>, import: ItemUse) {
    if items
        .iter()
        .any(|item| matches!(item, Item::Use(existing) if *existing == import))
    {
        return;
    }
    let at = items
        .iter()
        .rposition(|item| matches!(item, Item::Use(_)))
        .map_or(0, |last| last + 1);
    items.insert(at, Item::Use(import));
}
