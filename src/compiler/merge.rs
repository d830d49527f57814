use proc_macro2::Ident;
use syn::{parse_quote, Item, ItemMod};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Role {
    Reference,
    Target,
}

/// Module tree assembled from several units.
#[derive(Default)]
struct ModuleTree {
    items: Vec<Item>,
    children: Vec<(Ident, ModuleTree)>,
}

fn type_ident(item: &Item) -> Option<&Ident> {
    match item {
        Item::Struct(item) => Some(&item.ident),
        Item::Enum(item) => Some(&item.ident),
        _ => None,
    }
}

impl ModuleTree {
    fn child(&mut self, ident: Ident) -> &mut ModuleTree {
        let index = match self.children.iter().position(|(i, _)| *i == ident) {
            Some(index) => index,
            None => {
                self.children.push((ident, ModuleTree::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    fn insert(&mut self, items: &[Item], role: Role) {
        for item in items {
            match item {
                Item::Mod(ItemMod {
                    ident,
                    content: Some((_, items)),
                    ..
                }) => self.child(ident.clone()).insert(items, role),
                Item::Use(_) => {
                    if !self.items.contains(item) {
                        self.items.push(item.clone());
                    }
                }
                Item::Struct(_) | Item::Enum(_) => {
                    let ident = type_ident(item);
                    match self
                        .items
                        .iter_mut()
                        .find(|existing| type_ident(existing).is_some() && type_ident(existing) == ident)
                    {
                        Some(slot) => *slot = item.clone(),
                        None => self.items.push(item.clone()),
                    }
                }
                // references only contribute the types they define
                _ if role == Role::Target => self.items.push(item.clone()),
                _ => {}
            }
        }
    }

    fn into_items(self) -> Vec<Item> {
        let mut items = self.items;
        for (ident, child) in self.children {
            let content = child.into_items();
            items.push(parse_quote! {
                pub mod #ident {
                    #(#content)*
                }
            });
        }
        items
    }
}

/// Builds one crate from the reference units followed by the target units.
/// Types defined later replace earlier ones with the same name, so targets
/// always win.
pub(super) fn assemble(targets: &[syn::File], references: &[syn::File]) -> syn::File {
    let mut root = ModuleTree::default();
    for reference in references {
        root.insert(&reference.items, Role::Reference);
    }
    for target in targets {
        root.insert(&target.items, Role::Target);
    }
    syn::File {
        shebang: None,
        attrs: vec![parse_quote!(#![allow(dead_code, non_snake_case, unused_imports)])],
        items: root.into_items(),
    }
}
