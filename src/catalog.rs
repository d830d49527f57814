//! Explicit union of statically known types and the dynamic registry.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::generator::TypeResolver;
use crate::handle::TypeHandle;
use crate::loader::{ModuleId, Origin};
use crate::naming::TypePath;
use crate::registry::{latest_by_name, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeListing {
    pub name: String,
    pub full_name: TypePath,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicTypeListing {
    pub name: String,
    pub full_name: TypePath,
    pub module: ModuleId,
    pub generation: u64,
}

/// Types known at startup plus everything registered since.
#[derive(Debug)]
pub struct TypeCatalog {
    manifest: RwLock<Vec<TypeHandle>>,
    registry: Arc<TypeRegistry>,
}

impl TypeCatalog {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            manifest: RwLock::new(Vec::new()),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Adds types that were loaded at startup.
    pub fn extend_manifest(&self, handles: impl IntoIterator<Item = TypeHandle>) {
        self.manifest.write().extend(handles);
    }

    pub fn manifest(&self) -> Vec<TypeHandle> {
        self.manifest.read().clone()
    }

    /// Manifest first, then registrations; the last handle of each name wins.
    pub fn latest(&self) -> Vec<TypeHandle> {
        latest_by_name(self.manifest().into_iter().chain(self.registry.get_all()))
    }

    pub fn find(&self, full_name: &TypePath) -> Option<TypeHandle> {
        self.registry.find(full_name).or_else(|| {
            self.manifest
                .read()
                .iter()
                .rev()
                .find(|h| h.full_name() == full_name)
                .cloned()
        })
    }

    /// Static types declared in `namespace` plus every registration, one
    /// entry per full name, sorted by name.
    pub fn list_all(&self, namespace: &[String]) -> Vec<TypeListing> {
        let manifest = self
            .manifest()
            .into_iter()
            .filter(|h| h.full_name().namespace() == namespace);
        let mut listing: Vec<TypeListing> = latest_by_name(manifest.chain(self.registry.get_all()))
            .into_iter()
            .map(|h| TypeListing {
                name: h.name().to_string(),
                full_name: h.full_name().clone(),
                origin: h.module().origin,
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.full_name.cmp(&b.full_name)));
        listing
    }

    /// Every registration, including superseded ones, sorted by name.
    pub fn list_dynamic(&self) -> Vec<DynamicTypeListing> {
        let mut listing: Vec<DynamicTypeListing> = self
            .registry
            .get_all()
            .into_iter()
            .map(|h| DynamicTypeListing {
                name: h.name().to_string(),
                full_name: h.full_name().clone(),
                module: h.module().id,
                generation: h.module().generation,
            })
            .collect();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        listing
    }

    /// Latest types in `namespace` that a storage mapper can register as
    /// entities.
    pub fn entities(&self, namespace: &[String]) -> Vec<TypeHandle> {
        self.latest()
            .into_iter()
            .filter(|h| h.full_name().namespace() == namespace && h.has_identity())
            .collect()
    }
}

impl TypeResolver for TypeCatalog {
    fn resolve(&self, path: &TypePath) -> Option<TypePath> {
        self.find(path).map(|h| h.full_name().clone())
    }
}
