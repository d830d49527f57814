//! Registry of dynamically generated types.

use parking_lot::RwLock;
use tracing::debug;

use crate::handle::TypeHandle;
use crate::naming::TypePath;

/// Append-only record of registered handles. Registering a new handle for an
/// existing name makes it the visible one; older handles are kept.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: RwLock<Vec<TypeHandle>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if this exact handle was already registered.
    pub fn register(&self, handle: TypeHandle) -> bool {
        let mut entries = self.entries.write();
        if entries.contains(&handle) {
            return false;
        }
        debug!(
            type_name = %handle.full_name(),
            generation = handle.module().generation,
            "registered type"
        );
        entries.push(handle);
        true
    }

    /// Snapshot of every registration, oldest first.
    pub fn get_all(&self) -> Vec<TypeHandle> {
        self.entries.read().clone()
    }

    /// The most recent registration for `full_name`.
    pub fn find(&self, full_name: &TypePath) -> Option<TypeHandle> {
        self.entries
            .read()
            .iter()
            .rev()
            .find(|h| h.full_name() == full_name)
            .cloned()
    }

    /// One handle per name, the latest one, in order of first registration.
    pub fn latest(&self) -> Vec<TypeHandle> {
        latest_by_name(self.get_all())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Groups handles by full name keeping the last of each group.
pub(crate) fn latest_by_name(handles: impl IntoIterator<Item = TypeHandle>) -> Vec<TypeHandle> {
    let mut latest: Vec<TypeHandle> = Vec::new();
    for handle in handles {
        match latest.iter_mut().find(|h| h.full_name() == handle.full_name()) {
            Some(slot) => *slot = handle,
            None => latest.push(handle),
        }
    }
    latest
}
