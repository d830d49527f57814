//! The public facade: create types, add fields, enumerate what is loaded.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{DynamicTypeListing, TypeCatalog, TypeListing};
use crate::compiler::Compiler;
use crate::config::ForgeConfig;
use crate::error::{ForgeError, Result};
use crate::generator;
use crate::handle::TypeHandle;
use crate::loader::{ModuleArena, ModuleStats};
use crate::naming::{validate_identifier, TypePath};
use crate::registry::TypeRegistry;
use crate::schema::{FieldSchema, TypeSchema};
use crate::store::{list_units, SourceStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedType {
    pub full_name: TypePath,
    pub source_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedField {
    pub full_name: TypePath,
    pub field_name: String,
    pub source_path: PathBuf,
}

/// One mutex per type name, held only while some caller uses it.
#[derive(Debug, Default)]
struct NameLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    /// Runs `f` with the lock for `name` held.
    fn with<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.locks.lock().entry(name.to_string()).or_default());
        let result = {
            let _guard: MutexGuard<'_, ()> = lock.lock();
            f()
        };
        let mut locks = self.locks.lock();
        drop(lock);
        // no new clones can appear while the map is locked
        if locks.get(name).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(name);
        }
        result
    }

    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

pub struct TypeForge {
    store: SourceStore,
    compiler: Compiler,
    catalog: TypeCatalog,
    namespace: Vec<String>,
    locks: NameLocks,
}

impl TypeForge {
    /// Builds a forge from `config`, compiling every persisted and static
    /// unit into one module first when `preload` is set.
    pub fn open(config: ForgeConfig) -> Result<Self> {
        config.validate()?;
        let namespace = config.namespace_segments()?;
        let forge = Self {
            store: SourceStore::new(&config.source_dir),
            compiler: Compiler::new(&config, Arc::new(ModuleArena::new())),
            catalog: TypeCatalog::new(Arc::new(TypeRegistry::new())),
            namespace,
            locks: NameLocks::default(),
        };
        if config.preload {
            forge.preload(&config)?;
        }
        Ok(forge)
    }

    fn preload(&self, config: &ForgeConfig) -> Result<()> {
        let dirs = std::iter::once(&config.source_dir).chain(&config.static_source_dirs);
        let mut units = Vec::new();
        for dir in dirs {
            for (name, path) in list_units(dir)? {
                let source = std::fs::read_to_string(&path).map_err(|e| ForgeError::io(&path, e))?;
                if let Err(e) = syn::parse_file(&source) {
                    warn!(unit = %name, path = %path.display(), "skipping unparsable unit: {e}");
                    continue;
                }
                units.push(source);
            }
        }
        if units.is_empty() {
            return Ok(());
        }

        let count = units.len();
        let module = self.compiler.compile_assembly(units)?;
        self.catalog.extend_manifest(module.types().iter().cloned());
        info!(
            units = count,
            types = module.types().len(),
            module = %module.info().id,
            "static types loaded"
        );
        Ok(())
    }

    /// Generates, compiles and persists a new type with the identity and
    /// display-name fields, then registers it.
    pub fn create_type(&self, schema: &TypeSchema) -> Result<CreatedType> {
        schema.validate()?;
        self.locks.with(&schema.name, || self.create_locked(&schema.name))
    }

    fn create_locked(&self, type_name: &str) -> Result<CreatedType> {
        if self.store.exists(type_name) {
            return Err(ForgeError::AlreadyExists(type_name.to_string()));
        }
        let full_name = TypePath::new(self.namespace.clone(), type_name);
        let source = generator::generate_type(type_name, &self.namespace);
        let source_path = self.commit(type_name, &source, &full_name)?;

        info!(type_name = %full_name, path = %source_path.display(), "type created");
        Ok(CreatedType {
            full_name,
            source_path,
        })
    }

    /// Adds `field` to the persisted type `type_name`, recompiles it and
    /// registers the new version.
    pub fn add_field(&self, type_name: &str, field: &FieldSchema) -> Result<AddedField> {
        validate_identifier(type_name, "type name")?;
        field.validate()?;
        if !self.store.exists(type_name) {
            return Err(ForgeError::NotFound(type_name.to_string()));
        }
        self.locks.with(type_name, || self.add_field_locked(type_name, field))
    }

    fn add_field_locked(&self, type_name: &str, field: &FieldSchema) -> Result<AddedField> {
        let source = self.store.load(type_name)?;
        let full_name = generator::type_path(&source, type_name)?;
        let updated = generator::add_field(&source, type_name, field, &self.catalog)?;
        let source_path = self.commit(type_name, &updated, &full_name)?;

        info!(
            type_name = %full_name,
            field = %field.name,
            kind = ?field.kind,
            "field added"
        );
        Ok(AddedField {
            full_name,
            field_name: field.name.clone(),
            source_path,
        })
    }

    /// Compile, save, admit, register. A module only joins the arena once
    /// its unit is persisted.
    fn commit(&self, type_name: &str, source: &str, full_name: &TypePath) -> Result<PathBuf> {
        let pending = self.compiler.compile(source, full_name)?;
        let source_path = self.store.save(type_name, source)?;
        let handle = self.compiler.commit(pending, full_name)?;
        self.catalog.registry().register(handle);
        Ok(source_path)
    }

    pub fn list_all_types(&self) -> Vec<TypeListing> {
        self.catalog.list_all(&self.namespace)
    }

    pub fn list_dynamic_types(&self) -> Vec<DynamicTypeListing> {
        self.catalog.list_dynamic()
    }

    /// Latest handle of every generated type carrying an identity field.
    pub fn entities(&self) -> Vec<TypeHandle> {
        self.catalog.entities(&self.namespace)
    }

    pub fn module_stats(&self) -> ModuleStats {
        self.compiler.arena().stats()
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.catalog.registry()
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &SourceStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge(dir: &tempfile::TempDir) -> TypeForge {
        let config = ForgeConfig {
            preload: false,
            rustc: PathBuf::from("typeforge-no-such-rustc"),
            ..ForgeConfig::in_dir(dir.path())
        };
        TypeForge::open(config).unwrap()
    }

    #[test]
    fn name_locks_are_released_after_use() {
        let locks = NameLocks::default();
        let inner = locks.with("Employee", || locks.with("Department", || locks.len()));
        assert_eq!(inner, 2);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn name_locks_serialize_one_name() {
        let locks = NameLocks::default();
        let inside = Mutex::new(0usize);
        let overlaps = Mutex::new(0usize);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        locks.with("Employee", || {
                            *inside.lock() += 1;
                            if *inside.lock() > 1 {
                                *overlaps.lock() += 1;
                            }
                            std::thread::yield_now();
                            *inside.lock() -= 1;
                        });
                    }
                });
            }
        });
        assert_eq!(*overlaps.lock(), 0);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn invalid_requests_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(&dir);

        let err = forge.create_type(&TypeSchema::new("")).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let field = FieldSchema::new("Salary", crate::schema::FieldKind::Int);
        let err = forge.add_field("Ghost", &field).unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(ref name) if name == "Ghost"));
        assert!(!forge.store().exists("Ghost"));
        assert_eq!(forge.module_stats().modules, 0);
        assert_eq!(forge.locks.len(), 0);
    }

    #[test]
    fn missing_toolchain_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(&dir);

        let err = forge.create_type(&TypeSchema::new("Employee")).unwrap_err();
        assert!(matches!(err, ForgeError::Toolchain { .. }));
        assert!(!forge.store().exists("Employee"));
        assert!(forge.registry().is_empty());
        assert!(forge.list_all_types().is_empty());
        assert_eq!(forge.locks.len(), 0);
    }

    #[test]
    fn existing_unit_blocks_create() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(&dir);
        let source = generator::generate_type("Employee", &forge.namespace);
        forge.store().save("Employee", &source).unwrap();

        let err = forge.create_type(&TypeSchema::new("Employee")).unwrap_err();
        assert!(matches!(err, ForgeError::AlreadyExists(_)));
    }
}
