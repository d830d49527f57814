//! Loading compiled modules and keeping them alive.
//!
//! Modules are never unloaded: handles and any data built from them stay
//! valid for the life of the process. Every compilation adds one module.

use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use tracing::info;
use uuid::Uuid;

use crate::error::{ForgeError, Result};
use crate::handle::{FieldLayout, ModuleInfo, TypeHandle};
use crate::naming::TypePath;

/// Name of the function every compiled module exports to describe itself.
pub(crate) const DESCRIBE_SYMBOL: &str = "__typeforge_describe";

/// Globally unique identity of one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(Uuid);

impl ModuleId {
    pub(crate) fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identifier-safe form, used in crate names.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a loaded type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    /// Compiled at startup from units that already existed.
    Assembly,
    /// Compiled on request.
    Dynamic,
}

/// One type as reported by a module's descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeLayout {
    pub(crate) full_name: TypePath,
    pub(crate) size: usize,
    pub(crate) align: usize,
    pub(crate) fields: Vec<FieldLayout>,
}

fn number(value: Option<&str>, line: &str) -> std::result::Result<usize, String> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| format!("bad descriptor line {line:?}"))
}

/// Parses the tab-separated descriptor emitted by the module shim:
/// `type <path> <size> <align>` followed by `field <path> <name> <type> <offset>`.
pub(crate) fn parse_descriptor(text: &str) -> std::result::Result<Vec<TypeLayout>, String> {
    let mut layouts: Vec<TypeLayout> = Vec::new();
    for line in text.lines().filter(|l| !l.is_empty()) {
        let mut parts = line.split('\t');
        let tag = parts.next();
        let owner = parts
            .next()
            .and_then(TypePath::parse)
            .ok_or_else(|| format!("bad descriptor line {line:?}"))?;
        match tag {
            Some("type") => {
                let size = number(parts.next(), line)?;
                let align = number(parts.next(), line)?;
                layouts.push(TypeLayout {
                    full_name: owner,
                    size,
                    align,
                    fields: Vec::new(),
                });
            }
            Some("field") => {
                let name = parts.next().ok_or_else(|| format!("bad descriptor line {line:?}"))?;
                let type_name = parts.next().ok_or_else(|| format!("bad descriptor line {line:?}"))?;
                let offset = number(parts.next(), line)?;
                let layout = layouts
                    .iter_mut()
                    .rev()
                    .find(|l| l.full_name == owner)
                    .ok_or_else(|| format!("field for undeclared type {owner}"))?;
                layout.fields.push(FieldLayout {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                    offset,
                });
            }
            _ => return Err(format!("bad descriptor line {line:?}")),
        }
    }
    Ok(layouts)
}

/// Opens a freshly compiled artifact and reads its descriptor.
pub(crate) fn open(artifact: &Path) -> Result<(Library, Vec<TypeLayout>)> {
    let load_error = |reason: String| ForgeError::Load {
        path: artifact.to_path_buf(),
        reason,
    };

    // SAFETY: the artifact was produced by rustc from a unit whose only
    // exported item is the descriptor shim; it has no load-time initializers.
    let library = unsafe { Library::new(artifact) }.map_err(|e| load_error(e.to_string()))?;
    let text = unsafe {
        let symbol = format!("{DESCRIBE_SYMBOL}\0");
        let describe: Symbol<unsafe extern "C" fn() -> *const c_char> = library
            .get(symbol.as_bytes())
            .map_err(|e| load_error(e.to_string()))?;
        let descriptor = describe();
        if descriptor.is_null() {
            return Err(load_error("module returned no descriptor".into()));
        }
        CStr::from_ptr(descriptor)
            .to_str()
            .map_err(|e| load_error(e.to_string()))?
            .to_owned()
    };
    let layouts = parse_descriptor(&text).map_err(load_error)?;
    Ok((library, layouts))
}

/// A compiled and opened library that is not part of the arena yet. Dropping
/// it unloads the library again.
pub struct PendingModule {
    id: ModuleId,
    origin: Origin,
    artifact: PathBuf,
    units: Vec<String>,
    library: Library,
    layouts: Vec<TypeLayout>,
}

impl PendingModule {
    pub(crate) fn new(
        id: ModuleId,
        origin: Origin,
        artifact: PathBuf,
        units: Vec<String>,
        library: Library,
        layouts: Vec<TypeLayout>,
    ) -> Self {
        Self {
            id,
            origin,
            artifact,
            units,
            library,
            layouts,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn defines(&self, full_name: &TypePath) -> bool {
        self.layouts.iter().any(|l| &l.full_name == full_name)
    }
}

impl fmt::Debug for PendingModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingModule")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

/// A module that has been loaded into the process.
pub struct LoadedModule {
    info: ModuleInfo,
    artifact: PathBuf,
    units: Vec<String>,
    types: Vec<TypeHandle>,
    _library: Library,
}

impl LoadedModule {
    pub fn info(&self) -> ModuleInfo {
        self.info
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Source units the module was compiled from, excluding references.
    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn types(&self) -> &[TypeHandle] {
        &self.types
    }

    pub fn get(&self, full_name: &TypePath) -> Option<&TypeHandle> {
        self.types.iter().find(|t| t.full_name() == full_name)
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("info", &self.info)
            .field("artifact", &self.artifact)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

/// Snapshot of how many modules the process has accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleStats {
    pub modules: usize,
    pub latest_generation: u64,
}

/// Append-only arena of loaded modules. Generation `n` is the `n`-th module
/// admitted, starting at 1.
#[derive(Debug, Default)]
pub struct ModuleArena {
    modules: RwLock<Vec<Arc<LoadedModule>>>,
}

impl ModuleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `pending` part of the process: it gets the next generation and
    /// its units become references for later compilations.
    pub fn admit(&self, pending: PendingModule) -> Arc<LoadedModule> {
        let PendingModule {
            id,
            origin,
            artifact,
            units,
            library,
            layouts,
        } = pending;
        let mut modules = self.modules.write();
        let info = ModuleInfo {
            id,
            generation: modules.len() as u64 + 1,
            origin,
        };
        let types = layouts
            .into_iter()
            .map(|l| TypeHandle::new(l.full_name, l.size, l.align, l.fields, info))
            .collect();
        let module = Arc::new(LoadedModule {
            info,
            artifact,
            units,
            types,
            _library: library,
        });
        modules.push(Arc::clone(&module));
        info!(
            module = %id,
            generation = info.generation,
            loaded_modules = modules.len(),
            "module loaded"
        );
        module
    }

    /// All modules in generation order.
    pub fn modules(&self) -> Vec<Arc<LoadedModule>> {
        self.modules.read().clone()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    pub fn stats(&self) -> ModuleStats {
        let modules = self.modules.read();
        ModuleStats {
            modules: modules.len(),
            latest_generation: modules.last().map_or(0, |m| m.info.generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn this_process() -> Library {
        libloading::os::unix::Library::this().into()
    }

    #[cfg(windows)]
    fn this_process() -> Library {
        libloading::os::windows::Library::this().unwrap().into()
    }

    const DESCRIPTOR: &str = "type\tmodels::generated::Employee\t48\t16\n\
        field\tmodels::generated::Employee\tid\tu128\t0\n\
        field\tmodels::generated::Employee\tname\talloc::string::String\t16\n\
        type\tmodels::generated::Department\t40\t16\n\
        field\tmodels::generated::Department\tid\tu128\t0\n";

    #[test]
    fn descriptor_parses_types_and_fields() {
        let layouts = parse_descriptor(DESCRIPTOR).unwrap();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].full_name.to_string(), "models::generated::Employee");
        assert_eq!(layouts[0].size, 48);
        assert_eq!(layouts[0].fields.len(), 2);
        assert_eq!(layouts[0].fields[1].type_name, "alloc::string::String");
        assert_eq!(layouts[0].fields[1].offset, 16);
        assert_eq!(layouts[1].fields.len(), 1);
    }

    #[test]
    fn descriptor_rejects_garbage() {
        assert!(parse_descriptor("type\tEmployee\tbig\t8").is_err());
        assert!(parse_descriptor("field\tEmployee\tid\tu128\t0").is_err());
        assert!(parse_descriptor("struct\tEmployee").is_err());
        assert!(parse_descriptor("").unwrap().is_empty());
    }

    #[test]
    fn arena_assigns_increasing_generations() {
        let arena = ModuleArena::new();
        assert!(arena.is_empty());
        assert_eq!(arena.stats().latest_generation, 0);

        let layouts = parse_descriptor(DESCRIPTOR).unwrap();
        let first = arena.admit(PendingModule::new(
            ModuleId::fresh(),
            Origin::Assembly,
            PathBuf::from("a.so"),
            vec!["unit a".into()],
            this_process(),
            layouts.clone(),
        ));
        let pending = PendingModule::new(
            ModuleId::fresh(),
            Origin::Dynamic,
            PathBuf::from("b.so"),
            vec!["unit b".into()],
            this_process(),
            layouts,
        );
        let employee = TypePath::parse("models::generated::Employee").unwrap();
        assert!(pending.defines(&employee));
        // nothing is visible before admission
        assert_eq!(arena.len(), 1);
        let second = arena.admit(pending);

        assert_eq!(first.info().generation, 1);
        assert_eq!(second.info().generation, 2);
        assert_ne!(first.info().id, second.info().id);
        assert_eq!(
            arena.stats(),
            ModuleStats {
                modules: 2,
                latest_generation: 2
            }
        );

        let a = first.get(&employee).unwrap();
        let b = second.get(&employee).unwrap();
        assert_ne!(a, b);
        assert_eq!(b.module().origin, Origin::Dynamic);
        let units: Vec<_> = arena.modules().iter().flat_map(|m| m.units().to_vec()).collect();
        assert_eq!(units, ["unit a", "unit b"]);
    }
}
