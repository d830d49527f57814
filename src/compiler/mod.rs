//! Compiling source units with rustc and loading the result.
//!
//! Every compilation produces a fresh `cdylib` with its own crate name and
//! build directory. Units of already loaded modules are compiled in as
//! references, which is how a generated type can name another one.

mod diagnostics;
mod merge;
mod shim;

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ForgeConfig;
use crate::error::{Diagnostic, ForgeError, Result};
use crate::handle::TypeHandle;
use crate::loader::{self, LoadedModule, ModuleArena, ModuleId, Origin, PendingModule};
use crate::naming::{self, TypePath};

pub struct Compiler {
    rustc: PathBuf,
    build_dir: PathBuf,
    opt_level: u8,
    arena: Arc<ModuleArena>,
}

impl Compiler {
    pub fn new(config: &ForgeConfig, arena: Arc<ModuleArena>) -> Self {
        Self {
            rustc: config.rustc.clone(),
            build_dir: config.build_dir.clone(),
            opt_level: config.opt_level,
            arena,
        }
    }

    pub fn arena(&self) -> &Arc<ModuleArena> {
        &self.arena
    }

    /// Compiles `source` into a module that defines `full_name` without
    /// adding it to the arena.
    pub fn compile(&self, source: &str, full_name: &TypePath) -> Result<PendingModule> {
        let pending = self.build(vec![source.to_string()], full_name.name(), Origin::Dynamic)?;
        if !pending.defines(full_name) {
            return Err(ForgeError::TypeNotFound {
                type_name: full_name.to_string(),
                module: pending.id(),
            });
        }
        Ok(pending)
    }

    /// Admits `pending` and returns the handle of `full_name` from it.
    pub fn commit(&self, pending: PendingModule, full_name: &TypePath) -> Result<TypeHandle> {
        let module = self.arena.admit(pending);
        module
            .get(full_name)
            .cloned()
            .ok_or_else(|| ForgeError::TypeNotFound {
                type_name: full_name.to_string(),
                module: module.info().id,
            })
    }

    /// Compiles `source` into a new module and returns the handle of
    /// `full_name` from it.
    pub fn compile_and_load(&self, source: &str, full_name: &TypePath) -> Result<TypeHandle> {
        let pending = self.compile(source, full_name)?;
        self.commit(pending, full_name)
    }

    /// Compiles several units into one module of origin
    /// [`Origin::Assembly`], describing every struct they define.
    pub fn compile_assembly(&self, units: Vec<String>) -> Result<Arc<LoadedModule>> {
        let pending = self.build(units, "assembly", Origin::Assembly)?;
        Ok(self.arena.admit(pending))
    }

    fn reference_units(&self) -> Vec<syn::File> {
        let mut references = Vec::new();
        for module in self.arena.modules() {
            for unit in module.units() {
                match syn::parse_file(unit) {
                    Ok(file) => references.push(file),
                    Err(e) => warn!(module = %module.info().id, "skipping unparsable reference unit: {e}"),
                }
            }
        }
        references
    }

    fn build(&self, units: Vec<String>, label: &str, origin: Origin) -> Result<PendingModule> {
        let unit_file = format!("{label}.rs");
        let targets = units
            .iter()
            .map(|unit| {
                syn::parse_file(unit).map_err(|e| ForgeError::Compilation {
                    diagnostics: diagnostics::from_syn(&e, &unit_file),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let described = shim::collect(&targets);
        let mut krate = merge::assemble(&targets, &self.reference_units());
        shim::append(&mut krate, &described);

        let id = ModuleId::fresh();
        let crate_name = naming::crate_name(label, &id.simple());
        let dir = self.build_dir.join(&crate_name);
        fs::create_dir_all(&dir).map_err(|e| ForgeError::io(&dir, e))?;
        let lib = dir.join("lib.rs");
        fs::write(&lib, prettyplease::unparse(&krate)).map_err(|e| ForgeError::io(&lib, e))?;

        let artifact = self.invoke(&lib, &dir, &crate_name)?;
        let (library, layouts) = loader::open(&artifact)?;
        Ok(PendingModule::new(id, origin, artifact, units, library, layouts))
    }

    fn invoke(&self, lib: &Path, out_dir: &Path, crate_name: &str) -> Result<PathBuf> {
        let mut command = Command::new(&self.rustc);
        command
            .args(["--edition", "2021", "--crate-type", "cdylib"])
            .args(["--crate-name", crate_name])
            .args(["--error-format", "json", "--cap-lints", "allow"])
            .arg("-C")
            .arg(format!("opt-level={}", self.opt_level))
            .arg("--out-dir")
            .arg(out_dir)
            .arg(lib);
        debug!(?command, "invoking rustc");

        let output = command.output().map_err(|source| ForgeError::Toolchain {
            program: self.rustc.display().to_string(),
            source,
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut diagnostics = diagnostics::from_rustc(&stderr);
            if diagnostics.is_empty() {
                diagnostics.push(Diagnostic {
                    file: lib.display().to_string(),
                    line: 0,
                    column: 0,
                    message: stderr.trim().to_string(),
                });
            }
            return Err(ForgeError::Compilation { diagnostics });
        }
        Ok(out_dir.join(format!("{DLL_PREFIX}{crate_name}{DLL_SUFFIX}")))
    }
}
