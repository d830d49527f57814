//! File-per-type persistence of generated source units.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ForgeError, Result};

const EXTENSION: &str = "rs";

/// Stores the latest unit of every generated type as `<root>/<Name>.rs`.
#[derive(Debug, Clone)]
pub struct SourceStore {
    root: PathBuf,
}

impl SourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, type_name: &str) -> PathBuf {
        self.root.join(format!("{type_name}.{EXTENSION}"))
    }

    pub fn exists(&self, type_name: &str) -> bool {
        self.path(type_name).is_file()
    }

    /// Overwrites the unit for `type_name`.
    pub fn save(&self, type_name: &str, source: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| ForgeError::io(&self.root, e))?;
        let path = self.path(type_name);
        let staging = self.root.join(format!(".{type_name}.{EXTENSION}.tmp"));
        fs::write(&staging, source).map_err(|e| ForgeError::io(&staging, e))?;
        fs::rename(&staging, &path).map_err(|e| ForgeError::io(&path, e))?;
        debug!(path = %path.display(), bytes = source.len(), "saved source unit");
        Ok(path)
    }

    pub fn load(&self, type_name: &str) -> Result<String> {
        let path = self.path(type_name);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ForgeError::NotFound(type_name.to_string()),
            _ => ForgeError::io(&path, e),
        })
    }

    /// Names of all persisted types, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        list_units(&self.root)
            .map(|units| units.into_iter().map(|(name, _)| name).collect())
    }
}

/// `(stem, path)` of every `.rs` file directly under `dir`, sorted by stem.
/// A missing directory holds no units.
pub(crate) fn list_units(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ForgeError::io(dir, e)),
    };
    let mut units = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ForgeError::io(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !stem.starts_with('.') {
                units.push((stem.to_string(), path.clone()));
            }
        }
    }
    units.sort();
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path().join("models").join("generated"));
        let source = "pub struct Employee {\n    pub id: u128,\n}\n";

        let path = store.save("Employee", source).unwrap();
        assert_eq!(path, store.path("Employee"));
        assert!(path.ends_with("models/generated/Employee.rs"));
        assert_eq!(store.load("Employee").unwrap(), source);
        assert!(store.exists("Employee"));
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path());
        store.save("Employee", "first").unwrap();
        store.save("Employee", "second").unwrap();
        assert_eq!(store.load("Employee").unwrap(), "second");
        assert_eq!(store.list().unwrap(), ["Employee"]);
    }

    #[test]
    fn missing_unit_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path().join("never-created"));
        assert!(matches!(store.load("Ghost"), Err(ForgeError::NotFound(name)) if name == "Ghost"));
        assert!(!store.exists("Ghost"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path());
        store.save("Employee", "a").unwrap();
        store.save("Department", "b").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested.rs")).unwrap();
        assert_eq!(store.list().unwrap(), ["Department", "Employee"]);
    }
}
