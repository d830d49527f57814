//! Runtime configuration, read from a TOML file or built in code.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::naming::parse_namespace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeConfig {
    /// Directory holding one source unit per generated type.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Scratch directory for per-module build output. Artifacts stay on disk
    /// while their module is loaded.
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Module path generated types are declared in.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_rustc")]
    pub rustc: PathBuf,

    #[serde(default)]
    pub opt_level: u8,

    /// Compile every persisted unit into one module on startup.
    #[serde(default = "default_true")]
    pub preload: bool,

    /// Additional directories of hand-written units loaded on startup.
    #[serde(default)]
    pub static_source_dirs: Vec<PathBuf>,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("models/generated")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("target/typeforge")
}

fn default_namespace() -> String {
    "models::generated".to_string()
}

fn default_rustc() -> PathBuf {
    std::env::var_os("RUSTC")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rustc"))
}

fn default_true() -> bool {
    true
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            build_dir: default_build_dir(),
            namespace: default_namespace(),
            rustc: default_rustc(),
            opt_level: 0,
            preload: true,
            static_source_dirs: Vec::new(),
        }
    }
}

impl ForgeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ForgeError::io(path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted in `dir`: sources in `dir/models/generated`,
    /// builds in `dir/build`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            source_dir: dir.join("models").join("generated"),
            build_dir: dir.join("build"),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        parse_namespace(&self.namespace)?;
        if self.opt_level > 3 {
            return Err(ForgeError::Config(format!(
                "opt_level must be between 0 and 3, got {}",
                self.opt_level
            )));
        }
        Ok(())
    }

    pub fn namespace_segments(&self) -> Result<Vec<String>> {
        parse_namespace(&self.namespace)
    }
}
