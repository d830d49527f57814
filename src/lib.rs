//! Runtime synthesis of Rust types from schema requests.
//!
//! A [`TypeForge`] emits one source unit per type, compiles it with `rustc`
//! into a shared object, loads it and registers a [`TypeHandle`] describing
//! the resulting layout. Units are persisted so a later process can load the
//! same types again on startup.

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod generator;
pub mod handle;
pub mod loader;
pub mod naming;
pub mod registry;
pub mod schema;
pub mod service;
pub mod store;

pub use catalog::{DynamicTypeListing, TypeCatalog, TypeListing};
pub use config::ForgeConfig;
pub use error::{Diagnostic, ErrorResponse, ForgeError, Result};
pub use handle::{FieldLayout, ModuleInfo, TypeHandle};
pub use compiler::Compiler;
pub use loader::{ModuleArena, ModuleId, ModuleStats, Origin, PendingModule};
pub use naming::TypePath;
pub use registry::TypeRegistry;
pub use schema::{FieldKind, FieldSchema, TypeSchema};
pub use service::{AddedField, CreatedType, TypeForge};
pub use store::SourceStore;
