use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use typeforge::FieldKind;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum FieldKindArg {
    Int,
    Long,
    Double,
    Bool,
    String,
    Reference,
}

impl From<FieldKindArg> for FieldKind {
    fn from(kind: FieldKindArg) -> Self {
        match kind {
            FieldKindArg::Int => FieldKind::Int,
            FieldKindArg::Long => FieldKind::Long,
            FieldKindArg::Double => FieldKind::Double,
            FieldKindArg::Bool => FieldKind::Bool,
            FieldKindArg::String => FieldKind::String,
            FieldKindArg::Reference => FieldKind::Reference,
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[arg(long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory holding the generated source units")]
    pub source_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Scratch directory for compiled modules")]
    pub build_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Module path generated types are declared in")]
    pub namespace: Option<String>,

    #[arg(long, global = true, default_value = "info", help = "Log filter, e.g. debug or typeforge=trace")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new type with an identity and a display name
    Create { name: String },

    /// Add a field to an existing type
    AddField {
        type_name: String,
        field: String,
        #[arg(value_enum)]
        kind: FieldKindArg,
        #[arg(long, help = "Full path of the referenced type, required for reference fields")]
        reference: Option<String>,
    },

    /// List static and dynamic types, one entry per full name
    Types,

    /// List every dynamic registration with its module
    DynamicTypes,

    /// List generated types with an identity field
    Entities,
}
