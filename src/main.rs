mod cli;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use typeforge::{ErrorResponse, FieldKind, FieldSchema, ForgeConfig, Result, TypeForge, TypeSchema};

use cli::{Cli, Command};

fn config(cli: &Cli) -> Result<ForgeConfig> {
    let mut config = match &cli.config {
        Some(path) => ForgeConfig::from_file(path)?,
        None => ForgeConfig::default(),
    };
    if let Some(dir) = &cli.source_dir {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &cli.build_dir {
        config.build_dir = dir.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("unserializable response: {e}"),
    }
}

fn run(cli: Cli) -> Result<()> {
    let forge = TypeForge::open(config(&cli)?)?;
    match cli.command {
        Command::Create { name } => print(&forge.create_type(&TypeSchema::new(name))?),
        Command::AddField {
            type_name,
            field,
            kind,
            reference,
        } => {
            let schema = FieldSchema {
                name: field,
                kind: FieldKind::from(kind),
                reference_type: reference,
            };
            print(&forge.add_field(&type_name, &schema)?);
        }
        Command::Types => print(&forge.list_all_types()),
        Command::DynamicTypes => print(&forge.list_dynamic_types()),
        Command::Entities => print(&forge.entities()),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind(), "{e}");
            print(&ErrorResponse::from(&e));
            ExitCode::FAILURE
        }
    }
}
