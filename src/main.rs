mod clean;
mod data;
mod errors;
mod etl;
mod validate;

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::clean::lookup::{DisabledLookup, LookupConfig, PostcodeLookup, SingpostLookup};
use crate::errors::{Error, ErrorKind, Result};
use crate::etl::audit::AuditEtl;
use crate::etl::export_csv::ExportCsvEtl;
use crate::etl::Etl;

fn default_strict() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserConfig {
    pub data_path: String,
    pub dest_path: String,
    /// Schema validation costs roughly ten times the throughput.
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub lookup_enabled: bool,
    #[serde(default = "default_strict")]
    pub strict: bool,
    #[serde(default)]
    pub lookup: LookupConfig,
    /// Added to, or replacing entries of, the built-in street type table.
    #[serde(default)]
    pub street_mapping: HashMap<String, String>,
}

#[derive(Parser, Debug)]
#[command(name = "osm_tabular", version, about = "Clean an OpenStreetMap extract into relational CSV tables")]
struct Cli {
    /// JSON user configuration
    #[arg(long, default_value = "config/singapore.json")]
    config: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream nodes and ways into the five CSV tables
    Export {
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        output: Option<String>,
        /// Check every element against the row schema
        #[arg(long)]
        validate: bool,
        /// Query the postal code service for codes that cannot be repaired locally
        #[arg(long)]
        lookup: bool,
        /// Skip elements with missing or unreadable fields instead of aborting
        #[arg(long)]
        lenient: bool,
        /// Overwrite existing output files
        #[arg(long)]
        force: bool,
    },
    /// Count tag shapes, street types and problem postal codes
    Audit {
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        force: bool,
    },
}

fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path).map_err(|err| {
        Error::new(ErrorKind::Config, format!("Could not open config file {}: {}", path.display(), err))
    })?;
    Ok(serde_json::from_reader(file)?)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn apply_paths(config: &mut UserConfig, input: Option<String>, output: Option<String>) {
    if let Some(input) = input {
        config.data_path = input;
    }
    if let Some(output) = output {
        config.dest_path = output;
    }
}

fn run<E: Etl>(etl: &mut E, dir: &Path, force: bool) -> Result<()> {
    if force {
        etl.clean(dir)?;
    }
    etl.process(dir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let mut user_config = load_user_config(&cli.config)?;
    match cli.command {
        Command::Export { input, output, validate, lookup, lenient, force } => {
            apply_paths(&mut user_config, input, output);
            user_config.validate |= validate;
            user_config.lookup_enabled |= lookup;
            user_config.strict &= !lenient;
            info!(
                data_path = user_config.data_path.as_str(),
                validate = user_config.validate,
                lookup_enabled = user_config.lookup_enabled,
                strict = user_config.strict;
                "Exporting"
            );

            let postcode_lookup: Box<dyn PostcodeLookup> = if user_config.lookup_enabled {
                Box::new(SingpostLookup::new(user_config.lookup.clone())?)
            } else {
                Box::new(DisabledLookup)
            };
            let mut etl = ExportCsvEtl::new(&user_config, postcode_lookup.as_ref())?;
            run(&mut etl, Path::new(&user_config.dest_path), force)
        }
        Command::Audit { input, output, force } => {
            apply_paths(&mut user_config, input, output);
            let mut etl = AuditEtl::new(&user_config)?;
            run(&mut etl, Path::new(&user_config.dest_path), force)
        }
    }
}
