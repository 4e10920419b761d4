#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the micro-zone ETL.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use microzone_pipeline::{EtlPaths, Pipeline, inspect_source};
use microzone_source::{ColumnOverrides, SourceKind};

#[derive(Parser)]
#[command(name = "microzone_etl", about = "Micro-zone indicator ETL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the three extracts, join them and write the indicator table
    Run {
        /// Connections extract (CSV)
        #[arg(long)]
        conexiones: PathBuf,
        /// Network length extract (CSV)
        #[arg(long)]
        longitudes: PathBuf,
        /// Infrastructure projects extract (CSV)
        #[arg(long)]
        proyectos: PathBuf,
        /// Output table
        #[arg(long, default_value = "data/processed/microzonas.csv")]
        output: PathBuf,
        /// TOML file with extra column candidates per source
        #[arg(long)]
        columns: Option<PathBuf>,
    },
    /// Load and clean a single extract and print its counters
    Inspect {
        /// Source name: `conexiones`, `longitudes` or `proyectos`
        source: String,
        /// Extract to inspect
        path: PathBuf,
        /// TOML file with extra column candidates per source
        #[arg(long)]
        columns: Option<PathBuf>,
    },
    /// Print the effective column mapping of every source
    Columns {
        /// TOML file with extra column candidates per source
        #[arg(long)]
        columns: Option<PathBuf>,
    },
}

fn load_overrides(path: Option<&Path>) -> Result<ColumnOverrides, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => ColumnOverrides::load(path)?,
        None => ColumnOverrides::default(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            conexiones,
            longitudes,
            proyectos,
            output,
            columns,
        } => {
            let overrides = load_overrides(columns.as_deref())?;
            let paths = EtlPaths {
                connections: conexiones,
                lengths: longitudes,
                projects: proyectos,
                output,
            };
            let report = Pipeline::new(&overrides)?.run(&paths)?;

            println!(
                "{:<12} {:>8} {:>8} {:>8} {:>9} {:>8}",
                "SOURCE", "READ", "DROPPED", "MERGED", "DISCARDED", "CLEANED"
            );
            println!("{}", "-".repeat(60));
            for source in &report.sources {
                println!(
                    "{:<12} {:>8} {:>8} {:>8} {:>9} {:>8}",
                    source.source,
                    source.records_read,
                    source.records_dropped,
                    source.duplicates_merged,
                    source.records_discarded,
                    source.records_cleaned
                );
            }
            for warning in report.warnings() {
                println!("warning: {warning}");
            }
            println!(
                "\n{} row(s) written to {} in {:.2}s",
                report.rows_written,
                report.output_path.display(),
                report.duration.as_secs_f64()
            );
        }
        Commands::Inspect {
            source,
            path,
            columns,
        } => {
            let kind: SourceKind = source
                .parse()
                .map_err(|_| format!("Unknown source: {source}"))?;
            let overrides = load_overrides(columns.as_deref())?;
            let inspected = inspect_source(kind, &path, &overrides)?;

            println!("Source:    {kind}");
            println!("File:      {}", path.display());
            println!(
                "Encoding:  {} ({} Latin-1 record(s))",
                inspected.encoding, inspected.latin1_records
            );
            println!("Headers:   {}", inspected.headers.join(", "));
            println!("Read:      {}", inspected.report.records_read);
            println!("Dropped:   {}", inspected.report.records_dropped);
            println!("Merged:    {}", inspected.report.duplicates_merged);
            println!("Discarded: {}", inspected.report.records_discarded);
            println!("Cleaned:   {}", inspected.report.records_cleaned);
            for warning in inspected.report.warnings() {
                println!("warning: {warning}");
            }
        }
        Commands::Columns { columns } => {
            let overrides = load_overrides(columns.as_deref())?;
            for kind in SourceKind::all() {
                let mapping = overrides.mapping(*kind)?;
                println!("# {kind}");
                println!("{}", toml::to_string(&mapping)?);
            }
        }
    }

    Ok(())
}
