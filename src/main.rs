use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use nanosight_extract::data::overview::{overview_table, sample_overview};
use nanosight_extract::{export, extract, Extraction, ExtractionConfig};

#[derive(Parser)]
#[command(name = "nanosight-extract")]
#[command(about = "Extract and aggregate nanoparticle tracking exports", version)]
struct Cli {
    /// JSON settings file (directory, prefixes, export suffix)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Selection {
    /// Directory containing the export files
    directory: Option<PathBuf>,
    /// Text preceding the dilution factor in filenames
    #[arg(short, long)]
    dilution_prefix: Option<String>,
    /// Text preceding the replicate number in filenames
    #[arg(short, long)]
    replicate_prefix: Option<String>,
    /// Suffix of the export files to read
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a directory and optionally write the tables
    Extract {
        #[command(flatten)]
        selection: Selection,
        /// Output directory (or file, for JSON)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },

    /// Print the list of samples of a directory
    Overview {
        #[command(flatten)]
        selection: Selection,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose > 0 {
        logger.filter_level(match cli.verbose {
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        });
    } else if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(log::LevelFilter::Warn);
    }
    logger.format_timestamp_secs().init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let base = match &cli.config {
        Some(path) => {
            let config = ExtractionConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            config
        }
        None => ExtractionConfig::default(),
    };

    match cli.command {
        Commands::Extract {
            selection,
            out,
            format,
        } => {
            let extraction = run_extraction(base, selection)?;
            print_overview(&extraction);
            if let Some(out) = out {
                write_bundle(&extraction, &out, format)?;
            }
        }
        Commands::Overview { selection } => {
            let extraction = run_extraction(base, selection)?;
            print_overview(&extraction);
        }
    }
    Ok(())
}

/// Command-line values override the settings file.
fn run_extraction(mut config: ExtractionConfig, selection: Selection) -> Result<Extraction> {
    if let Some(directory) = selection.directory {
        config.directory = directory;
    }
    if selection.dilution_prefix.is_some() {
        config.dilution_prefix = selection.dilution_prefix;
    }
    if selection.replicate_prefix.is_some() {
        config.replicate_prefix = selection.replicate_prefix;
    }
    if let Some(suffix) = selection.suffix {
        config.export_suffix = suffix;
    }

    extract(&config).with_context(|| format!("extracting {}", config.directory.display()))
}

fn print_overview(extraction: &Extraction) {
    let rows = sample_overview(extraction);
    println!("{}", overview_table(&rows, extraction.any_replicates()));
    println!(
        "{} files, {} samples, {} bins",
        extraction.files_infos.len(),
        extraction.samples_filenames.len(),
        extraction.size_distributions.len()
    );
}

fn write_bundle(extraction: &Extraction, out: &Path, format: Format) -> Result<()> {
    let written = match format {
        Format::Csv => export::export_csv(extraction, out)?,
        Format::Parquet => export::export_parquet(extraction, out)?,
        Format::Json => vec![export::export_json(extraction, out)?],
    };
    for path in written {
        println!("wrote {}", path.display());
    }
    Ok(())
}
