///
/// This module implements the CLI interface for cht: command parsing,
/// argument exposure, the async entrypoint, and the mapping from output flags
/// to an output sink.
///
/// All conversion logic (source resolution, file selection, streaming,
/// snapshot combination, CSV/JSON writing) lives in the [`cht-core`] crate.
/// This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: use the installed `cht` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`cht-core`]: ../../cht-core/
use crate::load_config::{load_config, CliConfig};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use cht_core::contract::ProductId;
use cht_core::format::OutputFormat;
use cht_core::pipeline::{
    plan_snapshot, plan_transform, run_snapshot, run_transform, ConversionReport,
    SnapshotRequest, TransformRequest,
};
use cht_core::product::ProductPair;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// CLI for cht: convert register data products to CSV and JSON.
#[derive(Parser)]
#[clap(
    name = "cht",
    version,
    about = "CLI to convert Companies House data products to CSV and JSON"
)]
pub struct Cli {
    /// Path to a YAML config file (defaults to $CHT_CONFIG when set)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a data product file, or every CSV file beneath a directory
    Transform {
        /// The input file or directory
        input: PathBuf,
        /// The data product to transform
        #[clap(short, long, value_enum, default_value_t = ProductArg::Auto)]
        product: ProductArg,
        /// The output format
        #[clap(short, long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,
        /// Output to a file in the configured output directory
        #[clap(short, long)]
        output: bool,
        /// Show debugging information
        #[clap(short, long)]
        debug: bool,
    },
    /// Combine a snapshot with its update files into the current state
    Snapshot {
        /// The pair of products to combine: the snapshot product number followed
        /// by the updates product number, comma separated, e.g. 183,101
        #[clap(short = 'p', long)]
        product_pair: String,
        /// Path to the snapshot file or directory. Selects the latest snapshot if passed a directory
        #[clap(short, long)]
        snapshot_path: PathBuf,
        /// Path to the updates directory
        #[clap(short, long)]
        updates_path: PathBuf,
        /// Only apply update files dated strictly after this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
        #[clap(long, value_parser = parse_cutoff)]
        updates_after: Option<NaiveDateTime>,
        /// Output JSON instead of CSV
        #[clap(short, long)]
        json: bool,
        /// Output to a file in the configured output directory
        #[clap(short, long)]
        output: bool,
        /// Show debugging information
        #[clap(short, long)]
        debug: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProductArg {
    Auto,
    #[value(name = "prod217", alias = "217")]
    Prod217,
}

impl ProductArg {
    fn product(self) -> Option<ProductId> {
        match self {
            ProductArg::Auto => None,
            ProductArg::Prod217 => Some(ProductId::Prod217),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl Cli {
    /// Whether the selected subcommand asked for debug output.
    pub fn debug(&self) -> bool {
        match &self.command {
            Commands::Transform { debug, .. } | Commands::Snapshot { debug, .. } => *debug,
        }
    }
}

fn parse_cutoff(value: &str) -> std::result::Result<NaiveDateTime, String> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| format!("expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS, got \"{value}\""))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(cli.config.as_deref())?;
    let catalog = config.catalog();

    let report = match cli.command {
        Commands::Transform {
            input,
            product,
            format,
            output,
            ..
        } => {
            tracing::info!(command = "transform", input = %input.display(), "Starting transform");
            let request = TransformRequest {
                input,
                product: product.product(),
                format: format.into(),
            };
            let plan = plan_transform(&request, &catalog)?;
            let target = output
                .then(|| output_path(&config, &transform_output_name(&request.input), request.format));
            tokio::task::spawn_blocking(move || {
                write_output(target, |out| run_transform(plan, out))
            })
            .await
            .context("transform task failed")??
        }
        Commands::Snapshot {
            product_pair,
            snapshot_path,
            updates_path,
            updates_after,
            json,
            output,
            ..
        } => {
            tracing::info!(command = "snapshot", %product_pair, "Starting snapshot");
            let request = SnapshotRequest {
                product_pair,
                snapshot_path,
                updates_path,
                updates_after,
                format: if json {
                    OutputFormat::Json
                } else {
                    OutputFormat::Csv
                },
            };
            let plan = plan_snapshot(&request, &catalog)?;
            let target = output.then(|| {
                output_path(
                    &config,
                    &snapshot_output_name(&plan.pair),
                    request.format,
                )
            });
            tokio::task::spawn_blocking(move || {
                write_output(target, |out| run_snapshot(plan, out))
            })
            .await
            .context("snapshot task failed")??
        }
    };

    tracing::info!(files = report.files, records = report.records, "Conversion complete");
    Ok(())
}

fn transform_output_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn snapshot_output_name(pair: &ProductPair) -> String {
    format!("snapshot_{}", pair.file_stem())
}

/// `<output_dir>/<name>.<csv|json>`
pub fn output_path(config: &CliConfig, name: &str, format: OutputFormat) -> PathBuf {
    config
        .output_dir
        .join(format!("{name}.{}", format.extension()))
}

/// Runs `convert` against the output file, or stdout when no file is requested.
fn write_output<F>(target: Option<PathBuf>, convert: F) -> Result<ConversionReport>
where
    F: FnOnce(&mut dyn Write) -> cht_core::Result<ConversionReport>,
{
    match target {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = File::create(&path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            let mut out = BufWriter::new(file);
            let report = convert(&mut out)?;
            out.flush()?;
            tracing::info!(path = %path.display(), "Wrote output file");
            Ok(report)
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let report = convert(&mut out)?;
            out.flush()?;
            Ok(report)
        }
    }
}
