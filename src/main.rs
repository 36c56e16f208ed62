use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use pad_dashboard::models::DEFAULT_TABLE_COLUMNS;
use pad_dashboard::query::filter_and_summarize_with;
use pad_dashboard::{logging, report, DatasetCache, FilterOptions, FilterSpec, QueryConfig};

const INPUT_ENV: &str = "PAD_DASHBOARD_INPUT";

#[derive(Parser)]
#[command(name = "pad-dashboard")]
#[command(about = "Explore disciplinary case records with filters, counts and a data quality report", long_about = None)]
struct Cli {
    /// CSV export of the case spreadsheet (falls back to PAD_DASHBOARD_INPUT)
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    /// JSON file selecting which counts and time series to compute
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Only cases entered in this year
    #[arg(long)]
    year: Option<i32>,
    /// Accepted case types (TIPO); repeat for several
    #[arg(long = "case-type")]
    case_types: Vec<String>,
    /// Accepted document kinds (ESPÉCIE)
    #[arg(long = "document-kind")]
    document_kinds: Vec<String>,
    /// Accepted subjects (ASSUNTO)
    #[arg(long = "subject")]
    subjects: Vec<String>,
}

impl FilterArgs {
    fn to_spec(&self) -> FilterSpec {
        let builder = FilterSpec::builder()
            .case_types(self.case_types.iter().cloned())
            .document_kinds(self.document_kinds.iter().cloned())
            .subjects(self.subjects.iter().cloned());

        match self.year {
            Some(year) => builder.year(year).build(),
            None => builder.build(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print summary metrics and grouped counts
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Print missing values per column
    Quality {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List the years and categorical values available for filtering
    Options,
    /// Write the filtered rows to CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "filtered.csv")]
        out: PathBuf,
        /// Columns to include; defaults to the standard detail table
        #[arg(long = "column")]
        columns: Vec<String>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<QueryConfig> {
    let Some(path) = path else {
        return Ok(QueryConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    QueryConfig::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let input = match cli.input {
        Some(path) => path,
        None => std::env::var(INPUT_ENV)
            .map(PathBuf::from)
            .with_context(|| format!("--input or {INPUT_ENV} must point to a CSV file"))?,
    };
    let config = load_config(cli.config.as_deref())?;

    let bytes = std::fs::read(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let mut cache = DatasetCache::new();
    let dataset = cache
        .get_or_load(&bytes)
        .with_context(|| format!("failed to load {}", input.display()))?;
    info!(records = dataset.len(), input = %input.display(), "dataset ready");

    match cli.command {
        Commands::Summary { filters, json } => {
            let spec = filters.to_spec();
            let result = filter_and_summarize_with(&dataset, &spec, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            if result.view.is_empty() {
                println!("No records match the selected filters.");
                return Ok(());
            }

            let metrics = &result.metrics;
            println!("Total cases: {}", metrics.total);
            println!("Pending cases: {}", metrics.pending_count);
            println!("Cases with decision: {}", metrics.with_decision);
            println!("Completion rate: {:.1}%", metrics.completion_ratio * 100.0);

            for frequency in &result.frequencies {
                println!();
                println!("{}:", frequency.column);
                for entry in &frequency.entries {
                    println!("- {} ({})", entry.value, entry.count);
                }
            }
        }
        Commands::Report { filters, out } => {
            let spec = filters.to_spec();
            let result = filter_and_summarize_with(&dataset, &spec, &config);
            let report = report::build_report(&result, &spec);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Quality { filters, limit } => {
            let spec = filters.to_spec();
            let view = pad_dashboard::apply(&dataset, &spec);
            let report = pad_dashboard::quality::missing_report(&view);

            println!("Missing values across {} records:", view.len());
            for entry in report.top(limit) {
                println!(
                    "- {}: {} missing ({:.2}%), {} malformed",
                    entry.column, entry.missing_count, entry.missing_percent, entry.malformed_count
                );
            }
        }
        Commands::Options => {
            let options = FilterOptions::from_dataset(&dataset);
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Commands::Export {
            filters,
            out,
            columns,
        } => {
            let spec = filters.to_spec();
            let view = pad_dashboard::apply(&dataset, &spec);
            let table = if columns.is_empty() {
                view.project(&DEFAULT_TABLE_COLUMNS)
            } else {
                view.project(&columns)
            };

            let mut writer = csv::Writer::from_path(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            writer.write_record(&table.headers)?;
            for row in &table.rows {
                writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
            }
            writer.flush()?;
            println!("Exported {} rows to {}.", table.rows.len(), out.display());
        }
    }

    Ok(())
}
