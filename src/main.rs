use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use listing_market_position::cache::ReferenceCache;
use listing_market_position::models::{AnalysisReport, Record};
use listing_market_position::positioning::{self, PercentileMethod};
use listing_market_position::{db, distribution, listings, report};

#[derive(Parser)]
#[command(name = "listing-market-position")]
#[command(about = "Market positioning reports for rental listings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small Porto sample dataset
    Seed,
    /// Import listings from a CSV or JSON export
    Import {
        #[arg(long, visible_alias = "csv")]
        file: PathBuf,
    },
    /// Position one or more listings against their peers
    Analyze {
        #[arg(long = "listing-id", required = true, num_args = 1..)]
        listing_ids: Vec<String>,
        /// Read the reference collection from this CSV or JSON file instead of Postgres
        #[arg(long, visible_alias = "csv")]
        file: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long, value_enum, default_value_t = PercentileArg::Approximate)]
        percentile_method: PercentileArg,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, ValueEnum)]
enum PercentileArg {
    Approximate,
    Interpolated,
}

impl From<PercentileArg> for PercentileMethod {
    fn from(value: PercentileArg) -> Self {
        match value {
            PercentileArg::Approximate => PercentileMethod::Approximate,
            PercentileArg::Interpolated => PercentileMethod::Interpolated,
        }
    }
}

#[derive(Serialize)]
struct ListingAnalysis {
    listing: Record,
    report: AnalysisReport,
}

enum ListingSource {
    File(PathBuf),
    Database(PgPool),
}

impl ListingSource {
    async fn load_all(&self) -> anyhow::Result<Vec<Record>> {
        match self {
            ListingSource::File(path) => listings::load_listings_file(path)
                .with_context(|| format!("failed to load listings from {}", path.display())),
            ListingSource::Database(pool) => db::fetch_listings(pool).await,
        }
    }

    async fn find(&self, records: &[Record], listing_id: &str) -> anyhow::Result<Record> {
        let found = match self {
            ListingSource::File(_) => records.iter().find(|record| record.id == listing_id).cloned(),
            ListingSource::Database(pool) => db::fetch_listing(pool, listing_id).await?,
        };
        found.with_context(|| format!("listing {listing_id} not found"))
    }

    /// Persists the record's anomaly flags; file sources are read-only.
    async fn record_anomalies(&self, record: &Record) -> anyhow::Result<()> {
        match self {
            ListingSource::File(_) => Ok(()),
            ListingSource::Database(pool) => db::save_anomalies(pool, record).await,
        }
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { file } => {
            let summary = db::import_file(&connect().await?, &file).await?;
            info!(import_id = %summary.import_id, read = summary.read, "import finished");
            println!(
                "Upserted {} of {} listings from {}.",
                summary.upserted,
                summary.read,
                file.display()
            );
        }
        Commands::Analyze {
            listing_ids,
            file,
            format,
            percentile_method,
            out,
        } => {
            let source = match file {
                Some(path) => ListingSource::File(path),
                None => ListingSource::Database(connect().await?),
            };
            let records = source.load_all().await?;
            info!(listings = records.len(), "loaded reference collection");

            let method = PercentileMethod::from(percentile_method);
            let generated_on = Utc::now().date_naive();
            let mut cache = ReferenceCache::new();
            let mut analyses = Vec::new();
            let mut markdown = String::new();

            for listing_id in &listing_ids {
                let target = source.find(&records, listing_id).await?;
                let bundle = distribution::build_with_cache(&target, &records, &mut cache);
                let analysis = positioning::analyze_with(&target, &bundle, method);
                let target = target.with_anomalies(&analysis);
                source.record_anomalies(&target).await?;

                if let OutputFormat::Markdown = format {
                    if !markdown.is_empty() {
                        markdown.push('\n');
                    }
                    markdown.push_str(&report::build_report(&target, &analysis, &bundle, generated_on));
                }
                analyses.push(ListingAnalysis {
                    listing: target,
                    report: analysis,
                });
            }

            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&analyses)?,
                OutputFormat::Markdown => markdown,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
    }

    Ok(())
}
