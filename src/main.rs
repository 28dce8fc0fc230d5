//! # Pharma Pulse CLI (`pulse`)
//!
//! The `pulse` binary drives every stage of the pipeline: landing-table
//! creation, incremental channel scraping, bulk loading, analytics reports,
//! the HTTP API, and the full orchestrated run.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pulse init` | Create the Postgres landing tables (idempotent) |
//! | `pulse scrape` | Incrementally scrape channels from their checkpoints |
//! | `pulse load messages` | Bulk-load batch files into `raw_telegram_messages` |
//! | `pulse load detections` | Bulk-load the detections CSV |
//! | `pulse report <...>` | Run an analytics query and print the rows |
//! | `pulse serve api` | Start the read-only analytics HTTP API |
//! | `pulse pipeline` | Run scrape → load → dbt → detections in order |
//!
//! ## Examples
//!
//! ```bash
//! # First run: create tables, then scrape a keyword-filtered window
//! pulse init
//! pulse scrape --channels channels.txt --keywords pill cream \
//!     --start-date 2024-01-01 --end-date 2024-01-31
//!
//! # Load and inspect
//! pulse load messages
//! pulse report activity pharma_deals
//! pulse report search "paracetamol" --limit 5
//! ```
//!
//! Configuration comes from the environment (see `Config::from_env`);
//! a `.env` file in the working directory is honored.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pharma_pulse::config::Config;
use pharma_pulse::pipeline::{self, PipelineOptions};
use pharma_pulse::scrape::{self, ScrapeOptions};
use pharma_pulse::source::GatewaySource;
use pharma_pulse::{loader, migrate, queries, server};

/// Pharma Pulse: ingestion and analytics for medical-product Telegram
/// channels.
#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Telegram channel ingestion and analytics pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the Postgres landing tables.
    ///
    /// Creates `raw_telegram_messages` and `raw_image_detections` with the
    /// unique indexes the conflict-tolerant loader relies on. Idempotent.
    Init,

    /// Incrementally scrape channels listed in a channels file.
    ///
    /// Resumes each channel from its checkpoint, downloads and deduplicates
    /// media, and writes per-date JSON batch files. A failing channel does
    /// not stop the others.
    Scrape {
        /// Path to the channels file (one channel URL per line, `#` comments).
        #[arg(long, default_value = "channels.txt")]
        channels: PathBuf,

        /// Only include messages on or after this date (YYYY-MM-DD).
        #[arg(long)]
        start_date: Option<String>,

        /// Only include messages on or before this date (YYYY-MM-DD).
        #[arg(long)]
        end_date: Option<String>,

        /// Keywords to filter messages (case-insensitive substring, any-of).
        #[arg(long, num_args = 0..)]
        keywords: Vec<String>,

        /// Allowed MIME types for document images.
        #[arg(long, num_args = 0.., default_values_t = default_image_types())]
        image_types: Vec<String>,

        /// Scrape channels concurrently, one task per channel.
        #[arg(long)]
        parallel: bool,

        /// Delete pre-existing batch files for the dates being rewritten.
        #[arg(long)]
        clean: bool,
    },

    /// Bulk-load scraped data into the landing tables.
    Load {
        #[command(subcommand)]
        target: LoadTarget,
    },

    /// Run an analytics query and print the rows.
    Report {
        #[command(subcommand)]
        report: ReportKind,
    },

    /// Start a long-running service.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Run the full pipeline: scrape → load → dbt → detections.
    Pipeline {
        /// Path to the channels file.
        #[arg(long, default_value = "channels.txt")]
        channels: PathBuf,

        /// dbt project directory for the transformation step.
        #[arg(long, default_value = "telegram_dbt")]
        dbt_dir: PathBuf,

        /// Skip the dbt transformation step.
        #[arg(long)]
        skip_dbt: bool,

        /// Scrape channels concurrently.
        #[arg(long)]
        parallel: bool,

        /// Delete pre-existing batch files for the dates being rewritten.
        #[arg(long)]
        clean: bool,
    },
}

/// Bulk-load targets.
#[derive(Subcommand)]
enum LoadTarget {
    /// Load every batch file under the messages tree.
    Messages,
    /// Load the object-detection CSV.
    Detections,
}

/// Analytics reports (CLI wrappers over the API's query layer).
#[derive(Subcommand)]
enum ReportKind {
    /// Most frequent words across all message text.
    TopProducts {
        /// Number of words to return (1-100).
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Per-day message counts for a channel.
    Activity {
        /// Channel name.
        channel: String,
    },
    /// Case-insensitive substring search, newest first.
    Search {
        /// The search string.
        query: String,
        /// Maximum number of results (1-100).
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Object detections for one message.
    Detections {
        /// Message id.
        message_id: i64,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the read-only analytics HTTP API.
    Api,
}

fn default_image_types() -> Vec<String> {
    vec!["image/jpeg".to_string(), "image/png".to_string()]
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| anyhow::anyhow!("invalid date '{s}': {e}"))
        })
        .transpose()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pharma_pulse=info,pulse=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("Landing tables created.");
        }
        Commands::Scrape {
            channels,
            start_date,
            end_date,
            keywords,
            image_types,
            parallel,
            clean,
        } => {
            let opts = ScrapeOptions {
                start_date: parse_date(start_date)?,
                end_date: parse_date(end_date)?,
                keywords,
                image_types,
                parallel,
                clean,
            };
            let channels = scrape::load_channels(&channels)?;
            let source = Arc::new(GatewaySource::new(&config));
            let summaries = scrape::run_scrape(&config, source, channels, opts).await?;
            for summary in &summaries {
                println!(
                    "Channel: {} | Images: {} | Skipped: {} | Written: {}",
                    summary.channel, summary.images_downloaded, summary.skipped, summary.written
                );
            }
            println!("Scraping complete.");
        }
        Commands::Load { target } => match target {
            LoadTarget::Messages => {
                let inserted = loader::load_messages(&config).await?;
                println!("Inserted {inserted} messages into raw_telegram_messages.");
            }
            LoadTarget::Detections => {
                let inserted = loader::load_detections(&config).await?;
                println!("Inserted {inserted} detections into raw_image_detections.");
            }
        },
        Commands::Report { report } => match report {
            ReportKind::TopProducts { limit } => {
                for row in queries::top_products(&config, limit).await? {
                    println!("{:>8}  {}", row.mentions, row.product);
                }
            }
            ReportKind::Activity { channel } => {
                for row in queries::channel_activity(&config, &channel).await? {
                    println!("{}  {}", row.date, row.message_count);
                }
            }
            ReportKind::Search { query, limit } => {
                for row in queries::search_messages(&config, &query, limit).await? {
                    println!(
                        "[{}] {} #{}: {}",
                        row.message_date,
                        row.channel_name,
                        row.message_id,
                        row.text.as_deref().unwrap_or("")
                    );
                }
            }
            ReportKind::Detections { message_id } => {
                for row in queries::image_detections(&config, message_id).await? {
                    println!(
                        "{} ({:.2}) {}",
                        row.detected_object_class, row.confidence_score, row.image_path
                    );
                }
            }
        },
        Commands::Serve { service } => match service {
            ServeService::Api => {
                server::run_server(&config).await?;
            }
        },
        Commands::Pipeline {
            channels,
            dbt_dir,
            skip_dbt,
            parallel,
            clean,
        } => {
            let opts = PipelineOptions {
                channels_file: channels,
                scrape: ScrapeOptions {
                    image_types: default_image_types(),
                    parallel,
                    clean,
                    ..ScrapeOptions::default()
                },
                dbt_dir,
                skip_dbt,
            };
            pipeline::run_pipeline(&config, opts).await?;
            println!("Pipeline complete.");
        }
    }

    Ok(())
}
