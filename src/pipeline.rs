//! Stage orchestration for the full pipeline run.
//!
//! Runs scrape → load messages → dbt transformation → load detections in
//! order, shelling out to `dbt` for the SQL modeling step. Any stage
//! failure aborts the pipeline; the individual subcommands exist for
//! running stages in isolation.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

use crate::config::Config;
use crate::loader;
use crate::scrape::{self, ScrapeOptions};
use crate::source::GatewaySource;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub channels_file: PathBuf,
    pub scrape: ScrapeOptions,
    pub dbt_dir: PathBuf,
    pub skip_dbt: bool,
}

pub async fn run_pipeline(config: &Config, opts: PipelineOptions) -> Result<()> {
    info!("pipeline: scraping channels");
    let channels = scrape::load_channels(&opts.channels_file)?;
    let source = Arc::new(GatewaySource::new(config));
    let summaries = scrape::run_scrape(config, source, channels, opts.scrape).await?;
    for summary in &summaries {
        println!(
            "Channel: {} | Images: {} | Skipped: {} | Written: {}",
            summary.channel, summary.images_downloaded, summary.skipped, summary.written
        );
    }

    info!("pipeline: loading raw messages");
    let inserted = loader::load_messages(config).await?;
    println!("Inserted {inserted} messages into raw_telegram_messages.");

    if opts.skip_dbt {
        info!("pipeline: dbt step skipped by flag");
    } else if opts.dbt_dir.is_dir() {
        run_dbt(&opts.dbt_dir).await?;
    } else {
        info!(
            dir = %opts.dbt_dir.display(),
            "pipeline: dbt project dir not found, skipping transformation"
        );
    }

    if config.detections_csv.exists() {
        info!("pipeline: loading detections");
        let inserted = loader::load_detections(config).await?;
        println!("Inserted {inserted} detections into raw_image_detections.");
    } else {
        info!(
            csv = %config.detections_csv.display(),
            "pipeline: detections csv not found, skipping"
        );
    }

    Ok(())
}

/// Runs `dbt run` then `dbt test` inside the project directory.
async fn run_dbt(dbt_dir: &std::path::Path) -> Result<()> {
    for args in [["run"], ["test"]] {
        info!(dir = %dbt_dir.display(), "running dbt {}", args[0]);
        let status = Command::new("dbt")
            .args(args)
            .current_dir(dbt_dir)
            .status()
            .await
            .with_context(|| format!("spawning dbt in {}", dbt_dir.display()))?;
        if !status.success() {
            bail!("dbt {} failed with {status}", args[0]);
        }
    }
    Ok(())
}
