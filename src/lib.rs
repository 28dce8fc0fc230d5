//! # Pharma Pulse
//!
//! An end-to-end ingestion and analytics pipeline for medical-product
//! Telegram channels.
//!
//! Pharma Pulse scrapes channel histories through an opaque messaging
//! gateway, lands raw JSON batches and media files on disk with incremental
//! checkpoint/dedup logic, bulk-loads them into Postgres, and exposes
//! read-only analytics via a CLI and an HTTP API. Object detection on the
//! downloaded images is performed by an external model whose CSV output is
//! loaded alongside the messages; SQL modeling is delegated to dbt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────┐   ┌───────────┐
//! │ Gateway  │──▶│   Scraper      │──▶│ JSON / CSV │──▶│ Postgres  │
//! │ (HTTP)   │   │ ckpt + dedup  │   │  on disk   │   │ raw + fct │
//! └──────────┘   └───────────────┘   └────────────┘   └─────┬─────┘
//!                                                           │
//!                                        ┌──────────────────┤
//!                                        ▼                  ▼
//!                                   ┌─────────┐       ┌──────────┐
//!                                   │   CLI   │       │   HTTP   │
//!                                   │ (pulse) │       │   API    │
//!                                   └─────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pulse init                             # create landing tables
//! pulse scrape --channels channels.txt   # incremental channel scrape
//! pulse load messages                    # bulk-load batch files
//! pulse load detections                  # bulk-load the detections CSV
//! pulse report search "paracetamol"      # query the modeled tables
//! pulse serve api                        # start the analytics API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-driven configuration |
//! | [`checkpoint`] | Per-channel resume cursors |
//! | [`dedup`] | Run-scoped media content hashing |
//! | [`source`] | Messaging-source trait + gateway client |
//! | [`media`] | Media download and filtering |
//! | [`scrape`] | Incremental channel scraping |
//! | [`loader`] | Conflict-tolerant bulk loading |
//! | [`migrate`] | Landing-table creation |
//! | [`queries`] | Read-only analytics queries |
//! | [`server`] | Analytics HTTP API |
//! | [`pipeline`] | Stage orchestration |

pub mod checkpoint;
pub mod config;
pub mod db;
pub mod dedup;
pub mod loader;
pub mod media;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod queries;
pub mod scrape;
pub mod server;
pub mod source;
