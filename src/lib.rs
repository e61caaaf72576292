//! # Rural Gazette
//!
//! Ingests official government bulletins from national and regional
//! sources, splits each bulletin into its individual provisions, keeps the
//! ones relevant to an agricultural/rural audience, and stores the new ones
//! for downstream summarization and notification.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────┐   ┌─────────┐   ┌─────────┐   ┌───────────┐   ┌────────┐
//! │ Locator │──▶│ Fetch │──▶│ Extract │──▶│ Segment │──▶│ Relevance │──▶│ Store  │
//! │ RSS/JSON│   │ HTTP  │   │  PDF    │   │headings │   │ keywords  │   │ SQLite │
//! └─────────┘   └───────┘   └─────────┘   └─────────┘   └───────────┘   └───┬────┘
//!                                                                           │
//!                                              ┌────────────────────────────┤
//!                                              ▼                            ▼
//!                                        ┌──────────┐                 ┌──────────┐
//!                                        │   CLI    │                 │   HTTP   │
//!                                        │(gazette) │                 │ trigger  │
//!                                        └──────────┘                 └──────────┘
//! ```
//!
//! Every source runs the same [`ingest::Pipeline`]; what differs is captured
//! by its [`sources::SourceProfile`].
//!
//! ## Quick Start
//!
//! ```bash
//! gazette init                       # create database
//! gazette sources                    # which sources are configured
//! gazette ingest boja --date 20240115
//! gazette ingest all
//! gazette alerts pending             # hand-off to summarization
//! gazette serve                      # HTTP trigger
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`sources`] | Built-in per-source profiles |
//! | [`locator`] | Listing retrieval and parsing |
//! | [`fetch`] | HTTP document fetcher and PDF signature check |
//! | [`extract`] | PDF text extraction |
//! | [`segment`] | Heading-based provision segmentation |
//! | [`relevance`] | Keyword relevance classifier |
//! | [`store`] | Dedup and persistence gate |
//! | [`ingest`] | Pipeline orchestration |
//! | [`alerts`] | Pending-alert hand-off listing |
//! | [`stats`] | Store statistics |
//! | [`server`] | HTTP trigger server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Pipeline error taxonomy |

pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod locator;
pub mod migrate;
pub mod models;
pub mod relevance;
pub mod segment;
pub mod server;
pub mod sources;
pub mod stats;
pub mod store;
