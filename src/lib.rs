//! # Sheet Tracker
//!
//! Loads a spreadsheet workbook into an embedded DuckDB store and serves it
//! over HTTP for filtering, per-project annotation and workflow tracking.
//!
//! ## Features
//!
//! - **Multi-format ingestion**: `.xlsx`, `.xlsm`, `.xlsb`, `.xls` and `.ods` workbooks
//! - **Long-format storage**: one record per cell, dates and text kept in separate slots
//! - **Atomic re-ingestion**: the store is replaced in one transaction, readers never see it empty
//! - **Row or column filtering**: strict per-row filters, or the per-column legacy mode
//! - **Annotations**: tri-state workflow flags, free text and an assigned checker per project
//! - **Change trigger**: the source file is polled and re-ingested when it changes
//!
//! ## Modules
//!
//! - [`spreadsheet`]: workbook reading and cell classification
//! - [`database`]: row store, query layer, annotations and statistics
//! - [`ingest`]: the ingestion pipeline
//! - [`watcher`]: the change trigger
//! - [`server`]: HTTP endpoints
pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod server;
pub mod spreadsheet;
pub mod telemetry;
pub mod watcher;

pub use config::Config;
pub use database::Store;
pub use error::TrackerError;
pub use ingest::{IngestReport, Ingestor};
pub use watcher::ChangeTrigger;
