//! # Ingestion Pipeline
//!
//! Reads the whole source workbook into memory, flattens every sheet into
//! cell records and swaps them into the store in one transaction. Nothing in
//! the store is touched until the workbook has been read completely.
use crate::config::Config;
use crate::database::Store;
use crate::error::TrackerError;
use crate::spreadsheet::{CellRecord, Criteria, Sheet, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    /// Sheet names in workbook order
    pub sheets: Vec<String>,
    /// Records written
    pub records: usize,
    /// Records discarded from the previous run
    pub replaced: usize,
    pub elapsed: Duration,
}

/// Runs the pipeline for one source workbook. At most one run executes at a time.
pub struct Ingestor {
    store: Arc<Store>,
    source: PathBuf,
    criteria: Criteria,
    running: Mutex<()>,
}

impl Ingestor {
    pub fn new<P>(store: Arc<Store>, source: P, criteria: Criteria) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            store,
            source: source.into(),
            criteria,
            running: Mutex::new(()),
        }
    }

    pub fn from_config(store: Arc<Store>, config: &Config) -> Result<Self, TrackerError> {
        let criteria = Criteria::from_config(&config.ingest)?;
        Ok(Self::new(store, &config.source, criteria))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Replaces the store contents with the current workbook.
    ///
    /// A workbook that cannot be read fails with [`TrackerError::SourceUnreadable`]
    /// and leaves the store as it was. Every outcome is logged here.
    pub fn run(&self) -> Result<IngestReport, TrackerError> {
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match self.ingest() {
            Ok(report) => {
                info!(
                    source = %self.source.display(),
                    sheets = report.sheets.len(),
                    records = report.records,
                    replaced = report.replaced,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "ingested workbook"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(source = %self.source.display(), error = %e, "ingestion failed, keeping stored data");
                Err(e)
            }
        }
    }

    fn ingest(&self) -> Result<IngestReport, TrackerError> {
        let started = Instant::now();
        let sheets = read_workbook(&self.source, &self.criteria)?;
        let records: Vec<CellRecord> = sheets.iter().flat_map(Sheet::records).collect();
        let summary = self.store.replace_cells(&records)?;

        Ok(IngestReport {
            sheets: sheets.iter().map(|sheet| sheet.name().to_owned()).collect(),
            records: summary.inserted,
            replaced: summary.deleted,
            elapsed: started.elapsed(),
        })
    }
}

fn read_workbook(path: &Path, criteria: &Criteria) -> Result<Vec<Sheet>, TrackerError> {
    let mut workbook = Workbook::open(path)?;
    Ok(workbook.read_all(criteria)?)
}
