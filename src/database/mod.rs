//! # Database Module
//!
//! DuckDB-backed storage for the long-format row store, the annotation store
//! and the per-sheet statistics table.
//!
//! One primary database handle is kept open; every operation runs on its own
//! cloned connection, so a request never shares session state with another.
//! Mutations are serialized through a writer lock and committed as a single
//! transaction each, which means readers observe either the previous or the
//! next snapshot of the store.
use crate::error::TrackerError;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub mod annotations;
pub mod cells;
pub mod query;
mod schema;
pub mod statistics;

pub use annotations::{assign_checkers, Annotation, AnnotationUpdate, Flag};
pub use cells::{CellFilter, ReplaceSummary, StoredCell};
pub use query::{FilterMode, SheetView};
pub use statistics::SheetStatistic;

/// Path understood as "keep the database in memory".
pub const IN_MEMORY: &str = ":memory:";

/// Handle to the embedded store, shared by request handlers and the ingestion pipeline.
pub struct Store {
    /// Primary handle; sessions are cloned from it
    database: Mutex<Connection>,
    /// Serializes replace, edit, upsert and statistics writes
    writer: Mutex<()>,
}

impl Store {
    /// Opens (or creates) a database file and installs the schema.
    pub fn open<P>(path: P) -> Result<Self, TrackerError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if path == Path::new(IN_MEMORY) {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, TrackerError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, TrackerError> {
        schema::install(&connection)?;
        Ok(Self {
            database: Mutex::new(connection),
            writer: Mutex::new(()),
        })
    }

    /// Opens a fresh connection to the shared database.
    pub(crate) fn session(&self) -> Result<Connection, TrackerError> {
        let database = self.database.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(database.try_clone()?)
    }

    /// Runs `operation` inside one transaction while holding the writer lock.
    /// The transaction rolls back if `operation` fails.
    pub(crate) fn write<T, F>(&self, operation: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&Connection) -> Result<T, TrackerError>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = self.session()?;
        let transaction = session.transaction()?;
        let output = operation(&transaction)?;
        transaction.commit()?;
        Ok(output)
    }
}
