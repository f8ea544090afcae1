use thiserror::Error;

/// Main error type for the sheet tracker.
/// Aggregates errors from the workbook reader, the embedded store, configuration and the standard library.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{0}")]
    WithContextError(String),

    /// Workbook missing, corrupt or unreadable; ingestion aborts and the store keeps its contents
    #[error("Source workbook unreadable: {0}")]
    SourceUnreadable(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Row {ordinal} of column '{column}' in sheet '{sheet}' not found")]
    RowNotFound {
        sheet: String,
        column: String,
        ordinal: u64,
    },

    #[error("Invalid flag value '{0}', expected yes, no or unknown")]
    InvalidFlag(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    // Third-party library errors
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    #[error("{0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),
}

impl TrackerError {
    /// True for the errors a caller should report as "not found" rather than as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SheetNotFound(_) | Self::RowNotFound { .. })
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, TrackerError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| TrackerError::WithContextError(format!("{}: {}", message, e)))
    }
}
