use crate::config::IngestConfig;
use crate::error::TrackerError;
use glob::Pattern;
use std::collections::HashSet;

/// Criteria controlling how a workbook is normalized into cell records.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Sheet name patterns selecting which sheets receive the placeholder column.
    pub(crate) placeholder_patterns: Vec<Pattern>,

    /// Name of the synthetic, editable column appended to matching sheets.
    pub(crate) placeholder_column: String,

    /// Literals treated as missing values.
    pub(crate) nulls: HashSet<String>,

    /// Drop rows where every source column is missing.
    pub(crate) skip_empty_rows: bool,
}

impl Criteria {
    /// Builds criteria from the `[ingest]` configuration section.
    pub fn from_config(config: &IngestConfig) -> Result<Self, TrackerError> {
        let placeholder_patterns = config
            .placeholder_sheets
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            placeholder_patterns,
            placeholder_column: config.placeholder_column.to_owned(),
            nulls: config.null_values.iter().cloned().collect(),
            skip_empty_rows: config.skip_empty_rows,
        })
    }

    /// Checks if a sheet receives the placeholder column.
    pub fn needs_placeholder(&self, sheet_name: &str) -> bool {
        self.placeholder_patterns
            .iter()
            .any(|pattern| pattern.matches(sheet_name))
    }

    /// Checks if a literal is a recognized missing marker.
    pub fn is_null(&self, literal: &str) -> bool {
        self.nulls.contains(literal.trim())
    }

    pub fn placeholder_column(&self) -> &str {
        &self.placeholder_column
    }
}

impl Default for Criteria {
    fn default() -> Self {
        // Patterns from the default configuration are literal names
        Self::from_config(&IngestConfig::default()).unwrap_or_else(|_| Self {
            placeholder_patterns: Vec::new(),
            placeholder_column: IngestConfig::default().placeholder_column,
            nulls: HashSet::new(),
            skip_empty_rows: false,
        })
    }
}
