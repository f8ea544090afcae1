//! Configuration Module
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables. Every field has a default, so an empty file (or no file at all)
//! yields a working development setup.

use crate::database::FilterMode;
use crate::error::{ResultMessage, TrackerError};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sheet-tracker.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Workbook ingested at startup and whenever it changes
    pub source: PathBuf,
    /// DuckDB database file; `:memory:` keeps everything in memory
    pub database: PathBuf,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub query: QueryConfig,
    pub watch: WatchConfig,
    pub statistics: StatisticsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::from("uploads/All_Regions_OpenProjects.xlsx"),
            database: PathBuf::from("database.duckdb"),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            ingest: IngestConfig::default(),
            query: QueryConfig::default(),
            watch: WatchConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "sheet_tracker=info,tower_http=info,warn".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Name of the synthetic editable column
    pub placeholder_column: String,
    /// Glob patterns of sheets that receive the placeholder column
    pub placeholder_sheets: Vec<String>,
    /// Cell literals stored as missing values
    pub null_values: Vec<String>,
    pub skip_empty_rows: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            placeholder_column: "Blank_Column".to_owned(),
            placeholder_sheets: ["All_Jobs_Ranked", "All_Jobs_unRanked", "Projects_In_Process"]
                .map(str::to_owned)
                .to_vec(),
            null_values: [
                "", "#N/A", "#NA", "N/A", "NA", "n/a", "NULL", "null", "NaN", "nan", "-NaN",
            ]
            .map(str::to_owned)
            .to_vec(),
            skip_empty_rows: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub filter_mode: FilterMode,
    /// Column whose values are matched against annotation project ids
    pub id_column: String,
    /// Checker reported for ids without an assigned checker
    pub unassigned_label: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            filter_mode: FilterMode::Row,
            id_column: "ID".to_owned(),
            unassigned_label: "Not Assigned".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatisticsConfig {
    /// Column holding the workflow status
    pub status_column: String,
    /// Status value counted as unassigned
    pub sentinel: String,
    /// Sheets to count, matched case-insensitively; empty means every stored sheet
    pub sheets: Vec<String>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            status_column: "Status".to_owned(),
            sentinel: "#".to_owned(),
            sheets: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists,
    /// then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, TrackerError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Parses a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, TrackerError> {
        std::fs::read_to_string(path)
            .map_err(TrackerError::from)
            .and_then(|content| Self::from_toml(&content))
            .with_prefix(&path.to_string_lossy())
    }

    pub fn from_toml(content: &str) -> Result<Self, TrackerError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from a variable lookup.
    ///
    /// - `SHEET_TRACKER_SOURCE`: workbook path
    /// - `SHEET_TRACKER_DATABASE`: database path
    /// - `SHEET_TRACKER_BIND`: listen address, e.g. `0.0.0.0:8080`
    /// - `SHEET_TRACKER_FILTER_MODE`: `row` or `column`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, TrackerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(source) = lookup("SHEET_TRACKER_SOURCE") {
            self.source = PathBuf::from(source);
        }
        if let Some(database) = lookup("SHEET_TRACKER_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(bind) = lookup("SHEET_TRACKER_BIND") {
            self.server.bind = bind.parse().map_err(|_| {
                TrackerError::Config(format!("SHEET_TRACKER_BIND '{bind}' is not a socket address"))
            })?;
        }
        if let Some(mode) = lookup("SHEET_TRACKER_FILTER_MODE") {
            self.query.filter_mode = mode.parse()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.server.bind.port(), 5000);
        assert_eq!(config.query.filter_mode, FilterMode::Row);
        assert_eq!(config.query.id_column, "ID");
        assert_eq!(config.ingest.placeholder_column, "Blank_Column");
        assert_eq!(config.statistics.sentinel, "#");
        assert!(config.watch.enabled);
    }

    #[test]
    fn parse_sections() {
        let config = Config::from_toml(
            r#"
            source = "/data/jobs.xlsx"
            database = ":memory:"

            [server]
            bind = "0.0.0.0:8080"

            [logging]
            format = "json"

            [ingest]
            placeholder_sheets = ["Jobs_*"]
            skip_empty_rows = true

            [query]
            filter_mode = "column"

            [watch]
            poll_interval_ms = 250

            [statistics]
            status_column = "Checker"
            sheets = ["north", "south"]
            "#,
        )
        .unwrap();

        assert_eq!(config.source, PathBuf::from("/data/jobs.xlsx"));
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.ingest.placeholder_sheets, ["Jobs_*"]);
        assert!(config.ingest.skip_empty_rows);
        assert_eq!(config.query.filter_mode, FilterMode::Column);
        assert_eq!(config.watch.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.statistics.sheets, ["north", "south"]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            Config::from_toml("[query]\nfilter = \"row\""),
            Err(TrackerError::TomlError(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SHEET_TRACKER_SOURCE", "other.xlsx"),
            ("SHEET_TRACKER_BIND", "127.0.0.1:9000"),
            ("SHEET_TRACKER_FILTER_MODE", "column"),
        ]);
        let config = Config::default()
            .with_env_overrides(|name| vars.get(name).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(config.source, PathBuf::from("other.xlsx"));
        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.query.filter_mode, FilterMode::Column);
    }

    #[test]
    fn invalid_env_override() {
        let result = Config::default().with_env_overrides(|name| {
            (name == "SHEET_TRACKER_FILTER_MODE").then(|| "diagonal".to_owned())
        });

        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let error = Config::from_file(Path::new("/nonexistent/sheet-tracker.toml")).unwrap_err();

        assert!(error.to_string().starts_with("/nonexistent/sheet-tracker.toml: "));
    }
}
