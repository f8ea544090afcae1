//! Filtered, column-oriented reads of one sheet.
use crate::config::QueryConfig;
use crate::database::annotations::{assign_checkers, assigned_checkers};
use crate::database::cells::{column_names, DISPLAY_VALUE};
use crate::database::Store;
use crate::error::TrackerError;
use duckdb::params_from_iter;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// How column filters combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Keep whole data rows in which every filtered column holds its filter value
    #[default]
    Row,
    /// Narrow only the filtered column's own values; other columns are returned unfiltered
    Column,
}

impl FromStr for FilterMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "row" => Ok(Self::Row),
            "column" => Ok(Self::Column),
            other => Err(TrackerError::Config(format!(
                "Unknown filter mode '{other}', expected row or column"
            ))),
        }
    }
}

/// A sheet reshaped into columns of rendered values.
///
/// Every stored column is present, in source order, even when the filters
/// leave it empty. `checker` is only set when the sheet has the id column and
/// at least one record matched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetView {
    columns: Vec<(String, Vec<Option<String>>)>,
    positions: HashMap<String, usize>,
    checker: Option<Vec<String>>,
}

impl SheetView {
    fn new(columns: Vec<String>) -> Self {
        let positions = columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.to_owned(), index))
            .collect();
        Self {
            columns: columns.into_iter().map(|column| (column, Vec::new())).collect(),
            positions,
            checker: None,
        }
    }

    fn push(&mut self, column: &str, value: Option<String>) {
        if let Some(index) = self.positions.get(column) {
            self.columns[*index].1.push(value);
        }
    }

    /// Column names in source order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Values of one column, in id order.
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.positions
            .get(name)
            .map(|index| self.columns[*index].1.as_slice())
    }

    /// Checker names aligned with the id column, if enrichment ran.
    pub fn checker(&self) -> Option<&[String]> {
        self.checker.as_deref()
    }

    /// True when no record survived the filters.
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|(_, values)| values.is_empty())
    }
}

impl Serialize for SheetView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (name, values) in &self.columns {
            // the derived checker sequence replaces a source column of the same name
            if self.checker.is_some() && name == "checker" {
                continue;
            }
            map.serialize_entry(name, values)?;
        }
        if let Some(checker) = &self.checker {
            map.serialize_entry("checker", checker)?;
        }
        map.end()
    }
}

impl Store {
    /// Reads `sheet` as columns, narrowed by `filters` (column name -> exact display value).
    pub fn query_sheet(
        &self,
        sheet: &str,
        filters: &BTreeMap<String, String>,
        options: &QueryConfig,
    ) -> Result<SheetView, TrackerError> {
        let session = self.session()?;
        let columns = column_names(&session, sheet)?;
        if columns.is_empty() {
            return Err(TrackerError::SheetNotFound(sheet.to_owned()));
        }

        let (sql, values) = match options.filter_mode {
            FilterMode::Row => row_filter_sql(sheet, filters),
            FilterMode::Column => column_filter_sql(sheet, filters),
        };
        let mut statement = session.prepare(&sql)?;
        let records = statement
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut view = SheetView::new(columns);
        for (column, value) in records {
            view.push(&column, value);
        }

        if !view.is_empty() && view.column(&options.id_column).is_some() {
            let assigned = assigned_checkers(&session)?;
            view.checker = view
                .column(&options.id_column)
                .map(|ids| assign_checkers(ids, &assigned, &options.unassigned_label));
        }
        Ok(view)
    }
}

/// Row mode: a record survives when its data row has a matching record for every filter.
fn row_filter_sql<'a>(sheet: &'a str, filters: &'a BTreeMap<String, String>) -> (String, Vec<&'a str>) {
    let mut sql = format!("SELECT column_name, {DISPLAY_VALUE} FROM sheet_data WHERE sheet_name = ?");
    let mut values = vec![sheet];
    for (column, value) in filters {
        sql.push_str(&format!(
            " AND row_index IN (SELECT row_index FROM sheet_data \
             WHERE sheet_name = ? AND column_name = ? AND {DISPLAY_VALUE} = ?)"
        ));
        values.extend([sheet, column.as_str(), value.as_str()]);
    }
    sql.push_str(" ORDER BY id");
    (sql, values)
}

/// Column mode: each filter only constrains records of its own column.
fn column_filter_sql<'a>(
    sheet: &'a str,
    filters: &'a BTreeMap<String, String>,
) -> (String, Vec<&'a str>) {
    let mut sql = format!("SELECT column_name, {DISPLAY_VALUE} FROM sheet_data WHERE sheet_name = ?");
    let mut values = vec![sheet];
    for (column, value) in filters {
        sql.push_str(&format!(" AND (column_name <> ? OR {DISPLAY_VALUE} = ?)"));
        values.extend([column.as_str(), value.as_str()]);
    }
    sql.push_str(" ORDER BY id");
    (sql, values)
}
