use crate::spreadsheet::cell::{CellRecord, CellValue};
use crate::spreadsheet::criteria::Criteria;
use calamine::{Data, Range};
use std::collections::HashMap;

/// A sheet read from a workbook: a header row followed by rectangular data rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    /// Unique column names in header order, placeholder column last
    pub(crate) columns: Vec<String>,
    /// Data rows, each exactly `columns.len()` wide
    pub(crate) rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Creates an empty sheet with the given header.
    pub(crate) fn new(name: &str, columns: Vec<String>) -> Self {
        Self {
            name: name.to_owned(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a sheet from a used cell range. The first row of the range is the header.
    pub(crate) fn from_range(name: &str, range: &Range<Data>, criteria: &Criteria) -> Self {
        let mut rows = range.rows();
        let header = match rows.next() {
            Some(header) => header,
            None => {
                let mut sheet = Self::new(name, Vec::new());
                sheet.finish(criteria);
                return sheet;
            }
        };

        let columns = header_names(header, criteria);
        let mut sheet = Self::new(name, columns);
        for row in rows {
            let record: Vec<CellValue> = row
                .iter()
                .map(|data| CellValue::classify(data, criteria))
                .collect();
            sheet.push(record, criteria.skip_empty_rows);
        }
        sheet.finish(criteria);
        sheet
    }

    /// Adds a data row, padding or truncating it to the header width.
    pub(crate) fn push(&mut self, mut row: Vec<CellValue>, skip_empty_rows: bool) {
        row.resize(self.columns.len(), CellValue::Missing);
        if skip_empty_rows && row.iter().all(|cell| *cell == CellValue::Missing) {
            return;
        }
        self.rows.push(row);
    }

    /// Appends the placeholder column when the sheet's name asks for one.
    /// An existing source column with the same name is blanked instead.
    pub(crate) fn finish(&mut self, criteria: &Criteria) {
        if !criteria.needs_placeholder(&self.name) {
            return;
        }
        let placeholder = criteria.placeholder_column();
        match self.columns.iter().position(|column| column == placeholder) {
            Some(index) => {
                for row in self.rows.iter_mut() {
                    row[index] = CellValue::Text(String::new());
                }
            }
            None => {
                self.columns.push(placeholder.to_owned());
                for row in self.rows.iter_mut() {
                    row.push(CellValue::Text(String::new()));
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Emits one record per (row, column) pair, row-major.
    pub fn records(&self) -> impl Iterator<Item = CellRecord> + '_ {
        self.rows.iter().enumerate().flat_map(move |(row_index, row)| {
            self.columns
                .iter()
                .zip(row.iter())
                .map(move |(column, value)| CellRecord {
                    sheet_name: self.name.to_owned(),
                    column_name: column.to_owned(),
                    row_index,
                    value: value.to_owned(),
                })
        })
    }
}

/// Converts header cells to unique column names.
/// Blank headers become `Unnamed: <index>`, repeated names get `.1`, `.2`, ... suffixes.
fn header_names(header: &[Data], criteria: &Criteria) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());
    for (index, data) in header.iter().enumerate() {
        let base = CellValue::classify(data, criteria)
            .display()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Unnamed: {index}"));
        let mut name = base.to_owned();
        while let Some(count) = seen.get(&name).copied() {
            seen.insert(name.to_owned(), count + 1);
            name = format!("{base}.{}", count + 1);
        }
        seen.insert(name.to_owned(), 0);
        names.push(name);
    }
    names
}
