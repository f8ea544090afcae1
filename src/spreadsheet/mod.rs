//! # Spreadsheet Processing Module
//!
//! Reads a workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) and normalizes
//! every sheet into long-format cell records: one record per (row, column)
//! pair, with dates, text and missing values separated into distinct slots.
use calamine::{open_workbook_auto, Reader, Sheets};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod cell;
pub mod criteria;
pub mod sheet;

pub use cell::{CellRecord, CellValue};
pub use criteria::Criteria;
pub use sheet::Sheet;

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// The file is missing, unreadable or not a recognized workbook format
    #[error("Cannot open workbook '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: calamine::Error,
    },

    /// A sheet listed by the workbook cannot be parsed
    #[error("Cannot read sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    /// The workbook has no sheets at all
    #[error("Workbook '{path}' contains no sheets")]
    NoSheets { path: String },
}

/// An open workbook.
pub struct Workbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    /// Opens a workbook, detecting the format from the file extension.
    pub fn open<P>(path: P) -> Result<Self, SpreadsheetError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();
        let sheets = open_workbook_auto(&path).map_err(|source| SpreadsheetError::Open {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        Ok(Self { path, sheets })
    }

    /// Returns sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    /// Reads and normalizes one sheet.
    pub fn read_sheet(
        &mut self,
        sheet_name: &str,
        criteria: &Criteria,
    ) -> Result<Sheet, SpreadsheetError> {
        let range = self
            .sheets
            .worksheet_range(sheet_name)
            .map_err(|source| SpreadsheetError::Sheet {
                sheet: sheet_name.to_owned(),
                source,
            })?;
        Ok(Sheet::from_range(sheet_name, &range, criteria))
    }

    /// Reads every sheet in workbook order. Fails as a whole if any sheet fails.
    pub fn read_all(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SpreadsheetError> {
        let names = self.sheet_names();
        if names.is_empty() {
            return Err(SpreadsheetError::NoSheets {
                path: self.path.to_string_lossy().to_string(),
            });
        }
        names
            .iter()
            .map(|name| self.read_sheet(name, criteria))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook as XlsxWorkbook};
    use std::path::Path;

    /// Cell content written by [`write_workbook`].
    pub(crate) enum Fixture {
        Text(&'static str),
        Number(f64),
        Date(u16, u8, u8),
        Blank,
    }

    /// Writes an `.xlsx` file with one sheet per entry. The first row of each sheet is its header.
    pub(crate) fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<Fixture>>)]) {
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let mut workbook = XlsxWorkbook::new();
        for (name, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*name).unwrap();
            for (row, cells) in rows.iter().enumerate() {
                for (col, cell) in cells.iter().enumerate() {
                    let (row, col) = (row as u32, col as u16);
                    match cell {
                        Fixture::Text(value) => {
                            worksheet.write_string(row, col, *value).unwrap();
                        }
                        Fixture::Number(value) => {
                            worksheet.write_number(row, col, *value).unwrap();
                        }
                        Fixture::Date(year, month, day) => {
                            let date = ExcelDateTime::from_ymd(*year, *month, *day).unwrap();
                            worksheet
                                .write_datetime_with_format(row, col, &date, &date_format)
                                .unwrap();
                        }
                        Fixture::Blank => (),
                    }
                }
            }
        }
        workbook.save(path).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{write_workbook, Fixture::*};
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn read_workbook_sheets_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_workbook(
            &path,
            &[
                ("S1", vec![vec![Text("A"), Text("B")], vec![Text("a1"), Number(7.0)]]),
                ("S2", vec![vec![Text("C")], vec![Date(2024, 1, 15)]]),
            ],
        );

        let mut workbook = Workbook::open(&path).unwrap();
        let sheets = workbook.read_all(&Criteria::default()).unwrap();

        assert_eq!(workbook.sheet_names(), ["S1", "S2"]);
        assert_eq!(sheets[0].columns(), ["A", "B"]);
        assert_eq!(sheets[0].rows[0][1], CellValue::Text("7".to_owned()));
        assert_eq!(
            sheets[1].rows[0][0],
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_time(NaiveTime::MIN)
            )
        );
    }

    #[test]
    fn read_workbook_blank_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_workbook(
            &path,
            &[(
                "S1",
                vec![
                    vec![Text("A"), Text("B")],
                    vec![Blank, Text("b1")],
                    vec![Text("a2"), Blank],
                ],
            )],
        );

        let mut workbook = Workbook::open(&path).unwrap();
        let sheet = workbook.read_sheet("S1", &Criteria::default()).unwrap();

        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.rows[0][0], CellValue::Missing);
        assert_eq!(sheet.rows[1][1], CellValue::Missing);
    }

    #[test]
    fn open_missing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let result = Workbook::open(dir.path().join("missing.xlsx"));

        assert!(matches!(result, Err(SpreadsheetError::Open { .. })));
    }

    #[test]
    fn open_corrupt_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        assert!(matches!(
            Workbook::open(&path),
            Err(SpreadsheetError::Open { .. })
        ));
    }
}
