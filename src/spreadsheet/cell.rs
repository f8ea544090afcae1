use crate::spreadsheet::criteria::Criteria;
use calamine::{Data, ExcelDateTime};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Normalized content of one spreadsheet cell.
///
/// Exactly one storage slot is used per value: text goes to `value`, calendar
/// timestamps go to `date_value`, and missing cells leave both slots null.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// Anything that is neither a date nor a missing marker, in textual form
    Text(String),
    /// Date or date/time values
    DateTime(NaiveDateTime),
    /// Empty cells and recognized missing markers
    Missing,
}

impl CellValue {
    /// Classifies a raw workbook value.
    ///
    /// Date cells become [`CellValue::DateTime`], empty cells and configured
    /// null literals become [`CellValue::Missing`], everything else is coerced
    /// to its textual representation.
    pub fn classify(data: &Data, criteria: &Criteria) -> Self {
        match data {
            Data::Empty => Self::Missing,
            Data::String(value) if criteria.is_null(value) => Self::Missing,
            Data::String(value) => Self::Text(value.to_owned()),
            Data::Float(value) if value.is_nan() => Self::Missing,
            Data::Float(value) => Self::Text(value.to_string()),
            Data::Int(value) => Self::Text(value.to_string()),
            Data::Bool(value) => Self::Text(if *value { "TRUE" } else { "FALSE" }.to_owned()),
            Data::DateTime(value) => classify_excel_datetime(value),
            Data::DateTimeIso(value) => classify_iso_datetime(value),
            Data::DurationIso(value) => Self::Text(value.to_owned()),
            Data::Error(error) => {
                let literal = error.to_string();
                if criteria.is_null(&literal) {
                    Self::Missing
                } else {
                    Self::Text(literal)
                }
            }
        }
    }

    /// Text slot of the record, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Date slot of the record, if any.
    pub fn date(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    /// Display form used for header names.
    pub fn display(&self) -> Option<String> {
        match self {
            Self::Text(value) => Some(value.to_owned()),
            Self::DateTime(value) => Some(format_datetime(value)),
            Self::Missing => None,
        }
    }
}

/// Formats a timestamp the way the store renders it: date only at midnight.
pub fn format_datetime(value: &NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Excel serial dates. Serials below one day carry no calendar date and are kept as clock text.
fn classify_excel_datetime(value: &ExcelDateTime) -> CellValue {
    if value.is_duration() {
        return match value.as_duration() {
            Some(duration) => {
                let seconds = duration.num_seconds();
                CellValue::Text(format!(
                    "{}:{:02}:{:02}",
                    seconds / 3600,
                    (seconds % 3600) / 60,
                    seconds % 60
                ))
            }
            None => CellValue::Text(value.as_f64().to_string()),
        };
    }
    match value.as_datetime() {
        Some(datetime) if value.as_f64() < 1.0 => {
            CellValue::Text(datetime.time().format("%H:%M:%S").to_string())
        }
        Some(datetime) => CellValue::DateTime(datetime),
        None => CellValue::Text(value.as_f64().to_string()),
    }
}

/// ISO 8601 strings as produced by OpenDocument readers.
fn classify_iso_datetime(value: &str) -> CellValue {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        CellValue::DateTime(datetime)
    } else if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        CellValue::DateTime(datetime.naive_local())
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        CellValue::DateTime(date.and_time(NaiveTime::MIN))
    } else {
        CellValue::Text(value.to_owned())
    }
}

/// One normalized cell, tagged with its sheet, column and data-row position.
#[derive(Clone, Debug, PartialEq)]
pub struct CellRecord {
    pub sheet_name: String,
    pub column_name: String,
    /// Zero-based position of the data row inside its sheet (header excluded)
    pub row_index: usize,
    pub value: CellValue,
}
