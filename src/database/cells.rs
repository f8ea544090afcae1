//! Long-format row store: one record per (sheet, column, data row).
use crate::database::Store;
use crate::error::TrackerError;
use crate::spreadsheet::CellRecord;
use chrono::{NaiveDateTime, SubsecRound, Utc};
use duckdb::{params, params_from_iter, Connection};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// SQL rendering of a stored value, shared by output and filter matching:
/// the text slot if set, otherwise the date slot (date only at midnight).
pub(crate) const DISPLAY_VALUE: &str = "coalesce(value, CASE \
    WHEN CAST(date_value AS TIME) = TIME '00:00:00' THEN strftime(date_value, '%Y-%m-%d') \
    ELSE strftime(date_value, '%Y-%m-%d %H:%M:%S') END)";

/// A record as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCell {
    /// Unique within one ingestion batch, increasing in row-major source order
    pub id: i64,
    pub sheet_name: String,
    pub column_name: String,
    pub row_index: i64,
    pub value: Option<String>,
    pub date_value: Option<NaiveDateTime>,
    /// Ingestion time, identical for every record of a batch
    pub created_at: NaiveDateTime,
}

/// Equality filter on the row store; `None` fields match everything.
/// `value` is compared against the rendered display value.
#[derive(Debug, Clone, Default)]
pub struct CellFilter<'a> {
    pub sheet_name: Option<&'a str>,
    pub column_name: Option<&'a str>,
    pub value: Option<&'a str>,
}

impl CellFilter<'_> {
    fn where_clause(&self) -> (String, Vec<&str>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();
        if let Some(sheet_name) = self.sheet_name {
            conditions.push("sheet_name = ?".to_owned());
            values.push(sheet_name);
        }
        if let Some(column_name) = self.column_name {
            conditions.push("column_name = ?".to_owned());
            values.push(column_name);
        }
        if let Some(value) = self.value {
            conditions.push(format!("{DISPLAY_VALUE} = ?"));
            values.push(value);
        }
        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

/// Outcome of a full replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub deleted: usize,
    pub inserted: usize,
}

impl Store {
    /// Replaces every stored cell record with `records` in one transaction.
    ///
    /// The batch is staged first and swapped in afterwards; if anything fails
    /// the previous contents stay visible. Ids continue after the largest id
    /// ever stored, so ids of one batch never collide with the previous one.
    pub fn replace_cells(&self, records: &[CellRecord]) -> Result<ReplaceSummary, TrackerError> {
        self.write(|connection| {
            let first_id: i64 = connection.query_row(
                "SELECT coalesce(max(id), 0) + 1 FROM sheet_data",
                [],
                |row| row.get(0),
            )?;
            let created_at = Utc::now().naive_utc().trunc_subsecs(6);

            connection.execute("DELETE FROM sheet_data_staging", [])?;
            {
                let mut appender = connection.appender("sheet_data_staging")?;
                for (offset, record) in records.iter().enumerate() {
                    appender.append_row(params![
                        first_id + offset as i64,
                        record.sheet_name,
                        record.column_name,
                        record.row_index as i64,
                        record.value.text(),
                        record.value.date(),
                        created_at,
                    ])?;
                }
                appender.flush()?;
            }

            let deleted = connection.execute("DELETE FROM sheet_data", [])?;
            let inserted = connection.execute(
                "INSERT INTO sheet_data (id, sheet_name, column_name, row_index, value, date_value, created_at)
                 SELECT id, sheet_name, column_name, row_index, value, date_value, created_at
                 FROM sheet_data_staging ORDER BY id",
                [],
            )?;
            connection.execute("DELETE FROM sheet_data_staging", [])?;
            debug!(first_id, deleted, inserted, "replaced sheet data");
            Ok(ReplaceSummary { deleted, inserted })
        })
    }

    /// Records matching `filter`, in id order.
    pub fn find_cells(&self, filter: &CellFilter<'_>) -> Result<Vec<StoredCell>, TrackerError> {
        let session = self.session()?;
        let (where_clause, values) = filter.where_clause();
        let mut statement = session.prepare(&format!(
            "SELECT id, sheet_name, column_name, row_index, value, date_value, created_at
             FROM sheet_data{where_clause} ORDER BY id"
        ))?;
        let cells = statement
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(StoredCell {
                    id: row.get(0)?,
                    sheet_name: row.get(1)?,
                    column_name: row.get(2)?,
                    row_index: row.get(3)?,
                    value: row.get(4)?,
                    date_value: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cells)
    }

    /// Number of records matching `filter`.
    pub fn count_cells(&self, filter: &CellFilter<'_>) -> Result<i64, TrackerError> {
        count_cells(&self.session()?, filter)
    }

    /// Distinct sheet names in first-ingested order.
    pub fn sheet_names(&self) -> Result<Vec<String>, TrackerError> {
        sheet_names(&self.session()?)
    }

    /// Distinct rendered values per column of `sheet`, sorted ascending.
    /// Columns whose values are all missing map to an empty set.
    pub fn column_filters(
        &self,
        sheet: &str,
    ) -> Result<BTreeMap<String, BTreeSet<String>>, TrackerError> {
        let session = self.session()?;
        let mut filters: BTreeMap<String, BTreeSet<String>> = column_names(&session, sheet)?
            .into_iter()
            .map(|column| (column, BTreeSet::new()))
            .collect();
        if filters.is_empty() {
            return Err(TrackerError::SheetNotFound(sheet.to_owned()));
        }

        let mut statement = session.prepare(&format!(
            "SELECT DISTINCT column_name, {DISPLAY_VALUE}
             FROM sheet_data
             WHERE sheet_name = ? AND (value IS NOT NULL OR date_value IS NOT NULL)"
        ))?;
        let mut rows = statement.query(params![sheet])?;
        while let Some(row) = rows.next()? {
            let column: String = row.get(0)?;
            let value: String = row.get(1)?;
            filters.entry(column).or_default().insert(value);
        }
        Ok(filters)
    }

    /// Overwrites the `ordinal`-th record (zero-based, id order) of `column` in `sheet`.
    pub fn edit_cell(
        &self,
        sheet: &str,
        column: &str,
        ordinal: u64,
        value: &str,
    ) -> Result<i64, TrackerError> {
        let offset = i64::try_from(ordinal).map_err(|_| TrackerError::RowNotFound {
            sheet: sheet.to_owned(),
            column: column.to_owned(),
            ordinal,
        })?;
        self.write(|connection| {
            let id: i64 = match connection.query_row(
                "SELECT id FROM sheet_data WHERE sheet_name = ? AND column_name = ?
                 ORDER BY id LIMIT 1 OFFSET ?",
                params![sheet, column, offset],
                |row| row.get(0),
            ) {
                Ok(id) => id,
                Err(duckdb::Error::QueryReturnedNoRows) => {
                    return Err(TrackerError::RowNotFound {
                        sheet: sheet.to_owned(),
                        column: column.to_owned(),
                        ordinal,
                    })
                }
                Err(e) => return Err(e.into()),
            };
            connection.execute(
                "UPDATE sheet_data SET value = ?, date_value = NULL WHERE id = ?",
                params![value, id],
            )?;
            Ok(id)
        })
    }
}

pub(crate) fn sheet_names(connection: &Connection) -> Result<Vec<String>, TrackerError> {
    let mut statement = connection
        .prepare("SELECT sheet_name FROM sheet_data GROUP BY sheet_name ORDER BY min(id)")?;
    let names = statement
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Columns of `sheet` in source order.
pub(crate) fn column_names(connection: &Connection, sheet: &str) -> Result<Vec<String>, TrackerError> {
    let mut statement = connection.prepare(
        "SELECT column_name FROM sheet_data WHERE sheet_name = ?
         GROUP BY column_name ORDER BY min(id)",
    )?;
    let names = statement
        .query_map(params![sheet], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

pub(crate) fn count_cells(
    connection: &Connection,
    filter: &CellFilter<'_>,
) -> Result<i64, TrackerError> {
    let (where_clause, values) = filter.where_clause();
    let count = connection.query_row(
        &format!("SELECT count(*) FROM sheet_data{where_clause}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spreadsheet::CellValue;
    use chrono::NaiveDate;

    pub(crate) fn record(sheet: &str, column: &str, row_index: usize, value: CellValue) -> CellRecord {
        CellRecord {
            sheet_name: sheet.to_owned(),
            column_name: column.to_owned(),
            row_index,
            value,
        }
    }

    pub(crate) fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    /// Builds row-major records for one sheet from a header and text rows.
    /// `None` entries become missing values.
    pub(crate) fn sheet_records(sheet: &str, header: &[&str], rows: &[&[Option<&str>]]) -> Vec<CellRecord> {
        let mut records = Vec::new();
        for (row_index, row) in rows.iter().enumerate() {
            for (column, value) in header.iter().zip(row.iter()) {
                let value = value.map(text).unwrap_or(CellValue::Missing);
                records.push(record(sheet, column, row_index, value));
            }
        }
        records
    }

    #[test]
    fn replace_assigns_increasing_ids() {
        let store = Store::open_in_memory().unwrap();
        let records = sheet_records(
            "S1",
            &["A", "B"],
            &[&[Some("a0"), Some("b0")], &[Some("a1"), None]],
        );

        let summary = store.replace_cells(&records).unwrap();
        assert_eq!(summary, ReplaceSummary { deleted: 0, inserted: 4 });

        let cells = store.find_cells(&CellFilter::default()).unwrap();
        let ids: Vec<i64> = cells.iter().map(|cell| cell.id).collect();
        assert_eq!(ids, [1, 2, 3, 4]);
        assert_eq!(cells[3].column_name, "B");
        assert_eq!(cells[3].row_index, 1);
        assert_eq!(cells[3].value, None);
        assert_eq!(cells[3].date_value, None);
        assert!(cells.iter().all(|cell| cell.created_at == cells[0].created_at));
    }

    #[test]
    fn replace_discards_previous_batch() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_cells(&sheet_records("Old", &["A"], &[&[Some("x")], &[Some("y")]]))
            .unwrap();

        let summary = store
            .replace_cells(&sheet_records("New", &["A"], &[&[Some("z")]]))
            .unwrap();

        assert_eq!(summary, ReplaceSummary { deleted: 2, inserted: 1 });
        assert_eq!(store.sheet_names().unwrap(), ["New"]);
        let cells = store.find_cells(&CellFilter::default()).unwrap();
        assert_eq!(cells[0].id, 3);
    }

    #[test]
    fn replace_with_empty_batch_clears_store() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_cells(&sheet_records("S1", &["A"], &[&[Some("x")]]))
            .unwrap();
        store.replace_cells(&[]).unwrap();

        assert!(store.sheet_names().unwrap().is_empty());
    }

    #[test]
    fn dates_use_the_date_slot() {
        let store = Store::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let records = vec![
            record("S1", "Due", 0, CellValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap())),
            record("S1", "Due", 1, CellValue::DateTime(date.and_hms_opt(9, 30, 0).unwrap())),
        ];
        store.replace_cells(&records).unwrap();

        let cells = store.find_cells(&CellFilter::default()).unwrap();
        assert_eq!(cells[0].value, None);
        assert_eq!(cells[0].date_value, Some(date.and_hms_opt(0, 0, 0).unwrap()));

        let filters = store.column_filters("S1").unwrap();
        let due: Vec<&str> = filters["Due"].iter().map(String::as_str).collect();
        assert_eq!(due, ["2024-01-15", "2024-01-15 09:30:00"]);
    }

    #[test]
    fn sheet_names_in_ingestion_order() {
        let store = Store::open_in_memory().unwrap();
        let mut records = sheet_records("Zeta", &["A"], &[&[Some("1")]]);
        records.extend(sheet_records("Alpha", &["A"], &[&[Some("2")]]));
        store.replace_cells(&records).unwrap();

        assert_eq!(store.sheet_names().unwrap(), ["Zeta", "Alpha"]);
    }

    #[test]
    fn column_filters_are_distinct_and_sorted() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_cells(&sheet_records(
                "S1",
                &["Status", "Notes"],
                &[
                    &[Some("open"), None],
                    &[Some("closed"), None],
                    &[Some("open"), None],
                ],
            ))
            .unwrap();

        let filters = store.column_filters("S1").unwrap();

        let status: Vec<&str> = filters["Status"].iter().map(String::as_str).collect();
        assert_eq!(status, ["closed", "open"]);
        assert!(filters["Notes"].is_empty());
    }

    #[test]
    fn column_filters_unknown_sheet() {
        let store = Store::open_in_memory().unwrap();

        assert!(matches!(
            store.column_filters("Nope"),
            Err(TrackerError::SheetNotFound(sheet)) if sheet == "Nope"
        ));
    }

    #[test]
    fn find_cells_by_value() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_cells(&sheet_records(
                "S1",
                &["ID", "Status"],
                &[&[Some("P1"), Some("#")], &[Some("P2"), Some("done")], &[Some("P3"), Some("#")]],
            ))
            .unwrap();

        let filter = CellFilter {
            sheet_name: Some("S1"),
            column_name: Some("Status"),
            value: Some("#"),
        };
        let cells = store.find_cells(&filter).unwrap();

        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].row_index, 2);
        assert_eq!(store.count_cells(&filter).unwrap(), 2);
    }

    #[test]
    fn edit_cell_by_ordinal() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_cells(&sheet_records(
                "All_Jobs_Ranked",
                &["ID", "Blank_Column"],
                &[&[Some("P1"), Some("")], &[Some("P2"), Some("")], &[Some("P3"), Some("")]],
            ))
            .unwrap();

        store
            .edit_cell("All_Jobs_Ranked", "Blank_Column", 1, "urgent")
            .unwrap();

        let cells = store
            .find_cells(&CellFilter {
                sheet_name: Some("All_Jobs_Ranked"),
                column_name: Some("Blank_Column"),
                value: None,
            })
            .unwrap();
        let values: Vec<Option<&str>> = cells.iter().map(|cell| cell.value.as_deref()).collect();
        assert_eq!(values, [Some(""), Some("urgent"), Some("")]);
    }

    #[test]
    fn edit_cell_out_of_range() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_cells(&sheet_records("S1", &["Blank_Column"], &[&[Some("")]]))
            .unwrap();

        assert!(matches!(
            store.edit_cell("S1", "Blank_Column", 5, "x"),
            Err(TrackerError::RowNotFound { ordinal: 5, .. })
        ));
        assert!(matches!(
            store.edit_cell("S1", "Missing", 0, "x"),
            Err(TrackerError::RowNotFound { .. })
        ));
    }

    #[test]
    fn readers_never_see_an_empty_store() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let store = Store::open_in_memory().unwrap();
        let ids: Vec<String> = (0..500).map(|n| format!("P{n}")).collect();
        let rows: Vec<[Option<&str>; 2]> = ids
            .iter()
            .map(|id| [Some(id.as_str()), Some("open")])
            .collect();
        let rows: Vec<&[Option<&str>]> = rows.iter().map(|row| row.as_slice()).collect();
        let batch = sheet_records("Jobs", &["ID", "Status"], &rows);
        store.replace_cells(&batch).unwrap();

        let done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut reads = 0;
                loop {
                    assert_eq!(store.sheet_names().unwrap(), ["Jobs"]);
                    assert_eq!(
                        store.count_cells(&CellFilter::default()).unwrap(),
                        batch.len() as i64
                    );
                    reads += 1;
                    if done.load(Ordering::Acquire) {
                        return reads;
                    }
                }
            });
            for _ in 0..20 {
                store.replace_cells(&batch).unwrap();
            }
            done.store(true, Ordering::Release);
            assert!(reader.join().unwrap() > 0);
        });
    }
}
