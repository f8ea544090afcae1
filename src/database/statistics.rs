use crate::config::StatisticsConfig;
use crate::database::cells::{count_cells, sheet_names, CellFilter};
use crate::database::Store;
use crate::error::TrackerError;
use chrono::{NaiveDateTime, SubsecRound, Utc};
use duckdb::params;
use serde::Serialize;
use std::collections::BTreeSet;

/// Number of rows waiting for assignment in one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetStatistic {
    /// Uppercased sheet name
    pub sheet_name: String,
    pub unassigned_count: i64,
    pub created_at: NaiveDateTime,
}

impl Store {
    /// Counts rows whose status column equals the sentinel, per sheet, and upserts the results.
    pub fn recompute_statistics(
        &self,
        config: &StatisticsConfig,
    ) -> Result<Vec<SheetStatistic>, TrackerError> {
        self.write(|connection| {
            let stored = sheet_names(connection)?;
            let targets: BTreeSet<String> = if config.sheets.is_empty() {
                stored.iter().map(|name| name.to_uppercase()).collect()
            } else {
                config.sheets.iter().map(|name| name.to_uppercase()).collect()
            };
            let created_at = Utc::now().naive_utc().trunc_subsecs(6);

            let mut statistics = Vec::with_capacity(targets.len());
            for sheet_name in targets {
                let mut unassigned_count = 0;
                for stored_name in stored.iter().filter(|name| name.to_uppercase() == sheet_name) {
                    unassigned_count += count_cells(
                        connection,
                        &CellFilter {
                            sheet_name: Some(stored_name.as_str()),
                            column_name: Some(config.status_column.as_str()),
                            value: Some(config.sentinel.as_str()),
                        },
                    )?;
                }
                connection.execute(
                    "INSERT INTO sheet_statistics (sheet_name, unassigned_count, created_at)
                     VALUES (?, ?, ?)
                     ON CONFLICT (sheet_name) DO UPDATE
                     SET unassigned_count = excluded.unassigned_count, created_at = excluded.created_at",
                    params![sheet_name, unassigned_count, created_at],
                )?;
                statistics.push(SheetStatistic {
                    sheet_name,
                    unassigned_count,
                    created_at,
                });
            }
            Ok(statistics)
        })
    }

    /// Stored statistics ordered by sheet name.
    pub fn statistics(&self) -> Result<Vec<SheetStatistic>, TrackerError> {
        let session = self.session()?;
        let mut statement = session.prepare(
            "SELECT sheet_name, unassigned_count, created_at FROM sheet_statistics ORDER BY sheet_name",
        )?;
        let statistics = statement
            .query_map([], |row| {
                Ok(SheetStatistic {
                    sheet_name: row.get(0)?,
                    unassigned_count: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(statistics)
    }
}
