//! Table definitions and additive migrations.
use crate::error::{ResultMessage, TrackerError};
use duckdb::{params, Connection};
use tracing::info;

/// Base schema. Statements are idempotent so every start can run them.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sheet_data (
    id          BIGINT    NOT NULL,
    sheet_name  VARCHAR   NOT NULL,
    column_name VARCHAR   NOT NULL,
    row_index   BIGINT    NOT NULL,
    value       VARCHAR,
    date_value  TIMESTAMP,
    created_at  TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS sheet_data_staging (
    id          BIGINT    NOT NULL,
    sheet_name  VARCHAR   NOT NULL,
    column_name VARCHAR   NOT NULL,
    row_index   BIGINT    NOT NULL,
    value       VARCHAR,
    date_value  TIMESTAMP,
    created_at  TIMESTAMP NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS project_data_id_seq START 1;

CREATE TABLE IF NOT EXISTS project_data (
    id            BIGINT  PRIMARY KEY DEFAULT nextval('project_data_id_seq'),
    project_id    VARCHAR NOT NULL UNIQUE,
    data          VARCHAR,
    is_complex    VARCHAR NOT NULL DEFAULT 'no',
    forested      VARCHAR NOT NULL DEFAULT 'no',
    recalculation VARCHAR NOT NULL DEFAULT 'no',
    cfd           VARCHAR NOT NULL DEFAULT 'no',
    checker       VARCHAR
);

CREATE TABLE IF NOT EXISTS sheet_statistics (
    sheet_name       VARCHAR   PRIMARY KEY,
    unassigned_count BIGINT    NOT NULL,
    created_at       TIMESTAMP NOT NULL
);
"#;

/// Columns added after the first release: (table, column, definition).
/// Applied only when missing, so existing data is never rewritten.
const MIGRATIONS: &[(&str, &str, &str)] = &[
    ("sheet_data", "row_index", "BIGINT"),
    ("project_data", "checker", "VARCHAR"),
];

pub(crate) fn install(connection: &Connection) -> Result<(), TrackerError> {
    connection
        .execute_batch(SCHEMA)
        .map_err(TrackerError::from)
        .with_prefix("Failed to install schema")?;
    for (table, column, definition) in MIGRATIONS {
        if has_column(connection, table, column)? {
            continue;
        }
        info!(table, column, "adding missing column");
        connection
            .execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} {definition}"
            ))
            .map_err(TrackerError::from)
            .with_prefix(&format!("Failed to add column {table}.{column}"))?;
    }
    Ok(())
}

fn has_column(connection: &Connection, table: &str, column: &str) -> Result<bool, TrackerError> {
    let count: i64 = connection.query_row(
        "SELECT count(*) FROM information_schema.columns WHERE table_name = ? AND column_name = ?",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();
        install(&connection).unwrap();
        install(&connection).unwrap();

        assert!(has_column(&connection, "sheet_data", "row_index").unwrap());
        assert!(has_column(&connection, "project_data", "checker").unwrap());
    }

    #[test]
    fn install_adds_missing_columns() {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute_batch(
                "CREATE TABLE project_data (
                    id BIGINT,
                    project_id VARCHAR NOT NULL,
                    data VARCHAR,
                    is_complex VARCHAR NOT NULL DEFAULT 'no',
                    forested VARCHAR NOT NULL DEFAULT 'no',
                    recalculation VARCHAR NOT NULL DEFAULT 'no',
                    cfd VARCHAR NOT NULL DEFAULT 'no'
                );
                INSERT INTO project_data (id, project_id) VALUES (1, 'P1');",
            )
            .unwrap();

        install(&connection).unwrap();

        let checker: Option<String> = connection
            .query_row(
                "SELECT checker FROM project_data WHERE project_id = 'P1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(checker, None);
    }
}
