//! SQLite catalog data interface.
//!
//! The reference SQL-catalog backend. The database carries one table:
//!
//! ```sql
//! CREATE TABLE archive_files (
//!     path      TEXT NOT NULL,
//!     type      TEXT NOT NULL,       -- 'ribs' or 'updates'
//!     collector TEXT NOT NULL,
//!     project   TEXT NOT NULL,
//!     file_time INTEGER NOT NULL,    -- nominal dump time, POSIX seconds
//!     added_ts  INTEGER NOT NULL     -- catalog insertion time, POSIX seconds
//! );
//! ```
//!
//! Polls run a parameterised query over collector/project/type and the time
//! window, with a cursor on `added_ts` so rows inserted while the stream is
//! live are picked up by later polls.

use crate::datasource::{resolve_path, DataSource, DataSourceId, WindowHint};
use crate::error::BgpStreamError;
use crate::filter::FilterSet;
use crate::input::InputDescriptor;
use crate::record::DumpType;
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::Connection;

#[derive(Default)]
pub struct SqliteSource {
    db_file: Option<String>,
    dump_path: Option<String>,
    conn: Option<Connection>,
    /// Largest `added_ts` of any row returned so far.
    last_added_ts: Option<i64>,
}

impl SqliteSource {
    pub fn new() -> SqliteSource {
        SqliteSource::default()
    }
}

impl DataSource for SqliteSource {
    fn id(&self) -> DataSourceId {
        DataSourceId::Sqlite
    }

    fn configure(&mut self, option: &str, value: &str) -> Result<(), BgpStreamError> {
        match option {
            "db-file" => self.db_file = Some(value.to_string()),
            "dump-path" => self.dump_path = Some(value.to_string()),
            _ => {
                return Err(BgpStreamError::UnknownOption {
                    backend: "sqlite",
                    option: option.to_string(),
                })
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), BgpStreamError> {
        let path = self.db_file.as_deref().ok_or_else(|| {
            BgpStreamError::BackendStart("sqlite: db-file not configured".to_string())
        })?;
        let conn = Connection::open(path).map_err(|e| {
            BgpStreamError::BackendStart(format!("sqlite: cannot open {}: {}", path, e))
        })?;
        self.conn = Some(conn);
        Ok(())
    }

    fn poll(
        &mut self,
        filters: &FilterSet,
        window: &WindowHint,
    ) -> Result<Vec<InputDescriptor>, BgpStreamError> {
        let conn = self.conn.as_ref().ok_or_else(|| {
            BgpStreamError::BackendQuery("sqlite: backend not started".to_string())
        })?;

        // dump files slightly older than the window may still hold records in it
        let from = window.from.saturating_sub(3600);
        let mut sql = String::from(
            "SELECT path, type, collector, project, file_time, added_ts \
             FROM archive_files WHERE file_time >= ?1 AND file_time <= ?2",
        );
        let mut params: Vec<Value> = vec![Value::from(from as i64), Value::from(window.to as i64)];

        if let Some(last) = self.last_added_ts {
            params.push(Value::from(last));
            sql.push_str(&format!(" AND added_ts > ?{}", params.len()));
        }
        append_in_clause(&mut sql, &mut params, "collector", filters.collector_names());
        append_in_clause(&mut sql, &mut params, "project", filters.project_names());
        append_in_clause(
            &mut sql,
            &mut params,
            "type",
            filters.record_type_names().into_iter(),
        );
        sql.push_str(" ORDER BY file_time ASC, type ASC");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| BgpStreamError::BackendQuery(format!("sqlite: {}", e)))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|e| BgpStreamError::BackendQuery(format!("sqlite: {}", e)))?;

        let mut inputs = vec![];
        let mut max_added = self.last_added_ts;
        for row in rows {
            let (path, type_str, collector, project, file_time, added_ts) =
                row.map_err(|e| BgpStreamError::BackendQuery(format!("sqlite: {}", e)))?;
            let Some(dump_type) = DumpType::from_catalog_str(&type_str) else {
                warn!("sqlite: unknown dump type {} for {}; skipping", type_str, path);
                continue;
            };
            max_added = Some(max_added.map_or(added_ts, |m| m.max(added_ts)));
            inputs.push(InputDescriptor {
                path: resolve_path(self.dump_path.as_deref(), &path),
                dump_type,
                collector,
                project,
                file_time: file_time as u32,
                scan_time: file_time as u32,
            });
        }
        self.last_added_ts = max_added;

        debug!("sqlite: poll returned {} new files", inputs.len());
        Ok(inputs)
    }

    fn close(&mut self) {
        self.conn = None;
    }
}

fn append_in_clause<'a>(
    sql: &mut String,
    params: &mut Vec<Value>,
    column: &str,
    values: impl Iterator<Item = &'a str>,
) {
    let mut placeholders = vec![];
    for value in values {
        params.push(Value::from(value.to_string()));
        placeholders.push(format!("?{}", params.len()));
    }
    if !placeholders.is_empty() {
        sql.push_str(&format!(" AND {} IN ({})", column, placeholders.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;
    use crate::time::FOREVER;

    fn test_db(rows: &[(&str, &str, &str, &str, i64, i64)]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE archive_files (
                path TEXT NOT NULL,
                type TEXT NOT NULL,
                collector TEXT NOT NULL,
                project TEXT NOT NULL,
                file_time INTEGER NOT NULL,
                added_ts INTEGER NOT NULL
            );",
        )
        .unwrap();
        for (path, type_str, collector, project, file_time, added_ts) in rows {
            conn.execute(
                "INSERT INTO archive_files VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![path, type_str, collector, project, file_time, added_ts],
            )
            .unwrap();
        }
        file
    }

    fn window() -> WindowHint {
        WindowHint {
            from: 0,
            to: FOREVER,
        }
    }

    #[test]
    fn test_start_requires_db_file() {
        let mut source = SqliteSource::new();
        assert!(source.start().is_err());
    }

    #[test]
    fn test_poll_returns_rows_in_order() {
        let db = test_db(&[
            ("b.mrt", "updates", "rrc00", "ris", 200, 10),
            ("a.mrt", "ribs", "rrc00", "ris", 100, 10),
        ]);
        let mut source = SqliteSource::new();
        source
            .configure("db-file", db.path().to_str().unwrap())
            .unwrap();
        source.start().unwrap();

        let inputs = source.poll(&FilterSet::new(), &window()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].path, "a.mrt");
        assert_eq!(inputs[0].dump_type, DumpType::Rib);
        assert_eq!(inputs[1].path, "b.mrt");

        // cursor advanced
        assert!(source.poll(&FilterSet::new(), &window()).unwrap().is_empty());
    }

    #[test]
    fn test_poll_filters_by_collector_and_window() {
        let db = test_db(&[
            ("a.mrt", "updates", "rrc00", "ris", 100, 10),
            ("b.mrt", "updates", "rrc01", "ris", 100, 10),
            ("c.mrt", "updates", "rrc00", "ris", 90_000, 10),
        ]);
        let mut source = SqliteSource::new();
        source
            .configure("db-file", db.path().to_str().unwrap())
            .unwrap();
        source.start().unwrap();

        let mut filters = FilterSet::new();
        filters.add(FilterKind::Collector, "rrc00").unwrap();
        let inputs = source
            .poll(&filters, &WindowHint { from: 0, to: 500 })
            .unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].path, "a.mrt");
    }

    #[test]
    fn test_poll_picks_up_inserted_rows() {
        let db = test_db(&[("a.mrt", "updates", "rrc00", "ris", 100, 10)]);
        let mut source = SqliteSource::new();
        source
            .configure("db-file", db.path().to_str().unwrap())
            .unwrap();
        source.start().unwrap();

        assert_eq!(source.poll(&FilterSet::new(), &window()).unwrap().len(), 1);

        let conn = Connection::open(db.path()).unwrap();
        conn.execute(
            "INSERT INTO archive_files VALUES ('b.mrt', 'updates', 'rrc00', 'ris', 200, 20)",
            [],
        )
        .unwrap();

        let inputs = source.poll(&FilterSet::new(), &window()).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].path, "b.mrt");
    }

    #[test]
    fn test_missing_table_is_query_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = SqliteSource::new();
        source
            .configure("db-file", file.path().to_str().unwrap())
            .unwrap();
        source.start().unwrap();
        assert!(matches!(
            source.poll(&FilterSet::new(), &window()),
            Err(BgpStreamError::BackendQuery(_))
        ));
    }
}
