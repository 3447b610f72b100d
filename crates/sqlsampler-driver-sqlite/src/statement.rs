//! Plain and prepared SQLite statements

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{Connection as RusqliteConnection, ffi, params_from_iter};
use sqlsampler_core::{
    BufferedCursor, BufferedSegment, ColumnMeta, MemoryResultSet, PreparedStatement, Result,
    ResultCursor, ResultSet, SamplerError, Statement, Value, sql_types,
};

/// Number of virtual machine instructions between deadline checks
const PROGRESS_INTERVAL: i32 = 1000;

/// Map a rusqlite error onto a database error carrying SQLite's extended code
pub(crate) fn database_error(error: rusqlite::Error) -> SamplerError {
    match error {
        rusqlite::Error::SqliteFailure(err, message) => SamplerError::Database {
            message: message.unwrap_or_else(|| err.to_string()),
            sql_state: None,
            vendor_code: err.extended_code,
        },
        other => SamplerError::database(other.to_string(), ffi::SQLITE_ERROR),
    }
}

/// Interrupts the running statement once the deadline passes.
///
/// The handler is removed when the guard is dropped.
struct TimeoutGuard<'c> {
    conn: &'c RusqliteConnection,
}

impl<'c> TimeoutGuard<'c> {
    fn install(conn: &'c RusqliteConnection, seconds: u32) -> Option<Self> {
        if seconds == 0 {
            return None;
        }
        let deadline = Instant::now() + Duration::from_secs(u64::from(seconds));
        conn.progress_handler(PROGRESS_INTERVAL, Some(move || Instant::now() >= deadline));
        Some(Self { conn })
    }
}

impl Drop for TimeoutGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Run a row-producing statement and buffer everything it returns
fn collect_rows(
    stmt: &mut rusqlite::Statement<'_>,
    parameters: &[SqliteValue],
) -> Result<MemoryResultSet> {
    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
            nullable: true,
            ordinal,
        })
        .collect();

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(parameters.iter()))
        .map_err(database_error)?;
    while let Some(row) = query_rows.next().map_err(database_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(to_value(row.get_ref(i).map_err(database_error)?));
        }
        rows.push(values);
    }

    tracing::debug!(row_count = rows.len(), "query executed");
    Ok(MemoryResultSet::new(columns, rows))
}

/// One-off statement over literal SQL
pub struct SqliteStatement {
    conn: Arc<Mutex<RusqliteConnection>>,
    timeout_secs: u32,
}

impl SqliteStatement {
    pub(crate) fn new(conn: Arc<Mutex<RusqliteConnection>>) -> Self {
        Self {
            conn,
            timeout_secs: 0,
        }
    }
}

impl Statement for SqliteStatement {
    fn set_query_timeout(&mut self, seconds: u32) -> Result<()> {
        self.timeout_secs = seconds;
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        tracing::trace!(rows, "fetch size ignored, rows are buffered");
        Ok(())
    }

    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn ResultSet + '_>> {
        let conn = self.conn.lock();
        let _timeout = TimeoutGuard::install(&conn, self.timeout_secs);
        let mut stmt = conn.prepare(sql).map_err(database_error)?;
        if stmt.column_count() == 0 {
            return Err(no_result_set());
        }
        Ok(Box::new(collect_rows(&mut stmt, &[])?))
    }

    fn execute_update(&mut self, sql: &str) -> Result<u64> {
        let conn = self.conn.lock();
        let _timeout = TimeoutGuard::install(&conn, self.timeout_secs);
        let changed = conn.execute(sql, []).map_err(database_error)?;
        Ok(changed as u64)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Prepared statement with positional `?` parameters.
///
/// Values are converted from text according to the bound type code and kept
/// until cleared. The compiled form lives in rusqlite's per-connection cache
/// and is fetched again on each execution.
pub struct SqlitePreparedStatement {
    conn: Arc<Mutex<RusqliteConnection>>,
    sql: String,
    parameters: Vec<SqliteValue>,
    timeout_secs: u32,
    closed: bool,
}

impl SqlitePreparedStatement {
    pub(crate) fn new(
        conn: Arc<Mutex<RusqliteConnection>>,
        sql: &str,
        parameter_count: usize,
    ) -> Self {
        Self {
            conn,
            sql: sql.to_string(),
            parameters: vec![SqliteValue::Null; parameter_count],
            timeout_secs: 0,
            closed: false,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn slot(&mut self, index: usize) -> Result<&mut SqliteValue> {
        if self.closed {
            return Err(SamplerError::StatementClosed);
        }
        index
            .checked_sub(1)
            .and_then(|i| self.parameters.get_mut(i))
            .ok_or(SamplerError::NoParameterMarker(index))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SamplerError::StatementClosed);
        }
        Ok(())
    }

    /// Run the statement, buffering rows when it produces columns
    /// Execute the statement, buffering its rows or returning the update count.
    ///
    /// With `rows_only` a statement without result columns is rejected before
    /// it runs.
    fn run(&self, rows_only: bool) -> Result<BufferedSegment> {
        self.ensure_open()?;
        let conn = self.conn.lock();
        let _timeout = TimeoutGuard::install(&conn, self.timeout_secs);
        let mut stmt = conn.prepare_cached(&self.sql).map_err(database_error)?;
        if stmt.column_count() > 0 {
            Ok(BufferedSegment::Rows(collect_rows(&mut stmt, &self.parameters)?))
        } else if rows_only {
            Err(no_result_set())
        } else {
            let changed = stmt
                .execute(params_from_iter(self.parameters.iter()))
                .map_err(database_error)?;
            Ok(BufferedSegment::UpdateCount(changed as u64))
        }
    }
}

fn no_result_set() -> SamplerError {
    SamplerError::UnexpectedResult("statement did not return a result set".into())
}

/// Convert a textual argument into the SQLite storage class for `sql_type`
fn convert(index: usize, value: &str, sql_type: i32) -> Result<SqliteValue> {
    let mismatch = || {
        SamplerError::database(
            format!(
                "cannot convert '{}' to {} for parameter {}",
                value,
                sql_types::type_name(sql_type).unwrap_or("the requested type"),
                index
            ),
            ffi::SQLITE_MISMATCH,
        )
    };

    let trimmed = value.trim();
    if sql_types::is_integral(sql_type) {
        trimmed
            .parse::<i64>()
            .map(SqliteValue::Integer)
            .map_err(|_| mismatch())
    } else if sql_types::is_floating(sql_type) {
        trimmed
            .parse::<f64>()
            .map(SqliteValue::Real)
            .map_err(|_| mismatch())
    } else if sql_types::is_boolean(sql_type) {
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(SqliteValue::Integer(1)),
            "false" | "0" => Ok(SqliteValue::Integer(0)),
            _ => Err(mismatch()),
        }
    } else if sql_types::is_binary(sql_type) {
        Ok(SqliteValue::Blob(value.as_bytes().to_vec()))
    } else {
        Ok(SqliteValue::Text(value.to_string()))
    }
}

impl PreparedStatement for SqlitePreparedStatement {
    fn set_query_timeout(&mut self, seconds: u32) -> Result<()> {
        self.ensure_open()?;
        self.timeout_secs = seconds;
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        tracing::trace!(rows, "fetch size ignored, rows are buffered");
        Ok(())
    }

    fn clear_parameters(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.parameters.fill(SqliteValue::Null);
        Ok(())
    }

    fn set_null(&mut self, index: usize, _sql_type: i32) -> Result<()> {
        *self.slot(index)? = SqliteValue::Null;
        Ok(())
    }

    fn set_object(&mut self, index: usize, value: &str, sql_type: i32) -> Result<()> {
        let slot = self.slot(index)?;
        *slot = convert(index, value, sql_type)?;
        Ok(())
    }

    fn execute(&mut self) -> Result<Box<dyn ResultCursor + '_>> {
        let segment = self.run(false)?;
        Ok(Box::new(BufferedCursor::new(vec![segment])))
    }

    fn execute_query(&mut self) -> Result<Box<dyn ResultSet + '_>> {
        match self.run(true)? {
            BufferedSegment::Rows(rs) => Ok(Box::new(rs)),
            BufferedSegment::UpdateCount(_) => Err(no_result_set()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shared() -> Arc<Mutex<RusqliteConnection>> {
        let conn = RusqliteConnection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER, price REAL, active INTEGER, data BLOB, note TEXT)",
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_convert_by_type_family() {
        assert_eq!(
            convert(1, " 42 ", sql_types::BIGINT).unwrap(),
            SqliteValue::Integer(42)
        );
        assert_eq!(
            convert(1, "2.5", sql_types::DECIMAL).unwrap(),
            SqliteValue::Real(2.5)
        );
        assert_eq!(
            convert(1, "TRUE", sql_types::BOOLEAN).unwrap(),
            SqliteValue::Integer(1)
        );
        assert_eq!(
            convert(1, "ab", sql_types::VARBINARY).unwrap(),
            SqliteValue::Blob(b"ab".to_vec())
        );
        assert_eq!(
            convert(1, " x ", sql_types::VARCHAR).unwrap(),
            SqliteValue::Text(" x ".into())
        );
    }

    #[test]
    fn test_conversion_failure_is_mismatch() {
        let err = convert(3, "abc", sql_types::INTEGER).unwrap_err();
        assert_eq!(err.response_code(), format!("null {}", ffi::SQLITE_MISMATCH));
        assert_eq!(
            err.to_string(),
            "cannot convert 'abc' to INTEGER for parameter 3"
        );
    }

    #[test]
    fn test_bind_out_of_range_reports_index() {
        let mut stmt = SqlitePreparedStatement::new(shared(), "SELECT ?", 1);
        assert!(matches!(
            stmt.set_object(2, "1", sql_types::INTEGER),
            Err(SamplerError::NoParameterMarker(2))
        ));
        assert!(matches!(
            stmt.set_null(0, sql_types::INTEGER),
            Err(SamplerError::NoParameterMarker(0))
        ));
    }

    #[test]
    fn test_prepared_insert_then_select() {
        let conn = shared();
        let mut insert = SqlitePreparedStatement::new(
            conn.clone(),
            "INSERT INTO items (id, price, active, data, note) VALUES (?, ?, ?, ?, ?)",
            5,
        );
        insert.set_object(1, "7", sql_types::INTEGER).unwrap();
        insert.set_object(2, "1.5", sql_types::DOUBLE).unwrap();
        insert.set_object(3, "false", sql_types::BIT).unwrap();
        insert.set_object(4, "raw", sql_types::BLOB).unwrap();
        insert.set_null(5, sql_types::VARCHAR).unwrap();

        let mut cursor = insert.execute().unwrap();
        match cursor.next_segment().unwrap() {
            Some(sqlsampler_core::Segment::UpdateCount(n)) => assert_eq!(n, 1),
            other => panic!("expected update count, got {:?}", other),
        }
        drop(cursor);

        let mut select =
            SqlitePreparedStatement::new(conn, "SELECT * FROM items WHERE id = ?", 1);
        select.set_object(1, "7", sql_types::INTEGER).unwrap();
        let mut rs = select.execute_query().unwrap();
        let labels: Vec<&str> = rs.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(labels, vec!["id", "price", "active", "data", "note"]);
        assert_eq!(rs.columns()[1].data_type, "REAL");
        assert_eq!(
            rs.next_row().unwrap().unwrap(),
            vec![
                Value::Int64(7),
                Value::Float64(1.5),
                Value::Int64(0),
                Value::Bytes(b"raw".to_vec()),
                Value::Null,
            ]
        );
        assert!(rs.next_row().unwrap().is_none());
    }

    #[test]
    fn test_clear_parameters_resets_to_null() {
        let mut stmt = SqlitePreparedStatement::new(shared(), "SELECT ?", 1);
        stmt.set_object(1, "5", sql_types::INTEGER).unwrap();
        stmt.clear_parameters().unwrap();
        let mut rs = stmt.execute_query().unwrap();
        assert_eq!(rs.next_row().unwrap().unwrap(), vec![Value::Null]);
    }

    #[test]
    fn test_closed_statement_refuses_execution() {
        let mut stmt = SqlitePreparedStatement::new(shared(), "SELECT 1", 0);
        stmt.close().unwrap();
        stmt.close().unwrap();
        assert!(matches!(stmt.execute(), Err(SamplerError::StatementClosed)));
    }

    #[test]
    fn test_plain_statement_query_and_update() {
        let mut stmt = SqliteStatement::new(shared());
        assert_eq!(
            stmt.execute_update("INSERT INTO items (id) VALUES (1), (2)").unwrap(),
            2
        );
        let mut rs = stmt.execute_query("SELECT count(*) AS n FROM items").unwrap();
        assert_eq!(rs.next_row().unwrap().unwrap(), vec![Value::Int64(2)]);
    }

    #[test]
    fn test_plain_query_without_columns_is_unexpected() {
        let mut stmt = SqliteStatement::new(shared());
        assert!(matches!(
            stmt.execute_query("DELETE FROM items"),
            Err(SamplerError::UnexpectedResult(_))
        ));
    }

    #[test]
    fn test_prepared_query_without_columns_leaves_table_untouched() {
        let conn = shared();
        conn.lock().execute("INSERT INTO items (id) VALUES (1)", []).unwrap();

        let mut delete =
            SqlitePreparedStatement::new(conn.clone(), "DELETE FROM items WHERE id = ?", 1);
        delete.set_object(1, "1", sql_types::INTEGER).unwrap();
        assert!(matches!(
            delete.execute_query(),
            Err(SamplerError::UnexpectedResult(_))
        ));

        let remaining: i64 = conn
            .lock()
            .query_row("SELECT count(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_timeout_interrupts_long_query() {
        let mut stmt = SqliteStatement::new(shared());
        stmt.set_query_timeout(1).unwrap();
        let err = stmt
            .execute_query(
                "WITH RECURSIVE r(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM r) \
                 SELECT count(*) FROM r",
            )
            .err()
            .unwrap();
        assert_eq!(err.response_code(), format!("null {}", ffi::SQLITE_INTERRUPT));

        // the handler is gone once the statement returns
        let mut rs = stmt.execute_query("SELECT 1").unwrap();
        assert_eq!(rs.next_row().unwrap().unwrap(), vec![Value::Int64(1)]);
    }

    #[test]
    fn test_database_error_keeps_extended_code() {
        let conn = shared();
        let err = conn.lock().prepare("SELECT nope FROM items").err().unwrap();
        let mapped = database_error(err);
        assert_eq!(mapped.response_code(), "null 1");
        assert!(mapped.to_string().contains("no such column"));
    }
}
