//! SQLite connection implementation

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags};
use sqlsampler_core::{
    Connection, ConnectionId, PreparedStatement, Result, SamplerError, Statement,
};

use crate::statement::{SqlitePreparedStatement, SqliteStatement, database_error};

/// SQLite connection wrapper
///
/// SQLite has no stored procedures, so callable statements are not
/// supported. Manual-commit mode is emulated with explicit `BEGIN`.
pub struct SqliteConnection {
    id: ConnectionId,
    location: String,
    conn: Arc<Mutex<RusqliteConnection>>,
    auto_commit: AtomicBool,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening SQLite database");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(SamplerError::Connection(format!(
                "Parent directory does not exist: {}",
                parent.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
            SamplerError::Connection(format!(
                "Failed to open SQLite database at '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::configure(conn, path.display().to_string())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            SamplerError::Connection(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::configure(conn, ":memory:".to_string())
    }

    fn configure(conn: RusqliteConnection, location: String) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            SamplerError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        let id = ConnectionId::new();
        tracing::debug!(connection = %id, location = %location, "SQLite connection established");
        Ok(Self {
            id,
            location,
            conn: Arc::new(Mutex::new(conn)),
            auto_commit: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        })
    }

    /// Run a batch of statements directly, e.g. to create a schema
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        self.conn.lock().execute_batch(sql).map_err(database_error)
    }

    /// Mark the connection closed. Statements already handed out keep working
    /// until dropped; new ones are refused.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(connection = %self.id, "closing SQLite connection");
        }
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SamplerError::Connection("connection is closed".into()));
        }
        Ok(())
    }

    /// End the open transaction with `verb`, then reopen one in manual-commit mode
    fn finish_transaction(&self, verb: &str) -> Result<()> {
        self.ensure_open()?;
        let conn = self.conn.lock();
        if !conn.is_autocommit() {
            conn.execute_batch(verb).map_err(database_error)?;
        }
        if !self.is_auto_commit() {
            conn.execute_batch("BEGIN").map_err(database_error)?;
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn describe(&self) -> String {
        format!("sqlite {} ({})", self.location, self.id)
    }

    fn create_statement(&self) -> Result<Box<dyn Statement>> {
        self.ensure_open()?;
        Ok(Box::new(SqliteStatement::new(self.conn.clone())))
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        self.ensure_open()?;
        let parameter_count = {
            let conn = self.conn.lock();
            let stmt = conn.prepare_cached(sql).map_err(database_error)?;
            stmt.parameter_count()
        };
        tracing::debug!(parameter_count, "statement prepared");
        Ok(Box::new(SqlitePreparedStatement::new(
            self.conn.clone(),
            sql,
            parameter_count,
        )))
    }

    fn commit(&self) -> Result<()> {
        self.finish_transaction("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.finish_transaction("ROLLBACK")
    }

    fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        let conn = self.conn.lock();
        match (enabled, conn.is_autocommit()) {
            (true, false) => conn.execute_batch("COMMIT").map_err(database_error)?,
            (false, true) => conn.execute_batch("BEGIN").map_err(database_error)?,
            _ => {}
        }
        self.auto_commit.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
