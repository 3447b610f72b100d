//! Per-connection cache of compiled statements
//!
//! The registry is an explicit object with process-wide lifetime: whoever
//! executes queries holds a reference to it. Each connection gets its own
//! bounded LRU map from statement text to compiled statement, created lazily
//! on first use. Overflowing a map closes the evicted statement before the
//! call that caused the overflow returns.
//!
//! A connection is assumed to be driven by one caller at a time. The
//! registry itself is safe to populate concurrently from different
//! connections; it does not serialize two callers sharing a connection.
//!
//! # Example
//!
//! ```ignore
//! use sqlsampler_exec::{PrepareKind, StatementCache};
//!
//! let cache = StatementCache::new(capacity);
//! let shared = cache.get(&conn, "SELECT * FROM t WHERE id = ?", PrepareKind::Prepared, 30)?;
//! let mut compiled = shared.lock();
//! compiled.statement_mut().set_object(1, "42", sql_types::INTEGER)?;
//! ```

mod lru;

#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use sqlsampler_core::{Connection, ConnectionId, PreparedStatement, Result, SamplerError};

use crate::config::EngineSettings;

pub use lru::LruMap;

/// A cached statement, shared between the cache and its current user
pub type SharedStatement = Arc<Mutex<CompiledStatement>>;

/// How a cached statement is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrepareKind {
    Prepared,
    /// Stored-procedure call supporting output parameters
    Callable,
}

/// Cache key. Callable and plain compilations of the same text are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatementKey {
    kind: PrepareKind,
    sql: String,
}

type StatementMap = LruMap<StatementKey, SharedStatement>;

/// A driver statement plus the timeout last applied to it
pub struct CompiledStatement {
    sql: String,
    kind: PrepareKind,
    statement: Box<dyn PreparedStatement>,
    timeout_secs: u32,
    closed: bool,
}

impl CompiledStatement {
    fn prepare(
        conn: &dyn Connection,
        sql: &str,
        kind: PrepareKind,
        timeout_secs: u32,
    ) -> Result<Self> {
        let mut statement = match kind {
            PrepareKind::Prepared => conn.prepare(sql)?,
            PrepareKind::Callable => conn.prepare_call(sql)?,
        };
        statement.set_query_timeout(timeout_secs)?;
        Ok(Self {
            sql: sql.to_string(),
            kind,
            statement,
            timeout_secs,
            closed: false,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> PrepareKind {
        self.kind
    }

    /// Timeout most recently applied to the driver statement
    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn statement_mut(&mut self) -> &mut dyn PreparedStatement {
        self.statement.as_mut()
    }

    /// Bring a statement up to date for another execution: re-apply the
    /// timeout only if it changed, then drop old parameter values.
    fn prepare_for_reuse(&mut self, timeout_secs: u32) -> Result<()> {
        if self.closed {
            return Err(SamplerError::StatementClosed);
        }
        if self.timeout_secs != timeout_secs {
            self.statement.set_query_timeout(timeout_secs)?;
            self.timeout_secs = timeout_secs;
        }
        self.statement.clear_parameters()
    }

    /// Close the driver statement. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.statement.close()
    }
}

/// Registry of per-connection statement maps
pub struct StatementCache {
    capacity: NonZeroUsize,
    connections: DashMap<ConnectionId, Arc<Mutex<StatementMap>>>,
}

impl StatementCache {
    /// Create a registry whose per-connection maps hold at most `capacity` statements
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            connections: DashMap::new(),
        }
    }

    /// Create a registry sized by [`EngineSettings::max_open_statements`]
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        Ok(Self::new(settings.statement_capacity()?))
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Return the compiled statement for `sql` on `conn`, preparing it on first use.
    ///
    /// A reused statement has its timeout synchronized and its parameters
    /// cleared before it is handed out.
    pub fn get(
        &self,
        conn: &dyn Connection,
        sql: &str,
        kind: PrepareKind,
        timeout_secs: u32,
    ) -> Result<SharedStatement> {
        let statements = self.statements_for(conn.id());
        let key = StatementKey {
            kind,
            sql: sql.to_string(),
        };

        let mut statements = statements.lock();
        let cached = statements.get(&key).cloned();
        if let Some(existing) = cached {
            drop(statements);
            tracing::trace!(connection = %conn.id(), "reusing cached statement");
            existing.lock().prepare_for_reuse(timeout_secs)?;
            return Ok(existing);
        }

        tracing::debug!(
            connection = %conn.id(),
            kind = ?kind,
            sql_preview = %sql.chars().take(100).collect::<String>(),
            "preparing statement"
        );
        let mut compiled = CompiledStatement::prepare(conn, sql, kind, timeout_secs)?;
        compiled.statement.clear_parameters()?;

        let shared = Arc::new(Mutex::new(compiled));
        statements.insert(key, shared.clone());
        Ok(shared)
    }

    /// Close and forget every statement cached for a connection.
    ///
    /// Returns the number of statements closed.
    pub fn release(&self, connection: ConnectionId) -> usize {
        let Some((_, statements)) = self.connections.remove(&connection) else {
            return 0;
        };
        let drained = statements.lock().drain();
        let count = drained.len();
        for (key, statement) in drained {
            close_statement(&key, &statement);
        }
        tracing::debug!(connection = %connection, closed = count, "released cached statements");
        count
    }

    /// Close every cached statement of every connection
    pub fn clear(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().map(|id| self.release(id)).sum()
    }

    /// Number of connections with a statement map
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of statements cached for a connection
    pub fn statement_count(&self, connection: ConnectionId) -> usize {
        self.connections
            .get(&connection)
            .map(|statements| statements.lock().len())
            .unwrap_or(0)
    }

    /// The connection's statement map, created at most once
    fn statements_for(&self, connection: ConnectionId) -> Arc<Mutex<StatementMap>> {
        let capacity = self.capacity;
        self.connections
            .entry(connection)
            .or_insert_with(|| {
                tracing::debug!(connection = %connection, capacity = capacity.get(), "creating statement map");
                Arc::new(Mutex::new(LruMap::with_eviction_hook(
                    capacity,
                    |key: StatementKey, statement: SharedStatement| {
                        tracing::debug!(
                            sql_preview = %key.sql.chars().take(100).collect::<String>(),
                            "evicting least recently used statement"
                        );
                        close_statement(&key, &statement);
                    },
                )))
            })
            .value()
            .clone()
    }
}

fn close_statement(key: &StatementKey, statement: &SharedStatement) {
    if let Err(e) = statement.lock().close() {
        tracing::warn!(
            error = %e,
            sql_preview = %key.sql.chars().take(100).collect::<String>(),
            "failed to close statement"
        );
    }
}
