//! Connection and statement traits implemented by database drivers

use crate::{ConnectionId, OutValue, Result, ResultCursor, ResultSet, SamplerError};

/// A live database connection.
///
/// Connections are owned by the caller. The engine only derives statements
/// from them and never closes the connection itself.
pub trait Connection: Send + Sync {
    /// Identity used to key per-connection state such as the statement cache
    fn id(&self) -> ConnectionId;

    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Human-readable description, reported as sample response headers
    fn describe(&self) -> String {
        format!("{} connection {}", self.driver_name(), self.id())
    }

    /// Create an unprepared statement for one-off SQL
    fn create_statement(&self) -> Result<Box<dyn Statement>>;

    /// Compile a statement with positional placeholders
    fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>>;

    /// Compile a stored-procedure call supporting OUT/INOUT parameters
    fn prepare_call(&self, _sql: &str) -> Result<Box<dyn PreparedStatement>> {
        Err(SamplerError::NotSupported(format!(
            "callable statements are not supported by the {} driver",
            self.driver_name()
        )))
    }

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn set_auto_commit(&self, enabled: bool) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A one-off statement executed with literal SQL
pub trait Statement: Send {
    /// Maximum execution time in seconds; 0 means unlimited
    fn set_query_timeout(&mut self, seconds: u32) -> Result<()>;

    /// Hint for how many rows to fetch per round trip
    fn set_fetch_size(&mut self, rows: u32) -> Result<()>;

    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn ResultSet + '_>>;

    /// Run a data-modifying statement, returning the update count
    fn execute_update(&mut self, sql: &str) -> Result<u64>;

    fn close(&mut self) -> Result<()>;
}

/// A compiled statement with positional parameters (1-based).
///
/// Callable statements implement [`register_out_parameter`] and
/// [`out_parameter`]; plain prepared statements keep the defaults, which
/// report the operation as unsupported.
///
/// [`register_out_parameter`]: PreparedStatement::register_out_parameter
/// [`out_parameter`]: PreparedStatement::out_parameter
pub trait PreparedStatement: Send {
    /// Maximum execution time in seconds; 0 means unlimited
    fn set_query_timeout(&mut self, seconds: u32) -> Result<()>;

    /// Hint for how many rows to fetch per round trip
    fn set_fetch_size(&mut self, rows: u32) -> Result<()>;

    /// Drop every value bound by a previous execution
    fn clear_parameters(&mut self) -> Result<()>;

    /// Bind SQL NULL of the given type code.
    ///
    /// Drivers report [`SamplerError::NoParameterMarker`] when `index` has no placeholder.
    fn set_null(&mut self, index: usize, sql_type: i32) -> Result<()>;

    /// Bind a textual value, letting the driver convert it to `sql_type`.
    ///
    /// Drivers report [`SamplerError::NoParameterMarker`] when `index` has no placeholder.
    fn set_object(&mut self, index: usize, value: &str, sql_type: i32) -> Result<()>;

    fn register_out_parameter(&mut self, _index: usize, _sql_type: i32) -> Result<()> {
        Err(SamplerError::NotSupported(
            "output parameters require a callable statement".into(),
        ))
    }

    /// Execute, returning a cursor over every produced segment
    fn execute(&mut self) -> Result<Box<dyn ResultCursor + '_>>;

    /// Execute a statement expected to produce exactly one result set
    fn execute_query(&mut self) -> Result<Box<dyn ResultSet + '_>>;

    /// Read an output parameter after the cursor returned by [`execute`] is exhausted.
    ///
    /// [`execute`]: PreparedStatement::execute
    fn out_parameter(&mut self, _index: usize) -> Result<OutValue> {
        Err(SamplerError::NotSupported(
            "output parameters require a callable statement".into(),
        ))
    }

    fn close(&mut self) -> Result<()>;
}
