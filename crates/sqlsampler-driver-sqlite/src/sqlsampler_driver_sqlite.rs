//! SQLite driver for the sqlsampler engine
//!
//! Implements the `sqlsampler-core` connection traits on top of rusqlite.
//! Rows are buffered per execution; query timeouts are enforced with
//! SQLite's progress handler and surface as `SQLITE_INTERRUPT` errors.

mod connection;
mod statement;

pub use connection::SqliteConnection;
pub use statement::{SqlitePreparedStatement, SqliteStatement};
