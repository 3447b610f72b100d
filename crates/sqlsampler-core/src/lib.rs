//! sqlsampler core - driver-facing abstractions for the SQL sampler engine
//!
//! This crate defines what the execution engine needs from a database
//! driver and from the host scenario:
//!
//! - `Connection`, `Statement`, `PreparedStatement` - traits drivers implement
//! - `ResultCursor` / `Segment` - the tagged sequence of result sets and update
//!   counts produced by one execution
//! - `ResultSet` - forward-only row access
//! - `sql_types` - standard SQL type codes and the type-token resolver
//! - `VariableStore` - the scenario variable contract
//! - Common types like `Value`, `ColumnMeta`, `SamplerError`

mod connection;
mod error;
mod results;
pub mod sql_types;
mod types;
mod variables;

pub use connection::*;
pub use error::*;
pub use results::*;
pub use types::*;
pub use variables::*;
