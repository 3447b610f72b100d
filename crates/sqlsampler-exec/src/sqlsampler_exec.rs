//! sqlsampler exec - the SQL sampler execution engine
//!
//! This crate prepares, binds and executes one configured query on a live
//! connection, renders everything the execution produced as text, and
//! publishes selected values into the scenario's variable store.
//!
//! - `StatementCache` - per-connection LRU cache of compiled statements
//! - `arguments` - CSV argument parsing and IN/OUT/INOUT binding
//! - `results` - result set rendering and multi-result draining
//! - `QueryExecutor` - dispatch over every statement kind
//! - `SqlSampler` - sampler entry point producing a `SampleResult`

pub mod arguments;
mod config;
mod delay;
mod executor;
pub mod results;
mod sampler;
pub mod statement_cache;

#[cfg(test)]
mod test_helpers;

pub use arguments::{Argument, Direction, OutputDescriptor, bind, bind_arguments, parse_arguments};
pub use config::{
    EngineSettings, MAX_OPEN_STATEMENTS_PROPERTY, NULL_MARKER_PROPERTY, QueryConfig,
    ResultSetHandler, StatementKind,
};
pub use delay::{Interrupted, ReadDelay};
pub use executor::QueryExecutor;
pub use results::{RenderOptions, RenderedResultSet, ResultConsumer, ResultRenderer};
pub use sampler::{ConnectionSource, SampleResult, SqlSampler};
pub use statement_cache::{CompiledStatement, LruMap, PrepareKind, SharedStatement, StatementCache};
