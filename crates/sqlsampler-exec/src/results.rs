//! Result rendering and draining
//!
//! [`ResultRenderer`] turns one result set into tab-separated text and
//! publishes per-row variables; [`ResultConsumer`] walks every segment an
//! execution produced and reads output parameters afterwards.
//!
//! # Example
//!
//! ```ignore
//! use sqlsampler_exec::results::{RenderOptions, ResultConsumer, ResultRenderer};
//!
//! let renderer = ResultRenderer::new(RenderOptions::from_config(&config, encoding), &delay);
//! let consumer = ResultConsumer::new(&renderer, config.result_set_handler);
//!
//! let mut report = {
//!     let mut cursor = statement.execute()?;
//!     consumer.drain(cursor.as_mut(), vars)?
//! };
//! consumer.read_outputs(statement, &descriptors, vars, &mut report)?;
//! ```

mod consumer;
mod renderer;

#[cfg(test)]
mod tests;

use sqlsampler_core::ResultSet;

pub use consumer::ResultConsumer;
pub use renderer::{RenderOptions, RenderedResultSet, ResultRenderer};

/// Close a drained result set; a failure here does not fail the sample
pub(crate) fn close_quietly(rs: &mut dyn ResultSet) {
    if let Err(e) = rs.close() {
        tracing::warn!(error = %e, "failed to close result set");
    }
}
