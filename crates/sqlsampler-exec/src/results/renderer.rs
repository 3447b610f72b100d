//! Rendering a single result set

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sqlsampler_core::{
    Result, ResultSet, RowMap, SharedRows, TextEncoding, VariableObject, VariableStore,
};

use crate::config::QueryConfig;
use crate::delay::ReadDelay;

/// Per-execution rendering settings
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Variable names by column position; blank names are skipped
    pub variable_names: Vec<String>,
    /// Variable receiving every row as a label/value map
    pub result_variable: Option<String>,
    pub encoding: TextEncoding,
    /// Pause applied after each row
    pub read_delay: Duration,
}

impl RenderOptions {
    pub fn from_config(config: &QueryConfig, encoding: TextEncoding) -> Self {
        Self {
            variable_names: config.variable_names(),
            result_variable: config.result_variable().map(str::to_string),
            encoding,
            read_delay: config.read_delay(),
        }
    }
}

/// Text and row count of one rendered result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResultSet {
    /// Header line plus one line per row, tab-separated
    pub text: String,
    pub row_count: usize,
}

pub struct ResultRenderer<'a> {
    options: RenderOptions,
    delay: &'a ReadDelay,
}

impl<'a> ResultRenderer<'a> {
    pub fn new(options: RenderOptions, delay: &'a ReadDelay) -> Self {
        Self { options, delay }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render every remaining row of `rs`, publishing variables into `vars`.
    ///
    /// Column `i`'s value is stored as `<name>_<row>` (rows counted from 1)
    /// for the `i`-th configured name, and `<name>_#` receives the row count.
    /// Row variables left over from a longer previous result are removed.
    pub fn render(
        &self,
        rs: &mut dyn ResultSet,
        vars: &mut dyn VariableStore,
    ) -> Result<RenderedResultSet> {
        let labels: Vec<String> = rs.columns().iter().map(|c| c.name.clone()).collect();
        let mut text = String::new();
        if !labels.is_empty() {
            text.push_str(&labels.join("\t"));
            text.push('\n');
        }

        let collected = self.options.result_variable.as_deref().map(|name| {
            let rows: SharedRows = Arc::new(Mutex::new(Vec::new()));
            vars.put_object(name, VariableObject::Rows(rows.clone()));
            rows
        });

        let mut row_count = 0;
        while let Some(values) = rs.next_row()? {
            row_count += 1;
            let last = values.len().saturating_sub(1);
            let mut row = collected.as_ref().map(|_| RowMap::with_capacity(values.len()));

            for (i, value) in values.into_iter().enumerate() {
                let rendered = value.to_text(self.options.encoding);
                text.push_str(rendered.as_deref().unwrap_or("null"));
                text.push(if i == last { '\n' } else { '\t' });

                if let Some(name) = self.variable_name(i) {
                    vars.put(&format!("{}_{}", name, row_count), rendered);
                }
                if let Some(row) = row.as_mut() {
                    let label = labels.get(i).cloned().unwrap_or_default();
                    row.insert(label, value);
                }
            }

            if let (Some(rows), Some(row)) = (&collected, row) {
                rows.lock().push(row);
            }
            if let Err(e) = self.delay.pause(self.options.read_delay) {
                tracing::warn!(error = %e, row = row_count, "continuing after interrupted read delay");
            }
        }

        self.remove_stale_rows(row_count, vars);
        Ok(RenderedResultSet { text, row_count })
    }

    fn variable_name(&self, position: usize) -> Option<&str> {
        self.options
            .variable_names
            .get(position)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    fn remove_stale_rows(&self, row_count: usize, vars: &mut dyn VariableStore) {
        for name in self
            .options
            .variable_names
            .iter()
            .filter(|name| !name.is_empty())
        {
            let count_name = format!("{}_#", name);
            if let Some(previous) = vars
                .get(&count_name)
                .and_then(|count| count.trim().parse::<usize>().ok())
            {
                for n in row_count + 1..=previous {
                    vars.remove(&format!("{}_{}", name, n));
                }
            }
            vars.put(&count_name, Some(row_count.to_string()));
        }
    }
}
