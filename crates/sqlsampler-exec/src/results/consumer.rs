//! Draining every segment of an execution and reading output parameters

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use sqlsampler_core::{
    OutValue, PreparedStatement, Result, ResultCursor, ResultSet, Segment, VariableObject,
    VariableStore,
};

use super::{ResultRenderer, close_quietly};
use crate::arguments::OutputDescriptor;
use crate::config::ResultSetHandler;

const OUTPUT_HEADER: &str = "Output variables by position:\n";

/// An output value waiting to be bound to a variable
enum Published {
    Text(Option<String>),
    ResultSet(Box<dyn ResultSet>),
}

pub struct ResultConsumer<'r, 'a> {
    renderer: &'r ResultRenderer<'a>,
    handler: ResultSetHandler,
}

impl<'r, 'a> ResultConsumer<'r, 'a> {
    pub fn new(renderer: &'r ResultRenderer<'a>, handler: ResultSetHandler) -> Self {
        Self { renderer, handler }
    }

    /// Render every segment in production order.
    ///
    /// Each result set contributes its rendered text plus a blank line; each
    /// update count contributes `"<n> updates.\n"`. Any failure aborts the
    /// whole drain.
    pub fn drain(
        &self,
        cursor: &mut dyn ResultCursor,
        vars: &mut dyn VariableStore,
    ) -> Result<String> {
        let mut report = String::new();
        while let Some(segment) = cursor.next_segment()? {
            match segment {
                Segment::Rows(mut rs) => {
                    let rendered = self.renderer.render(rs.as_mut(), vars);
                    close_quietly(rs.as_mut());
                    report.push_str(&rendered?.text);
                    report.push('\n');
                }
                Segment::UpdateCount(count) => {
                    let _ = writeln!(report, "{} updates.", count);
                }
            }
        }
        Ok(report)
    }

    /// Read output parameters once the execution's cursor is exhausted.
    ///
    /// Appends one `"[<position>] <value>"` line per output position to
    /// `report`, then binds the values in order to the configured variable
    /// names, stopping at whichever list is shorter.
    pub fn read_outputs(
        &self,
        statement: &mut dyn PreparedStatement,
        descriptors: &[OutputDescriptor],
        vars: &mut dyn VariableStore,
        report: &mut String,
    ) -> Result<()> {
        if descriptors.is_empty() {
            return Ok(());
        }
        report.push_str(OUTPUT_HEADER);

        let encoding = self.renderer.options().encoding;
        let mut published = Vec::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            if !descriptor.is_output() {
                continue;
            }
            let position = i + 1;
            match statement.out_parameter(position)? {
                OutValue::Value(value) => {
                    let text = value.to_text(encoding);
                    let _ = writeln!(
                        report,
                        "[{}] {}",
                        position,
                        text.as_deref().unwrap_or("null")
                    );
                    published.push(Published::Text(text));
                }
                OutValue::ResultSet(rs) => {
                    published.push(self.publish_result_set(position, rs, report)?);
                }
            }
        }

        for (name, value) in self.renderer.options().variable_names.iter().zip(published) {
            if name.is_empty() {
                continue;
            }
            match value {
                Published::Text(text) => vars.put(name, text),
                Published::ResultSet(rs) => {
                    vars.put_object(name, VariableObject::ResultSet(Arc::new(Mutex::new(rs))))
                }
            }
        }
        Ok(())
    }

    fn publish_result_set(
        &self,
        position: usize,
        mut rs: Box<dyn ResultSet>,
        report: &mut String,
    ) -> Result<Published> {
        let description = rs.describe();
        match self.handler {
            ResultSetHandler::CountRecords => {
                let count = rs.count_rows()?;
                close_quietly(rs.as_mut());
                let _ = writeln!(report, "[{}] {} {} rows", position, description, count);
                Ok(Published::Text(Some(format!("{} {} rows", description, count))))
            }
            ResultSetHandler::StoreAsObject => {
                let _ = writeln!(report, "[{}] {}", position, description);
                Ok(Published::ResultSet(rs))
            }
            ResultSetHandler::StoreAsString => {
                close_quietly(rs.as_mut());
                let _ = writeln!(report, "[{}] {}", position, description);
                Ok(Published::Text(Some(description)))
            }
        }
    }
}
