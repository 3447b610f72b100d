//! Binding parsed arguments onto a compiled statement

use sqlsampler_core::{PreparedStatement, Result, SamplerError};

use super::{Argument, OutputDescriptor, parse_arguments};

/// Parse `values`/`types` and bind them onto `statement`.
///
/// Returns one descriptor per position. Nothing is bound when parsing fails.
pub fn bind(
    statement: &mut dyn PreparedStatement,
    values: &str,
    types: &str,
    null_marker: &str,
) -> Result<Vec<OutputDescriptor>> {
    let arguments = parse_arguments(values, types)?;
    bind_arguments(statement, &arguments, null_marker)
}

/// Bind already-parsed arguments, 1-based, in order
pub fn bind_arguments(
    statement: &mut dyn PreparedStatement,
    arguments: &[Argument],
    null_marker: &str,
) -> Result<Vec<OutputDescriptor>> {
    let mut descriptors = Vec::with_capacity(arguments.len());

    for (i, argument) in arguments.iter().enumerate() {
        let position = i + 1;

        if argument.direction.is_input() {
            let bound = if argument.value == null_marker {
                statement.set_null(position, argument.sql_type)
            } else {
                statement.set_object(position, &argument.value, argument.sql_type)
            };
            bound.map_err(|e| missing_marker(e, position))?;
        }

        if argument.direction.is_output() {
            statement
                .register_out_parameter(position, argument.sql_type)
                .map_err(|e| missing_marker(e, position))?;
            descriptors.push(OutputDescriptor::Output {
                sql_type: argument.sql_type,
            });
        } else {
            descriptors.push(OutputDescriptor::NotOutput);
        }
    }

    tracing::trace!(count = arguments.len(), "bound arguments");
    Ok(descriptors)
}

fn missing_marker(error: SamplerError, position: usize) -> SamplerError {
    match error {
        SamplerError::NoParameterMarker(_) => SamplerError::MissingParameterMarker { position },
        other => other,
    }
}
