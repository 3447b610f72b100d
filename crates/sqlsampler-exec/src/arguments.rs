//! Argument parsing and binding
//!
//! An argument list is configured as two comma-separated strings: the values
//! (CSV quoting allowed) and their type tokens. A type token is a
//! type name or numeric code, optionally prefixed by a direction:
//!
//! ```text
//! values: 42,]NULL[,"a,b"
//! types:  INTEGER,VARCHAR,INOUT varchar
//! ```
//!
//! Parsing resolves every type before anything touches a statement, so a
//! malformed configuration never prepares, binds or executes anything.

mod binder;
mod csv;


use sqlsampler_core::{Result, SamplerError, sql_types};

pub use binder::{bind, bind_arguments};

/// Direction of a positional argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
}

impl Direction {
    /// Parse a direction prefix. Anything other than `OUT`/`INOUT` means `IN`.
    pub fn from_prefix(prefix: &str) -> Self {
        if prefix.eq_ignore_ascii_case("OUT") {
            Direction::Out
        } else if prefix.eq_ignore_ascii_case("INOUT") {
            Direction::InOut
        } else {
            Direction::In
        }
    }

    /// Whether a value is bound at this position
    pub fn is_input(&self) -> bool {
        !matches!(self, Direction::Out)
    }

    /// Whether the position is registered as an output parameter
    pub fn is_output(&self) -> bool {
        !matches!(self, Direction::In)
    }
}

/// One configured argument with its resolved type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Raw value text, possibly the NULL marker
    pub value: String,
    pub direction: Direction,
    pub sql_type: i32,
}

/// Per-position output record produced by binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDescriptor {
    NotOutput,
    Output { sql_type: i32 },
}

impl OutputDescriptor {
    pub fn is_output(&self) -> bool {
        matches!(self, OutputDescriptor::Output { .. })
    }

    /// Type code, or the `NULL` type code for non-output positions
    pub fn sql_type(&self) -> i32 {
        match self {
            OutputDescriptor::Output { sql_type } => *sql_type,
            OutputDescriptor::NotOutput => sql_types::NULL,
        }
    }
}

/// Parse the value and type lists into arguments.
///
/// A blank value list means no arguments. The two lists must have the same
/// number of entries.
pub fn parse_arguments(values: &str, types: &str) -> Result<Vec<Argument>> {
    if values.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values = csv::split_csv(values)?;
    let types: Vec<&str> = types.split(',').collect();
    if values.len() != types.len() {
        return Err(SamplerError::ArgumentCountMismatch {
            arguments: values.len(),
            types: types.len(),
        });
    }

    values
        .into_iter()
        .zip(types)
        .map(|(value, token)| {
            let (direction, type_token) = split_type_token(token)?;
            Ok(Argument {
                value,
                direction,
                sql_type: sql_types::resolve_type(type_token)?,
            })
        })
        .collect()
}

/// Split `"[direction] type"` into its parts
fn split_type_token(token: &str) -> Result<(Direction, &str)> {
    let parts: Vec<&str> = token.split_whitespace().collect();
    match parts.as_slice() {
        [type_token] => Ok((Direction::In, type_token)),
        [prefix, type_token] => Ok((Direction::from_prefix(prefix), type_token)),
        _ => Err(SamplerError::InvalidDataType(token.to_string())),
    }
}
