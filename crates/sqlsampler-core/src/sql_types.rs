//! Standard SQL type codes and the name-to-code resolver
//!
//! The codes are the generic SQL type identifiers used by JDBC-style drivers.
//! Argument type tokens may name a type (case-insensitive) or give its
//! numeric code directly in decimal, hexadecimal (`0x`, `#`) or octal (`0`).

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::{Result, SamplerError};

pub const BIT: i32 = -7;
pub const TINYINT: i32 = -6;
pub const SMALLINT: i32 = 5;
pub const INTEGER: i32 = 4;
pub const BIGINT: i32 = -5;
pub const FLOAT: i32 = 6;
pub const REAL: i32 = 7;
pub const DOUBLE: i32 = 8;
pub const NUMERIC: i32 = 2;
pub const DECIMAL: i32 = 3;
pub const CHAR: i32 = 1;
pub const VARCHAR: i32 = 12;
pub const LONGVARCHAR: i32 = -1;
pub const DATE: i32 = 91;
pub const TIME: i32 = 92;
pub const TIMESTAMP: i32 = 93;
pub const BINARY: i32 = -2;
pub const VARBINARY: i32 = -3;
pub const LONGVARBINARY: i32 = -4;
/// Also used as the "not an output parameter" marker; no output can have type NULL.
pub const NULL: i32 = 0;
pub const OTHER: i32 = 1111;
pub const JAVA_OBJECT: i32 = 2000;
pub const DISTINCT: i32 = 2001;
pub const STRUCT: i32 = 2002;
pub const ARRAY: i32 = 2003;
pub const BLOB: i32 = 2004;
pub const CLOB: i32 = 2005;
pub const REF: i32 = 2006;
pub const DATALINK: i32 = 70;
pub const BOOLEAN: i32 = 16;
pub const ROWID: i32 = -8;
pub const NCHAR: i32 = -15;
pub const NVARCHAR: i32 = -9;
pub const LONGNVARCHAR: i32 = -16;
pub const NCLOB: i32 = 2011;
pub const SQLXML: i32 = 2009;
pub const REF_CURSOR: i32 = 2012;
pub const TIME_WITH_TIMEZONE: i32 = 2013;
pub const TIMESTAMP_WITH_TIMEZONE: i32 = 2014;

const STANDARD_TYPES: &[(&str, i32)] = &[
    ("BIT", BIT),
    ("TINYINT", TINYINT),
    ("SMALLINT", SMALLINT),
    ("INTEGER", INTEGER),
    ("BIGINT", BIGINT),
    ("FLOAT", FLOAT),
    ("REAL", REAL),
    ("DOUBLE", DOUBLE),
    ("NUMERIC", NUMERIC),
    ("DECIMAL", DECIMAL),
    ("CHAR", CHAR),
    ("VARCHAR", VARCHAR),
    ("LONGVARCHAR", LONGVARCHAR),
    ("DATE", DATE),
    ("TIME", TIME),
    ("TIMESTAMP", TIMESTAMP),
    ("BINARY", BINARY),
    ("VARBINARY", VARBINARY),
    ("LONGVARBINARY", LONGVARBINARY),
    ("NULL", NULL),
    ("OTHER", OTHER),
    ("JAVA_OBJECT", JAVA_OBJECT),
    ("DISTINCT", DISTINCT),
    ("STRUCT", STRUCT),
    ("ARRAY", ARRAY),
    ("BLOB", BLOB),
    ("CLOB", CLOB),
    ("REF", REF),
    ("DATALINK", DATALINK),
    ("BOOLEAN", BOOLEAN),
    ("ROWID", ROWID),
    ("NCHAR", NCHAR),
    ("NVARCHAR", NVARCHAR),
    ("LONGNVARCHAR", LONGNVARCHAR),
    ("NCLOB", NCLOB),
    ("SQLXML", SQLXML),
    ("REF_CURSOR", REF_CURSOR),
    ("TIME_WITH_TIMEZONE", TIME_WITH_TIMEZONE),
    ("TIMESTAMP_WITH_TIMEZONE", TIMESTAMP_WITH_TIMEZONE),
];

// Read-only after first use.
static TYPE_CODES: LazyLock<HashMap<String, i32>> = LazyLock::new(|| {
    STANDARD_TYPES
        .iter()
        .map(|(name, code)| (name.to_ascii_lowercase(), *code))
        .collect()
});

/// Resolve a type token to its SQL type code.
///
/// Names are matched case-insensitively; anything else must be an integer
/// literal, otherwise the token is reported as an invalid data type.
pub fn resolve_type(token: &str) -> Result<i32> {
    if let Some(code) = TYPE_CODES.get(&token.to_ascii_lowercase()) {
        return Ok(*code);
    }
    decode_integer(token).ok_or_else(|| SamplerError::InvalidDataType(token.to_string()))
}

/// Name of a standard type code, if it has one
pub fn type_name(code: i32) -> Option<&'static str> {
    STANDARD_TYPES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// Integer family: bound as exact whole numbers
pub fn is_integral(code: i32) -> bool {
    matches!(code, TINYINT | SMALLINT | INTEGER | BIGINT)
}

/// Approximate numeric family
pub fn is_floating(code: i32) -> bool {
    matches!(code, FLOAT | REAL | DOUBLE | NUMERIC | DECIMAL)
}

pub fn is_boolean(code: i32) -> bool {
    matches!(code, BIT | BOOLEAN)
}

pub fn is_binary(code: i32) -> bool {
    matches!(code, BINARY | VARBINARY | LONGVARBINARY | BLOB)
}

/// Parse an optionally signed integer literal with `0x`/`0X`/`#` hex or
/// leading-zero octal prefixes.
fn decode_integer(token: &str) -> Option<i32> {
    let (negative, body) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    let (radix, digits) = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('#'))
    {
        (16, hex)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };

    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}
