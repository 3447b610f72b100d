//! Core value types shared by drivers and the execution engine

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A value read from a result set or an output parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    String(String),
    /// Binary data, decoded with the configured encoding when rendered
    Bytes(Vec<u8>),
}

impl Value {
    /// Textual form used for rendering and variable binding.
    ///
    /// NULL stays `None`; byte sequences are decoded with `encoding`.
    pub fn to_text(&self, encoding: TextEncoding) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bytes(bytes) => Some(encoding.decode(bytes)),
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Column metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMeta {
    /// Column label as reported by the driver
    pub name: String,
    /// Data type (database-specific string)
    pub data_type: String,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Column ordinal position (0-based)
    pub ordinal: usize,
}

impl ColumnMeta {
    /// Build column metadata from a list of labels, as drivers without
    /// type information (and tests) do.
    pub fn from_labels<I, S>(labels: I) -> Vec<ColumnMeta>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        labels
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| ColumnMeta {
                name: name.into(),
                data_type: String::new(),
                nullable: true,
                ordinal,
            })
            .collect()
    }
}

/// One collected row: column label to raw value, in the result set's column order.
pub type RowMap = IndexMap<String, Value>;

/// Identity of a live connection.
///
/// The statement cache is keyed by identity, never by connection content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text encoding used to decode byte values and encode the response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "ISO-8859-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl TextEncoding {
    /// Canonical label, as reported in sample results
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode bytes into text. Invalid UTF-8 sequences are replaced.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Encode text into bytes. Characters outside Latin-1 become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = crate::SamplerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(TextEncoding::Latin1),
            other => Err(crate::SamplerError::Configuration(format!(
                "unsupported encoding: {}",
                other
            ))),
        }
    }
}
