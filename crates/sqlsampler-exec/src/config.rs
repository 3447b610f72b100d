//! Sampler configuration types

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlsampler_core::{Result, SamplerError, TextEncoding};

/// Property key overriding the NULL marker
pub const NULL_MARKER_PROPERTY: &str = "jdbcsampler.nullmarker";
/// Property key overriding the per-connection statement cache capacity
pub const MAX_OPEN_STATEMENTS_PROPERTY: &str = "jdbcsampler.maxopenpreparedstatements";

const DEFAULT_NULL_MARKER: &str = "]NULL[";
const DEFAULT_MAX_OPEN_STATEMENTS: usize = 100;
const DEFAULT_FETCH_SIZE: u32 = 10;

/// Kind of statement a sampler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatementKind {
    #[default]
    #[serde(rename = "Select Statement")]
    Select,
    #[serde(rename = "Prepared Select Statement")]
    PreparedSelect,
    #[serde(rename = "Callable Statement")]
    Callable,
    #[serde(rename = "Update Statement")]
    Update,
    #[serde(rename = "Prepared Update Statement")]
    PreparedUpdate,
    #[serde(rename = "Commit")]
    Commit,
    #[serde(rename = "Rollback")]
    Rollback,
    #[serde(rename = "AutoCommit(false)")]
    AutoCommitFalse,
    #[serde(rename = "AutoCommit(true)")]
    AutoCommitTrue,
}

impl StatementKind {
    pub const ALL: [StatementKind; 9] = [
        StatementKind::Select,
        StatementKind::PreparedSelect,
        StatementKind::Callable,
        StatementKind::Update,
        StatementKind::PreparedUpdate,
        StatementKind::Commit,
        StatementKind::Rollback,
        StatementKind::AutoCommitFalse,
        StatementKind::AutoCommitTrue,
    ];

    /// Display label, also used as the serialized form
    pub fn label(&self) -> &'static str {
        match self {
            Self::Select => "Select Statement",
            Self::PreparedSelect => "Prepared Select Statement",
            Self::Callable => "Callable Statement",
            Self::Update => "Update Statement",
            Self::PreparedUpdate => "Prepared Update Statement",
            Self::Commit => "Commit",
            Self::Rollback => "Rollback",
            Self::AutoCommitFalse => "AutoCommit(false)",
            Self::AutoCommitTrue => "AutoCommit(true)",
        }
    }

    /// Whether this kind binds arguments onto a cached statement
    pub fn uses_statement_cache(&self) -> bool {
        matches!(
            self,
            Self::PreparedSelect | Self::Callable | Self::PreparedUpdate
        )
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for StatementKind {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|kind| kind.label() == s)
            .copied()
            .ok_or_else(|| SamplerError::Configuration(format!("Unexpected query type: {}", s)))
    }
}

/// How a result-set-valued output parameter is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultSetHandler {
    /// Store its textual description
    #[default]
    #[serde(rename = "Store as String")]
    StoreAsString,
    /// Store the cursor itself as an object variable
    #[serde(rename = "Store as Object")]
    StoreAsObject,
    /// Store its description suffixed with the row count
    #[serde(rename = "Count Records")]
    CountRecords,
}

/// Declarative description of one query execution.
///
/// Numeric knobs are kept as text and parsed leniently: a value that is not a
/// number falls back to its default instead of failing the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryConfig {
    /// SQL text with positional placeholders
    pub query: String,
    pub query_type: StatementKind,
    /// Comma-separated argument values, CSV quoting allowed
    pub query_arguments: String,
    /// Comma-separated type tokens with optional `IN`/`OUT`/`INOUT` prefix
    pub query_arguments_types: String,
    /// Comma-separated variable names for column and output binding
    pub variable_names: String,
    /// Variable receiving every row as a label/value map
    pub result_variable: String,
    pub result_set_handler: ResultSetHandler,
    /// Query timeout in seconds
    pub query_timeout: String,
    pub fetch_size: String,
    /// Delay in milliseconds applied after each row
    pub result_set_read_delay: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            query_type: StatementKind::default(),
            query_arguments: String::new(),
            query_arguments_types: String::new(),
            variable_names: String::new(),
            result_variable: String::new(),
            result_set_handler: ResultSetHandler::default(),
            query_timeout: "0".to_string(),
            fetch_size: DEFAULT_FETCH_SIZE.to_string(),
            result_set_read_delay: "0".to_string(),
        }
    }
}

impl QueryConfig {
    /// Create a configuration for `query` run as `kind`
    pub fn new(kind: StatementKind, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            query_type: kind,
            ..Self::default()
        }
    }

    /// Set argument values and their type tokens
    pub fn with_arguments(mut self, values: impl Into<String>, types: impl Into<String>) -> Self {
        self.query_arguments = values.into();
        self.query_arguments_types = types.into();
        self
    }

    pub fn with_variable_names(mut self, names: impl Into<String>) -> Self {
        self.variable_names = names.into();
        self
    }

    pub fn with_result_variable(mut self, name: impl Into<String>) -> Self {
        self.result_variable = name.into();
        self
    }

    pub fn with_result_set_handler(mut self, handler: ResultSetHandler) -> Self {
        self.result_set_handler = handler;
        self
    }

    pub fn with_query_timeout(mut self, seconds: impl Into<String>) -> Self {
        self.query_timeout = seconds.into();
        self
    }

    pub fn with_fetch_size(mut self, rows: impl Into<String>) -> Self {
        self.fetch_size = rows.into();
        self
    }

    pub fn with_read_delay(mut self, millis: impl Into<String>) -> Self {
        self.result_set_read_delay = millis.into();
        self
    }

    /// Query timeout in seconds; 0 when unset or not a number
    pub fn timeout_secs(&self) -> u32 {
        parse_lenient(&self.query_timeout).unwrap_or(0)
    }

    /// Fetch size hint; 10 when unset or not a number
    pub fn fetch_size(&self) -> u32 {
        parse_lenient(&self.fetch_size).unwrap_or(DEFAULT_FETCH_SIZE)
    }

    /// Per-row read delay; zero when unset or not a number
    pub fn read_delay(&self) -> Duration {
        Duration::from_millis(parse_lenient(&self.result_set_read_delay).unwrap_or(0))
    }

    /// Variable names by position, trimmed. Blank entries keep their slot.
    pub fn variable_names(&self) -> Vec<String> {
        if self.variable_names.trim().is_empty() {
            return Vec::new();
        }
        self.variable_names
            .split(',')
            .map(|name| name.trim().to_string())
            .collect()
    }

    /// Results-collector variable name, if configured
    pub fn result_variable(&self) -> Option<&str> {
        let name = self.result_variable.trim();
        (!name.is_empty()).then_some(name)
    }
}

fn parse_lenient<T: std::str::FromStr>(raw: &str) -> Option<T> {
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() && !raw.trim().is_empty() {
        tracing::debug!(value = %raw, "ignoring non-numeric setting");
    }
    parsed
}

/// Process-wide engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Argument value that binds SQL NULL instead of text
    pub null_marker: String,
    /// Capacity of each connection's statement cache
    pub max_open_statements: usize,
    /// Encoding for byte values and the response payload
    pub encoding: TextEncoding,
}

impl Default for EngineSettings {
    /// Defaults:
    /// - null_marker: `]NULL[`
    /// - max_open_statements: 100
    /// - encoding: UTF-8
    fn default() -> Self {
        Self {
            null_marker: DEFAULT_NULL_MARKER.to_string(),
            max_open_statements: DEFAULT_MAX_OPEN_STATEMENTS,
            encoding: TextEncoding::default(),
        }
    }
}

impl EngineSettings {
    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = marker.into();
        self
    }

    pub fn with_max_open_statements(mut self, capacity: usize) -> Self {
        self.max_open_statements = capacity;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Cache capacity, rejecting zero
    pub fn statement_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.max_open_statements).ok_or_else(|| {
            SamplerError::Configuration("max open statements must be greater than 0".into())
        })
    }

    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.statement_capacity()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading engine settings");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Build settings from scenario properties.
    ///
    /// Recognizes [`NULL_MARKER_PROPERTY`] and [`MAX_OPEN_STATEMENTS_PROPERTY`];
    /// a capacity that is not a number keeps the default.
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let mut settings = Self::default();
        if let Some(marker) = properties.get(NULL_MARKER_PROPERTY) {
            settings.null_marker = marker.clone();
        }
        if let Some(capacity) = properties
            .get(MAX_OPEN_STATEMENTS_PROPERTY)
            .and_then(|raw| parse_lenient::<usize>(raw))
        {
            settings.max_open_statements = capacity;
        }
        settings
    }
}
