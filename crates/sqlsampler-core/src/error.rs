//! Error types for sqlsampler

use thiserror::Error;

/// Core error type for sampler operations
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("number of arguments ({arguments}) and number of types ({types}) are not equal")]
    ArgumentCountMismatch { arguments: usize, types: usize },

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Invalid argument list: {0}")]
    ArgumentSyntax(String),

    /// Raised by the binder when a driver has no placeholder at a position.
    #[error("Could not set argument no: {position} - missing parameter marker?")]
    MissingParameterMarker { position: usize },

    /// Reported by drivers when a bind targets an index the statement does not declare.
    /// The binder translates this into [`SamplerError::MissingParameterMarker`].
    #[error("no parameter marker at index {0}")]
    NoParameterMarker(usize),

    #[error("{message}")]
    Database {
        message: String,
        sql_state: Option<String>,
        vendor_code: i32,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    #[error("Statement is closed")]
    StatementClosed,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SamplerError {
    /// Build a database error without SQL state.
    pub fn database(message: impl Into<String>, vendor_code: i32) -> Self {
        Self::Database {
            message: message.into(),
            sql_state: None,
            vendor_code,
        }
    }

    /// Whether this error came from the database itself rather than from configuration.
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database { .. })
    }

    /// Response code reported by a sample: `"<sqlstate> <vendor code>"` for
    /// database errors, `"000"` for everything else.
    pub fn response_code(&self) -> String {
        match self {
            Self::Database {
                sql_state,
                vendor_code,
                ..
            } => format!(
                "{} {}",
                sql_state.as_deref().unwrap_or("null"),
                vendor_code
            ),
            _ => "000".to_string(),
        }
    }
}

/// Result type alias for sampler operations
pub type Result<T> = std::result::Result<T, SamplerError>;
