//! Sampler entry point: run one configured query and report the outcome

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlsampler_core::{Connection, Result, SamplerError, VariableStore};

use crate::config::QueryConfig;
use crate::executor::QueryExecutor;

const SUCCESS_CODE: &str = "200";
const SUCCESS_MESSAGE: &str = "OK";
const CONTENT_TYPE: &str = "text/plain";

/// Hands out connections by data source name.
///
/// Pooling and connection lifecycle belong to the implementor; the sampler
/// only borrows the connection for one execution.
pub trait ConnectionSource {
    fn connection(&self, data_source: &str) -> Result<Arc<dyn Connection>>;
}

/// A named query bound to a data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SqlSampler {
    pub name: String,
    /// Name under which the connection source knows the database
    pub data_source: String,
    #[serde(flatten)]
    pub query: QueryConfig,
}

/// Outcome of one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResult {
    pub label: String,
    /// The SQL text that was run
    pub sampler_data: String,
    pub started_at: DateTime<Utc>,
    /// Time spent obtaining the connection
    pub latency: Duration,
    /// Total time including execution and rendering
    pub elapsed: Duration,
    pub response_code: String,
    pub response_message: String,
    pub response_headers: String,
    pub response_data: Vec<u8>,
    pub content_type: String,
    pub data_encoding: String,
    pub successful: bool,
}

impl SampleResult {
    /// Response data as text, decoded with the recorded encoding
    pub fn response_text(&self) -> String {
        self.data_encoding
            .parse::<sqlsampler_core::TextEncoding>()
            .unwrap_or_default()
            .decode(&self.response_data)
    }
}

impl SqlSampler {
    pub fn new(
        name: impl Into<String>,
        data_source: impl Into<String>,
        query: QueryConfig,
    ) -> Self {
        Self {
            name: name.into(),
            data_source: data_source.into(),
            query,
        }
    }

    /// Run the configured query once.
    ///
    /// Never fails: errors are reported through the result's code and message.
    pub fn sample(
        &self,
        source: &dyn ConnectionSource,
        executor: &QueryExecutor<'_>,
        vars: &mut dyn VariableStore,
    ) -> SampleResult {
        let encoding = executor.settings().encoding;
        let started_at = Utc::now();
        let start = Instant::now();
        let mut connected_after = None;
        let mut response_headers = String::new();

        let outcome = self.connect(source).and_then(|conn| {
            connected_after = Some(start.elapsed());
            response_headers = conn.describe();
            executor.execute(conn.as_ref(), &self.query, vars)
        });
        let elapsed = start.elapsed();

        let (response_code, response_message, response_data, successful) = match outcome {
            Ok(payload) => (
                SUCCESS_CODE.to_string(),
                SUCCESS_MESSAGE.to_string(),
                payload,
                true,
            ),
            Err(e) => {
                tracing::debug!(sampler = %self.name, error = %e, "sample failed");
                (e.response_code(), e.to_string(), encoding.encode(&e.to_string()), false)
            }
        };

        SampleResult {
            label: self.name.clone(),
            sampler_data: self.query.query.clone(),
            started_at,
            latency: connected_after.unwrap_or(elapsed),
            elapsed,
            response_code,
            response_message,
            response_headers,
            response_data,
            content_type: CONTENT_TYPE.to_string(),
            data_encoding: encoding.label().to_string(),
            successful,
        }
    }

    fn connect(&self, source: &dyn ConnectionSource) -> Result<Arc<dyn Connection>> {
        if self.data_source.trim().is_empty() {
            return Err(SamplerError::Configuration(format!(
                "Variable Name must not be null in {}",
                self.name
            )));
        }
        source.connection(&self.data_source)
    }
}
