//! Query dispatch
//!
//! [`QueryExecutor`] runs one [`QueryConfig`] against a caller-owned
//! connection and returns the encoded text payload. Prepared and callable
//! kinds go through the shared [`StatementCache`]; plain kinds use a one-off
//! statement that is always closed afterwards.


use std::sync::Arc;

use sqlsampler_core::{Connection, PreparedStatement, Result, Statement, VariableStore};

use crate::arguments::{Argument, OutputDescriptor, bind_arguments, parse_arguments};
use crate::config::{EngineSettings, QueryConfig, StatementKind};
use crate::delay::ReadDelay;
use crate::results::{RenderOptions, ResultConsumer, ResultRenderer, close_quietly};
use crate::statement_cache::{PrepareKind, StatementCache};

/// Executes sampler queries with a shared statement cache
pub struct QueryExecutor<'a> {
    cache: &'a StatementCache,
    settings: &'a EngineSettings,
    read_delay: Arc<ReadDelay>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(cache: &'a StatementCache, settings: &'a EngineSettings) -> Self {
        Self {
            cache,
            settings,
            read_delay: Arc::new(ReadDelay::new()),
        }
    }

    /// Use a read delay handle the host can interrupt
    pub fn with_read_delay(mut self, read_delay: Arc<ReadDelay>) -> Self {
        self.read_delay = read_delay;
        self
    }

    pub fn read_delay(&self) -> &Arc<ReadDelay> {
        &self.read_delay
    }

    pub fn settings(&self) -> &EngineSettings {
        self.settings
    }

    /// Run `config` on `conn`, publishing variables into `vars`.
    ///
    /// Returns the textual report encoded with the configured encoding.
    /// Errors are returned as-is; nothing rendered before a failure is kept.
    #[tracing::instrument(
        skip(self, conn, config, vars),
        fields(
            kind = %config.query_type,
            sql_preview = %config.query.chars().take(100).collect::<String>()
        )
    )]
    pub fn execute(
        &self,
        conn: &dyn Connection,
        config: &QueryConfig,
        vars: &mut dyn VariableStore,
    ) -> Result<Vec<u8>> {
        let kind = config.query_type;
        tracing::debug!(
            connection = %conn.id(),
            cached = kind.uses_statement_cache(),
            "executing query"
        );

        let report = match kind {
            StatementKind::Select => self.execute_select(conn, config, vars)?,
            StatementKind::PreparedSelect => self.execute_prepared_select(conn, config, vars)?,
            StatementKind::Callable => self.execute_callable(conn, config, vars)?,
            StatementKind::Update => self.execute_update(conn, config)?,
            StatementKind::PreparedUpdate => self.execute_prepared_update(conn, config, vars)?,
            StatementKind::Commit => {
                conn.commit()?;
                kind.label().to_string()
            }
            StatementKind::Rollback => {
                conn.rollback()?;
                kind.label().to_string()
            }
            StatementKind::AutoCommitFalse => {
                conn.set_auto_commit(false)?;
                kind.label().to_string()
            }
            StatementKind::AutoCommitTrue => {
                conn.set_auto_commit(true)?;
                kind.label().to_string()
            }
        };

        Ok(self.settings.encoding.encode(&report))
    }

    fn renderer(&self, config: &QueryConfig) -> ResultRenderer<'_> {
        ResultRenderer::new(
            RenderOptions::from_config(config, self.settings.encoding),
            &self.read_delay,
        )
    }

    fn execute_select(
        &self,
        conn: &dyn Connection,
        config: &QueryConfig,
        vars: &mut dyn VariableStore,
    ) -> Result<String> {
        let renderer = self.renderer(config);
        with_plain_statement(conn, config, |statement| {
            let mut rs = statement.execute_query(&config.query)?;
            let rendered = renderer.render(rs.as_mut(), vars);
            close_quietly(rs.as_mut());
            Ok(rendered?.text)
        })
    }

    fn execute_update(&self, conn: &dyn Connection, config: &QueryConfig) -> Result<String> {
        with_plain_statement(conn, config, |statement| {
            let count = statement.execute_update(&config.query)?;
            Ok(format!("{} updates", count))
        })
    }

    fn execute_prepared_select(
        &self,
        conn: &dyn Connection,
        config: &QueryConfig,
        vars: &mut dyn VariableStore,
    ) -> Result<String> {
        let renderer = self.renderer(config);
        self.with_bound_statement(conn, config, PrepareKind::Prepared, |statement, _| {
            let mut rs = statement.execute_query()?;
            let rendered = renderer.render(rs.as_mut(), vars);
            close_quietly(rs.as_mut());
            Ok(rendered?.text)
        })
    }

    fn execute_prepared_update(
        &self,
        conn: &dyn Connection,
        config: &QueryConfig,
        vars: &mut dyn VariableStore,
    ) -> Result<String> {
        let renderer = self.renderer(config);
        let consumer = ResultConsumer::new(&renderer, config.result_set_handler);
        self.with_bound_statement(conn, config, PrepareKind::Prepared, |statement, _| {
            let mut cursor = statement.execute()?;
            consumer.drain(cursor.as_mut(), vars)
        })
    }

    fn execute_callable(
        &self,
        conn: &dyn Connection,
        config: &QueryConfig,
        vars: &mut dyn VariableStore,
    ) -> Result<String> {
        let renderer = self.renderer(config);
        let consumer = ResultConsumer::new(&renderer, config.result_set_handler);
        self.with_bound_statement(conn, config, PrepareKind::Callable, |statement, descriptors| {
            let mut report = {
                let mut cursor = statement.execute()?;
                consumer.drain(cursor.as_mut(), vars)?
            };
            consumer.read_outputs(statement, descriptors, vars, &mut report)?;
            Ok(report)
        })
    }

    /// Fetch the cached statement for `config`, bind its arguments and run `f` on it.
    ///
    /// Arguments are parsed before the cache is consulted, so a malformed
    /// argument list never prepares or binds anything.
    fn with_bound_statement<T>(
        &self,
        conn: &dyn Connection,
        config: &QueryConfig,
        kind: PrepareKind,
        f: impl FnOnce(&mut dyn PreparedStatement, &[OutputDescriptor]) -> Result<T>,
    ) -> Result<T> {
        let arguments: Vec<Argument> =
            parse_arguments(&config.query_arguments, &config.query_arguments_types)?;

        let shared = self
            .cache
            .get(conn, &config.query, kind, config.timeout_secs())?;
        let mut compiled = shared.lock();
        let statement = compiled.statement_mut();
        statement.set_fetch_size(config.fetch_size())?;
        let descriptors = bind_arguments(statement, &arguments, &self.settings.null_marker)?;

        f(statement, &descriptors)
    }
}

/// Run `f` on a one-off statement, closing it whatever the outcome
fn with_plain_statement<T>(
    conn: &dyn Connection,
    config: &QueryConfig,
    f: impl FnOnce(&mut dyn Statement) -> Result<T>,
) -> Result<T> {
    let mut statement = conn.create_statement()?;
    let result = statement
        .set_query_timeout(config.timeout_secs())
        .and_then(|()| statement.set_fetch_size(config.fetch_size()))
        .and_then(|()| f(statement.as_mut()));

    if let Err(e) = statement.close() {
        tracing::warn!(error = %e, "failed to close statement");
    }
    result
}
