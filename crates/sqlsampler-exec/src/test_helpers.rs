//! Scripted in-memory driver used by unit tests

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sqlsampler_core::{
    BufferedCursor, BufferedSegment, Connection, ConnectionId, MemoryResultSet, OutValue,
    PreparedStatement, Result, ResultCursor, ResultSet, SamplerError, Statement, Value,
};

/// Initialize logging for tests if not already initialized
pub(crate) fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("sqlsampler_exec=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// A value bound onto a mock statement
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    Null { index: usize, sql_type: i32 },
    Object { index: usize, value: String, sql_type: i32 },
}

/// Output parameter served after execution
#[derive(Debug, Clone)]
pub(crate) enum MockOut {
    Value(Value),
    Rows(MemoryResultSet),
}

/// What executing a given SQL text produces
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    pub segments: Vec<BufferedSegment>,
    pub outputs: HashMap<usize, MockOut>,
    /// Placeholders the statement declares; `None` accepts any index
    pub parameter_count: Option<usize>,
    /// Fail execution with a database error (message, sql state, vendor code)
    pub failure: Option<(String, String, i32)>,
}

impl Script {
    pub fn rows(rs: MemoryResultSet) -> Self {
        Self {
            segments: vec![BufferedSegment::Rows(rs)],
            ..Self::default()
        }
    }

    pub fn update_count(count: u64) -> Self {
        Self {
            segments: vec![BufferedSegment::UpdateCount(count)],
            ..Self::default()
        }
    }

    pub fn with_parameter_count(mut self, count: usize) -> Self {
        self.parameter_count = Some(count);
        self
    }

    pub fn with_output(mut self, index: usize, out: MockOut) -> Self {
        self.outputs.insert(index, out);
        self
    }

    pub fn failing(message: &str, sql_state: &str, vendor_code: i32) -> Self {
        Self {
            failure: Some((message.to_string(), sql_state.to_string(), vendor_code)),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some((message, sql_state, vendor_code)) => Err(SamplerError::Database {
                message: message.clone(),
                sql_state: Some(sql_state.clone()),
                vendor_code: *vendor_code,
            }),
            None => Ok(()),
        }
    }
}

/// Everything the mock driver observed
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub scripts: HashMap<String, Script>,
    pub prepared: Vec<String>,
    pub closed: Vec<String>,
    pub timeouts: Vec<(String, u32)>,
    pub fetch_sizes: Vec<(String, u32)>,
    pub clears: usize,
    pub bindings: Vec<Binding>,
    pub out_registrations: Vec<(usize, i32)>,
    pub plain_closed: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub auto_commit: Vec<bool>,
}

pub(crate) struct MockConnection {
    id: ConnectionId,
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn script(&self, sql: &str, script: Script) {
        self.state.lock().scripts.insert(sql.to_string(), script);
    }

    fn script_for(&self, sql: &str) -> Script {
        self.state
            .lock()
            .scripts
            .get(sql)
            .cloned()
            .unwrap_or_default()
    }

    fn prepare_statement(&self, sql: &str, callable: bool) -> Box<dyn PreparedStatement> {
        self.state.lock().prepared.push(sql.to_string());
        Box::new(MockPreparedStatement {
            sql: sql.to_string(),
            script: self.script_for(sql),
            callable,
            state: self.state.clone(),
        })
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn driver_name(&self) -> &str {
        "mock"
    }

    fn create_statement(&self) -> Result<Box<dyn Statement>> {
        Ok(Box::new(MockStatement {
            state: self.state.clone(),
        }))
    }

    fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        Ok(self.prepare_statement(sql, false))
    }

    fn prepare_call(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        Ok(self.prepare_statement(sql, true))
    }

    fn commit(&self) -> Result<()> {
        self.state.lock().commits += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.state.lock().rollbacks += 1;
        Ok(())
    }

    fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.state.lock().auto_commit.push(enabled);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

struct MockStatement {
    state: Arc<Mutex<MockState>>,
}

impl MockStatement {
    fn script_for(&self, sql: &str) -> Script {
        self.state
            .lock()
            .scripts
            .get(sql)
            .cloned()
            .unwrap_or_default()
    }
}

impl Statement for MockStatement {
    fn set_query_timeout(&mut self, seconds: u32) -> Result<()> {
        self.state.lock().timeouts.push(("<plain>".into(), seconds));
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.state.lock().fetch_sizes.push(("<plain>".into(), rows));
        Ok(())
    }

    fn execute_query(&mut self, sql: &str) -> Result<Box<dyn ResultSet + '_>> {
        let script = self.script_for(sql);
        script.check()?;
        script
            .segments
            .into_iter()
            .find_map(|segment| match segment {
                BufferedSegment::Rows(rs) => Some(Box::new(rs) as Box<dyn ResultSet>),
                BufferedSegment::UpdateCount(_) => None,
            })
            .ok_or_else(|| SamplerError::UnexpectedResult("query produced no result set".into()))
    }

    fn execute_update(&mut self, sql: &str) -> Result<u64> {
        let script = self.script_for(sql);
        script.check()?;
        Ok(script
            .segments
            .iter()
            .find_map(|segment| match segment {
                BufferedSegment::UpdateCount(n) => Some(*n),
                BufferedSegment::Rows(_) => None,
            })
            .unwrap_or(0))
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().plain_closed += 1;
        Ok(())
    }
}

struct MockPreparedStatement {
    sql: String,
    script: Script,
    callable: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockPreparedStatement {
    fn check_index(&self, index: usize) -> Result<()> {
        match self.script.parameter_count {
            Some(count) if index == 0 || index > count => {
                Err(SamplerError::NoParameterMarker(index))
            }
            _ => Ok(()),
        }
    }
}

impl PreparedStatement for MockPreparedStatement {
    fn set_query_timeout(&mut self, seconds: u32) -> Result<()> {
        self.state.lock().timeouts.push((self.sql.clone(), seconds));
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.state.lock().fetch_sizes.push((self.sql.clone(), rows));
        Ok(())
    }

    fn clear_parameters(&mut self) -> Result<()> {
        self.state.lock().clears += 1;
        Ok(())
    }

    fn set_null(&mut self, index: usize, sql_type: i32) -> Result<()> {
        self.check_index(index)?;
        self.state
            .lock()
            .bindings
            .push(Binding::Null { index, sql_type });
        Ok(())
    }

    fn set_object(&mut self, index: usize, value: &str, sql_type: i32) -> Result<()> {
        self.check_index(index)?;
        self.state.lock().bindings.push(Binding::Object {
            index,
            value: value.to_string(),
            sql_type,
        });
        Ok(())
    }

    fn register_out_parameter(&mut self, index: usize, sql_type: i32) -> Result<()> {
        if !self.callable {
            return Err(SamplerError::NotSupported(
                "output parameters require a callable statement".into(),
            ));
        }
        self.check_index(index)?;
        self.state.lock().out_registrations.push((index, sql_type));
        Ok(())
    }

    fn execute(&mut self) -> Result<Box<dyn ResultCursor + '_>> {
        self.script.check()?;
        Ok(Box::new(BufferedCursor::new(self.script.segments.clone())))
    }

    fn execute_query(&mut self) -> Result<Box<dyn ResultSet + '_>> {
        self.script.check()?;
        self.script
            .segments
            .iter()
            .find_map(|segment| match segment {
                BufferedSegment::Rows(rs) => Some(Box::new(rs.clone()) as Box<dyn ResultSet>),
                BufferedSegment::UpdateCount(_) => None,
            })
            .ok_or_else(|| SamplerError::UnexpectedResult("query produced no result set".into()))
    }

    fn out_parameter(&mut self, index: usize) -> Result<OutValue> {
        Ok(match self.script.outputs.get(&index) {
            Some(MockOut::Value(value)) => OutValue::Value(value.clone()),
            Some(MockOut::Rows(rs)) => OutValue::ResultSet(Box::new(rs.clone())),
            None => OutValue::Value(Value::Null),
        })
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().closed.push(self.sql.clone());
        Ok(())
    }
}
