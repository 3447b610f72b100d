//! Tests for result rendering and draining

use std::time::Duration;

use pretty_assertions::assert_eq;
use sqlsampler_core::{
    BufferedCursor, BufferedSegment, ColumnMeta, Connection, MemoryResultSet, Result, ResultSet,
    SamplerError, ScenarioVariables, TextEncoding, Value, VariableStore, sql_types,
};

use super::*;
use crate::arguments::OutputDescriptor;
use crate::config::ResultSetHandler;
use crate::delay::ReadDelay;
use crate::test_helpers::{MockConnection, MockOut, Script, initialize_logging};

fn options(names: &[&str]) -> RenderOptions {
    RenderOptions {
        variable_names: names.iter().map(|n| n.to_string()).collect(),
        ..RenderOptions::default()
    }
}

fn id_name_rows() -> MemoryResultSet {
    MemoryResultSet::with_labels(
        ["ID", "NAME"],
        vec![
            vec![Value::Int64(1), Value::String("a".into())],
            vec![Value::Int64(2), Value::String("b".into())],
        ],
    )
}

fn numbered_rows(count: i64) -> MemoryResultSet {
    MemoryResultSet::with_labels(["N"], (1..=count).map(|n| vec![Value::Int64(n)]).collect())
}

/// Yields one row, then fails
struct BrokenResultSet {
    columns: Vec<ColumnMeta>,
    served: bool,
}

impl ResultSet for BrokenResultSet {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if self.served {
            return Err(SamplerError::database("connection reset", 8006));
        }
        self.served = true;
        Ok(Some(vec![Value::Int64(1)]))
    }
}

// =============================================================================
// ResultRenderer
// =============================================================================

#[test]
fn test_render_tab_separated_text() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(RenderOptions::default(), &delay);
    let mut vars = ScenarioVariables::new();

    let rendered = renderer.render(&mut id_name_rows(), &mut vars).unwrap();

    assert_eq!(rendered.text, "ID\tNAME\n1\ta\n2\tb\n");
    assert_eq!(rendered.row_count, 2);
    assert!(vars.is_empty());
}

#[test]
fn test_render_binds_row_variables_by_position() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["id", "", "extra"]), &delay);
    let mut vars = ScenarioVariables::new();

    renderer.render(&mut id_name_rows(), &mut vars).unwrap();

    assert_eq!(vars.get("id_1").as_deref(), Some("1"));
    assert_eq!(vars.get("id_2").as_deref(), Some("2"));
    assert_eq!(vars.get("id_#").as_deref(), Some("2"));
    // blank name skips the column; a name beyond the columns gets only a count
    assert!(!vars.contains("_1"));
    assert!(!vars.contains("extra_1"));
    assert_eq!(vars.get("extra_#").as_deref(), Some("2"));
}

#[test]
fn test_render_removes_stale_row_variables() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["v"]), &delay);
    let mut vars = ScenarioVariables::new();

    renderer.render(&mut numbered_rows(5), &mut vars).unwrap();
    assert_eq!(vars.get("v_5").as_deref(), Some("5"));
    assert_eq!(vars.get("v_#").as_deref(), Some("5"));

    renderer.render(&mut numbered_rows(2), &mut vars).unwrap();

    assert_eq!(vars.get("v_1").as_deref(), Some("1"));
    assert_eq!(vars.get("v_2").as_deref(), Some("2"));
    for n in 3..=5 {
        assert!(!vars.contains(&format!("v_{}", n)));
    }
    assert_eq!(vars.get("v_#").as_deref(), Some("2"));
}

#[test]
fn test_render_unparsable_previous_count_is_ignored() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["v"]), &delay);
    let mut vars = ScenarioVariables::new();
    vars.put("v_#", Some("many".into()));
    vars.put("v_3", Some("old".into()));

    renderer.render(&mut numbered_rows(1), &mut vars).unwrap();

    assert_eq!(vars.get("v_3").as_deref(), Some("old"));
    assert_eq!(vars.get("v_#").as_deref(), Some("1"));
}

#[test]
fn test_render_null_and_bytes() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(
        RenderOptions {
            encoding: TextEncoding::Latin1,
            ..options(&["payload", "missing"])
        },
        &delay,
    );
    let mut vars = ScenarioVariables::new();
    let mut rs = MemoryResultSet::with_labels(
        ["PAYLOAD", "MISSING"],
        vec![vec![Value::Bytes(vec![0x63, 0x61, 0x66, 0xE9]), Value::Null]],
    );

    let rendered = renderer.render(&mut rs, &mut vars).unwrap();

    assert_eq!(rendered.text, "PAYLOAD\tMISSING\ncaf\u{e9}\tnull\n");
    assert_eq!(vars.get("payload_1").as_deref(), Some("caf\u{e9}"));
    assert!(vars.contains("missing_1"));
    assert_eq!(vars.get("missing_1"), None);
}

#[test]
fn test_render_collects_rows_with_raw_values() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(
        RenderOptions {
            result_variable: Some("rows".into()),
            ..RenderOptions::default()
        },
        &delay,
    );
    let mut vars = ScenarioVariables::new();
    let mut rs = MemoryResultSet::with_labels(
        ["ID", "DATA"],
        vec![
            vec![Value::Int64(1), Value::Bytes(vec![1, 2])],
            vec![Value::Int64(2), Value::Null],
        ],
    );

    renderer.render(&mut rs, &mut vars).unwrap();

    let object = vars.get_object("rows").unwrap();
    let rows = object.as_rows().unwrap().lock();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["ID", "DATA"]);
    assert_eq!(rows[0]["DATA"], Value::Bytes(vec![1, 2]));
    assert_eq!(rows[1]["ID"], Value::Int64(2));
    assert_eq!(rows[1]["DATA"], Value::Null);
}

#[test]
fn test_render_zero_columns_has_no_header() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(RenderOptions::default(), &delay);
    let mut vars = ScenarioVariables::new();
    let mut rs = MemoryResultSet::default();

    let rendered = renderer.render(&mut rs, &mut vars).unwrap();
    assert_eq!(rendered.text, "");
    assert_eq!(rendered.row_count, 0);
}

#[test]
fn test_render_continues_after_interrupted_delay() {
    initialize_logging();
    let delay = ReadDelay::new();
    delay.interrupt();
    let renderer = ResultRenderer::new(
        RenderOptions {
            read_delay: Duration::from_millis(1),
            ..options(&["n"])
        },
        &delay,
    );
    let mut vars = ScenarioVariables::new();

    let rendered = renderer.render(&mut numbered_rows(3), &mut vars).unwrap();

    assert_eq!(rendered.text, "N\n1\n2\n3\n");
    assert_eq!(vars.get("n_#").as_deref(), Some("3"));
}

#[test]
fn test_render_long_delay_cut_short_by_interrupt() {
    let delay = ReadDelay::new();
    delay.interrupt();
    let renderer = ResultRenderer::new(
        RenderOptions {
            read_delay: Duration::from_secs(600),
            ..RenderOptions::default()
        },
        &delay,
    );
    let mut vars = ScenarioVariables::new();

    let rendered = renderer.render(&mut numbered_rows(1), &mut vars).unwrap();
    assert_eq!(rendered.row_count, 1);
}

#[test]
fn test_render_row_error_aborts() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["x"]), &delay);
    let mut vars = ScenarioVariables::new();
    let mut rs = BrokenResultSet {
        columns: ColumnMeta::from_labels(["X"]),
        served: false,
    };

    let result = renderer.render(&mut rs, &mut vars);
    assert!(matches!(result, Err(SamplerError::Database { .. })));
    assert!(!vars.contains("x_#"));
}

// =============================================================================
// ResultConsumer
// =============================================================================

#[test]
fn test_drain_concatenates_segments_in_order() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(RenderOptions::default(), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::default());
    let mut vars = ScenarioVariables::new();
    let mut cursor = BufferedCursor::new(vec![
        BufferedSegment::Rows(id_name_rows()),
        BufferedSegment::Rows(numbered_rows(1)),
        BufferedSegment::UpdateCount(3),
    ]);

    let report = consumer.drain(&mut cursor, &mut vars).unwrap();

    assert_eq!(report, "ID\tNAME\n1\ta\n2\tb\n\nN\n1\n\n3 updates.\n");
}

#[test]
fn test_drain_update_counts_only() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(RenderOptions::default(), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::default());
    let mut vars = ScenarioVariables::new();
    let mut cursor = BufferedCursor::new(vec![
        BufferedSegment::UpdateCount(0),
        BufferedSegment::UpdateCount(12),
    ]);

    let report = consumer.drain(&mut cursor, &mut vars).unwrap();
    assert_eq!(report, "0 updates.\n12 updates.\n");
}

#[test]
fn test_drain_empty_cursor() {
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(RenderOptions::default(), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::default());
    let mut vars = ScenarioVariables::new();

    let report = consumer.drain(&mut BufferedCursor::default(), &mut vars).unwrap();
    assert_eq!(report, "");
}

fn callable_with_outputs(
    conn: &MockConnection,
    script: Script,
) -> Box<dyn sqlsampler_core::PreparedStatement> {
    conn.script("{call p}", script);
    conn.prepare_call("{call p}").unwrap()
}

#[test]
fn test_read_outputs_reports_and_binds_by_position() {
    let conn = MockConnection::new();
    let mut stmt = callable_with_outputs(
        &conn,
        Script::default()
            .with_output(2, MockOut::Value(Value::Int64(7)))
            .with_output(3, MockOut::Value(Value::Null)),
    );
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["total", "nothing"]), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::default());
    let mut vars = ScenarioVariables::new();
    let descriptors = [
        OutputDescriptor::NotOutput,
        OutputDescriptor::Output {
            sql_type: sql_types::INTEGER,
        },
        OutputDescriptor::Output {
            sql_type: sql_types::VARCHAR,
        },
    ];

    let mut report = String::new();
    consumer
        .read_outputs(stmt.as_mut(), &descriptors, &mut vars, &mut report)
        .unwrap();

    assert_eq!(report, "Output variables by position:\n[2] 7\n[3] null\n");
    assert_eq!(vars.get("total").as_deref(), Some("7"));
    assert!(vars.contains("nothing"));
    assert_eq!(vars.get("nothing"), None);
}

#[test]
fn test_read_outputs_stops_at_shorter_list() {
    let conn = MockConnection::new();
    let mut stmt = callable_with_outputs(
        &conn,
        Script::default()
            .with_output(1, MockOut::Value(Value::String("a".into())))
            .with_output(2, MockOut::Value(Value::String("b".into()))),
    );
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["first"]), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::default());
    let mut vars = ScenarioVariables::new();
    let descriptors = [OutputDescriptor::Output {
        sql_type: sql_types::VARCHAR,
    }; 2];

    let mut report = String::new();
    consumer
        .read_outputs(stmt.as_mut(), &descriptors, &mut vars, &mut report)
        .unwrap();

    assert_eq!(vars.names(), vec!["first"]);
    assert_eq!(vars.get("first").as_deref(), Some("a"));
    assert_eq!(report, "Output variables by position:\n[1] a\n[2] b\n");
}

#[test]
fn test_read_outputs_without_descriptors_adds_nothing() {
    let conn = MockConnection::new();
    let mut stmt = callable_with_outputs(&conn, Script::default());
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["x"]), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::default());
    let mut vars = ScenarioVariables::new();

    let mut report = String::from("1 updates.\n");
    consumer
        .read_outputs(stmt.as_mut(), &[], &mut vars, &mut report)
        .unwrap();

    assert_eq!(report, "1 updates.\n");
    assert!(vars.is_empty());
}

#[test]
fn test_count_records_reports_row_count() {
    let conn = MockConnection::new();
    let mut stmt = callable_with_outputs(
        &conn,
        Script::default().with_output(1, MockOut::Rows(numbered_rows(7))),
    );
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["cursor"]), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::CountRecords);
    let mut vars = ScenarioVariables::new();
    let descriptors = [OutputDescriptor::Output {
        sql_type: sql_types::REF_CURSOR,
    }];

    let mut report = String::new();
    consumer
        .read_outputs(stmt.as_mut(), &descriptors, &mut vars, &mut report)
        .unwrap();

    assert_eq!(
        report,
        "Output variables by position:\n[1] ResultSet[N] 7 rows\n"
    );
    assert_eq!(vars.get("cursor").as_deref(), Some("ResultSet[N] 7 rows"));
}

#[test]
fn test_store_as_object_keeps_cursor() {
    let conn = MockConnection::new();
    let mut stmt = callable_with_outputs(
        &conn,
        Script::default().with_output(1, MockOut::Rows(numbered_rows(3))),
    );
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["cursor"]), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::StoreAsObject);
    let mut vars = ScenarioVariables::new();
    let descriptors = [OutputDescriptor::Output {
        sql_type: sql_types::REF_CURSOR,
    }];

    let mut report = String::new();
    consumer
        .read_outputs(stmt.as_mut(), &descriptors, &mut vars, &mut report)
        .unwrap();

    assert_eq!(report, "Output variables by position:\n[1] ResultSet[N]\n");
    let object = vars.get_object("cursor").unwrap();
    let shared = object.as_result_set().unwrap();
    assert_eq!(shared.lock().count_rows().unwrap(), 3);
}

#[test]
fn test_store_as_string_uses_description() {
    let conn = MockConnection::new();
    let mut stmt = callable_with_outputs(
        &conn,
        Script::default().with_output(1, MockOut::Rows(id_name_rows())),
    );
    let delay = ReadDelay::new();
    let renderer = ResultRenderer::new(options(&["cursor"]), &delay);
    let consumer = ResultConsumer::new(&renderer, ResultSetHandler::StoreAsString);
    let mut vars = ScenarioVariables::new();
    let descriptors = [OutputDescriptor::Output {
        sql_type: sql_types::REF_CURSOR,
    }];

    let mut report = String::new();
    consumer
        .read_outputs(stmt.as_mut(), &descriptors, &mut vars, &mut report)
        .unwrap();

    assert_eq!(vars.get("cursor").as_deref(), Some("ResultSet[ID, NAME]"));
    assert!(vars.get_object("cursor").is_none());
}
