//! Count → data orchestration against a recording executor.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::error::Error as _;
use std::fmt;

use bkquery::bridge::CompiledQuery;
use bkquery::config::{Settings, StaticTableNames};
use bkquery::execution::{
    parse_rpc_response, EventQueryOrchestrator, ExecutionError, ExecutionResult, MatchedRow,
    PageRequest, QueryExecutor, Row,
};
use bkquery::planner::{EventQueryRequest, RawEventFilter};
use serde_json::{json, Value};

/// Transport failure raised by the fake backend.
#[derive(Debug, PartialEq)]
struct Unavailable {
    status: u16,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend unavailable ({})", self.status)
    }
}

impl std::error::Error for Unavailable {}

/// Replays canned RPC payloads and records every statement it receives.
#[derive(Default)]
struct RecordingExecutor {
    responses: RefCell<VecDeque<ExecutionResult<Value>>>,
    executed: RefCell<Vec<String>>,
}

impl RecordingExecutor {
    fn with_responses(responses: Vec<ExecutionResult<Value>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            executed: RefCell::new(vec![]),
        }
    }
}

impl QueryExecutor for RecordingExecutor {
    fn execute(&self, sql: &str) -> ExecutionResult<Vec<Row>> {
        self.executed.borrow_mut().push(sql.to_string());
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ExecutionError::Rpc("no response queued".into())))?;
        parse_rpc_response(response)
    }
}

fn store() -> StaticTableNames {
    StaticTableNames::new()
        .insert("audit", "risk", "wh.risk.doris")
        .insert("audit", "event", "wh.event_log.doris")
}

fn request() -> EventQueryRequest {
    EventQueryRequest::new(
        CompiledQuery::new(
            "SELECT risk_id, strategy_id, raw_event_id, event_time, event_end_time FROM risk",
            vec![],
        ),
        "audit",
    )
    .with_filter(RawEventFilter::new("event_data.ip", "=", json!("1.1.1.1")))
    .with_page(PageRequest::new(2, 2))
}

#[test]
fn test_zero_count_skips_data_query() {
    let settings = Settings::default();
    let store = store();
    let executor = RecordingExecutor::with_responses(vec![Ok(json!({"list": [{"count": 0}]}))]);
    let orchestrator = EventQueryOrchestrator::new(&settings, &store, &executor).unwrap();

    let outcome = orchestrator.plan(&request()).unwrap();
    assert!(outcome.rows.is_empty());
    assert_eq!(outcome.page_info.total, 0);
    assert_eq!(outcome.sql_log.len(), 1);
    assert_eq!(*executor.executed.borrow(), outcome.sql_log);
    assert!(outcome.sql_log[0].starts_with("SELECT COUNT(*) AS `count`"));
}

#[test]
fn test_count_then_data() {
    let settings = Settings::default();
    let store = store();
    let executor = RecordingExecutor::with_responses(vec![
        Ok(json!({"list": [{"count": "5"}]})),
        Ok(json!({"list": [
            {"risk_id": 9, "__matched_event_data": "{\"ip\": \"1.1.1.1\"}"},
            {"risk_id": 8, "__matched_event_data": null}
        ]})),
    ]);
    let orchestrator = EventQueryOrchestrator::new(&settings, &store, &executor).unwrap();

    let outcome = orchestrator.plan(&request()).unwrap();
    assert_eq!(outcome.sql_log.len(), 2);
    assert!(outcome.sql_log[0].contains("COUNT(*)"));
    assert!(outcome.sql_log[1].ends_with("LIMIT 2 OFFSET 2"));
    assert_eq!(outcome.page_info.total, 5);
    assert_eq!(outcome.page_info.num_pages, 3);
    assert_eq!(outcome.page_info.page, 2);

    let rows: Vec<MatchedRow> = outcome.rows.into_iter().map(MatchedRow::split).collect();
    assert_eq!(rows[0].base.get("risk_id"), Some(&json!(9)));
    assert_eq!(rows[0].event_data, Some(json!({"ip": "1.1.1.1"})));
    assert_eq!(rows[1].event_data, Some(Value::Null));
}

#[test]
fn test_rpc_error_passes_through() {
    let settings = Settings::default();
    let store = store();
    let executor = RecordingExecutor::with_responses(vec![Err(ExecutionError::Rpc(Box::new(
        Unavailable { status: 503 },
    )))]);
    let orchestrator = EventQueryOrchestrator::new(&settings, &store, &executor).unwrap();

    let err = orchestrator.plan(&request()).unwrap_err();
    assert_eq!(err.to_string(), "query rpc failed: backend unavailable (503)");
    let ExecutionError::Rpc(source) = &err else {
        panic!("expected an rpc error, got {err:?}");
    };
    assert_eq!(
        source.downcast_ref::<Unavailable>(),
        Some(&Unavailable { status: 503 })
    );
    assert!(err.source().is_some());
    assert_eq!(executor.executed.borrow().len(), 1);
}

#[test]
fn test_planner_error_runs_nothing() {
    let settings = Settings::default();
    let store = StaticTableNames::new();
    let executor = RecordingExecutor::default();
    let orchestrator = EventQueryOrchestrator::new(&settings, &store, &executor).unwrap();

    let err = orchestrator.plan(&request()).unwrap_err();
    assert!(matches!(err, ExecutionError::Planner(_)));
    assert!(executor.executed.borrow().is_empty());
}

#[test]
fn test_malformed_count_row() {
    let settings = Settings::default();
    let store = store();
    let executor =
        RecordingExecutor::with_responses(vec![Ok(json!({"list": [{"count": {"n": 1}}]}))]);
    let orchestrator = EventQueryOrchestrator::new(&settings, &store, &executor).unwrap();

    assert!(matches!(
        orchestrator.plan(&request()),
        Err(ExecutionError::MalformedResponse(_))
    ));
}
