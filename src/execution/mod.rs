//! Count → data execution against the query RPC.
//!
//! The planner builds SQL but never runs it. [`EventQueryOrchestrator`]
//! runs the count query, skips the data query when nothing matched, and
//! keeps every executed statement for the caller to inspect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::bridge::BridgeError;
use crate::config::{Settings, TableNameStore};
use crate::planner::{
    BkBaseQueryComponents, EventQueryPlanner, EventQueryRequest, PlannerError, COUNT_COLUMN,
    MATCHED_EVENT_DATA_ALIAS,
};

/// One result row, column name → value.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Failure reported by the execution backend, passed through as-is.
    #[error("query rpc failed: {0}")]
    Rpc(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// The external query RPC.
pub trait QueryExecutor {
    fn execute(&self, sql: &str) -> ExecutionResult<Vec<Row>>;
}

/// Extract rows from an RPC payload shaped `{"list": [{...}, ...]}`.
pub fn parse_rpc_response(response: Value) -> ExecutionResult<Vec<Row>> {
    let Value::Object(mut body) = response else {
        return Err(ExecutionError::MalformedResponse("expected an object".into()));
    };
    match body.remove("list") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ExecutionError::MalformedResponse(format!(
                    "row is not an object: {other}"
                ))),
            })
            .collect(),
        Some(Value::Null) | None => Ok(vec![]),
        Some(other) => Err(ExecutionError::MalformedResponse(format!(
            "'list' is not an array: {other}"
        ))),
    }
}

// ============================================================================
// Pagination
// ============================================================================

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    /// `(limit, offset)`; page 0 is treated as page 1.
    pub fn limit_offset(&self) -> (u64, u64) {
        let page = self.page.max(1);
        (self.page_size, (page - 1).saturating_mul(self.page_size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub num_pages: u64,
}

impl PageInfo {
    pub fn new(total: u64, request: &PageRequest) -> Self {
        let num_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(request.page_size)
        };
        Self {
            total,
            page: request.page.max(1),
            page_size: request.page_size,
            num_pages,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub page_info: PageInfo,
    /// Executed SQL, in execution order.
    pub sql_log: Vec<String>,
}

/// A data row split into base columns and the matched event payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRow {
    pub base: Row,
    pub event_data: Option<Value>,
}

impl MatchedRow {
    /// Take the payload column out of `row`; JSON strings are decoded,
    /// anything unparsable is kept as the raw value.
    pub fn split(mut row: Row) -> Self {
        let event_data = row.remove(MATCHED_EVENT_DATA_ALIAS).map(|value| match value {
            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            other => other,
        });
        Self {
            base: row,
            event_data,
        }
    }
}

fn read_count(rows: &[Row]) -> ExecutionResult<u64> {
    let Some(row) = rows.first() else {
        return Ok(0);
    };
    let value = row
        .get(COUNT_COLUMN)
        .or_else(|| row.values().next())
        .ok_or_else(|| ExecutionError::MalformedResponse("count row has no columns".into()))?;
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ExecutionError::MalformedResponse(format!("count is not a number: {value}")))
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Plans and executes event queries.
pub struct EventQueryOrchestrator<'a, S: TableNameStore + ?Sized, E: QueryExecutor + ?Sized> {
    planner: EventQueryPlanner<'a, S>,
    executor: &'a E,
}

impl<'a, S: TableNameStore + ?Sized, E: QueryExecutor + ?Sized> EventQueryOrchestrator<'a, S, E> {
    pub fn new(settings: &'a Settings, store: &'a S, executor: &'a E) -> ExecutionResult<Self> {
        Ok(Self {
            planner: EventQueryPlanner::new(settings, store)?,
            executor,
        })
    }

    fn run(&self, sql: String, sql_log: &mut Vec<String>) -> ExecutionResult<Vec<Row>> {
        info!(sql = %sql, "executing query");
        let rows = self.executor.execute(&sql);
        sql_log.push(sql);
        rows
    }

    /// Count first; run the data query only when something matched.
    pub fn plan(&self, request: &EventQueryRequest) -> ExecutionResult<QueryOutcome> {
        let components = self.planner.build_components(request)?;
        self.execute_components(&components, request)
    }

    pub fn execute_components(
        &self,
        components: &BkBaseQueryComponents,
        request: &EventQueryRequest,
    ) -> ExecutionResult<QueryOutcome> {
        let mut sql_log = Vec::with_capacity(2);

        let count_rows = self.run(components.count_sql(), &mut sql_log)?;
        let total = read_count(&count_rows)?;
        let page_info = PageInfo::new(total, &request.page);

        if total == 0 {
            warn!(namespace = %request.namespace, "count is zero, skipping data query");
            return Ok(QueryOutcome {
                rows: vec![],
                page_info,
                sql_log,
            });
        }

        let (limit, offset) = request.page.limit_offset();
        let rows = self.run(components.data_sql(limit, offset), &mut sql_log)?;
        info!(total, returned = rows.len(), "event query finished");

        Ok(QueryOutcome {
            rows,
            page_info,
            sql_log,
        })
    }
}
