//! Analytical query planner - joins ORM base queries to matched events.
//!
//! Single pass over one request:
//! 1. Base query: ORM SQL → AST, ordering stripped, tables rewritten to
//!    physical names, partition range pushed onto the innermost scan.
//! 2. Matched event: filtered, partition-pruned event scan ranked by dedup
//!    key, keeping rank 1 only.
//! 3. Join on `(strategy_id, raw_event_id)` and the event time window.
//!
//! The result is a [`BkBaseQueryComponents`] that renders both the count and
//! the data SQL.

pub mod components;
pub mod dedup;
pub mod filters;
pub mod ordering;

pub use components::{BkBaseQueryComponents, MatchedEvent};
pub use dedup::{dedup_key_expr, dedup_rank_expr, DedupField, DedupSource};
pub use filters::{EventFilterOperator, EventFilterSpec, RawEventFilter, EVENT_DATA_PREFIX};
pub use ordering::{ordinal_expr, plan_ordering, OrderPlan, OrderSpec};

use std::collections::HashMap;

use serde::Deserialize;
use sqlparser::ast::Query as AstQuery;
use thiserror::Error;
use tracing::debug;

use crate::bridge::{
    compile_queryset_sql, convert_to_expression, BridgeError, CompiledQuery, LiteralRenderer,
};
use crate::config::{Settings, SettingsError, TableNameStore};
use crate::execution::PageRequest;
use crate::model::TimeWindow;
use crate::rewrite::{
    collect_table_names, push_partition_predicate, strip_ordering, transform_table, RewriteError,
};
use crate::sql::{
    func, lit_int, lit_str, table_col, Dialect, Expr, ExprExt, Query, SelectExpr, TableRef,
};

/// Dialect of all planner output.
pub const PLANNER_DIALECT: Dialect = Dialect::Doris;

pub const EVENT_ALIAS: &str = "event";
pub const RANKED_ALIAS: &str = "ranked_event";
pub const MATCHED_ALIAS: &str = "matched_event";
pub const BASE_ALIAS: &str = "base_query";
pub const COUNT_ALIAS: &str = "count_query";
pub const COUNT_COLUMN: &str = "count";
pub const DEDUP_RANK_ALIAS: &str = "__dedup_rank";
pub const MATCHED_EVENT_DATA_ALIAS: &str = "__matched_event_data";
pub const ORDER_EXPRESSION_ALIAS: &str = "order_expression";

/// Errors that can occur during planning.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid event filter on '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("event filter on '{field}' needs a numeric value, got {value}")]
    NonNumericValue { field: String, value: String },

    #[error("unknown event filter operator '{0}'")]
    UnknownOperator(String),

    #[error("invalid dedup configuration: {0}")]
    InvalidDedupConfig(String),

    #[error("no table configured for '{key}' in namespace '{namespace}'")]
    MissingTable { key: String, namespace: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type PlannerResult<T> = Result<T, PlannerError>;

/// One event query: the caller's base ORM query plus event constraints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventQueryRequest {
    pub base: CompiledQuery,
    pub namespace: String,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub event_filters: Vec<RawEventFilter>,
    #[serde(default)]
    pub order: Option<OrderSpec>,
    #[serde(default)]
    pub page: PageRequest,
}

impl EventQueryRequest {
    pub fn new(base: CompiledQuery, namespace: impl Into<String>) -> Self {
        Self {
            base,
            namespace: namespace.into(),
            window: None,
            event_filters: vec![],
            order: None,
            page: PageRequest::default(),
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_filter(mut self, filter: RawEventFilter) -> Self {
        self.event_filters.push(filter);
        self
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// Builds [`BkBaseQueryComponents`] from requests.
pub struct EventQueryPlanner<'a, S: TableNameStore + ?Sized> {
    settings: &'a Settings,
    store: &'a S,
    renderer: LiteralRenderer,
}

impl<'a, S: TableNameStore + ?Sized> EventQueryPlanner<'a, S> {
    pub fn new(settings: &'a Settings, store: &'a S) -> PlannerResult<Self> {
        Ok(Self {
            settings,
            store,
            renderer: settings.bridge.renderer()?,
        })
    }

    pub fn build_components(&self, request: &EventQueryRequest) -> PlannerResult<BkBaseQueryComponents> {
        let planner = &self.settings.planner;

        let filters = request
            .event_filters
            .iter()
            .map(EventFilterSpec::from_raw)
            .collect::<PlannerResult<Vec<_>>>()?;
        let order = plan_ordering(request.order.as_ref(), planner)?;

        let base_query = self.base_query(request)?;

        let matched_event = if filters.is_empty() && !order.needs_matched_event() {
            None
        } else {
            Some(self.matched_event(request, &filters)?)
        };

        debug!(
            namespace = %request.namespace,
            filters = filters.len(),
            matched_event = matched_event.is_some(),
            "built event query components"
        );

        Ok(BkBaseQueryComponents {
            base_query,
            matched_event,
            order,
        })
    }

    /// Parse, strip ordering, rewrite tables and push the partition range.
    fn base_query(&self, request: &EventQueryRequest) -> PlannerResult<Box<AstQuery>> {
        let planner = &self.settings.planner;

        let sql = compile_queryset_sql(&request.base, &self.renderer)?;
        let mut query = convert_to_expression(&sql)?;
        strip_ordering(&mut query);

        let name_map = self.table_name_map(&query, &request.namespace)?;
        let mut query = transform_table(query, &name_map, &planner.storage_suffixes)?;

        if let (Some(window), Some(column)) = (&request.window, &planner.base_partition_column) {
            push_partition_predicate(&mut query, column, window)?;
        }
        Ok(query)
    }

    fn table_name_map(&self, query: &AstQuery, namespace: &str) -> PlannerResult<HashMap<String, String>> {
        let mut name_map = HashMap::new();
        for logical in collect_table_names(query) {
            match self.store.resolve(&logical, namespace, None)? {
                Some(physical) => {
                    name_map.insert(logical, physical);
                }
                None => debug!(table = %logical, "no physical table configured, keeping name"),
            }
        }
        Ok(name_map)
    }

    fn event_table(&self, namespace: &str) -> PlannerResult<String> {
        let key = &self.settings.planner.event_table_key;
        self.store
            .resolve(key, namespace, None)?
            .ok_or_else(|| PlannerError::MissingTable {
                key: key.clone(),
                namespace: namespace.to_string(),
            })
    }

    fn matched_event(
        &self,
        request: &EventQueryRequest,
        filters: &[EventFilterSpec],
    ) -> PlannerResult<MatchedEvent> {
        let planner = &self.settings.planner;
        let columns = &planner.event_columns;
        let exposed = [
            &columns.strategy_id,
            &columns.raw_event_id,
            &columns.event_data,
            &columns.timestamp,
        ];

        let mut ranked_select: Vec<SelectExpr> = exposed
            .iter()
            .map(|c| SelectExpr::new(table_col(EVENT_ALIAS, c)))
            .collect();
        ranked_select.push(dedup_rank_expr(planner)?.alias(DEDUP_RANK_ALIAS));

        let mut ranked = Query::new()
            .select(ranked_select)
            .from(TableRef::physical(&self.event_table(&request.namespace)?).with_alias(EVENT_ALIAS));

        if let Some(window) = &request.window {
            let (start, end) = window.partition_bounds();
            let partition = table_col(EVENT_ALIAS, &columns.partition);
            ranked = ranked
                .filter(partition.clone().gte(lit_str(&start)))
                .filter(partition.lte(lit_str(&end)));
        }
        for filter in filters {
            ranked = ranked.filter(filter.to_expr(table_col(EVENT_ALIAS, &columns.event_data))?);
        }

        let query = Query::new()
            .select(
                exposed
                    .iter()
                    .map(|c| table_col(RANKED_ALIAS, c))
                    .collect::<Vec<_>>(),
            )
            .from(TableRef::subquery(ranked).with_alias(RANKED_ALIAS))
            .filter(table_col(RANKED_ALIAS, DEDUP_RANK_ALIAS).eq(lit_int(1)));

        Ok(MatchedEvent {
            query,
            on: self.join_condition(),
            payload_column: columns.event_data.clone(),
        })
    }

    /// Same strategy and raw event, event timestamp inside the base row's
    /// `[event_time, event_end_time + 1s)` window in epoch milliseconds.
    fn join_condition(&self) -> Expr {
        let planner = &self.settings.planner;
        let event = &planner.event_columns;
        let base = &planner.base_columns;

        let epoch_seconds =
            |column: &str| func("FLOOR", vec![func("UNIX_TIMESTAMP", vec![table_col(BASE_ALIAS, column)])]);
        let timestamp = table_col(MATCHED_ALIAS, &event.timestamp);

        table_col(MATCHED_ALIAS, &event.strategy_id)
            .eq(table_col(BASE_ALIAS, &base.strategy_id))
            .and(table_col(MATCHED_ALIAS, &event.raw_event_id).eq(table_col(BASE_ALIAS, &base.raw_event_id)))
            .and(timestamp.clone().gte(epoch_seconds(&base.event_time).mul(lit_int(1000))))
            .and(timestamp.lt(
                epoch_seconds(&base.event_end_time)
                    .add(lit_int(1))
                    .paren()
                    .mul(lit_int(1000)),
            ))
    }
}
