//! Event deduplication: per-strategy dedup keys and the ranking window.

use serde::Deserialize;

use super::{PlannerError, PlannerResult, EVENT_ALIAS};
use crate::config::PlannerSettings;
use crate::sql::escape::dotted_json_path;
use crate::sql::{
    cast, coalesce, func, json_extract, lit_int, lit_str, row_number, table_col, CastType, Expr,
    ExprExt, WindowExt, WindowOrderBy,
};

/// Where a dedup key part is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupSource {
    /// Plain event column.
    Basic,
    /// Key inside the event payload JSON.
    Data,
    /// Key inside the evidence JSON.
    Evidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DedupField {
    pub source: DedupSource,
    pub name: String,
}

impl DedupField {
    pub fn new(source: DedupSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }

    fn to_expr(&self, settings: &PlannerSettings) -> Expr {
        let columns = &settings.event_columns;
        match self.source {
            DedupSource::Basic => cast(table_col(EVENT_ALIAS, &self.name), CastType::Char),
            DedupSource::Data => json_extract(
                table_col(EVENT_ALIAS, &columns.event_data),
                dotted_json_path(&self.name),
            ),
            DedupSource::Evidence => json_extract(
                table_col(EVENT_ALIAS, &columns.event_evidence),
                dotted_json_path(&self.name),
            ),
        }
    }
}

/// The key rows are deduplicated on, within one strategy.
///
/// Strategies without configuration fall back to the raw event id, or the
/// event timestamp when that is null.
pub fn dedup_key_expr(settings: &PlannerSettings) -> PlannerResult<Expr> {
    let columns = &settings.event_columns;
    let fallback = coalesce(vec![
        table_col(EVENT_ALIAS, &columns.raw_event_id),
        cast(table_col(EVENT_ALIAS, &columns.timestamp), CastType::Char),
    ]);

    if settings.dedup.is_empty() {
        return Ok(fallback);
    }

    let mut strategies = settings
        .dedup
        .iter()
        .map(|(key, fields)| {
            let id = key.trim().parse::<i64>().map_err(|_| {
                PlannerError::InvalidDedupConfig(format!("strategy id '{key}' is not an integer"))
            })?;
            if fields.is_empty() {
                return Err(PlannerError::InvalidDedupConfig(format!(
                    "strategy {id} has no dedup fields"
                )));
            }
            Ok((id, fields))
        })
        .collect::<PlannerResult<Vec<_>>>()?;
    strategies.sort_by_key(|(id, _)| *id);

    let when_clauses = strategies
        .into_iter()
        .map(|(id, fields)| {
            let mut args = vec![lit_str(&settings.dedup_separator)];
            args.extend(
                fields
                    .iter()
                    .map(|field| coalesce(vec![field.to_expr(settings), lit_str("")])),
            );
            (
                table_col(EVENT_ALIAS, &columns.strategy_id).eq(lit_int(id)),
                func("CONCAT_WS", args),
            )
        })
        .collect();

    Ok(Expr::Case {
        operand: None,
        when_clauses,
        else_clause: Some(Box::new(fallback)),
    })
}

/// `ROW_NUMBER() OVER (PARTITION BY strategy, key ORDER BY event_time DESC, event_id DESC)`
pub fn dedup_rank_expr(settings: &PlannerSettings) -> PlannerResult<Expr> {
    let columns = &settings.event_columns;
    Ok(row_number()
        .over()
        .partition_by(vec![
            table_col(EVENT_ALIAS, &columns.strategy_id),
            dedup_key_expr(settings)?,
        ])
        .order_by(vec![
            WindowOrderBy::desc(table_col(EVENT_ALIAS, &columns.event_time)),
            WindowOrderBy::desc(table_col(EVENT_ALIAS, &columns.event_id)),
        ])
        .build())
}
