//! # bkquery
//!
//! Declarative query compiler and analytical event-query planner emitting
//! Hive- and Doris-compatible SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │   SqlConfig (model IR)   │        │  ORM (sql, params) pair  │
//! └──────────────────────────┘        └──────────────────────────┘
//!              │                                   │
//!              ▼ [generator]                       ▼ [bridge]
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │   Hive / Doris SQL text  │        │      sqlparser AST       │
//! └──────────────────────────┘        └──────────────────────────┘
//!                                                  │
//!                                                  ▼ [rewrite]
//!                                     ┌──────────────────────────┐
//!                                     │ physical tables, pruned  │
//!                                     └──────────────────────────┘
//!                                                  │
//!                                                  ▼ [planner]
//!                                     ┌──────────────────────────┐
//!                                     │ base ⋈ deduped events    │
//!                                     │  → count SQL / data SQL  │
//!                                     └──────────────────────────┘
//!                                                  │
//!                                                  ▼ [execution]
//!                                     ┌──────────────────────────┐
//!                                     │   rows + page info       │
//!                                     └──────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod execution;
pub mod generator;
pub mod model;
pub mod planner;
pub mod rewrite;
pub mod sql;

// Re-export SQL submodules at crate level
pub use sql::dialect;
pub use sql::escape;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::expr::{
        // Constructors
        avg,
        cast,
        coalesce,
        col,
        count,
        count_distinct,
        count_star,
        func,
        json_extract,
        lit_bool,
        lit_float,
        lit_int,
        lit_null,
        lit_str,
        max,
        min,
        star,
        sum,
        table_col,
        table_star,
        // Types
        BinaryOperator,
        Expr,
        ExprExt,
        Literal,
        SortDir,
        UnaryOperator,
    };
    pub use crate::generator::SqlGenerator;
    pub use crate::model::{
        AggregateType, Condition, Connector, Field, FieldType, JoinTable, JoinType, LinkField,
        Operator, Order, SqlConfig, Table, WhereCondition,
    };
    pub use crate::query::{Join, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef};
    pub use crate::token::{Token, TokenStream};
}

// Also export at crate root for convenience
pub use dialect::Dialect;
pub use generator::{GenerateError, SqlGenerator};
pub use model::SqlConfig;
pub use planner::{BkBaseQueryComponents, EventQueryPlanner, EventQueryRequest};
