//! Query data model: the compiler's input description.
//!
//! Every type here is a request-scoped value. Enum-like inputs are closed
//! Rust enums validated on construction (or deserialization), so a config
//! that survives parsing only fails generation on table registration.

pub mod condition;
pub mod config;
pub mod error;
pub mod field;
pub mod table;
pub mod window;

pub use condition::{Condition, Connector, FilterValue, HavingCondition, Operator, WhereCondition};
pub use config::{Order, Pagination, SortOrder, SqlConfig};
pub use error::{ModelError, ModelResult};
pub use field::{AggregateType, Field, FieldType};
pub use table::{JoinTable, JoinType, LinkField, Table};
pub use window::TimeWindow;
