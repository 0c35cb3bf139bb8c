//! CAST target types.
//!
//! Dialects map each variant to their own spelling via
//! `SqlDialect::emit_cast_type`.

/// Target type of a SQL `CAST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    /// Character cast used to stringify numeric keys (`CAST(x AS CHAR)`).
    Char,
}
