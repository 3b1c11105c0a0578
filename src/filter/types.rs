use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FilterError;
use super::pointer::JsonPointer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$between")] Between,
}

impl FilterOp {
    pub fn from_key(op_key: &str) -> Result<Self, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    /// Keyword used when rendering a filter for logs and error messages.
    pub fn keyword(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "ge",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "le",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
            FilterOp::In => "in",
            FilterOp::NIn => "nin",
            FilterOp::Between => "between",
        }
    }
}

/// Query predicate tree. Field references are JSON pointers into the
/// resource content.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    BooleanLiteral(bool),
    Comparison {
        field: JsonPointer,
        operator: FilterOp,
        value: Value,
    },
    Present(JsonPointer),
    And(Vec<QueryFilter>),
    Or(Vec<QueryFilter>),
    Not(Box<QueryFilter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: JsonPointer,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<JsonPointer>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn descending(field: impl Into<JsonPointer>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}
