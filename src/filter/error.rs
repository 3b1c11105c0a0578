use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid JSON pointer: {0}")]
    InvalidPointer(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Filter nesting depth {depth} exceeds maximum {max}")]
    NestingTooDeep { depth: u32, max: u32 },

    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("Conflicting query parameters: {0}")]
    ConflictingParameters(String),

    #[error("Query request must specify one of a query id, a query filter or a query expression")]
    MissingQuery,

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::JsonError(err.to_string())
    }
}
