use tracing::warn;

use super::error::FilterError;
use crate::resource::QueryRequest;

/// Validate and canonicalize a query request using the configured page size limit.
pub fn normalize(request: &QueryRequest) -> Result<QueryRequest, FilterError> {
    normalize_query_request(request, crate::config::CONFIG.repository.max_page_size)
}

/// Exactly one of query id, filter or expression must be set. Blank ids and
/// expressions count as absent, a zero page size means unpaged, and page sizes
/// above `max_page_size` are capped.
pub fn normalize_query_request(request: &QueryRequest, max_page_size: i32) -> Result<QueryRequest, FilterError> {
    let mut normalized = request.clone();

    normalized.query_id = non_blank(&request.query_id);
    normalized.query_expression = non_blank(&request.query_expression);

    let supplied: Vec<&str> = [
        normalized.query_id.as_ref().map(|_| "_queryId"),
        normalized.query_filter.as_ref().map(|_| "_queryFilter"),
        normalized.query_expression.as_ref().map(|_| "_queryExpression"),
    ]
    .into_iter()
    .flatten()
    .collect();

    match supplied.len() {
        0 => return Err(FilterError::MissingQuery),
        1 => {}
        _ => return Err(FilterError::ConflictingParameters(supplied.join(", "))),
    }

    normalized.page_size = match request.page_size {
        Some(size) if size < 0 => return Err(FilterError::InvalidPageSize(size.to_string())),
        Some(0) | None => None,
        Some(size) if max_page_size > 0 && size > max_page_size => {
            warn!("Page size {} exceeds maximum {}, capping", size, max_page_size);
            Some(max_page_size)
        }
        Some(size) => Some(size),
    };

    normalized.paged_results_offset = match request.paged_results_offset {
        Some(offset) if offset < 0 => return Err(FilterError::InvalidOffset(offset.to_string())),
        Some(0) | None => None,
        Some(offset) => Some(offset),
    };

    let mut seen = std::collections::HashSet::new();
    normalized.fields.retain(|field| seen.insert(field.clone()));

    Ok(normalized)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
