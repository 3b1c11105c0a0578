use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::error::ResourceError;
use crate::filter::{FilterOrder, FilterWhere, JsonPointer};
use crate::resource::{QueryRequest, QueryResponse, ResourcePath, ResourceResponse};

pub const PARAM_QUERY_ID: &str = "_queryId";
pub const PARAM_QUERY_FILTER: &str = "_queryFilter";
pub const PARAM_QUERY_EXPRESSION: &str = "_queryExpression";
pub const PARAM_FIELDS: &str = "_fields";
pub const PARAM_SORT_KEYS: &str = "_sortKeys";
pub const PARAM_PAGE_SIZE: &str = "_pageSize";
pub const PARAM_PAGED_RESULTS_OFFSET: &str = "_pagedResultsOffset";
pub const PARAM_ACTION: &str = "_action";
pub const PARAM_ID: &str = "_id";

/// Resource content as returned to clients, with `_id` and `_rev` merged in.
pub fn resource_to_json(response: &ResourceResponse) -> Value {
    let Value::Object(content) = &response.content else {
        return response.content.clone();
    };
    let mut out = Map::new();
    if let Some(id) = &response.id {
        out.insert("_id".to_string(), Value::String(id.clone()));
    }
    if let Some(revision) = &response.revision {
        out.insert("_rev".to_string(), Value::String(revision.clone()));
    }
    for (key, value) in content {
        out.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(out)
}

pub fn query_result_json(results: &[ResourceResponse], response: &QueryResponse) -> Value {
    json!({
        "result": results.iter().map(resource_to_json).collect::<Vec<_>>(),
        "resultCount": results.len(),
        "pagedResultsCookie": response.paged_results_cookie,
        "totalPagedResults": response.total_paged_results,
        "remainingPagedResults": response.remaining_paged_results,
    })
}

pub fn is_query(params: &HashMap<String, String>) -> bool {
    [PARAM_QUERY_ID, PARAM_QUERY_FILTER, PARAM_QUERY_EXPRESSION]
        .iter()
        .any(|p| params.contains_key(*p))
}

pub fn parse_fields(csv: &str) -> Vec<JsonPointer> {
    csv.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(JsonPointer::parse)
        .collect()
}

fn parse_int(name: &str, value: &str) -> Result<i32, ResourceError> {
    value
        .trim()
        .parse()
        .map_err(|_| ResourceError::bad_request(format!("{} must be an integer, got '{}'", name, value)))
}

/// Build a query request from `_query*` and paging parameters. Any other
/// parameter is kept for `${token}` substitution in named queries.
pub fn parse_query_request(path: ResourcePath, params: &HashMap<String, String>) -> Result<QueryRequest, ResourceError> {
    let mut request = QueryRequest::new(path);
    for (name, value) in params {
        match name.as_str() {
            PARAM_QUERY_ID => request.query_id = Some(value.clone()),
            PARAM_QUERY_FILTER => request.query_filter = Some(FilterWhere::parse_str(value)?),
            PARAM_QUERY_EXPRESSION => request.query_expression = Some(value.clone()),
            PARAM_FIELDS => request.fields = parse_fields(value),
            PARAM_SORT_KEYS => request.sort_keys = FilterOrder::parse_sort_keys(value)?,
            PARAM_PAGE_SIZE => request.page_size = Some(parse_int(name, value)?),
            PARAM_PAGED_RESULTS_OFFSET => request.paged_results_offset = Some(parse_int(name, value)?),
            _ => {
                request.additional_parameters.insert(name.clone(), value.clone());
            }
        }
    }
    Ok(request)
}

/// Parse an optional JSON request body; an empty body is `null`.
pub fn parse_body(body: &[u8]) -> Result<Value, ResourceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ResourceError::bad_request(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_envelope_into_content() {
        let response = ResourceResponse::new(
            Some("a1".to_string()),
            Some("2".to_string()),
            json!({"name": "alice"}),
        );
        assert_eq!(resource_to_json(&response), json!({"_id": "a1", "_rev": "2", "name": "alice"}));
    }

    #[test]
    fn parses_query_parameters() {
        let params: HashMap<String, String> = [
            ("_queryFilter", r#"{"status": "active"}"#),
            ("_fields", "name, age"),
            ("_sortKeys", "-age"),
            ("_pageSize", "10"),
            ("region", "eu"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert!(is_query(&params));
        let request = parse_query_request(ResourcePath::parse("managed/user"), &params).unwrap();
        assert_eq!(request.query_filter.unwrap().to_string(), r#"/status eq "active""#);
        assert_eq!(request.fields.len(), 2);
        assert_eq!(request.sort_keys.len(), 1);
        assert_eq!(request.page_size, Some(10));
        assert_eq!(request.additional_parameters.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn rejects_malformed_parameters() {
        let params: HashMap<String, String> = [("_pageSize".to_string(), "ten".to_string())].into_iter().collect();
        let err = parse_query_request(ResourcePath::parse("x"), &params).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let params: HashMap<String, String> =
            [("_queryFilter".to_string(), "{broken".to_string())].into_iter().collect();
        assert!(parse_query_request(ResourcePath::parse("x"), &params).is_err());
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(parse_body(b"  ").unwrap(), Value::Null);
        assert_eq!(parse_body(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(parse_body(b"{").is_err());
    }
}
