use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

use super::format::{
    is_query, parse_body, parse_fields, parse_query_request, query_result_json, resource_to_json, PARAM_ACTION,
    PARAM_FIELDS, PARAM_ID,
};
use crate::error::ResourceError;
use crate::repo::RepositoryService;
use crate::resource::{
    ActionRequest, Context, CreateRequest, DeleteRequest, PatchOperation, PatchRequest, ReadRequest, ResourcePath,
    ResourceResponse, UpdateRequest,
};

pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_CALLER: &str = "x-caller";

/// Context for an inbound HTTP request: caller and trace id from headers.
fn request_context(headers: &HeaderMap) -> Context {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let context = match header(HEADER_CALLER) {
        Some(caller) => Context::for_caller(caller),
        None => Context::root(),
    };
    match header(HEADER_REQUEST_ID) {
        Some(trace_id) => context.with_trace_id(trace_id),
        None => context,
    }
}

fn if_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

fn resource_json(response: ResourceResponse) -> Json<Value> {
    Json(resource_to_json(&response))
}

/// GET /repo/*path - read an instance, or query when `_queryId`/`_queryFilter`/`_queryExpression` is present
pub async fn get(
    State(service): State<RepositoryService>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ResourceError> {
    let context = request_context(&headers);
    let path = ResourcePath::parse(&path);

    if is_query(&params) {
        let request = parse_query_request(path, &params)?;
        let mut results = Vec::new();
        let response = service
            .handle_query(&context, request, &mut |r: ResourceResponse| {
                results.push(r);
                true
            })
            .await?;
        return Ok(Json(query_result_json(&results, &response)));
    }

    let mut request = ReadRequest::new(path);
    if let Some(fields) = params.get(PARAM_FIELDS) {
        request.fields = parse_fields(fields);
    }
    service.handle_read(&context, request).await.map(resource_json)
}

/// POST /repo/*path?_action=create|<action> - create or run an action
pub async fn post(
    State(service): State<RepositoryService>,
    Path(path): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ResourceError> {
    let context = request_context(&headers);
    let path = ResourcePath::parse(&path);
    let content = parse_body(&body)?;
    let action = params
        .remove(PARAM_ACTION)
        .ok_or_else(|| ResourceError::bad_request("POST requires an _action parameter"))?;

    if action == "create" {
        let mut request = CreateRequest::new(path, content);
        request.new_resource_id = params.remove(PARAM_ID);
        let response = service.handle_create(&context, request).await?;
        return Ok((StatusCode::CREATED, resource_json(response)).into_response());
    }

    let mut request = ActionRequest::new(path, action).with_content(content);
    request.parameters = params.into_iter().collect();
    let response = service.handle_action(&context, request).await?;
    Ok(Json(response.content).into_response())
}

/// PUT /repo/*path - replace an instance, honouring If-Match
pub async fn put(
    State(service): State<RepositoryService>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ResourceError> {
    let context = request_context(&headers);
    let mut request = UpdateRequest::new(ResourcePath::parse(&path), parse_body(&body)?);
    request.revision = if_match(&headers);
    service.handle_update(&context, request).await.map(resource_json)
}

/// PATCH /repo/*path - apply patch operations
pub async fn patch(
    State(service): State<RepositoryService>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ResourceError> {
    let context = request_context(&headers);
    let operations: Vec<PatchOperation> = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| ResourceError::bad_request(format!("Invalid patch operations: {}", e)))?;
    let mut request = PatchRequest::new(ResourcePath::parse(&path), operations);
    request.revision = if_match(&headers);
    service.handle_patch(&context, request).await.map(resource_json)
}

/// DELETE /repo/*path - delete an instance, honouring If-Match
pub async fn delete(
    State(service): State<RepositoryService>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ResourceError> {
    let context = request_context(&headers);
    let mut request = DeleteRequest::new(ResourcePath::parse(&path));
    request.revision = if_match(&headers);
    service.handle_delete(&context, request).await.map(resource_json)
}
