use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::{RequestHandler, ResultHandler};
use crate::config::{FieldList, QueryDefinition};
use crate::error::ResourceError;
use crate::filter::{self, FilterWhere, QueryFilter};
use crate::resource::{
    ActionRequest, ActionResponse, Context, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, QueryResponse,
    ReadRequest, ResourcePath, ResourceResponse, UpdateRequest,
};

/// Query id answered for every type even when not configured.
pub const QUERY_ALL_IDS: &str = "query-all-ids";
/// Action that runs a named command.
pub const COMMAND_ACTION: &str = "command";
pub const COMMAND_ID_PARAM: &str = "commandId";

/// Pass-through handler: retargets the caller's path onto the configured
/// backend path and delegates each operation unchanged.
pub struct ExplicitHandler {
    repo_resource: ResourcePath,
    backend: Arc<dyn RequestHandler>,
    queries: BTreeMap<String, QueryDefinition>,
    commands: BTreeMap<String, QueryDefinition>,
}

impl ExplicitHandler {
    pub fn new(
        repo_resource: ResourcePath,
        backend: Arc<dyn RequestHandler>,
        queries: BTreeMap<String, QueryDefinition>,
        commands: BTreeMap<String, QueryDefinition>,
    ) -> Self {
        Self {
            repo_resource,
            backend,
            queries,
            commands,
        }
    }

    pub fn repo_resource(&self) -> &ResourcePath {
        &self.repo_resource
    }

    pub fn backend(&self) -> &Arc<dyn RequestHandler> {
        &self.backend
    }

    /// Backend path of the instance addressed by `path`.
    fn instance_path(&self, path: &ResourcePath) -> Result<ResourcePath, ResourceError> {
        path.leaf()
            .filter(|_| path.len() > 1)
            .map(|id| self.repo_resource.child(id))
            .ok_or_else(|| ResourceError::bad_request(format!("Expected an instance path, got '{}'", path)))
    }

    pub async fn handle_create(&self, context: &Context, mut request: CreateRequest) -> Result<ResourceResponse, ResourceError> {
        request.resource_path = self.repo_resource.clone();
        self.backend.handle_create(context, request).await
    }

    pub async fn handle_read(&self, context: &Context, mut request: ReadRequest) -> Result<ResourceResponse, ResourceError> {
        request.resource_path = self.instance_path(&request.resource_path)?;
        self.backend.handle_read(context, request).await
    }

    pub async fn handle_update(&self, context: &Context, mut request: UpdateRequest) -> Result<ResourceResponse, ResourceError> {
        request.resource_path = self.instance_path(&request.resource_path)?;
        self.backend.handle_update(context, request).await
    }

    pub async fn handle_patch(&self, context: &Context, mut request: PatchRequest) -> Result<ResourceResponse, ResourceError> {
        request.resource_path = self.instance_path(&request.resource_path)?;
        self.backend.handle_patch(context, request).await
    }

    pub async fn handle_delete(&self, context: &Context, mut request: DeleteRequest) -> Result<ResourceResponse, ResourceError> {
        request.resource_path = self.instance_path(&request.resource_path)?;
        self.backend.handle_delete(context, request).await
    }

    pub async fn handle_action(&self, context: &Context, mut request: ActionRequest) -> Result<ActionResponse, ResourceError> {
        if request.action == COMMAND_ACTION {
            let filter = self.resolve_command(&request)?;
            return self.delete_matching(context, &self.repo_resource, filter).await;
        }
        request.resource_path = self.repo_resource.clone();
        self.backend.handle_action(context, request).await
    }

    pub async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut ResultHandler<'_>,
    ) -> Result<QueryResponse, ResourceError> {
        let mut request = self.normalize_query_request(&request)?;
        request.resource_path = self.repo_resource.clone();
        self.backend.handle_query(context, request, handler).await
    }

    /// Validate the request and replace a named query id with its filter.
    pub fn normalize_query_request(&self, request: &QueryRequest) -> Result<QueryRequest, ResourceError> {
        let mut normalized = filter::normalize(request).map_err(|e| {
            warn!("Rejected query on {}: {}", request.resource_path, e);
            ResourceError::from(e)
        })?;

        if normalized.query_expression.is_some() {
            return Err(ResourceError::bad_request(
                "Query expressions are not supported, use a query filter or query id",
            ));
        }

        if let Some(query_id) = normalized.query_id.take() {
            let definition = self.query_definition(&query_id)?;
            normalized.query_filter = Some(resolve_definition(&definition, &normalized.additional_parameters)?);
            if normalized.fields.is_empty() {
                normalized.fields = definition.fields.as_ref().map(FieldList::pointers).unwrap_or_default();
            }
            if normalized.sort_keys.is_empty() {
                normalized.sort_keys = definition.sort_keys()?;
            }
            debug!("Resolved query {} on {}", query_id, request.resource_path);
        }
        Ok(normalized)
    }

    fn query_definition(&self, query_id: &str) -> Result<QueryDefinition, ResourceError> {
        if let Some(definition) = self.queries.get(query_id) {
            return Ok(definition.clone());
        }
        if query_id == QUERY_ALL_IDS {
            return Ok(QueryDefinition {
                query_filter: Value::Bool(true),
                fields: Some(FieldList::Csv("_id".to_string())),
                sort_keys: None,
            });
        }
        Err(ResourceError::bad_request(format!("Unknown query id: {}", query_id)))
    }

    /// Filter of the command named by the `commandId` parameter.
    pub fn resolve_command(&self, request: &ActionRequest) -> Result<QueryFilter, ResourceError> {
        let command_id = request
            .parameters
            .get(COMMAND_ID_PARAM)
            .ok_or_else(|| ResourceError::bad_request("Command action requires a commandId parameter"))?;
        let definition = self
            .commands
            .get(command_id)
            .ok_or_else(|| ResourceError::bad_request(format!("Unknown command id: {}", command_id)))?;
        resolve_definition(definition, &request.parameters)
    }

    /// Delete every backend entry of `collection` matching `filter`.
    pub async fn delete_matching(
        &self,
        context: &Context,
        collection: &ResourcePath,
        filter: QueryFilter,
    ) -> Result<ActionResponse, ResourceError> {
        let query = QueryRequest::new(collection.clone()).with_filter(filter);
        let mut ids = Vec::new();
        self.backend
            .handle_query(context, query, &mut |response: ResourceResponse| {
                ids.extend(response.id);
                true
            })
            .await?;

        let mut count = 0;
        for id in ids {
            let request = DeleteRequest::new(collection.child(id));
            match self.backend.handle_delete(context, request).await {
                Ok(_) => count += 1,
                // removed concurrently
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        debug!("Command deleted {} entries from {}", count, collection);
        Ok(ActionResponse::new(json!({ "count": count })))
    }
}

fn resolve_definition(
    definition: &QueryDefinition,
    parameters: &BTreeMap<String, String>,
) -> Result<QueryFilter, ResourceError> {
    let where_data = substitute_tokens(&definition.query_filter, parameters)?;
    Ok(FilterWhere::parse(&where_data)?)
}

/// Replace `${name}` tokens in every string of `value` with request parameters.
pub fn substitute_tokens(value: &Value, parameters: &BTreeMap<String, String>) -> Result<Value, ResourceError> {
    Ok(match value {
        Value::String(text) => Value::String(substitute_str(text, parameters)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_tokens(item, parameters))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), substitute_tokens(v, parameters)?)))
                .collect::<Result<_, ResourceError>>()?,
        ),
        other => other.clone(),
    })
}

fn substitute_str(text: &str, parameters: &BTreeMap<String, String>) -> Result<String, ResourceError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let name = &rest[start + 2..start + 2 + len];
        let value = parameters
            .get(name)
            .ok_or_else(|| ResourceError::bad_request(format!("Missing query parameter: {}", name)))?;
        out.push_str(&rest[..start]);
        out.push_str(value);
        rest = &rest[start + 3 + len..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_tokens_in_nested_values() {
        let template = json!({"name": "${first} ${last}", "$or": [{"city": "${city}"}], "age": 3});
        let resolved = substitute_tokens(
            &template,
            &params(&[("first", "Ada"), ("last", "Lovelace"), ("city", "London")]),
        )
        .unwrap();
        assert_eq!(
            resolved,
            json!({"name": "Ada Lovelace", "$or": [{"city": "London"}], "age": 3})
        );
    }

    #[test]
    fn missing_parameters_are_bad_requests() {
        let err = substitute_tokens(&json!("${who}"), &BTreeMap::new()).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(substitute_str("no tokens ${here", &BTreeMap::new()).unwrap(), "no tokens ${here");
    }
}
