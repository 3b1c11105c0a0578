use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::explicit::{ExplicitHandler, COMMAND_ACTION};
use crate::backend::ResultHandler;
use crate::error::ResourceError;
use crate::filter::{JsonPointer, QueryFilter, SortKey};
use crate::resource::{
    ActionRequest, ActionResponse, Context, CreateRequest, DeleteRequest, PatchOperation, PatchRequest, QueryRequest,
    QueryResponse, ReadRequest, ResourcePath, ResourceResponse, UpdateRequest,
};

pub const FULL_OBJECT: &str = "fullobject";
pub const OBJECT_TYPE: &str = "objecttype";
pub const FIELD_ID: &str = "_id";
pub const FIELD_REVISION: &str = "_rev";

/// Stores arbitrary objects as `{_id, _rev, objecttype, fullobject}` records.
///
/// Content goes into `fullobject` except for the explicit fields, which stay at
/// the top level. Every record is tagged with the type path it was created
/// under. Records of a type live in `<repo_resource>/<type>`, while reads and
/// queries search the shared `repo_resource` and select by `objecttype`.
pub struct GenericHandler {
    explicit: ExplicitHandler,
    explicit_fields: BTreeSet<String>,
}

impl GenericHandler {
    pub fn new<I, S>(explicit: ExplicitHandler, extra_explicit_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut explicit_fields: BTreeSet<String> = [FIELD_ID, FIELD_REVISION].into_iter().map(String::from).collect();
        explicit_fields.extend(extra_explicit_fields.into_iter().map(Into::into));
        Self {
            explicit,
            explicit_fields,
        }
    }

    pub fn explicit(&self) -> &ExplicitHandler {
        &self.explicit
    }

    pub fn explicit_fields(&self) -> &BTreeSet<String> {
        &self.explicit_fields
    }

    /// Wrap caller content into the stored record shape.
    pub fn input_projection(&self, content: &Value, object_type: &ResourcePath) -> Value {
        let mut working = content.clone();
        let mut stored = Map::new();
        if let Value::Object(fields) = &mut working {
            for name in &self.explicit_fields {
                if let Some(value) = fields.remove(name) {
                    stored.insert(name.clone(), value);
                }
            }
        }
        stored.insert(FULL_OBJECT.to_string(), working);
        stored.insert(OBJECT_TYPE.to_string(), Value::String(object_type.to_string()));
        Value::Object(stored)
    }

    /// Unwrap a stored record back into caller content.
    pub fn output_projection(&self, stored: &Value) -> Value {
        let Some(full_object) = stored.get(FULL_OBJECT) else {
            return Value::Object(Map::new());
        };
        let mut content = full_object.clone();
        if let (Value::Object(out), Value::Object(top)) = (&mut content, stored) {
            for name in &self.explicit_fields {
                if let Some(value) = top.get(name) {
                    out.insert(name.clone(), value.clone());
                }
            }
        }
        content
    }

    /// Explicit fields, `objecttype` and the root pointer stay put; every other
    /// field is addressed inside `fullobject`.
    pub fn rewrite_pointer(&self, pointer: &JsonPointer) -> JsonPointer {
        match pointer.first() {
            None => pointer.clone(),
            Some(first) if first == OBJECT_TYPE || self.explicit_fields.contains(first) => pointer.clone(),
            Some(_) => pointer.prefixed(FULL_OBJECT),
        }
    }

    pub fn rewrite_filter(&self, filter: &QueryFilter) -> QueryFilter {
        filter.map_fields(&|pointer: &JsonPointer| self.rewrite_pointer(pointer))
    }

    fn rewrite_fields(&self, fields: &[JsonPointer]) -> Vec<JsonPointer> {
        fields.iter().map(|f| self.rewrite_pointer(f)).collect()
    }

    fn rewrite_sort_keys(&self, keys: &[SortKey]) -> Vec<SortKey> {
        keys.iter()
            .map(|key| SortKey {
                field: self.rewrite_pointer(&key.field),
                direction: key.direction,
            })
            .collect()
    }

    /// Caller filter rewritten and scoped to `object_type`.
    pub fn scoped_filter(&self, filter: Option<&QueryFilter>, object_type: &ResourcePath) -> QueryFilter {
        let type_filter = QueryFilter::equal_to(JsonPointer::new([OBJECT_TYPE]), object_type.to_string());
        match filter {
            Some(filter) => QueryFilter::and(vec![self.rewrite_filter(filter), type_filter]),
            None => type_filter,
        }
    }

    /// Whether `value` has the stored record shape produced by [`Self::input_projection`].
    pub fn is_stored_record(value: &Value) -> bool {
        value.get(FULL_OBJECT).is_some() || value.get(OBJECT_TYPE).is_some()
    }

    fn project_response(&self, mut response: ResourceResponse) -> ResourceResponse {
        response.content = self.output_projection(&response.content);
        response
    }

    /// Backend collection holding the records of `object_type`.
    pub fn type_collection(&self, object_type: &ResourcePath) -> ResourcePath {
        self.explicit.repo_resource().concat(object_type)
    }

    fn require_object(content: &Value, path: &ResourcePath) -> Result<(), ResourceError> {
        if content.is_object() {
            Ok(())
        } else {
            Err(ResourceError::bad_request(format!("Content for '{}' must be a JSON object", path)))
        }
    }

    fn instance_path(&self, path: &ResourcePath) -> Result<(ResourcePath, ResourcePath), ResourceError> {
        let (object_type, id) = path
            .split_instance()
            .ok_or_else(|| ResourceError::bad_request(format!("Expected an instance path, got '{}'", path)))?;
        let backend_path = self.type_collection(&object_type).child(id);
        Ok((object_type, backend_path))
    }

    pub async fn handle_create(&self, context: &Context, mut request: CreateRequest) -> Result<ResourceResponse, ResourceError> {
        Self::require_object(&request.content, &request.resource_path)?;
        request.content = self.input_projection(&request.content, &request.resource_path);
        request.resource_path = self.type_collection(&request.resource_path);
        let response = self.explicit.backend().handle_create(context, request).await?;
        Ok(self.project_response(response))
    }

    /// Reads run as a type-scoped query on the id against the shared
    /// collection, so records of other types stay invisible.
    pub async fn handle_read(&self, context: &Context, request: ReadRequest) -> Result<ResourceResponse, ResourceError> {
        let (object_type, id) = request
            .resource_path
            .split_instance()
            .ok_or_else(|| ResourceError::bad_request(format!("Expected an instance path, got '{}'", request.resource_path)))?;

        let filter = QueryFilter::and(vec![
            QueryFilter::equal_to(JsonPointer::new([FIELD_ID]), id),
            QueryFilter::equal_to(JsonPointer::new([OBJECT_TYPE]), object_type.to_string()),
        ]);
        let mut query = QueryRequest::new(self.explicit.repo_resource().clone()).with_filter(filter);
        query.fields = self.rewrite_fields(&request.fields);

        let mut first = None;
        self.explicit
            .backend()
            .handle_query(context, query, &mut |response: ResourceResponse| {
                first = Some(response);
                false
            })
            .await?;

        first
            .map(|response| self.project_response(response))
            .ok_or_else(|| ResourceError::not_found(format!("Object {} not found in {}", id, object_type)))
    }

    pub async fn handle_update(&self, context: &Context, mut request: UpdateRequest) -> Result<ResourceResponse, ResourceError> {
        Self::require_object(&request.content, &request.resource_path)?;
        let (object_type, backend_path) = self.instance_path(&request.resource_path)?;
        request.content = self.input_projection(&request.content, &object_type);
        request.resource_path = backend_path;
        let response = self.explicit.backend().handle_update(context, request).await?;
        Ok(self.project_response(response))
    }

    pub async fn handle_patch(&self, context: &Context, mut request: PatchRequest) -> Result<ResourceResponse, ResourceError> {
        let (_, backend_path) = self.instance_path(&request.resource_path)?;
        request.resource_path = backend_path;
        request.operations = request
            .operations
            .into_iter()
            .map(|op| PatchOperation {
                field: self.rewrite_pointer(&op.field),
                ..op
            })
            .collect();
        let response = self.explicit.backend().handle_patch(context, request).await?;
        Ok(self.project_response(response))
    }

    pub async fn handle_delete(&self, context: &Context, mut request: DeleteRequest) -> Result<ResourceResponse, ResourceError> {
        let (_, backend_path) = self.instance_path(&request.resource_path)?;
        request.resource_path = backend_path;
        let response = self.explicit.backend().handle_delete(context, request).await?;
        Ok(self.project_response(response))
    }

    /// The request path names the object type, as it does for create and query.
    /// Commands run locally against that type; other actions are delegated to
    /// the type's collection, and results shaped like stored records are
    /// output-projected while anything else passes through.
    pub async fn handle_action(&self, context: &Context, mut request: ActionRequest) -> Result<ActionResponse, ResourceError> {
        let object_type = request.resource_path.clone();
        if request.action == COMMAND_ACTION {
            let filter = self.explicit.resolve_command(&request)?;
            let scoped = self.scoped_filter(Some(&filter), &object_type);
            return self
                .explicit
                .delete_matching(context, &self.type_collection(&object_type), scoped)
                .await;
        }
        request.resource_path = self.type_collection(&object_type);
        let mut response = self.explicit.backend().handle_action(context, request).await?;
        if Self::is_stored_record(&response.content) {
            response.content = self.output_projection(&response.content);
        }
        Ok(response)
    }

    pub async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut ResultHandler<'_>,
    ) -> Result<QueryResponse, ResourceError> {
        let normalized = self.explicit.normalize_query_request(&request)?;
        let object_type = request.resource_path.clone();

        let mut query = QueryRequest {
            resource_path: self.explicit.repo_resource().clone(),
            query_filter: Some(self.scoped_filter(normalized.query_filter.as_ref(), &object_type)),
            fields: self.rewrite_fields(&normalized.fields),
            sort_keys: self.rewrite_sort_keys(&normalized.sort_keys),
            ..normalized
        };
        query.query_id = None;
        if let Some(filter) = &query.query_filter {
            debug!("Generic query on {} as {}", object_type, filter);
        }

        self.explicit
            .backend()
            .handle_query(context, query, &mut |response: ResourceResponse| {
                handler(self.project_response(response))
            })
            .await
    }
}
