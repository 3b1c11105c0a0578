use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Map, Number, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::handler::{RequestHandler, ResultHandler};
use crate::error::ResourceError;
use crate::filter::{FilterOrder, JsonPointer, QueryFilter};
use crate::resource::{
    ActionRequest, ActionResponse, Context, CreateRequest, DeleteRequest, PatchOp, PatchOperation, PatchRequest,
    QueryRequest, QueryResponse, ReadRequest, ResourcePath, ResourceResponse, UpdateRequest,
};

const ID_FIELD: &str = "_id";
const REV_FIELD: &str = "_rev";

#[derive(Debug, Clone)]
struct StoredEntry {
    revision: u64,
    content: Value,
}

impl StoredEntry {
    fn response(&self, id: &str) -> ResourceResponse {
        ResourceResponse::new(Some(id.to_string()), Some(self.revision.to_string()), self.content.clone())
    }

    /// Content as seen by filters and sort keys: `_id` and `_rev` are addressable.
    fn document(&self, id: &str) -> Value {
        let mut doc = self.content.clone();
        if let Value::Object(map) = &mut doc {
            map.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            map.insert(REV_FIELD.to_string(), Value::String(self.revision.to_string()));
        }
        doc
    }
}

/// In-memory directory store: collections of entries keyed by backend path.
///
/// Instance operations address one collection; queries and `count` search the
/// whole subtree under the requested path. Entry content never carries
/// `_id`/`_rev`; those live in the response envelope. Every operation requires
/// a live connection bound to the request context.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<ResourcePath, BTreeMap<String, StoredEntry>>>,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests that reached the backend.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw stored entries of a collection, in id order.
    pub async fn entries(&self, collection: &ResourcePath) -> Vec<ResourceResponse> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|entries| entries.iter().map(|(id, entry)| entry.response(id)).collect())
            .unwrap_or_default()
    }

    fn begin(&self, context: &Context, operation: &str, path: &ResourcePath) -> Result<(), ResourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let connection = context
            .connection()
            .ok_or_else(|| ResourceError::internal("No backend connection bound to request context"))?;
        if connection.is_closed() {
            return Err(ResourceError::internal(format!("Backend connection {} is closed", connection.id())));
        }
        debug!("Backend {} {} on connection {}", operation, path, connection.id());
        Ok(())
    }

    /// Entries of every collection at or below `base`, ordered by id.
    fn subtree<'a>(
        collections: &'a HashMap<ResourcePath, BTreeMap<String, StoredEntry>>,
        base: &ResourcePath,
    ) -> Vec<(&'a String, &'a StoredEntry)> {
        let mut entries: Vec<_> = collections
            .iter()
            .filter(|(path, _)| path.starts_with(base))
            .flat_map(|(_, entries)| entries.iter())
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    fn instance(path: &ResourcePath) -> Result<(ResourcePath, String), ResourceError> {
        path.split_instance()
            .map(|(collection, id)| (collection, id.to_string()))
            .ok_or_else(|| ResourceError::bad_request(format!("Expected an instance path, got '{}'", path)))
    }

    fn check_revision(expected: &Option<String>, entry: &StoredEntry, id: &str) -> Result<(), ResourceError> {
        match expected {
            Some(rev) if rev != "*" && *rev != entry.revision.to_string() => Err(ResourceError::precondition_failed(
                format!("Revision {} does not match current revision {} of {}", rev, entry.revision, id),
            )),
            _ => Ok(()),
        }
    }
}

fn not_found(id: &str, collection: &ResourcePath) -> ResourceError {
    ResourceError::not_found(format!("Object {} not found in {}", id, collection))
}

fn strip_reserved(mut content: Value) -> Value {
    if let Value::Object(map) = &mut content {
        map.remove(ID_FIELD);
        map.remove(REV_FIELD);
    }
    content
}

/// Keep only the selected fields. `_id`/`_rev` are already in the envelope.
fn select_fields(content: &Value, fields: &[JsonPointer]) -> Value {
    if fields.is_empty() || fields.iter().any(JsonPointer::is_empty) {
        return content.clone();
    }
    let mut selected = Value::Object(Map::new());
    for field in fields {
        if matches!(field.first(), Some(ID_FIELD | REV_FIELD)) {
            continue;
        }
        if let Some(value) = field.get(content) {
            // set only fails on scalar intermediates, which a fresh object never has
            let _ = field.set(&mut selected, value.clone());
        }
    }
    selected
}

fn apply_patch(content: &mut Value, operation: &PatchOperation) -> Result<(), ResourceError> {
    let field = &operation.field;
    match operation.operation {
        PatchOp::Add => {
            // adding a single value to a multi-valued field appends it
            let append = matches!(field.get(content), Some(Value::Array(_))) && !operation.value.is_array();
            let target = if append { field.child("-") } else { field.clone() };
            target.set(content, operation.value.clone())?;
        }
        PatchOp::Replace => field.set(content, operation.value.clone())?,
        PatchOp::Remove => {
            field.remove(content);
        }
        PatchOp::Increment => {
            let current = field.get(content).cloned().unwrap_or(json!(0));
            let sum = add_numbers(&current, &operation.value).ok_or_else(|| {
                ResourceError::bad_request(format!("Cannot increment {} by {}", field, operation.value))
            })?;
            field.set(content, sum)?;
        }
    }
    Ok(())
}

fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(Value::Number(x.checked_add(y)?.into())),
            _ => Number::from_f64(x.as_f64()? + y.as_f64()?).map(Value::Number),
        },
        _ => None,
    }
}

#[async_trait]
impl RequestHandler for MemoryBackend {
    async fn handle_create(&self, context: &Context, request: CreateRequest) -> Result<ResourceResponse, ResourceError> {
        self.begin(context, "create", &request.resource_path)?;

        let id = request
            .new_resource_id
            .clone()
            .or_else(|| request.content.get(ID_FIELD).and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut collections = self.collections.write().await;
        let entries = collections.entry(request.resource_path.clone()).or_default();
        if entries.contains_key(&id) {
            return Err(ResourceError::conflict(format!(
                "Object {} already exists in {}",
                id, request.resource_path
            )));
        }

        let entry = StoredEntry {
            revision: 1,
            content: strip_reserved(request.content),
        };
        let response = entry.response(&id);
        entries.insert(id, entry);
        Ok(response)
    }

    async fn handle_read(&self, context: &Context, request: ReadRequest) -> Result<ResourceResponse, ResourceError> {
        self.begin(context, "read", &request.resource_path)?;
        let (collection, id) = Self::instance(&request.resource_path)?;

        let collections = self.collections.read().await;
        let entry = collections
            .get(&collection)
            .and_then(|entries| entries.get(&id))
            .ok_or_else(|| not_found(&id, &collection))?;

        let mut response = entry.response(&id);
        response.content = select_fields(&response.content, &request.fields);
        Ok(response)
    }

    async fn handle_update(&self, context: &Context, request: UpdateRequest) -> Result<ResourceResponse, ResourceError> {
        self.begin(context, "update", &request.resource_path)?;
        let (collection, id) = Self::instance(&request.resource_path)?;

        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(&collection)
            .and_then(|entries| entries.get_mut(&id))
            .ok_or_else(|| not_found(&id, &collection))?;
        Self::check_revision(&request.revision, entry, &id)?;

        entry.content = strip_reserved(request.content);
        entry.revision += 1;
        Ok(entry.response(&id))
    }

    async fn handle_patch(&self, context: &Context, request: PatchRequest) -> Result<ResourceResponse, ResourceError> {
        self.begin(context, "patch", &request.resource_path)?;
        let (collection, id) = Self::instance(&request.resource_path)?;

        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(&collection)
            .and_then(|entries| entries.get_mut(&id))
            .ok_or_else(|| not_found(&id, &collection))?;
        Self::check_revision(&request.revision, entry, &id)?;

        // Apply to a copy so a failing operation leaves the entry untouched
        let mut content = entry.content.clone();
        for operation in &request.operations {
            apply_patch(&mut content, operation)?;
        }
        entry.content = strip_reserved(content);
        entry.revision += 1;
        Ok(entry.response(&id))
    }

    async fn handle_delete(&self, context: &Context, request: DeleteRequest) -> Result<ResourceResponse, ResourceError> {
        self.begin(context, "delete", &request.resource_path)?;
        let (collection, id) = Self::instance(&request.resource_path)?;

        let mut collections = self.collections.write().await;
        let entries = collections
            .get_mut(&collection)
            .ok_or_else(|| not_found(&id, &collection))?;
        let entry = entries.get(&id).ok_or_else(|| not_found(&id, &collection))?;
        Self::check_revision(&request.revision, entry, &id)?;

        let response = entry.response(&id);
        entries.remove(&id);
        Ok(response)
    }

    async fn handle_action(&self, context: &Context, request: ActionRequest) -> Result<ActionResponse, ResourceError> {
        self.begin(context, "action", &request.resource_path)?;

        match request.action.as_str() {
            "count" => {
                let collections = self.collections.read().await;
                let count = Self::subtree(&collections, &request.resource_path).len();
                Ok(ActionResponse::new(json!({ "count": count })))
            }
            "echo" => Ok(ActionResponse::new(request.content)),
            other => Err(ResourceError::bad_request(format!("Unsupported action: {}", other))),
        }
    }

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut ResultHandler<'_>,
    ) -> Result<QueryResponse, ResourceError> {
        self.begin(context, "query", &request.resource_path)?;

        if request.query_expression.is_some() {
            return Err(ResourceError::bad_request("Native query expressions are not supported"));
        }
        let filter = match (&request.query_filter, &request.query_id) {
            (Some(filter), _) => filter.clone(),
            (None, Some(query_id)) => {
                return Err(ResourceError::bad_request(format!("Unresolved query id: {}", query_id)))
            }
            (None, None) => QueryFilter::always_true(),
        };

        // Snapshot matches so no lock is held while the caller consumes results
        let mut matched: Vec<(Value, ResourceResponse)> = {
            let collections = self.collections.read().await;
            Self::subtree(&collections, &request.resource_path)
                .into_iter()
                .map(|(id, entry)| (entry.document(id), entry.response(id)))
                .filter(|(doc, _)| filter.matches(doc))
                .collect()
        };

        if !request.sort_keys.is_empty() {
            matched.sort_by(|(a, _), (b, _)| FilterOrder::compare(&request.sort_keys, a, b));
        }

        let total = matched.len();
        let offset = request.paged_results_offset.unwrap_or(0).max(0) as usize;
        let page_size = request.page_size.filter(|size| *size > 0).map(|size| size as usize);
        let end = page_size.map_or(total, |size| offset.saturating_add(size).min(total));

        let mut delivered = 0;
        for (_, mut response) in matched.into_iter().take(end).skip(offset) {
            response.content = select_fields(&response.content, &request.fields);
            delivered += 1;
            if !handler(response) {
                break;
            }
        }
        debug!("Query on {} matched {} and delivered {}", request.resource_path, total, delivered);

        let remaining = total.saturating_sub(end);
        Ok(match page_size {
            Some(_) => QueryResponse {
                paged_results_cookie: (remaining > 0).then(|| end.to_string()),
                total_paged_results: total as i64,
                remaining_paged_results: remaining as i64,
            },
            None => QueryResponse {
                total_paged_results: total as i64,
                ..QueryResponse::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::connection::{ConnectionFactory, LocalConnectionFactory};
    use crate::filter::{FilterOp, SortKey};
    use std::sync::Arc;

    fn bound_context() -> Context {
        let factory = LocalConnectionFactory::new();
        Context::root().with_connection(factory.get_connection().unwrap())
    }

    async fn query_all(backend: &MemoryBackend, context: &Context, request: QueryRequest) -> (Vec<ResourceResponse>, QueryResponse) {
        let mut results = Vec::new();
        let response = backend
            .handle_query(context, request, &mut |r: ResourceResponse| {
                results.push(r);
                true
            })
            .await
            .unwrap();
        (results, response)
    }

    #[tokio::test]
    async fn requires_bound_connection() {
        let backend = MemoryBackend::new();
        let err = backend
            .handle_create(&Context::root(), CreateRequest::new("repo/x", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);

        let factory = LocalConnectionFactory::new();
        let connection = factory.get_connection().unwrap();
        connection.close();
        let closed = Context::root().with_connection(Arc::clone(&connection));
        assert!(backend.handle_create(&closed, CreateRequest::new("repo/x", json!({}))).await.is_err());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn create_read_update_delete() {
        let backend = MemoryBackend::new();
        let ctx = bound_context();

        let created = backend
            .handle_create(&ctx, CreateRequest::new("repo/x", json!({"_id": "a1", "name": "alice"})))
            .await
            .unwrap();
        assert_eq!(created.id.as_deref(), Some("a1"));
        assert_eq!(created.revision.as_deref(), Some("1"));
        assert_eq!(created.content, json!({"name": "alice"}));

        let dup = backend
            .handle_create(&ctx, CreateRequest::new("repo/x", json!({})).with_id("a1"))
            .await
            .unwrap_err();
        assert_eq!(dup.status_code(), 409);

        let stale = backend
            .handle_update(&ctx, UpdateRequest::new("repo/x/a1", json!({"name": "bob"})).with_revision("7"))
            .await
            .unwrap_err();
        assert_eq!(stale.status_code(), 412);

        let updated = backend
            .handle_update(&ctx, UpdateRequest::new("repo/x/a1", json!({"name": "bob"})).with_revision("1"))
            .await
            .unwrap();
        assert_eq!(updated.revision.as_deref(), Some("2"));

        let read = backend.handle_read(&ctx, ReadRequest::new("repo/x/a1")).await.unwrap();
        assert_eq!(read.content, json!({"name": "bob"}));

        backend.handle_delete(&ctx, DeleteRequest::new("repo/x/a1")).await.unwrap();
        let gone = backend.handle_read(&ctx, ReadRequest::new("repo/x/a1")).await.unwrap_err();
        assert!(gone.is_not_found());
    }

    #[tokio::test]
    async fn patch_operations() {
        let backend = MemoryBackend::new();
        let ctx = bound_context();
        backend
            .handle_create(&ctx, CreateRequest::new("repo/x", json!({"n": 1, "tags": ["a"], "old": true})).with_id("p"))
            .await
            .unwrap();

        let patched = backend
            .handle_patch(
                &ctx,
                PatchRequest::new(
                    "repo/x/p",
                    vec![
                        PatchOperation::new(PatchOp::Increment, "n", json!(2)),
                        PatchOperation::new(PatchOp::Add, "tags", json!("b")),
                        PatchOperation::new(PatchOp::Remove, "old", Value::Null),
                        PatchOperation::new(PatchOp::Replace, "address/city", json!("Oslo")),
                    ],
                ),
            )
            .await
            .unwrap();
        assert_eq!(
            patched.content,
            json!({"n": 3, "tags": ["a", "b"], "address": {"city": "Oslo"}})
        );

        let bad = backend
            .handle_patch(
                &ctx,
                PatchRequest::new("repo/x/p", vec![PatchOperation::new(PatchOp::Increment, "tags", json!(1))]),
            )
            .await
            .unwrap_err();
        assert_eq!(bad.status_code(), 400);
    }

    #[tokio::test]
    async fn query_filters_sorts_and_pages() {
        let backend = MemoryBackend::new();
        let ctx = bound_context();
        for (id, age) in [("a", 30), ("b", 20), ("c", 40), ("d", 10)] {
            backend
                .handle_create(&ctx, CreateRequest::new("repo/x", json!({"age": age, "name": id})).with_id(id))
                .await
                .unwrap();
        }

        let mut request = QueryRequest::new("repo/x")
            .with_filter(QueryFilter::comparison("age", FilterOp::Gte, 20))
            .with_fields(["name"]);
        request.sort_keys = vec![SortKey::descending("age")];
        request.page_size = Some(2);

        let (results, response) = query_all(&backend, &ctx, request.clone()).await;
        let ids: Vec<_> = results.iter().filter_map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(results[0].content, json!({"name": "c"}));
        assert_eq!(response.total_paged_results, 3);
        assert_eq!(response.remaining_paged_results, 1);
        assert_eq!(response.paged_results_cookie.as_deref(), Some("2"));

        request.paged_results_offset = Some(2);
        let (results, response) = query_all(&backend, &ctx, request).await;
        assert_eq!(results.len(), 1);
        assert_eq!(response.paged_results_cookie, None);

        let by_id = QueryRequest::new("repo/x").with_filter(QueryFilter::equal_to("_id", "d"));
        let (results, _) = query_all(&backend, &ctx, by_id).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn query_stops_when_handler_declines() {
        let backend = MemoryBackend::new();
        let ctx = bound_context();
        for id in ["a", "b", "c"] {
            backend
                .handle_create(&ctx, CreateRequest::new("repo/x", json!({})).with_id(id))
                .await
                .unwrap();
        }
        let mut seen = 0;
        backend
            .handle_query(&ctx, QueryRequest::new("repo/x").with_filter(QueryFilter::always_true()), &mut |_: ResourceResponse| {
                seen += 1;
                false
            })
            .await
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn queries_search_the_subtree() {
        let backend = MemoryBackend::new();
        let ctx = bound_context();
        for (collection, id) in [("repo/x/user", "a"), ("repo/x/group", "a"), ("repo/y", "b")] {
            backend
                .handle_create(&ctx, CreateRequest::new(collection, json!({})).with_id(id))
                .await
                .unwrap();
        }

        let (results, _) = query_all(&backend, &ctx, QueryRequest::new("repo/x")).await;
        assert_eq!(results.len(), 2);
        let (results, _) = query_all(&backend, &ctx, QueryRequest::new("repo/x/user")).await;
        assert_eq!(results.len(), 1);

        let count = backend.handle_action(&ctx, ActionRequest::new("repo", "count")).await.unwrap();
        assert_eq!(count.content, json!({"count": 3}));
    }

    #[tokio::test]
    async fn actions() {
        let backend = MemoryBackend::new();
        let ctx = bound_context();
        backend
            .handle_create(&ctx, CreateRequest::new("repo/x", json!({})))
            .await
            .unwrap();
        let count = backend.handle_action(&ctx, ActionRequest::new("repo/x", "count")).await.unwrap();
        assert_eq!(count.content, json!({"count": 1}));
        let echo = backend
            .handle_action(&ctx, ActionRequest::new("repo/x", "echo").with_content(json!({"hi": 1})))
            .await
            .unwrap();
        assert_eq!(echo.content, json!({"hi": 1}));
        assert!(backend.handle_action(&ctx, ActionRequest::new("repo/x", "explode")).await.is_err());
    }
}
