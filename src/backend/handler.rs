use async_trait::async_trait;

use crate::error::ResourceError;
use crate::resource::{
    ActionRequest, ActionResponse, Context, CreateRequest, DeleteRequest, PatchRequest, QueryRequest,
    QueryResponse, ReadRequest, ResourceResponse, UpdateRequest,
};

/// Receives each streamed query result. Returning `false` stops the query.
pub type ResultHandler<'a> = dyn FnMut(ResourceResponse) -> bool + Send + 'a;

/// Backend request handler. Paths are backend paths (already retargeted by
/// the type handler); the bound connection travels in the `Context`.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_create(&self, context: &Context, request: CreateRequest) -> Result<ResourceResponse, ResourceError>;

    async fn handle_read(&self, context: &Context, request: ReadRequest) -> Result<ResourceResponse, ResourceError>;

    async fn handle_update(&self, context: &Context, request: UpdateRequest) -> Result<ResourceResponse, ResourceError>;

    async fn handle_patch(&self, context: &Context, request: PatchRequest) -> Result<ResourceResponse, ResourceError>;

    async fn handle_delete(&self, context: &Context, request: DeleteRequest) -> Result<ResourceResponse, ResourceError>;

    async fn handle_action(&self, context: &Context, request: ActionRequest) -> Result<ActionResponse, ResourceError>;

    async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut ResultHandler<'_>,
    ) -> Result<QueryResponse, ResourceError>;
}
