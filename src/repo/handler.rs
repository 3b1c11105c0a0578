use super::explicit::ExplicitHandler;
use super::generic::GenericHandler;
use crate::backend::ResultHandler;
use crate::error::ResourceError;
use crate::resource::{
    ActionRequest, ActionResponse, Context, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, QueryResponse,
    ReadRequest, ResourcePath, ResourceResponse, UpdateRequest,
};

/// Strategy responsible for one configured type.
pub enum TypeHandler {
    Explicit(ExplicitHandler),
    Generic(GenericHandler),
}

macro_rules! dispatch {
    ($self:ident, $h:ident => $call:expr) => {
        match $self {
            TypeHandler::Explicit($h) => $call,
            TypeHandler::Generic($h) => $call,
        }
    };
}

impl TypeHandler {
    pub fn kind(&self) -> &'static str {
        match self {
            TypeHandler::Explicit(_) => "explicit",
            TypeHandler::Generic(_) => "generic",
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, TypeHandler::Generic(_))
    }

    /// Backend collection this handler writes to.
    pub fn repo_resource(&self) -> &ResourcePath {
        match self {
            TypeHandler::Explicit(h) => h.repo_resource(),
            TypeHandler::Generic(h) => h.explicit().repo_resource(),
        }
    }

    pub async fn handle_create(&self, context: &Context, request: CreateRequest) -> Result<ResourceResponse, ResourceError> {
        dispatch!(self, h => h.handle_create(context, request).await)
    }

    pub async fn handle_read(&self, context: &Context, request: ReadRequest) -> Result<ResourceResponse, ResourceError> {
        dispatch!(self, h => h.handle_read(context, request).await)
    }

    pub async fn handle_update(&self, context: &Context, request: UpdateRequest) -> Result<ResourceResponse, ResourceError> {
        dispatch!(self, h => h.handle_update(context, request).await)
    }

    pub async fn handle_patch(&self, context: &Context, request: PatchRequest) -> Result<ResourceResponse, ResourceError> {
        dispatch!(self, h => h.handle_patch(context, request).await)
    }

    pub async fn handle_delete(&self, context: &Context, request: DeleteRequest) -> Result<ResourceResponse, ResourceError> {
        dispatch!(self, h => h.handle_delete(context, request).await)
    }

    pub async fn handle_action(&self, context: &Context, request: ActionRequest) -> Result<ActionResponse, ResourceError> {
        dispatch!(self, h => h.handle_action(context, request).await)
    }

    pub async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut ResultHandler<'_>,
    ) -> Result<QueryResponse, ResourceError> {
        dispatch!(self, h => h.handle_query(context, request, handler).await)
    }
}

impl std::fmt::Debug for TypeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeHandler::{}({})", self.kind(), self.repo_resource())
    }
}
