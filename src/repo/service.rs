use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use super::registry::TypeHandlerRegistry;
use super::scope::ConnectionScope;
use crate::backend::{ConnectionFactory, ResultHandler};
use crate::error::ResourceError;
use crate::resource::{
    ActionRequest, ActionResponse, Context, CreateRequest, DeleteRequest, PatchRequest, QueryRequest, QueryResponse,
    ReadRequest, ResourcePath, ResourceResponse, UpdateRequest,
};

/// Entry point of the repository: every operation runs inside its own
/// connection scope and is forwarded to the type handler for its path.
#[derive(Clone)]
pub struct RepositoryService {
    registry: Arc<TypeHandlerRegistry>,
    connections: Arc<dyn ConnectionFactory>,
    runtime: Option<Handle>,
}

impl RepositoryService {
    pub fn new(registry: Arc<TypeHandlerRegistry>, connections: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            registry,
            connections,
            runtime: None,
        }
    }

    /// Runtime used by the blocking methods; defaults to the current runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn registry(&self) -> &Arc<TypeHandlerRegistry> {
        &self.registry
    }

    /// Run `operation` with a context bound to a fresh connection. The
    /// connection is released when the operation completes or is dropped.
    pub async fn with_connection_context<R, F, Fut>(&self, context: &Context, operation: F) -> Result<R, ResourceError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<R, ResourceError>>,
    {
        let scope = ConnectionScope::open(self.connections.as_ref(), context)?;
        let result = operation(scope.context().clone()).await;
        scope.release();
        result
    }

    fn type_path_of_instance(path: &ResourcePath) -> ResourcePath {
        path.parent().unwrap_or_default()
    }

    pub async fn handle_create(&self, context: &Context, request: CreateRequest) -> Result<ResourceResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let handler = self.registry.resolve(&request.resource_path);
            handler.handle_create(&ctx, request).await
        })
        .await
    }

    pub async fn handle_read(&self, context: &Context, request: ReadRequest) -> Result<ResourceResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let handler = self.registry.resolve(&Self::type_path_of_instance(&request.resource_path));
            handler.handle_read(&ctx, request).await
        })
        .await
    }

    pub async fn handle_update(&self, context: &Context, request: UpdateRequest) -> Result<ResourceResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let handler = self.registry.resolve(&Self::type_path_of_instance(&request.resource_path));
            handler.handle_update(&ctx, request).await
        })
        .await
    }

    pub async fn handle_patch(&self, context: &Context, request: PatchRequest) -> Result<ResourceResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let handler = self.registry.resolve(&Self::type_path_of_instance(&request.resource_path));
            handler.handle_patch(&ctx, request).await
        })
        .await
    }

    pub async fn handle_delete(&self, context: &Context, request: DeleteRequest) -> Result<ResourceResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let handler = self.registry.resolve(&Self::type_path_of_instance(&request.resource_path));
            handler.handle_delete(&ctx, request).await
        })
        .await
    }

    pub async fn handle_action(&self, context: &Context, request: ActionRequest) -> Result<ActionResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let handler = self.registry.resolve(&request.resource_path);
            handler.handle_action(&ctx, request).await
        })
        .await
    }

    pub async fn handle_query(
        &self,
        context: &Context,
        request: QueryRequest,
        handler: &mut ResultHandler<'_>,
    ) -> Result<QueryResponse, ResourceError> {
        self.with_connection_context(context, |ctx| async move {
            let type_handler = self.registry.resolve(&request.resource_path);
            type_handler.handle_query(&ctx, request, handler).await
        })
        .await
    }

    /// Run a request future to completion from synchronous code.
    fn block_on<R, Fut>(&self, operation: &str, future: Fut) -> Result<R, ResourceError>
    where
        R: Send + 'static,
        Fut: Future<Output = Result<R, ResourceError>> + Send + 'static,
    {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| {
                warn!("Blocking {} called without an async runtime", operation);
                ResourceError::internal(format!("No async runtime available for {}", operation))
            })?,
        };
        // Parking the only thread of a current-thread runtime never returns.
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            warn!("Blocking {} called on a current-thread runtime", operation);
            return Err(ResourceError::internal(format!(
                "{} cannot block on a current-thread runtime",
                operation
            )));
        }
        debug!("Blocking on {}", operation);
        futures::executor::block_on(runtime.spawn(future)).map_err(|e| {
            warn!("Blocking {} interrupted: {}", operation, e);
            ResourceError::internal(format!("{} interrupted: {}", operation, e))
        })?
    }

    pub fn create(&self, context: &Context, request: CreateRequest) -> Result<ResourceResponse, ResourceError> {
        let (service, context) = (self.clone(), context.clone());
        self.block_on("create", async move { service.handle_create(&context, request).await })
    }

    pub fn read(&self, context: &Context, request: ReadRequest) -> Result<ResourceResponse, ResourceError> {
        let (service, context) = (self.clone(), context.clone());
        self.block_on("read", async move { service.handle_read(&context, request).await })
    }

    pub fn update(&self, context: &Context, request: UpdateRequest) -> Result<ResourceResponse, ResourceError> {
        let (service, context) = (self.clone(), context.clone());
        self.block_on("update", async move { service.handle_update(&context, request).await })
    }

    pub fn delete(&self, context: &Context, request: DeleteRequest) -> Result<ResourceResponse, ResourceError> {
        let (service, context) = (self.clone(), context.clone());
        self.block_on("delete", async move { service.handle_delete(&context, request).await })
    }

    /// Collects every streamed result.
    pub fn query(&self, context: &Context, request: QueryRequest) -> Result<Vec<ResourceResponse>, ResourceError> {
        let (service, context) = (self.clone(), context.clone());
        self.block_on("query", async move {
            let mut results = Vec::new();
            service
                .handle_query(&context, request, &mut |response: ResourceResponse| {
                    results.push(response);
                    true
                })
                .await?;
            Ok(results)
        })
    }
}
