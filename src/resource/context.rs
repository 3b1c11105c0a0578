use std::sync::Arc;

use uuid::Uuid;

use crate::backend::connection::Connection;

/// Ambient call context passed alongside every request.
///
/// Carries caller identity and a trace id. While a request is being served it
/// also carries the backend connection bound by the connection scope.
#[derive(Debug, Clone)]
pub struct Context {
    caller: Option<String>,
    trace_id: String,
    connection: Option<Arc<dyn Connection>>,
}

impl Context {
    /// Context for internal callers with no identity of their own.
    pub fn root() -> Self {
        Self {
            caller: None,
            trace_id: Uuid::new_v4().to_string(),
            connection: None,
        }
    }

    pub fn for_caller(caller: impl Into<String>) -> Self {
        Self {
            caller: Some(caller.into()),
            ..Self::root()
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Chain a child context that carries `connection`.
    pub fn with_connection(&self, connection: Arc<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
            ..self.clone()
        }
    }

    pub fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.connection.as_ref()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::root()
    }
}
