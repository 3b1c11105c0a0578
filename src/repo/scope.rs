use std::sync::Arc;

use crate::backend::{Connection, ConnectionFactory};
use crate::error::ResourceError;
use crate::resource::Context;

/// One backend connection bound to one request.
///
/// The connection is closed by [`ConnectionScope::release`] or, if the scope is
/// dropped first (request abandoned, panic), by `Drop`. Either way it is closed
/// exactly once.
pub struct ConnectionScope {
    connection: Option<Arc<dyn Connection>>,
    context: Context,
}

impl ConnectionScope {
    /// Acquire a connection and chain a context carrying it onto `parent`.
    pub fn open(factory: &dyn ConnectionFactory, parent: &Context) -> Result<Self, ResourceError> {
        let connection = factory.get_connection()?;
        Ok(Self {
            context: parent.with_connection(connection.clone()),
            connection: Some(connection),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn release(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalConnectionFactory;

    #[test]
    fn release_closes_once() {
        let factory = LocalConnectionFactory::new();
        let scope = ConnectionScope::open(&factory, &Context::root()).unwrap();
        assert!(scope.context().connection().is_some());
        scope.release();
        assert_eq!(factory.stats().released(), 1);
        assert_eq!(factory.stats().double_releases(), 0);
    }

    #[test]
    fn drop_closes_unreleased_scope() {
        let factory = LocalConnectionFactory::new();
        {
            let _scope = ConnectionScope::open(&factory, &Context::for_caller("alice")).unwrap();
            assert_eq!(factory.stats().open(), 1);
        }
        assert_eq!(factory.stats().open(), 0);
    }

    #[test]
    fn acquisition_failure_is_internal() {
        let factory = LocalConnectionFactory::new();
        factory.fail_acquisitions(true);
        let err = ConnectionScope::open(&factory, &Context::root()).err().unwrap();
        assert_eq!(err.status_code(), 500);
    }
}
