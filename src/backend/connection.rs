use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from a connection source
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("Connection unavailable: {0}")]
    Unavailable(String),

    #[error("Connection {0} is closed")]
    Closed(String),
}

/// One backend connection. Owned by a single request and closed exactly once.
pub trait Connection: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Source of backend connections. Acquisition is synchronous and may fail.
pub trait ConnectionFactory: Send + Sync {
    fn get_connection(&self) -> Result<Arc<dyn Connection>, BackendError>;
}

/// Shared counters for connections handed out by a [`LocalConnectionFactory`].
#[derive(Debug, Default)]
pub struct ConnectionStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
    double_releases: AtomicUsize,
    failed: AtomicUsize,
}

impl ConnectionStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn double_releases(&self) -> usize {
        self.double_releases.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Connections acquired but not yet released.
    pub fn open(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// In-process connection source for the in-memory backend.
///
/// Keeps acquire/release counters and can be told to refuse acquisitions.
#[derive(Debug, Default)]
pub struct LocalConnectionFactory {
    stats: Arc<ConnectionStats>,
    sequence: AtomicU64,
    refuse: AtomicBool,
}

impl LocalConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    /// Make subsequent acquisitions fail (or succeed again).
    pub fn fail_acquisitions(&self, fail: bool) {
        self.refuse.store(fail, Ordering::SeqCst);
    }
}

impl ConnectionFactory for LocalConnectionFactory {
    fn get_connection(&self) -> Result<Arc<dyn Connection>, BackendError> {
        if self.refuse.load(Ordering::SeqCst) {
            self.stats.failed.fetch_add(1, Ordering::SeqCst);
            return Err(BackendError::Unavailable("connection source refused acquisition".to_string()));
        }

        let id = format!("local-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        debug!("Acquired connection {}", id);

        Ok(Arc::new(LocalConnection {
            id,
            closed: AtomicBool::new(false),
            stats: self.stats.clone(),
        }))
    }
}

#[derive(Debug)]
struct LocalConnection {
    id: String,
    closed: AtomicBool,
    stats: Arc<ConnectionStats>,
}

impl Connection for LocalConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("Connection {} closed more than once", self.id);
            self.stats.double_releases.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        debug!("Released connection {}", self.id);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_acquire_and_release() {
        let factory = LocalConnectionFactory::new();
        let stats = factory.stats();

        let a = factory.get_connection().unwrap();
        let b = factory.get_connection().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(stats.open(), 2);

        a.close();
        a.close();
        assert!(a.is_closed());
        assert_eq!(stats.released(), 1);
        assert_eq!(stats.double_releases(), 1);
        assert_eq!(stats.open(), 1);
    }

    #[test]
    fn refuses_when_told_to() {
        let factory = LocalConnectionFactory::new();
        factory.fail_acquisitions(true);
        assert!(matches!(factory.get_connection(), Err(BackendError::Unavailable(_))));
        assert_eq!(factory.stats().failed(), 1);
        assert_eq!(factory.stats().acquired(), 0);

        factory.fail_acquisitions(false);
        assert!(factory.get_connection().is_ok());
    }
}
