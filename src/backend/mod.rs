// Backend contract (connections and request handler) plus the in-memory store
pub mod connection;
pub mod handler;
pub mod memory;

pub use connection::{BackendError, Connection, ConnectionFactory, ConnectionStats, LocalConnectionFactory};
pub use handler::{RequestHandler, ResultHandler};
pub use memory::MemoryBackend;
