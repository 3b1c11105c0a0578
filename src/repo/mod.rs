// Type handlers, their registry, connection scoping and the repository router
pub mod explicit;
pub mod generic;
pub mod handler;
pub mod registry;
pub mod scope;
pub mod service;

pub use explicit::ExplicitHandler;
pub use generic::GenericHandler;
pub use handler::TypeHandler;
pub use registry::TypeHandlerRegistry;
pub use scope::ConnectionScope;
pub use service::RepositoryService;
