// Request/response model shared by the router, the type handlers and the backend
pub mod context;
pub mod path;
pub mod request;
pub mod response;

pub use context::Context;
pub use path::ResourcePath;
pub use request::*;
pub use response::*;
