pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod normalize;
pub mod pointer;
pub mod types;

pub use error::FilterError;
pub use filter_order::FilterOrder;
pub use filter_where::FilterWhere;
pub use normalize::{normalize, normalize_query_request};
pub use pointer::JsonPointer;
pub use types::*;
