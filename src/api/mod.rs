//! HTTP API: router, middleware, endpoint handlers, and the JSON
//! envelope types they share.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use types::{ApiContext, AuthContext};
