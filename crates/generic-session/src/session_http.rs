mod context;
pub mod middleware;
mod types;

pub use context::*;
pub use middleware::{compose, logging_middleware::LoggingMiddleware, Middleware, SessionMiddleware};
pub use types::*;
