//! Store-agnostic session middleware.
//!
//! [`SessionMiddleware`] gives every request under the configured cookie
//! path a [`SessionContext`]: a session id carried by a (signed) cookie and
//! a JSON session loaded from a pluggable [`SessionStore`]. Once the rest of
//! the chain has run, the session is written back only if it changed (or
//! `rolling` is on), destroyed if a handler set it to `None`, and the cookie
//! is updated accordingly.
//!
//! ```ignore
//! let sessions = SessionMiddleware::new(
//!     SessionOptions::default()
//!         .with_store(Arc::new(MemoryStore::new()))
//!         .with_signing_key(Key::generate()),
//! )?;
//! let middlewares: Vec<Arc<dyn Middleware>> = vec![Arc::new(sessions)];
//! let handler = compose(&middlewares, into_handler(|req| Box::pin(controllers(req))));
//! ```
//!
//! With `defer` on, nothing is loaded until a handler calls
//! [`SessionContext::session`], and requests that never touch the session
//! never reach the store.
mod cookie_id_store;
pub mod error;
pub mod id_generator;
mod lifecycle;
mod options;
mod session;
pub mod session_http;
mod session_traits;
mod store;

pub use cookie::Key;
pub use cookie_id_store::*;
pub use error::{SessionError, SessionResult, StoreError, StoreOperation};
pub use lifecycle::{SaveOutcome, SessionManager};
pub use options::*;
pub use session::*;
pub use session_http::{
    compose, into_handler, GenericBody, GenericBodyExt, LoggingMiddleware, Middleware,
    MiddlewareNext, RequestHandler, RequestHead, SessionContext, SessionGuard, SessionIdOverride,
    SessionMiddleware, SessionRequestExt,
};
pub use session_traits::*;
pub use store::*;
