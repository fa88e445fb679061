//! Request/response logging for the middleware chain.
use crate::{
    error::SessionResult,
    session_http::{types::GenericBody, Middleware, MiddlewareNext},
};
use async_trait::async_trait;
use http::{Request, Response};
use tokio::time::Instant;

/// Logs method, URI, response status and latency at `info` level.
/// Failures are logged at `warn` and passed on untouched.
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle<'req>(
        &self,
        req: Request<&'req str>,
        next: MiddlewareNext,
    ) -> SessionResult<Response<GenericBody>> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let started = Instant::now();
        tracing::info!("Request: {method} {uri}");

        match next(req).await {
            Ok(res) => {
                tracing::info!(
                    "Response: {} {method} {uri} in {:?}",
                    res.status(),
                    started.elapsed()
                );
                Ok(res)
            }
            Err(err) => {
                tracing::warn!("Request {method} {uri} failed: {err}");
                Err(err)
            }
        }
    }
}
