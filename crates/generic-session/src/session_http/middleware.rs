pub mod logging_middleware;
mod session_middleware;

use super::types::{into_handler, GenericBody, MiddlewareNext, RequestHandler};
use crate::error::SessionResult;
use http::{Request, Response};
pub use session_middleware::*;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle<'req>(
        &self,
        req: Request<&'req str>,
        next: MiddlewareNext,
    ) -> SessionResult<Response<GenericBody>>;
}

/// Build the final handler by folding the middlewares **in reverse**,
/// so the first middleware in `middlewares` is the outermost one.
pub fn compose<'a, I>(middlewares: I, final_handler: RequestHandler) -> RequestHandler
where
    I: IntoIterator<Item = &'a Arc<dyn Middleware>>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut handler = final_handler;

    for mw in middlewares.into_iter().rev() {
        let mw = Arc::clone(mw);
        let next = handler;

        handler = into_handler(move |req| {
            let mw = Arc::clone(&mw);
            let next = Arc::clone(&next);
            Box::pin(async move { mw.handle(req, next).await })
        });
    }

    handler
}
