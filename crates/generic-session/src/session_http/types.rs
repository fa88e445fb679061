use crate::error::{SessionError, SessionResult};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use std::sync::Arc;

pub type GenericBody = BoxBody<Bytes, SessionError>;

pub trait GenericBodyExt {
    fn from_string(s: String) -> Self;
    fn empty() -> Self;
}

impl GenericBodyExt for GenericBody {
    fn from_string(s: String) -> Self {
        Full::new(Bytes::from(s))
            .map_err(|err| SessionError::HttpError(err.to_string()))
            .boxed()
    }

    fn empty() -> Self {
        Empty::<Bytes>::new()
            .map_err(|err| SessionError::HttpError(err.to_string()))
            .boxed()
    }
}

pub type BoxFutureResponse<'req> = BoxFuture<'req, SessionResult<Response<GenericBody>>>;

/// A handler function that processes an HTTP request,
/// returning an async response future.
pub type RequestHandlerFn =
    dyn for<'req> Fn(Request<&'req str>) -> BoxFutureResponse<'req> + Send + Sync;

/// A shared, reference-counted request handler.
pub type RequestHandler = Arc<RequestHandlerFn>;

/// The continuation a middleware calls to run the rest of the chain.
pub type MiddlewareNext = RequestHandler;

/// Turns a closure into a [`RequestHandler`].
///
/// ```ignore
/// let handler = into_handler(|req| Box::pin(async move { controllers(req).await }));
/// ```
pub fn into_handler<F>(f: F) -> RequestHandler
where
    F: for<'req> Fn(Request<&'req str>) -> BoxFutureResponse<'req> + Send + Sync + 'static,
{
    Arc::new(f)
}
