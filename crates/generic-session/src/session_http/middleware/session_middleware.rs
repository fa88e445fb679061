use std::sync::Arc;

use async_trait::async_trait;
use http::{Request, Response};

use crate::{
    error::SessionResult,
    lifecycle::SessionManager,
    options::SessionOptions,
    session_http::{
        context::{RequestHead, SessionContext, SessionIdOverride},
        types::GenericBody,
        Middleware, MiddlewareNext,
    },
};

/// Attaches a [`SessionContext`] to every request under the cookie path and
/// persists the session once the rest of the chain has run.
pub struct SessionMiddleware {
    manager: Arc<SessionManager>,
}

impl SessionMiddleware {
    pub fn new(options: SessionOptions) -> SessionResult<Self> {
        Ok(Self::from_manager(Arc::new(SessionManager::new(options)?)))
    }

    pub fn from_manager(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> Arc<SessionManager> {
        Arc::clone(&self.manager)
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle<'req>(
        &self,
        mut req: Request<&'req str>,
        next: MiddlewareNext,
    ) -> SessionResult<Response<GenericBody>> {
        if req.extensions().get::<SessionContext>().is_some() {
            tracing::debug!("session already attached, skipping");
            return next(req).await;
        }

        let head = RequestHead::from_request(&req);
        if !self.manager.match_path(head.path()) {
            return next(req).await;
        }

        let forced_id = req
            .extensions()
            .get::<SessionIdOverride>()
            .map(|forced| forced.0.clone());
        let context = SessionContext::new(Arc::clone(&self.manager), head, forced_id);

        if !self.manager.defer() {
            context.load().await?;
        }
        req.extensions_mut().insert(context.clone());

        let result = next(req).await;
        let saved = context.commit().await;

        match (result, saved) {
            (Ok(mut response), Ok(outcome)) => {
                tracing::debug!("session refresh: {outcome:?}");
                context.apply_cookies(response.headers_mut()).await;
                Ok(response)
            }
            (Ok(_), Err(save_err)) => Err(save_err),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(save_err)) => {
                tracing::error!("session save failed after request error ({err}): {save_err}");
                Err(err)
            }
        }
    }
}
