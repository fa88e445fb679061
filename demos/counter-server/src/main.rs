use std::{net::SocketAddr, sync::Arc};

use axum::{extract::State, response::IntoResponse, Router};
use generic_session::{
    compose, into_handler, CookieOptions, GenericBody, GenericBodyExt, Key, LoggingMiddleware,
    MemoryStore, Middleware, RequestHandler, SessionError, SessionMiddleware, SessionOptions,
    SessionRequestExt, SessionResult,
};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> SessionResult<()> {
    // initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,generic_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // STEP 1: configure the session middleware
    let sessions = SessionMiddleware::new(
        SessionOptions::default()
            .with_store(Arc::new(MemoryStore::new()))
            .with_cookie(CookieOptions::default().with_path("/"))
            .with_signing_key(Key::generate()),
    )?;

    // STEP 2: build the chain, the first middleware runs outermost
    let middlewares: Vec<Arc<dyn Middleware>> =
        vec![Arc::new(LoggingMiddleware), Arc::new(sessions)];
    let handler = compose(&middlewares, into_handler(|req| Box::pin(controllers(req))));

    // STEP 3: serve every path through the chain
    let app = Router::new().fallback(bridge).with_state(handler);
    let addr = SocketAddr::from(([127, 0, 0, 1], 8080));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| SessionError::HttpError(err.to_string()))?;

    tracing::info!("counter server listening on http://{addr} (try /get, /remove, /regenerate)");
    axum::serve(listener, app)
        .await
        .map_err(|err| SessionError::HttpError(err.to_string()))?;

    Ok(())
}

async fn bridge(
    State(handler): State<RequestHandler>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    payload: String,
) -> Result<impl IntoResponse, SessionError> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(payload.as_str())
        .map_err(|err| SessionError::HttpError(err.to_string()))?;
    *request.headers_mut() = headers;

    let generic_res = handler(request).await?;
    let (parts, body) = generic_res.into_parts();
    Ok(axum::response::Response::from_parts(
        parts,
        axum::body::Body::new(body),
    ))
}

fn text(status: StatusCode, body: impl Into<String>) -> SessionResult<Response<GenericBody>> {
    let mut response = Response::new(GenericBody::from_string(body.into()));
    *response.status_mut() = status;
    Ok(response)
}

async fn controllers(req: Request<&str>) -> SessionResult<Response<GenericBody>> {
    let Some(ctx) = req.session_context() else {
        return text(StatusCode::NOT_FOUND, "no session");
    };

    match req.uri().path() {
        "/get" => {
            let mut guard = ctx.session().await?;
            let Some(session) = guard.as_mut() else {
                return text(StatusCode::OK, "session removed");
            };
            let count = session.get::<u64>("count").unwrap_or(0) + 1;
            session.insert("count", count)?;
            text(StatusCode::OK, format!("count: {count}"))
        }
        "/remove" => {
            ctx.set_session(None).await;
            text(StatusCode::OK, "session removed")
        }
        "/regenerate" => {
            {
                let mut guard = ctx.regenerate_session().await?;
                // empty new sessions are never saved
                if let Some(session) = guard.as_mut() {
                    session.insert("count", 0)?;
                }
            }
            let sid = ctx.session_id().unwrap_or_default();
            text(StatusCode::OK, format!("new session: {sid}"))
        }
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}
