#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use generic_session::{
    compose, into_handler, ConnectivityListener, CookieOptions, GenericBody, GenericBodyExt,
    IdGenerator, Key, MemoryStore, Middleware, MiddlewareNext, RequestHandler, RequestHead,
    SaveOutcome, Session, SessionError, SessionIdOverride, SessionMiddleware, SessionOptions,
    SessionRequestExt, SessionResult, SessionStore, StoreError, StoreOperation,
};
use http::{
    header::{COOKIE, SET_COOKIE},
    Request, Response, StatusCode,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const COOKIE_NAME: &str = "gs.test_sid";
pub const SESSION_PATH: &str = "/session";
pub const PREFIX: &str = "gs:test:";
pub const RECONNECT_TIMEOUT: Duration = Duration::from_millis(100);

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Backend wrapping a [`MemoryStore`] that counts calls, can be told to
/// fail, and can fake connectivity changes.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    destroys: AtomicUsize,
    failures: Mutex<HashMap<StoreOperation, StoreError>>,
    listener: Mutex<Option<ConnectivityListener>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, operation: StoreOperation, err: StoreError) {
        self.failures.lock().unwrap().insert(operation, err);
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn connect(&self) {
        if let Some(listener) = self.listener.lock().unwrap().as_ref() {
            listener.connect();
        }
    }

    pub fn disconnect(&self) {
        if let Some(listener) = self.listener.lock().unwrap().as_ref() {
            listener.disconnect();
        }
    }

    /// Raw record stored for `sid`, read without counting.
    pub async fn record(&self, sid: &str) -> Option<Value> {
        self.inner
            .get(&format!("{PREFIX}{sid}"))
            .await
            .ok()
            .flatten()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    fn injected(&self, operation: StoreOperation) -> Option<StoreError> {
        self.failures.lock().unwrap().get(&operation).cloned()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected(StoreOperation::Get) {
            return Err(err);
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected(StoreOperation::Set) {
            return Err(err);
        }
        self.inner.set(key, value, ttl).await
    }

    async fn destroy(&self, key: &str) -> Result<(), StoreError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected(StoreOperation::Destroy) {
            return Err(err);
        }
        self.inner.destroy(key).await
    }

    fn watch_connectivity(&self, listener: ConnectivityListener) {
        *self.listener.lock().unwrap() = Some(listener);
    }
}

/// Hands out `sid-1`, `sid-2`, ...
#[derive(Default)]
pub struct SequenceIdGenerator {
    generated: AtomicUsize,
}

impl<T> IdGenerator<T> for SequenceIdGenerator
where
    T: From<String>,
{
    fn generate(&self) -> T {
        let n = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
        T::from(format!("sid-{n}"))
    }
}

/// Moves a `force_session_id` query parameter into a [`SessionIdOverride`].
pub struct ForceSessionId;

#[async_trait]
impl Middleware for ForceSessionId {
    async fn handle<'req>(
        &self,
        mut req: Request<&'req str>,
        next: MiddlewareNext,
    ) -> SessionResult<Response<GenericBody>> {
        if let Some(sid) = RequestHead::from_request(&req).query_param("force_session_id") {
            req.extensions_mut().insert(SessionIdOverride(sid));
        }
        next(req).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
    pub set_cookies: Vec<String>,
    pub error: Option<SessionError>,
}

impl TestResponse {
    /// The `Set-Cookie` header of the session cookie.
    pub fn session_set_cookie(&self) -> Option<&str> {
        self.set_cookies
            .iter()
            .map(String::as_str)
            .find(|header| header.starts_with(&format!("{COOKIE_NAME}=")))
    }

    /// `name=value` of the session cookie, ready to be sent back.
    pub fn session_cookie(&self) -> Option<String> {
        let pair = self.session_set_cookie()?.split(';').next()?.to_string();
        (pair.len() > COOKIE_NAME.len() + 1).then_some(pair)
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}

pub struct TestApp {
    pub handler: RequestHandler,
    pub store: Arc<RecordingStore>,
}

/// Options every test app starts from.
pub fn base_options(store: Arc<RecordingStore>) -> SessionOptions {
    SessionOptions::default()
        .with_key(COOKIE_NAME)
        .with_prefix(PREFIX)
        .with_ttl(Duration::from_secs(1))
        .with_cookie(
            CookieOptions::default()
                .with_path(SESSION_PATH)
                .with_max_age(Some(86_400)),
        )
        .with_store(store)
        .with_signing_key(Key::generate())
        .with_reconnect_timeout(RECONNECT_TIMEOUT)
        .with_before_save(|head: &RequestHead, session: &mut Session| {
            session.insert_value("path", Value::from(head.path()));
        })
        .with_valid(|head: &RequestHead, _: &Session| {
            head.query_param("valid").as_deref() != Some("false")
        })
}

impl TestApp {
    pub fn new<F>(configure: F) -> Self
    where
        F: FnOnce(SessionOptions) -> SessionOptions,
    {
        init_tracing();
        let store = RecordingStore::new();
        let options = configure(base_options(store.clone()));

        // a second session middleware on the same chain must be ignored
        let repeated = SessionOptions::default()
            .with_key(COOKIE_NAME)
            .with_cookie(
                CookieOptions::default()
                    .with_path(SESSION_PATH)
                    .with_signed(false),
            );

        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(ForceSessionId),
            Arc::new(SessionMiddleware::new(options).unwrap()),
            Arc::new(SessionMiddleware::new(repeated).unwrap()),
        ];
        let handler = compose(&middlewares, controllers());
        Self { handler, store }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let req = builder.body("").unwrap();

        match (self.handler)(req).await {
            Ok(res) => {
                let status = res.status();
                let set_cookies = res
                    .headers()
                    .get_all(SET_COOKIE)
                    .iter()
                    .map(|value| value.to_str().unwrap().to_string())
                    .collect();
                let bytes = res.into_body().collect().await.unwrap().to_bytes();
                TestResponse {
                    status,
                    body: String::from_utf8(bytes.to_vec()).unwrap(),
                    set_cookies,
                    error: None,
                }
            }
            Err(err) => TestResponse {
                status: err.status_code(),
                body: err.to_string(),
                set_cookies: vec![],
                error: Some(err),
            },
        }
    }
}

fn text(body: impl Into<String>) -> SessionResult<Response<GenericBody>> {
    Ok(Response::new(GenericBody::from_string(body.into())))
}

pub fn controllers() -> RequestHandler {
    into_handler(|req| Box::pin(route(req)))
}

async fn route(req: Request<&str>) -> SessionResult<Response<GenericBody>> {
    let path = req.uri().path().to_string();
    let Some(ctx) = req.session_context() else {
        return text("no session");
    };

    match path.as_str() {
        "/session/get" => {
            let mut guard = ctx.session().await?;
            let Some(session) = guard.as_mut() else {
                return text("no session");
            };
            let count = session.get::<i64>("count").unwrap_or(0) + 1;
            session.insert("count", count)?;
            text(count.to_string())
        }
        "/session/nothing" => {
            let guard = ctx.session().await?;
            let count = guard.as_ref().and_then(|session| session.get::<i64>("count"));
            text(count.map(|c| c.to_string()).unwrap_or_default())
        }
        "/session/notuse" => text("not touch session"),
        "/session/remove" => {
            ctx.set_session(None).await;
            text("0")
        }
        "/session/rewrite" => {
            let mut session = Session::new(
                CookieOptions::default()
                    .with_path(SESSION_PATH)
                    .with_max_age(Some(86_400)),
            );
            session.insert("foo", "bar")?;
            ctx.set_session(Some(session)).await;
            text("foo=bar")
        }
        "/session/httponly" => {
            let mut guard = ctx.session().await?;
            let Some(session) = guard.as_mut() else {
                return text("no session");
            };
            session.cookie.http_only = !session.cookie.http_only;
            text(format!("httpOnly: {}", session.cookie.http_only))
        }
        "/session/id" => text(ctx.session_id().unwrap_or_default()),
        "/session/regenerate" => {
            {
                let mut guard = ctx.regenerate_session().await?;
                if let Some(session) = guard.as_mut() {
                    session.insert("data", "foo")?;
                }
            }
            text(ctx.session_id().unwrap_or_default())
        }
        "/session/guarded_id" => {
            let mut guard = ctx.session().await?;
            if let Some(session) = guard.as_mut() {
                session.insert("guarded", true)?;
            }
            ctx.set_session_save(Some(true));
            text(format!(
                "{}, {}, {:?}",
                ctx.session_id().unwrap_or_default(),
                ctx.is_new(),
                ctx.session_save()
            ))
        }
        "/session/regenerate_twice" => {
            let mut ids = Vec::new();
            for _ in 0..2 {
                let mut guard = ctx.regenerate_session().await?;
                if let Some(session) = guard.as_mut() {
                    session.insert("data", "foo")?;
                }
                drop(guard);
                ids.push(ctx.session_id().unwrap_or_default());
            }
            text(ids.join(","))
        }
        "/session/regenerate_with_data" => {
            if let Some(session) = ctx.session().await?.as_mut() {
                session.insert("foo", "bar")?;
            }
            let guard = ctx.regenerate_session().await?;
            let foo = guard.as_ref().and_then(|session| session.get::<String>("foo"));
            text(format!("foo: {foo:?}, has session: {}", guard.is_some()))
        }
        "/session/save_now" => {
            if let Some(session) = ctx.session().await?.as_mut() {
                session.insert("early", true)?;
            }
            let outcome = ctx.save_session().await?;
            text(format!("{outcome:?}"))
        }
        "/session/fail" => {
            if let Some(session) = ctx.session().await?.as_mut() {
                session.insert("failed", true)?;
            }
            Err(SessionError::HttpError("handler failed".into()))
        }
        "/session/read" | "/session/read/force" => {
            if path.ends_with("/force") {
                ctx.set_session_save(Some(true));
            }
            let mut guard = ctx.session().await?;
            let Some(session) = guard.as_mut() else {
                return text("no session");
            };
            let count = session.get::<i64>("count").unwrap_or(0);
            session.insert("count", count)?;
            text(format!("{count}, {:?}", ctx.session_save()))
        }
        "/session/update" | "/session/update/prevent" => {
            if path.ends_with("/prevent") {
                ctx.set_session_save(Some(false));
            }
            let mut guard = ctx.session().await?;
            let Some(session) = guard.as_mut() else {
                return text("no session");
            };
            let count = session.get::<i64>("count").unwrap_or(0) + 1;
            session.insert("count", count)?;
            text(format!("{count}, {:?}", ctx.session_save()))
        }
        "/session/remove/prevent" | "/session/remove/force" => {
            let save = path.ends_with("/force");
            ctx.set_session_save(Some(save));
            ctx.set_session(None).await;
            text(format!("0, {:?}", ctx.session_save()))
        }
        _ => text("has session"),
    }
}

/// Expected body of a save_now request.
pub fn outcome_body(outcome: SaveOutcome) -> String {
    format!("{outcome:?}")
}
