use std::sync::Arc;

use http::{HeaderMap, Method, Request, Uri};
use tokio::sync::{watch, MappedMutexGuard, Mutex, MutexGuard};

use crate::{
    cookie_id_store::{apply_cookie_delta, request_cookie_jar},
    error::SessionResult,
    lifecycle::{SaveOutcome, SessionManager, SessionState},
    session::Session,
    store::StoreAdapter,
    SessionId,
};

/// The parts of a request session hooks get to look at.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::new(req.method().clone(), req.uri().clone(), req.headers().clone())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// First value of the query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Request extension forcing the session id of a request.
///
/// Insert it before the session middleware runs; the id is used instead of
/// the one carried by the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdOverride(pub SessionId);

/// Exclusive access to the request's session. `None` means destroyed;
/// assigning `None` destroys the session at the end of the request.
pub type SessionGuard<'a> = MappedMutexGuard<'a, Option<Session>>;

// Readable while a `SessionGuard` is held.
#[derive(Debug, Clone, Default)]
struct SessionMeta {
    session_id: Option<SessionId>,
    is_new: bool,
    save: Option<bool>,
}

struct ContextInner {
    manager: Arc<SessionManager>,
    head: RequestHead,
    state: Mutex<SessionState>,
    meta: watch::Sender<SessionMeta>,
}

/// Per-request session handle, found in the request extensions.
///
/// Cloning is cheap and every clone refers to the same session. The id,
/// `is_new` and the save override stay readable while a guard returned by
/// [`session`](Self::session) is alive; the other async methods wait for
/// that guard to be dropped.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

impl SessionContext {
    pub(crate) fn new(
        manager: Arc<SessionManager>,
        head: RequestHead,
        forced_id: Option<SessionId>,
    ) -> Self {
        let (meta, _) = watch::channel(SessionMeta {
            session_id: forced_id.clone(),
            ..Default::default()
        });
        let state = SessionState {
            jar: request_cookie_jar(head.headers()),
            session_id: forced_id,
            ..Default::default()
        };
        Self {
            inner: Arc::new(ContextInner {
                manager,
                head,
                state: Mutex::new(state),
                meta,
            }),
        }
    }

    // Mirrors the id and `is_new` of `state` into the lock-free cell.
    fn publish(&self, state: &SessionState) {
        self.inner.meta.send_modify(|meta| {
            meta.session_id.clone_from(&state.session_id);
            meta.is_new = state.is_new;
        });
    }

    // The override may have been set while the state lock was held elsewhere.
    fn sync_save(&self, state: &mut SessionState) {
        state.save = self.inner.meta.borrow().save;
    }

    /// Loads the session up front (non-deferred mode).
    pub(crate) async fn load(&self) -> SessionResult<()> {
        let mut state = self.inner.state.lock().await;
        self.inner
            .manager
            .get_session(&self.inner.head, &mut state)
            .await?;
        state.touched = true;
        self.publish(&state);
        Ok(())
    }

    // Loads the session the first time it is read in deferred mode.
    async fn resolve(&self, state: &mut SessionState) -> SessionResult<()> {
        if !state.touched {
            self.inner
                .manager
                .get_session(&self.inner.head, state)
                .await?;
            state.touched = true;
            self.publish(state);
        }
        Ok(())
    }

    /// The session of this request, loading it first if needed.
    pub async fn session(&self) -> SessionResult<SessionGuard<'_>> {
        let mut state = self.inner.state.lock().await;
        self.resolve(&mut state).await?;
        Ok(MutexGuard::map(state, |state| &mut state.session))
    }

    /// Replaces the session without loading it. `None` destroys it.
    pub async fn set_session(&self, session: Option<Session>) {
        let mut state = self.inner.state.lock().await;
        state.touched = true;
        state.session = session;
    }

    /// The id of the session, `None` until it is known.
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.meta.borrow().session_id.clone()
    }

    pub fn session_store(&self) -> Arc<StoreAdapter> {
        self.inner.manager.store()
    }

    pub fn request_head(&self) -> &RequestHead {
        &self.inner.head
    }

    /// `true` if the session was created during this request.
    pub fn is_new(&self) -> bool {
        self.inner.meta.borrow().is_new
    }

    /// The save override: `Some(true)` always saves, `Some(false)` never
    /// saves (nor destroys), `None` saves only when needed.
    pub fn session_save(&self) -> Option<bool> {
        self.inner.meta.borrow().save
    }

    pub fn set_session_save(&self, save: Option<bool>) {
        self.inner.meta.send_modify(|meta| meta.save = save);
    }

    /// Drops the current session, deleting its record, and starts a new
    /// one under a new id.
    pub async fn regenerate_session(&self) -> SessionResult<SessionGuard<'_>> {
        let mut state = self.inner.state.lock().await;
        if !state.loaded {
            state.touched = false;
            self.resolve(&mut state).await?;
        }
        self.inner
            .manager
            .regenerate(&self.inner.head, &mut state)
            .await?;
        self.publish(&state);
        Ok(MutexGuard::map(state, |state| &mut state.session))
    }

    /// Runs the end-of-request refresh right away.
    pub async fn save_session(&self) -> SessionResult<SaveOutcome> {
        let mut state = self.inner.state.lock().await;
        self.resolve(&mut state).await?;
        self.sync_save(&mut state);
        let outcome = self
            .inner
            .manager
            .save_now(&self.inner.head, &mut state)
            .await;
        self.publish(&state);
        outcome
    }

    pub(crate) async fn commit(&self) -> SessionResult<SaveOutcome> {
        let mut state = self.inner.state.lock().await;
        if !state.touched {
            tracing::debug!("session untouched");
            return Ok(SaveOutcome::Skipped);
        }
        self.sync_save(&mut state);
        let outcome = self
            .inner
            .manager
            .refresh_session(&self.inner.head, &mut state)
            .await;
        self.publish(&state);
        outcome
    }

    pub(crate) async fn apply_cookies(&self, headers: &mut HeaderMap) {
        let state = self.inner.state.lock().await;
        apply_cookie_delta(&state.jar, headers);
    }
}

/// Access to the [`SessionContext`] of a request.
pub trait SessionRequestExt {
    /// `None` if no session middleware handled the request, or its path
    /// did not match.
    fn session_context(&self) -> Option<SessionContext>;
}

impl<B> SessionRequestExt for Request<B> {
    fn session_context(&self) -> Option<SessionContext> {
        self.extensions().get::<SessionContext>().cloned()
    }
}
