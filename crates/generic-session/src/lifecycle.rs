use std::sync::Arc;

use cookie::CookieJar;

use crate::{
    cookie_id_store::CookieSessionIdStore,
    error::{SessionError, SessionResult, StoreError, StoreOperation},
    options::{BeforeSaveFn, ErrorHandler, SessionOptions, ValidFn},
    session::{ContentHash, CookieOptions, Session},
    session_http::RequestHead,
    session_traits::{IdGenerator, SessionIdStore, SessionStore},
    store::{MemoryStore, StoreAdapter, StoreOptions},
    SessionId,
};

const MEMORY_STORE_WARNING: &str = "no session store configured, falling back to MemoryStore. \
It is not designed for a production environment: it never shrinks below its live sessions \
and does not scale past a single process.";

/// What the end-of-request refresh did with the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing written, the cookie is left alone.
    Skipped,
    /// The record was written and the cookie set.
    Saved,
    /// The record was deleted and the cookie cleared.
    Destroyed,
}

/// Working copy of one request's session.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) jar: CookieJar,
    pub(crate) session_id: Option<SessionId>,
    /// `None` once a handler destroyed the session.
    pub(crate) session: Option<Session>,
    pub(crate) is_new: bool,
    pub(crate) original_hash: Option<ContentHash>,
    /// The id has been resolved (eagerly, by a read, or by a regenerate).
    pub(crate) loaded: bool,
    /// The session was read or assigned, so it has to be refreshed.
    pub(crate) touched: bool,
    pub(crate) save: Option<bool>,
}

/// Session lifecycle shared by all requests of one middleware instance.
pub struct SessionManager {
    cookie: CookieOptions,
    defer: bool,
    rolling: bool,
    allow_empty: bool,
    gen_sid: Arc<dyn IdGenerator<SessionId>>,
    error_handler: ErrorHandler,
    valid: Option<ValidFn>,
    before_save: Option<BeforeSaveFn>,
    store: Arc<StoreAdapter>,
    id_store: Arc<dyn SessionIdStore>,
    empty_hash: ContentHash,
}

impl SessionManager {
    pub fn new(options: SessionOptions) -> SessionResult<Self> {
        options.validate()?;

        let SessionOptions {
            key,
            store,
            ttl,
            prefix,
            mut cookie,
            defer,
            rolling,
            allow_empty,
            gen_sid,
            error_handler,
            valid,
            before_save,
            session_id_store,
            reconnect_timeout,
            signing_key,
        } = options;

        cookie.normalize_max_age();

        let backend: Arc<dyn SessionStore> = match store {
            Some(store) => store,
            None => {
                tracing::warn!("{MEMORY_STORE_WARNING}");
                Arc::new(MemoryStore::new())
            }
        };
        let store = Arc::new(StoreAdapter::new(
            backend,
            StoreOptions {
                prefix,
                ttl,
                reconnect_timeout,
            },
        ));

        let id_store: Arc<dyn SessionIdStore> = match session_id_store {
            Some(id_store) => id_store,
            None => Arc::new(CookieSessionIdStore::new(key, &cookie, signing_key)),
        };

        let error_handler: ErrorHandler = match error_handler {
            Some(handler) => handler,
            None => Arc::new(|err: SessionError, _: &RequestHead| -> SessionResult<()> { Err(err) }),
        };

        let empty_hash = Session::new(cookie.clone()).content_hash()?;

        Ok(Self {
            cookie,
            defer,
            rolling,
            allow_empty,
            gen_sid,
            error_handler,
            valid,
            before_save,
            store,
            id_store,
            empty_hash,
        })
    }

    pub fn store(&self) -> Arc<StoreAdapter> {
        Arc::clone(&self.store)
    }

    pub fn id_store(&self) -> Arc<dyn SessionIdStore> {
        Arc::clone(&self.id_store)
    }

    pub fn defer(&self) -> bool {
        self.defer
    }

    pub fn cookie(&self) -> &CookieOptions {
        &self.cookie
    }

    /// `true` if `path` lies under the session cookie's path.
    pub fn match_path(&self, path: &str) -> bool {
        if path.starts_with(&self.cookie.path) {
            return true;
        }
        tracing::debug!("cookie path {} does not match {path}", self.cookie.path);
        false
    }

    /// A new, empty session carrying the configured cookie attributes.
    pub fn generate_session(&self) -> Session {
        Session::new(self.cookie.clone())
    }

    pub fn generate_sid(&self) -> SessionId {
        self.gen_sid.generate()
    }

    fn handle_error(
        &self,
        operation: StoreOperation,
        err: StoreError,
        head: &RequestHead,
    ) -> SessionResult<()> {
        tracing::debug!("{operation} session error: {err}");
        (self.error_handler)(SessionError::store(operation, err), head)
    }

    fn is_valid(&self, head: &RequestHead, session: &Session) -> bool {
        match &self.valid {
            Some(valid) => valid(head, session),
            None => true,
        }
    }

    /// Resolves the session of a request into `state`.
    ///
    /// Waits for the store if it is reconnecting. A missing, unreadable or
    /// rejected record yields a fresh session under a fresh id.
    pub(crate) async fn get_session(
        &self,
        head: &RequestHead,
        state: &mut SessionState,
    ) -> SessionResult<()> {
        self.store.availability().wait_available().await?;

        if state.session_id.is_none() {
            state.session_id = self.id_store.get(head, &state.jar);
        }

        let mut is_new = false;
        let loaded = match state.session_id.clone() {
            None => {
                tracing::debug!("session id not found, generating a new one");
                state.session_id = Some(self.generate_sid());
                is_new = true;
                Some(self.generate_session())
            }
            Some(sid) => match self.store.get(&sid).await {
                Ok(found) => found.filter(|session| {
                    let valid = self.is_valid(head, session);
                    if !valid {
                        tracing::debug!("session {sid} rejected as invalid");
                    }
                    valid
                }),
                Err(err) => {
                    self.handle_error(StoreOperation::Get, err, head)?;
                    None
                }
            },
        };

        let session = match loaded {
            Some(session) => session,
            None => {
                tracing::debug!("session is empty or invalid, starting a new one");
                state.session_id = Some(self.generate_sid());
                self.id_store.reset(&mut state.jar);
                is_new = true;
                self.generate_session()
            }
        };

        state.original_hash = if is_new {
            None
        } else {
            Some(session.content_hash()?)
        };
        state.session = Some(session);
        state.is_new = is_new;
        state.loaded = true;
        Ok(())
    }

    /// Persists, destroys or leaves the session depending on what happened to it.
    pub(crate) async fn refresh_session(
        &self,
        head: &RequestHead,
        state: &mut SessionState,
    ) -> SessionResult<SaveOutcome> {
        if state.save == Some(false) {
            tracing::debug!("session save disabled for this request");
            return Ok(SaveOutcome::Skipped);
        }

        if !state.loaded {
            self.resolve_write_only_sid(head, state);
        }

        let Some(session) = state.session.as_mut() else {
            if state.is_new {
                tracing::debug!("new session set to None, nothing to destroy");
                return Ok(SaveOutcome::Skipped);
            }
            self.id_store.reset(&mut state.jar);
            if let Some(sid) = state.session_id.as_deref() {
                tracing::debug!("session set to None, destroying {sid}");
                if let Err(err) = self.store.destroy(sid).await {
                    self.handle_error(StoreOperation::Destroy, err, head)?;
                }
            }
            return Ok(SaveOutcome::Destroyed);
        };

        if state.save == Some(true) {
            tracing::debug!("session save forced");
        } else {
            let hash = session.content_hash()?;
            if state.is_new && !self.allow_empty && hash == self.empty_hash {
                tracing::debug!("new session was not modified");
                return Ok(SaveOutcome::Skipped);
            }
            if !self.rolling && Some(hash) == state.original_hash {
                tracing::debug!("session not modified");
                return Ok(SaveOutcome::Skipped);
            }
        }

        session.cookie.normalize_max_age();
        if let Some(before_save) = &self.before_save {
            before_save(head, session);
        }

        let sid = match &state.session_id {
            Some(sid) => sid.clone(),
            None => {
                let sid = self.generate_sid();
                state.session_id = Some(sid.clone());
                sid
            }
        };

        match self.store.set(&sid, session).await {
            Ok(()) => {
                self.id_store.set(&mut state.jar, &sid, &session.cookie);
                tracing::debug!("session {sid} saved");
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                self.handle_error(StoreOperation::Set, err, head)?;
                Ok(SaveOutcome::Skipped)
            }
        }
    }

    /// Refreshes right away and moves the baseline so the end-of-request
    /// refresh does not repeat the same write.
    pub(crate) async fn save_now(
        &self,
        head: &RequestHead,
        state: &mut SessionState,
    ) -> SessionResult<SaveOutcome> {
        let outcome = self.refresh_session(head, state).await?;
        match outcome {
            SaveOutcome::Saved => {
                state.original_hash = state
                    .session
                    .as_ref()
                    .map(Session::content_hash)
                    .transpose()?;
                state.is_new = false;
            }
            SaveOutcome::Destroyed => {
                state.session_id = None;
                state.is_new = true;
            }
            SaveOutcome::Skipped => {}
        }
        Ok(outcome)
    }

    /// Drops the current session and starts a new one under a new id.
    pub(crate) async fn regenerate(
        &self,
        head: &RequestHead,
        state: &mut SessionState,
    ) -> SessionResult<()> {
        tracing::debug!("regenerating session");
        if !state.is_new {
            if let Some(sid) = state.session_id.as_deref() {
                tracing::debug!("destroying previous session {sid}");
                if let Err(err) = self.store.destroy(sid).await {
                    self.handle_error(StoreOperation::Destroy, err, head)?;
                }
            }
        }

        let sid = self.generate_sid();
        tracing::debug!("created new session {sid}");
        state.session = Some(self.generate_session());
        state.session_id = Some(sid);
        state.original_hash = None;
        self.id_store.reset(&mut state.jar);
        state.is_new = true;
        state.loaded = true;
        state.touched = true;
        Ok(())
    }

    // The session was assigned but never read: find out which id it belongs to.
    fn resolve_write_only_sid(&self, head: &RequestHead, state: &mut SessionState) {
        if state.session_id.is_none() {
            state.session_id = self.id_store.get(head, &state.jar);
        }
        if state.session_id.is_none() {
            tracing::debug!("no session id to write to, generating a new one");
            state.session_id = Some(self.generate_sid());
            state.is_new = true;
        }
        state.loaded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Uri};

    fn manager(options: SessionOptions) -> SessionManager {
        SessionManager::new(options.with_cookie(CookieOptions::default().with_signed(false)))
            .unwrap()
    }

    fn head(path: &'static str) -> RequestHead {
        RequestHead::new(Method::GET, Uri::from_static(path), HeaderMap::new())
    }

    #[tokio::test]
    async fn new_empty_session_is_not_saved() {
        let manager = manager(SessionOptions::default());
        let mut state = SessionState::default();
        manager.get_session(&head("/"), &mut state).await.unwrap();
        assert!(state.is_new);
        assert!(state.session_id.is_some());

        let outcome = manager.refresh_session(&head("/"), &mut state).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped);
        assert_eq!(state.jar.delta().count(), 0);
    }

    #[tokio::test]
    async fn allow_empty_saves_new_sessions() {
        let manager = manager(SessionOptions::default().with_allow_empty(true));
        let mut state = SessionState::default();
        manager.get_session(&head("/"), &mut state).await.unwrap();

        let outcome = manager.refresh_session(&head("/"), &mut state).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(state.jar.delta().count(), 1);
    }

    #[tokio::test]
    async fn modified_session_is_saved_then_skipped_when_unchanged() {
        let manager = manager(SessionOptions::default());
        let mut state = SessionState::default();
        manager.get_session(&head("/"), &mut state).await.unwrap();
        state.session.as_mut().unwrap().insert("n", 1).unwrap();

        assert_eq!(
            manager.save_now(&head("/"), &mut state).await.unwrap(),
            SaveOutcome::Saved
        );
        assert!(!state.is_new);
        assert_eq!(
            manager.refresh_session(&head("/"), &mut state).await.unwrap(),
            SaveOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn forced_skip_wins_over_destroy() {
        let manager = manager(SessionOptions::default());
        let mut state = SessionState {
            session_id: Some("kept".into()),
            loaded: true,
            save: Some(false),
            ..Default::default()
        };
        let outcome = manager.refresh_session(&head("/"), &mut state).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped);
        assert_eq!(state.jar.delta().count(), 0);
    }

    #[test]
    fn path_matching_uses_cookie_path() {
        let manager = SessionManager::new(
            SessionOptions::default().with_cookie(
                CookieOptions::default()
                    .with_signed(false)
                    .with_path("/session"),
            ),
        )
        .unwrap();
        assert!(manager.match_path("/session/get"));
        assert!(!manager.match_path("/other"));
    }
}
