use std::{sync::Arc, time::Duration};

use cookie::Key;

use crate::{
    cookie_id_store::DEFAULT_COOKIE_NAME,
    error::{SessionError, SessionResult},
    id_generator::RandomIdGenerator,
    session::{CookieOptions, Session},
    session_http::RequestHead,
    session_traits::{IdGenerator, SessionIdStore, SessionStore},
    store::{DEFAULT_PREFIX, DEFAULT_RECONNECT_TIMEOUT},
    SessionId,
};

/// Decides what happens to a store failure.
///
/// The error is always a [`SessionError::Store`]; [`SessionError::operation`]
/// tells whether it came from a `get`, `set` or `destroy`. Returning `Ok(())`
/// swallows it, returning `Err` fails the request.
pub type ErrorHandler = Arc<dyn Fn(SessionError, &RequestHead) -> SessionResult<()> + Send + Sync>;

/// Accepts or rejects a session loaded from the store.
pub type ValidFn = Arc<dyn Fn(&RequestHead, &Session) -> bool + Send + Sync>;

/// Runs right before a session is written, with a chance to modify it.
pub type BeforeSaveFn = Arc<dyn Fn(&RequestHead, &mut Session) + Send + Sync>;

/// Configuration of the session middleware
pub struct SessionOptions {
    /// Name of the session cookie (default: "session.sid")
    pub key: String,
    /// Storage backend. Falls back to an in-process [`MemoryStore`](crate::MemoryStore)
    pub store: Option<Arc<dyn SessionStore>>,
    /// Explicit store ttl, otherwise derived from the session cookie
    pub ttl: Option<Duration>,
    /// Store key prefix (default: "sess:")
    pub prefix: String,
    /// Cookie attributes every new session starts with
    pub cookie: CookieOptions,
    /// Load the session on first access instead of on every request
    pub defer: bool,
    /// Rewrite the record and the cookie on every request, modified or not
    pub rolling: bool,
    /// Persist new sessions even when nothing was stored in them
    pub allow_empty: bool,
    pub gen_sid: Arc<dyn IdGenerator<SessionId>>,
    pub error_handler: Option<ErrorHandler>,
    pub valid: Option<ValidFn>,
    pub before_save: Option<BeforeSaveFn>,
    /// Replaces the cookie based session id transport
    pub session_id_store: Option<Arc<dyn SessionIdStore>>,
    /// How long a disconnected store may take to come back (default: 10s)
    pub reconnect_timeout: Duration,
    /// Key used to sign the session cookie.
    /// Required if `cookie.signed` is `true` and no custom `session_id_store` is set.
    pub signing_key: Option<Key>,
}

impl SessionOptions {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_cookie(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn with_defer(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    pub fn with_rolling(mut self, rolling: bool) -> Self {
        self.rolling = rolling;
        self
    }

    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn with_gen_sid(mut self, gen_sid: Arc<dyn IdGenerator<SessionId>>) -> Self {
        self.gen_sid = gen_sid;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(SessionError, &RequestHead) -> SessionResult<()> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_valid<F>(mut self, valid: F) -> Self
    where
        F: Fn(&RequestHead, &Session) -> bool + Send + Sync + 'static,
    {
        self.valid = Some(Arc::new(valid));
        self
    }

    pub fn with_before_save<F>(mut self, before_save: F) -> Self
    where
        F: Fn(&RequestHead, &mut Session) + Send + Sync + 'static,
    {
        self.before_save = Some(Arc::new(before_save));
        self
    }

    pub fn with_session_id_store(mut self, id_store: Arc<dyn SessionIdStore>) -> Self {
        self.session_id_store = Some(id_store);
        self
    }

    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    pub fn with_signing_key(mut self, key: Key) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Validates the session configuration
    ///
    /// # Returns
    /// * `SessionResult<()>` - Ok if validation passes, Err with `SessionError::InvalidOptions` otherwise
    pub fn validate(&self) -> SessionResult<()> {
        if self.key.trim().is_empty() {
            return Err(SessionError::InvalidOptions(
                "'key' (the session cookie name) must not be empty.".into(),
            ));
        }

        if self.cookie.signed && self.signing_key.is_none() && self.session_id_store.is_none() {
            return Err(SessionError::InvalidOptions(
                "A 'signing_key' is required for signed cookies. Provide one, or set 'cookie.signed' to false."
                    .into(),
            ));
        }

        if self.reconnect_timeout.is_zero() {
            return Err(SessionError::InvalidOptions(
                "'reconnect_timeout' must be greater than zero.".into(),
            ));
        }

        Ok(())
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_COOKIE_NAME.to_string(),
            store: None,
            ttl: None,
            prefix: DEFAULT_PREFIX.to_string(),
            cookie: CookieOptions::default(),
            defer: false,
            rolling: false,
            allow_empty: false,
            gen_sid: Arc::new(RandomIdGenerator::default()),
            error_handler: None,
            valid: None,
            before_save: None,
            session_id_store: None,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            signing_key: None,
        }
    }
}
