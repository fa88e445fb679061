use cookie::{Cookie, CookieJar, Key};
use http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use time::OffsetDateTime;

use crate::{
    session::CookieOptions, session_http::RequestHead, session_traits::SessionIdStore, SessionId,
};

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "session.sid";

/// Keeps the session id in a cookie.
///
/// When the configured cookie is signed, ids are read from and written to
/// the jar's signed view, so a tampered or foreign cookie reads as absent.
#[derive(Clone)]
pub struct CookieSessionIdStore {
    name: String,
    path: String,
    signed: bool,
    key: Option<Key>,
}

impl CookieSessionIdStore {
    /// # Arguments
    /// * `name` - cookie name
    /// * `defaults` - the configured cookie attributes (path and `signed` are used)
    /// * `key` - signing key, required for signed cookies
    pub fn new(name: impl Into<String>, defaults: &CookieOptions, key: Option<Key>) -> Self {
        Self {
            name: name.into(),
            path: defaults.path.clone(),
            signed: defaults.signed,
            key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn build_cookie(&self, sid: &str, options: &CookieOptions) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), sid.to_string()))
            .path(options.path.clone())
            .http_only(options.http_only);

        if let Some(domain) = &options.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(secure) = options.secure {
            builder = builder.secure(secure);
        }
        if let Some(same_site) = options.same_site {
            builder = builder.same_site(same_site.into());
        }

        match (options.expires, options.max_age) {
            (Some(expires), _) => builder = builder.expires(expires),
            (None, Some(max_age_ms)) => {
                let max_age =
                    time::Duration::milliseconds(i64::try_from(max_age_ms).unwrap_or(i64::MAX));
                builder = builder
                    .max_age(max_age)
                    .expires(OffsetDateTime::now_utc().saturating_add(max_age));
            }
            (None, None) => {}
        }

        builder.build()
    }
}

impl SessionIdStore for CookieSessionIdStore {
    fn get(&self, _head: &RequestHead, jar: &CookieJar) -> Option<SessionId> {
        let cookie = if self.signed {
            jar.signed(self.key.as_ref()?).get(&self.name)
        } else {
            jar.get(&self.name).cloned()
        };
        cookie
            .map(|cookie| cookie.value().to_string())
            .filter(|sid| !sid.is_empty())
    }

    fn set(&self, jar: &mut CookieJar, sid: &str, options: &CookieOptions) {
        let cookie = self.build_cookie(sid, options);
        match (&self.key, options.signed) {
            (Some(key), true) => jar.signed_mut(key).add(cookie),
            _ => jar.add(cookie),
        }
    }

    fn reset(&self, jar: &mut CookieJar) {
        jar.remove(Cookie::build(self.name.clone()).path(self.path.clone()));
    }
}

/// Collects the cookies sent with a request into a jar.
pub(crate) fn request_cookie_jar(headers: &HeaderMap) -> CookieJar {
    let mut jar = CookieJar::new();
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse_encoded(value.to_string()).flatten() {
            jar.add_original(cookie);
        }
    }
    jar
}

/// Emits one `Set-Cookie` header per change recorded in `jar`.
pub(crate) fn apply_cookie_delta(jar: &CookieJar, headers: &mut HeaderMap) {
    for cookie in jar.delta() {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => tracing::warn!("skipping invalid cookie {}: {err}", cookie.name()),
        }
    }
}
