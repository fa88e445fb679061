use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::error::SessionResult;

/// One day, in milliseconds.
pub const DEFAULT_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000;

const LEGACY_MAX_AGE_FIELD: &str = "maxage";

/// Key of the cookie attributes in a serialized session.
pub const COOKIE_KEY: &str = "cookie";

/// Identifier of a session, carried by the session cookie.
pub type SessionId = String;

/// `SameSite` attribute of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieSameSite {
    Strict,
    Lax,
    None,
}

impl From<CookieSameSite> for cookie::SameSite {
    fn from(value: CookieSameSite) -> Self {
        match value {
            CookieSameSite::Strict => cookie::SameSite::Strict,
            CookieSameSite::Lax => cookie::SameSite::Lax,
            CookieSameSite::None => cookie::SameSite::None,
        }
    }
}

/// Cookie attributes stored alongside every session.
///
/// Handlers may change them per session (e.g. flip `http_only`), and the
/// change is written back with the session. Unknown fields are kept in
/// `extra` so applications can stamp their own attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieOptions {
    pub path: String,
    pub http_only: bool,
    pub signed: bool,
    pub overwrite: bool,
    /// Lifetime of the cookie in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none", alias = "maxage")]
    pub max_age: Option<u64>,
    /// Absolute expiry. Takes priority over `max_age` when present.
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<CookieSameSite>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            http_only: true,
            signed: true,
            overwrite: true,
            max_age: Some(DEFAULT_MAX_AGE_MS),
            expires: None,
            domain: None,
            secure: None,
            same_site: None,
            extra: Map::new(),
        }
    }
}

impl CookieOptions {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_max_age(mut self, max_age_ms: Option<u64>) -> Self {
        self.max_age = max_age_ms;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Moves a legacy `maxage` attribute left in `extra` into `max_age`.
    pub fn normalize_max_age(&mut self) {
        if let Some(legacy) = self.extra.remove(LEGACY_MAX_AGE_FIELD) {
            if let Some(ms) = legacy.as_u64() {
                self.max_age = Some(ms);
            }
        }
    }
}

/// Digest of a session's serialized content, cookie attributes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

/// The per-client session: a JSON map that always carries a `cookie` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub cookie: CookieOptions,
    #[serde(flatten)]
    data: Map<String, Value>,
}

impl Session {
    pub fn new(cookie: CookieOptions) -> Self {
        Self {
            cookie,
            data: Map::new(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Stores `value` under `key`. The [`COOKIE_KEY`] key replaces the cookie
    /// attributes and fails if `value` does not describe them.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()> {
        self.insert_value(key, serde_json::to_value(value)?)?;
        Ok(())
    }

    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> SessionResult<Option<Value>> {
        let key = key.into();
        if key == COOKIE_KEY {
            let cookie: CookieOptions = serde_json::from_value(value)?;
            let previous = std::mem::replace(&mut self.cookie, cookie);
            return Ok(Some(serde_json::to_value(previous)?));
        }
        Ok(self.data.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// `true` when nothing but the cookie attributes is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Everything but the cookie attributes.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Hashes the canonical JSON form of the session: object keys are
    /// written in sorted order at every depth, so insertion order never
    /// changes the hash.
    pub fn content_hash(&self) -> SessionResult<ContentHash> {
        let value = serde_json::to_value(self)?;
        let mut hasher = Sha256::new();
        write_canonical(&value, &mut hasher)?;
        Ok(ContentHash(hasher.finalize().into()))
    }
}

fn write_canonical(value: &Value, hasher: &mut Sha256) -> SessionResult<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            hasher.update(b"{");
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(serde_json::to_vec(key)?);
                hasher.update(b":");
                write_canonical(value, hasher)?;
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_canonical(item, hasher)?;
            }
            hasher.update(b"]");
        }
        scalar => hasher.update(serde_json::to_vec(scalar)?),
    }
    Ok(())
}
