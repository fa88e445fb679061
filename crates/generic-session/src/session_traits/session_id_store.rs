use cookie::CookieJar;

use crate::{session::CookieOptions, session_http::RequestHead, SessionId};

/// Strategy carrying the session id between requests.
///
/// The default, [`CookieSessionIdStore`](crate::CookieSessionIdStore), keeps it
/// in a (signed) cookie. Whatever is added to or removed from `jar` ends up as
/// `Set-Cookie` headers on the response.
pub trait SessionIdStore: Send + Sync {
    /// Reads the id sent by the client, `None` if there is none.
    fn get(&self, head: &RequestHead, jar: &CookieJar) -> Option<SessionId>;

    /// Hands `sid` to the client using the session's cookie attributes.
    fn set(&self, jar: &mut CookieJar, sid: &str, cookie: &CookieOptions);

    /// Tells the client to forget its current id.
    fn reset(&self, jar: &mut CookieJar);
}
