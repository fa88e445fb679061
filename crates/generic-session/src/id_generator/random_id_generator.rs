use crate::session_traits::IdGenerator;
use base64::Engine;
use rand::RngCore;

/// Number of random bytes behind a default session id.
pub const DEFAULT_SESSION_ID_BYTES: usize = 24;

/// The default session id generator.
///
/// Fills `byte_len` bytes from the thread-local CSPRNG and encodes them as
/// URL-safe Base64 without padding, so 24 bytes give a 32 character id.
pub struct RandomIdGenerator {
    byte_len: usize,
}

impl RandomIdGenerator {
    /// Creates a generator drawing `byte_len` random bytes per id.
    pub fn new(byte_len: usize) -> Self {
        Self { byte_len }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_ID_BYTES)
    }
}

impl<T> IdGenerator<T> for RandomIdGenerator
where
    T: From<String>,
{
    fn generate(&self) -> T {
        let mut bytes = vec![0u8; self.byte_len];
        rand::rng().fill_bytes(&mut bytes);
        T::from(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }
}
