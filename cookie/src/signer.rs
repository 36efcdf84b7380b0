use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::secret::CookieSecret;

type HmacSha1 = Hmac<Sha1>;

/// Binds a cookie value to its issue timestamp with HMAC-SHA1.
#[derive(Clone, Debug, Default)]
pub struct Signer {
    secret: CookieSecret,
}

impl Signer {
    pub fn new(secret: CookieSecret) -> Self {
        Self { secret }
    }

    pub fn secret(&self) -> &CookieSecret {
        &self.secret
    }

    /// Lowercase hex of `HMAC-SHA1(secret, value || timestamp)`.
    ///
    /// HMAC accepts keys of any length, so `None` only surfaces if the MAC
    /// backend rejects the key; callers treat it like a disabled secret.
    pub fn sign(&self, value: &[u8], timestamp: &str) -> Option<String> {
        let mut mac = <HmacSha1 as KeyInit>::new_from_slice(self.secret.as_bytes())
            .inspect_err(|e| tracing::error!(error = %e, "Cookie secret rejected by HMAC"))
            .ok()?;
        mac.update(value);
        mac.update(timestamp.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time comparison of `candidate` against the expected signature.
    pub fn verify(&self, value: &[u8], timestamp: &str, candidate: &str) -> bool {
        match self.sign(value, timestamp) {
            Some(expected) => expected.as_bytes().ct_eq(candidate.as_bytes()).into(),
            None => false,
        }
    }
}
