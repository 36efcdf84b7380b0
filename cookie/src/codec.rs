//! Signed cookie wire format.
//!
//! ```text
//! <base64(value)>|<unix seconds, decimal>|<hex HMAC-SHA1>
//! ```
//!
//! The MAC covers the base64 text followed by the timestamp text, exactly as
//! they appear on the wire. Cookies issued by the web.go `SetSecureCookie`
//! helper verify unchanged.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use cookie::Cookie;
use cookie::time::OffsetDateTime;

use crate::error::CookieError;
use crate::secret::CookieSecret;
use crate::signer::Signer;

/// Maximum accepted age of a signed cookie: 31 days.
pub const VALIDITY_WINDOW_SECS: i64 = 31 * 86_400;

/// Expiry used for `max_age == 0`: 2^31 - 1 seconds, 2038-01-19T03:14:07Z.
pub const PERMANENT_EXPIRES: i64 = 2_147_483_647;

/// The three fields of a signed cookie value, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedValue<'a> {
    pub encoded: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SignedValue<'a> {
    /// Split on `|`; anything other than exactly three fields is malformed.
    pub fn parse(raw: &'a str) -> Result<Self, CookieError> {
        let mut parts = raw.split('|');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(encoded), Some(timestamp), Some(signature), None) => Ok(Self {
                encoded,
                timestamp,
                signature,
            }),
            _ => Err(CookieError::Malformed("expected value|timestamp|signature")),
        }
    }
}

impl std::fmt::Display for SignedValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}", self.encoded, self.timestamp, self.signature)
    }
}

/// Encodes values into signed cookies and verifies them on the way back.
///
/// Stateless apart from the secret; share it freely between requests.
#[derive(Clone, Debug, Default)]
pub struct CookieCodec {
    signer: Signer,
}

impl CookieCodec {
    pub fn new(secret: CookieSecret) -> Self {
        Self {
            signer: Signer::new(secret),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.signer.secret().is_disabled()
    }

    /// Build a signed `Set-Cookie` for `value`.
    ///
    /// `max_age` is in seconds; zero means "permanent". Returns `None` when
    /// the codec is disabled, in which case nothing should be sent.
    pub fn encode(
        &self,
        name: impl Into<String>,
        value: &str,
        max_age: i64,
    ) -> Option<Cookie<'static>> {
        self.encode_at(name, value, max_age, Utc::now().timestamp())
    }

    pub fn encode_at(
        &self,
        name: impl Into<String>,
        value: &str,
        max_age: i64,
        now: i64,
    ) -> Option<Cookie<'static>> {
        let signed = self.sign_value_at(value, now)?;
        Some(new_cookie_at(name, signed, max_age, now))
    }

    /// Only the cookie value: `base64|timestamp|signature`.
    pub fn sign_value_at(&self, value: &str, now: i64) -> Option<String> {
        if !self.is_enabled() {
            tracing::debug!("Secure cookie not set: cookie secret is empty");
            return None;
        }
        let encoded = STANDARD.encode(value);
        let timestamp = now.to_string();
        let signature = self.signer.sign(encoded.as_bytes(), &timestamp)?;
        Some(
            SignedValue {
                encoded: &encoded,
                timestamp: &timestamp,
                signature: &signature,
            }
            .to_string(),
        )
    }

    pub fn decode(&self, raw: &str) -> Result<String, CookieError> {
        self.decode_at(raw, Utc::now().timestamp())
    }

    pub fn decode_at(&self, raw: &str, now: i64) -> Result<String, CookieError> {
        let bytes = self.decode_bytes_at(raw, now)?;
        String::from_utf8(bytes).map_err(|_| CookieError::Malformed("value is not UTF-8"))
    }

    /// Verify `raw` and return the original bytes.
    ///
    /// Checks run in order: shape, signature, timestamp, age, base64. Issue
    /// times in the future are accepted.
    pub fn decode_bytes_at(&self, raw: &str, now: i64) -> Result<Vec<u8>, CookieError> {
        if !self.is_enabled() {
            return Err(CookieError::Disabled);
        }

        let parts = SignedValue::parse(raw)?;

        if !self
            .signer
            .verify(parts.encoded.as_bytes(), parts.timestamp, parts.signature)
        {
            return Err(CookieError::SignatureMismatch);
        }

        let issued: i64 = parts
            .timestamp
            .parse()
            .map_err(|_| CookieError::Malformed("timestamp is not a decimal integer"))?;

        let age = now.saturating_sub(issued);
        if age > VALIDITY_WINDOW_SECS {
            return Err(CookieError::Expired { age });
        }

        STANDARD
            .decode(parts.encoded)
            .map_err(|_| CookieError::Malformed("value is not base64"))
    }
}

/// A plain cookie expiring `max_age` seconds from now, or in 2038 when
/// `max_age` is zero. Negative ages produce an already expired cookie.
pub fn new_cookie(
    name: impl Into<String>,
    value: impl Into<String>,
    max_age: i64,
) -> Cookie<'static> {
    new_cookie_at(name, value, max_age, Utc::now().timestamp())
}

pub fn new_cookie_at(
    name: impl Into<String>,
    value: impl Into<String>,
    max_age: i64,
    now: i64,
) -> Cookie<'static> {
    let expires_at = if max_age == 0 {
        PERMANENT_EXPIRES
    } else {
        now.saturating_add(max_age)
    };

    let mut cookie = Cookie::new(name.into(), value.into());
    match OffsetDateTime::from_unix_timestamp(expires_at) {
        Ok(at) => cookie.set_expires(at),
        Err(_) => {
            tracing::warn!(expires_at, "Cookie expiry out of range, sending a session cookie")
        }
    }
    cookie
}
