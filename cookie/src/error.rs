use thiserror::Error;

/// Why a signed cookie was not accepted.
///
/// Callers at the request boundary collapse all of these into "absent";
/// the variants exist for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("secure cookies are disabled: no secret configured")]
    Disabled,
    #[error("no cookie with that name")]
    Missing,
    #[error("malformed signed cookie: {0}")]
    Malformed(&'static str),
    #[error("signed cookie signature mismatch")]
    SignatureMismatch,
    #[error("signed cookie expired: issued {age}s ago")]
    Expired { age: i64 },
}
