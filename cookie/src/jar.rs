//! Reading cookies off a request and appending them to a response.

use cookie::Cookie;
use http::header::{COOKIE, InvalidHeaderValue, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::codec::CookieCodec;
use crate::error::CookieError;

/// Every cookie called `name`, across all `Cookie` headers, in request order.
///
/// Pairs that fail to parse and headers that are not visible ASCII are
/// skipped.
pub fn cookies_named<'a>(
    headers: &'a HeaderMap,
    name: &'a str,
) -> impl Iterator<Item = Cookie<'a>> + 'a {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .filter(move |cookie| cookie.name() == name)
}

/// Append `cookie` as its own `Set-Cookie` header; existing ones are kept.
pub fn append_set_cookie(
    headers: &mut HeaderMap,
    cookie: &Cookie<'_>,
) -> Result<(), InvalidHeaderValue> {
    let value = HeaderValue::from_str(&cookie.to_string())?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

impl CookieCodec {
    /// Look up the signed cookie `name` in request headers.
    ///
    /// Every same-named candidate is tried and the first that verifies wins,
    /// so a stale duplicate sent alongside a fresh cookie does not mask it.
    /// When none verify, the error of the last candidate is returned, or
    /// [`CookieError::Missing`] when there was none.
    pub fn verify_from_headers(
        &self,
        headers: &HeaderMap,
        name: &str,
    ) -> Result<String, CookieError> {
        self.verify_from_headers_at(headers, name, chrono::Utc::now().timestamp())
    }

    pub fn verify_from_headers_at(
        &self,
        headers: &HeaderMap,
        name: &str,
        now: i64,
    ) -> Result<String, CookieError> {
        if !self.is_enabled() {
            return Err(CookieError::Disabled);
        }

        let mut last = CookieError::Missing;
        for candidate in cookies_named(headers, name) {
            match self.decode_at(candidate.value_trimmed(), now) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(cookie = name, reason = %e, "Rejected signed cookie");
                    last = e;
                }
            }
        }
        Err(last)
    }
}
