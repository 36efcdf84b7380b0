use chrono::{DateTime, Utc};

/// RFC 1123 date with a `GMT` zone, as used in `Date` and `Last-Modified`.
pub fn web_time(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date header. Only the RFC 1123 form is accepted.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
