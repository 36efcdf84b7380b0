//! URL query and urlencoded body parameters.

use std::collections::HashMap;

use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::Method;

/// Largest body read by [`CompatService`](crate::CompatService), form or not.
pub const MAX_BODY_BYTES: usize = 10 << 20;

/// Parsed form values: body values first, then URL query values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    values: HashMap<String, Vec<String>>,
}

impl Form {
    /// Parse the query string, plus the body for POST, PUT and PATCH requests
    /// sent as `application/x-www-form-urlencoded`. Unparseable input is
    /// logged and skipped.
    pub fn parse(parts: &Parts, body: &[u8]) -> Self {
        let mut form = Self::default();

        if has_form_body(parts) {
            match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
                Ok(pairs) => form.extend(pairs),
                Err(e) => tracing::debug!(error = %e, "Ignoring unparseable form body"),
            }
        }

        if let Some(query) = parts.uri.query() {
            match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
                Ok(pairs) => form.extend(pairs),
                Err(e) => tracing::debug!(error = %e, "Ignoring unparseable query string"),
            }
        }

        form
    }

    fn extend(&mut self, pairs: Vec<(String, String)>) {
        for (key, value) in pairs {
            self.values.entry(key).or_default().push(value);
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One entry per key holding its first value.
    pub fn first_values(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.first().map(|first| (k.clone(), first.clone())))
            .collect()
    }
}

fn has_form_body(parts: &Parts) -> bool {
    if !matches!(parts.method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(method: Method, uri: &str, content_type: Option<&str>) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_query_only() {
        let form = Form::parse(&parts(Method::GET, "/s?q=rust&tag=a&tag=b", None), b"");

        assert_eq!(form.get("q"), Some("rust"));
        assert_eq!(form.get_all("tag"), ["a", "b"]);
        assert_eq!(form.get("missing"), None);
    }

    #[test]
    fn test_body_takes_precedence_over_query() {
        let form = Form::parse(
            &parts(
                Method::POST,
                "/login?user=query",
                Some("application/x-www-form-urlencoded; charset=utf-8"),
            ),
            b"user=body&pass=p%40ss+word",
        );

        assert_eq!(form.get("user"), Some("body"));
        assert_eq!(form.get_all("user"), ["body", "query"]);
        assert_eq!(form.get("pass"), Some("p@ss word"));
    }

    #[test]
    fn test_body_ignored_for_get_and_other_types() {
        let form = Form::parse(
            &parts(Method::GET, "/", Some("application/x-www-form-urlencoded")),
            b"a=1",
        );
        assert!(form.is_empty());

        let form = Form::parse(&parts(Method::POST, "/", Some("application/json")), b"a=1");
        assert!(form.is_empty());
    }

    #[test]
    fn test_first_values() {
        let form = Form::parse(&parts(Method::GET, "/?a=1&a=2&b=3", None), b"");
        let first = form.first_values();

        assert_eq!(first.get("a").map(String::as_str), Some("1"));
        assert_eq!(first.get("b").map(String::as_str), Some("3"));
        assert_eq!(first.len(), 2);
    }
}
