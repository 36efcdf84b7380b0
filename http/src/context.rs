//! # Context
//!
//! The per-request object legacy handlers are written against. It carries
//! the request, its form parameters, a data map for templates, and the
//! response being built. Everything maps onto plain HTTP; nothing is
//! written to the socket until the service turns the context into a
//! response.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use http::request::Parts;
use http::{Method, Response, StatusCode, Uri};
use http_body_util::Full;
use serde::Serialize;
use serde_json::{Map, Value};
use webcompat_cookie::{Cookie, CookieCodec, append_set_cookie, new_cookie};
use webcompat_core::Mode;

use crate::form::Form;
use crate::mime::type_by_extension;
use crate::render::{HtmlOptions, Renderer};
use crate::response::ResponseBuffer;

pub struct Context {
    pub request: Parts,
    /// First value of every form and query parameter.
    pub params: HashMap<String, String>,
    /// Values handed to templates.
    pub data: Map<String, Value>,
    body: Bytes,
    form: Form,
    mode: Mode,
    codec: CookieCodec,
    renderer: Renderer,
    response: ResponseBuffer,
}

impl Context {
    pub fn new(
        request: Parts,
        body: Bytes,
        codec: CookieCodec,
        renderer: Renderer,
        mode: Mode,
    ) -> Self {
        let form = Form::parse(&request, &body);
        Self {
            params: form.first_values(),
            data: Map::new(),
            request,
            body,
            form,
            mode,
            codec,
            renderer,
            response: ResponseBuffer::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn uri(&self) -> &Uri {
        &self.request.uri
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Raw request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn response(&self) -> &ResponseBuffer {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseBuffer {
        &mut self.response
    }

    pub fn header(&mut self) -> &mut HeaderMap {
        self.response.headers_mut()
    }

    /// First form value for `name`, or an empty string.
    pub fn query(&self, name: &str) -> String {
        self.form.get(name).unwrap_or_default().to_string()
    }

    /// Whether form validation flagged an error (`data["HasError"]`).
    pub fn has_error(&self) -> bool {
        self.data
            .get("HasError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn has_api_error(&self) -> bool {
        self.has_error()
    }

    /// `data["ErrorMsg"]` as text, empty if unset.
    pub fn err_msg(&self) -> String {
        match self.data.get("ErrorMsg") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Render `name` with [`Context::data`] using the configured layout.
    pub fn html(&mut self, status: StatusCode, name: &str) {
        self.renderer
            .html(&mut self.response, status, name, &self.data, None);
    }

    pub fn html_with(&mut self, status: StatusCode, name: &str, opts: &HtmlOptions) {
        self.renderer
            .html(&mut self.response, status, name, &self.data, Some(opts));
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        self.renderer.json(&mut self.response, status, value);
    }

    /// Log `err` and render the status page `status/<NN>x`.
    ///
    /// Outside production the error text is exposed as `ErrorMsg`.
    pub fn handle(&mut self, status: StatusCode, desc: &str, err: Option<&dyn std::error::Error>) {
        if let Some(err) = err {
            tracing::error!("{}: {}", desc, err);
            if !self.mode.is_prod() {
                self.data
                    .insert("ErrorMsg".to_string(), Value::String(err.to_string()));
            }
        }

        let code = status.as_u16();
        let title = match code {
            404 => "Page Not Found".to_string(),
            500 => "Internal Server Error".to_string(),
            _ => format!("Status - {code}"),
        };
        self.data
            .insert("Description".to_string(), Value::String(format!("desc:{desc}")));
        self.data.insert("Status".to_string(), Value::from(code));
        self.data.insert("Title".to_string(), Value::String(title));

        self.html(status, &format!("status/{}x", code / 10));
    }

    pub fn write_string(&mut self, content: &str) {
        self.response.write(content.as_bytes());
    }

    pub fn write(&mut self, content: &[u8]) {
        self.response.write(content);
    }

    pub fn write_header(&mut self, status: StatusCode) {
        self.response.write_header(status);
    }

    /// Send `status` with `body`; typically for 4xx and 5xx responses.
    pub fn abort(&mut self, status: StatusCode, body: &str) {
        self.response.write_header(status);
        self.response.write(body.as_bytes());
    }

    pub fn redirect(&mut self, status: StatusCode, url: &str) {
        self.set_header(LOCATION.as_str(), url, true);
        self.response.write_header(status);
        self.response.write(format!("Redirecting to: {url}").as_bytes());
    }

    pub fn not_modified(&mut self) {
        self.response.write_header(StatusCode::NOT_MODIFIED);
    }

    pub fn not_found(&mut self, message: &str) {
        self.abort(StatusCode::NOT_FOUND, message);
    }

    pub fn unauthorized(&mut self) {
        self.response.write_header(StatusCode::UNAUTHORIZED);
    }

    pub fn forbidden(&mut self) {
        self.response.write_header(StatusCode::FORBIDDEN);
    }

    /// Set the content type and return what was set.
    ///
    /// A value containing `/` is used verbatim; anything else is an extension
    /// (`"json"`, `".css"`). Unknown extensions set nothing and return an
    /// empty string.
    pub fn content_type(&mut self, val: &str) -> String {
        let ctype = if val.contains('/') {
            val.to_string()
        } else {
            type_by_extension(val).unwrap_or_default().to_string()
        };
        if !ctype.is_empty() {
            self.set_header(CONTENT_TYPE.as_str(), &ctype, true);
        }
        ctype
    }

    /// Replace the header when `unique`, otherwise add another value.
    pub fn set_header(&mut self, name: &str, value: &str, unique: bool) {
        let (name, value) = match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => (name, value),
            _ => {
                tracing::warn!(header = name, "Invalid header name or value, not set");
                return;
            }
        };
        let headers = self.response.headers_mut();
        if unique {
            headers.insert(name, value);
        } else {
            headers.append(name, value);
        }
    }

    /// Append a `Set-Cookie` header.
    pub fn set_cookie(&mut self, cookie: &Cookie<'_>) {
        if let Err(e) = append_set_cookie(self.response.headers_mut(), cookie) {
            tracing::warn!(cookie = cookie.name(), error = %e, "Cookie not set");
        }
    }

    /// Plain cookie helper; see [`new_cookie`] for how `age` maps to expiry.
    pub fn set_plain_cookie(&mut self, name: &str, value: &str, age: i64) {
        self.set_cookie(&new_cookie(name, value, age));
    }

    /// Sign `value` into cookie `name`. Does nothing when no secret is set.
    pub fn set_secure_cookie(&mut self, name: &str, value: &str, age: i64) {
        if let Some(cookie) = self.codec.encode(name, value, age) {
            self.set_cookie(&cookie);
        }
    }

    /// The verified value of cookie `name`.
    ///
    /// `None` covers every failure: missing, malformed, tampered, expired or
    /// secure cookies disabled.
    pub fn get_secure_cookie(&self, name: &str) -> Option<String> {
        self.codec.verify_from_headers(&self.request.headers, name).ok()
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        self.response.into_response()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.request.method)
            .field("uri", &self.request.uri)
            .field("params", &self.params)
            .field("mode", &self.mode)
            .field("status", &self.response.status())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::render::TemplateSet;
    use http::header::{COOKIE, SET_COOKIE};
    use http::Request;
    use std::fs;
    use webcompat_core::TemplateOptions;
    use webcompat_cookie::CookieSecret;

    pub(crate) fn context_with(
        request: Request<()>,
        body: &'static [u8],
        secret: &str,
        templates: Option<&std::path::Path>,
        mode: Mode,
    ) -> Context {
        let options = TemplateOptions {
            directory: templates
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| "/no/such/templates".into()),
            ..Default::default()
        };
        let renderer = TemplateSet::compile(options).unwrap().renderer(mode).unwrap();
        let (parts, ()) = request.into_parts();
        Context::new(
            parts,
            Bytes::from_static(body),
            CookieCodec::new(CookieSecret::from(secret)),
            renderer,
            mode,
        )
    }

    fn get(uri: &str) -> Context {
        context_with(
            Request::get(uri).body(()).unwrap(),
            b"",
            "secret",
            None,
            Mode::Test,
        )
    }

    #[test]
    fn test_query_and_params() {
        let ctx = context_with(
            Request::post("/login?next=%2Fhome&user=q")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(())
                .unwrap(),
            b"user=alice",
            "secret",
            None,
            Mode::Test,
        );

        assert_eq!(ctx.query("user"), "alice");
        assert_eq!(ctx.query("next"), "/home");
        assert_eq!(ctx.query("absent"), "");
        assert_eq!(ctx.params.get("user").map(String::as_str), Some("alice"));
    }

    #[test]
    fn test_error_flags() {
        let mut ctx = get("/");
        assert!(!ctx.has_error());
        assert_eq!(ctx.err_msg(), "");

        ctx.data.insert("HasError".into(), Value::Bool(true));
        ctx.data.insert("ErrorMsg".into(), Value::String("bad input".into()));

        assert!(ctx.has_error());
        assert!(ctx.has_api_error());
        assert_eq!(ctx.err_msg(), "bad input");
    }

    #[test]
    fn test_redirect() {
        let mut ctx = get("/");
        ctx.redirect(StatusCode::FOUND, "/login");
        let res = ctx.into_response();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/login");
    }

    #[test]
    fn test_status_helpers() {
        let mut ctx = get("/");
        ctx.not_found("nothing here");
        assert_eq!(ctx.response().status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(ctx.response().body(), b"nothing here");

        let mut ctx = get("/");
        ctx.unauthorized();
        assert_eq!(ctx.response().status(), Some(StatusCode::UNAUTHORIZED));

        let mut ctx = get("/");
        ctx.forbidden();
        ctx.abort(StatusCode::BAD_REQUEST, "late");
        assert_eq!(ctx.response().status(), Some(StatusCode::FORBIDDEN));

        let mut ctx = get("/");
        ctx.not_modified();
        assert_eq!(ctx.response().status(), Some(StatusCode::NOT_MODIFIED));
    }

    #[test]
    fn test_content_type() {
        let mut ctx = get("/");

        assert_eq!(ctx.content_type("json"), "application/json");
        assert_eq!(ctx.header().get(CONTENT_TYPE).unwrap(), "application/json");

        assert_eq!(ctx.content_type("text/x-custom"), "text/x-custom");
        assert_eq!(ctx.header().get(CONTENT_TYPE).unwrap(), "text/x-custom");

        assert_eq!(ctx.content_type("unknown-ext"), "");
        assert_eq!(ctx.header().get(CONTENT_TYPE).unwrap(), "text/x-custom");
    }

    #[test]
    fn test_set_header_unique_and_append() {
        let mut ctx = get("/");
        ctx.set_header("X-Tag", "a", false);
        ctx.set_header("X-Tag", "b", false);
        assert_eq!(ctx.header().get_all("x-tag").iter().count(), 2);

        ctx.set_header("X-Tag", "c", true);
        let values: Vec<_> = ctx.header().get_all("x-tag").iter().collect();
        assert_eq!(values, vec!["c"]);

        ctx.set_header("Bad Name", "v", true);
        assert!(!ctx.header().contains_key("bad name"));
    }

    #[test]
    fn test_secure_cookie_round_trip_through_headers() {
        let mut issuer = get("/login");
        issuer.set_secure_cookie("sid", "alice", 0);
        issuer.set_secure_cookie("theme", "dark", 3600);
        let res = issuer.into_response();

        let set: Vec<_> = res.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(set.len(), 2);

        let pair = set[0].to_str().unwrap().split(';').next().unwrap().to_string();
        let reader = context_with(
            Request::get("/me").header(COOKIE, pair).body(()).unwrap(),
            b"",
            "secret",
            None,
            Mode::Test,
        );
        assert_eq!(reader.get_secure_cookie("sid").as_deref(), Some("alice"));
        assert_eq!(reader.get_secure_cookie("theme"), None);
    }

    #[test]
    fn test_secure_cookie_disabled_without_secret() {
        let mut ctx = context_with(Request::get("/").body(()).unwrap(), b"", "", None, Mode::Test);
        ctx.set_secure_cookie("sid", "alice", 0);
        assert!(!ctx.header().contains_key(SET_COOKIE));
        assert_eq!(ctx.get_secure_cookie("sid"), None);
    }

    #[test]
    fn test_tampered_cookie_is_absent() {
        let mut issuer = get("/");
        issuer.set_secure_cookie("sid", "alice", 0);
        let res = issuer.into_response();
        let pair = res.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let forged = pair.replacen("YWxpY2U=", "bWFsbG9yeQ==", 1);

        let reader = context_with(
            Request::get("/").header(COOKIE, forged).body(()).unwrap(),
            b"",
            "secret",
            None,
            Mode::Test,
        );
        assert_eq!(reader.get_secure_cookie("sid"), None);
    }

    #[test]
    fn test_handle_renders_status_page() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("status")).unwrap();
        fs::write(
            dir.path().join("status/40x.tmpl"),
            "{{ Title }}|{{ Status }}|{{ Description }}|{{ ErrorMsg | default(value='') }}",
        )
        .unwrap();
        fs::write(
            dir.path().join("status/41x.tmpl"),
            "{{ Title }}|{{ Status }}|{{ Description }}|{{ ErrorMsg | default(value='') }}",
        )
        .unwrap();

        let err = std::io::Error::other("disk on fire");
        let mut ctx = context_with(
            Request::get("/").body(()).unwrap(),
            b"",
            "secret",
            Some(dir.path()),
            Mode::Dev,
        );
        ctx.handle(StatusCode::NOT_FOUND, "lookup", Some(&err));

        assert_eq!(ctx.response().status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            std::str::from_utf8(ctx.response().body()).unwrap(),
            "Page Not Found|404|desc:lookup|disk on fire"
        );

        let mut ctx = context_with(
            Request::get("/").body(()).unwrap(),
            b"",
            "secret",
            Some(dir.path()),
            Mode::Prod,
        );
        ctx.handle(StatusCode::GONE, "gone", Some(&err));
        assert_eq!(ctx.response().status(), Some(StatusCode::GONE));
        assert_eq!(
            std::str::from_utf8(ctx.response().body()).unwrap(),
            "Status - 410|410|desc:gone|"
        );
        assert!(!ctx.data.contains_key("ErrorMsg"));
    }
}
