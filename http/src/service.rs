//! # Compat Service
//!
//! A tower [`Service`] that runs legacy `Context` handlers.
//!
//! Per request: collect the body, build the [`Context`] through the
//! [`ContextProvider`], run the global modules, run the handler for the
//! exact `(Method, path)`, then turn the context into a response.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use tower::Service;
use tracing::Instrument;
use webcompat_core::prelude::*;

use crate::context::Context;
use crate::form::MAX_BODY_BYTES;
use crate::provider::{ContextProvider, IncomingRequest};
use crate::response::plain;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Adapts a synchronous `Fn(&mut Context)` into a [`Module`].
pub struct HandlerFn<F> {
    label: String,
    f: F,
}

/// Wrap `f` as a route handler.
pub fn handler<F>(label: impl Into<String>, f: F) -> HandlerFn<F>
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    HandlerFn {
        label: label.into(),
        f,
    }
}

#[async_trait]
impl<F> Module for HandlerFn<F>
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata::new(self.label.clone()).reads::<Context>()
    }

    async fn execute(&self, bus: &mut Bus) -> ModuleResult {
        let ctx = bus.require_mut::<Context>()?;
        (self.f)(ctx);
        Ok(())
    }
}

#[derive(Clone)]
pub struct CompatService {
    provider: Arc<ContextProvider>,
    middleware: Arc<Circuit>,
    routes: Arc<HashMap<(Method, String), Arc<dyn Module>>>,
    fallback: Option<Arc<dyn Module>>,
}

impl CompatService {
    pub fn new(provider: ContextProvider) -> Self {
        Self {
            provider: Arc::new(provider),
            middleware: Arc::new(Circuit::new("middleware")),
            routes: Arc::new(HashMap::new()),
            fallback: None,
        }
    }

    /// Add a module that runs before every handler, after the context exists.
    pub fn wire<M: Module>(mut self, module: M) -> Self {
        let circuit = Arc::unwrap_or_clone(self.middleware);
        self.middleware = Arc::new(circuit.wire(module));
        self
    }

    pub fn route<M: Module>(mut self, method: Method, path: impl Into<String>, module: M) -> Self {
        let path = path.into();
        tracing::debug!(%method, %path, "Route registered");
        Arc::make_mut(&mut self.routes).insert((method, path), Arc::new(module));
        self
    }

    pub fn get<M: Module>(self, path: impl Into<String>, module: M) -> Self {
        self.route(Method::GET, path, module)
    }

    pub fn post<M: Module>(self, path: impl Into<String>, module: M) -> Self {
        self.route(Method::POST, path, module)
    }

    /// Handler for requests no route matches. Defaults to a plain 404.
    pub fn fallback<M: Module>(mut self, module: M) -> Self {
        self.fallback = Some(Arc::new(module));
        self
    }

    pub fn provider(&self) -> &ContextProvider {
        &self.provider
    }

    async fn dispatch(&self, parts: http::request::Parts, body: Bytes) -> Response<Full<Bytes>> {
        let mut bus = Bus::new();
        let route = self
            .routes
            .get(&(parts.method.clone(), parts.uri.path().to_string()))
            .cloned()
            .or_else(|| self.fallback.clone());
        bus.insert(IncomingRequest::new(parts, body));

        if let Err(e) = self.provider.execute(&mut bus).await {
            tracing::error!(error = %e, "Failed to build request context");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error\n");
        }

        let result = match self.middleware.execute(&mut bus).await {
            Ok(()) => match route {
                Some(handler) => handler.execute(&mut bus).await,
                None => {
                    if let Ok(ctx) = bus.require_mut::<Context>() {
                        ctx.not_found("404 page not found\n");
                    }
                    Ok(())
                }
            },
            Err(e) => Err(e),
        };

        let Some(mut ctx) = bus.remove::<Context>() else {
            tracing::error!("Request context removed from the bus");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error\n");
        };
        match result {
            Ok(()) | Err(ModuleError::Terminate) => {}
            Err(e) => {
                if !ctx.response().is_started() {
                    ctx.handle(StatusCode::INTERNAL_SERVER_ERROR, "handler", Some(&e));
                } else {
                    tracing::error!(error = %e, "Handler failed after writing a response");
                }
            }
        }
        ctx.into_response()
    }
}

impl std::fmt::Debug for CompatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatService")
            .field("provider", &self.provider)
            .field("middleware", &self.middleware.len())
            .field("routes", &self.routes.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<B> Service<Request<B>> for CompatService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let service = self.clone();
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "HTTPRequest",
            webcompat.http.method = %req.method(),
            webcompat.http.path = %req.uri().path(),
            webcompat.http.request_id = %request_id
        );

        Box::pin(
            async move {
                let (parts, body) = req.into_parts();
                let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) if e.is::<LengthLimitError>() => {
                        tracing::debug!("Request body over limit");
                        return Ok(plain(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large\n"));
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Failed to read request body");
                        return Ok(plain(StatusCode::BAD_REQUEST, "400 Bad Request\n"));
                    }
                };

                let res = service.dispatch(parts, body).await;
                tracing::debug!(status = %res.status(), "Request finished");
                Ok(res)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
    use std::fs;
    use tower::ServiceExt;
    use webcompat_core::TemplateOptions;

    fn service(templates: Option<&std::path::Path>) -> CompatService {
        let options = TemplateOptions {
            directory: templates
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| "/no/such/templates".into()),
            ..Default::default()
        };
        let provider = ContextProvider::new("secret", options)
            .unwrap()
            .with_mode(Mode::Test);
        CompatService::new(provider)
    }

    async fn body_text(res: Response<Full<Bytes>>) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    struct Deny;

    #[async_trait]
    impl Module for Deny {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new("Deny").reads::<Context>()
        }

        async fn execute(&self, bus: &mut Bus) -> ModuleResult {
            let ctx = bus.require_mut::<Context>()?;
            if ctx.query("token").is_empty() {
                ctx.forbidden();
                return Err(ModuleError::Terminate);
            }
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl Module for Fail {
        fn metadata(&self) -> ModuleMetadata {
            ModuleMetadata::new("Fail")
        }

        async fn execute(&self, _bus: &mut Bus) -> ModuleResult {
            Err(ModuleError::Internal("database unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_route_dispatch() {
        let svc = service(None).get(
            "/hello",
            handler("hello", |ctx| {
                let name = ctx.query("name");
                ctx.write_string(&format!("hello {name}"));
            }),
        );

        let res = svc
            .clone()
            .oneshot(Request::get("/hello?name=bob").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(body_text(res).await, "hello bob");

        let res = svc
            .oneshot(Request::post("/hello").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(res).await, "404 page not found\n");
    }

    #[tokio::test]
    async fn test_fallback() {
        let svc = service(None).fallback(handler("fallback", |ctx| {
            ctx.abort(StatusCode::GONE, "gone");
        }));
        let res = svc
            .oneshot(Request::get("/anything").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_post_form_body() {
        let svc = service(None).post(
            "/login",
            handler("login", |ctx| {
                let user = ctx.query("user");
                ctx.write_string(&user);
            }),
        );
        let res = svc
            .oneshot(
                Request::post("/login")
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Full::new(Bytes::from_static(b"user=alice")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(res).await, "alice");
    }

    #[tokio::test]
    async fn test_middleware_terminates() {
        let svc = service(None)
            .wire(Deny)
            .get("/secret", handler("secret", |ctx| ctx.write_string("ok")));

        let res = svc
            .clone()
            .oneshot(Request::get("/secret").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = svc
            .oneshot(Request::get("/secret?token=1").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "ok");
    }

    #[tokio::test]
    async fn test_handler_error_renders_status_page() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("status")).unwrap();
        fs::write(dir.path().join("status/50x.tmpl"), "{{ Title }}: {{ ErrorMsg }}").unwrap();

        let svc = service(Some(dir.path())).get("/broken", Fail);
        let res = svc
            .oneshot(Request::get("/broken").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_text(res).await,
            "Internal Server Error: Internal module error: database unavailable"
        );
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let svc = service(None).post("/upload", handler("upload", |_| {}));
        let big = vec![b'a'; MAX_BODY_BYTES + 1];
        let res = svc
            .oneshot(Request::post("/upload").body(Full::new(Bytes::from(big))).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_secure_cookie_across_requests() {
        let svc = service(None)
            .post(
                "/login",
                handler("login", |ctx| {
                    ctx.set_secure_cookie("user", "alice", 3600);
                    ctx.redirect(StatusCode::FOUND, "/me");
                }),
            )
            .get(
                "/me",
                handler("me", |ctx| match ctx.get_secure_cookie("user") {
                    Some(user) => ctx.write_string(&user),
                    None => ctx.unauthorized(),
                }),
            );

        let res = svc
            .clone()
            .oneshot(Request::post("/login").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/me");
        let pair = res.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let res = svc
            .clone()
            .oneshot(
                Request::get("/me")
                    .header(COOKIE, pair)
                    .body(Full::new(Bytes::new()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(res).await, "alice");

        let res = svc
            .oneshot(Request::get("/me").body(Full::new(Bytes::new())).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
