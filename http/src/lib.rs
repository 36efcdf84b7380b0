//! # webcompat-http
//!
//! Runs web.go style handlers, written against a mutable [`Context`], on
//! hyper.
//!
//! ```rust,ignore
//! use webcompat_http::prelude::*;
//!
//! let provider = ContextProvider::new("cookie secret", TemplateOptions::default())?;
//! let app = CompatService::new(provider)
//!     .get("/", handler("index", |ctx| ctx.html(StatusCode::OK, "index")))
//!     .post("/login", handler("login", |ctx| {
//!         let user = ctx.query("user");
//!         ctx.set_secure_cookie("user", &user, 0);
//!         ctx.redirect(StatusCode::FOUND, "/");
//!     }));
//! webcompat_http::serve("127.0.0.1:3000", app).await?;
//! ```

pub mod context;
pub mod date;
pub mod download;
pub mod form;
pub mod mime;
pub mod provider;
pub mod render;
pub mod response;
pub mod server;
pub mod service;

pub use context::Context;
pub use date::web_time;
pub use form::{Form, MAX_BODY_BYTES};
pub use provider::{ContextProvider, IncomingRequest};
pub use render::{HtmlOptions, RenderError, Renderer, TemplateSet};
pub use response::ResponseBuffer;
pub use server::{ServeError, serve};
pub use service::{CompatService, HandlerFn, handler};

pub mod prelude {
    pub use crate::context::Context;
    pub use crate::provider::ContextProvider;
    pub use crate::render::HtmlOptions;
    pub use crate::service::{CompatService, handler};
    pub use http::StatusCode;
    pub use webcompat_core::prelude::*;
    pub use webcompat_core::{CompatConfig, TemplateOptions};
}
