//! # Context Provider
//!
//! Builds a [`Context`] for each request from the shared cookie codec and
//! template set. As a [`Module`] it takes the [`IncomingRequest`] off the
//! bus and puts the finished `Context` back.

use bytes::Bytes;
use chrono::Utc;
use http::request::Parts;
use webcompat_cookie::{CookieCodec, CookieSecret};
use webcompat_core::config::CompatConfig;
use webcompat_core::prelude::*;
use webcompat_core::TemplateOptions;

use crate::context::Context;
use crate::date::web_time;
use crate::render::{RenderError, TemplateSet};

/// A request whose body has already been collected.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub parts: Parts,
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn new(parts: Parts, body: impl Into<Bytes>) -> Self {
        Self {
            parts,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextProvider {
    codec: CookieCodec,
    templates: TemplateSet,
    mode: Mode,
}

impl ContextProvider {
    /// Compile templates from `options`. The mode comes from the environment.
    pub fn new(
        secret: impl Into<CookieSecret>,
        options: TemplateOptions,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            codec: CookieCodec::new(secret.into()),
            templates: TemplateSet::compile(options)?,
            mode: Mode::from_env(),
        })
    }

    pub fn from_config(config: &CompatConfig) -> Result<Self, RenderError> {
        Ok(Self {
            codec: CookieCodec::new(CookieSecret::from(config.cookie.secret.as_str())),
            templates: TemplateSet::compile(config.templates.clone())?,
            mode: config.mode,
        })
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn codec(&self) -> &CookieCodec {
        &self.codec
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// New context with `Date` and a default HTML content type already set.
    pub fn build(&self, req: IncomingRequest) -> Result<Context, RenderError> {
        let renderer = self.templates.renderer(self.mode)?;
        let mut ctx = Context::new(
            req.parts,
            req.body,
            self.codec.clone(),
            renderer,
            self.mode,
        );
        ctx.set_header("Date", &web_time(Utc::now()), true);
        ctx.set_header("Content-Type", "text/html; charset=utf-8", true);
        Ok(ctx)
    }
}

#[async_trait]
impl Module for ContextProvider {
    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata::new("ContextProvider")
            .with_description("Builds the per-request Context")
            .reads::<IncomingRequest>()
            .writes::<Context>()
    }

    async fn execute(&self, bus: &mut Bus) -> ModuleResult {
        let req = bus
            .remove::<IncomingRequest>()
            .ok_or(ModuleError::Missing(std::any::type_name::<IncomingRequest>()))?;
        let ctx = self
            .build(req)
            .map_err(|e| ModuleError::Internal(e.to_string()))?;
        bus.insert(ctx);
        Ok(())
    }
}
