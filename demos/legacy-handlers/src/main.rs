//! Legacy-handler demo.
//!
//! Run from this directory so `templates/` and `files/` resolve:
//!
//! ```text
//! cargo run -p legacy-handlers -- webcompat.toml
//! ```
//!
//! Then sign in at http://127.0.0.1:3000/ and visit `/profile`.

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use webcompat_core::CompatConfig;
use webcompat_http::prelude::*;

const SESSION_COOKIE: &str = "user";

/// Logs each request that reaches the handlers.
struct AccessLog;

#[async_trait]
impl Module for AccessLog {
    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata::new("AccessLog").reads::<Context>()
    }

    async fn execute(&self, bus: &mut Bus) -> ModuleResult {
        let ctx = bus.require::<Context>()?;
        tracing::info!(method = %ctx.method(), uri = %ctx.uri(), "Handling request");
        Ok(())
    }
}

/// Sends the release notes as an attachment to signed-in users.
struct Download;

#[async_trait]
impl Module for Download {
    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata::new("Download").reads::<Context>()
    }

    async fn execute(&self, bus: &mut Bus) -> ModuleResult {
        let ctx = bus.require_mut::<Context>()?;
        if ctx.get_secure_cookie(SESSION_COOKIE).is_none() {
            ctx.unauthorized();
            return Err(ModuleError::Terminate);
        }
        ctx.serve_file("files/release-notes.txt", None).await;
        Ok(())
    }
}

fn index(ctx: &mut Context) {
    ctx.html(StatusCode::OK, "index");
}

fn login(ctx: &mut Context) {
    let user = ctx.query("user");
    if user.trim().is_empty() {
        ctx.data.insert("HasError".into(), Value::Bool(true));
        ctx.data
            .insert("ErrorMsg".into(), Value::String("user name is required".into()));
        ctx.html(StatusCode::BAD_REQUEST, "index");
        return;
    }
    ctx.set_secure_cookie(SESSION_COOKIE, user.trim(), 0);
    ctx.redirect(StatusCode::FOUND, "/profile");
}

fn logout(ctx: &mut Context) {
    ctx.set_plain_cookie(SESSION_COOKIE, "", -1);
    ctx.redirect(StatusCode::FOUND, "/");
}

fn profile(ctx: &mut Context) {
    match ctx.get_secure_cookie(SESSION_COOKIE) {
        Some(user) => {
            ctx.data.insert("User".into(), Value::String(user));
            ctx.html(StatusCode::OK, "profile");
        }
        None => ctx.handle(StatusCode::UNAUTHORIZED, "sign in first", None),
    }
}

fn whoami(ctx: &mut Context) {
    let user = ctx.get_secure_cookie(SESSION_COOKIE);
    ctx.json(StatusCode::OK, &json!({ "user": user }));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match std::env::args().nth(1) {
        Some(path) => CompatConfig::load(path)?,
        None => CompatConfig::default(),
    }
    .with_env_overrides();
    tracing::info!(mode = %config.mode, "Starting legacy handlers");

    let provider = ContextProvider::from_config(&config)?;
    let app = CompatService::new(provider)
        .wire(AccessLog)
        .get("/", handler("index", index))
        .post("/login", handler("login", login))
        .get("/logout", handler("logout", logout))
        .get("/profile", handler("profile", profile))
        .get("/download", Download)
        .get("/api/whoami", handler("whoami", whoami));

    webcompat_http::serve(&config.server.addr, app).await?;
    Ok(())
}
