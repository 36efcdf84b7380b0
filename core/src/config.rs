//! Process configuration.
//!
//! Loaded once at startup from a TOML file and/or the environment, then
//! handed by value to whatever needs it. Nothing here is mutated after the
//! server starts.
//!
//! ```toml
//! mode = "prod"
//!
//! [server]
//! addr = "0.0.0.0:8080"
//!
//! [cookie]
//! secret = "change-me"
//!
//! [templates]
//! directory = "templates"
//! extensions = [".tmpl", ".html"]
//! layout = "layout"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mode::{MODE_ENV, Mode};

pub const COOKIE_SECRET_ENV: &str = "WEBCOMPAT_COOKIE_SECRET";
pub const ADDR_ENV: &str = "WEBCOMPAT_ADDR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompatConfig {
    pub mode: Mode,
    pub server: ServerConfig,
    pub cookie: CookieConfig,
    pub templates: TemplateOptions,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
        }
    }
}

/// An empty secret disables secure cookies.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    pub secret: String,
}

impl std::fmt::Debug for CookieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieConfig")
            .field("secret", &if self.secret.is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

/// Where templates live and how rendered pages are labelled.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TemplateOptions {
    /// Root directory walked for templates.
    pub directory: PathBuf,
    /// File extensions treated as templates, with the leading dot.
    pub extensions: Vec<String>,
    /// Template wrapped around every `html` render, unless overridden.
    pub layout: Option<String>,
    /// Charset appended to content types; empty means UTF-8.
    pub charset: String,
    pub html_content_type: String,
    pub indent_json: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
            extensions: vec![".tmpl".to_string()],
            layout: None,
            charset: "UTF-8".to_string(),
            html_content_type: "text/html".to_string(),
            indent_json: false,
        }
    }
}

impl CompatConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `WEBCOMPAT_ENV`, `WEBCOMPAT_COOKIE_SECRET` and `WEBCOMPAT_ADDR`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(mode) = lookup(MODE_ENV) {
            self.mode = Mode::parse(&mode);
        }
        if let Some(secret) = lookup(COOKIE_SECRET_ENV) {
            self.cookie.secret = secret;
        }
        if let Some(addr) = lookup(ADDR_ENV) {
            self.server.addr = addr;
        }
        if self.cookie.secret.is_empty() {
            tracing::warn!("Cookie secret is empty; secure cookies are disabled");
        }
        self
    }
}
