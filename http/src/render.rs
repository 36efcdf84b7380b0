//! # Template rendering
//!
//! Templates are plain files under [`TemplateOptions::directory`] whose names
//! end in one of the configured extensions. A template is addressed by its
//! path relative to that directory without the extension, so
//! `templates/status/40x.tmpl` renders as `status/40x`.
//!
//! Output is HTML-escaped. A layout receives the page it wraps as `yield`
//! (emit it with `{{ yield | safe }}`) and the page name as `current`.
//!
//! In [`Mode::Dev`] every request gets a freshly compiled set so edits show
//! up without a restart; otherwise requests share the set compiled at
//! startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tera::Tera;
use thiserror::Error;
use webcompat_core::{Mode, TemplateOptions};

use crate::response::ResponseBuffer;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to read templates from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Template(#[from] tera::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-call override of the configured layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    pub layout: Option<String>,
}

impl HtmlOptions {
    pub fn layout(name: impl Into<String>) -> Self {
        Self {
            layout: Some(name.into()),
        }
    }

    pub fn no_layout() -> Self {
        Self { layout: None }
    }
}

/// Templates compiled once at startup.
#[derive(Clone)]
pub struct TemplateSet {
    options: Arc<TemplateOptions>,
    compiled: Arc<Tera>,
}

impl TemplateSet {
    pub fn compile(options: TemplateOptions) -> Result<Self, RenderError> {
        let compiled = Arc::new(compile(&options)?);
        Ok(Self {
            options: Arc::new(options),
            compiled,
        })
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.compiled.get_template_names().collect();
        names.sort_unstable();
        names
    }

    /// The renderer for one request.
    pub fn renderer(&self, mode: Mode) -> Result<Renderer, RenderError> {
        let templates = if mode.is_dev() {
            Arc::new(compile(&self.options)?)
        } else {
            Arc::clone(&self.compiled)
        };
        Ok(Renderer {
            templates,
            charset: prepare_charset(&self.options.charset),
            options: Arc::clone(&self.options),
        })
    }
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("directory", &self.options.directory)
            .field("templates", &self.compiled.get_template_names().count())
            .finish()
    }
}

fn prepare_charset(charset: &str) -> String {
    if charset.is_empty() {
        "; charset=UTF-8".to_string()
    } else {
        format!("; charset={charset}")
    }
}

fn compile(options: &TemplateOptions) -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![""]);

    if !options.directory.is_dir() {
        tracing::warn!(
            directory = %options.directory.display(),
            "Template directory not found, rendering will fail"
        );
        return Ok(tera);
    }

    let mut files = Vec::new();
    collect_templates(
        &options.directory,
        &options.directory,
        &options.extensions,
        &mut files,
    )?;
    let count = files.len();
    tera.add_template_files(files)?;

    tracing::debug!(
        directory = %options.directory.display(),
        count,
        "Compiled templates"
    );
    Ok(tera)
}

fn collect_templates(
    root: &Path,
    dir: &Path,
    extensions: &[String],
    out: &mut Vec<(PathBuf, Option<String>)>,
) -> Result<(), RenderError> {
    let io_err = |source| RenderError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_templates(root, &path, extensions, out)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let name = extensions
            .iter()
            .find_map(|ext| relative.strip_suffix(ext.as_str()))
            .map(str::to_string);
        if let Some(name) = name {
            out.push((path, Some(name)));
        }
    }
    Ok(())
}

/// Writes rendered templates, JSON and raw bytes into a response.
#[derive(Clone)]
pub struct Renderer {
    templates: Arc<Tera>,
    options: Arc<TemplateOptions>,
    charset: String,
}

impl Renderer {
    pub fn templates(&self) -> &Tera {
        &self.templates
    }

    /// Render `name` with `data`, wrapped in `layout` when given.
    pub fn render(
        &self,
        name: &str,
        data: &Map<String, Value>,
        layout: Option<&str>,
    ) -> Result<String, RenderError> {
        let mut context = tera::Context::from_value(Value::Object(data.clone()))?;
        let page = self.templates.render(name, &context)?;
        match layout {
            None => Ok(page),
            Some(layout) => {
                context.insert("yield", &page);
                context.insert("current", name);
                Ok(self.templates.render(layout, &context)?)
            }
        }
    }

    /// `opts` of `None` uses the configured default layout.
    pub fn html(
        &self,
        res: &mut ResponseBuffer,
        status: StatusCode,
        name: &str,
        data: &Map<String, Value>,
        opts: Option<&HtmlOptions>,
    ) {
        let layout = match opts {
            Some(opts) => opts.layout.as_deref(),
            None => self.options.layout.as_deref(),
        };
        match self.render(name, data, layout) {
            Ok(body) => {
                let ctype = format!("{}{}", self.options.html_content_type, self.charset);
                self.write(res, status, &ctype, body.as_bytes());
            }
            Err(e) => {
                tracing::error!(template = name, error = %e, "Template render failed");
                res.error_text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            }
        }
    }

    pub fn json<T: Serialize + ?Sized>(
        &self,
        res: &mut ResponseBuffer,
        status: StatusCode,
        value: &T,
    ) {
        let encoded = if self.options.indent_json {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        match encoded {
            Ok(body) => {
                let ctype = format!("application/json{}", self.charset);
                self.write(res, status, &ctype, &body);
            }
            Err(e) => {
                tracing::error!(error = %e, "JSON encoding failed");
                res.error_text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            }
        }
    }

    /// Raw bytes; the content type defaults to `application/octet-stream`.
    pub fn data(&self, res: &mut ResponseBuffer, status: StatusCode, body: &[u8]) {
        if !res.headers().contains_key(CONTENT_TYPE) {
            res.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
        }
        res.write_header(status);
        res.write(body);
    }

    /// Status only, no body.
    pub fn error(&self, res: &mut ResponseBuffer, status: StatusCode) {
        res.write_header(status);
    }

    fn write(&self, res: &mut ResponseBuffer, status: StatusCode, ctype: &str, body: &[u8]) {
        match HeaderValue::from_str(ctype) {
            Ok(value) => {
                res.headers_mut().insert(CONTENT_TYPE, value);
            }
            Err(_) => tracing::warn!(content_type = ctype, "Invalid content type, header not set"),
        }
        res.write_header(status);
        res.write(body);
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("directory", &self.options.directory)
            .field("charset", &self.charset)
            .finish()
    }
}
