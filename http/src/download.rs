//! File downloads.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use http::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use http::{Method, StatusCode};

use crate::context::Context;
use crate::date::{parse_http_date, web_time};

impl Context {
    fn set_download_headers(&mut self, name: &str) {
        self.set_header("Content-Description", "File Transfer", true);
        self.set_header("Content-Type", "application/octet-stream", true);
        self.set_header(
            "Content-Disposition",
            &format!("attachment; filename={name}"),
            true,
        );
        self.set_header("Content-Transfer-Encoding", "binary", true);
        self.set_header("Expires", "0", true);
        self.set_header("Cache-Control", "must-revalidate", true);
        self.set_header("Pragma", "public", true);
    }

    /// Send the file at `path` as an attachment.
    ///
    /// The download is named `name`, or the file name of `path` when `None`.
    pub async fn serve_file(&mut self, path: impl AsRef<Path>, name: Option<&str>) {
        let path = path.as_ref();
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        self.set_download_headers(&name);

        let modified = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                self.abort(StatusCode::NOT_FOUND, "404 page not found\n");
                return;
            }
            Ok(meta) => meta.modified().ok().map(DateTime::<Utc>::from),
            Err(e) => {
                self.file_error(path, &e);
                return;
            }
        };

        match tokio::fs::read(path).await {
            Ok(content) => self.write_content(&content, modified),
            Err(e) => self.file_error(path, &e),
        }
    }

    /// Send `content` as an attachment named `name`.
    ///
    /// `modified` drives `Last-Modified` and conditional requests; `None`
    /// means "now".
    pub fn serve_content(&mut self, name: &str, content: &[u8], modified: Option<DateTime<Utc>>) {
        self.set_download_headers(name);
        self.write_content(content, Some(modified.unwrap_or_else(Utc::now)));
    }

    fn write_content(&mut self, content: &[u8], modified: Option<DateTime<Utc>>) {
        if let Some(modified) = modified {
            if self.not_modified_since(modified) {
                let headers = self.header();
                headers.remove("Content-Type");
                headers.remove("Content-Length");
                self.not_modified();
                return;
            }
            self.set_header(LAST_MODIFIED.as_str(), &web_time(modified), true);
        }

        self.write_header(StatusCode::OK);
        if self.request.method != Method::HEAD {
            self.write(content);
        }
    }

    /// HTTP dates have second resolution, so sub-second parts are dropped.
    fn not_modified_since(&self, modified: DateTime<Utc>) -> bool {
        if !matches!(self.request.method, Method::GET | Method::HEAD) {
            return false;
        }
        self.request
            .headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .map(|since| modified.timestamp() <= since.timestamp())
            .unwrap_or(false)
    }

    fn file_error(&mut self, path: &Path, err: &std::io::Error) {
        let (status, body) = match err.kind() {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "404 page not found\n"),
            ErrorKind::PermissionDenied => (StatusCode::FORBIDDEN, "403 Forbidden\n"),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "500 Internal Server Error\n",
            ),
        };
        tracing::debug!(path = %path.display(), error = %err, "File not served");
        self.abort(status, body);
    }
}

#[cfg(test)]
mod tests {
    use crate::context::tests::context_with;
    use http::Request;
    use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use webcompat_core::Mode;

    use super::*;

    fn get(req: Request<()>) -> Context {
        context_with(req, b"", "secret", None, Mode::Test)
    }

    #[tokio::test]
    async fn test_serve_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, "a,b\n1,2\n").unwrap();

        let mut ctx = get(Request::get("/download").body(()).unwrap());
        ctx.serve_file(&file, None).await;

        let res = ctx.response();
        assert_eq!(res.status(), Some(StatusCode::OK));
        assert_eq!(res.body(), b"a,b\n1,2\n");
        assert_eq!(
            res.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=report.csv"
        );
        assert_eq!(
            res.headers().get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert!(res.headers().contains_key(LAST_MODIFIED));
    }

    #[tokio::test]
    async fn test_serve_file_custom_name_and_missing() {
        let dir = tempfile::tempdir().unwrap();

        let mut ctx = get(Request::get("/").body(()).unwrap());
        ctx.serve_file(dir.path().join("gone.bin"), Some("x.bin")).await;
        assert_eq!(ctx.response().status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            ctx.response().headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=x.bin"
        );

        let mut ctx = get(Request::get("/").body(()).unwrap());
        ctx.serve_file(dir.path(), None).await;
        assert_eq!(ctx.response().status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_serve_content_conditional() {
        let modified = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let mut ctx = get(Request::get("/").body(()).unwrap());
        ctx.serve_content("data.bin", b"\x00\x01", Some(modified));
        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert_eq!(ctx.response().body(), b"\x00\x01");
        assert_eq!(
            ctx.response().headers().get(LAST_MODIFIED).unwrap(),
            "Tue, 14 Nov 2023 22:13:20 GMT"
        );

        let mut ctx = get(
            Request::get("/")
                .header(IF_MODIFIED_SINCE, "Tue, 14 Nov 2023 22:13:20 GMT")
                .body(())
                .unwrap(),
        );
        ctx.serve_content("data.bin", b"\x00\x01", Some(modified));
        assert_eq!(ctx.response().status(), Some(StatusCode::NOT_MODIFIED));
        assert!(ctx.response().body().is_empty());
        assert!(!ctx.response().headers().contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_head_sends_no_body() {
        let mut ctx = get(Request::head("/").body(()).unwrap());
        ctx.serve_content("data.bin", b"payload", None);
        assert_eq!(ctx.response().status(), Some(StatusCode::OK));
        assert!(ctx.response().body().is_empty());
    }
}
