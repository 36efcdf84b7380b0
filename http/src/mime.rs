/// Content type for a file extension such as `.json` or `css`.
///
/// Matching is case-insensitive; the leading dot is optional.
pub fn type_by_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.strip_prefix('.').unwrap_or(ext).to_ascii_lowercase();
    let ctype = match ext.as_str() {
        "avif" => "image/avif",
        "css" => "text/css; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "gif" => "image/gif",
        "htm" | "html" => "text/html; charset=utf-8",
        "ico" => "image/x-icon",
        "jpeg" | "jpg" => "image/jpeg",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "txt" => "text/plain; charset=utf-8",
        "wasm" => "application/wasm",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "xml" => "text/xml; charset=utf-8",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(ctype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(type_by_extension("json"), Some("application/json"));
        assert_eq!(type_by_extension(".PNG"), Some("image/png"));
        assert_eq!(type_by_extension(".html"), Some("text/html; charset=utf-8"));
        assert_eq!(type_by_extension(".nope"), None);
        assert_eq!(type_by_extension(""), None);
    }
}
