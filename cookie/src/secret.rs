use std::sync::Arc;

/// Server-held signing key.
///
/// Built once from configuration and shared by reference count; there is no
/// way to change it afterwards. A zero-length secret switches secure cookies
/// off entirely.
#[derive(Clone)]
pub struct CookieSecret(Arc<[u8]>);

impl CookieSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn disabled() -> Self {
        Self::new(b"")
    }

    pub fn is_disabled(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for CookieSecret {
    fn default() -> Self {
        Self::disabled()
    }
}

impl From<&str> for CookieSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CookieSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for CookieSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_disabled() {
            f.write_str("CookieSecret(<disabled>)")
        } else {
            f.write_str("CookieSecret(<redacted>)")
        }
    }
}
