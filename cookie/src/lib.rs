//! # webcompat-cookie
//!
//! Tamper-evident cookies: a value, its issue time and an HMAC-SHA1 over
//! both, `|`-joined. Cookies older than [`VALIDITY_WINDOW_SECS`] are
//! refused.
//!
//! ```
//! use webcompat_cookie::{CookieCodec, CookieSecret};
//!
//! let codec = CookieCodec::new(CookieSecret::from("server secret"));
//! let cookie = codec.encode("sid", "user-42", 3600).unwrap();
//! assert_eq!(codec.decode(cookie.value()).unwrap(), "user-42");
//! ```

pub mod codec;
pub mod error;
pub mod jar;
pub mod secret;
pub mod signer;

pub use codec::{
    CookieCodec, PERMANENT_EXPIRES, SignedValue, VALIDITY_WINDOW_SECS, new_cookie, new_cookie_at,
};
pub use cookie::Cookie;
pub use error::CookieError;
pub use jar::{append_set_cookie, cookies_named};
pub use secret::CookieSecret;
pub use signer::Signer;
