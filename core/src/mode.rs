use serde::{Deserialize, Serialize};

/// Environment variable selecting the running mode.
pub const MODE_ENV: &str = "WEBCOMPAT_ENV";

/// Process-wide running mode.
///
/// `Dev` recompiles templates on every request and exposes error details to
/// templates; `Prod` serves the templates compiled at startup.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Dev,
    Prod,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        std::env::var(MODE_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Unknown values fall back to `Dev`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "test" => Self::Test,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(self) -> bool {
        self == Self::Dev
    }

    pub fn is_prod(self) -> bool {
        self == Self::Prod
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
            Self::Test => "test",
        })
    }
}
