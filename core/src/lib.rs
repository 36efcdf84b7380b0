//! # webcompat-core
//!
//! Protocol-agnostic pieces shared by the webcompat crates: the per-request
//! [`Bus`], the [`Module`] chain and process configuration.

pub mod bus;
pub mod circuit;
pub mod config;
pub mod metadata;
pub mod mode;
pub mod module;

pub use bus::Bus;
pub use circuit::Circuit;
pub use config::{CompatConfig, ConfigError, CookieConfig, ServerConfig, TemplateOptions};
pub use metadata::{ModuleMetadata, TypeInfo};
pub use mode::Mode;
pub use module::{Module, ModuleError, ModuleResult};

pub mod prelude {
    pub use crate::bus::Bus;
    pub use crate::circuit::Circuit;
    pub use crate::metadata::ModuleMetadata;
    pub use crate::mode::Mode;
    pub use crate::module::{Module, ModuleError, ModuleResult};
    pub use async_trait::async_trait;
}
