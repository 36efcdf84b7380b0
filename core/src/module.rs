use crate::bus::Bus;
use crate::metadata::ModuleMetadata;
use async_trait::async_trait;
use thiserror::Error;

pub type ModuleResult = Result<(), ModuleError>;

#[derive(Error, Debug)]
pub enum ModuleError {
    /// The module already produced the response; nothing after it runs.
    #[error("Module processing terminated early")]
    Terminate,
    #[error("Required value `{0}` is not on the bus")]
    Missing(&'static str),
    #[error("Internal module error: {0}")]
    Internal(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A unit of per-request work: middleware, context providers and handlers
/// all take this shape.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    fn metadata(&self) -> ModuleMetadata;
    async fn execute(&self, bus: &mut Bus) -> ModuleResult;
}
