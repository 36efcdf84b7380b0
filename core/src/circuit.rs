use crate::bus::Bus;
use crate::metadata::ModuleMetadata;
use crate::module::{Module, ModuleError, ModuleResult};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// An ordered chain of modules run against the same bus.
///
/// The first module returning an error stops the chain and the error is
/// passed up unchanged, including [`ModuleError::Terminate`].
#[derive(Clone)]
pub struct Circuit {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub modules: Vec<Arc<dyn Module>>,
}

impl Circuit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            modules: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn wire<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl Module for Circuit {
    fn metadata(&self) -> ModuleMetadata {
        let mut meta = ModuleMetadata {
            id: self.id,
            label: self.name.clone(),
            description: self.description.clone(),
            reads: vec![],
            writes: vec![],
        };
        for module in &self.modules {
            let inner = module.metadata();
            meta.reads.extend(inner.reads);
            meta.writes.extend(inner.writes);
        }
        meta
    }

    async fn execute(&self, bus: &mut Bus) -> ModuleResult {
        for module in &self.modules {
            if let Err(e) = module.execute(bus).await {
                if !matches!(e, ModuleError::Terminate) {
                    tracing::debug!(
                        circuit = %self.name,
                        module = %module.metadata().label,
                        error = %e,
                        "Module failed"
                    );
                }
                return Err(e);
            }
        }
        Ok(())
    }
}
