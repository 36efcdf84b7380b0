use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModuleMetadata {
    pub id: Uuid,
    pub label: String,
    pub description: Option<String>,
    /// Type names this module reads from the bus.
    pub reads: Vec<TypeInfo>,
    /// Type names this module writes to the bus.
    pub writes: Vec<TypeInfo>,
}

impl ModuleMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn reads<T: 'static>(mut self) -> Self {
        self.reads.push(TypeInfo::of::<T>());
        self
    }

    pub fn writes<T: 'static>(mut self) -> Self {
        self.writes.push(TypeInfo::of::<T>());
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn of<T: 'static>() -> Self {
        Self::new(std::any::type_name::<T>())
    }
}
