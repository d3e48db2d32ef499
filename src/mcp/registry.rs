//! Tool registry.
//!
//! Tools are registered once through [`ToolRegistryBuilder`]; the built
//! [`ToolRegistry`] is read-only and shared behind an `Arc`.

use super::models::{ToolDescriptor, ToolOutput};
use crate::error::{ProtocolError, RegistryError, ToolError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Uniform invocation interface shared by every backend wrapper.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Runs the tool with arguments that already passed schema validation.
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    descriptors: Vec<ToolDescriptor>,
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolHandler + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn ToolHandler>) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateToolName(descriptor.name));
        }

        debug!(tool = %descriptor.name, "Registering tool");
        self.index
            .insert(descriptor.name.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        self.handlers.push(tool);
        Ok(())
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            descriptors: self.descriptors,
            handlers: self.handlers,
            index: self.index,
        }
    }
}

pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// All descriptors, in registration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn resolve(
        &self,
        name: &str,
    ) -> Result<(&ToolDescriptor, Arc<dyn ToolHandler>), ProtocolError> {
        let position = *self
            .index
            .get(name)
            .ok_or_else(|| ProtocolError::UnknownTool(name.to_string()))?;
        Ok((
            &self.descriptors[position],
            Arc::clone(&self.handlers[position]),
        ))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
