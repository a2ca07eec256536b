//! Declarative resource configuration.
//!
//! ```json
//! {
//!   "resources": {
//!     "users": { "read": "/users", "create": "/users", "cacheSeconds": 30 },
//!     "user": { "read": "/users/:id", "patch": "/users/:id", "delete": "/users/:id" }
//!   }
//! }
//! ```
//!
//! Schemas can't be expressed in JSON; attach them with
//! [`RegistryBuilder::schema`](crate::registry::RegistryBuilder::schema).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ResourceError;
use crate::registry::{Operation, RegistryBuilder, ResourceDescriptor};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub resources: BTreeMap<String, ResourceConfig>,
}

/// Endpoint templates and caching of one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceConfig {
    pub read: Option<String>,
    pub create: Option<String>,
    pub replace: Option<String>,
    pub patch: Option<String>,
    pub delete: Option<String>,
    pub cache_seconds: Option<u64>,
}

impl Config {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ResourceError> {
        serde_json::from_str(json).map_err(|e| ResourceError::Config(e.to_string()))
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ResourceError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Turn the configuration into a registry builder, so schemas can be attached.
    pub fn into_builder(self) -> RegistryBuilder {
        self.resources
            .into_iter()
            .fold(RegistryBuilder::new(), |builder, (name, resource)| {
                builder.add(resource.into_descriptor(name))
            })
    }
}

impl ResourceConfig {
    fn template(&self, operation: Operation) -> Option<&String> {
        match operation {
            Operation::Read => self.read.as_ref(),
            Operation::Create => self.create.as_ref(),
            Operation::Replace => self.replace.as_ref(),
            Operation::Patch => self.patch.as_ref(),
            Operation::Delete => self.delete.as_ref(),
        }
    }

    pub fn into_descriptor(self, name: impl Into<String>) -> ResourceDescriptor {
        let mut descriptor = ResourceDescriptor::new(name);
        for operation in Operation::ALL {
            if let Some(template) = self.template(operation) {
                descriptor = descriptor.endpoint(operation, template.clone());
            }
        }
        if let Some(seconds) = self.cache_seconds {
            descriptor = descriptor.cache_seconds(seconds);
        }
        descriptor
    }
}
