use crate::registry::Operation;

/// Error type for resource and cache operations.
///
/// The type is `Clone` so a single in-flight revalidation can hand the same
/// failure to every caller awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The resource name is not present in the registry.
    #[error("resource '{resource}' is not configured")]
    NotFound { resource: String },

    /// The resource exists but has no endpoint template for the operation.
    #[error("resource '{resource}' has no '{operation}' endpoint")]
    EndpointNotConfigured {
        resource: String,
        operation: Operation,
    },

    /// A path placeholder had no matching parameter.
    #[error("resource '{resource}' requires parameter '{param}'")]
    MissingParam { resource: String, param: String },

    /// The operation cannot be used on this path (e.g. `read` passed to `mutate`).
    #[error("operation '{operation}' is not a mutation")]
    InvalidOperation { operation: Operation },

    /// The request completed with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Network { status: u16, url: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request plugin aborted the request.
    #[error("plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// An explicit revalidation settled without leaving a cached value.
    #[error("revalidation of '{key}' left no cached value")]
    Revalidation { key: String },

    /// A cache store operation failed.
    #[error("[{store}] cache error for key '{key}': {message}")]
    Store {
        store: String,
        key: String,
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The resource configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ResourceError {
    /// Create a new store error.
    pub fn store(
        store: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ResourceError::Store {
            store: store.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new plugin error.
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        ResourceError::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a new not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        ResourceError::NotFound {
            resource: resource.into(),
        }
    }

    /// HTTP status of a `Network` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ResourceError::Network { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        ResourceError::Serialization(err.to_string())
    }
}
