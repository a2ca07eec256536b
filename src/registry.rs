//! Resource descriptors and the registry that resolves them.
//!
//! A resource is a named group of endpoint templates, one per operation.
//! Templates are URLs that may contain `:name` placeholders at the start of a
//! path segment, e.g. `/users/:id` or `https://api.example.com:8443/teams/:team/members`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use url::form_urlencoded;

use crate::config::Config;
use crate::error::ResourceError;
use crate::fetch::Method;
use crate::schema::Validator;
use crate::utils::KEY_SEPARATOR;

/// Parameters of a read or mutation: path placeholders and query values.
pub type Params = serde_json::Map<String, Value>;

/// An operation a resource may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Replace,
    Patch,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Read,
        Operation::Create,
        Operation::Replace,
        Operation::Patch,
        Operation::Delete,
    ];

    /// The HTTP method used to perform the operation.
    pub fn method(self) -> Method {
        match self {
            Operation::Read => Method::Get,
            Operation::Create => Method::Post,
            Operation::Replace => Method::Put,
            Operation::Patch => Method::Patch,
            Operation::Delete => Method::Delete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one resource.
#[derive(Clone)]
pub struct ResourceDescriptor {
    name: String,
    endpoints: BTreeMap<Operation, String>,
    cache_seconds: Option<u64>,
    schema: Option<Arc<dyn Validator>>,
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("name", &self.name)
            .field("endpoints", &self.endpoints)
            .field("cache_seconds", &self.cache_seconds)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl ResourceDescriptor {
    /// Start describing a resource with no endpoints and no caching.
    pub fn new(name: impl Into<String>) -> Self {
        ResourceDescriptor {
            name: name.into(),
            endpoints: BTreeMap::new(),
            cache_seconds: None,
            schema: None,
        }
    }

    /// Set the endpoint template of an operation.
    pub fn endpoint(mut self, operation: Operation, template: impl Into<String>) -> Self {
        self.endpoints.insert(operation, template.into());
        self
    }

    pub fn read(self, template: impl Into<String>) -> Self {
        self.endpoint(Operation::Read, template)
    }

    pub fn create(self, template: impl Into<String>) -> Self {
        self.endpoint(Operation::Create, template)
    }

    pub fn replace(self, template: impl Into<String>) -> Self {
        self.endpoint(Operation::Replace, template)
    }

    pub fn patch(self, template: impl Into<String>) -> Self {
        self.endpoint(Operation::Patch, template)
    }

    pub fn delete(self, template: impl Into<String>) -> Self {
        self.endpoint(Operation::Delete, template)
    }

    /// Cache read results for this many seconds. `0` disables caching.
    pub fn cache_seconds(mut self, seconds: u64) -> Self {
        self.cache_seconds = Some(seconds);
        self
    }

    /// Validate read payloads with `schema`. A failure is reported, not fatal.
    pub fn schema(mut self, schema: Arc<dyn Validator>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint template of an operation, if configured.
    pub fn template(&self, operation: Operation) -> Option<&str> {
        self.endpoints.get(&operation).map(String::as_str)
    }

    /// Cache lifetime in milliseconds. `None` means reads are never cached.
    ///
    /// Lifetimes too large for an `i64` of milliseconds saturate.
    pub fn ttl_ms(&self) -> Option<i64> {
        match self.cache_seconds {
            Some(seconds) if seconds > 0 => Some(
                i64::try_from(seconds)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(1000),
            ),
            _ => None,
        }
    }

    pub fn validator(&self) -> Option<&Arc<dyn Validator>> {
        self.schema.as_ref()
    }

    /// Check the descriptor for configuration errors.
    pub fn validate(&self) -> Result<(), ResourceError> {
        if self.name.is_empty() {
            return Err(ResourceError::Config("resource name is empty".into()));
        }
        if self.name.contains(KEY_SEPARATOR) {
            return Err(ResourceError::Config(format!(
                "resource name '{}' must not contain '{}'",
                self.name, KEY_SEPARATOR
            )));
        }
        if self.endpoints.is_empty() {
            return Err(ResourceError::Config(format!(
                "resource '{}' has no endpoints",
                self.name
            )));
        }

        for (operation, template) in &self.endpoints {
            if template.trim().is_empty() {
                return Err(ResourceError::Config(format!(
                    "resource '{}' has an empty '{}' endpoint",
                    self.name, operation
                )));
            }
            placeholders(template).map_err(|e| {
                ResourceError::Config(format!(
                    "resource '{}' '{}' endpoint: {}",
                    self.name, operation, e
                ))
            })?;
        }

        Ok(())
    }
}

/// A `:name` placeholder inside a template.
#[derive(Debug, PartialEq)]
struct Placeholder<'a> {
    range: Range<usize>,
    name: &'a str,
}

/// Find the placeholders of a template.
///
/// A placeholder is a `:` at the start of a path segment followed by an
/// identifier, so ports and schemes are left alone.
fn placeholders(template: &str) -> Result<Vec<Placeholder<'_>>, String> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let at_segment_start = i == 0 || bytes[i - 1] == b'/';
        if bytes[i] != b':' || !at_segment_start {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }

        let name = &template[i + 1..end];
        if name.is_empty() || name.as_bytes()[0].is_ascii_digit() {
            return Err(format!("malformed placeholder at offset {}", i));
        }

        found.push(Placeholder {
            range: i..end,
            name,
        });
        i = end;
    }

    Ok(found)
}

/// Text form of a parameter value: strings as-is, everything else as JSON.
fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Percent-encode a path segment.
fn encode_segment(text: &str) -> String {
    // form encoding writes spaces as '+' and a literal '+' as %2B
    form_urlencoded::byte_serialize(text.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Registry of configured resources. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, Arc<ResourceDescriptor>>,
}

impl ResourceRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build a registry from a deserialized configuration.
    pub fn from_config(config: Config) -> Result<Self, ResourceError> {
        config.into_builder().build()
    }

    /// Look up a resource by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<ResourceDescriptor>, ResourceError> {
        self.resources
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(name))
    }

    /// Build the URL of an operation.
    ///
    /// Placeholders are filled from `params`. For reads, the remaining params
    /// become the query string; other operations drop them.
    pub fn url_for(
        &self,
        descriptor: &ResourceDescriptor,
        operation: Operation,
        params: Option<&Params>,
    ) -> Result<String, ResourceError> {
        let template =
            descriptor
                .template(operation)
                .ok_or_else(|| ResourceError::EndpointNotConfigured {
                    resource: descriptor.name().to_string(),
                    operation,
                })?;

        let empty = Params::new();
        let params = params.unwrap_or(&empty);
        let found = placeholders(template).map_err(ResourceError::Config)?;

        let mut url = String::with_capacity(template.len());
        let mut last = 0;
        for placeholder in &found {
            let value =
                params
                    .get(placeholder.name)
                    .ok_or_else(|| ResourceError::MissingParam {
                        resource: descriptor.name().to_string(),
                        param: placeholder.name.to_string(),
                    })?;
            url.push_str(&template[last..placeholder.range.start]);
            url.push_str(&encode_segment(&param_text(value)));
            last = placeholder.range.end;
        }
        url.push_str(&template[last..]);

        if operation != Operation::Read {
            return Ok(url);
        }

        let mut remaining: Vec<(&String, &Value)> = params
            .iter()
            .filter(|(key, _)| !found.iter().any(|p| p.name == key.as_str()))
            .collect();
        if remaining.is_empty() {
            return Ok(url);
        }
        remaining.sort_by(|a, b| a.0.cmp(b.0));

        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in remaining {
            query.append_pair(key, &param_text(value));
        }

        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query.finish());
        Ok(url)
    }

    /// Names of all configured resources, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Builder for a `ResourceRegistry`.
///
/// # Example
///
/// ```ignore
/// let registry = ResourceRegistry::builder()
///     .add(ResourceDescriptor::new("users").read("/users").create("/users").cache_seconds(30))
///     .add(ResourceDescriptor::new("user").read("/users/:id").patch("/users/:id"))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    resources: Vec<ResourceDescriptor>,
    schemas: Vec<(String, Arc<dyn Validator>)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Add a resource.
    pub fn add(mut self, descriptor: ResourceDescriptor) -> Self {
        self.resources.push(descriptor);
        self
    }

    /// Attach a schema to a resource added before or after this call.
    pub fn schema(mut self, resource: &str, schema: Arc<dyn Validator>) -> Self {
        self.schemas.push((resource.to_string(), schema));
        self
    }

    /// Validate every resource and build the registry.
    pub fn build(self) -> Result<ResourceRegistry, ResourceError> {
        let mut resources = HashMap::with_capacity(self.resources.len());

        for descriptor in self.resources {
            descriptor.validate()?;
            let name = descriptor.name().to_string();
            if resources.contains_key(&name) {
                return Err(ResourceError::Config(format!(
                    "resource '{}' is configured twice",
                    name
                )));
            }
            resources.insert(name, descriptor);
        }

        for (name, schema) in self.schemas {
            let descriptor = resources.remove(&name).ok_or_else(|| {
                ResourceError::Config(format!("schema given for unknown resource '{}'", name))
            })?;
            resources.insert(name, descriptor.schema(schema));
        }

        Ok(ResourceRegistry {
            resources: resources
                .into_iter()
                .map(|(name, descriptor)| (name, Arc::new(descriptor)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RequiredFields;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    fn registry() -> ResourceRegistry {
        ResourceRegistry::builder()
            .add(
                ResourceDescriptor::new("users")
                    .read("/users")
                    .create("/users")
                    .cache_seconds(5),
            )
            .add(
                ResourceDescriptor::new("user")
                    .read("/users/:id")
                    .replace("/users/:id")
                    .delete("/users/:id"),
            )
            .add(ResourceDescriptor::new("search").read("https://api.example.com:8443/search?v=2"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve() {
        let registry = registry();
        assert_eq!(registry.resolve("users").unwrap().name(), "users");

        let err = registry.resolve("nope").unwrap_err();
        assert_eq!(err, ResourceError::not_found("nope"));
    }

    #[test]
    fn test_url_for_substitutes_placeholders() {
        let registry = registry();
        let user = registry.resolve("user").unwrap();

        let url = registry
            .url_for(&user, Operation::Read, Some(&params(json!({"id": 7}))))
            .unwrap();
        assert_eq!(url, "/users/7");

        let url = registry
            .url_for(&user, Operation::Read, Some(&params(json!({"id": "a b/c"}))))
            .unwrap();
        assert_eq!(url, "/users/a%20b%2Fc");
    }

    #[test]
    fn test_url_for_appends_query_for_reads_only() {
        let registry = registry();
        let user = registry.resolve("user").unwrap();
        let p = params(json!({"id": 1, "expand": "teams", "active": true}));

        let url = registry.url_for(&user, Operation::Read, Some(&p)).unwrap();
        assert_eq!(url, "/users/1?active=true&expand=teams");

        let url = registry.url_for(&user, Operation::Replace, Some(&p)).unwrap();
        assert_eq!(url, "/users/1");
    }

    #[test]
    fn test_url_for_keeps_ports_and_existing_query() {
        let registry = registry();
        let search = registry.resolve("search").unwrap();

        let url = registry
            .url_for(&search, Operation::Read, Some(&params(json!({"q": "a&b"}))))
            .unwrap();
        assert_eq!(url, "https://api.example.com:8443/search?v=2&q=a%26b");
    }

    #[test]
    fn test_url_for_errors() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();
        let user = registry.resolve("user").unwrap();

        let err = registry.url_for(&users, Operation::Delete, None).unwrap_err();
        assert_eq!(
            err,
            ResourceError::EndpointNotConfigured {
                resource: "users".into(),
                operation: Operation::Delete,
            }
        );

        let err = registry.url_for(&user, Operation::Read, None).unwrap_err();
        assert_eq!(
            err,
            ResourceError::MissingParam {
                resource: "user".into(),
                param: "id".into(),
            }
        );
    }

    #[test]
    fn test_ttl() {
        assert_eq!(ResourceDescriptor::new("a").ttl_ms(), None);
        assert_eq!(ResourceDescriptor::new("a").cache_seconds(0).ttl_ms(), None);
        assert_eq!(
            ResourceDescriptor::new("a").cache_seconds(5).ttl_ms(),
            Some(5_000)
        );

        let huge = ResourceDescriptor::new("a").cache_seconds(10u64.pow(16));
        assert_eq!(huge.ttl_ms(), Some(i64::MAX));
        let max = ResourceDescriptor::new("a").cache_seconds(u64::MAX);
        assert_eq!(max.ttl_ms(), Some(i64::MAX));
    }

    #[test]
    fn test_placeholders() {
        let found = placeholders("/teams/:team_id/members/:id.json").unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["team_id", "id"]);

        assert!(placeholders("http://localhost:8080/x").unwrap().is_empty());
        assert!(placeholders("/users/:").is_err());
        assert!(placeholders("/users/:1").is_err());
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let cases = vec![
            ResourceDescriptor::new("").read("/x"),
            ResourceDescriptor::new("a:b").read("/x"),
            ResourceDescriptor::new("empty"),
            ResourceDescriptor::new("blank").read("  "),
            ResourceDescriptor::new("bad").read("/x/:/y"),
        ];

        for descriptor in cases {
            let name = descriptor.name().to_string();
            let result = ResourceRegistry::builder().add(descriptor).build();
            assert!(
                matches!(result, Err(ResourceError::Config(_))),
                "expected config error for '{}'",
                name
            );
        }

        let result = ResourceRegistry::builder()
            .add(ResourceDescriptor::new("a").read("/a"))
            .add(ResourceDescriptor::new("a").read("/b"))
            .build();
        assert!(matches!(result, Err(ResourceError::Config(_))));
    }

    #[test]
    fn test_builder_attaches_schema() {
        let registry = ResourceRegistry::builder()
            .schema("users", Arc::new(RequiredFields::new(["id"])))
            .add(ResourceDescriptor::new("users").read("/users"))
            .build()
            .unwrap();
        assert!(registry.resolve("users").unwrap().validator().is_some());

        let result = ResourceRegistry::builder()
            .schema("ghost", Arc::new(RequiredFields::new(["id"])))
            .build();
        assert!(matches!(result, Err(ResourceError::Config(_))));
    }

    #[test]
    fn test_names() {
        assert_eq!(registry().names(), vec!["search", "user", "users"]);
        assert_eq!(registry().len(), 3);
    }
}
