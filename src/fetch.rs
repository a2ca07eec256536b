//! Request execution: a pluggable transport wrapped in a plugin hook chain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::ResourceError;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request. Plugins may rewrite headers and body before it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Request {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Set a header, replacing any previous value (names compare case-insensitively).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw response, body already decoded as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Decoded body. `Value::Null` when the response had no body.
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Response {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The transport. Performs exactly one attempt per call.
///
/// A response with any status is `Ok`; `Err` means no response was obtained.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, ResourceError>;
}

/// A hook around every request.
///
/// Plugins run in registration order and each hook is awaited before the next.
/// An error aborts the request and reaches the caller unchanged.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// A name for errors and tracing.
    fn name(&self) -> &str;

    /// Called before the request is sent. May rewrite headers and body.
    async fn before_request(&self, _request: &mut Request) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Called with every response, successful or not. Observe only.
    async fn after_request(
        &self,
        _request: &Request,
        _response: &Response,
    ) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Runs requests through the plugin chain and the transport.
#[derive(Clone)]
pub struct FetchExecutor {
    fetcher: Arc<dyn Fetcher>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl FetchExecutor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        FetchExecutor {
            fetcher,
            plugins: Vec::new(),
        }
    }

    /// Append a plugin to the chain.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Execute one request and return the response if its status is 2xx.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Response, ResourceError> {
        let mut request = Request::new(method, url);
        request.body = body;

        for plugin in &self.plugins {
            plugin.before_request(&mut request).await?;
        }

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.fetcher.fetch(&request).await?;

        for plugin in &self.plugins {
            plugin.after_request(&request, &response).await?;
        }

        if !response.is_success() {
            return Err(ResourceError::Network {
                status: response.status,
                url: request.url,
            });
        }

        Ok(response)
    }
}

#[cfg(feature = "http")]
pub use self::http::ReqwestFetcher;

#[cfg(feature = "http")]
mod http {
    use super::*;

    /// A `Fetcher` backed by `reqwest`.
    ///
    /// Relative URLs are joined to the base URL when one is set.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestFetcher {
        client: reqwest::Client,
        base_url: Option<String>,
    }

    impl ReqwestFetcher {
        pub fn new() -> Self {
            ReqwestFetcher::default()
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            ReqwestFetcher {
                client,
                base_url: None,
            }
        }

        pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = Some(base_url.into());
            self
        }

        fn resolve_url(&self, url: &str) -> String {
            match &self.base_url {
                Some(base) if !url.contains("://") => {
                    format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
                }
                _ => url.to_string(),
            }
        }
    }

    fn to_reqwest(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    #[async_trait]
    impl Fetcher for ReqwestFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, ResourceError> {
            let url = self.resolve_url(&request.url);
            let mut builder = self.client.request(to_reqwest(request.method), &url);

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ResourceError::Transport(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.to_string(), value.to_string()))
                })
                .collect();

            let bytes = response
                .bytes()
                .await
                .map_err(|e| ResourceError::Transport(e.to_string()))?;

            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                })
            };

            Ok(Response {
                status,
                headers,
                body,
            })
        }
    }

}
