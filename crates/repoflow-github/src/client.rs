//! GitHub REST API client
//!
//! Implements [`RemoteAccessor`] on top of reqwest with bearer token
//! authentication.

use crate::error::{GitHubError, Result};
use async_trait::async_trait;
use repoflow_core::{Method, Params, ReconcileError, RemoteAccessor, Route};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";

/// Configuration for the GitHub client
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub api_url: String,
}

impl GitHubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Create GitHubConfig from environment variables
    ///
    /// `GITHUB_TOKEN` is required; `GITHUB_API_URL` points at a GitHub
    /// Enterprise Server instance when set.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GitHubError::MissingEnvVar("GITHUB_TOKEN".to_string()))?;
        let api_url = std::env::var("GITHUB_API_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self { token, api_url })
    }
}

/// GitHub REST accessor
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    api_url: String,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        if !config.api_url.starts_with("http://") && !config.api_url.starts_with("https://") {
            return Err(GitHubError::InvalidConfig(format!(
                "API URL must be http(s): {}",
                config.api_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .user_agent(concat!("repoflow/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            token: config.token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl RemoteAccessor for GitHubClient {
    async fn request(&self, route: &str, params: &Params) -> repoflow_core::Result<Value> {
        let request = Route::parse(route)?.expand(params)?;
        let url = format!("{}{}", self.api_url, request.path);

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token);
        if !request.body.is_empty() {
            builder = if request.method.is_mutating() {
                builder.json(&request.body)
            } else {
                builder.query(&query_pairs(&request.body))
            };
        }

        tracing::trace!(%request, "Sending GitHub request");
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| body.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(ReconcileError::remote(Some(status.as_u16()), message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn query_pairs(fields: &Params) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn transport_error(err: reqwest::Error) -> ReconcileError {
    ReconcileError::remote(err.status().map(|s| s.as_u16()), err.to_string())
}
