//! Remote accessor abstraction
//!
//! Routes are written as `"<METHOD> <path template>"`, e.g.
//! `"PUT /repos/:org/:repo/environments/:environment_name"`. The params map
//! supplies both the placeholder values and the query/body fields.

use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Placeholder values plus query/body fields for one request
pub type Params = serde_json::Map<String, Value>;

/// Page size used by [`paginate`]
pub const PAGE_SIZE: usize = 100;

/// Read and write access to a remote resource collection
///
/// Implementations own transport, authentication and timeouts. Errors must
/// carry the numeric status code when the remote supplied one so that 404s
/// can be told apart from other failures.
#[async_trait]
pub trait RemoteAccessor: Send + Sync {
    async fn request(&self, route: &str, params: &Params) -> Result<Value>;
}

/// Build a [`Params`] map from a `json!({...})` object literal.
///
/// Anything that is not an object yields an empty map.
pub fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// HTTP method of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(ReconcileError::InvalidRoute(format!(
                "unsupported method: {}",
                other
            ))),
        }
    }
}

/// A parsed `"<METHOD> <path template>"` route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<'a> {
    pub method: Method,
    pub template: &'a str,
}

impl<'a> Route<'a> {
    pub fn parse(route: &'a str) -> Result<Self> {
        let (method, template) = route
            .trim()
            .split_once(' ')
            .ok_or_else(|| ReconcileError::InvalidRoute(route.to_string()))?;
        let template = template.trim();
        if !template.starts_with('/') {
            return Err(ReconcileError::InvalidRoute(route.to_string()));
        }

        Ok(Self {
            method: method.parse()?,
            template,
        })
    }

    /// Substitute placeholders from `params`; whatever is left becomes the body.
    pub fn expand(&self, params: &Params) -> Result<RequestDescriptor> {
        let mut body = params.clone();
        let mut segments = Vec::new();

        for segment in self.template.split('/') {
            match segment.strip_prefix(':') {
                Some(name) => {
                    let value = body.remove(name).ok_or_else(|| {
                        ReconcileError::InvalidRoute(format!(
                            "missing value for :{} in {}",
                            name, self.template
                        ))
                    })?;
                    segments.push(urlencoding::encode(&path_value(name, &value)?).into_owned());
                }
                None => segments.push(segment.to_string()),
            }
        }

        Ok(RequestDescriptor {
            method: self.method,
            path: segments.join("/"),
            body,
        })
    }
}

/// Concrete request after placeholder expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    /// Query fields for GET, JSON body for everything else
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub body: Params,
}

impl std::fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

fn path_value(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ReconcileError::InvalidRoute(format!(
            "value for :{} must be a string or number",
            name
        ))),
    }
}

/// Read every page of a list endpoint, collecting the array found under `key`.
///
/// Stops on a short page or once `total_count` (when reported) is reached.
/// A missing or null `key` counts as an empty page.
pub async fn paginate(
    remote: &dyn RemoteAccessor,
    route: &str,
    params: &Params,
    key: &str,
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut page: u64 = 1;

    loop {
        let mut page_params = params.clone();
        page_params.insert("per_page".to_string(), Value::from(PAGE_SIZE));
        page_params.insert("page".to_string(), Value::from(page));

        let data = remote.request(route, &page_params).await?;
        let batch = match data.get(key) {
            Some(Value::Array(values)) => values.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(ReconcileError::remote(
                    None,
                    format!("expected an array under `{}` from {}", key, route),
                ));
            }
        };

        let fetched = batch.len();
        items.extend(batch);

        let total = data.get("total_count").and_then(Value::as_u64);
        let complete = total.is_some_and(|total| items.len() as u64 >= total);
        if fetched < PAGE_SIZE || complete {
            break;
        }
        page += 1;
    }

    tracing::debug!(route, count = items.len(), "Fetched paginated list");
    Ok(items)
}
