//! Catalog client
//!
//! The monitor service's REST API records runs, STF files, TF files and
//! workflow stages. Everything the agent writes goes through [`CatalogApi`],
//! so tests can swap in an in-memory catalog.

use crate::config::CatalogConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Generic JSON call against the catalog API.
///
/// `path` is relative to the API root and starts with `/`, e.g. `/runs/`.
/// Empty response bodies come back as `Value::Null`.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CatalogError>;
}

pub async fn get_json<T: DeserializeOwned>(
    api: &dyn CatalogApi,
    path: &str,
) -> Result<T, CatalogError> {
    let value = api.call(Method::Get, path, None).await?;
    decode(path, value)
}

pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
    api: &dyn CatalogApi,
    path: &str,
    body: &B,
) -> Result<T, CatalogError> {
    let body = serde_json::to_value(body).map_err(CatalogError::Encode)?;
    let value = api.call(Method::Post, path, Some(body)).await?;
    decode(path, value)
}

pub async fn patch_json<B: Serialize + Sync, T: DeserializeOwned>(
    api: &dyn CatalogApi,
    path: &str,
    body: &B,
) -> Result<T, CatalogError> {
    let body = serde_json::to_value(body).map_err(CatalogError::Encode)?;
    let value = api.call(Method::Patch, path, Some(body)).await?;
    decode(path, value)
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, CatalogError> {
    serde_json::from_value(value).map_err(|source| CatalogError::Decode {
        path: path.to_string(),
        source,
    })
}

/// reqwest-backed catalog client.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CatalogApi for HttpCatalog {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut req = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
        };
        if let Some(token) = &self.token {
            req = req.header(reqwest::header::AUTHORIZATION, format!("Token {}", token));
        }
        if let Some(body) = &body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(CatalogError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|source| CatalogError::Decode {
            path: path.to_string(),
            source,
        })
    }
}
