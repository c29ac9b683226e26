use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    Direct,
    /// Routed through the rendering proxy so client-side scripts run first.
    Rendered,
}

#[derive(Debug, Clone)]
pub struct Payload {
    pub body: String,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, target: &str, mode: FetchMode) -> Result<Payload, FetchError>;

    /// Whether `FetchMode::Rendered` can be served at all.
    fn can_render(&self) -> bool;
}

/// Rendering proxy reached via URL-embedded API key (ScraperAPI style).
#[derive(Debug, Clone)]
pub struct RenderProxy {
    endpoint: Url,
    api_key: String,
}

impl RenderProxy {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid rendering proxy endpoint {endpoint:?}"))?;
        Ok(Self {
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    pub fn wrap(&self, target: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("url", target)
            .append_pair("render", "true");
        url
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    proxy: Option<RenderProxy>,
    direct_timeout: Duration,
    render_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        let proxy = settings
            .scraperapi_key
            .as_deref()
            .map(|key| RenderProxy::new(&settings.scraperapi_endpoint, key))
            .transpose()?;

        Ok(Self {
            client,
            proxy,
            direct_timeout: settings.direct_timeout,
            render_timeout: settings.render_timeout,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, target: &str, mode: FetchMode) -> Result<Payload, FetchError> {
        let (url, timeout) = match mode {
            FetchMode::Direct => {
                let url = Url::parse(target).map_err(|e| FetchError::Network {
                    url: target.to_string(),
                    reason: e.to_string(),
                })?;
                (url, self.direct_timeout)
            }
            FetchMode::Rendered => {
                let proxy = self.proxy.as_ref().ok_or(FetchError::ProxyConfigMissing)?;
                (proxy.wrap(target), self.render_timeout)
            }
        };

        debug!("Fetching {} ({:?})", target, mode);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(target, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: target.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(target, e))?;

        debug!(
            "Fetched {} bytes from {} ({})",
            body.len(),
            target,
            content_type.as_deref().unwrap_or("unknown type")
        );
        Ok(Payload { body, content_type })
    }

    fn can_render(&self) -> bool {
        self.proxy.is_some()
    }
}
