//! HTTP source for the public provinces open API
//!
//! Issues a single `GET {base_url}?depth={depth}` and decodes the JSON array
//! of provinces. A `null` body is treated the same as `[]`.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::DivisionSource;
use crate::config::UpstreamConfig;
use crate::errors::{UpstreamError, UpstreamResult};
use crate::models::Province;

pub struct OpenApiDivisionSource {
    client: Client,
    base_url: String,
    depth: u8,
}

impl OpenApiDivisionSource {
    pub fn new(config: &UpstreamConfig) -> UpstreamResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| UpstreamError::transport(&config.base_url, e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            depth: config.depth,
        })
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::timeout(&self.base_url)
        } else {
            UpstreamError::transport(&self.base_url, error.to_string())
        }
    }
}

#[async_trait]
impl DivisionSource for OpenApiDivisionSource {
    async fn fetch(&self) -> UpstreamResult<Vec<Province>> {
        debug!("Fetching divisions from {} (depth={})", self.base_url, self.depth);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("depth", self.depth)])
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                url: self.base_url.clone(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        debug!("Fetched {} bytes from {}", body.len(), self.base_url);

        let provinces: Option<Vec<Province>> = serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::decode(format!("Invalid provinces payload: {e}")))?;

        Ok(provinces.unwrap_or_default())
    }

    fn describe(&self) -> String {
        format!("{}?depth={}", self.base_url, self.depth)
    }
}
