//! Metadata transport
//!
//! The remote metadata source behind [`MetadataService`](super::MetadataService).
//! Transports return the raw JSON bodies; shape checks happen in the service.
//! Retries and backoff, if any, belong here and not in the service.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::MetadataError;

/// Remote metadata endpoints
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    /// `GET /metadata/classes/{className}/properties` → `{results: PropertyModel[]}`
    async fn class_properties(&self, class_name: &str, lang: &str) -> Result<Value, MetadataError>;

    /// `GET /metadata/ranges/{rangeId}` → `Range[]`
    async fn range(&self, range_id: &str, lang: &str) -> Result<Value, MetadataError>;

    /// `GET /metadata/ranges` → `{[rangeId]: Range[]}`
    async fn all_ranges(&self, lang: &str) -> Result<Value, MetadataError>;
}

/// HTTP transport for the metadata API
pub struct HttpMetadataTransport {
    base_url: String,
    client: Client,
}

impl HttpMetadataTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MetadataError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json(&self, path: &str, lang: &str) -> Result<Value, MetadataError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, lang, "fetching metadata");
        let response = self
            .client
            .get(&url)
            .query(&[("lang", lang)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl MetadataTransport for HttpMetadataTransport {
    async fn class_properties(&self, class_name: &str, lang: &str) -> Result<Value, MetadataError> {
        self.get_json(&format!("/metadata/classes/{}/properties", class_name), lang)
            .await
    }

    async fn range(&self, range_id: &str, lang: &str) -> Result<Value, MetadataError> {
        self.get_json(&format!("/metadata/ranges/{}", range_id), lang).await
    }

    async fn all_ranges(&self, lang: &str) -> Result<Value, MetadataError> {
        self.get_json("/metadata/ranges", lang).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let transport =
            HttpMetadataTransport::new("https://api.example.org/v0/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(transport.base_url, "https://api.example.org/v0");
    }
}
