//! Stream listing HTTP client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::StreamCatalog;
use crate::config::CatalogConfig;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct ListStreamsResp {
    #[serde(rename = "StreamNames", default)]
    stream_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DescribeStreamResp {
    #[serde(rename = "StreamDescription", default)]
    stream_description: StreamDescription,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDescription {
    #[serde(rename = "Shards", default)]
    shards: Vec<ShardDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ShardDescriptor {
    #[serde(rename = "ShardId")]
    shard_id: String,
}

/// Catalog backed by the stream API
///
/// `GET {base}` lists stream names, `GET {base}{name}` describes one stream.
pub struct HttpStreamCatalog {
    base_url: String,
    auth_header: String,
    auth_token: Option<String>,
    client: Client,
}

impl HttpStreamCatalog {
    #[must_use]
    pub fn new(config: &CatalogConfig, client: Client) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            auth_header: config.auth_header.clone(),
            auth_token: config.auth_token.clone(),
            client,
        }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.auth_token {
            Some(token) => request.header(self.auth_header.as_str(), token.as_str()),
            None => request,
        }
    }
}

#[async_trait]
impl StreamCatalog for HttpStreamCatalog {
    async fn list_streams(&self) -> Result<Vec<String>> {
        let response = self
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| Error::DiscoveryUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DiscoveryUnavailable(format!(
                "stream listing responded with {status}"
            )));
        }

        let body: ListStreamsResp = response
            .json()
            .await
            .map_err(|e| Error::DiscoveryUnavailable(format!("malformed stream listing: {e}")))?;

        Ok(body.stream_names)
    }

    async fn describe_stream(&self, name: &str) -> Result<Vec<String>> {
        let url = format!("{}{}", self.base_url, name);
        let metadata_error = |message: String| Error::StreamMetadata {
            stream: name.to_string(),
            message,
        };

        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| metadata_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(metadata_error(format!("description responded with {status}")));
        }

        let body: DescribeStreamResp = response
            .json()
            .await
            .map_err(|e| metadata_error(format!("malformed description: {e}")))?;

        Ok(body
            .stream_description
            .shards
            .into_iter()
            .map(|shard| shard.shard_id)
            .collect())
    }
}
