//! Config source fetched over HTTP(S).
//!
//! Used when the `--config` argument is a URL. The response body must be
//! a config document; the format follows the URL's extension and falls
//! back to JSON.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};

use super::{extension_of, parse_validate_hash};
use crate::config::model::Config;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::WaypostError;
use crate::server::HttpClient;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct UrlSource {
    url: String,
    client: HttpClient,
}

impl UrlSource {
    #[must_use]
    pub const fn new(url: String, client: HttpClient) -> Self {
        Self { url, client }
    }

    async fn fetch(&self) -> Result<String, WaypostError> {
        let uri: hyper::Uri = self.url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| WaypostError::UriParse {
                source: Box::new(e),
            },
        )?;

        let req = hyper::Request::builder()
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .map_err(|e| WaypostError::HttpRequest {
                source: Box::new(e),
            })?;

        let response = tokio::time::timeout(FETCH_TIMEOUT, self.client.request(req))
            .await
            .map_err(|_| WaypostError::HttpRequest {
                source: format!("fetching {} timed out", self.url).into(),
            })?
            .map_err(|e| WaypostError::HttpRequest {
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WaypostError::HttpRequest {
                source: format!("{} returned {status}", self.url).into(),
            });
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| WaypostError::HttpRequest {
                source: Box::new(e),
            })?
            .to_bytes();

        String::from_utf8(body.to_vec()).map_err(|e| WaypostError::ConfigParse {
            path: self.url.clone(),
            source: Box::new(e),
        })
    }
}

#[async_trait]
impl ConfigSource for UrlSource {
    fn name(&self) -> &'static str {
        "url"
    }

    fn location(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), WaypostError> {
        let content = self.fetch().await?;
        tracing::debug!(url = %self.url, bytes = content.len(), "fetched remote config");
        parse_validate_hash(extension_of(&self.url), &content, &self.url)
    }
}
