//! HTTP client for the channel-data gateway
//!
//! The gateway fronts the messaging platform and holds its credentials;
//! this client only needs a base URL and an API key.
//!
//! - `GET {server_url}/channels/{ref}?limit=N&elevated=bool` returns a
//!   channel payload (see [`super`] for the shape)
//! - 404 means the channel does not exist, 403 that it is private

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::reference::ChannelRef;
use crate::types::ChannelData;

use super::{store_avatar, ChannelPayload, ChannelSource};

/// Channel source backed by the HTTP gateway.
pub struct GatewaySource {
    config: UpstreamConfig,
    http_client: reqwest::Client,
    base_url: String,
    avatar_dir: PathBuf,
}

impl GatewaySource {
    /// Create a new gateway client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("upstream.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(api_key) = config.resolved_api_key() {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        let avatar_dir = config.resolved_avatar_dir();

        Ok(Self {
            config,
            http_client,
            base_url,
            avatar_dir,
        })
    }

    fn channel_url(&self, channel: &ChannelRef, elevated: bool) -> String {
        format!(
            "{}/channels/{}?limit={}&elevated={}",
            self.base_url,
            urlencoding::encode(&channel.path_segment()),
            self.config.message_limit,
            elevated
        )
    }

    /// Download the channel avatar into the avatar directory.
    ///
    /// Failures are logged and reported as `None`; a missing avatar never
    /// fails the fetch.
    async fn download_avatar(&self, channel_id: i64, url: &str) -> Option<PathBuf> {
        match self.try_download_avatar(channel_id, url).await {
            Ok(path) => {
                tracing::debug!(channel_id, path = %path.display(), "Avatar downloaded");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(channel_id, error = %e, "Failed to download avatar");
                None
            }
        }
    }

    async fn try_download_avatar(&self, channel_id: i64, url: &str) -> Result<PathBuf> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("avatar request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("avatar download ({})", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("failed to read avatar: {}", e)))?;

        store_avatar(&self.avatar_dir, channel_id, bytes.to_vec()).await
    }
}

#[async_trait]
impl ChannelSource for GatewaySource {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn fetch_channel(&self, reference: &str, elevated: bool) -> Result<ChannelData> {
        let channel = ChannelRef::parse(reference)?;
        let url = self.channel_url(&channel, elevated);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(Error::ChannelNotFound(channel.to_string())),
            StatusCode::FORBIDDEN => return Err(Error::ChannelPrivate(channel.to_string())),
            s if !s.is_success() => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(Error::Upstream(format!(
                    "API error ({}): {}",
                    status, error_text
                )));
            }
            _ => {}
        }

        let payload: ChannelPayload = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("failed to parse response: {}", e)))?;

        if payload.private {
            return Err(Error::ChannelPrivate(channel.to_string()));
        }

        let avatar_path = match (&payload.avatar_url, self.config.download_avatars) {
            (Some(avatar_url), true) => self.download_avatar(payload.id, avatar_url).await,
            _ => None,
        };

        Ok(payload.into_channel_data(self.config.message_limit, avatar_path))
    }
}
