//! 최신 릴리스 정보 조회 모듈
//!
//! GitHub Releases API의 `releases/latest` 응답에서 태그와 페이지 URL만 사용합니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;

/// Latest published release as described by the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Raw tag, e.g. "v1.2.1"
    pub tag_name: String,
    /// Release page shown to the user
    pub html_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Failed to fetch releases: {0}")]
    Status(String),
    #[error("Failed to parse response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    async fn latest_release(&self) -> Result<ReleaseInfo, FetchError>;
}

pub struct GithubReleaseFeed {
    client: reqwest::Client,
    url: String,
}

impl GithubReleaseFeed {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Request)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, FetchError> {
        Self::new(
            config.releases_url.clone(),
            &config.user_agent,
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl ReleaseFeed for GithubReleaseFeed {
    async fn latest_release(&self) -> Result<ReleaseInfo, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            return Err(FetchError::Status(reason));
        }

        response.json::<ReleaseInfo>().await.map_err(FetchError::Decode)
    }
}
