use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::types::{DownloadDirBody, ErrorBody, OrganizeBody, StartupBody};
use super::{CommandError, ServiceBackend, ServiceStatus};
use crate::config::ClientConfig;

/// Talks to the service's local JSON control endpoint.
pub struct HttpServiceBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpServiceBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CommandError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, CommandError> {
        Self::new(config.backend_url.clone(), config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, CommandError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(CommandError::new(error_message(status, &body)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CommandError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post(&self, path: &str) -> Result<reqwest::Response, CommandError> {
        self.send(self.client.post(self.url(path))).await
    }
}

/// Picks the most useful message out of a failed response.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("Backend responded with {status}")
}

#[async_trait]
impl ServiceBackend for HttpServiceBackend {
    async fn get_service_status(&self) -> Result<ServiceStatus, CommandError> {
        self.get_json("/service/status").await
    }

    async fn start_service(&self) -> Result<(), CommandError> {
        self.post("/service/start").await?;
        Ok(())
    }

    async fn stop_service(&self) -> Result<(), CommandError> {
        self.post("/service/stop").await?;
        Ok(())
    }

    async fn get_startup_enabled(&self) -> Result<bool, CommandError> {
        let body: StartupBody = self.get_json("/startup").await?;
        Ok(body.enabled)
    }

    async fn set_startup_enabled(&self, enabled: bool) -> Result<(), CommandError> {
        let request = self
            .client
            .put(self.url("/startup"))
            .json(&StartupBody { enabled });
        self.send(request).await?;
        Ok(())
    }

    async fn get_download_dir(&self) -> Result<String, CommandError> {
        let body: DownloadDirBody = self.get_json("/download-dir").await?;
        Ok(body.path)
    }

    async fn trigger_organize_now(&self) -> Result<usize, CommandError> {
        let response = self.post("/organize").await?;
        let body: OrganizeBody = response.json().await?;
        Ok(body.count)
    }

    async fn reload_config(&self) -> Result<(), CommandError> {
        self.post("/config/reload").await?;
        Ok(())
    }

    async fn reset_to_defaults(&self) -> Result<(), CommandError> {
        self.post("/config/reset").await?;
        Ok(())
    }
}
