pub mod http;
pub mod types;

use async_trait::async_trait;

pub use http::HttpServiceBackend;
pub use types::{CommandError, ServiceStatus};

/// Command surface of the background organizer service.
///
/// Every call is a request/response round trip; any failure the service reports
/// (or any failure to reach it) comes back as a [`CommandError`].
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    async fn get_service_status(&self) -> Result<ServiceStatus, CommandError>;

    async fn start_service(&self) -> Result<(), CommandError>;

    async fn stop_service(&self) -> Result<(), CommandError>;

    async fn get_startup_enabled(&self) -> Result<bool, CommandError>;

    async fn set_startup_enabled(&self, enabled: bool) -> Result<(), CommandError>;

    async fn get_download_dir(&self) -> Result<String, CommandError>;

    /// Runs one matching pass right away and returns how many files were moved.
    async fn trigger_organize_now(&self) -> Result<usize, CommandError>;

    async fn reload_config(&self) -> Result<(), CommandError>;

    async fn reset_to_defaults(&self) -> Result<(), CommandError>;
}
