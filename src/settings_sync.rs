//! 백그라운드 서비스 상태 동기화
//!
//! 서비스 실행 여부, 부팅 시 자동 시작, 다운로드 폴더를 캐시하고
//! 주기적으로 서비스의 실제 상태와 맞춥니다. 로컬 상태는 원격 명령이
//! 성공한 뒤에만 바뀌며, 실패하면 전체 상태를 다시 조회합니다.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{CommandError, ServiceBackend, ServiceStatus};
use crate::config::DEFAULT_POLL_INTERVAL_SECS;
use crate::logging::{LogManager, SOURCE_SETTINGS};

/// Shortest status poll period; `tokio::time::interval` rejects zero.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the caller currently believes about the background service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub service_status: ServiceStatus,
    pub startup_enabled: bool,
    pub download_dir: String,
    /// Set until the first refresh settles.
    pub loading: bool,
    /// Set while a manual organize pass is in flight.
    pub organizing: bool,
    pub error: Option<String>,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            service_status: ServiceStatus::default(),
            startup_enabled: false,
            download_dir: String::new(),
            loading: true,
            organizing: false,
            error: None,
        }
    }
}

pub struct SettingsSync {
    backend: Arc<dyn ServiceBackend>,
    logs: Arc<LogManager>,
    state: RwLock<SettingsSnapshot>,
    poll_interval: Duration,
    lifecycle: CancellationToken,
    activated: AtomicBool,
}

impl SettingsSync {
    pub fn new(backend: Arc<dyn ServiceBackend>, logs: Arc<LogManager>) -> Self {
        Self::with_poll_interval(backend, logs, Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn with_poll_interval(
        backend: Arc<dyn ServiceBackend>,
        logs: Arc<LogManager>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            logs,
            state: RwLock::new(SettingsSnapshot::default()),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            lifecycle: CancellationToken::new(),
            activated: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> SettingsSnapshot {
        self.state.read().await.clone()
    }

    pub fn is_active(&self) -> bool {
        !self.lifecycle.is_cancelled()
    }

    /// Applies `apply` under one write guard, unless the consumer is gone.
    async fn commit(&self, apply: impl FnOnce(&mut SettingsSnapshot)) -> bool {
        let mut state = self.state.write().await;
        if self.lifecycle.is_cancelled() {
            return false;
        }
        apply(&mut state);
        true
    }

    /// Starts the synchronizer: one full refresh plus a status-only poll timer.
    ///
    /// Returns the poll task handle on the first call, `None` afterwards or once
    /// deactivated.
    pub fn activate(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.lifecycle.is_cancelled() || self.activated.swap(true, Ordering::SeqCst) {
            return None;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _ = this.refresh().await;
        });

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = this.lifecycle.cancelled() => break,
                    _ = ticker.tick() => this.poll_service_status().await,
                }
            }
        }))
    }

    /// Stops the poll timer. In-flight calls finish but no longer touch state.
    pub fn deactivate(&self) {
        self.lifecycle.cancel();
    }

    /// Re-reads only the running state; failures are logged and otherwise ignored.
    pub async fn poll_service_status(&self) {
        match self.backend.get_service_status().await {
            Ok(status) => {
                self.commit(move |s| s.service_status = status).await;
            }
            Err(e) => {
                self.logs
                    .warning(SOURCE_SETTINGS, &format!("Service status poll failed: {e}"));
            }
        }
    }

    /// Re-reads status, startup preference and download directory.
    pub async fn refresh(&self) -> Result<(), CommandError> {
        let backend = &self.backend;
        let fetched = tokio::try_join!(
            backend.get_service_status(),
            backend.get_startup_enabled(),
            backend.get_download_dir(),
        );

        match fetched {
            Ok((status, startup, download_dir)) => {
                self.commit(move |s| {
                    s.service_status = status;
                    s.startup_enabled = startup;
                    s.download_dir = download_dir;
                    s.error = None;
                    s.loading = false;
                })
                .await;
                Ok(())
            }
            Err(e) => {
                self.logs
                    .error(SOURCE_SETTINGS, &format!("Failed to fetch settings: {e}"));
                let message = e.message.clone();
                self.commit(move |s| {
                    s.error = Some(message);
                    s.loading = false;
                })
                .await;
                Err(e)
            }
        }
    }

    /// Records a failed mutation and replaces the cache with backend truth.
    ///
    /// The error is visible until the reconciling refresh settles.
    async fn reconcile_after(&self, action: &str, err: CommandError) {
        self.logs
            .error(SOURCE_SETTINGS, &format!("{action} failed: {err}"));
        let message = err.message;
        self.commit(move |s| s.error = Some(message)).await;
        let _ = self.refresh().await;
    }

    pub async fn toggle_service(&self) {
        let running = self.state.read().await.service_status.running;

        let outcome = if running {
            self.backend.stop_service().await
        } else {
            self.backend.start_service().await
        };

        match outcome {
            Ok(()) => {
                self.logs.info(
                    SOURCE_SETTINGS,
                    if running { "Service stopped" } else { "Service started" },
                );
                self.commit(move |s| s.service_status.running = !running).await;
            }
            Err(e) => {
                let action = if running { "Stop service" } else { "Start service" };
                self.reconcile_after(action, e).await;
            }
        }
    }

    pub async fn toggle_startup(&self) {
        let enabled = !self.state.read().await.startup_enabled;

        match self.backend.set_startup_enabled(enabled).await {
            Ok(()) => {
                self.commit(move |s| s.startup_enabled = enabled).await;
            }
            Err(e) => self.reconcile_after("Update startup preference", e).await,
        }
    }

    /// Runs one organize pass now and returns how many files were moved.
    pub async fn organize_now(&self) -> Result<usize, CommandError> {
        self.commit(|s| s.organizing = true).await;

        let outcome = self.backend.trigger_organize_now().await;

        let error = match &outcome {
            Ok(count) => {
                self.logs
                    .info(SOURCE_SETTINGS, &format!("Organized {count} file(s)"));
                None
            }
            Err(e) => {
                self.logs
                    .error(SOURCE_SETTINGS, &format!("Organize failed: {e}"));
                Some(e.message.clone())
            }
        };

        self.commit(move |s| {
            if let Some(message) = error {
                s.error = Some(message);
            }
            s.organizing = false;
        })
        .await;

        outcome
    }

    pub async fn reload_config(&self) -> Result<(), CommandError> {
        self.run_then_refresh("Reload config", self.backend.reload_config())
            .await
    }

    pub async fn reset_to_defaults(&self) -> Result<(), CommandError> {
        self.run_then_refresh("Reset to defaults", self.backend.reset_to_defaults())
            .await
    }

    async fn run_then_refresh(
        &self,
        action: &str,
        call: impl Future<Output = Result<(), CommandError>>,
    ) -> Result<(), CommandError> {
        match call.await {
            Ok(()) => {
                self.logs.info(SOURCE_SETTINGS, &format!("{action} succeeded"));
                let _ = self.refresh().await;
                Ok(())
            }
            Err(e) => {
                self.logs
                    .error(SOURCE_SETTINGS, &format!("{action} failed: {e}"));
                let message = e.message.clone();
                self.commit(move |s| s.error = Some(message)).await;
                Err(e)
            }
        }
    }
}
