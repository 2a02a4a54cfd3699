//! 새 릴리스 확인 및 알림 중복 방지
//!
//! 실행 중인 버전보다 새로운 릴리스가 있으면 한 번만 알림을 띄우고,
//! 사용자가 닫은 버전은 저장소에 기록해 다시 알리지 않습니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::logging::{LogManager, SOURCE_UPDATES};
use crate::notifier::{notify_update_available, Notifier};
use crate::release_feed::ReleaseFeed;
use crate::store::{PreferenceStore, CHECK_UPDATES_ENABLED_KEY, LAST_NOTIFIED_VERSION_KEY};
use crate::version::is_newer_release;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateState {
    /// A newer, not yet dismissed release exists.
    pub available: bool,
    /// Latest known release tag, dismissed or not.
    pub version: Option<String>,
    pub url: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSnapshot {
    #[serde(flatten)]
    pub state: UpdateState,
    pub check_updates_enabled: bool,
}

/// How one check cycle settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Disabled,
    NoUpdate,
    Dismissed,
    Available,
    Failed,
    /// The tracker was deactivated; nothing was fetched.
    Inactive,
}

/// Decides what a fetched release tag means for the running build.
pub fn evaluate_release(tag: &str, current_version: &str, last_notified: Option<&str>) -> CheckOutcome {
    if !is_newer_release(tag, current_version) {
        return CheckOutcome::NoUpdate;
    }
    if last_notified == Some(tag) {
        return CheckOutcome::Dismissed;
    }
    CheckOutcome::Available
}

pub struct UpdateTracker {
    feed: Arc<dyn ReleaseFeed>,
    store: Arc<dyn PreferenceStore>,
    notifier: Arc<dyn Notifier>,
    logs: Arc<LogManager>,
    current_version: String,
    state: RwLock<UpdateState>,
    enabled: watch::Sender<bool>,
    lifecycle: CancellationToken,
    activated: AtomicBool,
}

impl UpdateTracker {
    pub fn new(
        feed: Arc<dyn ReleaseFeed>,
        store: Arc<dyn PreferenceStore>,
        notifier: Arc<dyn Notifier>,
        logs: Arc<LogManager>,
        current_version: impl Into<String>,
    ) -> Self {
        // absent means enabled; anything but "true" means disabled
        let enabled = store
            .get(CHECK_UPDATES_ENABLED_KEY)
            .map(|value| value == "true")
            .unwrap_or(true);
        let (enabled, _) = watch::channel(enabled);

        Self {
            feed,
            store,
            notifier,
            logs,
            current_version: current_version.into(),
            state: RwLock::new(UpdateState::default()),
            enabled,
            lifecycle: CancellationToken::new(),
            activated: AtomicBool::new(false),
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn is_check_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    pub async fn snapshot(&self) -> UpdateSnapshot {
        UpdateSnapshot {
            state: self.state.read().await.clone(),
            check_updates_enabled: self.is_check_enabled(),
        }
    }

    async fn commit(&self, apply: impl FnOnce(&mut UpdateState)) -> bool {
        let mut state = self.state.write().await;
        if self.lifecycle.is_cancelled() {
            return false;
        }
        apply(&mut state);
        true
    }

    /// Checks once now and again every time the enabled flag changes.
    pub fn activate(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.lifecycle.is_cancelled() || self.activated.swap(true, Ordering::SeqCst) {
            return None;
        }

        let this = Arc::clone(self);
        let mut enabled_rx = self.enabled.subscribe();
        Some(tokio::spawn(async move {
            this.check_for_updates().await;

            loop {
                tokio::select! {
                    _ = this.lifecycle.cancelled() => break,
                    changed = enabled_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let _ = enabled_rx.borrow_and_update();
                        this.check_for_updates().await;
                    }
                }
            }
        }))
    }

    pub fn deactivate(&self) {
        self.lifecycle.cancel();
    }

    /// Flips and persists the enabled flag, returning the new value.
    pub fn toggle_check_updates_enabled(&self) -> bool {
        let mut enabled = true;
        self.enabled.send_modify(|value| {
            *value = !*value;
            enabled = *value;
        });

        let stored = if enabled { "true" } else { "false" };
        if let Err(e) = self.store.set(CHECK_UPDATES_ENABLED_KEY, stored) {
            self.logs
                .error(SOURCE_UPDATES, &format!("Failed to persist update preference: {e:#}"));
        }
        enabled
    }

    /// On-demand check, e.g. from a "check now" button.
    pub async fn refresh_update_check(&self) -> CheckOutcome {
        self.check_for_updates().await
    }

    pub async fn check_for_updates(&self) -> CheckOutcome {
        if self.lifecycle.is_cancelled() {
            return CheckOutcome::Inactive;
        }
        if !self.is_check_enabled() {
            self.commit(|s| {
                s.available = false;
                s.loading = false;
            })
            .await;
            return CheckOutcome::Disabled;
        }

        self.commit(|s| {
            s.loading = true;
            s.error = None;
        })
        .await;

        let release = match self.feed.latest_release().await {
            Ok(release) => release,
            Err(e) => {
                self.logs
                    .error(SOURCE_UPDATES, &format!("Update check failed: {e}"));
                let message = e.to_string();
                self.commit(move |s| {
                    s.loading = false;
                    s.error = Some(message);
                })
                .await;
                return CheckOutcome::Failed;
            }
        };

        let last_notified = self.store.get(LAST_NOTIFIED_VERSION_KEY);
        let outcome = evaluate_release(
            &release.tag_name,
            &self.current_version,
            last_notified.as_deref(),
        );
        self.logs.info(
            SOURCE_UPDATES,
            &format!(
                "Latest release {} (running {}): {:?}",
                release.tag_name, self.current_version, outcome
            ),
        );

        let tag = release.tag_name.clone();
        let settled = UpdateState {
            available: outcome == CheckOutcome::Available,
            version: Some(release.tag_name),
            url: Some(release.html_url),
            loading: false,
            error: None,
        };
        let committed = self.commit(move |s| *s = settled).await;

        if committed && outcome == CheckOutcome::Available {
            notify_update_available(self.notifier.as_ref(), &self.logs, &tag);
        }
        outcome
    }

    /// Records the pending version as dismissed; returns it, or `None` when nothing was pending.
    pub async fn dismiss_notification(&self) -> Option<String> {
        if self.lifecycle.is_cancelled() {
            return None;
        }
        let version = self.state.read().await.version.clone()?;

        if let Err(e) = self.store.set(LAST_NOTIFIED_VERSION_KEY, &version) {
            self.logs
                .error(SOURCE_UPDATES, &format!("Failed to persist dismissed version: {e:#}"));
        }
        let committed = self
            .commit(|s| {
                if s.version.as_deref() == Some(version.as_str()) {
                    s.available = false;
                }
            })
            .await;
        committed.then_some(version)
    }
}
