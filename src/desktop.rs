//! Tauri host: exposes both synchronizers to the webview as commands.

use std::sync::Arc;

use tauri::{Manager, State};
use tauri_plugin_notification::{NotificationExt, PermissionState};

use crate::backend::HttpServiceBackend;
use crate::config::ClientConfig;
use crate::logging::{LogEntry, LogManager};
use crate::notifier::{Notifier, NotifyError};
use crate::release_feed::GithubReleaseFeed;
use crate::settings_sync::{SettingsSnapshot, SettingsSync};
use crate::store::{JsonFileStore, PREFERENCES_FILE};
use crate::update_tracker::{UpdateSnapshot, UpdateTracker};
use crate::APP_VERSION;

/// Client config file name inside the app data directory
pub const CONFIG_FILE: &str = "harbor.client.yaml";

pub struct AppState {
    pub settings: Arc<SettingsSync>,
    pub updates: Arc<UpdateTracker>,
    pub log_manager: Arc<LogManager>,
}

/// Native notifications through the Tauri notification plugin.
pub struct TauriNotifier {
    app: tauri::AppHandle,
}

impl Notifier for TauriNotifier {
    fn permission_granted(&self) -> Result<bool, NotifyError> {
        let state = self
            .app
            .notification()
            .permission_state()
            .map_err(NotifyError::new)?;
        Ok(matches!(state, PermissionState::Granted))
    }

    fn request_permission(&self) -> Result<bool, NotifyError> {
        let state = self
            .app
            .notification()
            .request_permission()
            .map_err(NotifyError::new)?;
        Ok(matches!(state, PermissionState::Granted))
    }

    fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.app
            .notification()
            .builder()
            .title(title)
            .body(body)
            .show()
            .map_err(NotifyError::new)
    }
}

#[tauri::command]
fn get_app_version() -> String {
    crate::get_app_version()
}

#[tauri::command]
async fn get_settings_snapshot(state: State<'_, AppState>) -> Result<SettingsSnapshot, String> {
    Ok(state.settings.snapshot().await)
}

#[tauri::command]
async fn refresh_settings(state: State<'_, AppState>) -> Result<SettingsSnapshot, String> {
    state.settings.refresh().await.map_err(|e| e.to_string())?;
    Ok(state.settings.snapshot().await)
}

#[tauri::command]
async fn toggle_service(state: State<'_, AppState>) -> Result<SettingsSnapshot, String> {
    state.settings.toggle_service().await;
    Ok(state.settings.snapshot().await)
}

#[tauri::command]
async fn toggle_startup(state: State<'_, AppState>) -> Result<SettingsSnapshot, String> {
    state.settings.toggle_startup().await;
    Ok(state.settings.snapshot().await)
}

#[tauri::command]
async fn organize_now(state: State<'_, AppState>) -> Result<usize, String> {
    state.settings.organize_now().await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn reload_config(state: State<'_, AppState>) -> Result<SettingsSnapshot, String> {
    state.settings.reload_config().await.map_err(|e| e.to_string())?;
    Ok(state.settings.snapshot().await)
}

#[tauri::command]
async fn reset_to_defaults(state: State<'_, AppState>) -> Result<SettingsSnapshot, String> {
    state
        .settings
        .reset_to_defaults()
        .await
        .map_err(|e| e.to_string())?;
    Ok(state.settings.snapshot().await)
}

#[tauri::command]
async fn get_update_snapshot(state: State<'_, AppState>) -> Result<UpdateSnapshot, String> {
    Ok(state.updates.snapshot().await)
}

#[tauri::command]
async fn toggle_check_updates(state: State<'_, AppState>) -> Result<UpdateSnapshot, String> {
    state.updates.toggle_check_updates_enabled();
    Ok(state.updates.snapshot().await)
}

#[tauri::command]
async fn refresh_update_check(state: State<'_, AppState>) -> Result<UpdateSnapshot, String> {
    state.updates.refresh_update_check().await;
    Ok(state.updates.snapshot().await)
}

#[tauri::command]
async fn dismiss_update_notification(state: State<'_, AppState>) -> Result<UpdateSnapshot, String> {
    state.updates.dismiss_notification().await;
    Ok(state.updates.snapshot().await)
}

#[tauri::command]
fn get_system_logs(source: Option<String>, state: State<'_, AppState>) -> Vec<LogEntry> {
    state.log_manager.get_logs(source.as_deref())
}

fn build_state(app: &tauri::App) -> Result<AppState, Box<dyn std::error::Error>> {
    let app_data = app.path().app_data_dir()?;
    let config = ClientConfig::load_or_default(app_data.join(CONFIG_FILE))?;
    let log_manager = Arc::new(LogManager::default());

    let settings = SettingsSync::with_poll_interval(
        Arc::new(HttpServiceBackend::from_config(&config)?),
        log_manager.clone(),
        config.poll_interval(),
    );
    let updates = UpdateTracker::new(
        Arc::new(GithubReleaseFeed::from_config(&config)?),
        Arc::new(JsonFileStore::open(app_data.join(PREFERENCES_FILE))),
        Arc::new(TauriNotifier {
            app: app.handle().clone(),
        }),
        log_manager.clone(),
        APP_VERSION,
    );

    Ok(AppState {
        settings: Arc::new(settings),
        updates: Arc::new(updates),
        log_manager,
    })
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .setup(|app| {
            let state = build_state(app)?;
            let settings = state.settings.clone();
            let updates = state.updates.clone();
            app.manage(state);

            tauri::async_runtime::spawn(async move {
                settings.activate();
                updates.activate();
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_app_version,
            get_settings_snapshot,
            refresh_settings,
            toggle_service,
            toggle_startup,
            organize_now,
            reload_config,
            reset_to_defaults,
            get_update_snapshot,
            toggle_check_updates,
            refresh_update_check,
            dismiss_update_notification,
            get_system_logs,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                let state = app.state::<AppState>();
                state.settings.deactivate();
                state.updates.deactivate();
            }
        });
}
