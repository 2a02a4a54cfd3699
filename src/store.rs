//! 설정 키-값 저장소
//!
//! 업데이트 확인 여부와 마지막으로 알림을 닫은 버전을 프로세스 재시작 후에도
//! 유지합니다. 테스트에서는 `MemoryStore`로 대체할 수 있습니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Key holding "true"/"false" for automatic update checks.
pub const CHECK_UPDATES_ENABLED_KEY: &str = "check_updates_enabled";

/// Key holding the release tag whose notification the user already dismissed.
pub const LAST_NOTIFIED_VERSION_KEY: &str = "last_notified_version";

/// Preference file name inside the app data directory
pub const PREFERENCES_FILE: &str = "preferences.json";

/// String-keyed, last-writer-wins preference storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

fn lock_map(map: &Mutex<HashMap<String, String>>) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock_map(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock_map(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// 평평한 JSON 객체 하나로 저장되는 파일 기반 저장소
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// 파일이 없거나 읽을 수 없으면 빈 저장소로 시작합니다.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::load(&path).unwrap_or_default();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Option<HashMap<String, String>> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock_map(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock_map(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }
}
