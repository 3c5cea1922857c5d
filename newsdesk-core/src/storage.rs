use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::PreferenceLimits;
use crate::prefs::UserPreferences;

/// Preferences kept in memory and mirrored to a JSON file after every change.
///
/// Mutations run under one async mutex, including the write to disk, so they
/// land in submission order and the file always reflects the last one.
#[derive(Debug)]
pub struct PreferenceStore {
    inner: Mutex<UserPreferences>,
    path: Option<PathBuf>,
    limits: PreferenceLimits,
}

impl PreferenceStore {
    pub fn in_memory(limits: PreferenceLimits) -> Self {
        Self {
            inner: Mutex::new(UserPreferences::default()),
            path: None,
            limits,
        }
    }

    /// Loads `path`, falling back to its `.json.tmp` sibling and then to defaults.
    pub async fn load_from(path: impl AsRef<Path>, limits: PreferenceLimits) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut prefs: UserPreferences = read_json_with_tmp_fallback(&path).await;
        prefs.enforce(&limits);
        Self {
            inner: Mutex::new(prefs),
            path: Some(path),
            limits,
        }
    }

    pub fn limits(&self) -> &PreferenceLimits {
        &self.limits
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self) -> UserPreferences {
        self.inner.lock().await.clone()
    }

    /// Applies `change` and persists the result before releasing the lock.
    pub async fn update<R>(&self, change: impl FnOnce(&mut UserPreferences, &PreferenceLimits) -> R) -> R {
        let mut prefs = self.inner.lock().await;
        let result = change(&mut *prefs, &self.limits);
        self.persist(&*prefs).await;
        result
    }

    async fn persist(&self, prefs: &UserPreferences) {
        let Some(path) = &self.path else {
            debug!("preference store is in-memory only; skipping persist");
            return;
        };
        let bytes = match serde_json::to_vec_pretty(prefs) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize preferences");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            warn!(error = %e, path = %tmp.display(), "failed to write temp preferences file");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            warn!(error = %e, path = %path.display(), "failed to persist preferences");
        }
    }
}

async fn read_json_with_tmp_fallback<T: DeserializeOwned + Default>(path: &Path) -> T {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse JSON, trying tmp fallback");
                let tmp = path.with_extension("json.tmp");
                match tokio::fs::read(&tmp).await {
                    Ok(tmp_bytes) => serde_json::from_slice::<T>(&tmp_bytes).unwrap_or_default(),
                    Err(_) => T::default(),
                }
            }
        },
        Err(e) => {
            debug!(error = %e, path = %path.display(), "no preferences file, using defaults");
            T::default()
        }
    }
}
