use crate::error::AppError;
use crate::models::settings_types::AppSettings;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const APP_DIR: &str = "photo-sorter";
const SETTINGS_FILE: &str = "settings.json";

/// Persistent key-value store behind the user's preferences.
pub trait SettingsStore {
    fn load(&self) -> Result<AppSettings, AppError>;
    fn save(&self, settings: &AppSettings) -> Result<(), AppError>;

    /// Load, apply `change`, save, and return the saved value.
    fn update<F>(&self, change: F) -> Result<AppSettings, AppError>
    where
        F: FnOnce(&mut AppSettings),
        Self: Sized,
    {
        let mut settings = self.load()?;
        change(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

impl<S: SettingsStore> SettingsStore for &S {
    fn load(&self) -> Result<AppSettings, AppError> {
        (**self).load()
    }

    fn save(&self, settings: &AppSettings) -> Result<(), AppError> {
        (**self).save(settings)
    }
}

/// Settings kept as pretty-printed JSON in the user's config directory.
#[derive(Clone, Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/photo-sorter/settings.json`
    pub fn default_path() -> Result<PathBuf, AppError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Settings("Could not determine config directory".into()))?;
        Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn open_default() -> Result<Self, AppError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    /// A missing file yields defaults. A corrupt one is logged and replaced
    /// by defaults on the next save.
    fn load(&self) -> Result<AppSettings, AppError> {
        if !self.path.exists() {
            debug!("No settings at {}, using defaults", self.path.display());
            return Ok(AppSettings::default());
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Ignoring unreadable settings {}: {}", self.path.display(), e);
                Ok(AppSettings::default())
            }
        }
    }

    fn save(&self, settings: &AppSettings) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, content)?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

/// In-process store for tests and one-off runs that should not touch disk.
#[derive(Clone, Debug, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<AppSettings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<AppSettings, AppError> {
        self.inner
            .lock()
            .map(|s| s.clone())
            .map_err(|_| AppError::Settings("settings lock poisoned".into()))
    }

    fn save(&self, settings: &AppSettings) -> Result<(), AppError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| AppError::Settings("settings lock poisoned".into()))?;
        *guard = settings.clone();
        Ok(())
    }
}
