//! Theme preference persistence and synchronization.
//!
//! The effective theme is resolved in order: the user's stored choice, the
//! system color-scheme preference, then dark. A stored choice pins the
//! theme; without one, system preference changes are followed live.
//! Observers subscribe through a `tokio::sync::watch` channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Storage format version, kept compatible with the web client's
/// persisted `theme-storage` entry.
const STORAGE_VERSION: u32 = 0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Where the effective theme came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeSource {
    Stored,
    System,
    Default,
}

impl fmt::Display for ThemeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeSource::Stored => write!(f, "stored preference"),
            ThemeSource::System => write!(f, "system preference"),
            ThemeSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("Theme storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Theme storage is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Persistence for the user's explicit theme choice.
pub trait ThemeStorage {
    fn load(&self) -> Result<Option<Theme>, ThemeError>;
    fn save(&mut self, theme: Theme) -> Result<(), ThemeError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTheme {
    state: ThemeState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ThemeState {
    theme: Theme,
}

/// JSON file storage, `{"state":{"theme":"dark"},"version":0}`.
#[derive(Debug, Clone)]
pub struct FileThemeStorage {
    path: PathBuf,
}

impl FileThemeStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ThemeStorage for FileThemeStorage {
    fn load(&self) -> Result<Option<Theme>, ThemeError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let persisted: PersistedTheme = serde_json::from_str(&content)?;
        Ok(Some(persisted.state.theme))
    }

    fn save(&mut self, theme: Theme) -> Result<(), ThemeError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedTheme {
            state: ThemeState { theme },
            version: STORAGE_VERSION,
        };
        std::fs::write(&self.path, serde_json::to_string(&persisted)?)?;
        debug!("Saved theme {} to {}", theme, self.path.display());
        Ok(())
    }
}

/// Process-local storage.
#[allow(dead_code)] // Embedders without a writable filesystem
#[derive(Debug, Clone, Default)]
pub struct MemoryThemeStorage {
    theme: Option<Theme>,
}

impl ThemeStorage for MemoryThemeStorage {
    fn load(&self) -> Result<Option<Theme>, ThemeError> {
        Ok(self.theme)
    }

    fn save(&mut self, theme: Theme) -> Result<(), ThemeError> {
        self.theme = Some(theme);
        Ok(())
    }
}

/// Resolve the effective theme from the stored and system preferences.
pub fn resolve_theme(stored: Option<Theme>, system: Option<Theme>) -> Theme {
    stored.or(system).unwrap_or_default()
}

/// Owns the current theme and publishes every change.
pub struct ThemeController<S: ThemeStorage> {
    storage: S,
    stored: Option<Theme>,
    system: Option<Theme>,
    tx: watch::Sender<Theme>,
}

impl<S: ThemeStorage> ThemeController<S> {
    /// Unreadable storage is treated as "nothing stored".
    pub fn new(storage: S, system: Option<Theme>) -> Self {
        let stored = storage.load().unwrap_or_else(|e| {
            warn!("Ignoring stored theme: {}", e);
            None
        });
        let (tx, _) = watch::channel(resolve_theme(stored, system));
        Self {
            storage,
            stored,
            system,
            tx,
        }
    }

    pub fn current(&self) -> Theme {
        *self.tx.borrow()
    }

    pub fn source(&self) -> ThemeSource {
        match (self.stored, self.system) {
            (Some(_), _) => ThemeSource::Stored,
            (None, Some(_)) => ThemeSource::System,
            (None, None) => ThemeSource::Default,
        }
    }

    /// Receiver that observes every effective theme change.
    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }

    /// Flip the theme and persist the result as the user's choice.
    pub fn toggle(&mut self) -> Result<Theme, ThemeError> {
        let next = self.current().toggled();
        self.set(next)?;
        Ok(next)
    }

    /// Persist `theme` as the user's choice and apply it.
    pub fn set(&mut self, theme: Theme) -> Result<(), ThemeError> {
        self.storage.save(theme)?;
        self.stored = Some(theme);
        self.publish(theme);
        Ok(())
    }

    /// React to a system color-scheme change. Ignored while a choice is stored.
    pub fn system_changed(&mut self, system: Theme) -> Theme {
        self.system = Some(system);
        if self.stored.is_none() {
            self.publish(system);
        }
        self.current()
    }

    fn publish(&self, theme: Theme) {
        self.tx.send_if_modified(|current| {
            if *current == theme {
                return false;
            }
            *current = theme;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_order() {
        assert_eq!(resolve_theme(Some(Theme::Light), Some(Theme::Dark)), Theme::Light);
        assert_eq!(resolve_theme(None, Some(Theme::Light)), Theme::Light);
        assert_eq!(resolve_theme(None, None), Theme::Dark);
    }

    #[test]
    fn test_controller_sources() {
        let controller = ThemeController::new(MemoryThemeStorage::default(), None);
        assert_eq!(controller.current(), Theme::Dark);
        assert_eq!(controller.source(), ThemeSource::Default);

        let controller =
            ThemeController::new(MemoryThemeStorage::default(), Some(Theme::Light));
        assert_eq!(controller.current(), Theme::Light);
        assert_eq!(controller.source(), ThemeSource::System);
    }

    #[test]
    fn test_toggle_persists_and_pins() {
        let mut controller =
            ThemeController::new(MemoryThemeStorage::default(), Some(Theme::Light));
        assert_eq!(controller.toggle().unwrap(), Theme::Dark);
        assert_eq!(controller.source(), ThemeSource::Stored);
        assert_eq!(controller.storage.load().unwrap(), Some(Theme::Dark));

        // stored choice wins over later system changes
        assert_eq!(controller.system_changed(Theme::Light), Theme::Dark);
    }

    #[test]
    fn test_system_changes_followed_without_stored_choice() {
        let mut controller =
            ThemeController::new(MemoryThemeStorage::default(), Some(Theme::Dark));
        let mut rx = controller.subscribe();

        assert_eq!(controller.system_changed(Theme::Light), Theme::Light);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Theme::Light);

        // same value again is not a change
        controller.system_changed(Theme::Light);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("theme-storage.json");

        let mut storage = FileThemeStorage::new(&path);
        assert_eq!(storage.load().unwrap(), None);

        storage.save(Theme::Light).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"state":{"theme":"light"},"version":0}"#);

        let controller = ThemeController::new(FileThemeStorage::new(&path), Some(Theme::Dark));
        assert_eq!(controller.current(), Theme::Light);
        assert_eq!(controller.source(), ThemeSource::Stored);
    }

    #[test]
    fn test_corrupt_storage_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme-storage.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileThemeStorage::new(&path).load(),
            Err(ThemeError::Decode(_))
        ));
        let controller = ThemeController::new(FileThemeStorage::new(&path), Some(Theme::Light));
        assert_eq!(controller.current(), Theme::Light);
        assert_eq!(controller.source(), ThemeSource::System);
    }
}
