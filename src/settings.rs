use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

fn default_layout_debounce_ms() -> u64 {
    100
}

fn default_rebound_timeout_ms() -> u64 {
    700
}

fn default_viewport_inset() -> u32 {
    crate::dashboard::breakpoints::VIEWPORT_INSET
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the persisted dashboard. If `None`, the platform
    /// data directory is used.
    #[serde(default)]
    pub data_dir: Option<String>,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file that receives a copy of the log output.
    #[serde(default)]
    pub log_file: Option<String>,
    /// Quiet period before a burst of layout changes is written.
    #[serde(default = "default_layout_debounce_ms")]
    pub layout_debounce_ms: u64,
    /// Deadline for clearing drag rebound effects.
    #[serde(default = "default_rebound_timeout_ms")]
    pub rebound_timeout_ms: u64,
    /// Horizontal inset subtracted from the window width.
    #[serde(default = "default_viewport_inset")]
    pub viewport_inset: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            debug_logging: false,
            log_file: None,
            layout_debounce_ms: default_layout_debounce_ms(),
            rebound_timeout_ms: default_rebound_timeout_ms(),
            viewport_inset: default_viewport_inset(),
        }
    }
}

/// Default location of `settings.json`.
pub fn settings_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("boxento")
        .join("settings.json")
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs_next::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("boxento"),
        }
    }

    pub fn layout_debounce(&self) -> Duration {
        Duration::from_millis(self.layout_debounce_ms)
    }

    pub fn rebound_timeout(&self) -> Duration {
        Duration::from_millis(self.rebound_timeout_ms)
    }
}
