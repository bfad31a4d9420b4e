//! Durable storage for the widget list, layouts, per-widget configs and the
//! theme preference.
//!
//! Storage is a flat key-value space. [`FileStore`] maps each key to a JSON
//! file inside a data directory; [`MemoryStore`] keeps everything in memory
//! and counts writes, which the tests rely on.

use crate::dashboard::config::{strip_reserved_keys, DashboardConfig, WidgetEntry};
use crate::dashboard::layout::{validate, Layouts};
use crate::dashboard::widgets::{merge_json, WidgetRegistry};
use crate::settings::Theme;
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const WIDGETS_KEY: &str = "boxento-widgets";
pub const LAYOUTS_KEY: &str = "boxento-layouts";
pub const THEME_KEY: &str = "theme";
const WIDGET_CONFIG_PREFIX: &str = "widget-config:";

pub fn widget_config_key(id: &str) -> String {
    format!("{WIDGET_CONFIG_PREFIX}{id}")
}

/// Minimal key-value contract the gateway persists through.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    writes: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls made for `key`.
    pub fn writes(&self, key: &str) -> usize {
        self.writes.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        *self.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// One file per key under `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Readable slug plus the hex-encoded key, so distinct keys never share
    /// a file even when their slugs match.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", slug::slugify(key), hex::encode(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        std::fs::write(&path, value).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Serializes dashboard state into a [`KeyValueStore`] and repairs it on load.
pub struct PersistenceGateway<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> PersistenceGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Write the widget list, the layout blob and every widget's config.
    pub fn save(&mut self, widgets: &[WidgetEntry], layouts: &Layouts) -> anyhow::Result<()> {
        self.save_widgets(widgets)?;
        self.save_layouts(layouts)
    }

    /// Write the widget list and every widget's config, leaving layouts alone.
    pub fn save_widgets(&mut self, widgets: &[WidgetEntry]) -> anyhow::Result<()> {
        let cleaned: Vec<WidgetEntry> = widgets
            .iter()
            .map(|w| WidgetEntry {
                config: strip_reserved_keys(&w.config),
                ..w.clone()
            })
            .collect();
        self.store
            .set(WIDGETS_KEY, &serde_json::to_string(&cleaned)?)?;
        for widget in &cleaned {
            self.save_widget_config(&widget.id, &widget.config)?;
        }
        Ok(())
    }

    pub fn save_layouts(&mut self, layouts: &Layouts) -> anyhow::Result<()> {
        self.store.set(LAYOUTS_KEY, &serde_json::to_string(layouts)?)
    }

    pub fn save_widget_config(&mut self, id: &str, config: &Value) -> anyhow::Result<()> {
        let cleaned = strip_reserved_keys(config);
        self.store
            .set(&widget_config_key(id), &serde_json::to_string(&cleaned)?)
    }

    pub fn widget_config(&self, id: &str) -> Option<Value> {
        let raw = match self.store.get(&widget_config_key(id)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::error!(id, error = %e, "failed to read widget config");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => Some(value),
            _ => {
                tracing::warn!(id, "ignoring malformed widget config");
                None
            }
        }
    }

    pub fn clear_widget_config(&mut self, id: &str) -> anyhow::Result<()> {
        self.store.remove(&widget_config_key(id))
    }

    /// Load state, falling back to the default dashboard when either value
    /// is missing or malformed. Never fails.
    pub fn load(&self, registry: &WidgetRegistry) -> DashboardConfig {
        let Some(widgets) = self.load_widgets() else {
            tracing::info!("no usable stored widgets; using default dashboard");
            return DashboardConfig::with_defaults(registry);
        };
        let Some(layouts) = self.load_layouts() else {
            tracing::info!("no usable stored layouts; using default dashboard");
            return DashboardConfig::with_defaults(registry);
        };
        let widgets = widgets
            .into_iter()
            .map(|mut widget| {
                if let Some(saved) = self.widget_config(&widget.id) {
                    widget.config = merge_json(&widget.config, &saved);
                }
                widget
            })
            .collect();
        let mut cfg = DashboardConfig { widgets, layouts };
        for warning in cfg.sanitize(registry) {
            tracing::warn!("{warning}");
        }
        cfg
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    fn load_widgets(&self) -> Option<Vec<WidgetEntry>> {
        let raw = self.read(WIDGETS_KEY)?;
        match serde_json::from_str::<Vec<WidgetEntry>>(&raw) {
            Ok(widgets) if !widgets.is_empty() => Some(widgets),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "stored widget list is malformed");
                None
            }
        }
    }

    fn load_layouts(&self) -> Option<Layouts> {
        let raw = self.read(LAYOUTS_KEY)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => Some(validate(&value)),
            Ok(_) => {
                tracing::warn!("stored layouts are not an object");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored layouts are malformed");
                None
            }
        }
    }

    pub fn load_theme(&self) -> Theme {
        self.read(THEME_KEY)
            .and_then(|raw| serde_json::from_str::<Theme>(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        self.store.set(THEME_KEY, &serde_json::to_string(&theme)?)
    }
}
