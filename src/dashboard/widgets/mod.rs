use eframe::egui;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

mod notes;
mod quick_links;
mod todo;
mod weather;

pub use notes::NotesWidget;
pub use quick_links::QuickLinksWidget;
pub use todo::TodoWidget;
pub use weather::WeatherWidget;

/// Size of a widget's grid cell block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub w: i32,
    pub h: i32,
}

/// Request a widget sends back to the dashboard from `render`.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetCommand {
    /// Remove this widget from the dashboard.
    Delete,
    /// Shallow-merge this object into the widget's stored config.
    Update(Value),
}

/// Widget trait implemented by all dashboard widgets.
pub trait Widget: Send {
    fn render(&mut self, ui: &mut egui::Ui, size: GridSize) -> Option<WidgetCommand>;

    fn on_config_updated(&mut self, _config: &Value) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetMetadata {
    pub name: String,
    pub label: String,
    pub category: String,
}

/// Descriptor for building widgets from JSON settings.
#[derive(Clone)]
pub struct WidgetDescriptor {
    ctor: Arc<dyn Fn(&Value) -> Box<dyn Widget> + Send + Sync>,
    default_settings: Arc<dyn Fn() -> Value + Send + Sync>,
    label: String,
    category: Option<String>,
}

pub type WidgetFactory = WidgetDescriptor;

impl WidgetDescriptor {
    pub fn new<T: Widget + 'static, C: DeserializeOwned + Serialize + Default + 'static>(
        label: &str,
        build: fn(C) -> T,
    ) -> Self {
        Self {
            ctor: Arc::new(move |v| {
                let cfg = serde_json::from_value::<C>(v.clone()).unwrap_or_default();
                Box::new(build(cfg))
            }),
            default_settings: Arc::new(|| {
                serde_json::to_value(C::default()).unwrap_or_else(|_| json!({}))
            }),
            label: label.to_string(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn default_settings(&self) -> Value {
        (self.default_settings)()
    }

    pub fn create(&self, settings: &Value) -> Box<dyn Widget> {
        (self.ctor)(settings)
    }

    pub fn metadata(&self, name: &str) -> WidgetMetadata {
        WidgetMetadata {
            name: name.to_string(),
            label: self.label.clone(),
            category: self.category.clone().unwrap_or_else(|| "Other".into()),
        }
    }
}

#[derive(Clone, Default)]
pub struct WidgetRegistry {
    map: HashMap<String, WidgetDescriptor>,
}

impl WidgetRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        reg.register(
            "todo",
            WidgetFactory::new("Todo", TodoWidget::new).with_category("Productivity"),
        );
        reg.register(
            "notes",
            WidgetFactory::new("Notes", NotesWidget::new).with_category("Productivity"),
        );
        reg.register(
            "weather",
            WidgetFactory::new("Weather", WeatherWidget::new).with_category("Information"),
        );
        reg.register(
            "quick-links",
            WidgetFactory::new("Quick Links", QuickLinksWidget::new).with_category("Navigation"),
        );
        reg
    }

    pub fn register(&mut self, name: &str, factory: WidgetFactory) {
        self.map.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn create(&self, name: &str, settings: &Value) -> Option<Box<dyn Widget>> {
        let settings = if settings.is_null() {
            self.default_settings(name)
                .unwrap_or_else(|| Value::Object(Default::default()))
        } else {
            settings.clone()
        };
        self.map.get(name).map(|f| f.create(&settings))
    }

    pub fn metadata(&self) -> Vec<WidgetMetadata> {
        let mut meta: Vec<WidgetMetadata> = self
            .map
            .iter()
            .map(|(name, descriptor)| descriptor.metadata(name))
            .collect();
        meta.sort_by(|a, b| a.name.cmp(&b.name));
        meta
    }

    /// Widgets grouped by category for the widget selector.
    pub fn categories(&self) -> BTreeMap<String, Vec<WidgetMetadata>> {
        let mut categories: BTreeMap<String, Vec<WidgetMetadata>> = BTreeMap::new();
        for meta in self.metadata() {
            categories.entry(meta.category.clone()).or_default().push(meta);
        }
        categories
    }

    pub fn default_settings(&self, name: &str) -> Option<Value> {
        self.map.get(name).map(|f| f.default_settings())
    }
}

pub(crate) fn merge_json(base: &Value, updates: &Value) -> Value {
    match (base, updates) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => updates.clone(),
    }
}

/// Serialize a typed config into an `Update` command.
pub(crate) fn update_command<C: Serialize>(cfg: &C) -> Option<WidgetCommand> {
    serde_json::to_value(cfg).ok().map(WidgetCommand::Update)
}

/// Shared header row with the widget title and a delete button.
pub(crate) fn header(ui: &mut egui::Ui, title: &str) -> Option<WidgetCommand> {
    let mut command = None;
    ui.horizontal(|ui| {
        ui.strong(title);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("✕").on_hover_text("Remove widget").clicked() {
                command = Some(WidgetCommand::Delete);
            }
        });
    });
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_json_preserves_unknown_fields() {
        let base = json!({"known": 1, "extra": {"keep": true}});
        let updates = json!({"known": 2});
        let merged = merge_json(&base, &updates);
        assert_eq!(merged["known"], json!(2));
        assert_eq!(merged["extra"], json!({"keep": true}));
    }

    #[test]
    fn defaults_registered_with_settings() {
        let registry = WidgetRegistry::with_defaults();
        let names: Vec<String> = registry.metadata().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["notes", "quick-links", "todo", "weather"]);
        for name in &names {
            assert!(registry.default_settings(name).unwrap().is_object(), "{name}");
        }
        assert!(registry.create("missing", &Value::Null).is_none());
        assert!(registry.create("todo", &Value::Null).is_some());
    }

    #[test]
    fn categories_group_metadata() {
        let registry = WidgetRegistry::with_defaults();
        let categories = registry.categories();
        let productivity: Vec<_> = categories["Productivity"]
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(productivity, vec!["notes", "todo"]);
        assert_eq!(categories["Navigation"][0].label, "Quick Links");
    }
}
