use crate::dashboard::breakpoints::Breakpoint;
use crate::dashboard::layout::{LayoutItem, Layouts};
use crate::dashboard::widgets::WidgetRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Config keys that older builds stored next to real settings. They held
/// render-time callbacks and are never persisted.
pub const RESERVED_CONFIG_KEYS: [&str; 2] = ["onDelete", "onUpdate"];

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// One widget instance on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default = "empty_object")]
    pub config: Value,
}

impl WidgetEntry {
    pub fn new(id: &str, widget_type: &str, config: Value) -> Self {
        Self {
            id: id.to_string(),
            widget_type: widget_type.to_string(),
            config,
        }
    }
}

/// Drop reserved keys from a config object. Non-objects become `{}`.
pub fn strip_reserved_keys(config: &Value) -> Value {
    match config {
        Value::Object(map) => {
            let mut cleaned = map.clone();
            for key in RESERVED_CONFIG_KEYS {
                cleaned.remove(key);
            }
            Value::Object(cleaned)
        }
        _ => empty_object(),
    }
}

/// Widget list plus layouts, the unit the gateway loads and saves.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub widgets: Vec<WidgetEntry>,
    pub layouts: Layouts,
}

/// Types and ids of the widgets shown on a fresh dashboard.
pub const DEFAULT_WIDGETS: [(&str, &str); 4] = [
    ("default-todo", "todo"),
    ("default-weather", "weather"),
    ("default-quick-links", "quick-links"),
    ("default-notes", "notes"),
];

impl DashboardConfig {
    /// The four pre-configured widgets and their hand-tuned layouts.
    pub fn with_defaults(registry: &WidgetRegistry) -> Self {
        let widgets = DEFAULT_WIDGETS
            .iter()
            .map(|(id, ty)| {
                let config = registry.default_settings(ty).unwrap_or_else(|| json!({}));
                WidgetEntry::new(id, ty, config)
            })
            .collect();
        Self {
            widgets,
            layouts: default_layouts(),
        }
    }

    /// Normalize configs in place. Returns human readable warnings.
    pub fn sanitize(&mut self, registry: &WidgetRegistry) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.widgets.retain(|widget| {
            if widget.id.is_empty() || !seen.insert(widget.id.clone()) {
                warnings.push(format!("duplicate or empty widget id '{}' dropped", widget.id));
                return false;
            }
            true
        });
        for widget in &mut self.widgets {
            if !registry.contains(&widget.widget_type) {
                tracing::warn!(widget = %widget.widget_type, id = %widget.id, "unknown widget type kept for placeholder");
                warnings.push(format!("unknown widget type '{}'", widget.widget_type));
            }
            if widget.config.is_null() {
                widget.config = registry
                    .default_settings(&widget.widget_type)
                    .unwrap_or_else(|| json!({}));
            }
            widget.config = strip_reserved_keys(&widget.config);
        }
        warnings
    }
}

fn item(id: &str, x: i32, y: i32, w: i32, h: i32) -> LayoutItem {
    LayoutItem::new(id, x, y, w, h)
}

/// Layouts matching [`DEFAULT_WIDGETS`] for all five breakpoints.
pub fn default_layouts() -> Layouts {
    let mut layouts = Layouts::default();
    let desktop = |notes: (i32, i32)| {
        vec![
            item("default-todo", 0, 0, 3, 3),
            item("default-weather", 3, 0, 2, 2),
            item("default-quick-links", 5, 0, 3, 2),
            item("default-notes", notes.0, notes.1, 3, 3),
        ]
    };
    layouts.set(Breakpoint::Lg, desktop((8, 0)));
    layouts.set(Breakpoint::Md, desktop((0, 3)));
    layouts.set(
        Breakpoint::Sm,
        vec![
            item("default-todo", 0, 0, 3, 3),
            item("default-weather", 3, 0, 3, 2),
            item("default-quick-links", 0, 3, 3, 2),
            item("default-notes", 3, 2, 3, 3),
        ],
    );
    let mobile = || {
        vec![
            item("default-todo", 0, 0, 2, 2),
            item("default-weather", 0, 2, 2, 2),
            item("default-quick-links", 0, 4, 2, 2),
            item("default-notes", 0, 6, 2, 3),
        ]
    };
    layouts.set(Breakpoint::Xs, mobile());
    layouts.set(Breakpoint::Xxs, mobile());
    layouts
}
