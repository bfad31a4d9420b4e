use super::{header, update_command, GridSize, Widget, WidgetCommand};
use eframe::egui;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TodoSort {
    Created,
    Alphabetical,
    Completed,
    Manual,
}

impl Default for TodoSort {
    fn default() -> Self {
        TodoSort::Manual
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

fn default_title() -> String {
    "Todo List".into()
}

fn default_show_completed() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoWidgetConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub items: Vec<TodoItem>,
    #[serde(default = "default_show_completed")]
    pub show_completed_items: bool,
    #[serde(default)]
    pub sort_order: TodoSort,
}

impl Default for TodoWidgetConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            items: Vec::new(),
            show_completed_items: default_show_completed(),
            sort_order: TodoSort::default(),
        }
    }
}

impl TodoWidgetConfig {
    fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.items.len())
            .filter(|&i| self.show_completed_items || !self.items[i].completed)
            .collect();
        let items = &self.items;
        match self.sort_order {
            TodoSort::Manual => indices.sort_by_key(|&i| items[i].sort_order.unwrap_or(i as i64)),
            TodoSort::Alphabetical => {
                indices.sort_by_key(|&i| items[i].text.to_lowercase());
            }
            TodoSort::Completed => indices.sort_by_key(|&i| items[i].completed),
            TodoSort::Created => indices.sort_by(|&a, &b| items[a].created_at.cmp(&items[b].created_at)),
        }
        indices
    }
}

pub struct TodoWidget {
    cfg: TodoWidgetConfig,
    draft: String,
}

impl TodoWidget {
    pub fn new(cfg: TodoWidgetConfig) -> Self {
        Self {
            cfg,
            draft: String::new(),
        }
    }

    fn add_draft(&mut self) -> bool {
        let text = self.draft.trim();
        if text.is_empty() {
            return false;
        }
        let now = chrono::Utc::now();
        self.cfg.items.push(TodoItem {
            id: format!("todo-{}", now.timestamp_millis()),
            text: text.to_string(),
            completed: false,
            created_at: Some(now.to_rfc3339()),
            sort_order: Some(self.cfg.items.len() as i64),
        });
        self.draft.clear();
        true
    }
}

impl Widget for TodoWidget {
    fn render(&mut self, ui: &mut egui::Ui, _size: GridSize) -> Option<WidgetCommand> {
        let mut command = header(ui, &self.cfg.title);
        let mut changed = false;
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for index in self.cfg.sorted_indices() {
                    let item = &mut self.cfg.items[index];
                    changed |= ui.checkbox(&mut item.completed, item.text.as_str()).changed();
                }
            });
        let resp = ui.text_edit_singleline(&mut self.draft);
        if resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            changed |= self.add_draft();
        }
        if changed && command.is_none() {
            command = update_command(&self.cfg);
        }
        command
    }

    fn on_config_updated(&mut self, config: &serde_json::Value) {
        if let Ok(cfg) = serde_json::from_value(config.clone()) {
            self.cfg = cfg;
        }
    }
}
