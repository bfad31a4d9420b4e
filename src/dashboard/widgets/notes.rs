use super::{header, update_command, GridSize, Widget, WidgetCommand};
use eframe::egui;
use serde::{Deserialize, Serialize};

fn default_title() -> String {
    "Notes".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotesConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            content: String::new(),
        }
    }
}

pub struct NotesWidget {
    cfg: NotesConfig,
}

impl NotesWidget {
    pub fn new(cfg: NotesConfig) -> Self {
        Self { cfg }
    }
}

impl Widget for NotesWidget {
    fn render(&mut self, ui: &mut egui::Ui, _size: GridSize) -> Option<WidgetCommand> {
        let command = header(ui, &self.cfg.title);
        let resp = ui.add_sized(
            ui.available_size(),
            egui::TextEdit::multiline(&mut self.cfg.content).hint_text("Write something..."),
        );
        // Persist once editing ends rather than on every keystroke.
        if command.is_none() && resp.lost_focus() {
            return update_command(&self.cfg);
        }
        command
    }

    fn on_config_updated(&mut self, config: &serde_json::Value) {
        if let Ok(cfg) = serde_json::from_value(config.clone()) {
            self.cfg = cfg;
        }
    }
}
