use super::{header, GridSize, Widget, WidgetCommand};
use eframe::egui;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkItem {
    pub id: u64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub color: String,
}

fn default_links() -> Vec<LinkItem> {
    vec![
        LinkItem {
            id: 1,
            title: "Google".into(),
            url: "https://google.com".into(),
            color: "#4285F4".into(),
        },
        LinkItem {
            id: 2,
            title: "GitHub".into(),
            url: "https://github.com".into(),
            color: "#333333".into(),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickLinksConfig {
    #[serde(default = "default_links")]
    pub links: Vec<LinkItem>,
}

impl Default for QuickLinksConfig {
    fn default() -> Self {
        Self {
            links: default_links(),
        }
    }
}

/// Parse `#rrggbb`; anything else yields `None`.
fn parse_color(hex: &str) -> Option<egui::Color32> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(egui::Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?))
}

pub struct QuickLinksWidget {
    cfg: QuickLinksConfig,
}

impl QuickLinksWidget {
    pub fn new(cfg: QuickLinksConfig) -> Self {
        Self { cfg }
    }
}

impl Widget for QuickLinksWidget {
    fn render(&mut self, ui: &mut egui::Ui, _size: GridSize) -> Option<WidgetCommand> {
        let command = header(ui, "Quick Links");
        for link in &self.cfg.links {
            ui.horizontal(|ui| {
                if let Some(color) = parse_color(&link.color) {
                    let (rect, _) =
                        ui.allocate_exact_size(egui::vec2(8.0, 8.0), egui::Sense::hover());
                    ui.painter().circle_filled(rect.center(), 4.0, color);
                }
                ui.hyperlink_to(link.title.as_str(), &link.url);
            });
        }
        command
    }

    fn on_config_updated(&mut self, config: &serde_json::Value) {
        if let Ok(cfg) = serde_json::from_value(config.clone()) {
            self.cfg = cfg;
        }
    }
}
