use super::{header, GridSize, Widget, WidgetCommand};
use eframe::egui;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl Default for TemperatureUnit {
    fn default() -> Self {
        TemperatureUnit::Celsius
    }
}

fn default_location() -> String {
    "San Francisco".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherConfig {
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub units: TemperatureUnit,
    /// Last reading in Celsius, filled by whatever feeds the widget.
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub conditions: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            units: TemperatureUnit::default(),
            temperature: None,
            conditions: None,
        }
    }
}

pub fn format_temperature(celsius: f32, units: TemperatureUnit) -> String {
    match units {
        TemperatureUnit::Celsius => format!("{celsius:.0}°C"),
        TemperatureUnit::Fahrenheit => format!("{:.0}°F", celsius * 9.0 / 5.0 + 32.0),
    }
}

pub struct WeatherWidget {
    cfg: WeatherConfig,
}

impl WeatherWidget {
    pub fn new(cfg: WeatherConfig) -> Self {
        Self { cfg }
    }
}

impl Widget for WeatherWidget {
    fn render(&mut self, ui: &mut egui::Ui, size: GridSize) -> Option<WidgetCommand> {
        let command = header(ui, &self.cfg.location);
        match self.cfg.temperature {
            Some(t) => {
                ui.heading(format_temperature(t, self.cfg.units));
            }
            None => {
                ui.weak("No data yet");
            }
        }
        if size.h > 2 {
            if let Some(conditions) = &self.cfg.conditions {
                ui.label(conditions.as_str());
            }
        }
        command
    }

    fn on_config_updated(&mut self, config: &serde_json::Value) {
        if let Ok(cfg) = serde_json::from_value(config.clone()) {
            self.cfg = cfg;
        }
    }
}
