use boxento::dashboard::{Dashboard, FileStore, GridView, PersistenceGateway, WidgetRegistry};
use boxento::logging;
use boxento::settings::{settings_path, Settings, Theme};
use eframe::egui;
use std::path::PathBuf;
use std::time::Instant;

const INITIAL_WIDTH: f32 = 1280.0;

struct BoxentoApp {
    dashboard: Dashboard<FileStore>,
    grid: GridView,
}

impl BoxentoApp {
    fn new(settings: &Settings) -> Self {
        let store = FileStore::new(settings.data_dir());
        tracing::info!(dir = %store.dir().display(), "opening dashboard store");
        let dashboard = Dashboard::new(
            PersistenceGateway::new(store),
            WidgetRegistry::with_defaults(),
            settings,
            INITIAL_WIDTH as u32,
        );
        Self {
            dashboard,
            grid: GridView::new(),
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Boxento");
            ui.separator();
            ui.menu_button("Add widget", |ui| {
                let categories = self.dashboard.registry().categories();
                for (category, widgets) in categories {
                    ui.label(egui::RichText::new(category).strong());
                    for meta in widgets {
                        if ui.button(meta.label.as_str()).clicked() {
                            self.dashboard.add_widget(&meta.name);
                            ui.close_menu();
                        }
                    }
                }
            });
            let label = match self.dashboard.theme() {
                Theme::Light => "Dark mode",
                Theme::Dark => "Light mode",
            };
            if ui.button(label).clicked() {
                self.dashboard.toggle_theme();
            }
            ui.weak(self.dashboard.breakpoint().as_str());
        });
    }
}

impl eframe::App for BoxentoApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let visuals = match self.dashboard.theme() {
            Theme::Light => egui::Visuals::light(),
            Theme::Dark => egui::Visuals::dark(),
        };
        ctx.set_visuals(visuals);
        self.dashboard
            .set_window_width(ctx.screen_rect().width().max(0.0) as u32);

        egui::TopBottomPanel::top("boxento-toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.grid.ui(ui, &mut self.dashboard, Instant::now());
            });
        });
    }
}

impl Drop for BoxentoApp {
    fn drop(&mut self) {
        self.dashboard.flush();
    }
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::load(settings_path())?;
    logging::init(settings.debug_logging, settings.log_file.as_ref().map(PathBuf::from));
    tracing::info!("starting boxento");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([INITIAL_WIDTH, 800.0])
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Boxento",
        native_options,
        Box::new(move |_cc| Box::new(BoxentoApp::new(&settings))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run dashboard: {e}"))
}
