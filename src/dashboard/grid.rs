use crate::dashboard::breakpoints::Breakpoint;
use crate::dashboard::config::WidgetEntry;
use crate::dashboard::dashboard::Dashboard;
use crate::dashboard::drag::{EffectState, Pointer, Tilt};
use crate::dashboard::layout::{LayoutChange, LayoutItem, LayoutStore, Layouts};
use crate::dashboard::persistence::KeyValueStore;
use crate::dashboard::widgets::{GridSize, Widget, WidgetCommand};
use eframe::egui;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Gap between cells, in points.
pub const GRID_MARGIN: f32 = 10.0;
/// Space around the grid on each side.
pub const GRID_PADDING: f32 = 20.0;
const HANDLE_HEIGHT: f32 = 24.0;
const RESIZE_HANDLE: f32 = 14.0;

/// Row height that keeps cells roughly square at a 12-column reference grid.
pub fn row_height(window_width: f32) -> f32 {
    let usable = (window_width - 2.0 * GRID_PADDING - GRID_MARGIN * 11.0).max(0.0);
    let cell = usable / 12.0;
    if window_width < 600.0 {
        cell * 0.8
    } else if window_width < 1200.0 {
        cell * 0.9
    } else {
        cell
    }
}

/// Width of one column for `cols` columns across `width`.
pub fn column_width(width: f32, cols: u32) -> f32 {
    let cols = cols.max(1) as f32;
    ((width - 2.0 * GRID_PADDING - GRID_MARGIN * (cols - 1.0)) / cols).max(1.0)
}

/// Whole cells covered by a pointer offset of `delta` along one axis.
fn cells_for(delta: f32, cell: f32) -> i32 {
    (delta / (cell + GRID_MARGIN)).round() as i32
}

struct Slot {
    widget: Option<Box<dyn Widget>>,
    config: Value,
    failed: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum GestureKind {
    Move,
    Resize,
}

struct Gesture {
    id: String,
    kind: GestureKind,
    offset: egui::Vec2,
}

/// Immediate-mode view over a [`Dashboard`]: owns renderer instances and
/// the visual effect state.
#[derive(Default)]
pub struct GridView {
    slots: HashMap<String, Slot>,
    effects: EffectState,
    gesture: Option<Gesture>,
}

impl GridView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> &EffectState {
        &self.effects
    }

    /// Create renderers for new widgets, drop removed ones and push config
    /// changes into live renderers.
    pub fn sync<S: KeyValueStore>(&mut self, dashboard: &Dashboard<S>) {
        self.slots
            .retain(|id, _| dashboard.widget(id).is_some());
        for entry in dashboard.widgets() {
            match self.slots.get_mut(&entry.id) {
                Some(slot) if slot.config != entry.config => {
                    if let Some(widget) = &mut slot.widget {
                        widget.on_config_updated(&entry.config);
                    }
                    slot.config = entry.config.clone();
                }
                Some(_) => {}
                None => {
                    let widget = dashboard
                        .registry()
                        .create(&entry.widget_type, &entry.config);
                    self.slots.insert(
                        entry.id.clone(),
                        Slot {
                            widget,
                            config: entry.config.clone(),
                            failed: false,
                        },
                    );
                }
            }
        }
    }

    pub fn ui<S: KeyValueStore>(
        &mut self,
        ui: &mut egui::Ui,
        dashboard: &mut Dashboard<S>,
        now: Instant,
    ) {
        self.sync(dashboard);
        self.drop_stale_gesture(dashboard, now);
        dashboard.tick(now, &mut self.effects);
        for id in self.effects.finished_rebounds(now) {
            dashboard.animation_end(&id, &mut self.effects);
        }

        let bp = dashboard.breakpoint();
        let cols = bp.cols();
        let width = ui.available_width();
        let col_w = column_width(width, cols);
        let row_h = row_height(ui.ctx().screen_rect().width()).max(1.0);
        let items: Vec<LayoutItem> = dashboard.layouts().get(bp).to_vec();
        let rows = items.iter().map(|it| it.y + it.h).max().unwrap_or(0).max(0);
        let height = 2.0 * GRID_PADDING + rows as f32 * (row_h + GRID_MARGIN);
        let (grid_rect, _) =
            ui.allocate_exact_size(egui::vec2(width, height), egui::Sense::hover());

        let mut commands = Vec::new();
        let mut finished = None;
        for item in &items {
            let Some(entry) = dashboard.widget(&item.i).cloned() else {
                continue;
            };
            let mut rect = egui::Rect::from_min_size(
                grid_rect.min
                    + egui::vec2(
                        GRID_PADDING + item.x as f32 * (col_w + GRID_MARGIN),
                        GRID_PADDING + item.y as f32 * (row_h + GRID_MARGIN),
                    ),
                egui::vec2(
                    item.w as f32 * col_w + (item.w - 1).max(0) as f32 * GRID_MARGIN,
                    item.h as f32 * row_h + (item.h - 1).max(0) as f32 * GRID_MARGIN,
                ),
            );
            if let Some(g) = self.gesture.as_ref().filter(|g| g.id == item.i) {
                match g.kind {
                    GestureKind::Move => rect = rect.translate(g.offset),
                    GestureKind::Resize => rect.max += g.offset,
                }
            }

            if let Some(tilt) = self.effects.tilt_at(&item.i, now) {
                paint_tilt(ui.painter(), rect, tilt);
            }

            let size = GridSize { w: item.w, h: item.h };
            let command = ui
                .allocate_ui_at_rect(rect, |ui| {
                    ui.set_clip_rect(rect.intersect(ui.clip_rect()));
                    self.render_slot(ui, &entry, size)
                })
                .inner;
            if let Some(command) = command {
                commands.push((entry.id.clone(), command));
            }

            let handle = egui::Rect::from_min_size(rect.min, egui::vec2(rect.width(), HANDLE_HEIGHT));
            let move_resp = ui.interact(
                handle,
                egui::Id::new(("boxento-move", &item.i)),
                egui::Sense::drag(),
            );
            let corner = egui::Rect::from_min_max(rect.max - egui::vec2(RESIZE_HANDLE, RESIZE_HANDLE), rect.max);
            let resize_resp = ui.interact(
                corner,
                egui::Id::new(("boxento-resize", &item.i)),
                egui::Sense::drag(),
            );
            ui.painter().rect_filled(corner, 2.0, ui.visuals().weak_text_color());

            if move_resp.drag_started() {
                if let Some(pos) = move_resp.interact_pointer_pos() {
                    dashboard.drag_start(&item.i, Pointer::new(pos.x, pos.y), now);
                }
                self.gesture = Some(Gesture {
                    id: item.i.clone(),
                    kind: GestureKind::Move,
                    offset: egui::Vec2::ZERO,
                });
            } else if resize_resp.drag_started() {
                dashboard.resize_start(&mut self.effects);
                self.gesture = Some(Gesture {
                    id: item.i.clone(),
                    kind: GestureKind::Resize,
                    offset: egui::Vec2::ZERO,
                });
            }

            if move_resp.dragged() || resize_resp.dragged() {
                let delta = move_resp.drag_delta() + resize_resp.drag_delta();
                if let Some(g) = self.gesture.as_mut().filter(|g| g.id == item.i) {
                    g.offset += delta;
                }
                if move_resp.dragged() {
                    if let Some(pos) = move_resp.interact_pointer_pos() {
                        dashboard.drag(Pointer::new(pos.x, pos.y), now, &mut self.effects);
                    }
                }
            }

            let released = move_resp.drag_released() || resize_resp.drag_released();
            if released && self.gesture.as_ref().is_some_and(|g| g.id == item.i) {
                finished = self.gesture.take();
            }
        }

        if let Some(gesture) = finished {
            let change = gesture_change(&gesture, dashboard.layouts(), bp, col_w, row_h);
            match gesture.kind {
                GestureKind::Move => dashboard.drag_stop(change, now, &mut self.effects),
                GestureKind::Resize => dashboard.resize_stop(change, now, &mut self.effects),
            }
        }

        for (id, command) in commands {
            match command {
                WidgetCommand::Delete => {
                    dashboard.delete_widget(&id);
                }
                WidgetCommand::Update(partial) => {
                    dashboard.update_widget_config(&id, &partial);
                }
            }
        }

        if self.gesture.is_some() || self.effects.is_animating() {
            ui.ctx().request_repaint();
        } else if let Some(deadline) = dashboard.layout_save_deadline() {
            ui.ctx()
                .request_repaint_after(deadline.saturating_duration_since(now));
        }
    }

    /// End a gesture whose widget was deleted before the pointer released.
    fn drop_stale_gesture<S: KeyValueStore>(&mut self, dashboard: &mut Dashboard<S>, now: Instant) -> bool {
        let stale = self
            .gesture
            .as_ref()
            .is_some_and(|g| dashboard.widget(&g.id).is_none());
        if !stale {
            return false;
        }
        if let Some(gesture) = self.gesture.take() {
            tracing::debug!(id = %gesture.id, "dropping gesture for deleted widget");
            match gesture.kind {
                GestureKind::Move => dashboard.drag_stop(None, now, &mut self.effects),
                GestureKind::Resize => dashboard.resize_stop(None, now, &mut self.effects),
            }
        }
        true
    }

    fn render_slot(
        &mut self,
        ui: &mut egui::Ui,
        entry: &WidgetEntry,
        size: GridSize,
    ) -> Option<WidgetCommand> {
        let slot = self.slots.get_mut(&entry.id)?;
        egui::Frame::group(ui.style())
            .show(ui, |ui| {
                ui.set_min_size(ui.available_size());
                let Some(widget) = slot.widget.as_mut() else {
                    ui.label(format!("Widget type \"{}\" not found", entry.widget_type));
                    return ui
                        .small_button("Remove")
                        .clicked()
                        .then_some(WidgetCommand::Delete);
                };
                if slot.failed {
                    ui.colored_label(ui.visuals().error_fg_color, "This widget failed to render");
                    return ui
                        .small_button("Remove")
                        .clicked()
                        .then_some(WidgetCommand::Delete);
                }
                match catch_unwind(AssertUnwindSafe(|| widget.render(ui, size))) {
                    Ok(command) => command,
                    Err(_) => {
                        tracing::error!(id = %entry.id, widget = %entry.widget_type, "widget render panicked");
                        slot.failed = true;
                        None
                    }
                }
            })
            .inner
    }
}

/// Turn a finished gesture into a layout change for `bp`, pushing any
/// overlapped items below the moved or resized one.
fn gesture_change(
    gesture: &Gesture,
    layouts: &Layouts,
    bp: Breakpoint,
    col_w: f32,
    row_h: f32,
) -> Option<LayoutChange> {
    let item = layouts.item(bp, &gesture.id)?;
    let dx = cells_for(gesture.offset.x, col_w);
    let dy = cells_for(gesture.offset.y, row_h);
    let mut store = LayoutStore::new(layouts.clone());
    let changed = match gesture.kind {
        GestureKind::Move => store.move_item(bp, &gesture.id, item.x + dx, item.y + dy),
        GestureKind::Resize => store.resize_item(bp, &gesture.id, item.w + dx, item.h + dy),
    };
    changed.then(|| LayoutChange::single(bp, store.layouts().get(bp).to_vec()))
}

fn paint_tilt(painter: &egui::Painter, rect: egui::Rect, tilt: Tilt) {
    let angle = tilt.rotation.to_radians();
    let (sin, cos) = angle.sin_cos();
    let center = rect.center();
    let corners = [rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom()];
    let rotated = |offset: egui::Vec2| -> Vec<egui::Pos2> {
        corners
            .iter()
            .map(|p| {
                let d = *p - center;
                center + egui::vec2(d.x * cos - d.y * sin, d.x * sin + d.y * cos) + offset
            })
            .collect()
    };
    let alpha = (tilt.shadow.alpha.clamp(0.0, 1.0) * 255.0) as u8;
    painter.add(egui::Shape::convex_polygon(
        rotated(egui::vec2(tilt.shadow.offset_x, tilt.shadow.offset_y)),
        egui::Color32::from_black_alpha(alpha),
        egui::Stroke::NONE,
    ));
    painter.add(egui::Shape::closed_line(
        rotated(egui::Vec2::ZERO),
        egui::Stroke::new(1.0, egui::Color32::from_gray(160)),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::persistence::{MemoryStore, PersistenceGateway};
    use crate::dashboard::widgets::WidgetRegistry;
    use crate::settings::Settings;

    #[test]
    fn row_height_scales_by_width() {
        // 1440 wide: (1440 - 40 - 110) / 12
        assert!((row_height(1440.0) - 107.5).abs() < 1e-3);
        assert!((row_height(1000.0) - (850.0 / 12.0) * 0.9).abs() < 1e-3);
        assert!((row_height(500.0) - (350.0 / 12.0) * 0.8).abs() < 1e-3);
        assert_eq!(row_height(100.0), 0.0);
    }

    #[test]
    fn column_width_never_collapses() {
        assert!((column_width(1230.0, 12) - 90.0).abs() < 1e-3);
        assert_eq!(column_width(10.0, 12), 1.0);
    }

    fn dashboard() -> Dashboard<MemoryStore> {
        Dashboard::new(
            PersistenceGateway::new(MemoryStore::new()),
            WidgetRegistry::with_defaults(),
            &Settings::default(),
            1440,
        )
    }

    #[test]
    fn dropped_widget_pushes_the_one_underneath() {
        let mut dash = dashboard();
        let mut fx = EffectState::new();
        // One column step right lands default-todo on default-weather.
        let gesture = Gesture {
            id: "default-todo".into(),
            kind: GestureKind::Move,
            offset: egui::vec2(100.0, 0.0),
        };
        let change = gesture_change(&gesture, dash.layouts(), Breakpoint::Lg, 90.0, 90.0).unwrap();
        dash.drag_stop(Some(change), Instant::now(), &mut fx);

        let lg = dash.layouts().get(Breakpoint::Lg);
        let todo = dash.layouts().item(Breakpoint::Lg, "default-todo").unwrap();
        assert_eq!(todo.x, 1);
        for (n, a) in lg.iter().enumerate() {
            for b in &lg[n + 1..] {
                assert!(!a.collides(b), "{} overlaps {}", a.i, b.i);
            }
        }
    }

    #[test]
    fn resize_gesture_stays_inside_grid() {
        let dash = dashboard();
        let gesture = Gesture {
            id: "default-notes".into(),
            kind: GestureKind::Resize,
            offset: egui::vec2(1000.0, 0.0),
        };
        let change = gesture_change(&gesture, dash.layouts(), Breakpoint::Lg, 90.0, 90.0).unwrap();
        let notes = change.current().iter().find(|i| i.i == "default-notes").unwrap();
        assert_eq!(notes.x + notes.w, 12);
        assert!(gesture_change(
            &Gesture { id: "missing".into(), ..gesture },
            dash.layouts(),
            Breakpoint::Lg,
            90.0,
            90.0
        )
        .is_none());
    }

    #[test]
    fn deleting_dragged_widget_ends_gesture() {
        let mut dash = dashboard();
        let mut grid = GridView::new();
        let now = Instant::now();
        dash.drag_start("default-notes", Pointer::new(0.0, 0.0), now);
        grid.gesture = Some(Gesture {
            id: "default-notes".into(),
            kind: GestureKind::Move,
            offset: egui::Vec2::ZERO,
        });
        assert!(!grid.drop_stale_gesture(&mut dash, now));
        assert!(grid.gesture.is_some());

        dash.delete_widget("default-notes");
        assert!(grid.drop_stale_gesture(&mut dash, now));
        assert!(grid.gesture.is_none());
        assert!(!dash.physics().is_dragging());
    }

    #[test]
    fn pointer_offsets_snap_to_cells() {
        assert_eq!(cells_for(0.0, 90.0), 0);
        assert_eq!(cells_for(60.0, 90.0), 1);
        assert_eq!(cells_for(-210.0, 90.0), -2);
    }
}
