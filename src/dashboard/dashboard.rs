use crate::dashboard::breakpoints::{viewport_inner_width, Breakpoint, BreakpointTracker};
use crate::dashboard::config::{strip_reserved_keys, WidgetEntry};
use crate::dashboard::drag::{DragPhysics, Pointer, Tilt, VisualEffects};
use crate::dashboard::layout::{LayoutChange, LayoutStore, Layouts};
use crate::dashboard::persistence::{KeyValueStore, PersistenceGateway};
use crate::dashboard::timer::CancellableTimer;
use crate::dashboard::widgets::{merge_json, WidgetRegistry};
use crate::settings::{Settings, Theme};
use serde_json::Value;
use std::time::Instant;

/// Notification sent to observers after each committed mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum DashboardEvent {
    WidgetAdded(String),
    WidgetDeleted(String),
    WidgetUpdated(String),
    LayoutsChanged,
    BreakpointChanged(Breakpoint),
    ThemeChanged(Theme),
}

pub type SubscriptionId = u64;

type Observer = Box<dyn FnMut(&DashboardEvent)>;

/// Process-wide dashboard state: the widget list, its layouts and every
/// mutation that touches them.
pub struct Dashboard<S: KeyValueStore> {
    widgets: Vec<WidgetEntry>,
    layout: LayoutStore,
    registry: WidgetRegistry,
    gateway: PersistenceGateway<S>,
    theme: Theme,
    breakpoint: BreakpointTracker,
    viewport_inset: u32,
    pending: Option<LayoutChange>,
    debounce: CancellableTimer,
    physics: DragPhysics,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
}

impl<S: KeyValueStore> Dashboard<S> {
    /// Load persisted state, repairing it against the widget list.
    pub fn new(
        gateway: PersistenceGateway<S>,
        registry: WidgetRegistry,
        settings: &Settings,
        window_width: u32,
    ) -> Self {
        let cfg = gateway.load(&registry);
        let theme = gateway.load_theme();
        let breakpoint =
            BreakpointTracker::new(viewport_inner_width(window_width, settings.viewport_inset));

        let missing: Vec<&str> = cfg
            .widgets
            .iter()
            .filter(|w| cfg.layouts.item(breakpoint.current(), &w.id).is_none())
            .map(|w| w.id.as_str())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                breakpoint = %breakpoint.current(),
                "widgets without layout items: {}",
                missing.join(", ")
            );
        }

        let mut layout = LayoutStore::new(cfg.layouts);
        layout.reconcile(&cfg.widgets);
        layout.compact();
        tracing::info!(
            widgets = cfg.widgets.len(),
            breakpoint = %breakpoint.current(),
            "dashboard loaded"
        );
        Self {
            widgets: cfg.widgets,
            layout,
            registry,
            gateway,
            theme,
            breakpoint,
            viewport_inset: settings.viewport_inset,
            pending: None,
            debounce: CancellableTimer::new(settings.layout_debounce()),
            physics: DragPhysics::new(settings.rebound_timeout()),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn widgets(&self) -> &[WidgetEntry] {
        &self.widgets
    }

    pub fn widget(&self, id: &str) -> Option<&WidgetEntry> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn layouts(&self) -> &Layouts {
        self.layout.layouts()
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.breakpoint.current()
    }

    pub fn physics(&self) -> &DragPhysics {
        &self.physics
    }

    pub fn has_pending_layout(&self) -> bool {
        self.pending.is_some()
    }

    /// When the debounced layout write will fire, if one is queued.
    pub fn layout_save_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&DashboardEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    fn notify(&mut self, event: DashboardEvent) {
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
    }

    /// Feed a window resize. Fires only when the breakpoint changes.
    pub fn set_window_width(&mut self, window_width: u32) -> Option<Breakpoint> {
        let changed = self
            .breakpoint
            .update(viewport_inner_width(window_width, self.viewport_inset))?;
        self.notify(DashboardEvent::BreakpointChanged(changed));
        Some(changed)
    }

    fn persist(&mut self) {
        if let Err(e) = self.gateway.save(&self.widgets, self.layout.layouts()) {
            tracing::error!(error = %e, "failed to save dashboard");
        }
    }

    fn persist_widgets(&mut self) {
        if let Err(e) = self.gateway.save_widgets(&self.widgets) {
            tracing::error!(error = %e, "failed to save widgets");
        }
    }

    fn persist_layouts(&mut self) {
        if let Err(e) = self.gateway.save_layouts(self.layout.layouts()) {
            tracing::error!(error = %e, "failed to save layouts");
        }
    }

    fn generate_id(&self, widget_type: &str) -> String {
        let now = chrono::Utc::now();
        let mut stamp = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_millis());
        loop {
            let id = format!("{widget_type}-{stamp}");
            if self.widget(&id).is_none() {
                return id;
            }
            stamp += 1;
        }
    }

    /// Add a widget of a registered type. Returns the new id, or `None` when
    /// the type is unknown.
    pub fn add_widget(&mut self, widget_type: &str) -> Option<String> {
        let Some(config) = self.registry.default_settings(widget_type) else {
            tracing::warn!(widget = widget_type, "widget type not found");
            return None;
        };
        let id = self.generate_id(widget_type);
        self.widgets
            .push(WidgetEntry::new(&id, widget_type, strip_reserved_keys(&config)));
        self.layout.add_widget(&id);
        self.layout.compact();
        tracing::info!(id = %id, widget = widget_type, "widget added");
        self.persist();
        self.notify(DashboardEvent::WidgetAdded(id.clone()));
        Some(id)
    }

    /// Remove a widget, its layout items and its stored config together.
    pub fn delete_widget(&mut self, id: &str) -> bool {
        let before = self.widgets.len();
        self.widgets.retain(|w| w.id != id);
        if self.widgets.len() == before {
            return false;
        }
        self.layout.remove_widget(id);
        self.layout.compact();
        if let Some(pending) = &mut self.pending {
            pending.remove_widget(id);
        }
        if let Err(e) = self.gateway.clear_widget_config(id) {
            tracing::error!(id, error = %e, "failed to clear widget config");
        }
        tracing::info!(id, "widget deleted");
        self.persist();
        self.notify(DashboardEvent::WidgetDeleted(id.to_string()));
        true
    }

    /// Merge `partial` into a widget's config and persist it.
    pub fn update_widget_config(&mut self, id: &str, partial: &Value) -> bool {
        let partial = strip_reserved_keys(partial);
        let Some(widget) = self.widgets.iter_mut().find(|w| w.id == id) else {
            return false;
        };
        widget.config = merge_json(&widget.config, &partial);
        self.persist_widgets();
        self.notify(DashboardEvent::WidgetUpdated(id.to_string()));
        true
    }

    /// Queue a grid-reported layout change. Changes arriving before the
    /// debounce delay elapses collapse into one commit.
    pub fn apply_layout_change(&mut self, change: LayoutChange, now: Instant) {
        self.pending = Some(match self.pending.take() {
            Some(pending) => pending.merge(change),
            None => change,
        });
        self.debounce.schedule(now);
    }

    fn commit_pending(&mut self) -> bool {
        let Some(change) = self.pending.take() else {
            return false;
        };
        self.layout.apply(&change);
        self.layout.reconcile(&self.widgets);
        self.layout.compact();
        self.persist_layouts();
        self.notify(DashboardEvent::LayoutsChanged);
        true
    }

    /// Drive timers: the debounced layout write and rebound cleanup.
    pub fn tick(&mut self, now: Instant, effects: &mut dyn VisualEffects) {
        if self.debounce.fire_if_due(now) {
            self.commit_pending();
        }
        self.physics.tick(now, effects);
    }

    /// Commit any pending change and write everything immediately.
    pub fn flush(&mut self) {
        self.debounce.cancel();
        if !self.commit_pending() {
            self.persist_layouts();
        }
        self.persist_widgets();
    }

    pub fn drag_start(&mut self, id: &str, pointer: Pointer, now: Instant) {
        self.physics.drag_start(id, pointer, now);
    }

    pub fn drag(&mut self, pointer: Pointer, now: Instant, effects: &mut dyn VisualEffects) -> Option<Tilt> {
        self.physics.drag_sample(pointer, now, effects)
    }

    /// End a drag; the final geometry, if reported, is committed and saved.
    pub fn drag_stop(
        &mut self,
        change: Option<LayoutChange>,
        now: Instant,
        effects: &mut dyn VisualEffects,
    ) {
        self.physics.drag_stop(now, effects);
        if let Some(change) = change {
            self.apply_layout_change(change, now);
        }
        self.flush();
    }

    pub fn animation_end(&mut self, id: &str, effects: &mut dyn VisualEffects) {
        self.physics.animation_end(id, effects);
    }

    pub fn resize_start(&mut self, effects: &mut dyn VisualEffects) {
        self.physics.resize_start(effects);
    }

    /// End a resize and write without waiting for the debounce.
    pub fn resize_stop(
        &mut self,
        change: Option<LayoutChange>,
        now: Instant,
        effects: &mut dyn VisualEffects,
    ) {
        self.physics.resize_stop(effects);
        if let Some(change) = change {
            self.apply_layout_change(change, now);
        }
        self.flush();
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        if let Err(e) = self.gateway.save_theme(self.theme) {
            tracing::error!(error = %e, "failed to save theme");
        }
        self.notify(DashboardEvent::ThemeChanged(self.theme));
        self.theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::drag::EffectState;
    use crate::dashboard::layout::LayoutItem;
    use crate::dashboard::persistence::{widget_config_key, MemoryStore, LAYOUTS_KEY, WIDGETS_KEY};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn dashboard() -> Dashboard<MemoryStore> {
        Dashboard::new(
            PersistenceGateway::new(MemoryStore::new()),
            WidgetRegistry::with_defaults(),
            &Settings::default(),
            1440,
        )
    }

    #[test]
    fn add_unknown_type_is_rejected() {
        let mut dash = dashboard();
        let before = dash.widgets().len();
        assert_eq!(dash.add_widget("flux-capacitor"), None);
        assert_eq!(dash.widgets().len(), before);
    }

    #[test]
    fn add_appends_to_each_breakpoint() {
        let mut dash = dashboard();
        let id = dash.add_widget("notes").unwrap();
        assert!(id.starts_with("notes-"));
        for bp in Breakpoint::ALL {
            let items = dash.layouts().get(bp);
            assert_eq!(items.last().unwrap().i, id);
            assert_eq!(dash.layouts().count(bp, &id), 1);
        }
        let xs = dash.layouts().item(Breakpoint::Xs, &id).unwrap();
        assert_eq!((xs.w, xs.h, xs.max_w, xs.max_h), (2, 2, Some(2), Some(2)));
        let lg = dash.layouts().item(Breakpoint::Lg, &id).unwrap();
        assert_eq!((lg.x, lg.y, lg.w), (0, 3, 3));
    }

    #[test]
    fn ids_do_not_collide() {
        let mut dash = dashboard();
        let a = dash.add_widget("todo").unwrap();
        let b = dash.add_widget("todo").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn delete_is_complete() {
        let mut dash = dashboard();
        assert!(!dash.gateway().store().contains(&widget_config_key("default-notes")));
        dash.flush();
        assert!(dash.gateway().store().contains(&widget_config_key("default-notes")));
        assert!(dash.delete_widget("default-notes"));
        assert!(!dash.layouts().contains_widget("default-notes"));
        assert!(dash.widget("default-notes").is_none());
        assert!(!dash.gateway().store().contains(&widget_config_key("default-notes")));
        assert!(!dash.delete_widget("default-notes"));
    }

    #[test]
    fn update_merges_and_persists_config() {
        let mut dash = dashboard();
        let key = widget_config_key("default-notes");
        let widget_writes = dash.gateway().store().writes(WIDGETS_KEY);
        assert!(dash.update_widget_config("default-notes", &json!({"content": "hi", "onUpdate": 1})));
        let cfg = &dash.widget("default-notes").unwrap().config;
        assert_eq!(cfg["content"], json!("hi"));
        assert_eq!(cfg["title"], json!("Notes"));
        assert!(cfg.get("onUpdate").is_none());
        assert_eq!(
            dash.gateway().widget_config("default-notes").unwrap()["content"],
            json!("hi")
        );
        assert_eq!(dash.gateway().store().writes(&key), 1);
        assert_eq!(dash.gateway().store().writes(WIDGETS_KEY), widget_writes + 1);
        assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 0);
        assert!(!dash.update_widget_config("nope", &json!({})));
    }

    #[test]
    fn debounce_collapses_bursts() {
        let mut dash = dashboard();
        let mut fx = EffectState::new();
        let start = Instant::now();
        for step in 0..5 {
            let item = LayoutItem::new("default-todo", 0, 0, 3, 3 + step);
            dash.apply_layout_change(
                LayoutChange::single(Breakpoint::Lg, vec![item]),
                start + Duration::from_millis(step as u64 * 10),
            );
        }
        dash.tick(start + Duration::from_millis(90), &mut fx);
        assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 0);
        dash.tick(start + Duration::from_millis(140), &mut fx);
        assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 1);
        assert_eq!(dash.layouts().item(Breakpoint::Lg, "default-todo").unwrap().h, 7);
        dash.tick(start + Duration::from_millis(400), &mut fx);
        assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 1);
    }

    #[test]
    fn resize_stop_flushes_immediately() {
        let mut dash = dashboard();
        let mut fx = EffectState::new();
        let now = Instant::now();
        let widget_writes = dash.gateway().store().writes(WIDGETS_KEY);
        dash.resize_start(&mut fx);
        assert!(fx.is_resizing());
        let item = LayoutItem::new("default-todo", 0, 0, 6, 4);
        dash.resize_stop(Some(LayoutChange::single(Breakpoint::Lg, vec![item])), now, &mut fx);
        assert!(!fx.is_resizing());
        assert!(!dash.has_pending_layout());
        assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 1);
        assert_eq!(dash.gateway().store().writes(WIDGETS_KEY), widget_writes + 1);
        assert_eq!(dash.layouts().item(Breakpoint::Lg, "default-todo").unwrap().w, 6);
        // Items missing from the single-breakpoint report are re-synthesized.
        assert_eq!(dash.layouts().count(Breakpoint::Lg, "default-notes"), 1);
    }

    #[test]
    fn delete_then_add_leaves_no_overlap() {
        let mut dash = dashboard();
        assert!(dash.delete_widget("default-weather"));
        dash.add_widget("todo").unwrap();
        dash.add_widget("notes").unwrap();
        for bp in Breakpoint::ALL {
            let items = dash.layouts().get(bp);
            for (n, a) in items.iter().enumerate() {
                for b in &items[n + 1..] {
                    assert!(!a.collides(b), "{bp}: {} overlaps {}", a.i, b.i);
                }
            }
        }
    }

    #[test]
    fn observers_see_committed_mutations() {
        let mut dash = dashboard();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = dash.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        let id = dash.add_widget("todo").unwrap();
        dash.set_window_width(1100);
        dash.toggle_theme();
        assert!(dash.unsubscribe(sub));
        dash.delete_widget(&id);
        assert_eq!(
            *seen.borrow(),
            vec![
                DashboardEvent::WidgetAdded(id),
                DashboardEvent::BreakpointChanged(Breakpoint::Md),
                DashboardEvent::ThemeChanged(Theme::Dark),
            ]
        );
    }

    #[test]
    fn breakpoint_accounts_for_inset() {
        let mut dash = dashboard();
        assert_eq!(dash.breakpoint(), Breakpoint::Lg);
        assert_eq!(dash.set_window_width(1230), Some(Breakpoint::Md));
        assert_eq!(dash.set_window_width(1200), None);
        assert_eq!(dash.set_window_width(1240), Some(Breakpoint::Lg));
    }

    #[test]
    fn theme_is_persisted() {
        let mut dash = dashboard();
        assert_eq!(dash.theme(), Theme::Light);
        dash.toggle_theme();
        assert_eq!(dash.gateway().load_theme(), Theme::Dark);
    }
}
