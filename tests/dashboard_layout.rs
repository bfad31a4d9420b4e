use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use boxento::dashboard::breakpoints::Breakpoint;
use boxento::dashboard::config::{default_layouts, WidgetEntry, DEFAULT_WIDGETS};
use boxento::dashboard::drag::{EffectState, Pointer};
use boxento::dashboard::layout::{LayoutChange, LayoutItem};
use boxento::dashboard::persistence::{
    widget_config_key, FileStore, KeyValueStore, MemoryStore, PersistenceGateway, LAYOUTS_KEY,
    WIDGETS_KEY,
};
use boxento::dashboard::{Dashboard, WidgetRegistry};
use boxento::settings::Settings;
use once_cell::sync::Lazy;
use serde_json::json;

static START: Lazy<Instant> = Lazy::new(Instant::now);

fn at(ms: u64) -> Instant {
    *START + Duration::from_millis(ms)
}

fn open<S: KeyValueStore>(store: S) -> Dashboard<S> {
    Dashboard::new(
        PersistenceGateway::new(store),
        WidgetRegistry::with_defaults(),
        &Settings::default(),
        1440,
    )
}

fn default_widgets() -> Vec<WidgetEntry> {
    let registry = WidgetRegistry::with_defaults();
    DEFAULT_WIDGETS
        .iter()
        .map(|(id, ty)| WidgetEntry::new(id, ty, registry.default_settings(ty).unwrap()))
        .collect()
}

fn assert_consistent<S: KeyValueStore>(dash: &Dashboard<S>) {
    for bp in Breakpoint::ALL {
        let items = dash.layouts().get(bp);
        assert_eq!(items.len(), dash.widgets().len(), "{bp} item count");
        for widget in dash.widgets() {
            assert_eq!(dash.layouts().count(bp, &widget.id), 1, "{bp} {}", widget.id);
        }
        for (n, item) in items.iter().enumerate() {
            assert!(item.w >= 2 && item.h >= 2 && item.min_w >= 2 && item.min_h >= 2);
            for other in &items[n + 1..] {
                assert!(!item.collides(other), "{bp}: {} overlaps {}", item.i, other.i);
            }
        }
    }
}

#[test]
fn empty_storage_loads_default_dashboard() {
    let dash = open(MemoryStore::new());
    let ids: Vec<&str> = dash.widgets().iter().map(|w| w.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["default-todo", "default-weather", "default-quick-links", "default-notes"]
    );
    assert_eq!(dash.layouts(), &default_layouts());
    assert_consistent(&dash);
}

#[test]
fn missing_breakpoint_is_repaired_on_load() {
    let mut store = MemoryStore::new();
    let widgets = default_widgets();
    let mut layouts = serde_json::to_value(default_layouts()).unwrap();
    layouts.as_object_mut().unwrap().remove("sm");
    store
        .set(WIDGETS_KEY, &serde_json::to_string(&widgets).unwrap())
        .unwrap();
    store.set(LAYOUTS_KEY, &layouts.to_string()).unwrap();

    let dash = open(store);
    assert_consistent(&dash);
    let sm = dash.layouts().get(Breakpoint::Sm);
    assert_eq!(sm[0], LayoutItem::new("default-todo", 0, 0, 3, 3));
    assert_eq!(sm[1], LayoutItem::new("default-weather", 3, 0, 3, 3));
    assert_eq!(sm[2], LayoutItem::new("default-quick-links", 0, 3, 3, 3));
    assert_eq!(
        dash.layouts().get(Breakpoint::Lg),
        default_layouts().get(Breakpoint::Lg)
    );
}

#[test]
fn corrupt_layouts_fall_back_to_defaults() {
    let mut store = MemoryStore::new();
    store
        .set(WIDGETS_KEY, &serde_json::to_string(&default_widgets()).unwrap())
        .unwrap();
    store.set(LAYOUTS_KEY, "[1, 2, 3]").unwrap();
    let dash = open(store);
    assert_eq!(dash.layouts(), &default_layouts());
}

#[test]
fn undersized_items_are_floored_on_load() {
    let mut store = MemoryStore::new();
    store
        .set(
            WIDGETS_KEY,
            &json!([{"id": "n", "type": "notes", "config": {}}]).to_string(),
        )
        .unwrap();
    store
        .set(
            LAYOUTS_KEY,
            &json!({"lg": [{"i": "n", "x": 0, "y": 0, "w": 1, "h": 0, "minW": 1}]}).to_string(),
        )
        .unwrap();
    let dash = open(store);
    let item = dash.layouts().item(Breakpoint::Lg, "n").unwrap();
    assert_eq!((item.w, item.h, item.min_w, item.min_h), (2, 2, 2, 2));
    assert_consistent(&dash);
}

#[test]
fn burst_of_changes_writes_layouts_once() {
    let mut dash = open(MemoryStore::new());
    let mut fx = EffectState::new();
    for step in 0..5u64 {
        let mut items = dash.layouts().get(Breakpoint::Lg).to_vec();
        items[0].h = step as i32 + 4;
        dash.apply_layout_change(LayoutChange::single(Breakpoint::Lg, items), at(step * 10));
        dash.tick(at(step * 10 + 5), &mut fx);
    }
    assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 0);
    dash.tick(at(200), &mut fx);
    assert_eq!(dash.gateway().store().writes(LAYOUTS_KEY), 1);

    let raw = dash.gateway().store().get(LAYOUTS_KEY).unwrap().unwrap();
    let saved: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(saved["lg"][0]["i"], json!("default-todo"));
    assert_eq!(saved["lg"][0]["h"], json!(8));
}

#[test]
fn fast_drag_tilts_then_settles() {
    let mut dash = open(MemoryStore::new());
    let mut fx = EffectState::new();
    dash.drag_start("default-todo", Pointer::new(0.0, 0.0), at(0));
    let mut tilt = None;
    for n in 1..=30u64 {
        // 6.4px every 16ms is 400px/s.
        tilt = dash.drag(Pointer::new(6.4 * n as f32, 0.0), at(16 * n), &mut fx);
    }
    let tilt = tilt.unwrap();
    assert!((tilt.rotation - 9.9).abs() < 0.3, "rotation {}", tilt.rotation);
    assert!(tilt.shadow.offset_x > 0.0);

    let stop = at(16 * 30);
    dash.drag_stop(None, stop, &mut fx);
    assert!(dash.physics().is_rebounding("default-todo"));
    let settled = fx.tilt_at("default-todo", stop + Duration::from_millis(600)).unwrap();
    assert!(settled.rotation.abs() < 1e-3);

    // No completion signal: the fail-safe clears everything.
    dash.tick(stop + Duration::from_millis(700), &mut fx);
    assert!(!dash.physics().is_rebounding("default-todo"));
    assert!(fx.tilt_at("default-todo", stop + Duration::from_millis(700)).is_none());
}

#[test]
fn deleting_during_another_drag_keeps_dragged_geometry() {
    let mut dash = open(MemoryStore::new());
    let mut fx = EffectState::new();
    dash.drag_start("default-todo", Pointer::new(10.0, 10.0), at(0));
    dash.drag(Pointer::new(40.0, 10.0), at(16), &mut fx);

    let mut current = dash.layouts().get(Breakpoint::Lg).to_vec();
    current[0].x = 3;
    current[0].y = 2;
    let others: BTreeMap<_, _> = [Breakpoint::Md]
        .into_iter()
        .map(|bp| (bp, dash.layouts().get(bp).to_vec()))
        .collect();
    dash.apply_layout_change(
        LayoutChange::complete(Breakpoint::Lg, current, others),
        at(20),
    );

    assert!(dash.delete_widget("default-notes"));
    dash.drag_stop(None, at(40), &mut fx);

    let todo = dash.layouts().item(Breakpoint::Lg, "default-todo").unwrap();
    assert_eq!((todo.x, todo.y), (3, 2));
    // Complete change without sm: the active layout fills it.
    let todo_sm = dash.layouts().item(Breakpoint::Sm, "default-todo").unwrap();
    assert_eq!((todo_sm.x, todo_sm.y), (3, 2));
    assert!(!dash.layouts().contains_widget("default-notes"));
    assert!(!dash.has_pending_layout());
    assert_consistent(&dash);

    let raw = dash.gateway().store().get(LAYOUTS_KEY).unwrap().unwrap();
    assert!(!raw.contains("default-notes"));
}

#[test]
fn add_and_delete_keep_layouts_in_step() {
    let mut dash = open(MemoryStore::new());
    let id = dash.add_widget("weather").unwrap();
    assert_consistent(&dash);
    for bp in [Breakpoint::Xs, Breakpoint::Xxs] {
        let item = dash.layouts().item(bp, &id).unwrap();
        assert_eq!((item.w, item.h), (2, 2));
        assert_eq!((item.max_w, item.max_h), (Some(2), Some(2)));
    }
    assert!(dash.gateway().store().contains(&widget_config_key(&id)));

    assert!(dash.delete_widget(&id));
    assert_consistent(&dash);
    assert!(!dash.layouts().contains_widget(&id));
    assert!(!dash.gateway().store().contains(&widget_config_key(&id)));
    assert!(dash.add_widget("does-not-exist").is_none());
}

#[test]
fn deleted_slot_is_reused_without_overlap() {
    let mut dash = open(MemoryStore::new());
    assert!(dash.delete_widget("default-todo"));
    assert_consistent(&dash);
    let weather = dash.layouts().item(Breakpoint::Xs, "default-weather").unwrap();
    assert_eq!(weather.y, 0);

    for ty in ["todo", "notes", "quick-links"] {
        dash.add_widget(ty).unwrap();
        assert_consistent(&dash);
    }
    dash.flush();
    let reopened = open(dash.gateway().store().clone());
    assert_consistent(&reopened);
}

#[test]
fn state_survives_reopen_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let mut dash = open(FileStore::new(dir.path()));
        let id = dash.add_widget("notes").unwrap();
        dash.update_widget_config(&id, &json!({"content": "remember"}));
        dash.toggle_theme();
        dash.flush();
        id
    };

    let dash = open(FileStore::new(dir.path()));
    assert_eq!(dash.widget(&id).unwrap().config["content"], json!("remember"));
    assert_eq!(dash.theme(), boxento::settings::Theme::Dark);
    assert_consistent(&dash);
}
