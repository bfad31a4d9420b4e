use crate::dashboard::breakpoints::Breakpoint;
use crate::dashboard::config::WidgetEntry;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Hard floor for every size field, in grid cells.
pub const MIN_CELLS: i32 = 2;

/// Edge length of the default desktop/tablet block.
const BLOCK: i32 = 3;

fn default_min() -> i32 {
    MIN_CELLS
}

/// Placement of one widget inside one breakpoint's grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    pub i: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default = "default_min")]
    pub w: i32,
    #[serde(default = "default_min")]
    pub h: i32,
    #[serde(default = "default_min")]
    pub min_w: i32,
    #[serde(default = "default_min")]
    pub min_h: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_w: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_h: Option<i32>,
}

impl LayoutItem {
    pub fn new(id: &str, x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            i: id.to_string(),
            x,
            y,
            w,
            h,
            min_w: MIN_CELLS,
            min_h: MIN_CELLS,
            max_w: None,
            max_h: None,
        }
    }

    /// Enforce the 2x2 floor on size and size bounds.
    pub fn floored(mut self) -> Self {
        self.w = self.w.max(MIN_CELLS);
        self.h = self.h.max(MIN_CELLS);
        self.min_w = self.min_w.max(MIN_CELLS);
        self.min_h = self.min_h.max(MIN_CELLS);
        self
    }

    /// True when the two items share at least one cell.
    pub fn collides(&self, other: &LayoutItem) -> bool {
        self.i != other.i
            && self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    fn clamp_size(&mut self, w: i32, h: i32) {
        let mut w = w.max(self.min_w).max(MIN_CELLS);
        let mut h = h.max(self.min_h).max(MIN_CELLS);
        if let Some(max_w) = self.max_w {
            w = w.min(max_w.max(MIN_CELLS));
        }
        if let Some(max_h) = self.max_h {
            h = h.min(max_h.max(MIN_CELLS));
        }
        self.w = w;
        self.h = h;
    }
}

/// Default placement for widget `id` at `index` within `breakpoint`.
pub fn default_layout_item(id: &str, index: usize, breakpoint: Breakpoint, cols: u32) -> LayoutItem {
    let index = index as i32;
    match breakpoint {
        Breakpoint::Lg | Breakpoint::Md => {
            let per_row = (cols as i32 / BLOCK).max(1);
            LayoutItem::new(
                id,
                (index % per_row) * BLOCK,
                (index / per_row) * BLOCK,
                BLOCK,
                BLOCK,
            )
        }
        Breakpoint::Sm => {
            let per_row = 2;
            LayoutItem::new(
                id,
                (index % per_row) * BLOCK,
                (index / per_row) * BLOCK,
                BLOCK,
                BLOCK,
            )
        }
        Breakpoint::Xs | Breakpoint::Xxs => LayoutItem {
            max_w: Some(MIN_CELLS),
            max_h: Some(MIN_CELLS),
            ..LayoutItem::new(id, 0, index * MIN_CELLS, MIN_CELLS, MIN_CELLS)
        },
    }
}

/// Per-breakpoint layouts. Every breakpoint always has an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layouts {
    map: BTreeMap<Breakpoint, Vec<LayoutItem>>,
}

impl Default for Layouts {
    fn default() -> Self {
        Self {
            map: Breakpoint::ALL.into_iter().map(|bp| (bp, Vec::new())).collect(),
        }
    }
}

impl Layouts {
    pub fn get(&self, breakpoint: Breakpoint) -> &[LayoutItem] {
        self.map.get(&breakpoint).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_mut(&mut self, breakpoint: Breakpoint) -> &mut Vec<LayoutItem> {
        self.map.entry(breakpoint).or_default()
    }

    pub fn set(&mut self, breakpoint: Breakpoint, items: Vec<LayoutItem>) {
        self.map.insert(breakpoint, items);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Breakpoint, &[LayoutItem])> {
        self.map.iter().map(|(bp, items)| (*bp, items.as_slice()))
    }

    pub fn item(&self, breakpoint: Breakpoint, id: &str) -> Option<&LayoutItem> {
        self.get(breakpoint).iter().find(|item| item.i == id)
    }

    fn item_mut(&mut self, breakpoint: Breakpoint, id: &str) -> Option<&mut LayoutItem> {
        self.get_mut(breakpoint).iter_mut().find(|item| item.i == id)
    }

    /// Number of items for `id` in `breakpoint`.
    pub fn count(&self, breakpoint: Breakpoint, id: &str) -> usize {
        self.get(breakpoint).iter().filter(|item| item.i == id).count()
    }

    pub fn contains_widget(&self, id: &str) -> bool {
        self.map.values().flatten().any(|item| item.i == id)
    }
}

impl Serialize for Layouts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.map.len()))?;
        for (bp, items) in &self.map {
            map.serialize_entry(bp.as_str(), items)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Layouts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(validate(&raw))
    }
}

/// Coerce arbitrary decoded JSON into a fully populated [`Layouts`].
///
/// Missing or non-array breakpoints become empty, undecodable items are
/// skipped and every surviving item is floored. Never fails.
pub fn validate(raw: &Value) -> Layouts {
    let mut layouts = Layouts::default();
    if let Some(map) = raw.as_object() {
        for key in map.keys().filter(|k| Breakpoint::from_name(k).is_none()) {
            tracing::warn!(key = %key, "ignoring unknown breakpoint in stored layouts");
        }
    }
    for bp in Breakpoint::ALL {
        let Some(items) = raw.get(bp.as_str()).and_then(Value::as_array) else {
            tracing::warn!(breakpoint = %bp, "layout missing or malformed; using empty layout");
            continue;
        };
        let validated = items
            .iter()
            .filter_map(|item| match serde_json::from_value::<LayoutItem>(item.clone()) {
                Ok(item) => Some(item.floored()),
                Err(e) => {
                    tracing::warn!(breakpoint = %bp, error = %e, "dropping invalid layout item");
                    None
                }
            })
            .collect();
        layouts.set(bp, validated);
    }
    layouts
}

/// Purge orphans and synthesize items for widgets that lack one.
///
/// Running this twice yields the same result as running it once.
pub fn reconcile_with_widgets(layouts: &Layouts, widgets: &[WidgetEntry]) -> Layouts {
    let live: HashSet<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
    let mut reconciled = Layouts::default();
    for bp in Breakpoint::ALL {
        let mut seen = HashSet::new();
        let mut items: Vec<LayoutItem> = Vec::with_capacity(widgets.len());
        for item in layouts.get(bp) {
            if !live.contains(item.i.as_str()) {
                tracing::debug!(breakpoint = %bp, id = %item.i, "purging orphaned layout item");
                continue;
            }
            if seen.insert(item.i.clone()) {
                items.push(item.clone());
            }
        }
        for (index, widget) in widgets.iter().enumerate() {
            if !seen.contains(widget.id.as_str()) {
                tracing::warn!(breakpoint = %bp, id = %widget.id, "synthesizing missing layout item");
                items.push(default_layout_item(&widget.id, index, bp, bp.cols()));
                seen.insert(widget.id.clone());
            }
        }
        reconciled.set(bp, items);
    }
    reconciled
}

/// Float every item up to the first free row, keeping relative order.
///
/// Items are placed top to bottom, left to right; each rises until it would
/// touch an already placed item and drops below anything it still overlaps.
pub fn compact_vertical(items: &[LayoutItem]) -> Vec<LayoutItem> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&i| (items[i].y, items[i].x));

    let mut compacted = items.to_vec();
    let mut placed: Vec<LayoutItem> = Vec::with_capacity(items.len());
    for index in order {
        let mut item = items[index].clone();
        item.y = item.y.max(0);
        while item.y > 0 {
            let raised = LayoutItem {
                y: item.y - 1,
                ..item.clone()
            };
            if placed.iter().any(|p| p.collides(&raised)) {
                break;
            }
            item.y -= 1;
        }
        while let Some(blocker) = placed.iter().find(|p| p.collides(&item)) {
            item.y = blocker.y + blocker.h;
        }
        placed.push(item.clone());
        compacted[index] = item;
    }
    compacted
}

/// Push everything overlapping `items[moved]` below it, cascading.
fn push_colliders_down(items: &mut [LayoutItem], moved: usize) {
    let mut queue = vec![moved];
    while let Some(index) = queue.pop() {
        let anchor = items[index].clone();
        for other in 0..items.len() {
            if other != index && items[other].collides(&anchor) {
                items[other].y = anchor.y + anchor.h;
                queue.push(other);
            }
        }
    }
}

/// A layout update reported by the grid during drag or resize.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutChange {
    /// Breakpoint the interaction happened in.
    pub breakpoint: Breakpoint,
    pub layouts: BTreeMap<Breakpoint, Vec<LayoutItem>>,
    /// True when the grid reported layouts for every breakpoint.
    pub complete: bool,
}

impl LayoutChange {
    /// Only the active breakpoint was reported.
    pub fn single(breakpoint: Breakpoint, items: Vec<LayoutItem>) -> Self {
        Self {
            breakpoint,
            layouts: BTreeMap::from([(breakpoint, items)]),
            complete: false,
        }
    }

    pub fn complete(
        breakpoint: Breakpoint,
        current: Vec<LayoutItem>,
        mut all: BTreeMap<Breakpoint, Vec<LayoutItem>>,
    ) -> Self {
        all.insert(breakpoint, current);
        Self {
            breakpoint,
            layouts: all,
            complete: true,
        }
    }

    pub fn current(&self) -> &[LayoutItem] {
        self.layouts
            .get(&self.breakpoint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fold a newer change into this one; later breakpoints win.
    pub fn merge(mut self, next: LayoutChange) -> Self {
        self.layouts.extend(next.layouts);
        self.breakpoint = next.breakpoint;
        self.complete |= next.complete;
        self
    }

    pub fn remove_widget(&mut self, id: &str) {
        for items in self.layouts.values_mut() {
            items.retain(|item| item.i != id);
        }
    }
}

/// Apply a grid-reported change on top of `layouts`.
pub fn apply_layout_change(layouts: &Layouts, change: &LayoutChange) -> Layouts {
    let floor = |items: &[LayoutItem]| -> Vec<LayoutItem> {
        items.iter().cloned().map(LayoutItem::floored).collect()
    };
    let mut updated = layouts.clone();
    if change.complete {
        let current = floor(change.current());
        for bp in Breakpoint::ALL {
            let items = match change.layouts.get(&bp) {
                Some(items) => floor(items),
                None => current.clone(),
            };
            updated.set(bp, items);
        }
    } else {
        for (bp, items) in &change.layouts {
            updated.set(*bp, floor(items));
        }
    }
    updated
}

/// Owner of the live [`Layouts`] with the grid mutation API.
#[derive(Debug, Clone, Default)]
pub struct LayoutStore {
    layouts: Layouts,
}

impl LayoutStore {
    pub fn new(layouts: Layouts) -> Self {
        Self { layouts }
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    pub fn reconcile(&mut self, widgets: &[WidgetEntry]) {
        self.layouts = reconcile_with_widgets(&self.layouts, widgets);
    }

    pub fn apply(&mut self, change: &LayoutChange) {
        self.layouts = apply_layout_change(&self.layouts, change);
    }

    /// Vertically compact every breakpoint.
    pub fn compact(&mut self) {
        for bp in Breakpoint::ALL {
            let compacted = compact_vertical(self.layouts.get(bp));
            self.layouts.set(bp, compacted);
        }
    }

    /// Append a default item for `id` at the end of every breakpoint.
    pub fn add_widget(&mut self, id: &str) {
        for bp in Breakpoint::ALL {
            let items = self.layouts.get_mut(bp);
            let mut item = default_layout_item(id, items.len(), bp, bp.cols());
            if bp.is_mobile() {
                item.w = MIN_CELLS;
                item.h = MIN_CELLS;
                item.max_w = Some(MIN_CELLS);
                item.max_h = Some(MIN_CELLS);
            }
            items.push(item);
        }
    }

    /// Remove `id` from every breakpoint. Returns whether anything was removed.
    pub fn remove_widget(&mut self, id: &str) -> bool {
        let mut removed = false;
        for bp in Breakpoint::ALL {
            let items = self.layouts.get_mut(bp);
            let before = items.len();
            items.retain(|item| item.i != id);
            removed |= items.len() != before;
        }
        removed
    }

    /// Resize within the item's bounds and the grid width; the 2x2 floor
    /// always holds. Overlapped items are pushed down.
    pub fn resize_item(&mut self, breakpoint: Breakpoint, id: &str, w: i32, h: i32) -> bool {
        let cols = breakpoint.cols() as i32;
        let Some(item) = self.layouts.item_mut(breakpoint, id) else {
            return false;
        };
        item.clamp_size(w.min(cols - item.x), h);
        self.push_down(breakpoint, id);
        true
    }

    /// Move inside the grid width. Overlapped items are pushed down.
    pub fn move_item(&mut self, breakpoint: Breakpoint, id: &str, x: i32, y: i32) -> bool {
        let cols = breakpoint.cols() as i32;
        let Some(item) = self.layouts.item_mut(breakpoint, id) else {
            return false;
        };
        item.x = x.clamp(0, (cols - item.w).max(0));
        item.y = y.max(0);
        self.push_down(breakpoint, id);
        true
    }

    fn push_down(&mut self, breakpoint: Breakpoint, id: &str) {
        let items = self.layouts.get_mut(breakpoint);
        if let Some(index) = items.iter().position(|item| item.i == id) {
            push_colliders_down(items, index);
        }
    }
}
