pub mod breakpoints;
pub mod config;
pub mod dashboard;
pub mod drag;
pub mod grid;
pub mod layout;
pub mod persistence;
pub mod timer;
pub mod widgets;

pub use breakpoints::{Breakpoint, BreakpointTracker};
pub use config::{DashboardConfig, WidgetEntry};
pub use dashboard::{Dashboard, DashboardEvent, SubscriptionId};
pub use drag::{DragPhysics, EffectState, VisualEffects};
pub use grid::GridView;
pub use layout::{LayoutChange, LayoutItem, LayoutStore, Layouts};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceGateway};
pub use widgets::{WidgetCommand, WidgetFactory, WidgetRegistry};
