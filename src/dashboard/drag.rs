//! Drag feedback: pointer samples in, tilt and shadow out.
//!
//! [`DragPhysics`] turns pointer motion into a smoothed horizontal velocity
//! and maps it to a rotation. Visual output goes through [`VisualEffects`] so
//! the math runs without a rendering surface. Nothing here touches layout
//! data; the dashboard commits geometry when the drag stops.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Shortest time slice used for a velocity sample.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(16);
/// Weight of the newest sample in the moving average.
pub const SAMPLE_WEIGHT: f32 = 0.4;
pub const MIN_VELOCITY: f32 = 20.0;
pub const MAX_VELOCITY: f32 = 800.0;
pub const MIN_ROTATION: f32 = 0.5;
pub const MAX_ROTATION: f32 = 20.0;
/// Length of the rebound-to-rest animation.
pub const REBOUND_DURATION: Duration = Duration::from_millis(600);
/// Cleanup deadline if the animation never reports completion.
pub const REBOUND_TIMEOUT: Duration = Duration::from_millis(700);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
}

impl Pointer {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Shadow {
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur: f32,
    pub alpha: f32,
}

/// Visual response for one drag sample. `rotation` is signed, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tilt {
    pub rotation: f32,
    pub shadow: Shadow,
}

pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Unsigned rotation for a smoothed velocity in px/s.
pub fn rotation_for_velocity(velocity: f32) -> f32 {
    let t = (velocity - MIN_VELOCITY) / (MAX_VELOCITY - MIN_VELOCITY);
    MIN_ROTATION + (MAX_ROTATION - MIN_ROTATION) * smoothstep(t)
}

pub fn shadow_for(angle: f32, direction: DragDirection) -> Shadow {
    Shadow {
        offset_x: match direction {
            DragDirection::Left => -5.0,
            DragDirection::Right => 5.0,
        },
        offset_y: 8.0,
        blur: 10.0 + angle.min(15.0),
        alpha: 0.12 + angle * 0.01,
    }
}

pub fn tilt_for(velocity: f32, direction: DragDirection) -> Tilt {
    let angle = rotation_for_velocity(velocity);
    let rotation = match direction {
        DragDirection::Left => -angle,
        DragDirection::Right => angle,
    };
    Tilt {
        rotation,
        shadow: shadow_for(angle, direction),
    }
}

/// Presentation hooks the physics engine drives.
pub trait VisualEffects {
    fn apply_tilt(&mut self, id: &str, tilt: Tilt);
    fn start_rebound(&mut self, id: &str, from_rotation: f32, now: Instant);
    /// Back to rest: no rotation, default shadow.
    fn clear(&mut self, id: &str);
    fn set_resizing(&mut self, resizing: bool);
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    id: String,
    last: Pointer,
    last_time: Instant,
    velocity: f32,
    direction: Option<DragDirection>,
    rotation: f32,
}

#[derive(Debug, Clone)]
struct Rebound {
    id: String,
    started: Instant,
}

pub struct DragPhysics {
    active: Option<ActiveDrag>,
    rebounds: Vec<Rebound>,
    resizing: bool,
    rebound_timeout: Duration,
}

impl Default for DragPhysics {
    fn default() -> Self {
        Self::new(REBOUND_TIMEOUT)
    }
}

impl DragPhysics {
    pub fn new(rebound_timeout: Duration) -> Self {
        Self {
            active: None,
            rebounds: Vec::new(),
            resizing: false,
            rebound_timeout,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn dragged_id(&self) -> Option<&str> {
        self.active.as_ref().map(|d| d.id.as_str())
    }

    pub fn velocity(&self) -> f32 {
        self.active.as_ref().map(|d| d.velocity).unwrap_or(0.0)
    }

    pub fn direction(&self) -> Option<DragDirection> {
        self.active.as_ref().and_then(|d| d.direction)
    }

    /// Signed rotation last applied to the dragged element.
    pub fn rotation(&self) -> f32 {
        self.active.as_ref().map(|d| d.rotation).unwrap_or(0.0)
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    pub fn is_rebounding(&self, id: &str) -> bool {
        self.rebounds.iter().any(|r| r.id == id)
    }

    pub fn drag_start(&mut self, id: &str, pointer: Pointer, now: Instant) {
        tracing::trace!(id, "drag start");
        self.active = Some(ActiveDrag {
            id: id.to_string(),
            last: pointer,
            last_time: now,
            velocity: 0.0,
            direction: None,
            rotation: 0.0,
        });
    }

    /// Feed one pointer sample. Returns the tilt applied, if any.
    pub fn drag_sample(
        &mut self,
        pointer: Pointer,
        now: Instant,
        effects: &mut dyn VisualEffects,
    ) -> Option<Tilt> {
        let drag = self.active.as_mut()?;
        let dt = now
            .saturating_duration_since(drag.last_time)
            .max(MIN_SAMPLE_INTERVAL)
            .as_secs_f32();
        let dx = pointer.x - drag.last.x;
        let instant_velocity = dx.abs() / dt;
        drag.velocity = drag.velocity * (1.0 - SAMPLE_WEIGHT) + instant_velocity * SAMPLE_WEIGHT;
        drag.last = pointer;
        drag.last_time = now;

        let direction = if dx < 0.0 {
            DragDirection::Left
        } else {
            DragDirection::Right
        };
        drag.direction = Some(direction);
        if dx == 0.0 {
            return None;
        }
        let tilt = tilt_for(drag.velocity, direction);
        drag.rotation = tilt.rotation;
        effects.apply_tilt(&drag.id, tilt);
        Some(tilt)
    }

    /// End the drag and start the rebound. Returns the id that was dragged.
    pub fn drag_stop(&mut self, now: Instant, effects: &mut dyn VisualEffects) -> Option<String> {
        let drag = self.active.take()?;
        tracing::trace!(id = %drag.id, rotation = drag.rotation, "drag stop");
        effects.start_rebound(&drag.id, drag.rotation, now);
        self.rebounds.retain(|r| r.id != drag.id);
        self.rebounds.push(Rebound {
            id: drag.id.clone(),
            started: now,
        });
        Some(drag.id)
    }

    /// Completion signal from the renderer's animation.
    pub fn animation_end(&mut self, id: &str, effects: &mut dyn VisualEffects) {
        let before = self.rebounds.len();
        self.rebounds.retain(|r| r.id != id);
        if self.rebounds.len() != before {
            effects.clear(id);
        }
    }

    /// Fail-safe cleanup for rebounds whose completion signal was lost.
    pub fn tick(&mut self, now: Instant, effects: &mut dyn VisualEffects) {
        let timeout = self.rebound_timeout;
        self.rebounds.retain(|r| {
            if now.saturating_duration_since(r.started) >= timeout {
                effects.clear(&r.id);
                false
            } else {
                true
            }
        });
    }

    pub fn resize_start(&mut self, effects: &mut dyn VisualEffects) {
        self.resizing = true;
        effects.set_resizing(true);
    }

    pub fn resize_stop(&mut self, effects: &mut dyn VisualEffects) {
        self.resizing = false;
        effects.set_resizing(false);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EffectPhase {
    Tilted(Tilt),
    Rebounding { from: f32, started: Instant },
}

/// In-memory [`VisualEffects`] the GUI reads when painting widget frames.
#[derive(Debug, Default)]
pub struct EffectState {
    effects: HashMap<String, EffectPhase>,
    resizing: bool,
}

impl EffectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    pub fn is_animating(&self) -> bool {
        self.effects
            .values()
            .any(|phase| matches!(phase, EffectPhase::Rebounding { .. }))
    }

    /// Current tilt for `id`, easing rebounds towards zero.
    pub fn tilt_at(&self, id: &str, now: Instant) -> Option<Tilt> {
        match self.effects.get(id)? {
            EffectPhase::Tilted(tilt) => Some(*tilt),
            EffectPhase::Rebounding { from, started } => {
                let t = now.saturating_duration_since(*started).as_secs_f32()
                    / REBOUND_DURATION.as_secs_f32();
                let t = t.clamp(0.0, 1.0);
                let eased = 1.0 - (1.0 - t).powi(3);
                let rotation = from * (1.0 - eased);
                let direction = if rotation < 0.0 {
                    DragDirection::Left
                } else {
                    DragDirection::Right
                };
                Some(Tilt {
                    rotation,
                    shadow: shadow_for(rotation.abs(), direction),
                })
            }
        }
    }

    /// Ids whose rebound animation has run its full course.
    pub fn finished_rebounds(&self, now: Instant) -> Vec<String> {
        self.effects
            .iter()
            .filter_map(|(id, phase)| match phase {
                EffectPhase::Rebounding { started, .. }
                    if now.saturating_duration_since(*started) >= REBOUND_DURATION =>
                {
                    Some(id.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl VisualEffects for EffectState {
    fn apply_tilt(&mut self, id: &str, tilt: Tilt) {
        self.effects.insert(id.to_string(), EffectPhase::Tilted(tilt));
    }

    fn start_rebound(&mut self, id: &str, from_rotation: f32, now: Instant) {
        self.effects.insert(
            id.to_string(),
            EffectPhase::Rebounding {
                from: from_rotation,
                started: now,
            },
        );
    }

    fn clear(&mut self, id: &str) {
        self.effects.remove(id);
    }

    fn set_resizing(&mut self, resizing: bool) {
        self.resizing = resizing;
    }
}
