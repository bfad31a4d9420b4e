use serde::{Deserialize, Serialize};

/// Horizontal inset subtracted from the window width before resolving.
pub const VIEWPORT_INSET: u32 = 40;

/// Named viewport-width tier. Each tier owns an independent grid layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Lg,
    Md,
    Sm,
    Xs,
    Xxs,
}

impl Default for Breakpoint {
    fn default() -> Self {
        Breakpoint::Lg
    }
}

impl Breakpoint {
    /// All breakpoints ordered from the largest threshold to the smallest.
    pub const ALL: [Breakpoint; 5] = [
        Breakpoint::Lg,
        Breakpoint::Md,
        Breakpoint::Sm,
        Breakpoint::Xs,
        Breakpoint::Xxs,
    ];

    /// Minimum viewport width in pixels.
    pub fn min_width(self) -> u32 {
        match self {
            Breakpoint::Lg => 1200,
            Breakpoint::Md => 996,
            Breakpoint::Sm => 768,
            Breakpoint::Xs => 480,
            Breakpoint::Xxs => 0,
        }
    }

    pub fn cols(self) -> u32 {
        match self {
            Breakpoint::Lg => 12,
            Breakpoint::Md => 10,
            Breakpoint::Sm => 6,
            Breakpoint::Xs => 4,
            Breakpoint::Xxs => 2,
        }
    }

    pub fn is_mobile(self) -> bool {
        matches!(self, Breakpoint::Xs | Breakpoint::Xxs)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Lg => "lg",
            Breakpoint::Md => "md",
            Breakpoint::Sm => "sm",
            Breakpoint::Xs => "xs",
            Breakpoint::Xxs => "xxs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Breakpoint::ALL.into_iter().find(|bp| bp.as_str() == name)
    }
}

impl std::fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width available to the grid once the fixed inset is removed.
pub fn viewport_inner_width(window_width: u32, inset: u32) -> u32 {
    window_width.saturating_sub(inset)
}

/// Resolve the breakpoint whose threshold is the largest value `<= width`.
pub fn resolve(width: u32) -> Breakpoint {
    Breakpoint::ALL
        .into_iter()
        .find(|bp| width >= bp.min_width())
        .unwrap_or(Breakpoint::Xxs)
}

/// Edge-triggered breakpoint tracking across resize events.
#[derive(Debug, Clone, Default)]
pub struct BreakpointTracker {
    current: Breakpoint,
}

impl BreakpointTracker {
    pub fn new(width: u32) -> Self {
        Self {
            current: resolve(width),
        }
    }

    pub fn current(&self) -> Breakpoint {
        self.current
    }

    /// Returns the new breakpoint only when it differs from the previous one.
    pub fn update(&mut self, width: u32) -> Option<Breakpoint> {
        let next = resolve(width);
        if next == self.current {
            return None;
        }
        tracing::debug!(from = %self.current, to = %next, width, "breakpoint changed");
        self.current = next;
        Some(next)
    }
}
