//! Which page numbers are on screen for a given cursor and display width.
//!
//! Pages are 1-based. In spread mode the even page sits on the left and its
//! odd successor on the right; the cover (page 1) and the back cover (the last
//! page) are always shown alone.

use serde::{Deserialize, Serialize};

/// Display width, in pixels, from which two pages are shown side by side.
pub const DEFAULT_SPREAD_MIN_WIDTH: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Single,
    Spread,
}

impl ViewMode {
    pub fn for_width(width_px: u32, spread_min_width: u32) -> Self {
        if width_px >= spread_min_width {
            ViewMode::Spread
        } else {
            ViewMode::Single
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spread {
    pub left: usize,
    pub right: Option<usize>,
}

impl Spread {
    pub fn single(page: usize) -> Self {
        Self {
            left: page,
            right: None,
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.right.is_none()
    }

    pub fn contains(&self, page: usize) -> bool {
        self.left == page || self.right == Some(page)
    }

    pub fn pages(&self) -> impl Iterator<Item = usize> {
        std::iter::once(self.left).chain(self.right)
    }
}

pub fn resolve_spread(current: usize, mode: ViewMode, total: usize) -> Spread {
    debug_assert!(
        (1..=total).contains(&current),
        "page {current} outside 1..={total}"
    );
    match mode {
        ViewMode::Single => Spread::single(current),
        ViewMode::Spread if current == 1 || current == total => Spread::single(current),
        ViewMode::Spread => {
            let left = if current % 2 == 0 { current } else { current - 1 };
            let right = (left < total).then_some(left + 1);
            Spread { left, right }
        }
    }
}

/// Page to flip to when moving forward, or `None` at the back cover.
pub fn next_target(current: usize, mode: ViewMode, total: usize) -> Option<usize> {
    if current >= total {
        return None;
    }
    let next = match mode {
        ViewMode::Single => current + 1,
        ViewMode::Spread if current + 1 >= total => total,
        ViewMode::Spread => current + 2,
    };
    Some(next.min(total))
}

/// Page to flip to when moving backward, or `None` at the cover.
pub fn prev_target(current: usize, mode: ViewMode, _total: usize) -> Option<usize> {
    if current <= 1 {
        return None;
    }
    let prev = match mode {
        ViewMode::Single => current - 1,
        ViewMode::Spread if current <= 2 => 1,
        ViewMode::Spread => current - 2,
    };
    Some(prev.max(1))
}
