//! Page-turn sequencing.
//!
//! A navigation request does not move the cursor right away: the controller
//! enters `Flipping` for a fixed duration so the front end can animate, and
//! commits the target page once the deadline has passed. Requests that arrive
//! while a flip is pending are dropped.

use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_FLIP_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Forward,
    Backward,
}

impl FlipDirection {
    pub fn between(from: usize, to: usize) -> Self {
        if to < from {
            FlipDirection::Backward
        } else {
            FlipDirection::Forward
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipState {
    Idle,
    Flipping {
        target: usize,
        direction: FlipDirection,
        started_at: Instant,
    },
}

#[derive(Debug, Clone)]
pub struct FlipController {
    total_pages: usize,
    duration: Duration,
    state: FlipState,
}

impl FlipController {
    pub fn new(total_pages: usize, duration: Duration) -> Self {
        Self {
            total_pages,
            duration,
            state: FlipState::Idle,
        }
    }

    pub fn state(&self) -> FlipState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, FlipState::Idle)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Starts a flip towards `target`. Returns `false` (and changes nothing)
    /// when the target is out of range or another flip is still pending.
    pub fn go_to(&mut self, target: usize, direction: FlipDirection, now: Instant) -> bool {
        if target == 0 || target > self.total_pages || !self.is_idle() {
            return false;
        }
        debug!(target, ?direction, "flip started");
        self.state = FlipState::Flipping {
            target,
            direction,
            started_at: now,
        };
        true
    }

    pub fn flip_direction(&self) -> Option<FlipDirection> {
        match self.state {
            FlipState::Idle => None,
            FlipState::Flipping { direction, .. } => Some(direction),
        }
    }

    pub fn pending_target(&self) -> Option<usize> {
        match self.state {
            FlipState::Idle => None,
            FlipState::Flipping { target, .. } => Some(target),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            FlipState::Idle => None,
            FlipState::Flipping { started_at, .. } => Some(started_at + self.duration),
        }
    }

    /// Animation progress of the pending flip in `[0, 1]`; `0` when idle.
    pub fn progress(&self, now: Instant) -> f32 {
        match self.state {
            FlipState::Idle => 0.0,
            FlipState::Flipping { started_at, .. } => {
                if self.duration.is_zero() {
                    return 1.0;
                }
                let elapsed = now.saturating_duration_since(started_at);
                (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    /// Commits the pending flip once its duration has elapsed and returns the
    /// committed page.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        let FlipState::Flipping {
            target, started_at, ..
        } = self.state
        else {
            return None;
        };
        if now.saturating_duration_since(started_at) < self.duration {
            return None;
        }
        self.state = FlipState::Idle;
        debug!(target, "flip committed");
        Some(target)
    }

    /// Drops a pending flip without committing it.
    pub fn cancel_pending(&mut self) {
        if let Some(target) = self.pending_target() {
            debug!(target, "pending flip discarded");
        }
        self.state = FlipState::Idle;
    }
}
