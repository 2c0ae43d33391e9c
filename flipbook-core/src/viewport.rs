//! Zoom level and drag-to-pan offset for the page area.

use std::ops::Sub;

use crate::config::TurnPolicy;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;
const DEFAULT_ZOOM: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Pointer sample from either a mouse or a touch surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    Mouse(Point),
    /// Active touch contacts, in order of arrival.
    Touch(Vec<Point>),
}

impl PointerInput {
    /// Position used for panning. Gestures with more than one finger are not
    /// handled and yield `None`.
    pub fn position(&self) -> Option<Point> {
        match self {
            PointerInput::Mouse(point) => Some(*point),
            PointerInput::Touch(points) if points.len() == 1 => points.first().copied(),
            PointerInput::Touch(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    zoom: f32,
    pan: Point,
    drag_anchor: Option<Point>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            pan: Point::ORIGIN,
            drag_anchor: None,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn is_zoomed_in(&self) -> bool {
        self.zoom > DEFAULT_ZOOM
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom - ZOOM_STEP)
    }

    pub fn reset_zoom(&mut self) -> bool {
        let changed = self.zoom != DEFAULT_ZOOM || self.pan != Point::ORIGIN;
        self.zoom = DEFAULT_ZOOM;
        self.pan = Point::ORIGIN;
        self.drag_anchor = None;
        changed
    }

    fn set_zoom(&mut self, zoom: f32) -> bool {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if (zoom - self.zoom).abs() < f32::EPSILON {
            return false;
        }
        self.zoom = zoom;
        if !self.is_zoomed_in() {
            self.pan = Point::ORIGIN;
            self.drag_anchor = None;
        }
        true
    }

    pub fn begin_drag(&mut self, pointer: &PointerInput) -> bool {
        if !self.is_zoomed_in() {
            return false;
        }
        let Some(position) = pointer.position() else {
            return false;
        };
        self.drag_anchor = Some(position - self.pan);
        true
    }

    pub fn update_drag(&mut self, pointer: &PointerInput) -> bool {
        if !self.is_zoomed_in() {
            return false;
        }
        let (Some(anchor), Some(position)) = (self.drag_anchor, pointer.position()) else {
            return false;
        };
        let pan = position - anchor;
        if pan == self.pan {
            return false;
        }
        self.pan = pan;
        true
    }

    pub fn end_drag(&mut self) -> bool {
        self.drag_anchor.take().is_some()
    }

    /// Applies the page-turn policy after the committed page changed.
    pub fn on_page_committed(&mut self, policy: TurnPolicy) {
        self.pan = Point::ORIGIN;
        self.drag_anchor = None;
        if policy == TurnPolicy::FitPage {
            self.zoom = DEFAULT_ZOOM;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse(x: f32, y: f32) -> PointerInput {
        PointerInput::Mouse(Point::new(x, y))
    }

    #[test]
    fn zoom_in_saturates_after_eight_steps() {
        let mut viewport = Viewport::new();
        for _ in 0..8 {
            assert!(viewport.zoom_in());
        }
        assert_eq!(viewport.zoom(), MAX_ZOOM);
        assert!(!viewport.zoom_in());
        assert_eq!(viewport.zoom(), MAX_ZOOM);
    }

    #[test]
    fn zoom_out_saturates_at_minimum() {
        let mut viewport = Viewport::new();
        for _ in 0..10 {
            viewport.zoom_out();
        }
        assert_eq!(viewport.zoom(), MIN_ZOOM);
    }

    #[test]
    fn drag_is_ignored_at_default_zoom() {
        let mut viewport = Viewport::new();
        assert!(!viewport.begin_drag(&mouse(10.0, 10.0)));
        assert!(!viewport.update_drag(&mouse(60.0, 40.0)));
        assert_eq!(viewport.pan(), Point::ORIGIN);
        assert!(!viewport.is_dragging());
    }

    #[test]
    fn drag_moves_pan_relative_to_anchor() {
        let mut viewport = Viewport::new();
        viewport.zoom_in();
        assert!(viewport.begin_drag(&mouse(100.0, 100.0)));
        assert!(viewport.update_drag(&mouse(130.0, 90.0)));
        assert_eq!(viewport.pan(), Point::new(30.0, -10.0));
        assert!(viewport.end_drag());
        assert_eq!(viewport.pan(), Point::new(30.0, -10.0));

        // A second drag continues from the current offset.
        assert!(viewport.begin_drag(&mouse(0.0, 0.0)));
        assert!(viewport.update_drag(&mouse(5.0, 5.0)));
        assert_eq!(viewport.pan(), Point::new(35.0, -5.0));
    }

    #[test]
    fn zooming_back_to_one_resets_pan_and_drag() {
        let mut viewport = Viewport::new();
        viewport.zoom_in();
        viewport.begin_drag(&mouse(0.0, 0.0));
        viewport.update_drag(&mouse(20.0, 20.0));
        viewport.zoom_out();
        assert_eq!(viewport.zoom(), 1.0);
        assert_eq!(viewport.pan(), Point::ORIGIN);
        assert!(!viewport.is_dragging());
    }

    #[test]
    fn multi_touch_is_ignored() {
        let mut viewport = Viewport::new();
        viewport.zoom_in();
        let pinch = PointerInput::Touch(vec![Point::new(0.0, 0.0), Point::new(50.0, 50.0)]);
        assert!(!viewport.begin_drag(&pinch));

        let finger = |x, y| PointerInput::Touch(vec![Point::new(x, y)]);
        assert!(viewport.begin_drag(&finger(10.0, 10.0)));
        assert!(!viewport.update_drag(&pinch));
        assert!(viewport.update_drag(&finger(25.0, 10.0)));
        assert_eq!(viewport.pan(), Point::new(15.0, 0.0));
    }

    #[test]
    fn page_commit_resets_pan_and_respects_policy() {
        let mut viewport = Viewport::new();
        viewport.zoom_in();
        viewport.begin_drag(&mouse(0.0, 0.0));
        viewport.update_drag(&mouse(40.0, 0.0));

        viewport.on_page_committed(TurnPolicy::KeepZoom);
        assert_eq!(viewport.pan(), Point::ORIGIN);
        assert_eq!(viewport.zoom(), 1.25);
        assert!(!viewport.is_dragging());

        viewport.on_page_committed(TurnPolicy::FitPage);
        assert_eq!(viewport.zoom(), 1.0);
    }

    #[test]
    fn reset_zoom_restores_defaults() {
        let mut viewport = Viewport::new();
        viewport.zoom_in();
        viewport.begin_drag(&mouse(0.0, 0.0));
        viewport.update_drag(&mouse(3.0, 4.0));
        assert!(viewport.reset_zoom());
        assert_eq!(viewport.zoom(), 1.0);
        assert_eq!(viewport.pan(), Point::ORIGIN);
        assert!(!viewport.reset_zoom());
    }
}
