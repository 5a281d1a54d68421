//! Input events, already decoded from whatever the host windowing layer delivers.

use crate::coords::PixelPoint;

/// Zoom levels per wheel delta unit.
pub const WHEEL_ZOOM_RATE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// The pointer dragged by `(dx, dy)` pixels. The map moves with it.
    Pan { dx: f64, dy: f64 },
    /// Zoom by `delta` levels, keeping the point under `anchor` fixed.
    Zoom { delta: f64, anchor: PixelPoint },
    Resize { width: u32, height: u32 },
    /// A click at canvas pixel `(x, y)`. `modifier` is whether the shape-drawing modifier
    /// key was held.
    Click { x: f64, y: f64, modifier: bool },
    Redraw,
}

impl InputEvent {
    /// A mouse wheel step. Scrolling down (positive `delta_y`) zooms out.
    pub fn wheel(delta_y: f64, anchor: PixelPoint) -> Self {
        Self::Zoom {
            delta: -WHEEL_ZOOM_RATE * delta_y,
            anchor,
        }
    }

    /// A two finger pinch, from the previous and current distance between the touches.
    ///
    /// Spreading the fingers to twice the distance zooms in by one level. Returns `None`
    /// if either distance can't produce a finite ratio.
    pub fn pinch(previous_distance: f64, distance: f64, midpoint: PixelPoint) -> Option<Self> {
        if !(previous_distance > 0.0 && distance > 0.0) {
            return None;
        }

        let delta = (distance / previous_distance).log2();

        delta.is_finite().then_some(Self::Zoom {
            delta,
            anchor: midpoint,
        })
    }
}

/// Distance between two touch points.
pub fn touch_distance(a: PixelPoint, b: PixelPoint) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
