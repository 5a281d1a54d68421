//! Vector shapes drawn over the tiles.
//!
//! Shapes are stored in geographic coordinates and re-projected on every redraw, so they
//! follow pans and zooms without any bookkeeping of their own.

use tiny_skia::Color;

use crate::coords::{GeoPoint, PixelPoint, Projection, Size, WorldPixel};

mod polygon;

pub use polygon::Polygon;

/// Every kind of shape the overlay can draw.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Shape {
    Polygon(Polygon),
}

impl Shape {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Polygon(polygon) => polygon.is_empty(),
        }
    }
}

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Self::Polygon(polygon)
    }
}

/// Index of a shape within its [`ShapeLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(usize);

impl ShapeId {
    pub const fn get(&self) -> usize {
        self.0
    }
}

/// Default overlay fill, a translucent blue.
pub fn default_fill() -> Color {
    Color::from_rgba8(0, 120, 255, 96)
}

/// The shapes drawn on the overlay, plus the one currently being built (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeLayer {
    shapes: Vec<Shape>,
    active: Option<ShapeId>,
    fill: Color,
}

impl Default for ShapeLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeLayer {
    pub fn new() -> Self {
        Self {
            shapes: Vec::new(),
            active: None,
            fill: default_fill(),
        }
    }

    pub fn with_fill(mut self, fill: Color) -> Self {
        self.fill = fill;
        self
    }

    pub fn fill(&self) -> Color {
        self.fill
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.0)
    }

    pub fn active_shape(&self) -> Option<ShapeId> {
        self.active
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Adds a shape and makes it the active one.
    pub fn add_shape(&mut self, shape: impl Into<Shape>) -> ShapeId {
        let id = ShapeId(self.shapes.len());
        self.shapes.push(shape.into());
        self.active = Some(id);
        id
    }

    /// Appends a vertex to the active shape, starting a new polygon if nothing is active.
    pub fn append_vertex_to_active_shape(&mut self, vertex: GeoPoint) -> ShapeId {
        let id = match self.active {
            Some(id) => id,
            None => self.add_shape(Polygon::new()),
        };

        match &mut self.shapes[id.0] {
            Shape::Polygon(polygon) => polygon.push(vertex),
        }

        id
    }

    /// Stops building the active shape. It stays in the layer. Returns the finished
    /// shape's id, if one was active.
    pub fn finish_active_shape(&mut self) -> Option<ShapeId> {
        self.active.take()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
        self.active = None;
    }
}

/// Maps shapes to canvas pixels for a given view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeProjector {
    projection: Projection,
}

impl ShapeProjector {
    pub const fn new(projection: Projection) -> Self {
        Self { projection }
    }

    /// Projects every vertex of `shape` onto a viewport centered on `focus` at `zoom`.
    pub fn project(
        &self,
        shape: &Shape,
        focus: GeoPoint,
        zoom: f64,
        viewport: Size<u32>,
    ) -> Vec<PixelPoint> {
        let focus_px = self.projection.to_world_pixel(focus, zoom);
        self.project_pixel(shape, focus_px, viewport)
    }

    /// Same as [`project`](Self::project), with the focus already in world pixels.
    pub fn project_pixel(
        &self,
        shape: &Shape,
        focus_px: WorldPixel,
        viewport: Size<u32>,
    ) -> Vec<PixelPoint> {
        let center = viewport.center();
        let offset_x = center.x - focus_px.x;
        let offset_y = center.y - focus_px.y;

        match shape {
            Shape::Polygon(polygon) => polygon
                .vertices()
                .iter()
                .map(|vertex| {
                    let px = self.projection.to_world_pixel(*vertex, focus_px.zoom);
                    PixelPoint::new(px.x + offset_x, px.y + offset_y)
                })
                .collect(),
        }
    }
}
