//! Which tiles cover a viewport, and where each one lands on the canvas.
//!
//! Tiles are addressed on the integer zoom grid nearest the continuous zoom. Fractional
//! zoom is handled by scaling tiles, never by requesting fractional-zoom tiles.

use std::fmt;

use crate::coords::{PixelPoint, Size, WorldPixel, wrap_delta};

/// A normalized tile address, usable as a cache key.
///
/// Can only be built through [`TileKey::normalized`], so two requests that only differ
/// before wrapping always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    x: u32,
    y: u32,
    zoom: u8,
}

impl TileKey {
    /// Largest zoom where `2^zoom` tiles still fit in a [`u32`] per axis.
    pub const MAX_ZOOM: u8 = 31;

    /// Wraps `x` and `y` into `[0, 2^zoom)`. `zoom` is capped at [`Self::MAX_ZOOM`].
    pub fn normalized(x: i64, y: i64, zoom: u8) -> Self {
        let zoom = zoom.min(Self::MAX_ZOOM);
        let n = tiles_across(zoom);

        Self {
            x: x.rem_euclid(n) as u32,
            y: y.rem_euclid(n) as u32,
            zoom,
        }
    }

    pub const fn x(&self) -> u32 {
        self.x
    }

    pub const fn y(&self) -> u32 {
        self.y
    }

    pub const fn zoom(&self) -> u8 {
        self.zoom
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at an integer zoom.
#[inline]
pub const fn tiles_across(zoom: u8) -> i64 {
    1_i64 << zoom
}

/// The integer zoom tiles get fetched at for a continuous zoom.
#[inline]
pub fn tile_zoom(zoom: f64) -> u8 {
    zoom.round().clamp(0.0, TileKey::MAX_ZOOM as f64) as u8
}

/// An axis-aligned rectangle on the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Floors the origin and ceils the extent, so adjacent tiles never leave a hairline
    /// seam between them.
    pub fn snap_outward(self) -> Self {
        Self {
            x: self.x.floor(),
            y: self.y.floor(),
            width: self.width.ceil(),
            height: self.height.ceil(),
        }
    }
}

/// A tile as dispatched by one render pass: unnormalized grid indices, plus the focus
/// (in fractional tile units) it was computed against.
///
/// The indices stay unnormalized so that copies of the same tile across the antimeridian
/// keep distinct positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlacement {
    pub column: i64,
    pub row: i64,
    pub zoom: u8,
    /// Focus at dispatch time, measured in tiles of `zoom`.
    pub(crate) anchor_x: f64,
    pub(crate) anchor_y: f64,
}

impl TilePlacement {
    pub fn key(&self) -> TileKey {
        TileKey::normalized(self.column, self.row, self.zoom)
    }

    /// Destination rectangle of this tile given the *current* focus, zoom and viewport.
    ///
    /// Called at draw time rather than dispatch time, since the focus and zoom may have
    /// moved since the tile was requested. If the focus wrapped around the world in the
    /// meantime, the tile follows it by the same number of whole worlds.
    pub fn dest_rect(&self, focus: WorldPixel, viewport: Size<u32>, tile_size: u32) -> PixelRect {
        let tile_px = tile_size as f64 * (focus.zoom - self.zoom as f64).exp2();
        let n = tiles_across(self.zoom) as f64;

        let focus_x = focus.x / tile_px;
        let focus_y = focus.y / tile_px;

        let jump_x = (focus_x - self.anchor_x) - wrap_delta(focus_x - self.anchor_x, n);
        let jump_y = (focus_y - self.anchor_y) - wrap_delta(focus_y - self.anchor_y, n);

        let column = self.column as f64 + jump_x.round();
        let row = self.row as f64 + jump_y.round();

        let center = viewport.center();

        PixelRect {
            x: center.x + column * tile_px - focus.x,
            y: center.y + row * tile_px - focus.y,
            width: tile_px,
            height: tile_px,
        }
        .snap_outward()
    }
}

/// A rectangular span of tile indices, inclusive on both ends. Indices are unnormalized;
/// [`TilePlacement::key`] does the wrapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRegion {
    pub(crate) x_min: i64,
    pub(crate) x_max: i64,
    pub(crate) y_min: i64,
    pub(crate) y_max: i64,
    pub(crate) zoom: u8,
    pub(crate) anchor_x: f64,
    pub(crate) anchor_y: f64,
}

impl TileRegion {
    fn empty(zoom: u8) -> Self {
        Self {
            x_min: 0,
            x_max: -1,
            y_min: 0,
            y_max: -1,
            zoom,
            anchor_x: 0.0,
            anchor_y: 0.0,
        }
    }

    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    pub const fn is_empty(&self) -> bool {
        self.x_max < self.x_min || self.y_max < self.y_min
    }

    pub const fn num_tiles(&self) -> usize {
        self.y_tiles() * self.x_tiles()
    }

    pub const fn y_tiles(&self) -> usize {
        if self.y_max < self.y_min {
            0
        } else {
            (self.y_max - self.y_min) as usize + 1
        }
    }

    pub const fn x_tiles(&self) -> usize {
        if self.x_max < self.x_min {
            0
        } else {
            (self.x_max - self.x_min) as usize + 1
        }
    }
}

impl IntoIterator for TileRegion {
    type Item = TilePlacement;
    type IntoIter = TileIter;

    fn into_iter(self) -> Self::IntoIter {
        TileIter {
            y: self.y_min,
            current_x: self.x_min,
            region: self,
        }
    }
}

/// Row-major iterator over a [`TileRegion`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileIter {
    region: TileRegion,
    y: i64,
    current_x: i64,
}

impl Iterator for TileIter {
    type Item = TilePlacement;

    fn next(&mut self) -> Option<Self::Item> {
        if self.region.is_empty() {
            return None;
        }

        loop {
            // check if we're still within the column bounds
            if self.y > self.region.y_max {
                return None;
            }

            // if we're still within a row,
            if self.current_x <= self.region.x_max {
                let column = self.current_x;
                self.current_x += 1;
                return Some(TilePlacement {
                    column,
                    row: self.y,
                    zoom: self.region.zoom,
                    anchor_x: self.region.anchor_x,
                    anchor_y: self.region.anchor_y,
                });
            }

            // if not, move to the next row and repeat
            self.y += 1;
            self.current_x = self.region.x_min;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let x_tiles = self.region.x_tiles();

        let total_count = self.region.num_tiles();

        let full_rows_yielded = (self.y - self.region.y_min).max(0) as usize * x_tiles;
        let yielded_in_curr_row = (self.current_x - self.region.x_min).max(0) as usize;

        let remaining = total_count
            .saturating_sub(full_rows_yielded)
            .saturating_sub(yielded_in_curr_row);

        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileIter {}

/// Computes the tile set covering a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileIndexer {
    tile_size: u32,
}

impl TileIndexer {
    pub const fn new(tile_size: u32) -> Self {
        Self { tile_size }
    }

    /// Tiles covering `viewport` when `focus` (at its continuous zoom) sits at the viewport
    /// center.
    ///
    /// The range is rounded outward on every side: `ceil(extent / tile) + 1` tiles per axis.
    /// That can fetch one column/row more than strictly visible, but never leaves a gap at
    /// the viewport edge.
    pub fn tiles_for(&self, viewport: Size<u32>, focus: WorldPixel) -> TileRegion {
        let zoom = tile_zoom(focus.zoom);

        if viewport.is_empty() || self.tile_size == 0 {
            return TileRegion::empty(zoom);
        }

        // an unclamped pole projects to an infinite row
        if !focus.x.is_finite() || !focus.y.is_finite() {
            return TileRegion::empty(zoom);
        }

        let tile_px = self.tile_size as f64 * (focus.zoom - zoom as f64).exp2();
        let center = viewport.center();

        let left = focus.x - center.x;
        let top = focus.y - center.y;

        let x_min = (left / tile_px).floor() as i64;
        let y_min = (top / tile_px).floor() as i64;

        let x_span = (viewport.width as f64 / tile_px).ceil() as i64;
        let y_span = (viewport.height as f64 / tile_px).ceil() as i64;

        // the iterator steps one past each max, so that step has to fit too
        let end = |min: i64, span: i64| span.checked_add(1).and_then(|n| min.checked_add(n));
        let (Some(x_end), Some(y_end)) = (end(x_min, x_span), end(y_min, y_span)) else {
            return TileRegion::empty(zoom);
        };

        TileRegion {
            x_min,
            x_max: x_end - 1,
            y_min,
            y_max: y_end - 1,
            zoom,
            anchor_x: focus.x / tile_px,
            anchor_y: focus.y / tile_px,
        }
    }
}
