use std::f64::consts;

/// Maximum latitude representable by the web mercator projection.
///
/// Derived from: `arctan(sinh(pi))`
pub const MERCATOR_MAX_LATITUDE: f64 = 85.05112877980659;

/// Default tile edge length, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// What to do with latitudes the mercator projection can't represent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LatitudePolicy {
    /// Clamp to `+/-`[`MERCATOR_MAX_LATITUDE`] before projecting.
    #[default]
    Clamp,
    /// Project as-is. +/-90 degrees produces non-finite pixels.
    Propagate,
}

/// A geographic point, in degrees. Ranges aren't enforced, the projection is defined for
/// all reals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// A point in world pixel space at a specific (possibly fractional) zoom.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct WorldPixel {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl WorldPixel {
    /// Adds a pixel delta, wrapping both axes into `[0, extent)`. Works for deltas larger
    /// than the plane itself.
    pub fn translate(self, dx: f64, dy: f64, tile_size: u32) -> Self {
        let extent = world_extent(self.zoom, tile_size);

        Self {
            x: (self.x + dx).rem_euclid(extent),
            y: (self.y + dy).rem_euclid(extent),
            zoom: self.zoom,
        }
    }
}

/// A point on the canvas, in pixels from the top left.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for PixelPoint {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for PixelPoint {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Size<T> {
    pub height: T,
    pub width: T,
}

impl Size<u32> {
    pub const ZERO: Self = Self {
        height: 0,
        width: 0,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { height, width }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The pixel mapped to the focus. Rounded down, so odd and even extents both land on a
    /// whole pixel.
    pub fn center(&self) -> PixelPoint {
        PixelPoint {
            x: (self.width.saturating_sub(1) / 2) as f64,
            y: (self.height.saturating_sub(1) / 2) as f64,
        }
    }
}

/// Canvas extent, in pixels.
pub type Viewport = Size<u32>;

/// Full extent of the world pixel plane (per axis) at `zoom`.
#[inline]
pub fn world_extent(zoom: f64, tile_size: u32) -> f64 {
    tile_size as f64 * zoom.exp2()
}

/// Bidirectional web mercator projection between [`GeoPoint`] and [`WorldPixel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    tile_size: u32,
    latitude_policy: LatitudePolicy,
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, LatitudePolicy::default())
    }
}

impl Projection {
    pub const fn new(tile_size: u32, latitude_policy: LatitudePolicy) -> Self {
        Self {
            tile_size,
            latitude_policy,
        }
    }

    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub const fn latitude_policy(&self) -> LatitudePolicy {
        self.latitude_policy
    }

    /// Pixels per radian at `zoom`.
    #[inline]
    fn scale(&self, zoom: f64) -> f64 {
        (self.tile_size as f64 / consts::TAU) * zoom.exp2()
    }

    pub fn to_world_pixel(&self, point: GeoPoint, zoom: f64) -> WorldPixel {
        let latitude = match self.latitude_policy {
            LatitudePolicy::Clamp => point
                .latitude
                .clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE),
            LatitudePolicy::Propagate => point.latitude,
        };

        let lon_rad = point.longitude.to_radians();
        let lat_rad = latitude.to_radians();
        let scale = self.scale(zoom);

        WorldPixel {
            x: scale * (lon_rad + consts::PI),
            y: scale * (consts::PI - (consts::FRAC_PI_4 + lat_rad / 2.0).tan().ln()),
            zoom,
        }
    }

    pub fn to_geo_point(&self, pixel: WorldPixel) -> GeoPoint {
        let scale = self.scale(pixel.zoom);

        let lon_rad = pixel.x / scale - consts::PI;
        let lat_rad = 2.0 * (consts::PI - pixel.y / scale).exp().atan() - consts::FRAC_PI_2;

        GeoPoint {
            longitude: lon_rad.to_degrees(),
            latitude: lat_rad.to_degrees(),
        }
    }

    /// Shorthand for the plane extent with this projection's tile size.
    #[inline]
    pub fn world_extent(&self, zoom: f64) -> f64 {
        world_extent(zoom, self.tile_size)
    }

    /// Projects `point`, translates it by a pixel delta and projects it back. This is how
    /// a drag moves the focus.
    pub fn translate(&self, point: GeoPoint, zoom: f64, dx: f64, dy: f64) -> GeoPoint {
        let pixel = self
            .to_world_pixel(point, zoom)
            .translate(dx, dy, self.tile_size);

        self.to_geo_point(pixel)
    }
}

/// Wraps a delta along one axis to the nearest world copy, i.e into `[-extent/2, extent/2)`.
#[inline]
pub(crate) fn wrap_delta(delta: f64, extent: f64) -> f64 {
    (delta + extent / 2.0).rem_euclid(extent) - extent / 2.0
}
