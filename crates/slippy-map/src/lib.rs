//! An interactive slippy map core: web mercator projection, tile indexing, a shared tile
//! cache, and a render scheduler that keeps the map responsive while tiles load.

#[macro_use]
extern crate tracing;

mod cache;
mod canvas;
mod config;
mod coords;
mod error;
pub mod feature;
mod input;
mod layer;
mod scheduler;
mod source;
mod tiles;
mod util;

#[cfg(test)]
mod test_utils;

pub use cache::{CacheStats, TileCache, TileFuture, TileState};
pub use canvas::{Canvas, PixmapCanvas};
pub use config::Config;
pub use coords::{
    DEFAULT_TILE_SIZE, GeoPoint, LatitudePolicy, MERCATOR_MAX_LATITUDE, PixelPoint, Projection,
    Size, Viewport, WorldPixel, world_extent,
};
pub use error::{Error, FetchError, InvalidSize, InvalidTemplate};
pub use feature::{Polygon, Shape, ShapeId, ShapeLayer, ShapeProjector};
pub use input::{InputEvent, WHEEL_ZOOM_RATE, touch_distance};
pub use layer::Layers;
pub use scheduler::{
    ArrivalOutcome, DEFAULT_FOCUS, DEFAULT_ZOOM, Generation, MapState, RenderPass,
    RenderScheduler, TileArrival,
};
#[cfg(feature = "http")]
pub use source::HttpTileSource;
pub use source::TileSource;
pub use tiles::{
    PixelRect, TileIndexer, TileIter, TileKey, TilePlacement, TileRegion, tile_zoom,
    tiles_across,
};
pub use tiny_skia::{Color, Pixmap};
pub use util::UrlTemplate;

pub type Result<T> = core::result::Result<T, Error>;

#[inline]
const fn n_digits(n: u32) -> usize {
    match n.checked_ilog10() {
        Some(n) => n as usize + 1,
        None => 1,
    }
}
