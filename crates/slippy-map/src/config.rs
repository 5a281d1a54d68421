use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::Error;
use crate::coords::{DEFAULT_TILE_SIZE, LatitudePolicy};
use crate::tiles::TileKey;

pub const DEFAULT_TILE_URL: &str = "https://mt3.google.com/vt/lyrs=s,h&x={x}&y={y}&z={z}";
pub const DEFAULT_MIN_ZOOM: f64 = 0.0;
pub const DEFAULT_MAX_ZOOM: f64 = 22.0;
pub const DEFAULT_RENDER_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

const TILE_URL_VAR: &str = "SLIPPY_TILE_URL";
const TILE_SIZE_VAR: &str = "SLIPPY_TILE_SIZE";
const MIN_ZOOM_VAR: &str = "SLIPPY_MIN_ZOOM";
const MAX_ZOOM_VAR: &str = "SLIPPY_MAX_ZOOM";
const DEBOUNCE_VAR: &str = "SLIPPY_RENDER_DEBOUNCE_MS";
const FETCH_TIMEOUT_VAR: &str = "SLIPPY_FETCH_TIMEOUT_MS";
const CACHE_CAPACITY_VAR: &str = "SLIPPY_CACHE_CAPACITY";

#[derive(Clone, PartialEq, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Tile edge length, in pixels.
    #[builder(default = DEFAULT_TILE_SIZE)]
    pub tile_size: u32,
    #[builder(default = DEFAULT_MIN_ZOOM)]
    pub min_zoom: f64,
    #[builder(default = DEFAULT_MAX_ZOOM)]
    pub max_zoom: f64,
    /// Tile server URL, with `{x}`, `{y}` and `{z}` placeholders.
    #[builder(default = Arc::from(DEFAULT_TILE_URL), setter(into))]
    pub tile_url_template: Arc<str>,
    /// Render passes started within this many milliseconds of the previous one are
    /// coalesced.
    #[builder(default = DEFAULT_RENDER_DEBOUNCE_MS)]
    pub render_debounce_ms: u64,
    /// A fetch still pending after this long is treated as failed, freeing its cache slot
    /// for a retry.
    #[builder(default = DEFAULT_FETCH_TIMEOUT_MS)]
    pub fetch_timeout_ms: u64,
    /// Maximum number of tiles held by the cache, pending or resolved.
    #[builder(default = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,
    /// Raise the minimum zoom so the world is never smaller than the viewport.
    #[builder(default = true)]
    pub fit_world_to_viewport: bool,
    #[builder(default)]
    pub latitude_policy: LatitudePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

// manual impl, since tile urls routinely carry api keys in the query string
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let template = match self.tile_url_template.split_once('?') {
            Some((path, _query)) => RedactedUrl::Redacted(path),
            None => RedactedUrl::Full(&self.tile_url_template),
        };

        f.debug_struct("Config")
            .field("tile_size", &self.tile_size)
            .field("min_zoom", &self.min_zoom)
            .field("max_zoom", &self.max_zoom)
            .field("tile_url_template", &template)
            .field("render_debounce_ms", &self.render_debounce_ms)
            .field("fetch_timeout_ms", &self.fetch_timeout_ms)
            .field("cache_capacity", &self.cache_capacity)
            .field("fit_world_to_viewport", &self.fit_world_to_viewport)
            .field("latitude_policy", &self.latitude_policy)
            .finish()
    }
}

enum RedactedUrl<'a> {
    Full(&'a str),
    Redacted(&'a str),
}

impl fmt::Debug for RedactedUrl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(url) => write!(f, "{url:?}"),
            Self::Redacted(path) => write!(f, "\"{path}?...\""),
        }
    }
}

impl Config {
    /// The default config, with any `SLIPPY_*` environment variables applied on top.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overrides fields from `SLIPPY_*` environment variables. Missing variables are
    /// skipped, invalid ones are logged and skipped.
    pub fn apply_env(&mut self) {
        if let Some(url) = read_env::<String>(TILE_URL_VAR) {
            self.tile_url_template = Arc::from(url);
        }
        if let Some(tile_size) = read_env(TILE_SIZE_VAR) {
            self.tile_size = tile_size;
        }
        if let Some(min_zoom) = read_env(MIN_ZOOM_VAR) {
            self.min_zoom = min_zoom;
        }
        if let Some(max_zoom) = read_env(MAX_ZOOM_VAR) {
            self.max_zoom = max_zoom;
        }
        if let Some(debounce) = read_env(DEBOUNCE_VAR) {
            self.render_debounce_ms = debounce;
        }
        if let Some(timeout) = read_env(FETCH_TIMEOUT_VAR) {
            self.fetch_timeout_ms = timeout;
        }
        if let Some(capacity) = read_env(CACHE_CAPACITY_VAR) {
            self.cache_capacity = capacity;
        }
    }

    pub fn render_debounce(&self) -> Duration {
        Duration::from_millis(self.render_debounce_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        fn invalid(field: &'static str, reason: &'static str) -> crate::Result<()> {
            Err(Error::InvalidConfig { field, reason })
        }

        if self.tile_size == 0 {
            return invalid("tile_size", "must be at least 1 pixel");
        }
        if !self.min_zoom.is_finite() || self.min_zoom < 0.0 {
            return invalid("min_zoom", "must be a finite, non-negative number");
        }
        if !self.max_zoom.is_finite() || self.max_zoom > TileKey::MAX_ZOOM as f64 {
            return invalid("max_zoom", "must be finite and at most 31");
        }
        if self.min_zoom > self.max_zoom {
            return invalid("min_zoom", "must not exceed max_zoom");
        }
        if self.cache_capacity == 0 {
            return invalid("cache_capacity", "must hold at least 1 tile");
        }

        Ok(())
    }
}

fn read_env<T>(var: &'static str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Debug,
{
    let value = match std::env::var(var) {
        Ok(value) => value,
        Err(std::env::VarError::NotPresent) => return None,
        Err(std::env::VarError::NotUnicode(invalid)) => {
            warn!(message = "invalid unicode found in config env var", var, ?invalid);
            return None;
        }
    };

    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(message = "error parsing config env var", var, %value, ?error);
            None
        }
    }
}
