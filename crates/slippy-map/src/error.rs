use std::fmt;
use std::sync::Arc;

use crate::coords::Size;
use crate::tiles::TileKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidSize(#[from] InvalidSize),
    #[error(transparent)]
    InvalidTemplate(#[from] InvalidTemplate),
    #[error("invalid config value for '{field}': {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    #[error("a render scheduler needs a tokio runtime to spawn tile fetches on: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[cfg(feature = "http")]
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("tileserver did not return a 'Content-Type' header")]
    MissingContentType,
    #[cfg(feature = "http")]
    #[error(transparent)]
    UnknownContentType(#[from] mime_guess::mime::FromStrError),
    #[error("unsupported tile content/mime type: {0}")]
    UnsupportedContentType(String),
    #[error(transparent)]
    PngDecodeError(#[from] png::DecodingError),
    #[error(transparent)]
    PngEncodeError(#[from] png::EncodingError),
}

/// Why a tile never produced an image. Cloneable, since every holder of a shared cache
/// handle observes the same outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("fetching tile {key} timed out after {after:?}")]
    TimedOut {
        key: TileKey,
        after: std::time::Duration,
    },
    #[error("fetching tile {key} failed: {error}")]
    Source { key: TileKey, error: Arc<Error> },
}

impl FetchError {
    pub fn key(&self) -> TileKey {
        match self {
            Self::TimedOut { key, .. } | Self::Source { key, .. } => *key,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSize {
    size: Size<u32>,
}

impl std::error::Error for InvalidSize {}

impl From<Size<u32>> for InvalidSize {
    fn from(size: Size<u32>) -> Self {
        Self { size }
    }
}

impl InvalidSize {
    pub fn new(size: Size<u32>) -> Self {
        Self { size }
    }

    pub fn get(&self) -> Size<u32> {
        self.size
    }
}

impl fmt::Display for InvalidSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size.height == 0 && self.size.width == 0 {
            f.write_str("canvas must be at least 1x1 pixels")
        } else if self.size.height == 0 {
            f.write_str("canvas height must be at least 1 pixel")
        } else if self.size.width == 0 {
            f.write_str("canvas width must be at least 1 pixel")
        } else {
            write!(
                f,
                "invalid canvas size: {}x{}",
                self.size.width, self.size.height
            )
        }
    }
}

/// A tile URL template that can't address a tile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTemplate {
    #[error("tile url template is missing the '{{{0}}}' placeholder")]
    MissingPlaceholder(char),
    #[error("tile url template has an unknown placeholder: '{{{0}}}'")]
    UnknownPlaceholder(String),
    #[error("tile url template has an unterminated '{{' at byte {0}")]
    Unterminated(usize),
}
