//! Where tile images come from.
//!
//! The only contract is `fetch(key)`: the returned future eventually resolves to an image
//! or an error, or never resolves at all. The [`TileCache`] wraps every fetch in a timeout,
//! so implementations don't need their own.
//!
//! [`TileCache`]: crate::TileCache

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::tiles::TileKey;

pub trait TileSource: Send + Sync + 'static {
    /// Decoded tile image, handed to the canvas as-is.
    type Image: Send + Sync + 'static;

    fn fetch(&self, key: TileKey) -> BoxFuture<'static, crate::Result<Self::Image>>;
}

impl<S: TileSource + ?Sized> TileSource for Arc<S> {
    type Image = S::Image;

    #[inline]
    fn fetch(&self, key: TileKey) -> BoxFuture<'static, crate::Result<Self::Image>> {
        S::fetch(self, key)
    }
}

#[cfg(feature = "http")]
pub use http::HttpTileSource;

#[cfg(feature = "http")]
mod http {
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use mime_guess::mime;
    use tiny_skia::Pixmap;

    use super::TileSource;
    use crate::tiles::TileKey;
    use crate::util::UrlTemplate;
    use crate::{Config, Error};

    /// Fetches PNG tiles over HTTP from a templated tile server URL.
    #[derive(Debug, Clone)]
    pub struct HttpTileSource {
        client: reqwest::Client,
        template: UrlTemplate,
    }

    impl HttpTileSource {
        pub fn new(client: reqwest::Client, template: UrlTemplate) -> Self {
            Self { client, template }
        }

        pub fn from_config(client: reqwest::Client, config: &Config) -> crate::Result<Self> {
            let template = UrlTemplate::parse(&config.tile_url_template)?;
            Ok(Self::new(client, template))
        }

        pub fn template(&self) -> &UrlTemplate {
            &self.template
        }
    }

    impl TileSource for HttpTileSource {
        type Image = Pixmap;

        fn fetch(&self, key: TileKey) -> BoxFuture<'static, crate::Result<Pixmap>> {
            let url = self.template.complete_url(key);
            trace!(message = "fetching tile", %key, url);
            load_tile(self.client.clone(), url).boxed()
        }
    }

    /// Gets the tile, checks that it's a PNG, and parses it into a pixmap.
    async fn load_tile(client: reqwest::Client, url: String) -> crate::Result<Pixmap> {
        let resp = client.get(url).send().await?.error_for_status()?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .ok_or(Error::MissingContentType)?
            .parse::<mime::Mime>()?;

        // compare type/subtype only, some servers tack on parameters
        if content_type.type_() != mime::IMAGE || content_type.subtype() != mime::PNG {
            return Err(Error::UnsupportedContentType(content_type.to_string()));
        }

        let png_bytes = resp.bytes().await?;
        let tile = Pixmap::decode_png(&png_bytes)?;
        Ok(tile)
    }
}
