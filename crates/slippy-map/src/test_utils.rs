use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tiny_skia::Pixmap;
use tokio::sync::oneshot;

use crate::canvas::Canvas;
use crate::coords::{PixelPoint, Size};
use crate::source::TileSource;
use crate::tiles::{PixelRect, TileKey};
use crate::{Color, Error};

/// Routes log output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// Stand-in for a decoded tile, remembering which tile it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestImage(pub TileKey);

/// A tile source whose fetches only complete when the test says so.
#[derive(Debug, Clone, Default)]
pub struct ManualSource {
    inner: Arc<Mutex<ManualInner>>,
}

#[derive(Debug, Default)]
struct ManualInner {
    calls: HashMap<TileKey, usize>,
    pending: HashMap<TileKey, Vec<oneshot::Sender<crate::Result<TestImage>>>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self, key: TileKey) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.get(&key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.values().sum()
    }

    pub fn pending_keys(&self) -> Vec<TileKey> {
        let inner = self.inner.lock().unwrap();
        let mut keys = inner
            .pending
            .iter()
            .filter(|(_, senders)| !senders.is_empty())
            .map(|(key, _)| *key)
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }

    fn complete(&self, key: TileKey, result: impl Fn() -> crate::Result<TestImage>) -> bool {
        let senders = {
            let mut inner = self.inner.lock().unwrap();
            inner.pending.remove(&key).unwrap_or_default()
        };

        let mut completed = false;
        for tx in senders {
            completed |= tx.send(result()).is_ok();
        }
        completed
    }

    /// Resolves every outstanding fetch of `key`. Returns false if there were none.
    pub fn resolve(&self, key: TileKey) -> bool {
        self.complete(key, || Ok(TestImage(key)))
    }

    pub fn fail(&self, key: TileKey) -> bool {
        self.complete(key, || Err(Error::MissingContentType))
    }

    pub fn resolve_all(&self) -> usize {
        self.pending_keys()
            .into_iter()
            .filter(|key| self.resolve(*key))
            .count()
    }
}

impl TileSource for ManualSource {
    type Image = TestImage;

    fn fetch(&self, key: TileKey) -> BoxFuture<'static, crate::Result<TestImage>> {
        let (tx, rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock().unwrap();
            *inner.calls.entry(key).or_default() += 1;
            inner.pending.entry(key).or_default().push(tx);
        }

        async move {
            match rx.await {
                Ok(result) => result,
                // sender dropped without an answer, behave like a stalled request
                Err(_) => futures::future::pending().await,
            }
        }
        .boxed()
    }
}

/// Serves every tile immediately as a solid square of one color.
#[derive(Debug, Clone, Copy)]
pub struct SolidSource {
    pub tile_size: u32,
    pub color: Color,
}

impl TileSource for SolidSource {
    type Image = Pixmap;

    fn fetch(&self, key: TileKey) -> BoxFuture<'static, crate::Result<Pixmap>> {
        let Self { tile_size, color } = *self;

        async move {
            let mut pixmap = Pixmap::new(tile_size, tile_size)
                .ok_or(Error::InvalidSize(Size::new(tile_size, tile_size).into()))?;
            pixmap.fill(color);
            trace!(message = "served solid tile", %key);
            Ok(pixmap)
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Resize(Size<u32>),
    Clear,
    ClearRect(PixelRect),
    DrawImage(TileKey, PixelRect),
    RedrawScaled(PixelRect),
    FillPath(Vec<PixelPoint>),
    DrawCanvas,
}

/// A canvas that records every call made on it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingCanvas {
    pub size: Size<u32>,
    pub ops: Vec<Op>,
}

impl RecordingCanvas {
    pub fn drawn_tiles(&self) -> Vec<TileKey> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::DrawImage(key, _) => Some(*key),
                _ => None,
            })
            .collect()
    }

    pub fn last_redraw_scaled(&self) -> Option<PixelRect> {
        self.ops.iter().rev().find_map(|op| match op {
            Op::RedrawScaled(rect) => Some(*rect),
            _ => None,
        })
    }

    pub fn fill_paths(&self) -> Vec<&[PixelPoint]> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::FillPath(points) => Some(points.as_slice()),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    type Image = TestImage;

    fn with_size(size: Size<u32>) -> Self {
        Self {
            size,
            ops: Vec::new(),
        }
    }

    fn size(&self) -> Size<u32> {
        self.size
    }

    fn resize(&mut self, size: Size<u32>) {
        self.size = size;
        self.ops.push(Op::Resize(size));
    }

    fn clear(&mut self) {
        self.ops.push(Op::Clear);
    }

    fn clear_rect(&mut self, rect: PixelRect) {
        self.ops.push(Op::ClearRect(rect));
    }

    fn draw_image(&mut self, image: &TestImage, dest: PixelRect) {
        self.ops.push(Op::DrawImage(image.0, dest));
    }

    fn redraw_scaled(&mut self, dest: PixelRect) {
        self.ops.push(Op::RedrawScaled(dest));
    }

    fn fill_path(&mut self, points: &[PixelPoint], _fill: Color) {
        self.ops.push(Op::FillPath(points.to_vec()));
    }

    fn draw_canvas(&mut self, _other: &Self) {
        self.ops.push(Op::DrawCanvas);
    }
}
