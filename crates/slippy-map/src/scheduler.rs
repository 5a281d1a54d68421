//! The render loop.
//!
//! [`RenderScheduler`] owns the map state, the canvases and the tile cache, and is only
//! ever mutated through `&mut self`, so every state change and every draw happens in one
//! serialized context. Tile fetches run as spawned tasks that report back over a channel.
//!
//! Each render start allocates a new [`Generation`]. Arrivals are tagged with the
//! [`RenderPass`] that asked for them, and anything from an older pass is dropped without
//! touching a canvas. In-flight fetches are never cancelled; an outdated one still lands
//! in the cache for the next pass to use.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::Config;
use crate::cache::TileCache;
use crate::canvas::Canvas;
use crate::coords::{GeoPoint, PixelPoint, Projection, Size, Viewport, WorldPixel, wrap_delta};
use crate::error::FetchError;
use crate::feature::{Shape, ShapeId, ShapeLayer, ShapeProjector};
use crate::input::InputEvent;
use crate::layer::Layers;
use crate::source::TileSource;
use crate::tiles::{PixelRect, TileIndexer, TilePlacement};

/// Champaign, IL.
pub const DEFAULT_FOCUS: GeoPoint = GeoPoint::new(-88.22732760995116, 40.110373226386486);
pub const DEFAULT_ZOOM: f64 = 10.0;

/// Monotonic render pass counter. Zero means no pass has started yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub const fn get(&self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// One render start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPass {
    generation: Generation,
    zoom: u8,
    started_at: Instant,
}

impl RenderPass {
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// The integer zoom this pass requested tiles at.
    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    #[inline]
    pub fn is_current(&self, current: Generation) -> bool {
        self.generation == current
    }
}

/// What the map is looking at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapState {
    pub focus: GeoPoint,
    pub zoom: f64,
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            focus: DEFAULT_FOCUS,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// A finished tile fetch, on its way back to the scheduler.
#[derive(Debug)]
pub struct TileArrival<I> {
    pub pass: RenderPass,
    pub placement: TilePlacement,
    pub result: Result<Arc<I>, FetchError>,
}

/// What [`RenderScheduler::apply_arrival`] did with a tile.
#[derive(Debug, Clone)]
pub enum ArrivalOutcome {
    /// Drawn to the base layer at this rectangle.
    Drawn(PixelRect),
    /// From an outdated pass, dropped.
    Stale,
    Failed(FetchError),
}

/// Owns the map state and canvases, and turns input into render passes.
///
/// Tile fetches are spawned on the tokio runtime the scheduler was built in (or the one
/// handed to [`new_in`](Self::new_in)), so the sync methods work from any thread.
pub struct RenderScheduler<S: TileSource, C> {
    config: Config,
    runtime: Handle,
    projection: Projection,
    indexer: TileIndexer,
    projector: ShapeProjector,
    state: MapState,
    /// State the frame was last painted at. `None` until the first paint, and after a
    /// resize wipes the canvases.
    painted: Option<MapState>,
    viewport: Viewport,
    layers: Layers<C>,
    shapes: ShapeLayer,
    cache: TileCache<S>,
    generation: Generation,
    current: Option<RenderPass>,
    last_pass_at: Option<Instant>,
    deferred: bool,
    arrivals_tx: mpsc::UnboundedSender<TileArrival<S::Image>>,
    arrivals_rx: mpsc::UnboundedReceiver<TileArrival<S::Image>>,
}

impl<S, C> RenderScheduler<S, C>
where
    S: TileSource,
    C: Canvas<Image = S::Image>,
{
    /// Builds a scheduler on the current tokio runtime. Nothing is drawn or fetched until
    /// the first render start, i.e. the first input event or
    /// [`request_redraw`](Self::request_redraw).
    ///
    /// Fails with [`Error::NoRuntime`](crate::Error::NoRuntime) outside a runtime.
    pub fn new(
        config: Config,
        source: S,
        viewport: Viewport,
        state: MapState,
    ) -> crate::Result<Self> {
        let runtime = Handle::try_current()?;
        Self::new_in(config, source, viewport, state, runtime)
    }

    /// Same as [`new`](Self::new), spawning tile fetches on `runtime`.
    pub fn new_in(
        config: Config,
        source: S,
        viewport: Viewport,
        state: MapState,
        runtime: Handle,
    ) -> crate::Result<Self> {
        config.validate()?;

        let projection = Projection::new(config.tile_size, config.latitude_policy);
        let cache = TileCache::from_config(source, &config);
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();

        let mut scheduler = Self {
            indexer: TileIndexer::new(config.tile_size),
            projector: ShapeProjector::new(projection),
            projection,
            state,
            painted: None,
            viewport,
            layers: Layers::new(viewport),
            shapes: ShapeLayer::new(),
            cache,
            generation: Generation::default(),
            current: None,
            last_pass_at: None,
            deferred: false,
            arrivals_tx,
            arrivals_rx,
            config,
            runtime,
        };

        scheduler.state.zoom = scheduler.clamp_zoom(state.zoom);
        Ok(scheduler)
    }

    pub fn with_shape_layer(mut self, shapes: ShapeLayer) -> Self {
        self.shapes = shapes;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_pass(&self) -> Option<RenderPass> {
        self.current
    }

    /// The composited, visible canvas.
    pub fn frame(&self) -> &C {
        self.layers.visible()
    }

    pub fn base(&self) -> &C {
        self.layers.base()
    }

    pub fn overlay(&self) -> &C {
        self.layers.overlay()
    }

    pub fn shapes(&self) -> &ShapeLayer {
        &self.shapes
    }

    pub fn cache(&self) -> &TileCache<S> {
        &self.cache
    }

    /// Applies an input event. Returns the render pass it started, if any.
    pub fn handle_input(&mut self, event: InputEvent) -> Option<RenderPass> {
        match event {
            InputEvent::Pan { dx, dy } => self.pan(dx, dy),
            InputEvent::Zoom { delta, anchor } => self.zoom_by(delta, anchor),
            InputEvent::Resize { width, height } => self.resize(Size::new(width, height)),
            InputEvent::Click { x, y, modifier } => {
                self.click(PixelPoint::new(x, y), modifier);
                None
            }
            InputEvent::Redraw => self.request_redraw(),
        }
    }

    /// Drags the map by `(dx, dy)` pixels: the focus moves the opposite way, so the map
    /// follows the pointer. A zero (or non-finite) delta changes nothing, and so does a
    /// pan that can't be projected (from an unclamped pole).
    pub fn pan(&mut self, dx: f64, dy: f64) -> Option<RenderPass> {
        if !(dx.is_finite() && dy.is_finite()) || (dx == 0.0 && dy == 0.0) {
            return None;
        }

        let focus = self
            .projection
            .translate(self.state.focus, self.state.zoom, -dx, -dy);

        if !focus.is_finite() {
            debug!(message = "ignoring pan to an unprojectable focus", dx, dy);
            return None;
        }

        self.state.focus = focus;
        self.start_pass()
    }

    /// Zooms by `delta` levels, keeping the geographic point under `anchor` in place.
    pub fn zoom_by(&mut self, delta: f64, anchor: PixelPoint) -> Option<RenderPass> {
        if !delta.is_finite() || delta == 0.0 || !anchor.is_finite() {
            return None;
        }

        let zoom = self.clamp_zoom(self.state.zoom + delta);
        if zoom == self.state.zoom {
            return None;
        }

        let anchor_geo = self.screen_to_geo(anchor);
        let anchor_px = self.projection.to_world_pixel(anchor_geo, zoom);
        let center = self.viewport.center();

        let focus_px = WorldPixel {
            x: anchor_px.x - (anchor.x - center.x),
            y: anchor_px.y - (anchor.y - center.y),
            zoom,
        }
        .translate(0.0, 0.0, self.projection.tile_size());

        let focus = self.projection.to_geo_point(focus_px);
        if !focus.is_finite() {
            debug!(message = "ignoring zoom to an unprojectable focus", delta);
            return None;
        }

        self.state = MapState { focus, zoom };

        self.start_pass()
    }

    /// Jumps straight to a new focus and zoom. A non-finite focus changes nothing.
    pub fn set_view(&mut self, focus: GeoPoint, zoom: f64) -> Option<RenderPass> {
        if !focus.is_finite() {
            return None;
        }

        let zoom = if zoom.is_finite() {
            self.clamp_zoom(zoom)
        } else {
            self.state.zoom
        };

        self.state = MapState { focus, zoom };
        self.start_pass()
    }

    pub fn resize(&mut self, size: Viewport) -> Option<RenderPass> {
        debug!(message = "resizing map", width = size.width, height = size.height);

        self.viewport = size;
        self.layers.resize(size);
        self.painted = None;
        self.state.zoom = self.clamp_zoom(self.state.zoom);

        self.start_pass()
    }

    pub fn request_redraw(&mut self) -> Option<RenderPass> {
        self.start_pass()
    }

    /// With `modifier`, appends the point under the cursor to the active polygon
    /// (starting one if needed). Without it, finishes the active polygon.
    pub fn click(&mut self, point: PixelPoint, modifier: bool) {
        if modifier {
            let vertex = self.screen_to_geo(point);
            if !vertex.is_finite() {
                return;
            }
            self.shapes.append_vertex_to_active_shape(vertex);
        } else {
            self.shapes.finish_active_shape();
        }

        self.refresh_overlay();
    }

    pub fn add_shape(&mut self, shape: impl Into<Shape>) -> ShapeId {
        let id = self.shapes.add_shape(shape);
        self.refresh_overlay();
        id
    }

    pub fn append_vertex(&mut self, vertex: GeoPoint) -> ShapeId {
        let id = self.shapes.append_vertex_to_active_shape(vertex);
        self.refresh_overlay();
        id
    }

    pub fn finish_active_shape(&mut self) -> Option<ShapeId> {
        let id = self.shapes.finish_active_shape();
        self.refresh_overlay();
        id
    }

    pub fn clear_shapes(&mut self) {
        self.shapes.clear();
        self.refresh_overlay();
    }

    /// The geographic point under a canvas pixel.
    pub fn screen_to_geo(&self, point: PixelPoint) -> GeoPoint {
        let center = self.viewport.center();

        let pixel = self.focus_pixel().translate(
            point.x - center.x,
            point.y - center.y,
            self.projection.tile_size(),
        );

        self.projection.to_geo_point(pixel)
    }

    /// Lowest zoom allowed for the current viewport.
    pub fn effective_min_zoom(&self) -> f64 {
        let mut min_zoom = self.config.min_zoom;

        if self.config.fit_world_to_viewport && !self.viewport.is_empty() {
            let shortest = self.viewport.width.min(self.viewport.height) as f64;
            min_zoom = min_zoom.max((shortest / self.config.tile_size as f64).log2());
        }

        min_zoom.min(self.config.max_zoom)
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        let min_zoom = self.effective_min_zoom();

        if zoom.is_nan() {
            return min_zoom;
        }

        zoom.clamp(min_zoom, self.config.max_zoom)
    }

    fn focus_pixel(&self) -> WorldPixel {
        self.projection
            .to_world_pixel(self.state.focus, self.state.zoom)
    }

    /// When the owed trailing redraw should fire, if one is owed.
    pub fn deferred_deadline(&self) -> Option<Instant> {
        if !self.deferred {
            return None;
        }

        let last = self.last_pass_at?;
        Some(last + self.config.render_debounce())
    }

    /// Starts the trailing redraw owed by a debounced start, without waiting out the rest
    /// of the debounce window.
    pub fn flush_deferred(&mut self) -> Option<RenderPass> {
        if !self.deferred {
            return None;
        }

        self.deferred = false;
        let focus_px = self.focus_pixel();
        let pass = self.dispatch_pass(Instant::now(), focus_px);
        self.layers.composite();
        Some(pass)
    }

    fn start_pass(&mut self) -> Option<RenderPass> {
        let now = Instant::now();
        let focus_px = self.focus_pixel();

        self.repaint_interim(focus_px);
        self.redraw_overlay(focus_px);
        self.painted = Some(self.state);

        let debounce = self.config.render_debounce();
        let debounced = self
            .last_pass_at
            .is_some_and(|last| now.saturating_duration_since(last) < debounce);

        let pass = if debounced {
            debug!(message = "render start debounced", generation = self.generation.get());
            self.deferred = true;
            None
        } else {
            self.deferred = false;
            Some(self.dispatch_pass(now, focus_px))
        };

        self.layers.composite();
        pass
    }

    /// Allocates a new generation and requests every tile covering the viewport.
    fn dispatch_pass(&mut self, now: Instant, focus_px: WorldPixel) -> RenderPass {
        self.generation = self.generation.next();
        self.last_pass_at = Some(now);

        let region = self.indexer.tiles_for(self.viewport, focus_px);

        let pass = RenderPass {
            generation: self.generation,
            zoom: region.zoom(),
            started_at: now,
        };
        self.current = Some(pass);

        debug!(
            message = "starting render pass",
            generation = pass.generation.get(),
            zoom = self.state.zoom,
            tile_zoom = pass.zoom,
            tiles = region.num_tiles(),
        );

        for placement in region {
            self.dispatch(pass, placement, focus_px);
        }

        pass
    }

    fn dispatch(&mut self, pass: RenderPass, placement: TilePlacement, focus_px: WorldPixel) {
        let key = placement.key();
        let future = self.cache.get(key);

        // already fetched, no reason to wait a round trip through the channel
        if let Some(Ok(image)) = future.peek() {
            let dest = placement.dest_rect(focus_px, self.viewport, self.projection.tile_size());
            self.layers.base_mut().draw_image(image, dest);
            return;
        }

        trace!(message = "awaiting tile", %key, generation = pass.generation.get());

        let tx = self.arrivals_tx.clone();
        self.runtime.spawn(async move {
            let result = future.await;
            // the receiver lives as long as the scheduler, if it's gone nobody cares
            let _ = tx.send(TileArrival {
                pass,
                placement,
                result,
            });
        });
    }

    /// Scales and shifts what's on the base layer to approximate the new view, so
    /// something sensible shows while the new tiles load.
    fn repaint_interim(&mut self, focus_px: WorldPixel) {
        let Some(painted) = self.painted else {
            self.layers.base_mut().clear();
            return;
        };

        if painted == self.state {
            return;
        }

        let scale = (self.state.zoom - painted.zoom).exp2();
        let extent = self.projection.world_extent(self.state.zoom);

        // where the previously painted focus sits now, relative to the new focus
        let painted_px = self
            .projection
            .to_world_pixel(painted.focus, self.state.zoom);
        let delta_x = wrap_delta(painted_px.x - focus_px.x, extent);
        let delta_y = wrap_delta(painted_px.y - focus_px.y, extent);

        let center = self.viewport.center();

        let dest = PixelRect {
            x: center.x - center.x * scale + delta_x,
            y: center.y - center.y * scale + delta_y,
            width: self.viewport.width as f64 * scale,
            height: self.viewport.height as f64 * scale,
        };

        trace!(message = "interim repaint", scale, ?dest);
        self.layers.base_mut().redraw_scaled(dest);
    }

    fn redraw_overlay(&mut self, focus_px: WorldPixel) {
        let fill = self.shapes.fill();
        let overlay = self.layers.overlay_mut();
        overlay.clear();

        for shape in self.shapes.shapes() {
            let points = self.projector.project_pixel(shape, focus_px, self.viewport);
            if !points.is_empty() {
                overlay.fill_path(&points, fill);
            }
        }
    }

    fn refresh_overlay(&mut self) {
        let focus_px = self.focus_pixel();
        self.redraw_overlay(focus_px);
        self.layers.composite();
    }

    /// Waits for the next tile fetch to finish, stale or not.
    pub async fn next_arrival(&mut self) -> Option<TileArrival<S::Image>> {
        self.arrivals_rx.recv().await
    }

    pub fn try_next_arrival(&mut self) -> Option<TileArrival<S::Image>> {
        self.arrivals_rx.try_recv().ok()
    }

    /// Draws a finished tile, unless a newer pass has started since it was requested.
    ///
    /// The destination is computed from the state *now*, not from when the tile was
    /// requested.
    pub fn apply_arrival(&mut self, arrival: TileArrival<S::Image>) -> ArrivalOutcome {
        let TileArrival {
            pass,
            placement,
            result,
        } = arrival;

        if !pass.is_current(self.generation) {
            trace!(
                message = "dropping stale tile",
                key = %placement.key(),
                generation = pass.generation.get(),
                current = self.generation.get(),
            );
            return ArrivalOutcome::Stale;
        }

        match result {
            Ok(image) => {
                let dest = placement.dest_rect(
                    self.focus_pixel(),
                    self.viewport,
                    self.projection.tile_size(),
                );

                trace!(message = "drawing tile", key = %placement.key(), ?dest);
                self.layers.base_mut().draw_image(&image, dest);
                self.layers.composite();
                ArrivalOutcome::Drawn(dest)
            }
            Err(error) => {
                warn!(message = "tile fetch failed", %error);
                ArrivalOutcome::Failed(error)
            }
        }
    }

    /// Drives the map until `inputs` closes: applies input events, draws tile arrivals,
    /// and fires trailing redraws once their debounce window closes.
    pub async fn run(&mut self, mut inputs: mpsc::Receiver<InputEvent>) {
        loop {
            let deadline = self.deferred_deadline();

            tokio::select! {
                biased;
                event = inputs.recv() => match event {
                    Some(event) => {
                        self.handle_input(event);
                    }
                    None => break,
                },
                Some(arrival) = self.arrivals_rx.recv() => {
                    self.apply_arrival(arrival);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush_deferred();
                }
            }
        }

        debug!(message = "input channel closed, stopping render loop");
    }
}
