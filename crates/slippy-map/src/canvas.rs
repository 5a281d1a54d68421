//! Drawing surfaces.
//!
//! The renderer only needs a handful of primitives: scaled image blits (including blitting
//! a surface onto itself), rectangle clears, polygon fills and layer compositing. A
//! degenerate draw (empty rect, zero-sized surface, a path with no area) is a no-op, never
//! an error.

use std::path::Path;

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Transform,
};

use crate::Error;
use crate::coords::{PixelPoint, Size};
use crate::tiles::PixelRect;

pub trait Canvas: Sized {
    type Image;

    fn with_size(size: Size<u32>) -> Self;

    fn size(&self) -> Size<u32>;

    /// Resizes the surface. Like an HTML canvas, contents don't survive a resize.
    fn resize(&mut self, size: Size<u32>);

    fn clear(&mut self);

    fn clear_rect(&mut self, rect: PixelRect);

    /// Draws `image` stretched to fill `dest`.
    fn draw_image(&mut self, image: &Self::Image, dest: PixelRect);

    /// Draws the current contents back onto this surface, stretched to fill `dest`.
    fn redraw_scaled(&mut self, dest: PixelRect);

    /// Fills the closed polygon through `points`.
    fn fill_path(&mut self, points: &[PixelPoint], fill: Color);

    /// Draws `other` on top of this surface, unscaled, at the origin.
    fn draw_canvas(&mut self, other: &Self);
}

/// A [`Canvas`] backed by a [`tiny_skia::Pixmap`].
#[derive(Debug, Clone, PartialEq)]
pub struct PixmapCanvas {
    // tiny_skia can't represent a zero-sized pixmap
    pixmap: Option<Pixmap>,
    size: Size<u32>,
}

impl PixmapCanvas {
    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    pub fn into_pixmap(self) -> Option<Pixmap> {
        self.pixmap
    }

    pub fn encode_png(&self) -> crate::Result<Vec<u8>> {
        match self.pixmap {
            Some(ref pixmap) => pixmap.encode_png().map_err(Error::from),
            None => Err(Error::InvalidSize(self.size.into())),
        }
    }

    pub fn save_png<P>(&self, path: P) -> crate::Result<()>
    where
        P: AsRef<Path>,
    {
        match self.pixmap {
            Some(ref pixmap) => {
                pixmap.save_png(path.as_ref())?;
                Ok(())
            }
            None => Err(Error::InvalidSize(self.size.into())),
        }
    }

    fn blit(pixmap: &mut Pixmap, image: &Pixmap, dest: PixelRect) {
        if dest.is_empty() || !dest.is_finite() || image.width() == 0 || image.height() == 0 {
            return;
        }

        let sx = (dest.width / image.width() as f64) as f32;
        let sy = (dest.height / image.height() as f64) as f32;

        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };

        let transform = Transform::from_row(sx, 0.0, 0.0, sy, dest.x as f32, dest.y as f32);

        pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
    }
}

impl Canvas for PixmapCanvas {
    type Image = Pixmap;

    fn with_size(size: Size<u32>) -> Self {
        Self {
            pixmap: Pixmap::new(size.width, size.height),
            size,
        }
    }

    fn size(&self) -> Size<u32> {
        self.size
    }

    fn resize(&mut self, size: Size<u32>) {
        *self = Self::with_size(size);
    }

    fn clear(&mut self) {
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill(Color::TRANSPARENT);
        }
    }

    fn clear_rect(&mut self, rect: PixelRect) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };

        let Some(rect) = Rect::from_xywh(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        ) else {
            return;
        };

        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;

        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn draw_image(&mut self, image: &Pixmap, dest: PixelRect) {
        if let Some(pixmap) = self.pixmap.as_mut() {
            Self::blit(pixmap, image, dest);
        }
    }

    fn redraw_scaled(&mut self, dest: PixelRect) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };

        let previous = pixmap.clone();
        pixmap.fill(Color::TRANSPARENT);
        Self::blit(pixmap, &previous, dest);
    }

    fn fill_path(&mut self, points: &[PixelPoint], fill: Color) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };

        let (first, rest) = match points {
            [first, rest @ ..] if rest.len() >= 2 => (first, rest),
            _ => return,
        };

        let mut pb = PathBuilder::new();
        pb.move_to(first.x as f32, first.y as f32);
        for point in rest {
            pb.line_to(point.x as f32, point.y as f32);
        }
        pb.close();

        let Some(path) = pb.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(fill);
        paint.anti_alias = true;

        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn draw_canvas(&mut self, other: &Self) {
        let (Some(pixmap), Some(other)) = (self.pixmap.as_mut(), other.pixmap.as_ref()) else {
            return;
        };

        pixmap.draw_pixmap(
            0,
            0,
            other.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(canvas: &PixmapCanvas, x: u32, y: u32) -> tiny_skia::PremultipliedColorU8 {
        canvas.pixmap().unwrap().pixel(x, y).unwrap()
    }

    fn solid(size: u32, color: Color) -> Pixmap {
        let mut pixmap = Pixmap::new(size, size).unwrap();
        pixmap.fill(color);
        pixmap
    }

    #[test]
    fn test_zero_sized_canvas_is_a_no_op() {
        let mut canvas = PixmapCanvas::with_size(Size::new(0, 10));
        assert!(canvas.pixmap().is_none());

        canvas.clear();
        canvas.draw_image(&solid(4, Color::BLACK), PixelRect::new(0.0, 0.0, 4.0, 4.0));
        canvas.redraw_scaled(PixelRect::new(0.0, 0.0, 1.0, 1.0));
        canvas.fill_path(
            &[
                PixelPoint::new(0.0, 0.0),
                PixelPoint::new(1.0, 0.0),
                PixelPoint::new(0.0, 1.0),
            ],
            Color::BLACK,
        );

        assert!(matches!(canvas.encode_png(), Err(Error::InvalidSize(_))));
    }

    #[test]
    fn test_draw_image_scales_to_dest() {
        let mut canvas = PixmapCanvas::with_size(Size::new(8, 8));
        let red = Color::from_rgba8(255, 0, 0, 255);

        // 2x2 image stretched over the top left 4x4 quadrant
        canvas.draw_image(&solid(2, red), PixelRect::new(0.0, 0.0, 4.0, 4.0));

        assert_eq!(pixel(&canvas, 1, 1).red(), 255);
        assert_eq!(pixel(&canvas, 3, 3).alpha(), 255);
        assert_eq!(pixel(&canvas, 6, 6).alpha(), 0);
    }

    #[test]
    fn test_redraw_scaled_moves_contents() {
        let mut canvas = PixmapCanvas::with_size(Size::new(8, 8));
        canvas.draw_image(&solid(2, Color::BLACK), PixelRect::new(0.0, 0.0, 2.0, 2.0));

        // shift everything 4px right and down, unscaled
        canvas.redraw_scaled(PixelRect::new(4.0, 4.0, 8.0, 8.0));

        assert_eq!(pixel(&canvas, 0, 0).alpha(), 0);
        assert_eq!(pixel(&canvas, 5, 5).alpha(), 255);
    }

    #[test]
    fn test_fill_path_and_clear_rect() {
        let mut canvas = PixmapCanvas::with_size(Size::new(10, 10));
        let square = [
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(10.0, 0.0),
            PixelPoint::new(10.0, 10.0),
            PixelPoint::new(0.0, 10.0),
        ];

        canvas.fill_path(&square, Color::from_rgba8(0, 0, 255, 255));
        assert_eq!(pixel(&canvas, 5, 5).blue(), 255);

        canvas.clear_rect(PixelRect::new(0.0, 0.0, 5.0, 5.0));
        assert_eq!(pixel(&canvas, 2, 2).alpha(), 0);
        assert_eq!(pixel(&canvas, 7, 7).alpha(), 255);

        // fewer than 3 points has no area, and draws nothing
        let mut empty = PixmapCanvas::with_size(Size::new(10, 10));
        empty.fill_path(&square[..2], Color::BLACK);
        assert_eq!(empty, PixmapCanvas::with_size(Size::new(10, 10)));
    }

    #[test]
    fn test_draw_canvas_composites_layers() {
        let mut base = PixmapCanvas::with_size(Size::new(4, 4));
        base.clear_rect(PixelRect::new(0.0, 0.0, 4.0, 4.0));
        base.draw_image(&solid(4, Color::BLACK), PixelRect::new(0.0, 0.0, 4.0, 4.0));

        let mut visible = PixmapCanvas::with_size(Size::new(4, 4));
        visible.draw_canvas(&base);

        assert_eq!(visible, base);
    }
}
