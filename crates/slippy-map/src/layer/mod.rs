use crate::canvas::Canvas;
use crate::coords::Size;

/// The three surfaces making up a rendered map: tiles on `base`, shapes on `overlay`, and
/// the two composited onto `visible`.
///
/// All three always share the same size.
#[derive(Debug, Clone, PartialEq)]
pub struct Layers<C> {
    base: C,
    overlay: C,
    visible: C,
}

impl<C: Canvas> Layers<C> {
    pub fn new(size: Size<u32>) -> Self {
        Self {
            base: C::with_size(size),
            overlay: C::with_size(size),
            visible: C::with_size(size),
        }
    }

    pub fn size(&self) -> Size<u32> {
        self.visible.size()
    }

    pub fn resize(&mut self, size: Size<u32>) {
        self.base.resize(size);
        self.overlay.resize(size);
        self.visible.resize(size);
    }

    pub fn base(&self) -> &C {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut C {
        &mut self.base
    }

    pub fn overlay(&self) -> &C {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut C {
        &mut self.overlay
    }

    pub fn visible(&self) -> &C {
        &self.visible
    }

    /// Redraws the visible surface: base first, overlay on top.
    pub fn composite(&mut self) {
        self.visible.clear();
        self.visible.draw_canvas(&self.base);
        self.visible.draw_canvas(&self.overlay);
    }
}
