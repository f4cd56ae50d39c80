/// Active output resolution in physical pixels.
///
/// Owned by the host loop and passed down by reference. The resize handler is
/// the only writer, through [`ViewportState::resize`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ViewportState {
    width: u32,
    height: u32,
    generation: u64,
}

impl ViewportState {
    /// Creates a state with a positive initial size.
    ///
    /// Zero extents are clamped to 1 so the state is always usable for a capture.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            generation: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bumped on every accepted resize.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Width over height.
    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Full-surface view rectangle.
    #[inline]
    pub fn rect(&self) -> ViewRect {
        ViewRect::new(0, 0, self.width, self.height)
    }

    /// Applies a new resolution.
    ///
    /// Minimized windows report 0x0; such sizes are ignored and the previous
    /// resolution stays active. Returns `true` when the resolution changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        if (width, height) == (self.width, self.height) {
            return false;
        }

        self.width = width;
        self.height = height;
        self.generation = self.generation.wrapping_add(1);
        true
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Rectangle of a render view, in pixels, top-left origin.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ViewRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clips the rectangle to a `width x height` surface.
    pub fn clamped_to(self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let x2 = self.x.saturating_add(self.width).min(width);
        let y2 = self.y.saturating_add(self.height).min(height);
        Self::new(x, y, x2 - x, y2 - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_size_and_generation() {
        let mut vp = ViewportState::new(800, 600);
        assert!(vp.resize(1024, 768));
        assert_eq!(vp.size(), (1024, 768));
        assert_eq!(vp.generation(), 1);
    }

    #[test]
    fn resize_to_same_size_is_not_a_change() {
        let mut vp = ViewportState::new(800, 600);
        assert!(!vp.resize(800, 600));
        assert_eq!(vp.generation(), 0);
    }

    #[test]
    fn minimized_size_is_ignored() {
        let mut vp = ViewportState::new(800, 600);
        assert!(!vp.resize(0, 0));
        assert!(!vp.resize(640, 0));
        assert_eq!(vp.size(), (800, 600));
    }

    #[test]
    fn new_clamps_zero_extent() {
        assert_eq!(ViewportState::new(0, 10).size(), (1, 10));
    }

    #[test]
    fn rect_clamps_to_surface() {
        let r = ViewRect::new(10, 10, 100, 100).clamped_to(50, 200);
        assert_eq!(r, ViewRect::new(10, 10, 40, 100));
        assert!(ViewRect::new(60, 0, 10, 10).clamped_to(50, 50).is_empty());
    }
}
