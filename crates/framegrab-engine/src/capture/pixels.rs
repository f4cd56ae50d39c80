/// Validity of the bytes held by a [`PixelBuffer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelState {
    /// Freshly allocated or resized, all zero.
    Empty,
    /// A read-back is pending for `capture`; the bytes are from an earlier one.
    Stale { capture: u64 },
    /// The bytes are the completed read-back of `capture`.
    Valid { capture: u64 },
}

/// Host-side RGBA8 pixels, `width * height * 4` bytes, rows top to bottom.
///
/// Reused across captures. The allocation only changes when the capture
/// resolution changes.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    state: PixelState,
}

impl PixelBuffer {
    pub const CHANNELS: u8 = 4;

    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            state: PixelState::Empty,
        }
    }

    /// Resizes to `width x height`, zeroing the contents when the size changes.
    /// Returns `true` when it did.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * Self::CHANNELS as usize, 0);
        self.state = PixelState::Empty;
        true
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * Self::CHANNELS as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn state(&self) -> PixelState {
        self.state
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGBA at `(x, y)`, `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// `true` when the bytes are the completed read-back of `capture`.
    #[inline]
    pub fn is_valid_for(&self, capture: u64) -> bool {
        self.state == PixelState::Valid { capture }
    }

    pub(crate) fn mark_stale(&mut self, capture: u64) {
        self.state = PixelState::Stale { capture };
    }

    pub(crate) fn mark_valid(&mut self, capture: u64) {
        self.state = PixelState::Valid { capture };
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}
