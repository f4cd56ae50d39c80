use bitflags::bitflags;
use glam::Mat4;

use crate::paint::Rgba8;

use super::handles::{IndexBufferHandle, ProgramHandle, VertexBufferHandle};

/// Identifies the renderer behind a `RenderBackend`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Vulkan,
    Dx12,
    Metal,
    Gl,
    /// CPU rasterizer, see `backend::software`.
    Software,
}

impl BackendKind {
    pub fn from_wgpu(backend: wgpu::Backend) -> Option<Self> {
        match backend {
            wgpu::Backend::Vulkan => Some(BackendKind::Vulkan),
            wgpu::Backend::Dx12 => Some(BackendKind::Dx12),
            wgpu::Backend::Metal => Some(BackendKind::Metal),
            wgpu::Backend::Gl => Some(BackendKind::Gl),
            _ => None,
        }
    }
}

/// Renderer capabilities relevant to scene setup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Caps {
    /// Clip-space depth is `[-1, 1]` rather than `[0, 1]`.
    pub homogeneous_depth: bool,
    /// Largest supported 2D texture extent.
    pub max_texture_size: u32,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            homogeneous_depth: false,
            max_texture_size: 8192,
        }
    }
}

/// Maximum number of live handles per kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BackendLimits {
    pub max_textures: usize,
    pub max_frame_buffers: usize,
    pub max_vertex_buffers: usize,
    pub max_index_buffers: usize,
    pub max_programs: usize,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_textures: 4096,
            max_frame_buffers: 128,
            max_vertex_buffers: 4096,
            max_index_buffers: 4096,
            max_programs: 512,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    Bgra8,
}

impl TextureFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        4
    }

    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        }
    }
}

bitflags! {
    /// Creation flags of a 2D texture.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        /// Usable as a frame buffer colour attachment.
        const RENDER_TARGET = 1 << 0;
        /// Render with multisampling, resolved before blits.
        const MSAA = 1 << 1;
        /// Destination of `blit`.
        const BLIT_DST = 1 << 2;
        /// Source of `read_texture`.
        const READ_BACK = 1 << 3;
        /// Nearest filtering for min/mag/mip.
        const SAMPLER_POINT = 1 << 4;
        /// Clamp addressing on U and V.
        const SAMPLER_CLAMP = 1 << 5;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub flags: TextureFlags,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat, flags: TextureFlags) -> Self {
        Self { width, height, format, flags }
    }

    /// Size in bytes of a tightly packed copy of the texture.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Index of a logical render view. Views execute in ascending order.
pub type ViewId = u16;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

/// Clear applied when a view renders in a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewClear {
    pub flags: ClearFlags,
    pub color: Rgba8,
    pub depth: f32,
}

impl ViewClear {
    pub fn color_depth(color: Rgba8) -> Self {
        Self {
            flags: ClearFlags::COLOR | ClearFlags::DEPTH,
            color,
            depth: 1.0,
        }
    }
}

impl Default for ViewClear {
    fn default() -> Self {
        Self {
            flags: ClearFlags::empty(),
            color: Rgba8::BLACK,
            depth: 1.0,
        }
    }
}

/// One indexed draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub vertices: VertexBufferHandle,
    pub indices: IndexBufferHandle,
    /// Model matrix.
    pub transform: Mat4,
}

/// Receipt for a `read_texture` request.
///
/// The data becomes available once the backend's completed frame counter
/// reaches `ready_frame`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReadbackTicket {
    pub(crate) id: u64,
    pub ready_frame: u64,
}

impl ReadbackTicket {
    #[inline]
    pub fn is_ready(&self, completed_frame: u64) -> bool {
        completed_frame >= self.ready_frame
    }
}

pub(crate) fn validate_extent(desc: &TextureDesc, caps: &Caps) -> crate::Result<()> {
    if desc.width == 0 || desc.height == 0 {
        return Err(crate::CaptureError::InvalidArgument(format!(
            "texture extent {}x{} must be positive",
            desc.width, desc.height
        )));
    }
    if desc.width > caps.max_texture_size || desc.height > caps.max_texture_size {
        return Err(crate::CaptureError::InvalidArgument(format!(
            "texture extent {}x{} exceeds {}",
            desc.width, desc.height, caps.max_texture_size
        )));
    }
    Ok(())
}

/// Blit destinations must be `BLIT_DST` and match the source in size and format.
pub(crate) fn validate_blit(dst: &TextureDesc, src: &TextureDesc) -> crate::Result<()> {
    if !dst.flags.contains(TextureFlags::BLIT_DST) {
        return Err(crate::CaptureError::InvalidArgument("blit destination lacks BLIT_DST".into()));
    }
    if (dst.width, dst.height, dst.format) != (src.width, src.height, src.format) {
        return Err(crate::CaptureError::InvalidArgument(format!(
            "blit {}x{} {:?} into {}x{} {:?}",
            src.width, src.height, src.format, dst.width, dst.height, dst.format
        )));
    }
    Ok(())
}
