use bytemuck::{Pod, Zeroable};

/// Position + packed colour vertex.
///
/// `abgr` is read by the GPU as four normalized bytes in memory order, which on
/// little-endian hosts is R, G, B, A.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PosColorVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub abgr: u32,
}

impl PosColorVertex {
    pub const SIZE: u64 = std::mem::size_of::<PosColorVertex>() as u64;

    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Unorm8x4   // colour
    ];

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, abgr: u32) -> Self {
        Self { x, y, z, abgr }
    }

    #[inline]
    pub fn position(&self) -> glam::Vec3 {
        glam::Vec3::new(self.x, self.y, self.z)
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
