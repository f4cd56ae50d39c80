//! Immediate-mode rendering service consumed by the capture pipeline.
//!
//! Resources are addressed by handles, work is recorded per view and executed
//! in `frame()`. Read-backs complete one frame after they are issued.

mod encoder;
mod handles;
pub mod shader;
pub mod software;
mod types;

pub(crate) use encoder::{Blit, FrameEncoder, ViewState, ViewWork};
pub(crate) use handles::HandleTable;

pub use handles::{
    FrameBufferHandle, Handle, IndexBufferHandle, ProgramHandle, TextureHandle, VertexBufferHandle,
};
pub use shader::{ShaderBinary, ShaderFormat, ShaderLoader, ShaderStage};
pub use software::SoftwareBackend;
pub use types::{
    BackendKind, BackendLimits, Caps, ClearFlags, DrawCall, ReadbackTicket, TextureDesc,
    TextureFlags, TextureFormat, ViewClear, ViewId,
};
pub(crate) use types::{validate_blit, validate_extent};

use glam::Mat4;

use crate::coords::ViewRect;
use crate::scene::PosColorVertex;
use crate::Result;

/// A renderer with a handle-based, view-ordered command model.
///
/// All methods are called from one thread. `frame` is the only point where
/// recorded work executes.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;
    fn caps(&self) -> Caps;

    /// Number of completed frame advances.
    fn frame_number(&self) -> u64;

    /// Back buffer size.
    fn resolution(&self) -> (u32, u32);

    /// Resizes the back buffer.
    fn reset(&mut self, width: u32, height: u32) -> Result<()>;

    fn create_texture_2d(&mut self, desc: TextureDesc) -> Result<TextureHandle>;

    /// Frame buffer with `color` as its colour attachment and an implicit depth
    /// attachment of the same size.
    fn create_frame_buffer(&mut self, color: TextureHandle) -> Result<FrameBufferHandle>;

    fn create_vertex_buffer(&mut self, vertices: &[PosColorVertex]) -> Result<VertexBufferHandle>;

    /// Vertex buffer with room for `count` vertices, initially zeroed.
    fn create_dynamic_vertex_buffer(&mut self, count: usize) -> Result<VertexBufferHandle>;

    /// Overwrites vertices starting at `start`.
    fn update_dynamic_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        start: usize,
        vertices: &[PosColorVertex],
    ) -> Result<()>;

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<IndexBufferHandle>;

    fn create_program(&mut self, vs: &ShaderBinary, fs: &ShaderBinary) -> Result<ProgramHandle>;

    /// Releases a handle. The handle is invalid immediately; the resource is
    /// freed after the next `frame`.
    fn destroy(&mut self, handle: Handle) -> Result<()>;

    /// Handles created and not yet destroyed, across all kinds.
    fn live_handles(&self) -> usize;

    /// Binds `fb` as the output of `view`; `None` selects the back buffer.
    fn set_view_frame_buffer(&mut self, view: ViewId, fb: Option<FrameBufferHandle>) -> Result<()>;
    fn set_view_clear(&mut self, view: ViewId, clear: ViewClear);
    fn set_view_rect(&mut self, view: ViewId, rect: ViewRect);
    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4);

    /// Makes `view` clear this frame even without draws.
    fn touch(&mut self, view: ViewId);

    fn submit(&mut self, view: ViewId, draw: &DrawCall) -> Result<()>;

    /// Copies `src` into `dst` before the draws of `view`.
    fn blit(&mut self, view: ViewId, dst: TextureHandle, src: TextureHandle) -> Result<()>;

    /// Schedules a copy of `texture` into host memory.
    fn read_texture(&mut self, texture: TextureHandle) -> Result<ReadbackTicket>;

    /// Copies completed read-back data into `dst`. Returns `false` when the
    /// data is not available yet; `dst` is left untouched then.
    fn take_readback(&mut self, ticket: ReadbackTicket, dst: &mut [u8]) -> Result<bool>;

    /// Drops a read-back that will never be taken, whether it is still queued
    /// or already completed. Unknown or taken tickets are ignored.
    fn discard_readback(&mut self, ticket: ReadbackTicket);

    /// Executes recorded work and advances the frame counter. Returns the
    /// number of the frame just completed.
    fn frame(&mut self) -> Result<u64>;
}
