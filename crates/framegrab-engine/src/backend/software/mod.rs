//! Deterministic CPU implementation of [`RenderBackend`].
//!
//! Follows the same frame and read-back contract as the GPU backend, which
//! makes it the backend of choice for tests and for machines without an
//! adapter. Multisampling is accepted and ignored.

mod kernel;
mod raster;

use std::collections::HashMap;

use glam::Mat4;

use crate::coords::ViewRect;
use crate::scene::PosColorVertex;
use crate::{CaptureError, Result};

use super::{
    validate_blit, validate_extent, BackendKind, BackendLimits, Caps, DrawCall, FrameBufferHandle,
    FrameEncoder, Handle, HandleTable, IndexBufferHandle, ProgramHandle, ReadbackTicket,
    RenderBackend, ShaderBinary, TextureDesc, TextureFlags, TextureHandle, VertexBufferHandle,
    ViewClear, ViewId, ViewState, ViewWork,
};
use kernel::Program;
use raster::Target;

struct Texture {
    desc: TextureDesc,
    pixels: Vec<u8>,
}

struct FrameBuffer {
    color: TextureHandle,
    depth: Vec<f32>,
}

struct VertexBuffer {
    vertices: Vec<PosColorVertex>,
    dynamic: bool,
}

struct BackBuffer {
    width: u32,
    height: u32,
    color: Vec<u8>,
    depth: Vec<f32>,
}

impl BackBuffer {
    fn new(width: u32, height: u32) -> Self {
        let px = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0; px * 4],
            depth: vec![1.0; px],
        }
    }
}

pub struct SoftwareBackend {
    caps: Caps,
    frame: u64,
    back: BackBuffer,

    textures: HandleTable<TextureHandle, Texture>,
    frame_buffers: HandleTable<FrameBufferHandle, FrameBuffer>,
    vertex_buffers: HandleTable<VertexBufferHandle, VertexBuffer>,
    index_buffers: HandleTable<IndexBufferHandle, Vec<u16>>,
    programs: HandleTable<ProgramHandle, Program>,

    encoder: FrameEncoder,
    completed: HashMap<u64, Vec<u8>>,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_limits(width, height, BackendLimits::default())
    }

    pub fn with_limits(width: u32, height: u32, limits: BackendLimits) -> Self {
        Self {
            caps: Caps::default(),
            frame: 0,
            back: BackBuffer::new(width.max(1), height.max(1)),
            textures: HandleTable::new("texture", limits.max_textures),
            frame_buffers: HandleTable::new("frame buffer", limits.max_frame_buffers),
            vertex_buffers: HandleTable::new("vertex buffer", limits.max_vertex_buffers),
            index_buffers: HandleTable::new("index buffer", limits.max_index_buffers),
            programs: HandleTable::new("program", limits.max_programs),
            encoder: FrameEncoder::default(),
            completed: HashMap::new(),
        }
    }

    /// Read-backs queued or completed but not yet taken.
    pub fn pending_readbacks(&self) -> usize {
        self.encoder.pending_readbacks() + self.completed.len()
    }

    /// RGBA8 contents of the back buffer, rows top to bottom.
    pub fn back_buffer(&self) -> &[u8] {
        &self.back.color
    }

    fn execute_view(&mut self, id: ViewId, state: &ViewState, work: ViewWork) {
        for blit in &work.blits {
            self.copy_texture(blit.dst, blit.src);
        }
        if !work.renders() {
            return;
        }

        // Split borrows: the target planes come from one table, geometry from the others.
        let Self {
            back,
            textures,
            frame_buffers,
            vertex_buffers,
            index_buffers,
            programs,
            caps,
            ..
        } = self;

        let mut target = match state.frame_buffer {
            None => Target {
                color: &mut back.color,
                depth: &mut back.depth,
                width: back.width,
                height: back.height,
            },
            Some(fb) => {
                let Some(fb) = frame_buffers.get_retired_mut(fb) else {
                    log::warn!("view {id}: frame buffer was freed, skipping");
                    return;
                };
                let Some(tex) = textures.get_retired_mut(fb.color) else {
                    log::warn!("view {id}: frame buffer colour texture was freed, skipping");
                    return;
                };
                Target {
                    color: &mut tex.pixels,
                    depth: &mut fb.depth,
                    width: tex.desc.width,
                    height: tex.desc.height,
                }
            }
        };

        let rect = state
            .rect
            .unwrap_or(ViewRect::new(0, 0, target.width, target.height));
        if !state.clear.flags.is_empty() {
            target.clear(rect, &state.clear);
        }

        let view_proj = state.proj * state.view;
        for draw in &work.draws {
            let (Some(program), Some(vb), Some(ib)) = (
                programs.get_retired(draw.program),
                vertex_buffers.get_retired(draw.vertices),
                index_buffers.get_retired(draw.indices),
            ) else {
                log::warn!("view {id}: draw references freed resources, skipping");
                continue;
            };
            let mvp: Mat4 = view_proj * draw.transform;
            target.draw_indexed(rect, &mvp, &vb.vertices, ib, *program, caps.homogeneous_depth);
        }
    }

    fn copy_texture(&mut self, dst: TextureHandle, src: TextureHandle) {
        let Some(pixels) = self.textures.get_retired(src).map(|t| t.pixels.clone()) else {
            log::warn!("blit source was freed, skipping");
            return;
        };
        match self.textures.get_retired_mut(dst) {
            Some(t) => t.pixels.copy_from_slice(&pixels),
            None => log::warn!("blit destination was freed, skipping"),
        }
    }

    fn collect_garbage(&mut self) {
        let freed_fbs = self.frame_buffers.collect();
        for fb in &freed_fbs {
            self.encoder.unbind_frame_buffer(*fb);
        }
        let freed = self.textures.collect().len()
            + freed_fbs.len()
            + self.vertex_buffers.collect().len()
            + self.index_buffers.collect().len()
            + self.programs.collect().len();
        if freed > 0 {
            log::trace!("frame {}: freed {freed} resources", self.frame);
        }
    }
}

impl RenderBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn caps(&self) -> Caps {
        self.caps
    }

    fn frame_number(&self) -> u64 {
        self.frame
    }

    fn resolution(&self) -> (u32, u32) {
        (self.back.width, self.back.height)
    }

    fn reset(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "back buffer {width}x{height} must be positive"
            )));
        }
        self.back = BackBuffer::new(width, height);
        Ok(())
    }

    fn create_texture_2d(&mut self, desc: TextureDesc) -> Result<TextureHandle> {
        validate_extent(&desc, &self.caps)?;
        self.textures.insert(Texture {
            pixels: vec![0; desc.byte_len()],
            desc,
        })
    }

    fn create_frame_buffer(&mut self, color: TextureHandle) -> Result<FrameBufferHandle> {
        let desc = self.textures.get(color)?.desc;
        if !desc.flags.contains(TextureFlags::RENDER_TARGET) {
            return Err(CaptureError::InvalidArgument(
                "frame buffer attachment needs RENDER_TARGET".into(),
            ));
        }
        self.frame_buffers.insert(FrameBuffer {
            color,
            depth: vec![1.0; desc.width as usize * desc.height as usize],
        })
    }

    fn create_vertex_buffer(&mut self, vertices: &[PosColorVertex]) -> Result<VertexBufferHandle> {
        self.vertex_buffers.insert(VertexBuffer {
            vertices: vertices.to_vec(),
            dynamic: false,
        })
    }

    fn create_dynamic_vertex_buffer(&mut self, count: usize) -> Result<VertexBufferHandle> {
        self.vertex_buffers.insert(VertexBuffer {
            vertices: vec![PosColorVertex::new(0.0, 0.0, 0.0, 0); count],
            dynamic: true,
        })
    }

    fn update_dynamic_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        start: usize,
        vertices: &[PosColorVertex],
    ) -> Result<()> {
        let vb = self.vertex_buffers.get_mut(handle)?;
        if !vb.dynamic {
            return Err(CaptureError::InvalidArgument("vertex buffer is not dynamic".into()));
        }
        let end = start + vertices.len();
        if end > vb.vertices.len() {
            return Err(CaptureError::InvalidArgument(format!(
                "update {start}..{end} exceeds {} vertices",
                vb.vertices.len()
            )));
        }
        vb.vertices[start..end].copy_from_slice(vertices);
        Ok(())
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<IndexBufferHandle> {
        self.index_buffers.insert(indices.to_vec())
    }

    fn create_program(&mut self, vs: &ShaderBinary, fs: &ShaderBinary) -> Result<ProgramHandle> {
        let program = Program::link(vs, fs)?;
        self.programs.insert(program)
    }

    fn destroy(&mut self, handle: Handle) -> Result<()> {
        let (ok, kind) = match handle {
            Handle::Texture(h) => (self.textures.destroy(h), "texture"),
            Handle::FrameBuffer(h) => (self.frame_buffers.destroy(h), "frame buffer"),
            Handle::VertexBuffer(h) => (self.vertex_buffers.destroy(h), "vertex buffer"),
            Handle::IndexBuffer(h) => (self.index_buffers.destroy(h), "index buffer"),
            Handle::Program(h) => (self.programs.destroy(h), "program"),
        };
        if ok {
            Ok(())
        } else {
            Err(CaptureError::InvalidHandle(kind))
        }
    }

    fn live_handles(&self) -> usize {
        self.textures.live()
            + self.frame_buffers.live()
            + self.vertex_buffers.live()
            + self.index_buffers.live()
            + self.programs.live()
    }

    fn set_view_frame_buffer(&mut self, view: ViewId, fb: Option<FrameBufferHandle>) -> Result<()> {
        if let Some(fb) = fb {
            self.frame_buffers.get(fb)?;
        }
        self.encoder.state_mut(view).frame_buffer = fb;
        Ok(())
    }

    fn set_view_clear(&mut self, view: ViewId, clear: ViewClear) {
        self.encoder.state_mut(view).clear = clear;
    }

    fn set_view_rect(&mut self, view: ViewId, rect: ViewRect) {
        self.encoder.state_mut(view).rect = Some(rect);
    }

    fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4) {
        let state = self.encoder.state_mut(view);
        state.view = view_mtx;
        state.proj = proj;
    }

    fn touch(&mut self, view: ViewId) {
        self.encoder.touch(view);
    }

    fn submit(&mut self, view: ViewId, draw: &DrawCall) -> Result<()> {
        self.programs.get(draw.program)?;
        self.vertex_buffers.get(draw.vertices)?;
        self.index_buffers.get(draw.indices)?;
        self.encoder.draw(view, *draw);
        Ok(())
    }

    fn blit(&mut self, view: ViewId, dst: TextureHandle, src: TextureHandle) -> Result<()> {
        let src_desc = self.textures.get(src)?.desc;
        let dst_desc = self.textures.get(dst)?.desc;
        validate_blit(&dst_desc, &src_desc)?;
        self.encoder.blit(view, dst, src);
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureHandle) -> Result<ReadbackTicket> {
        let desc = self.textures.get(texture)?.desc;
        if !desc.flags.contains(TextureFlags::READ_BACK) {
            return Err(CaptureError::InvalidArgument("texture lacks READ_BACK".into()));
        }
        Ok(self.encoder.read_texture(texture, self.frame))
    }

    fn take_readback(&mut self, ticket: ReadbackTicket, dst: &mut [u8]) -> Result<bool> {
        if !ticket.is_ready(self.frame) {
            return Ok(false);
        }
        let Some(data) = self.completed.get(&ticket.id) else {
            return Err(CaptureError::InvalidArgument(format!(
                "read-back {} unknown or already taken",
                ticket.id
            )));
        };
        if dst.len() != data.len() {
            return Err(CaptureError::InvalidArgument(format!(
                "read-back destination holds {} bytes, texture has {}",
                dst.len(),
                data.len()
            )));
        }
        dst.copy_from_slice(data);
        self.completed.remove(&ticket.id);
        Ok(true)
    }

    fn discard_readback(&mut self, ticket: ReadbackTicket) {
        if self.encoder.discard_readback(ticket.id) || self.completed.remove(&ticket.id).is_some() {
            log::trace!("read-back {} discarded", ticket.id);
        }
    }

    fn frame(&mut self) -> Result<u64> {
        let work = self.encoder.take();

        for (id, state, view_work) in work.views {
            self.execute_view(id, &state, view_work);
        }

        for pending in work.readbacks {
            match self.textures.get_retired(pending.texture) {
                Some(t) => {
                    self.completed.insert(pending.ticket.id, t.pixels.clone());
                }
                None => log::warn!("read-back {} source was freed", pending.ticket.id),
            }
        }

        self.frame += 1;
        self.collect_garbage();
        Ok(self.frame)
    }
}
