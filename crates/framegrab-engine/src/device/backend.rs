use std::collections::HashMap;

use anyhow::Context;
use glam::Mat4;
use winit::window::Window;

use crate::backend::{
    validate_blit, validate_extent, BackendKind, Blit, Caps, ClearFlags, DrawCall,
    FrameBufferHandle, FrameEncoder, Handle, HandleTable, IndexBufferHandle, ProgramHandle,
    ReadbackTicket, RenderBackend, ShaderBinary, TextureDesc, TextureFlags, TextureHandle,
    VertexBufferHandle, ViewClear, ViewId, ViewState, ViewWork,
};
use crate::coords::ViewRect;
use crate::scene::PosColorVertex;
use crate::{CaptureError, Result};

use super::pipelines::{PipelineCache, TransformArena};
use super::readback::{self, StagedReadback};
use super::resources::{
    extent, Attachment, GpuFrameBuffer, GpuIndexBuffer, GpuProgram, GpuTexture, GpuVertexBuffer,
};
use super::{Gpu, GpuInit};

/// Back buffer attachments. Windowed backends render into the surface
/// texture, headless ones into `color`.
struct BackBuffer {
    size: (u32, u32),
    format: wgpu::TextureFormat,
    samples: u32,
    color: Option<Attachment>,
    msaa: Option<Attachment>,
    depth: Attachment,
}

impl BackBuffer {
    fn create(
        device: &wgpu::Device,
        size: (u32, u32),
        format: wgpu::TextureFormat,
        samples: u32,
        headless: bool,
    ) -> Self {
        let color = headless.then(|| {
            Attachment::new(
                device,
                "framegrab back buffer",
                size,
                format,
                1,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            )
        });
        let msaa = (samples > 1).then(|| {
            Attachment::new(
                device,
                "framegrab back buffer msaa",
                size,
                format,
                samples,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        });
        Self {
            size,
            format,
            samples,
            color,
            msaa,
            depth: Attachment::depth(device, size, samples),
        }
    }
}

#[derive(Copy, Clone)]
enum TargetRef {
    BackBuffer,
    FrameBuffer(FrameBufferHandle),
}

struct DrawPlan {
    draw: DrawCall,
    offset: u32,
}

struct ViewPlan {
    id: ViewId,
    state: ViewState,
    blits: Vec<Blit>,
    target: Option<TargetRef>,
    draws: Vec<DrawPlan>,
}

/// [`RenderBackend`] on top of wgpu.
///
/// `frame` records every view into one command buffer, submits it, presents
/// the surface if a view drew to it, then waits for the read-back copies and
/// maps them.
pub struct WgpuBackend<'w> {
    gpu: Gpu<'w>,
    kind: BackendKind,
    caps: Caps,
    sample_count: u32,
    frame: u64,
    back: BackBuffer,

    textures: HandleTable<TextureHandle, GpuTexture>,
    frame_buffers: HandleTable<FrameBufferHandle, GpuFrameBuffer>,
    vertex_buffers: HandleTable<VertexBufferHandle, GpuVertexBuffer>,
    index_buffers: HandleTable<IndexBufferHandle, GpuIndexBuffer>,
    programs: HandleTable<ProgramHandle, GpuProgram>,

    pipelines: PipelineCache,
    transforms: TransformArena,
    encoder: FrameEncoder,
    completed: HashMap<u64, Vec<u8>>,
}

impl<'w> WgpuBackend<'w> {
    /// Backend presenting to `window`.
    pub async fn windowed(window: &'w Window, init: &GpuInit) -> anyhow::Result<Self> {
        let gpu = Gpu::windowed(window, init).await?;
        let size = window.inner_size();
        Self::from_gpu(gpu, (size.width, size.height), init)
    }

    /// Backend rendering the back buffer into an off-screen texture.
    pub async fn headless(width: u32, height: u32, init: &GpuInit) -> anyhow::Result<WgpuBackend<'static>> {
        let gpu = Gpu::headless(init).await?;
        WgpuBackend::from_gpu(gpu, (width.max(1), height.max(1)), init)
    }

    fn from_gpu(gpu: Gpu<'w>, size: (u32, u32), init: &GpuInit) -> anyhow::Result<Self> {
        let info = gpu.adapter_info();
        let kind = BackendKind::from_wgpu(info.backend)
            .with_context(|| format!("unsupported wgpu backend {:?}", info.backend))?;

        let format = match gpu.surface() {
            Some(s) => s.format(),
            None => wgpu::TextureFormat::Rgba8Unorm,
        };
        let size = gpu.surface().map_or(size, |s| s.size());
        let sample_count = supported_samples(&gpu, init.sample_count, format);

        let device = gpu.device();
        let caps = Caps {
            homogeneous_depth: false,
            max_texture_size: device.limits().max_texture_dimension_2d,
        };
        let back = BackBuffer::create(device, size, format, sample_count, gpu.is_headless());
        let pipelines = PipelineCache::new(device);
        let transforms = TransformArena::new(device, pipelines.bind_group_layout(), 16);
        let limits = init.limits;

        log::info!("wgpu backend {kind:?}, {}x{} {format:?}, {sample_count}x MSAA", size.0, size.1);

        Ok(Self {
            kind,
            caps,
            sample_count,
            frame: 0,
            back,
            textures: HandleTable::new("texture", limits.max_textures),
            frame_buffers: HandleTable::new("frame buffer", limits.max_frame_buffers),
            vertex_buffers: HandleTable::new("vertex buffer", limits.max_vertex_buffers),
            index_buffers: HandleTable::new("index buffer", limits.max_index_buffers),
            programs: HandleTable::new("program", limits.max_programs),
            pipelines,
            transforms,
            encoder: FrameEncoder::default(),
            completed: HashMap::new(),
            gpu,
        })
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    /// Read-backs queued or completed but not yet taken.
    pub fn pending_readbacks(&self) -> usize {
        self.encoder.pending_readbacks() + self.completed.len()
    }

    /// Multisample count used for `MSAA` targets and the back buffer.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Resolves targets and builds pipelines, pushing one transform per draw.
    fn plan(&mut self, views: Vec<(ViewId, ViewState, ViewWork)>) -> Vec<ViewPlan> {
        let mut plans = Vec::with_capacity(views.len());

        for (id, state, work) in views {
            let renders = work.renders();
            let mut plan = ViewPlan {
                id,
                state,
                blits: work.blits,
                target: None,
                draws: Vec::new(),
            };
            if !renders {
                plans.push(plan);
                continue;
            }

            let (target, format, samples) = match state.frame_buffer {
                None => (TargetRef::BackBuffer, self.back.format, self.back.samples),
                Some(fb) => {
                    let Some(tex) = self
                        .frame_buffers
                        .get_retired(fb)
                        .and_then(|f| self.textures.get_retired(f.color))
                    else {
                        log::warn!("view {id}: frame buffer was freed, skipping");
                        plans.push(plan);
                        continue;
                    };
                    (TargetRef::FrameBuffer(fb), tex.desc.format.to_wgpu(), tex.samples())
                }
            };
            plan.target = Some(target);

            let view_proj = state.proj * state.view;
            for draw in work.draws {
                let Some(program) = self.programs.get_retired(draw.program) else {
                    log::warn!("view {id}: program was freed, skipping draw");
                    continue;
                };
                self.pipelines
                    .prepare(self.gpu.device(), draw.program, program, format, samples);
                let mvp: Mat4 = view_proj * draw.transform;
                let offset = self.transforms.push(&mvp);
                plan.draws.push(DrawPlan { draw, offset });
            }
            plans.push(plan);
        }
        plans
    }

    fn record_view(
        &self,
        enc: &mut wgpu::CommandEncoder,
        plan: &ViewPlan,
        surface_view: Option<&wgpu::TextureView>,
    ) {
        for blit in &plan.blits {
            let (Some(src), Some(dst)) = (
                self.textures.get_retired(blit.src),
                self.textures.get_retired(blit.dst),
            ) else {
                log::warn!("view {}: blit references freed texture, skipping", plan.id);
                continue;
            };
            enc.copy_texture_to_texture(
                src.main.texture.as_image_copy(),
                dst.main.texture.as_image_copy(),
                extent(src.desc.width, src.desc.height),
            );
        }

        let Some(target) = plan.target else {
            return;
        };

        let (color, resolve, depth, format, samples, (width, height)) = match target {
            TargetRef::BackBuffer => {
                let Some(final_view) = surface_view.or(self.back.color.as_ref().map(|c| &c.view)) else {
                    return;
                };
                match &self.back.msaa {
                    Some(msaa) => (&msaa.view, Some(final_view), &self.back.depth.view, self.back.format, self.back.samples, self.back.size),
                    None => (final_view, None, &self.back.depth.view, self.back.format, 1, self.back.size),
                }
            }
            TargetRef::FrameBuffer(fb) => {
                let Some((fb, tex)) = self
                    .frame_buffers
                    .get_retired(fb)
                    .and_then(|f| self.textures.get_retired(f.color).map(|t| (f, t)))
                else {
                    return;
                };
                let size = (tex.desc.width, tex.desc.height);
                let format = tex.desc.format.to_wgpu();
                match &tex.msaa {
                    Some(msaa) => (&msaa.view, Some(&tex.main.view), &fb.depth.view, format, tex.samples(), size),
                    None => (&tex.main.view, None, &fb.depth.view, format, 1, size),
                }
            }
        };

        let clear = &plan.state.clear;
        let mut pass = enc.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("framegrab view"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                depth_slice: None,
                resolve_target: resolve,
                ops: wgpu::Operations {
                    load: if clear.flags.contains(ClearFlags::COLOR) {
                        wgpu::LoadOp::Clear(clear.color.to_wgpu())
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: if clear.flags.contains(ClearFlags::DEPTH) {
                        wgpu::LoadOp::Clear(clear.depth)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let rect = plan
            .state
            .rect
            .unwrap_or(ViewRect::new(0, 0, width, height))
            .clamped_to(width, height);
        if rect.is_empty() {
            return;
        }
        pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);

        for DrawPlan { draw, offset } in &plan.draws {
            let (Some(pipeline), Some(vb), Some(ib)) = (
                self.pipelines.get(draw.program, format, samples),
                self.vertex_buffers.get_retired(draw.vertices),
                self.index_buffers.get_retired(draw.indices),
            ) else {
                log::warn!("view {}: draw references freed resources, skipping", plan.id);
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, self.transforms.bind_group(), &[*offset]);
            pass.set_vertex_buffer(0, vb.buffer.slice(..));
            pass.set_index_buffer(ib.buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..ib.count, 0, 0..1);
        }
    }

    fn collect_garbage(&mut self) {
        for fb in self.frame_buffers.collect() {
            self.encoder.unbind_frame_buffer(fb);
        }
        for program in self.programs.collect() {
            self.pipelines.evict(program);
        }
        self.textures.collect();
        self.vertex_buffers.collect();
        self.index_buffers.collect();
    }
}

fn supported_samples(gpu: &Gpu<'_>, requested: u32, back_format: wgpu::TextureFormat) -> u32 {
    if requested <= 1 {
        return 1;
    }
    let ok = [back_format, wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureFormat::Bgra8Unorm]
        .into_iter()
        .all(|f| {
            gpu.adapter_format_features(f)
                .flags
                .sample_count_supported(requested)
        });
    if ok {
        requested
    } else {
        log::warn!("{requested}x MSAA unsupported, rendering without multisampling");
        1
    }
}

impl RenderBackend for WgpuBackend<'_> {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn caps(&self) -> Caps {
        self.caps
    }

    fn frame_number(&self) -> u64 {
        self.frame
    }

    fn resolution(&self) -> (u32, u32) {
        self.back.size
    }

    fn reset(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "back buffer {width}x{height} must be positive"
            )));
        }
        if let Some((surface, device)) = self.gpu.surface_mut() {
            surface.resize(device, width, height);
        }
        let headless = self.gpu.is_headless();
        self.back = BackBuffer::create(
            self.gpu.device(),
            (width, height),
            self.back.format,
            self.back.samples,
            headless,
        );
        log::debug!("back buffer reset to {width}x{height}");
        Ok(())
    }

    fn create_texture_2d(&mut self, desc: TextureDesc) -> Result<TextureHandle> {
        validate_extent(&desc, &self.caps)?;
        let texture = GpuTexture::create(self.gpu.device(), desc, self.sample_count);
        self.textures.insert(texture)
    }

    fn create_frame_buffer(&mut self, color: TextureHandle) -> Result<FrameBufferHandle> {
        let tex = self.textures.get(color)?;
        if !tex.desc.flags.contains(TextureFlags::RENDER_TARGET) {
            return Err(CaptureError::InvalidArgument(
                "frame buffer attachment needs RENDER_TARGET".into(),
            ));
        }
        let depth = Attachment::depth(self.gpu.device(), (tex.desc.width, tex.desc.height), tex.samples());
        self.frame_buffers.insert(GpuFrameBuffer { color, depth })
    }

    fn create_vertex_buffer(&mut self, vertices: &[PosColorVertex]) -> Result<VertexBufferHandle> {
        if vertices.is_empty() {
            return Err(CaptureError::InvalidArgument("empty vertex buffer".into()));
        }
        self.vertex_buffers
            .insert(GpuVertexBuffer::create(self.gpu.device(), vertices))
    }

    fn create_dynamic_vertex_buffer(&mut self, count: usize) -> Result<VertexBufferHandle> {
        self.vertex_buffers
            .insert(GpuVertexBuffer::create_dynamic(self.gpu.device(), count))
    }

    fn update_dynamic_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        start: usize,
        vertices: &[PosColorVertex],
    ) -> Result<()> {
        let vb = self.vertex_buffers.get(handle)?;
        if !vb.dynamic {
            return Err(CaptureError::InvalidArgument("vertex buffer is not dynamic".into()));
        }
        let end = start + vertices.len();
        if end > vb.count {
            return Err(CaptureError::InvalidArgument(format!(
                "update {start}..{end} exceeds {} vertices",
                vb.count
            )));
        }
        self.gpu.queue().write_buffer(
            &vb.buffer,
            start as u64 * PosColorVertex::SIZE,
            bytemuck::cast_slice(vertices),
        );
        Ok(())
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<IndexBufferHandle> {
        if indices.is_empty() {
            return Err(CaptureError::InvalidArgument("empty index buffer".into()));
        }
        self.index_buffers
            .insert(GpuIndexBuffer::create(self.gpu.device(), indices))
    }

    fn create_program(&mut self, vs: &ShaderBinary, fs: &ShaderBinary) -> Result<ProgramHandle> {
        let program = GpuProgram::create(self.gpu.device(), vs, fs)?;
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
        ok.then_some(()).ok_or(CaptureError::InvalidHandle(kind))
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

        self.transforms.clear();
        let plans = self.plan(work.views);
        self.transforms.upload(
            self.gpu.device(),
            self.gpu.queue(),
            self.pipelines.bind_group_layout(),
        );

        let wants_surface = plans
            .iter()
            .any(|p| matches!(p.target, Some(TargetRef::BackBuffer)));
        let surface_texture = match self.gpu.surface() {
            Some(surface) if wants_surface => surface.acquire(self.gpu.device())?,
            _ => None,
        };
        let surface_view = surface_texture
            .as_ref()
            .map(|t| t.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let device = self.gpu.device();
        let mut enc = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("framegrab frame"),
        });

        for plan in &plans {
            self.record_view(&mut enc, plan, surface_view.as_ref());
        }

        let staged: Vec<StagedReadback> = work
            .readbacks
            .into_iter()
            .filter_map(|pending| match self.textures.get_retired(pending.texture) {
                Some(tex) => Some(StagedReadback::record(device, &mut enc, pending.ticket, &tex.main.texture)),
                None => {
                    log::warn!("read-back source was freed, skipping");
                    None
                }
            })
            .collect();

        self.gpu.queue().submit(std::iter::once(enc.finish()));
        drop(surface_view);
        if let Some(texture) = surface_texture {
            texture.present();
        }

        for (ticket, pixels) in readback::resolve_all(self.gpu.device(), staged)? {
            self.completed.insert(ticket.id, pixels);
        }

        self.frame += 1;
        self.collect_garbage();
        Ok(self.frame)
    }
}
