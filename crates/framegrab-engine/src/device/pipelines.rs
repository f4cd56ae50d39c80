use std::collections::HashMap;
use std::num::NonZeroU64;

use glam::Mat4;

use crate::backend::ProgramHandle;
use crate::scene::PosColorVertex;

use super::resources::{GpuProgram, DEPTH_FORMAT, FS_ENTRY, VS_ENTRY};

const MAT4_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    format: wgpu::TextureFormat,
    samples: u32,
}

/// Render pipelines keyed by program, colour format and sample count.
pub(crate) struct PipelineCache {
    bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("framegrab transform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MAT4_SIZE),
                },
                count: None,
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("framegrab pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Self {
            bind_group_layout,
            layout,
            pipelines: HashMap::new(),
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Builds the pipeline on first use.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        handle: ProgramHandle,
        program: &GpuProgram,
        format: wgpu::TextureFormat,
        samples: u32,
    ) {
        let key = PipelineKey {
            program: handle,
            format,
            samples,
        };
        if self.pipelines.contains_key(&key) {
            return;
        }

        log::debug!("building pipeline for {format:?} x{samples}");
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("framegrab pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &program.vs,
                entry_point: Some(VS_ENTRY),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[PosColorVertex::layout()],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: samples,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fs,
                entry_point: Some(FS_ENTRY),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert(key, pipeline);
    }

    pub fn get(
        &self,
        program: ProgramHandle,
        format: wgpu::TextureFormat,
        samples: u32,
    ) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&PipelineKey {
            program,
            format,
            samples,
        })
    }

    /// Drops pipelines built for `program`.
    pub fn evict(&mut self, program: ProgramHandle) {
        self.pipelines.retain(|k, _| k.program != program);
    }
}

/// Per-draw model-view-projection matrices in one dynamic-offset uniform
/// buffer, refilled every frame.
pub(crate) struct TransformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: u64,
    staged: Vec<u8>,
}

impl TransformArena {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: u64) -> Self {
        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = MAT4_SIZE.div_ceil(align) * align;
        let (buffer, bind_group) = Self::allocate(device, layout, stride, capacity);
        Self {
            buffer,
            bind_group,
            stride,
            capacity,
            staged: Vec::new(),
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("framegrab transforms"),
            size: stride * capacity.max(1),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("framegrab transforms"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(MAT4_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Appends a matrix; returns its dynamic offset.
    pub fn push(&mut self, mvp: &Mat4) -> u32 {
        let offset = self.staged.len();
        self.staged.extend_from_slice(bytemuck::bytes_of(mvp));
        self.staged.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    /// Uploads the matrices pushed this frame, growing the buffer if needed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) {
        let needed = self.staged.len() as u64 / self.stride;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            (self.buffer, self.bind_group) = Self::allocate(device, layout, self.stride, self.capacity);
            log::debug!("transform arena grown to {} draws", self.capacity);
        }
        if !self.staged.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staged);
        }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }
}
