use wgpu::util::DeviceExt;

use crate::backend::{
    ShaderBinary, ShaderFormat, ShaderStage, TextureDesc, TextureFlags, TextureHandle,
};
use crate::scene::PosColorVertex;
use crate::{CaptureError, Result};

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

pub(crate) fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// A texture view with its backing texture.
pub(crate) struct Attachment {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Attachment {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
        sample_count: u32,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn depth(device: &wgpu::Device, size: (u32, u32), sample_count: u32) -> Self {
        Self::new(
            device,
            "framegrab depth",
            size,
            DEPTH_FORMAT,
            sample_count,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }
}

/// A 2D texture. `MSAA` render targets carry a multisampled attachment that
/// resolves into `main` at the end of every pass.
pub(crate) struct GpuTexture {
    pub desc: TextureDesc,
    pub main: Attachment,
    pub msaa: Option<Attachment>,
}

impl GpuTexture {
    pub fn create(device: &wgpu::Device, desc: TextureDesc, sample_count: u32) -> Self {
        let mut usage = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::TEXTURE_BINDING;
        if desc.flags.contains(TextureFlags::RENDER_TARGET) {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if desc.flags.contains(TextureFlags::BLIT_DST) {
            usage |= wgpu::TextureUsages::COPY_DST;
        }

        let size = (desc.width, desc.height);
        let format = desc.format.to_wgpu();
        let main = Attachment::new(device, "framegrab texture", size, format, 1, usage);

        let msaa = (desc.flags.contains(TextureFlags::RENDER_TARGET | TextureFlags::MSAA)
            && sample_count > 1)
            .then(|| {
                Attachment::new(
                    device,
                    "framegrab msaa colour",
                    size,
                    format,
                    sample_count,
                    wgpu::TextureUsages::RENDER_ATTACHMENT,
                )
            });

        Self { desc, main, msaa }
    }

    pub fn samples(&self) -> u32 {
        self.msaa.as_ref().map_or(1, |m| m.texture.sample_count())
    }
}

pub(crate) struct GpuFrameBuffer {
    pub color: TextureHandle,
    pub depth: Attachment,
}

pub(crate) struct GpuVertexBuffer {
    pub buffer: wgpu::Buffer,
    pub count: usize,
    pub dynamic: bool,
}

impl GpuVertexBuffer {
    pub fn create(device: &wgpu::Device, vertices: &[PosColorVertex]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("framegrab vertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            count: vertices.len(),
            dynamic: false,
        }
    }

    /// Zero-initialized, writable through the queue.
    pub fn create_dynamic(device: &wgpu::Device, count: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("framegrab dynamic vertices"),
            size: (count.max(1) as u64) * PosColorVertex::SIZE,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            count,
            dynamic: true,
        }
    }
}

pub(crate) struct GpuIndexBuffer {
    pub buffer: wgpu::Buffer,
    pub count: u32,
}

impl GpuIndexBuffer {
    pub fn create(device: &wgpu::Device, indices: &[u16]) -> Self {
        // Copies must be 4-byte aligned; pad odd index counts.
        let mut padded = indices.to_vec();
        if padded.len() % 2 == 1 {
            padded.push(0);
        }
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("framegrab indices"),
            contents: bytemuck::cast_slice(&padded),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            buffer,
            count: indices.len() as u32,
        }
    }
}

/// Compiled vertex + fragment modules. Pipelines are built per target
/// format on first use.
pub(crate) struct GpuProgram {
    pub vs: wgpu::ShaderModule,
    pub fs: wgpu::ShaderModule,
}

pub(crate) const VS_ENTRY: &str = "vs_main";
pub(crate) const FS_ENTRY: &str = "fs_main";

impl GpuProgram {
    pub fn create(device: &wgpu::Device, vs: &ShaderBinary, fs: &ShaderBinary) -> Result<Self> {
        Ok(Self {
            vs: compile(device, vs, ShaderStage::Vertex, VS_ENTRY)?,
            fs: compile(device, fs, ShaderStage::Fragment, FS_ENTRY)?,
        })
    }
}

fn compile(
    device: &wgpu::Device,
    bin: &ShaderBinary,
    stage: ShaderStage,
    entry: &str,
) -> Result<wgpu::ShaderModule> {
    let invalid = |reason: String| CaptureError::InvalidShader {
        name: bin.name.clone(),
        reason,
    };

    if bin.format != ShaderFormat::Wgsl {
        return Err(invalid(format!("{:?} binary given to the wgpu backend", bin.format)));
    }
    if bin.stage != stage {
        return Err(invalid(format!("expected {stage:?} stage, got {:?}", bin.stage)));
    }
    let source = bin.text()?;
    if !source.contains(&format!("fn {entry}")) {
        return Err(invalid(format!("missing entry point `{entry}`")));
    }

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&bin.name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}
