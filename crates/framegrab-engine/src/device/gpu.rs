use anyhow::{Context, Result};
use winit::window::Window;

use super::surface::SurfaceTarget;
use super::GpuInit;

/// Owns the wgpu adapter, device and queue, plus the window surface when
/// there is one.
pub struct Gpu<'w> {
    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// `None` for headless contexts.
    surface: Option<SurfaceTarget<'w>>,
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context that presents to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn windowed(window: &'w Window, init: &GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = instance(init);
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let (adapter, device, queue) = open_device(&instance, init, Some(&surface)).await?;

        let surface = SurfaceTarget::configure(surface, &adapter, &device, (size.width, size.height), init)
            .context("no supported surface formats")?;
        log::info!("surface format {:?}", surface.format());

        Ok(Self {
            adapter,
            device,
            queue,
            surface: Some(surface),
        })
    }

    /// Creates a GPU context without a surface.
    pub async fn headless(init: &GpuInit) -> Result<Gpu<'static>> {
        let instance = instance(init);
        let (adapter, device, queue) = open_device(&instance, init, None).await?;
        Ok(Gpu {
            adapter,
            device,
            queue,
            surface: None,
        })
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn adapter_format_features(&self, format: wgpu::TextureFormat) -> wgpu::TextureFormatFeatures {
        self.adapter.get_texture_format_features(format)
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn is_headless(&self) -> bool {
        self.surface.is_none()
    }

    pub(crate) fn surface(&self) -> Option<&SurfaceTarget<'w>> {
        self.surface.as_ref()
    }

    pub(crate) fn surface_mut(&mut self) -> Option<(&mut SurfaceTarget<'w>, &wgpu::Device)> {
        self.surface.as_mut().map(|s| (s, &self.device))
    }
}

fn instance(init: &GpuInit) -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: init.backends,
        ..Default::default()
    })
}

async fn open_device(
    instance: &wgpu::Instance,
    init: &GpuInit,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    log::info!("adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("framegrab device"),
            required_features: init.required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")?;

    Ok((adapter, device, queue))
}
