//! wgpu implementation of [`RenderBackend`](crate::backend::RenderBackend).
//!
//! `Gpu` owns the adapter, device, queue and optional window surface;
//! `WgpuBackend` layers handle tables, pipelines and read-backs on top.

mod backend;
mod gpu;
mod init;
mod pipelines;
mod readback;
mod resources;
mod surface;

pub use backend::WgpuBackend;
pub use gpu::Gpu;
pub use init::GpuInit;
