//! Window + runtime loop.
//!
//! Owns the `winit` event loop and the window, and wires them to the wgpu
//! backend, keyboard state and the active resolution.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
