//! Framegrab engine crate.
//!
//! Renders a scene into an off-screen target, reads the pixels back to the CPU
//! and writes them out as PNG. Owns the platform, GPU and capture pieces used by
//! the demo programs.

pub mod backend;
pub mod capture;
pub mod device;
pub mod error;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod paint;
pub mod scene;

pub use error::{CaptureError, Result};
