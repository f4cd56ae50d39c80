//! Contracts between the window runtime and the demo programs.
//!
//! The runtime owns the event loop, the window and the backend; apps only see
//! a per-frame context.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
