use winit::window::{Window, WindowId};

use crate::coords::ViewportState;
use crate::device::WgpuBackend;
use crate::input::InputState;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

/// The window a frame is rendered for.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window borrow carried by `WgpuBackend<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub backend: &'a mut WgpuBackend<'w>,
    pub input: &'a InputState,
    pub viewport: &'a ViewportState,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Requests a runtime exit after this callback.
    pub fn exit(&mut self) {
        self.runtime.exit();
    }
}
