use winit::event::WindowEvent;

use crate::device::WgpuBackend;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime`](crate::window::Runtime).
pub trait App {
    /// Raw window events, after the runtime updated input state.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per redraw. The app is expected to advance the backend
    /// frame itself.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called once before the window and its backend are dropped. Release
    /// in-flight captures and GPU resources here.
    fn on_exit(&mut self, backend: &mut WgpuBackend<'_>) {
        let _ = backend;
    }
}
