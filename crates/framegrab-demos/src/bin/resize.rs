//! The cube follows window resizes; `S` captures the current frame at the
//! current resolution. Escape closes.

use anyhow::Result;

use framegrab_demos::{CubeScene, DemoSettings};
use framegrab_engine::backend::{RenderBackend, ViewId};
use framegrab_engine::capture::Recorder;
use framegrab_engine::core::{App, AppControl, FrameCtx};
use framegrab_engine::device::{GpuInit, WgpuBackend};
use framegrab_engine::input::Key;
use framegrab_engine::logging::{init_logging, LoggingConfig};
use framegrab_engine::scene::{CAPTURE_CLEAR, SCREEN_CLEAR};
use framegrab_engine::window::{Runtime, RuntimeConfig};

const CAPTURE_VIEW: ViewId = 0;
const SCREEN_VIEW: ViewId = 1;

struct ResizeApp {
    settings: DemoSettings,
    recorder: Recorder,
    scene: Option<CubeScene>,
    generation: u64,
}

impl ResizeApp {
    fn frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<()> {
        let scene = match self.scene {
            Some(scene) => scene,
            None => *self
                .scene
                .insert(CubeScene::create(ctx.backend, &self.settings.shader_loader(), false)?),
        };
        let frame = ctx.time.frame_index;
        let (width, height) = ctx.viewport.size();

        if ctx.viewport.generation() != self.generation {
            self.generation = ctx.viewport.generation();
            ctx.window
                .set_title(&format!("framegrab: resize ({width}x{height})"));
        }

        scene.draw_to_screen(ctx.backend, SCREEN_VIEW, ctx.viewport, frame, SCREEN_CLEAR)?;

        if ctx.input.key_pressed(Key::S) {
            let submission = scene.submission(frame, ctx.viewport.aspect(), ctx.backend.caps(), CAPTURE_CLEAR);
            if let Some(path) = self.recorder.record(ctx.backend, width, height, &submission)? {
                log::info!("captured {width}x{height} to {}", path.display());
            }
        } else {
            ctx.backend.frame()?;
        }
        Ok(())
    }
}

impl App for ResizeApp {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if let Err(e) = self.frame(ctx) {
            log::error!("resize demo failed: {e:#}");
            return AppControl::Exit;
        }
        AppControl::Continue
    }

    fn on_exit(&mut self, backend: &mut WgpuBackend<'_>) {
        if let Err(e) = self.recorder.finish(backend) {
            log::warn!("finishing in-flight capture: {e}");
        }
        if let Some(scene) = self.scene.take() {
            if let Err(e) = scene.destroy(backend) {
                log::warn!("releasing cube: {e}");
            }
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let settings = DemoSettings::from_env()?;
    let app = ResizeApp {
        recorder: Recorder::new(settings.capture_config(CAPTURE_VIEW)),
        settings,
        scene: None,
        generation: 0,
    };
    let config = RuntimeConfig {
        title: "framegrab: resize".into(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), app)
}
