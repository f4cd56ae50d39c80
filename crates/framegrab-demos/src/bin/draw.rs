//! Rotating cube drawn to the window. Escape closes.

use anyhow::Result;

use framegrab_demos::{CubeScene, DemoSettings};
use framegrab_engine::backend::RenderBackend;
use framegrab_engine::core::{App, AppControl, FrameCtx};
use framegrab_engine::device::{GpuInit, WgpuBackend};
use framegrab_engine::input::Key;
use framegrab_engine::logging::{init_logging, LoggingConfig};
use framegrab_engine::scene::SCREEN_CLEAR;
use framegrab_engine::window::{Runtime, RuntimeConfig};

struct DrawApp {
    settings: DemoSettings,
    scene: Option<CubeScene>,
}

impl DrawApp {
    fn frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<()> {
        let scene = match self.scene {
            Some(scene) => scene,
            None => *self
                .scene
                .insert(CubeScene::create(ctx.backend, &self.settings.shader_loader(), false)?),
        };

        scene.draw_to_screen(ctx.backend, 0, ctx.viewport, ctx.time.frame_index, SCREEN_CLEAR)?;
        ctx.backend.frame()?;
        Ok(())
    }
}

impl App for DrawApp {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if let Err(e) = self.frame(ctx) {
            log::error!("draw failed: {e:#}");
            return AppControl::Exit;
        }
        AppControl::Continue
    }

    fn on_exit(&mut self, backend: &mut WgpuBackend<'_>) {
        if let Some(scene) = self.scene.take() {
            if let Err(e) = scene.destroy(backend) {
                log::warn!("releasing cube: {e}");
            }
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let app = DrawApp {
        settings: DemoSettings::from_env()?,
        scene: None,
    };
    let config = RuntimeConfig {
        title: "framegrab: draw".into(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), app)
}
