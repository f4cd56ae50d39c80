//! Cube whose vertex colours are rewritten every frame through a dynamic
//! vertex buffer. Escape closes.

use anyhow::Result;

use framegrab_demos::{CubeScene, DemoSettings};
use framegrab_engine::backend::RenderBackend;
use framegrab_engine::core::{App, AppControl, FrameCtx};
use framegrab_engine::device::{GpuInit, WgpuBackend};
use framegrab_engine::input::Key;
use framegrab_engine::logging::{init_logging, LoggingConfig};
use framegrab_engine::scene::{cube_vertices, SCREEN_CLEAR};
use framegrab_engine::window::{Runtime, RuntimeConfig};

/// Colour cycle speed, radians per second.
const PHASE_SPEED: f32 = 2.0;

struct DynamicApp {
    settings: DemoSettings,
    scene: Option<CubeScene>,
}

impl DynamicApp {
    fn frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> Result<()> {
        let scene = match self.scene {
            Some(scene) => scene,
            None => *self
                .scene
                .insert(CubeScene::create(ctx.backend, &self.settings.shader_loader(), true)?),
        };

        scene.update(ctx.backend, &cube_vertices(ctx.time.elapsed * PHASE_SPEED))?;
        scene.draw_to_screen(ctx.backend, 0, ctx.viewport, ctx.time.frame_index, SCREEN_CLEAR)?;
        ctx.backend.frame()?;
        Ok(())
    }
}

impl App for DynamicApp {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if let Err(e) = self.frame(ctx) {
            log::error!("dynamic draw failed: {e:#}");
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

    let app = DynamicApp {
        settings: DemoSettings::from_env()?,
        scene: None,
    };
    let config = RuntimeConfig {
        title: "framegrab: dynamic".into(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), app)
}
