//! No window: captures `FRAMEGRAB_FRAMES` frames of the rotating cube to PNG.
//!
//! `FRAMEGRAB_BACKEND=software` renders on the CPU rasterizer instead of wgpu.

use anyhow::{Context, Result};

use framegrab_demos::{BackendChoice, CubeScene, DemoSettings};
use framegrab_engine::backend::{RenderBackend, SoftwareBackend};
use framegrab_engine::capture::Recorder;
use framegrab_engine::device::{GpuInit, WgpuBackend};
use framegrab_engine::logging::{init_logging, LoggingConfig};
use framegrab_engine::scene::CAPTURE_CLEAR;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn run<B: RenderBackend>(backend: &mut B, settings: &DemoSettings) -> Result<()> {
    let scene = CubeScene::create(backend, &settings.shader_loader(), false)?;
    let mut recorder = Recorder::new(settings.capture_config(0));
    let aspect = WIDTH as f32 / HEIGHT as f32;

    for frame in 0..settings.frames {
        let submission = scene.submission(frame, aspect, backend.caps(), CAPTURE_CLEAR);
        if let Some(path) = recorder.record(backend, WIDTH, HEIGHT, &submission)? {
            log::debug!("frame {frame} -> {}", path.display());
        }
    }
    recorder.finish(backend)?;
    scene.destroy(backend)?;

    // Flush the deferred destroys.
    backend.frame()?;

    let stats = recorder.stats();
    log::info!(
        "{} of {} captures saved to {} ({} failed)",
        stats.completed,
        settings.frames,
        settings.out_dir.display(),
        stats.failed_saves
    );
    Ok(())
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let settings = DemoSettings::from_env()?;

    std::fs::create_dir_all(&settings.out_dir)
        .with_context(|| format!("creating {}", settings.out_dir.display()))?;

    match settings.backend {
        BackendChoice::Software => run(&mut SoftwareBackend::new(WIDTH, HEIGHT), &settings),
        BackendChoice::Wgpu => {
            let mut backend = pollster::block_on(WgpuBackend::headless(WIDTH, HEIGHT, &GpuInit::default()))?;
            run(&mut backend, &settings)
        }
    }
}
