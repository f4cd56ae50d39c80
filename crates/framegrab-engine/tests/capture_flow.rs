//! End-to-end capture runs against the CPU backend.

use std::path::Path;

use framegrab_engine::backend::{
    RenderBackend, ShaderBinary, ShaderFormat, ShaderStage, SoftwareBackend, TextureFormat,
};
use framegrab_engine::capture::{
    encode_and_save, CaptureConfig, CapturePipeline, CaptureStage, PixelState, ReadbackPolicy,
    Recorder, SceneSubmission,
};
use framegrab_engine::scene::{SceneTransforms, CAPTURE_CLEAR, CUBE_INDICES, CUBE_VERTICES};
use framegrab_engine::CaptureError;

fn cube_scene(backend: &mut SoftwareBackend, width: u32, height: u32) -> SceneSubmission {
    let vs = ShaderBinary::new("vs_cubes", ShaderStage::Vertex, ShaderFormat::Cpu, b"mvp_position\n".to_vec());
    let fs = ShaderBinary::new("fs_cubes", ShaderStage::Fragment, ShaderFormat::Cpu, b"vertex_color\n".to_vec());
    SceneSubmission {
        clear: CAPTURE_CLEAR,
        transforms: SceneTransforms::orbit(0, width as f32 / height as f32, backend.caps()),
        vertices: backend.create_vertex_buffer(&CUBE_VERTICES).unwrap(),
        indices: backend.create_index_buffer(&CUBE_INDICES).unwrap(),
        program: backend.create_program(&vs, &fs).unwrap(),
    }
}

fn config(dir: &Path, policy: ReadbackPolicy) -> CaptureConfig {
    CaptureConfig {
        out_dir: dir.to_path_buf(),
        policy,
        ..CaptureConfig::default()
    }
}

#[test]
fn capture_shows_clear_colour_and_cube_after_second_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = SoftwareBackend::new(64, 48);
    let scene = cube_scene(&mut backend, 64, 48);
    let mut pipeline = CapturePipeline::new(config(dir.path(), ReadbackPolicy::Settle));

    let mut capture = pipeline.begin_capture(&mut backend, 64, 48, TextureFormat::Rgba8).unwrap();
    pipeline.submit_scene(&mut backend, &mut capture, &scene).unwrap();
    pipeline.request_readback(&mut backend, &mut capture).unwrap();

    // Nothing has executed the blit yet.
    assert!(!pipeline.poll_readback(&mut backend, &mut capture).unwrap());
    assert_eq!(capture.stage(), CaptureStage::PixelsStale);
    assert!(pipeline.pixels().as_bytes().iter().all(|&b| b == 0));

    backend.frame().unwrap();
    assert!(pipeline.poll_readback(&mut backend, &mut capture).unwrap());
    assert_eq!(pipeline.pixels().state(), PixelState::Valid { capture: capture.id() });

    let pixels = pipeline.pixels();
    assert_eq!(pixels.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(pixels.pixel(63, 47), Some([255, 0, 0, 255]));
    let centre = pixels.pixel(32, 24).unwrap();
    assert_ne!(centre, [255, 0, 0, 255]);
    assert_eq!(centre[3], 255);

    let path = pipeline.save(&backend, &mut capture).unwrap();
    assert_eq!(path, dir.path().join("output_0.png"));
    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (64, 48));
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(decoded.get_pixel(32, 24).0, centre);

    pipeline.end_capture(&mut backend, capture).unwrap();
}

#[test]
fn repeated_captures_keep_buffer_size_and_release_handles() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = SoftwareBackend::new(32, 32);
    let scene = cube_scene(&mut backend, 32, 32);
    let baseline = backend.live_handles();
    let mut recorder = Recorder::new(config(dir.path(), ReadbackPolicy::Settle));

    for i in 0..4 {
        let path = recorder.record(&mut backend, 32, 32, &scene).unwrap();
        assert_eq!(path, Some(dir.path().join(format!("output_{i}.png"))));
        assert_eq!(recorder.pipeline().pixels().len(), 32 * 32 * 4);
        assert_eq!(backend.live_handles(), baseline);
    }

    let stats = recorder.stats();
    assert_eq!((stats.begun, stats.completed, stats.released), (4, 4, 4));
    for i in 0..4 {
        assert!(dir.path().join(format!("output_{i}.png")).is_file());
    }
    assert!(!dir.path().join("output_4.png").exists());
}

#[test]
fn pipelined_recorder_saves_every_capture_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = SoftwareBackend::new(16, 16);
    let scene = cube_scene(&mut backend, 16, 16);
    let baseline = backend.live_handles();
    let mut recorder = Recorder::new(config(dir.path(), ReadbackPolicy::Pipelined));

    let mut written = Vec::new();
    for _ in 0..3 {
        written.extend(recorder.record(&mut backend, 16, 16, &scene).unwrap());
    }
    assert!(recorder.has_in_flight());
    written.extend(recorder.finish(&mut backend).unwrap());
    assert!(!recorder.has_in_flight());

    let expected: Vec<_> = (0..3).map(|i| dir.path().join(format!("output_{i}.png"))).collect();
    assert_eq!(written, expected);
    assert_eq!(backend.live_handles(), baseline);
}

#[test]
fn resize_changes_capture_resolution_without_leaks() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = SoftwareBackend::new(40, 30);
    let scene = cube_scene(&mut backend, 40, 30);
    let baseline = backend.live_handles();
    let mut recorder = Recorder::new(config(dir.path(), ReadbackPolicy::Settle));

    recorder.record(&mut backend, 40, 30, &scene).unwrap();
    assert_eq!(recorder.pipeline().pixels().len(), 40 * 30 * 4);

    backend.reset(24, 18).unwrap();
    assert_eq!(backend.resolution(), (24, 18));
    let path = recorder.record(&mut backend, 24, 18, &scene).unwrap().unwrap();

    assert_eq!(recorder.pipeline().pixels().len(), 24 * 18 * 4);
    assert_eq!(image::open(&path).unwrap().to_rgba8().dimensions(), (24, 18));
    assert_eq!(backend.live_handles(), baseline);
}

#[test]
fn unsupported_channel_count_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_channels.png");

    let err = encode_and_save(&[0u8; 8], 2, 2, 2, 4, &path).unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedChannels(2)));
    assert!(!path.exists());
}

#[test]
fn rgb_halves_round_trip_through_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("halves.png");
    let (w, h) = (8u32, 4u32);
    let mut data = Vec::new();
    for _ in 0..h {
        for x in 0..w {
            data.extend_from_slice(if x <= w / 2 { &[0, 255, 0] } else { &[255, 0, 0] });
        }
    }

    encode_and_save(&data, w, h, 3, w as usize * 3, &path).unwrap();
    let img = image::open(&path).unwrap().to_rgb8();
    assert_eq!(img.get_pixel(0, 0).0, [0, 255, 0]);
    assert_eq!(img.get_pixel(w - 1, h - 1).0, [255, 0, 0]);
}
