use std::path::PathBuf;

use crate::backend::{RenderBackend, TextureFormat};
use crate::Result;

use super::config::{CaptureConfig, ReadbackPolicy};
use super::pipeline::{Capture, CapturePipeline, CaptureStats, SceneSubmission};

/// Drives one capture per host loop iteration.
///
/// Save failures are logged and counted, then the loop goes on. Any other
/// error is returned. Every capture is released whatever happens to it.
#[derive(Debug)]
pub struct Recorder {
    pipeline: CapturePipeline,
    in_flight: Option<Capture>,
}

impl Recorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            pipeline: CapturePipeline::new(config),
            in_flight: None,
        }
    }

    pub fn policy(&self) -> ReadbackPolicy {
        self.pipeline.config().policy
    }

    pub fn pipeline(&self) -> &CapturePipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> CaptureStats {
        self.pipeline.stats()
    }

    /// `true` while a pipelined capture waits for its read-back.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Captures `scene` at `width x height`. Returns the file written during
    /// this call, if any.
    ///
    /// Under `Pipelined` the file belongs to the previous call's scene.
    pub fn record<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        scene: &SceneSubmission,
    ) -> Result<Option<PathBuf>> {
        match self.policy() {
            ReadbackPolicy::Settle => self.record_settled(backend, width, height, scene),
            ReadbackPolicy::Pipelined => self.record_pipelined(backend, width, height, scene),
        }
    }

    /// Completes the capture still in flight, if any, with one empty frame.
    pub fn finish<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<Option<PathBuf>> {
        let Some(capture) = self.in_flight.take() else {
            return Ok(None);
        };
        if let Err(e) = backend.frame() {
            self.pipeline.end_capture(backend, capture)?;
            return Err(e);
        }
        self.complete(backend, capture)
    }

    fn record_settled<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        scene: &SceneSubmission,
    ) -> Result<Option<PathBuf>> {
        let mut capture = self
            .pipeline
            .begin_capture(backend, width, height, TextureFormat::Rgba8)?;

        let outcome = (|| {
            self.pipeline.submit_scene(backend, &mut capture, scene)?;
            self.pipeline.request_readback(backend, &mut capture)?;
            self.pipeline.await_pixels(backend, &mut capture)?;
            self.pipeline.save(&*backend, &mut capture)
        })();

        let ended = self.pipeline.end_capture(backend, capture);
        let saved = absorb_save_failure(outcome)?;
        ended?;
        Ok(saved)
    }

    fn record_pipelined<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        scene: &SceneSubmission,
    ) -> Result<Option<PathBuf>> {
        let mut capture = match self
            .pipeline
            .begin_capture(backend, width, height, TextureFormat::Rgba8)
        {
            Ok(c) => c,
            Err(e) => {
                self.release_in_flight(backend);
                return Err(e);
            }
        };

        // This frame also completes the previous capture's read-back.
        let submitted = self.pipeline.submit_scene(backend, &mut capture, scene);

        let saved = match self.in_flight.take() {
            Some(previous) => self.complete(backend, previous),
            None => Ok(None),
        };

        let requested = submitted.and_then(|_| self.pipeline.request_readback(backend, &mut capture));
        match requested {
            Ok(_) => self.in_flight = Some(capture),
            Err(e) => {
                self.pipeline.end_capture(backend, capture)?;
                return Err(e);
            }
        }
        saved
    }

    /// Polls, saves and releases a capture whose read-back has been issued.
    fn complete<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        mut capture: Capture,
    ) -> Result<Option<PathBuf>> {
        let outcome = self
            .pipeline
            .await_pixels(backend, &mut capture)
            .and_then(|_| self.pipeline.save(&*backend, &mut capture));

        let ended = self.pipeline.end_capture(backend, capture);
        let saved = absorb_save_failure(outcome)?;
        ended?;
        Ok(saved)
    }

    fn release_in_flight<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(capture) = self.in_flight.take() {
            if let Err(e) = self.pipeline.end_capture(backend, capture) {
                log::warn!("releasing in-flight capture failed: {e}");
            }
        }
    }
}

fn absorb_save_failure(outcome: Result<PathBuf>) -> Result<Option<PathBuf>> {
    match outcome {
        Ok(path) => Ok(Some(path)),
        // Already logged and counted by the pipeline.
        Err(e) if e.is_recoverable() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ShaderBinary, ShaderFormat, ShaderStage, SoftwareBackend};
    use crate::scene::{SceneTransforms, CAPTURE_CLEAR, CUBE_INDICES, CUBE_VERTICES};

    fn setup(policy: ReadbackPolicy, dir: &std::path::Path) -> (SoftwareBackend, SceneSubmission, Recorder) {
        let mut backend = SoftwareBackend::new(16, 16);
        let vs = ShaderBinary::new("vs", ShaderStage::Vertex, ShaderFormat::Cpu, b"mvp_position".to_vec());
        let fs = ShaderBinary::new("fs", ShaderStage::Fragment, ShaderFormat::Cpu, b"vertex_color".to_vec());
        let scene = SceneSubmission {
            clear: CAPTURE_CLEAR,
            transforms: SceneTransforms::orbit(0, 1.0, backend.caps()),
            program: backend.create_program(&vs, &fs).unwrap(),
            vertices: backend.create_vertex_buffer(&CUBE_VERTICES).unwrap(),
            indices: backend.create_index_buffer(&CUBE_INDICES).unwrap(),
        };
        let recorder = Recorder::new(CaptureConfig {
            out_dir: dir.to_path_buf(),
            policy,
            ..CaptureConfig::default()
        });
        (backend, scene, recorder)
    }

    #[test]
    fn settle_saves_every_iteration_with_two_frames_each() {
        let dir = tempfile::tempdir().unwrap();
        let (mut backend, scene, mut recorder) = setup(ReadbackPolicy::Settle, dir.path());

        for i in 0..3u64 {
            let path = recorder.record(&mut backend, 16, 16, &scene).unwrap().unwrap();
            assert!(path.ends_with(format!("output_{i}.png")));
            assert_eq!(backend.frame_number(), (i + 1) * 2);
        }
        assert_eq!(recorder.finish(&mut backend).unwrap(), None);
        assert_eq!(backend.live_handles(), 3);
        assert_eq!(recorder.stats().completed, 3);
    }

    #[test]
    fn pipelined_saves_previous_capture_with_one_frame_each() {
        let dir = tempfile::tempdir().unwrap();
        let (mut backend, scene, mut recorder) = setup(ReadbackPolicy::Pipelined, dir.path());

        assert_eq!(recorder.record(&mut backend, 16, 16, &scene).unwrap(), None);
        assert!(recorder.has_in_flight());

        let second = recorder.record(&mut backend, 16, 16, &scene).unwrap().unwrap();
        assert!(second.ends_with("output_0.png"));
        assert_eq!(backend.frame_number(), 2);

        let last = recorder.finish(&mut backend).unwrap().unwrap();
        assert!(last.ends_with("output_1.png"));
        assert!(!recorder.has_in_flight());
        assert_eq!(backend.live_handles(), 3);
        assert_eq!(recorder.stats().stale_polls, 0);
    }

    #[test]
    fn save_failure_is_counted_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let (mut backend, scene, mut recorder) = setup(ReadbackPolicy::Settle, &missing);

        assert_eq!(recorder.record(&mut backend, 16, 16, &scene).unwrap(), None);
        assert_eq!(recorder.stats().failed_saves, 1);
        assert_eq!(recorder.stats().released, 1);
        assert_eq!(backend.live_handles(), 3);

        std::fs::create_dir(&missing).unwrap();
        let path = recorder.record(&mut backend, 16, 16, &scene).unwrap().unwrap();
        assert!(path.ends_with("output_0.png"));
    }
}
