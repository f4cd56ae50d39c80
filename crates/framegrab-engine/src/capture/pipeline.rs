use std::path::PathBuf;

use crate::backend::{
    DrawCall, FrameBufferHandle, Handle, IndexBufferHandle, ProgramHandle, ReadbackTicket, RenderBackend,
    TextureDesc, TextureFlags, TextureFormat, TextureHandle, VertexBufferHandle, ViewClear, ViewId,
};
use crate::coords::ViewRect;
use crate::paint::Rgba8;
use crate::scene::SceneTransforms;
use crate::{CaptureError, Result};

use super::config::CaptureConfig;
use super::encode::encode_and_save;
use super::naming::OutputNamer;
use super::pixels::PixelBuffer;

/// Where a [`Capture`] is in its lifecycle.
///
/// `Idle -> TargetAllocated -> Submitted -> ReadbackRequested -> PixelsStale
/// | PixelsValid -> Saved -> Released`. `Released` is reachable from every
/// stage through [`CapturePipeline::end_capture`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaptureStage {
    Idle,
    TargetAllocated,
    Submitted,
    ReadbackRequested,
    PixelsStale,
    PixelsValid,
    Saved,
    Released,
}

/// Pipeline counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub begun: u64,
    /// Captures saved to disk.
    pub completed: u64,
    pub released: u64,
    /// Polls that found the read-back not yet complete.
    pub stale_polls: u64,
    pub failed_saves: u64,
}

/// Scene drawn into a capture: clear colour, transforms and the geometry to
/// draw with them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SceneSubmission {
    pub clear: Rgba8,
    pub transforms: SceneTransforms,
    pub vertices: VertexBufferHandle,
    pub indices: IndexBufferHandle,
    pub program: ProgramHandle,
}

/// One run of the pipeline. Owns the render target, its frame buffer and the
/// read-back surface until passed to [`CapturePipeline::end_capture`].
#[derive(Debug)]
pub struct Capture {
    id: u64,
    width: u32,
    height: u32,
    view: ViewId,
    target: TextureHandle,
    frame_buffer: FrameBufferHandle,
    readback: Option<TextureHandle>,
    ticket: Option<ReadbackTicket>,
    submitted_frame: Option<u64>,
    stage: CaptureStage,
}

impl Capture {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn stage(&self) -> CaptureStage {
        self.stage
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render_target(&self) -> TextureHandle {
        self.target
    }

    pub fn frame_buffer(&self) -> FrameBufferHandle {
        self.frame_buffer
    }

    pub fn readback_surface(&self) -> Option<TextureHandle> {
        self.readback
    }

    pub fn ticket(&self) -> Option<ReadbackTicket> {
        self.ticket
    }

    /// Frame number returned by the scene submission.
    pub fn submitted_frame(&self) -> Option<u64> {
        self.submitted_frame
    }

    fn require_stage(&self, allowed: &[CaptureStage]) -> Result<()> {
        if allowed.contains(&self.stage) {
            return Ok(());
        }
        Err(CaptureError::OutOfOrder {
            expected: allowed.first().copied().unwrap_or(CaptureStage::Idle),
            found: self.stage,
        })
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if self.stage != CaptureStage::Released {
            log::warn!(
                "capture {} dropped at {:?} without end_capture; its GPU handles leak",
                self.id,
                self.stage
            );
        }
    }
}

/// Off-screen render, read-back and PNG output.
///
/// Holds the reusable [`PixelBuffer`], the output file counter and the
/// statistics. The backend is passed into each call; the pipeline never owns
/// it.
#[derive(Debug)]
pub struct CapturePipeline {
    config: CaptureConfig,
    pixels: PixelBuffer,
    namer: OutputNamer,
    stats: CaptureStats,
    next_id: u64,
    /// Frame buffer this pipeline last bound, and where.
    bound: Option<(ViewId, FrameBufferHandle)>,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig) -> Self {
        let namer = OutputNamer::new(config.out_dir.clone(), config.file_prefix.clone());
        Self {
            config,
            pixels: PixelBuffer::new(),
            namer,
            stats: CaptureStats::default(),
            next_id: 0,
            bound: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn namer(&self) -> &OutputNamer {
        &self.namer
    }

    /// Allocates the render target and its frame buffer and binds it to the
    /// configured view.
    ///
    /// On failure nothing allocated by the call is left behind.
    pub fn begin_capture<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Capture> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "capture extent {width}x{height} must be positive"
            )));
        }
        if format != TextureFormat::Rgba8 {
            return Err(CaptureError::InvalidArgument(format!(
                "capture format {format:?} unsupported, expected Rgba8"
            )));
        }

        let flags = TextureFlags::RENDER_TARGET | TextureFlags::MSAA | TextureFlags::SAMPLER_CLAMP;
        let target = backend.create_texture_2d(TextureDesc::new(width, height, format, flags))?;

        let frame_buffer = match backend.create_frame_buffer(target) {
            Ok(fb) => fb,
            Err(e) => {
                release_quietly(backend, &[Handle::from(target)]);
                return Err(e);
            }
        };

        let view = self.config.view;
        if let Err(e) = backend.set_view_frame_buffer(view, Some(frame_buffer)) {
            release_quietly(backend, &[Handle::from(frame_buffer), Handle::from(target)]);
            return Err(e);
        }
        self.bound = Some((view, frame_buffer));

        let id = self.next_id;
        self.next_id += 1;
        self.stats.begun += 1;
        self.pixels.ensure_size(width, height);
        log::debug!("capture {id}: allocated {width}x{height} target on view {view}");

        Ok(Capture {
            id,
            width,
            height,
            view,
            target,
            frame_buffer,
            readback: None,
            ticket: None,
            submitted_frame: None,
            stage: CaptureStage::TargetAllocated,
        })
    }

    /// Draws the scene into the capture's target and advances one frame.
    /// Returns the completed frame number.
    pub fn submit_scene<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        capture: &mut Capture,
        scene: &SceneSubmission,
    ) -> Result<u64> {
        capture.require_stage(&[CaptureStage::TargetAllocated])?;
        let view = capture.view;

        backend.set_view_clear(view, ViewClear::color_depth(scene.clear));
        backend.set_view_rect(view, ViewRect::new(0, 0, capture.width, capture.height));
        // Clears the target even if the draw below ends up culled.
        backend.touch(view);
        backend.set_view_transform(view, scene.transforms.view, scene.transforms.proj);
        backend.submit(
            view,
            &DrawCall {
                program: scene.program,
                vertices: scene.vertices,
                indices: scene.indices,
                transform: scene.transforms.model,
            },
        )?;

        let frame = backend.frame()?;
        capture.submitted_frame = Some(frame);
        capture.stage = CaptureStage::Submitted;
        log::debug!("capture {}: scene submitted in frame {frame}", capture.id);
        Ok(frame)
    }

    /// Allocates the read-back surface, blits the target into it and schedules
    /// the read-back. The pixels become valid after one more frame.
    pub fn request_readback<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        capture: &mut Capture,
    ) -> Result<ReadbackTicket> {
        capture.require_stage(&[CaptureStage::Submitted])?;

        let flags = TextureFlags::BLIT_DST
            | TextureFlags::READ_BACK
            | TextureFlags::SAMPLER_POINT
            | TextureFlags::SAMPLER_CLAMP;
        let surface = backend.create_texture_2d(TextureDesc::new(
            capture.width,
            capture.height,
            TextureFormat::Rgba8,
            flags,
        ))?;
        capture.readback = Some(surface);

        backend.blit(capture.view, surface, capture.target)?;
        let ticket = backend.read_texture(surface)?;

        capture.ticket = Some(ticket);
        capture.stage = CaptureStage::ReadbackRequested;
        self.pixels.mark_stale(capture.id);
        log::debug!(
            "capture {}: read-back requested, ready with frame {}",
            capture.id,
            ticket.ready_frame
        );
        Ok(ticket)
    }

    /// Copies the read-back into the pixel buffer if the backend has completed
    /// the frame it needs. Returns `false` and marks the capture stale otherwise.
    pub fn poll_readback<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        capture: &mut Capture,
    ) -> Result<bool> {
        capture.require_stage(&[
            CaptureStage::ReadbackRequested,
            CaptureStage::PixelsStale,
            CaptureStage::PixelsValid,
        ])?;
        if capture.stage == CaptureStage::PixelsValid {
            return Ok(true);
        }
        let Some(ticket) = capture.ticket else {
            return Err(CaptureError::OutOfOrder {
                expected: CaptureStage::ReadbackRequested,
                found: capture.stage,
            });
        };

        let completed = backend.frame_number();
        let taken = ticket.is_ready(completed) && {
            self.pixels.ensure_size(capture.width, capture.height);
            backend.take_readback(ticket, self.pixels.as_mut_bytes())?
        };

        if !taken {
            self.stats.stale_polls += 1;
            capture.stage = CaptureStage::PixelsStale;
            self.pixels.mark_stale(capture.id);
            log::debug!(
                "capture {}: pixels stale (frame {completed}, ready at {})",
                capture.id,
                ticket.ready_frame
            );
            return Ok(false);
        }

        capture.stage = CaptureStage::PixelsValid;
        self.pixels.mark_valid(capture.id);
        log::debug!("capture {}: pixels valid at frame {completed}", capture.id);
        Ok(true)
    }

    /// Advances empty frames until the read-back is complete. Returns how many
    /// frames were advanced.
    ///
    /// Gives up with `StaleData` after `max_settle_frames`.
    pub fn await_pixels<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        capture: &mut Capture,
    ) -> Result<u32> {
        let mut advanced = 0;
        loop {
            if self.poll_readback(backend, capture)? {
                return Ok(advanced);
            }
            if advanced >= self.config.max_settle_frames {
                return Err(CaptureError::StaleData {
                    ready_frame: capture.ticket.map_or(0, |t| t.ready_frame),
                    completed_frame: backend.frame_number(),
                });
            }
            backend.frame()?;
            advanced += 1;
        }
    }

    /// Writes the capture's pixels to the next output file.
    ///
    /// Stale pixels are refused with `StaleData`. The file index only advances
    /// on success.
    pub fn save<B: RenderBackend + ?Sized>(&mut self, backend: &B, capture: &mut Capture) -> Result<PathBuf> {
        match capture.stage {
            CaptureStage::PixelsValid if self.pixels.is_valid_for(capture.id) => {}
            CaptureStage::ReadbackRequested | CaptureStage::PixelsStale | CaptureStage::PixelsValid => {
                return Err(CaptureError::StaleData {
                    ready_frame: capture.ticket.map_or(0, |t| t.ready_frame),
                    completed_frame: backend.frame_number(),
                });
            }
            found => {
                return Err(CaptureError::OutOfOrder {
                    expected: CaptureStage::PixelsValid,
                    found,
                })
            }
        }

        let path = self.namer.peek();
        let result = encode_and_save(
            self.pixels.as_bytes(),
            capture.width,
            capture.height,
            PixelBuffer::CHANNELS,
            self.pixels.stride(),
            &path,
        );

        match result {
            Ok(()) => {
                self.namer.advance();
                self.stats.completed += 1;
                capture.stage = CaptureStage::Saved;
                log::info!("capture {}: saved {}", capture.id, path.display());
                Ok(path)
            }
            Err(e) => {
                self.stats.failed_saves += 1;
                log::error!("capture {}: {e}", capture.id);
                Err(e)
            }
        }
    }

    /// Destroys the capture's target, frame buffer and read-back surface and
    /// unbinds the view if this capture still owns it.
    ///
    /// Every handle is released even if one of the destroys fails; the first
    /// error is returned.
    pub fn end_capture<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        mut capture: Capture,
    ) -> Result<()> {
        let mut first_err = None;

        if self.bound == Some((capture.view, capture.frame_buffer)) {
            if let Err(e) = backend.set_view_frame_buffer(capture.view, None) {
                first_err.get_or_insert(e);
            }
            self.bound = None;
        }

        // A ticket that was never taken would keep its pixels in the backend.
        if let Some(ticket) = capture.ticket.take() {
            backend.discard_readback(ticket);
        }

        let handles = capture
            .readback
            .map(Handle::from)
            .into_iter()
            .chain([Handle::from(capture.frame_buffer), Handle::from(capture.target)]);
        for handle in handles {
            if let Err(e) = backend.destroy(handle) {
                first_err.get_or_insert(e);
            }
        }

        log::debug!("capture {}: released at {:?}", capture.id, capture.stage);
        capture.stage = CaptureStage::Released;
        self.stats.released += 1;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn release_quietly<B: RenderBackend + ?Sized>(backend: &mut B, handles: &[Handle]) {
    for &h in handles {
        if let Err(e) = backend.destroy(h) {
            log::warn!("cleanup of {h:?} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendLimits, ShaderBinary, ShaderFormat, ShaderStage, SoftwareBackend};
    use crate::scene::{CAPTURE_CLEAR, CUBE_INDICES, CUBE_VERTICES};

    struct Fixture {
        backend: SoftwareBackend,
        scene: SceneSubmission,
        _dir: tempfile::TempDir,
        pipeline: CapturePipeline,
    }

    fn fixture(width: u32, height: u32) -> Fixture {
        let mut backend = SoftwareBackend::new(width, height);
        let vs = ShaderBinary::new("vs", ShaderStage::Vertex, ShaderFormat::Cpu, b"mvp_position".to_vec());
        let fs = ShaderBinary::new("fs", ShaderStage::Fragment, ShaderFormat::Cpu, b"vertex_color".to_vec());
        let program = backend.create_program(&vs, &fs).unwrap();
        let vertices = backend.create_vertex_buffer(&CUBE_VERTICES).unwrap();
        let indices = backend.create_index_buffer(&CUBE_INDICES).unwrap();

        let scene = SceneSubmission {
            clear: CAPTURE_CLEAR,
            transforms: SceneTransforms::orbit(0, width as f32 / height as f32, backend.caps()),
            vertices,
            indices,
            program,
        };

        let dir = tempfile::tempdir().unwrap();
        let pipeline = CapturePipeline::new(CaptureConfig {
            out_dir: dir.path().to_path_buf(),
            ..CaptureConfig::default()
        });
        Fixture { backend, scene, _dir: dir, pipeline }
    }

    #[test]
    fn begin_end_releases_all_handles() {
        let mut f = fixture(32, 32);
        let baseline = f.backend.live_handles();

        let capture = f.pipeline.begin_capture(&mut f.backend, 32, 32, TextureFormat::Rgba8).unwrap();
        assert_eq!(f.backend.live_handles(), baseline + 2);
        f.pipeline.end_capture(&mut f.backend, capture).unwrap();
        assert_eq!(f.backend.live_handles(), baseline);
        assert_eq!(f.pipeline.stats().released, 1);
    }

    #[test]
    fn begin_rejects_bad_arguments() {
        let mut f = fixture(8, 8);
        assert!(matches!(
            f.pipeline.begin_capture(&mut f.backend, 0, 8, TextureFormat::Rgba8),
            Err(CaptureError::InvalidArgument(_))
        ));
        assert!(matches!(
            f.pipeline.begin_capture(&mut f.backend, 8, 8, TextureFormat::Bgra8),
            Err(CaptureError::InvalidArgument(_))
        ));
        assert_eq!(f.pipeline.stats().begun, 0);
    }

    #[test]
    fn exhaustion_leaves_nothing_behind() {
        let limits = BackendLimits { max_frame_buffers: 0, ..BackendLimits::default() };
        let mut backend = SoftwareBackend::with_limits(8, 8, limits);
        let mut pipeline = CapturePipeline::new(CaptureConfig::default());

        let err = pipeline.begin_capture(&mut backend, 8, 8, TextureFormat::Rgba8).unwrap_err();
        assert!(matches!(err, CaptureError::ResourceExhausted { kind: "frame buffer", .. }));
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn operations_out_of_order_are_rejected() {
        let mut f = fixture(8, 8);
        let mut capture = f.pipeline.begin_capture(&mut f.backend, 8, 8, TextureFormat::Rgba8).unwrap();

        assert!(matches!(
            f.pipeline.request_readback(&mut f.backend, &mut capture),
            Err(CaptureError::OutOfOrder { expected: CaptureStage::Submitted, found: CaptureStage::TargetAllocated })
        ));
        assert!(matches!(
            f.pipeline.save(&f.backend, &mut capture),
            Err(CaptureError::OutOfOrder { .. })
        ));
        f.pipeline.end_capture(&mut f.backend, capture).unwrap();
    }

    #[test]
    fn pixels_are_stale_until_second_frame() {
        let mut f = fixture(16, 16);
        let mut capture = f.pipeline.begin_capture(&mut f.backend, 16, 16, TextureFormat::Rgba8).unwrap();
        f.pipeline.submit_scene(&mut f.backend, &mut capture, &f.scene).unwrap();
        f.pipeline.request_readback(&mut f.backend, &mut capture).unwrap();

        assert!(!f.pipeline.poll_readback(&mut f.backend, &mut capture).unwrap());
        assert_eq!(capture.stage(), CaptureStage::PixelsStale);
        assert!(f.pipeline.pixels().as_bytes().iter().all(|&b| b == 0));
        assert!(matches!(f.pipeline.save(&f.backend, &mut capture), Err(CaptureError::StaleData { .. })));

        assert_eq!(f.pipeline.await_pixels(&mut f.backend, &mut capture).unwrap(), 1);
        assert_eq!(capture.stage(), CaptureStage::PixelsValid);
        assert_eq!(f.pipeline.pixels().pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(f.pipeline.stats().stale_polls, 2);

        f.pipeline.end_capture(&mut f.backend, capture).unwrap();
    }

    #[test]
    fn released_captures_leave_no_readback_data() {
        let mut f = fixture(16, 16);
        let baseline = f.backend.live_handles();

        // Released before the read-back ran.
        let mut capture = f.pipeline.begin_capture(&mut f.backend, 16, 16, TextureFormat::Rgba8).unwrap();
        f.pipeline.submit_scene(&mut f.backend, &mut capture, &f.scene).unwrap();
        f.pipeline.request_readback(&mut f.backend, &mut capture).unwrap();
        f.pipeline.end_capture(&mut f.backend, capture).unwrap();
        f.backend.frame().unwrap();
        assert_eq!(f.backend.pending_readbacks(), 0);

        // Released after the read-back completed but before it was polled.
        let mut capture = f.pipeline.begin_capture(&mut f.backend, 16, 16, TextureFormat::Rgba8).unwrap();
        f.pipeline.submit_scene(&mut f.backend, &mut capture, &f.scene).unwrap();
        f.pipeline.request_readback(&mut f.backend, &mut capture).unwrap();
        f.backend.frame().unwrap();
        assert_eq!(f.backend.pending_readbacks(), 1);
        f.pipeline.end_capture(&mut f.backend, capture).unwrap();
        f.backend.frame().unwrap();

        assert_eq!(f.backend.pending_readbacks(), 0);
        assert_eq!(f.backend.live_handles(), baseline);
    }

    #[test]
    fn stale_save_reports_backend_frame() {
        let mut f = fixture(8, 8);
        let mut first = f.pipeline.begin_capture(&mut f.backend, 8, 8, TextureFormat::Rgba8).unwrap();
        f.pipeline.submit_scene(&mut f.backend, &mut first, &f.scene).unwrap();
        f.pipeline.request_readback(&mut f.backend, &mut first).unwrap();
        f.pipeline.await_pixels(&mut f.backend, &mut first).unwrap();

        // A second capture reuses the pixel buffer.
        let mut second = f.pipeline.begin_capture(&mut f.backend, 8, 8, TextureFormat::Rgba8).unwrap();
        f.pipeline.submit_scene(&mut f.backend, &mut second, &f.scene).unwrap();
        f.pipeline.request_readback(&mut f.backend, &mut second).unwrap();
        f.pipeline.await_pixels(&mut f.backend, &mut second).unwrap();
        assert_eq!(f.backend.frame_number(), 4);

        assert!(matches!(
            f.pipeline.save(&f.backend, &mut first),
            Err(CaptureError::StaleData { ready_frame: 2, completed_frame: 4 })
        ));
        f.pipeline.end_capture(&mut f.backend, first).unwrap();
        f.pipeline.end_capture(&mut f.backend, second).unwrap();
    }

    #[test]
    fn await_gives_up_after_bound() {
        let mut f = fixture(8, 8);
        f.pipeline.config.max_settle_frames = 0;
        let mut capture = f.pipeline.begin_capture(&mut f.backend, 8, 8, TextureFormat::Rgba8).unwrap();
        f.pipeline.submit_scene(&mut f.backend, &mut capture, &f.scene).unwrap();
        f.pipeline.request_readback(&mut f.backend, &mut capture).unwrap();

        assert!(matches!(
            f.pipeline.await_pixels(&mut f.backend, &mut capture),
            Err(CaptureError::StaleData { ready_frame: 2, completed_frame: 1 })
        ));
        f.pipeline.end_capture(&mut f.backend, capture).unwrap();
    }

    #[test]
    fn save_writes_sequential_files() {
        let mut f = fixture(8, 8);
        for expected in 0..2 {
            let mut capture = f.pipeline.begin_capture(&mut f.backend, 8, 8, TextureFormat::Rgba8).unwrap();
            f.pipeline.submit_scene(&mut f.backend, &mut capture, &f.scene).unwrap();
            f.pipeline.request_readback(&mut f.backend, &mut capture).unwrap();
            f.pipeline.await_pixels(&mut f.backend, &mut capture).unwrap();
            let path = f.pipeline.save(&f.backend, &mut capture).unwrap();
            assert!(path.ends_with(format!("output_{expected}.png")));
            assert!(path.exists());
            assert_eq!(capture.stage(), CaptureStage::Saved);
            f.pipeline.end_capture(&mut f.backend, capture).unwrap();
        }
        assert_eq!(f.pipeline.stats().completed, 2);
        assert_eq!(f.pipeline.namer().next_index(), 2);
    }

    #[test]
    fn failed_save_does_not_consume_index() {
        let mut backend = SoftwareBackend::new(8, 8);
        let vs = ShaderBinary::new("vs", ShaderStage::Vertex, ShaderFormat::Cpu, b"mvp_position".to_vec());
        let fs = ShaderBinary::new("fs", ShaderStage::Fragment, ShaderFormat::Cpu, b"solid".to_vec());
        let program = backend.create_program(&vs, &fs).unwrap();
        let scene = SceneSubmission {
            clear: CAPTURE_CLEAR,
            transforms: SceneTransforms::orbit(0, 1.0, backend.caps()),
            vertices: backend.create_vertex_buffer(&CUBE_VERTICES).unwrap(),
            indices: backend.create_index_buffer(&CUBE_INDICES).unwrap(),
            program,
        };
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = CapturePipeline::new(CaptureConfig {
            out_dir: dir.path().join("does-not-exist"),
            ..CaptureConfig::default()
        });

        let mut capture = pipeline.begin_capture(&mut backend, 8, 8, TextureFormat::Rgba8).unwrap();
        pipeline.submit_scene(&mut backend, &mut capture, &scene).unwrap();
        pipeline.request_readback(&mut backend, &mut capture).unwrap();
        pipeline.await_pixels(&mut backend, &mut capture).unwrap();

        let err = pipeline.save(&backend, &mut capture).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(pipeline.stats().failed_saves, 1);
        assert_eq!(pipeline.namer().next_index(), 0);
        assert_eq!(capture.stage(), CaptureStage::PixelsValid);

        pipeline.end_capture(&mut backend, capture).unwrap();
        assert_eq!(backend.live_handles(), 3);
    }
}
