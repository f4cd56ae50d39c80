//! Shared pieces of the demo programs: the cube scene and environment
//! settings.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use framegrab_engine::backend::{
    Caps, DrawCall, Handle, IndexBufferHandle, ProgramHandle, RenderBackend, ShaderLoader, ShaderStage,
    VertexBufferHandle, ViewClear, ViewId,
};
use framegrab_engine::capture::{CaptureConfig, ReadbackPolicy, SceneSubmission};
use framegrab_engine::coords::ViewportState;
use framegrab_engine::paint::Rgba8;
use framegrab_engine::scene::{PosColorVertex, SceneTransforms, CUBE_INDICES, CUBE_VERTICES};

/// Shader pair every demo draws with.
pub const VS_NAME: &str = "vs_cubes";
pub const FS_NAME: &str = "fs_cubes";

/// Which renderer the headless demo uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Wgpu,
    Software,
}

/// Demo settings read from `FRAMEGRAB_*` environment variables.
#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub backend: BackendChoice,
    /// Captures taken by the headless demo.
    pub frames: u64,
    pub out_dir: PathBuf,
    pub shader_root: PathBuf,
    pub policy: ReadbackPolicy,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Wgpu,
            frames: 8,
            out_dir: PathBuf::from("."),
            shader_root: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders")),
            policy: ReadbackPolicy::Settle,
        }
    }
}

impl DemoSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut s = Self::default();

        if let Some(v) = lookup("FRAMEGRAB_BACKEND") {
            s.backend = match v.trim().to_ascii_lowercase().as_str() {
                "wgpu" | "gpu" => BackendChoice::Wgpu,
                "software" | "cpu" => BackendChoice::Software,
                other => bail!("FRAMEGRAB_BACKEND: unknown backend `{other}`"),
            };
        }
        if let Some(v) = lookup("FRAMEGRAB_FRAMES") {
            s.frames = v
                .trim()
                .parse()
                .with_context(|| format!("FRAMEGRAB_FRAMES: `{v}` is not a frame count"))?;
        }
        if let Some(v) = lookup("FRAMEGRAB_OUT_DIR") {
            s.out_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FRAMEGRAB_SHADERS") {
            s.shader_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("FRAMEGRAB_POLICY") {
            s.policy = ReadbackPolicy::parse(&v)
                .with_context(|| format!("FRAMEGRAB_POLICY: expected settle or pipelined, got `{v}`"))?;
        }
        Ok(s)
    }

    pub fn capture_config(&self, view: ViewId) -> CaptureConfig {
        CaptureConfig {
            out_dir: self.out_dir.clone(),
            policy: self.policy,
            view,
            ..CaptureConfig::default()
        }
    }

    pub fn shader_loader(&self) -> ShaderLoader {
        ShaderLoader::new(&self.shader_root)
    }
}

/// Tightly packed RGB rows: green up to and including column `width / 2`,
/// red after it.
pub fn green_red_halves(width: u32, height: u32) -> Vec<u8> {
    const GREEN: [u8; 3] = [0, 255, 0];
    const RED: [u8; 3] = [255, 0, 0];

    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for _ in 0..height {
        for x in 0..width {
            data.extend_from_slice(if x <= width / 2 { &GREEN } else { &RED });
        }
    }
    data
}

/// GPU resources of the cube: program, vertex and index buffers.
#[derive(Debug, Copy, Clone)]
pub struct CubeScene {
    pub program: ProgramHandle,
    pub vertices: VertexBufferHandle,
    pub indices: IndexBufferHandle,
    /// Vertices live in a dynamic buffer.
    pub dynamic: bool,
}

impl CubeScene {
    /// Loads the shaders for `backend` and uploads the cube.
    pub fn create<B: RenderBackend + ?Sized>(
        backend: &mut B,
        loader: &ShaderLoader,
        dynamic: bool,
    ) -> Result<Self> {
        let kind = backend.kind();
        let vs = loader
            .load(kind, VS_NAME, ShaderStage::Vertex)
            .context("loading vertex shader")?;
        let fs = loader
            .load(kind, FS_NAME, ShaderStage::Fragment)
            .context("loading fragment shader")?;
        let program = backend.create_program(&vs, &fs)?;

        let vertices = if dynamic {
            let vb = backend.create_dynamic_vertex_buffer(CUBE_VERTICES.len())?;
            backend.update_dynamic_vertex_buffer(vb, 0, &CUBE_VERTICES)?;
            vb
        } else {
            backend.create_vertex_buffer(&CUBE_VERTICES)?
        };
        let indices = backend.create_index_buffer(&CUBE_INDICES)?;

        log::info!("cube scene ready on {kind:?} (dynamic: {dynamic})");
        Ok(Self {
            program,
            vertices,
            indices,
            dynamic,
        })
    }

    /// Overwrites the cube's vertices. Only valid for dynamic scenes.
    pub fn update<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        vertices: &[PosColorVertex],
    ) -> Result<()> {
        backend.update_dynamic_vertex_buffer(self.vertices, 0, vertices)?;
        Ok(())
    }

    /// What a capture of frame `frame` draws.
    pub fn submission(&self, frame: u64, aspect: f32, caps: Caps, clear: Rgba8) -> SceneSubmission {
        SceneSubmission {
            clear,
            transforms: SceneTransforms::orbit(frame, aspect, caps),
            vertices: self.vertices,
            indices: self.indices,
            program: self.program,
        }
    }

    /// Encodes the cube on `view`, targeting the back buffer. Does not advance
    /// the frame.
    pub fn draw_to_screen<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        view: ViewId,
        viewport: &ViewportState,
        frame: u64,
        clear: Rgba8,
    ) -> Result<()> {
        let t = SceneTransforms::orbit(frame, viewport.aspect(), backend.caps());
        backend.set_view_frame_buffer(view, None)?;
        backend.set_view_clear(view, ViewClear::color_depth(clear));
        backend.set_view_rect(view, viewport.rect());
        backend.set_view_transform(view, t.view, t.proj);
        backend.touch(view);
        backend.submit(
            view,
            &DrawCall {
                program: self.program,
                vertices: self.vertices,
                indices: self.indices,
                transform: t.model,
            },
        )?;
        Ok(())
    }

    /// Releases all three handles, reporting the first failure.
    pub fn destroy<B: RenderBackend + ?Sized>(self, backend: &mut B) -> Result<()> {
        let results = [
            backend.destroy(Handle::from(self.indices)),
            backend.destroy(Handle::from(self.vertices)),
            backend.destroy(Handle::from(self.program)),
        ];
        for r in results {
            r?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use framegrab_engine::backend::SoftwareBackend;
    use framegrab_engine::capture::{encode_and_save, Recorder};
    use framegrab_engine::scene::{CAPTURE_CLEAR, SCREEN_CLEAR};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let s = DemoSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.backend, BackendChoice::Wgpu);
        assert_eq!(s.frames, 8);
        assert_eq!(s.policy, ReadbackPolicy::Settle);
        assert!(s.shader_root.ends_with("shaders"));
    }

    #[test]
    fn variables_override_defaults() {
        let s = DemoSettings::from_lookup(lookup(&[
            ("FRAMEGRAB_BACKEND", "software"),
            ("FRAMEGRAB_FRAMES", "3"),
            ("FRAMEGRAB_OUT_DIR", "/tmp/shots"),
            ("FRAMEGRAB_POLICY", "pipelined"),
        ]))
        .unwrap();
        assert_eq!(s.backend, BackendChoice::Software);
        assert_eq!(s.frames, 3);
        assert_eq!(s.out_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(s.capture_config(0).policy, ReadbackPolicy::Pipelined);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(DemoSettings::from_lookup(lookup(&[("FRAMEGRAB_FRAMES", "many")])).is_err());
        assert!(DemoSettings::from_lookup(lookup(&[("FRAMEGRAB_BACKEND", "dx9")])).is_err());
        assert!(DemoSettings::from_lookup(lookup(&[("FRAMEGRAB_POLICY", "eager")])).is_err());
    }

    #[test]
    fn cube_scene_loads_bundled_cpu_shaders() {
        let settings = DemoSettings::default();
        let mut backend = SoftwareBackend::new(64, 64);
        let scene = CubeScene::create(&mut backend, &settings.shader_loader(), false).unwrap();
        assert_eq!(backend.live_handles(), 3);

        let viewport = ViewportState::new(64, 64);
        scene.draw_to_screen(&mut backend, 0, &viewport, 0, SCREEN_CLEAR).unwrap();
        backend.frame().unwrap();

        // Corner shows the clear colour, centre the cube.
        let bb = backend.back_buffer();
        assert_eq!(&bb[..4], &SCREEN_CLEAR.to_bytes());
        let centre = (32 * 64 + 32) * 4;
        assert_ne!(&bb[centre..centre + 4], &SCREEN_CLEAR.to_bytes());

        scene.destroy(&mut backend).unwrap();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn halves_split_after_middle_column() {
        let data = green_red_halves(800, 2);
        let px = |x: usize| &data[x * 3..x * 3 + 3];
        assert_eq!(data.len(), 800 * 2 * 3);
        assert_eq!(px(0), [0, 255, 0]);
        assert_eq!(px(400), [0, 255, 0]);
        assert_eq!(px(401), [255, 0, 0]);
        assert_eq!(px(799), [255, 0, 0]);
    }

    #[test]
    fn halves_are_written_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap().to_string();
        let s = DemoSettings::from_lookup(lookup(&[("FRAMEGRAB_OUT_DIR", dir_str.as_str())])).unwrap();

        let path = s.out_dir.join("write_png.png");
        encode_and_save(&green_red_halves(16, 4), 16, 4, 3, 16 * 3, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn recorder_saves_cube_captures_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap().to_string();
        let s = DemoSettings::from_lookup(lookup(&[
            ("FRAMEGRAB_OUT_DIR", dir_str.as_str()),
            ("FRAMEGRAB_POLICY", "settle"),
        ]))
        .unwrap();

        let mut backend = SoftwareBackend::new(32, 32);
        let scene = CubeScene::create(&mut backend, &s.shader_loader(), false).unwrap();
        let mut recorder = Recorder::new(s.capture_config(0));

        let submission = scene.submission(0, 1.0, backend.caps(), CAPTURE_CLEAR);
        let path = recorder.record(&mut backend, 32, 32, &submission).unwrap().unwrap();
        assert_eq!(path, dir.path().join("output_0.png"));
        assert!(path.exists());

        scene.destroy(&mut backend).unwrap();
        assert_eq!(backend.live_handles(), 0);
        assert_eq!(backend.pending_readbacks(), 0);
    }
}
