use std::path::{Path, PathBuf};

use crate::{CaptureError, Result};

use super::types::BackendKind;

/// Encoding of a shader binary on disk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderFormat {
    /// WGSL source, compiled by the wgpu backend.
    Wgsl,
    /// Name of a built-in kernel of the software rasterizer.
    Cpu,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// A shader as loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinary {
    pub name: String,
    pub stage: ShaderStage,
    pub format: ShaderFormat,
    pub bytes: Vec<u8>,
}

impl ShaderBinary {
    pub fn new(name: impl Into<String>, stage: ShaderStage, format: ShaderFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            stage,
            format,
            bytes,
        }
    }

    /// Contents as UTF-8 text, trimmed.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map(str::trim)
            .map_err(|e| CaptureError::InvalidShader {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

struct ShaderDir {
    dir: &'static str,
    ext: &'static str,
    format: ShaderFormat,
}

/// Backend to shader sub-directory table. Every wgpu backend consumes WGSL.
const SHADER_DIRS: &[(BackendKind, ShaderDir)] = &[
    (BackendKind::Vulkan, ShaderDir { dir: "wgsl", ext: "wgsl", format: ShaderFormat::Wgsl }),
    (BackendKind::Dx12, ShaderDir { dir: "wgsl", ext: "wgsl", format: ShaderFormat::Wgsl }),
    (BackendKind::Metal, ShaderDir { dir: "wgsl", ext: "wgsl", format: ShaderFormat::Wgsl }),
    (BackendKind::Gl, ShaderDir { dir: "wgsl", ext: "wgsl", format: ShaderFormat::Wgsl }),
    (BackendKind::Software, ShaderDir { dir: "cpu", ext: "cpu", format: ShaderFormat::Cpu }),
];

fn shader_dir(kind: BackendKind) -> &'static ShaderDir {
    SHADER_DIRS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, d)| d)
        // Every BackendKind has a row.
        .unwrap_or(&SHADER_DIRS[0].1)
}

/// Loads shader binaries from `<root>/<dir>/<name>.<ext>`.
#[derive(Debug, Clone)]
pub struct ShaderLoader {
    root: PathBuf,
}

impl ShaderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a shader resolves to for `kind`.
    pub fn path_for(&self, kind: BackendKind, name: &str) -> PathBuf {
        let d = shader_dir(kind);
        self.root.join(d.dir).join(format!("{name}.{}", d.ext))
    }

    pub fn load(&self, kind: BackendKind, name: &str, stage: ShaderStage) -> Result<ShaderBinary> {
        let path = self.path_for(kind, name);
        let bytes = std::fs::read(&path).map_err(|source| CaptureError::MissingAsset {
            path: path.clone(),
            source,
        })?;
        log::debug!("loaded shader {} ({} bytes)", path.display(), bytes.len());
        Ok(ShaderBinary::new(name, stage, shader_dir(kind).format, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_backend_has_a_directory() {
        for kind in [
            BackendKind::Vulkan,
            BackendKind::Dx12,
            BackendKind::Metal,
            BackendKind::Gl,
            BackendKind::Software,
        ] {
            assert!(SHADER_DIRS.iter().any(|(k, _)| *k == kind), "{kind:?}");
        }
    }

    #[test]
    fn resolves_paths_per_backend() {
        let loader = ShaderLoader::new("/shaders");
        assert_eq!(
            loader.path_for(BackendKind::Vulkan, "vs_cubes"),
            PathBuf::from("/shaders/wgsl/vs_cubes.wgsl")
        );
        assert_eq!(
            loader.path_for(BackendKind::Software, "fs_cubes"),
            PathBuf::from("/shaders/cpu/fs_cubes.cpu")
        );
    }

    #[test]
    fn missing_file_is_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ShaderLoader::new(dir.path());
        let err = loader
            .load(BackendKind::Software, "vs_cubes", ShaderStage::Vertex)
            .unwrap_err();
        assert!(matches!(err, CaptureError::MissingAsset { .. }));
    }

    #[test]
    fn loads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("cpu")).unwrap();
        std::fs::write(dir.path().join("cpu/vs_cubes.cpu"), "mvp_position\n").unwrap();

        let loader = ShaderLoader::new(dir.path());
        let bin = loader
            .load(BackendKind::Software, "vs_cubes", ShaderStage::Vertex)
            .unwrap();
        assert_eq!(bin.format, ShaderFormat::Cpu);
        assert_eq!(bin.text().unwrap(), "mvp_position");
    }
}
