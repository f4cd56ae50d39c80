use glam::{Mat4, Vec3, Vec4};

use crate::backend::shader::{ShaderBinary, ShaderFormat, ShaderStage};
use crate::{CaptureError, Result};

/// Built-in vertex stages. A `.cpu` shader file names one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum VertexKernel {
    /// `clip = mvp * vec4(position, 1)`, colour passed through.
    MvpPosition,
}

/// Built-in fragment stages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum FragmentKernel {
    /// Interpolated vertex colour.
    VertexColor,
    /// Opaque white, ignores the vertex colour.
    Solid,
}

impl VertexKernel {
    #[inline]
    pub fn run(self, mvp: &Mat4, position: Vec3) -> Vec4 {
        match self {
            VertexKernel::MvpPosition => *mvp * position.extend(1.0),
        }
    }
}

impl FragmentKernel {
    #[inline]
    pub fn run(self, color: Vec4) -> Vec4 {
        match self {
            FragmentKernel::VertexColor => color,
            FragmentKernel::Solid => Vec4::ONE,
        }
    }
}

/// A linked vertex + fragment pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Program {
    pub vertex: VertexKernel,
    pub fragment: FragmentKernel,
}

impl Program {
    pub fn link(vs: &ShaderBinary, fs: &ShaderBinary) -> Result<Self> {
        expect_stage(vs, ShaderStage::Vertex)?;
        expect_stage(fs, ShaderStage::Fragment)?;

        let vertex = match vs.text()? {
            "mvp_position" => VertexKernel::MvpPosition,
            other => return Err(invalid(vs, format!("unknown vertex kernel `{other}`"))),
        };
        let fragment = match fs.text()? {
            "vertex_color" => FragmentKernel::VertexColor,
            "solid" => FragmentKernel::Solid,
            other => return Err(invalid(fs, format!("unknown fragment kernel `{other}`"))),
        };

        Ok(Self { vertex, fragment })
    }
}

fn expect_stage(bin: &ShaderBinary, stage: ShaderStage) -> Result<()> {
    if bin.format != ShaderFormat::Cpu {
        return Err(invalid(bin, format!("{:?} binary given to the software backend", bin.format)));
    }
    if bin.stage != stage {
        return Err(invalid(bin, format!("expected {stage:?} stage, got {:?}", bin.stage)));
    }
    Ok(())
}

fn invalid(bin: &ShaderBinary, reason: String) -> CaptureError {
    CaptureError::InvalidShader {
        name: bin.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(name: &str, stage: ShaderStage, body: &str) -> ShaderBinary {
        ShaderBinary::new(name, stage, ShaderFormat::Cpu, body.as_bytes().to_vec())
    }

    #[test]
    fn links_known_kernels() {
        let p = Program::link(
            &cpu("vs_cubes", ShaderStage::Vertex, "mvp_position\n"),
            &cpu("fs_cubes", ShaderStage::Fragment, " vertex_color "),
        )
        .unwrap();
        assert_eq!(p.vertex, VertexKernel::MvpPosition);
        assert_eq!(p.fragment, FragmentKernel::VertexColor);
    }

    #[test]
    fn rejects_unknown_kernel_and_swapped_stages() {
        let vs = cpu("vs", ShaderStage::Vertex, "mvp_position");
        let bad = cpu("fs", ShaderStage::Fragment, "phong");
        assert!(matches!(Program::link(&vs, &bad), Err(CaptureError::InvalidShader { .. })));
        assert!(matches!(Program::link(&vs, &vs), Err(CaptureError::InvalidShader { .. })));
    }

    #[test]
    fn rejects_wgsl_binaries() {
        let vs = ShaderBinary::new("vs", ShaderStage::Vertex, ShaderFormat::Wgsl, b"fn main() {}".to_vec());
        let fs = cpu("fs", ShaderStage::Fragment, "vertex_color");
        assert!(Program::link(&vs, &fs).is_err());
    }
}
