use glam::{Mat4, Vec3};

use crate::backend::Caps;

/// View, projection and model matrices for one draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SceneTransforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub model: Mat4,
}

impl SceneTransforms {
    pub const EYE: Vec3 = Vec3::new(0.0, 0.0, -5.0);
    pub const FOV_Y_DEGREES: f32 = 60.0;
    pub const NEAR: f32 = 0.1;
    pub const FAR: f32 = 100.0;

    /// Rotation per frame, radians, about X and Y.
    pub const SPIN_PER_FRAME: f32 = 0.01;

    /// Camera at [`Self::EYE`] looking at the origin, cube spun by `frame`.
    pub fn orbit(frame: u64, aspect: f32, caps: Caps) -> Self {
        let angle = frame as f32 * Self::SPIN_PER_FRAME;
        Self {
            view: Mat4::look_at_lh(Self::EYE, Vec3::ZERO, Vec3::Y),
            proj: projection(aspect, caps.homogeneous_depth),
            model: Mat4::from_rotation_y(angle) * Mat4::from_rotation_x(angle),
        }
    }

    /// Clip-space transform `proj * view * model`.
    #[inline]
    pub fn mvp(&self) -> Mat4 {
        self.proj * self.view * self.model
    }
}

/// Left-handed perspective. `homogeneous_depth` maps depth to `[-1, 1]`
/// (GL convention) instead of `[0, 1]`.
fn projection(aspect: f32, homogeneous_depth: bool) -> Mat4 {
    let proj = Mat4::perspective_lh(
        SceneTransforms::FOV_Y_DEGREES.to_radians(),
        aspect.max(f32::EPSILON),
        SceneTransforms::NEAR,
        SceneTransforms::FAR,
    );

    if !homogeneous_depth {
        return proj;
    }

    // z' = 2z - w
    let remap = Mat4::from_cols_array(&[
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 2.0, 0.0, //
        0.0, 0.0, -1.0, 1.0,
    ]);
    remap * proj
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn caps(homogeneous_depth: bool) -> Caps {
        Caps { homogeneous_depth, ..Caps::default() }
    }

    #[test]
    fn origin_projects_to_screen_centre() {
        let t = SceneTransforms::orbit(0, 4.0 / 3.0, caps(false));
        let clip = t.mvp() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn homogeneous_depth_spans_minus_one_to_one() {
        let d3d = SceneTransforms::orbit(0, 1.0, caps(false));
        let gl = SceneTransforms::orbit(0, 1.0, caps(true));
        let near = Vec4::new(0.0, 0.0, SceneTransforms::EYE.z + SceneTransforms::NEAR, 1.0);

        let z_d3d = d3d.proj * d3d.view * near;
        let z_gl = gl.proj * gl.view * near;
        assert!((z_d3d.z / z_d3d.w).abs() < 1e-4);
        assert!((z_gl.z / z_gl.w + 1.0).abs() < 1e-4);
    }

    #[test]
    fn frame_zero_has_identity_model() {
        let t = SceneTransforms::orbit(0, 1.0, caps(false));
        assert_eq!(t.model, Mat4::IDENTITY);
        assert_ne!(SceneTransforms::orbit(10, 1.0, caps(false)).model, Mat4::IDENTITY);
    }
}
