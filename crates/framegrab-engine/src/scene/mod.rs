//! Scene data: vertex format, cube geometry and camera transforms.
//!
//! Geometry is plain CPU data; backends upload it through `RenderBackend`.

mod cube;
mod transforms;
mod vertex;

pub use cube::{cube_vertices, CUBE_INDICES, CUBE_VERTICES};
pub use transforms::SceneTransforms;
pub use vertex::PosColorVertex;

use crate::paint::Rgba8;

/// Clear colour of the on-screen demos.
pub const SCREEN_CLEAR: Rgba8 = Rgba8::from_packed(0x443355FF);

/// Clear colour of off-screen captures.
pub const CAPTURE_CLEAR: Rgba8 = Rgba8::from_packed(0xFF0000FF);
