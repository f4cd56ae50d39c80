use super::PosColorVertex;

/// The eight corners of a 2x2x2 cube centred on the origin.
pub const CUBE_VERTICES: [PosColorVertex; 8] = [
    PosColorVertex::new(-1.0, 1.0, 1.0, 0xff000000),
    PosColorVertex::new(1.0, 1.0, 1.0, 0xff0000ff),
    PosColorVertex::new(-1.0, -1.0, 1.0, 0xff00ff00),
    PosColorVertex::new(1.0, -1.0, 1.0, 0xff00ffff),
    PosColorVertex::new(-1.0, 1.0, -1.0, 0xffff0000),
    PosColorVertex::new(1.0, 1.0, -1.0, 0xffff00ff),
    PosColorVertex::new(-1.0, -1.0, -1.0, 0xffffff00),
    PosColorVertex::new(1.0, -1.0, -1.0, 0xffffffff),
];

/// Six faces, two triangles each.
pub const CUBE_INDICES: [u16; 36] = [
    0, 1, 2, //
    1, 3, 2, //
    4, 6, 5, //
    5, 6, 7, //
    0, 2, 4, //
    4, 2, 6, //
    1, 5, 3, //
    5, 7, 3, //
    0, 4, 1, //
    4, 5, 1, //
    2, 3, 6, //
    6, 3, 7, //
];

/// Cube corners with colours cycled by `phase` (radians).
///
/// Used by the dynamic vertex buffer demo: each corner's RGB channels follow a
/// sine wave offset by the corner index.
pub fn cube_vertices(phase: f32) -> [PosColorVertex; 8] {
    let mut out = CUBE_VERTICES;
    for (i, v) in out.iter_mut().enumerate() {
        let k = i as f32 * 0.785;
        let chan = |offset: f32| ((phase + k + offset).sin() * 0.5 + 0.5) * 255.0;
        let (r, g, b) = (chan(0.0) as u32, chan(2.094) as u32, chan(4.189) as u32);
        v.abgr = 0xff00_0000 | (b << 16) | (g << 8) | r;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_reference_existing_vertices() {
        assert!(CUBE_INDICES.iter().all(|&i| (i as usize) < CUBE_VERTICES.len()));
        assert_eq!(CUBE_INDICES.len() % 3, 0);
    }

    #[test]
    fn animated_vertices_keep_positions_and_alpha() {
        let animated = cube_vertices(1.25);
        for (a, b) in animated.iter().zip(CUBE_VERTICES.iter()) {
            assert_eq!(a.position(), b.position());
            assert_eq!(a.abgr >> 24, 0xff);
        }
        assert_ne!(cube_vertices(0.0), cube_vertices(1.0));
    }
}
