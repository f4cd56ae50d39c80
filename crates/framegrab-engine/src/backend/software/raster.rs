use glam::{Mat4, Vec2, Vec4};

use crate::backend::{ClearFlags, ViewClear};
use crate::coords::ViewRect;
use crate::paint::Rgba8;
use crate::scene::PosColorVertex;

use super::kernel::Program;

/// Colour + depth planes of one render target, borrowed for a view pass.
pub(crate) struct Target<'a> {
    pub color: &'a mut [u8],
    pub depth: &'a mut [f32],
    pub width: u32,
    pub height: u32,
}

struct ScreenVertex {
    pos: Vec2,
    z: f32,
    inv_w: f32,
    color: Vec4,
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl Target<'_> {
    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn clear(&mut self, rect: ViewRect, clear: &ViewClear) {
        let rect = rect.clamped_to(self.width, self.height);
        let rgba = clear.color.to_bytes();

        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let i = self.index(x, y);
                if clear.flags.contains(ClearFlags::COLOR) {
                    self.color[i * 4..i * 4 + 4].copy_from_slice(&rgba);
                }
                if clear.flags.contains(ClearFlags::DEPTH) {
                    self.depth[i] = clear.depth;
                }
            }
        }
    }

    /// Rasterizes an indexed triangle list into `rect`. Returns the number of
    /// fragments written.
    ///
    /// Both windings are drawn. Depth passes when strictly less than the stored
    /// value. Triangles with a vertex behind the eye are dropped.
    pub fn draw_indexed(
        &mut self,
        rect: ViewRect,
        mvp: &Mat4,
        vertices: &[PosColorVertex],
        indices: &[u16],
        program: Program,
        homogeneous_depth: bool,
    ) -> usize {
        let rect = rect.clamped_to(self.width, self.height);
        if rect.is_empty() {
            return 0;
        }

        let project = |v: &PosColorVertex| -> Option<ScreenVertex> {
            let clip = program.vertex.run(mvp, v.position());
            if clip.w <= f32::EPSILON {
                return None;
            }
            let inv_w = 1.0 / clip.w;
            let ndc = clip.truncate() * inv_w;
            let z = if homogeneous_depth { ndc.z * 0.5 + 0.5 } else { ndc.z };
            Some(ScreenVertex {
                pos: Vec2::new(
                    rect.x as f32 + (ndc.x * 0.5 + 0.5) * rect.width as f32,
                    rect.y as f32 + (0.5 - ndc.y * 0.5) * rect.height as f32,
                ),
                z,
                inv_w,
                color: Vec4::from(Rgba8::from_abgr(v.abgr).to_f32()),
            })
        };

        let mut written = 0;
        for tri in indices.chunks_exact(3) {
            let fetch = |i: u16| vertices.get(i as usize).and_then(&project);
            let (Some(a), Some(b), Some(c)) = (fetch(tri[0]), fetch(tri[1]), fetch(tri[2])) else {
                continue;
            };
            written += self.fill_triangle(rect, [&a, &b, &c], program);
        }
        written
    }

    fn fill_triangle(&mut self, rect: ViewRect, v: [&ScreenVertex; 3], program: Program) -> usize {
        let area = edge(v[0].pos, v[1].pos, v[2].pos);
        if area.abs() <= f32::EPSILON {
            return 0;
        }

        let min = v[0].pos.min(v[1].pos).min(v[2].pos).floor();
        let max = v[0].pos.max(v[1].pos).max(v[2].pos).ceil();
        let x0 = (min.x.max(rect.x as f32)) as u32;
        let y0 = (min.y.max(rect.y as f32)) as u32;
        let x1 = (max.x.min((rect.x + rect.width) as f32)).max(0.0) as u32;
        let y1 = (max.y.min((rect.y + rect.height) as f32)).max(0.0) as u32;

        let mut written = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(v[1].pos, v[2].pos, p) / area;
                let b1 = edge(v[2].pos, v[0].pos, p) / area;
                let b2 = edge(v[0].pos, v[1].pos, p) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let z = b0 * v[0].z + b1 * v[1].z + b2 * v[2].z;
                if !(0.0..=1.0).contains(&z) {
                    continue;
                }
                let i = self.index(x, y);
                if z >= self.depth[i] {
                    continue;
                }

                // Perspective-correct attribute weights.
                let q = [b0 * v[0].inv_w, b1 * v[1].inv_w, b2 * v[2].inv_w];
                let sum = q[0] + q[1] + q[2];
                let color = (v[0].color * q[0] + v[1].color * q[1] + v[2].color * q[2]) / sum;

                let out = Rgba8::from_f32(program.fragment.run(color).to_array());
                self.color[i * 4..i * 4 + 4].copy_from_slice(&out.to_bytes());
                self.depth[i] = z;
                written += 1;
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::software::kernel::{FragmentKernel, VertexKernel};

    const PROGRAM: Program = Program {
        vertex: VertexKernel::MvpPosition,
        fragment: FragmentKernel::VertexColor,
    };

    struct Planes {
        color: Vec<u8>,
        depth: Vec<f32>,
    }

    impl Planes {
        fn new(w: u32, h: u32) -> Self {
            Self {
                color: vec![0; (w * h * 4) as usize],
                depth: vec![1.0; (w * h) as usize],
            }
        }

        fn target(&mut self, w: u32, h: u32) -> Target<'_> {
            Target {
                color: &mut self.color,
                depth: &mut self.depth,
                width: w,
                height: h,
            }
        }

        fn pixel(&self, w: u32, x: u32, y: u32) -> [u8; 4] {
            let i = ((y * w + x) * 4) as usize;
            [self.color[i], self.color[i + 1], self.color[i + 2], self.color[i + 3]]
        }
    }

    fn tri(z: f32, abgr: u32) -> [PosColorVertex; 3] {
        [
            PosColorVertex::new(-1.0, -1.0, z, abgr),
            PosColorVertex::new(3.0, -1.0, z, abgr),
            PosColorVertex::new(-1.0, 3.0, z, abgr),
        ]
    }

    #[test]
    fn clear_respects_rect_and_flags() {
        let mut planes = Planes::new(4, 4);
        let mut t = planes.target(4, 4);
        let clear = ViewClear {
            flags: ClearFlags::COLOR,
            color: Rgba8::from_packed(0xFF0000FF),
            depth: 0.25,
        };
        t.clear(ViewRect::new(0, 0, 2, 4), &clear);

        assert_eq!(planes.pixel(4, 0, 0), [255, 0, 0, 255]);
        assert_eq!(planes.pixel(4, 3, 0), [0, 0, 0, 0]);
        assert!(planes.depth.iter().all(|&d| d == 1.0));
    }

    #[test]
    fn covering_triangle_fills_every_pixel() {
        let mut planes = Planes::new(8, 8);
        let written = planes.target(8, 8).draw_indexed(
            ViewRect::new(0, 0, 8, 8),
            &Mat4::IDENTITY,
            &tri(0.5, 0xff00ff00),
            &[0, 1, 2],
            PROGRAM,
            false,
        );
        assert_eq!(written, 64);
        assert_eq!(planes.pixel(8, 7, 7), [0, 255, 0, 255]);
    }

    #[test]
    fn nearer_fragment_wins_regardless_of_order() {
        let near = tri(0.2, 0xff0000ff);
        let far = tri(0.8, 0xffff0000);

        for order in [[&near, &far], [&far, &near]] {
            let mut planes = Planes::new(4, 4);
            let mut t = planes.target(4, 4);
            for verts in order {
                t.draw_indexed(ViewRect::new(0, 0, 4, 4), &Mat4::IDENTITY, verts, &[0, 1, 2], PROGRAM, false);
            }
            assert_eq!(planes.pixel(4, 1, 1), [255, 0, 0, 255]);
        }
    }

    #[test]
    fn draw_is_clipped_to_view_rect() {
        let mut planes = Planes::new(8, 8);
        planes.target(8, 8).draw_indexed(
            ViewRect::new(0, 0, 4, 8),
            &Mat4::IDENTITY,
            &tri(0.5, 0xffffffff),
            &[0, 1, 2],
            PROGRAM,
            false,
        );
        assert_eq!(planes.pixel(8, 3, 3), [255, 255, 255, 255]);
        assert_eq!(planes.pixel(8, 4, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let mut planes = Planes::new(4, 4);
        let written = planes.target(4, 4).draw_indexed(
            ViewRect::new(0, 0, 4, 4),
            &Mat4::IDENTITY,
            &tri(0.5, 0xffffffff),
            &[0, 1, 9],
            PROGRAM,
            false,
        );
        assert_eq!(written, 0);
    }
}
