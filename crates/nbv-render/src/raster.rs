use std::ops::{Deref, DerefMut};

use glam::{DVec2, DVec4};
use nbv_3d::mesh::TriangleMesh;

use crate::buffer::{ImageSize, RenderBuffer};
use crate::error::RenderError;
use crate::projection::Projection;

// A triangle clipped against one plane has at most four corners.
const MAX_CLIPPED_VERTICES: usize = 4;

/// An offscreen depth target owned by a single renderer.
///
/// The target keeps its depth storage between passes and only grows it. Each pass
/// sets the viewport through a [`ViewportGuard`] which puts the previous viewport
/// back when the pass ends.
#[derive(Debug, Default)]
pub struct RenderTarget {
    depth: Vec<f64>,
    viewport: ImageSize,
}

impl RenderTarget {
    /// Create an empty target; storage is allocated by the first pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// The viewport currently bound to the target.
    pub fn viewport(&self) -> ImageSize {
        self.viewport
    }

    /// Whether the target currently holds device memory.
    pub fn is_allocated(&self) -> bool {
        self.depth.capacity() > 0
    }

    /// Free the depth storage of the target.
    pub fn release(&mut self) {
        if self.is_allocated() {
            log::debug!("Releasing render target of {} pixels", self.depth.capacity());
        }
        self.depth = Vec::new();
        self.viewport = ImageSize::default();
    }

    /// Bind `viewport` for one pass and clear its depth.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::TargetAllocation`] if the storage cannot grow.
    pub fn begin_pass(&mut self, viewport: ImageSize) -> Result<ViewportGuard<'_>, RenderError> {
        let num_pixels = viewport.num_pixels();
        if num_pixels > self.depth.capacity() {
            log::debug!("Allocating render target for {viewport}");
        }
        self.depth.clear();
        self.depth
            .try_reserve_exact(num_pixels)
            .map_err(|_| RenderError::TargetAllocation(num_pixels))?;
        self.depth.resize(num_pixels, f64::INFINITY);

        let previous = std::mem::replace(&mut self.viewport, viewport);
        Ok(ViewportGuard {
            target: self,
            previous,
        })
    }
}

/// Restores the viewport of a [`RenderTarget`] when dropped.
pub struct ViewportGuard<'a> {
    target: &'a mut RenderTarget,
    previous: ImageSize,
}

impl Deref for ViewportGuard<'_> {
    type Target = RenderTarget;

    fn deref(&self) -> &Self::Target {
        self.target
    }
}

impl DerefMut for ViewportGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.target
    }
}

impl Drop for ViewportGuard<'_> {
    fn drop(&mut self) {
        self.target.viewport = self.previous;
    }
}

/// A triangle corner after the perspective divide, in pixel units with y up.
#[derive(Clone, Copy)]
struct ScreenVertex {
    xy: DVec2,
    depth: f64,
}

/// Rasterize every front-facing face of a mesh into a fresh buffer.
///
/// Each covered pixel receives `shade(face_id)` of the nearest face; uncovered
/// pixels keep `background`. Triangles crossing the near plane are clipped and
/// fragments beyond the far plane are dropped.
///
/// # Arguments
///
/// * `mesh` - A validated mesh.
/// * `projection` - The projection of the camera to render from.
/// * `target` - The offscreen target holding the depth buffer.
/// * `background` - The value of pixels not covered by any face.
/// * `shade` - The value written for a face.
pub fn rasterize_mesh<T, F>(
    mesh: &TriangleMesh,
    projection: &Projection,
    target: &mut RenderTarget,
    background: T,
    shade: F,
) -> Result<RenderBuffer<T>, RenderError>
where
    T: Copy,
    F: Fn(usize) -> T,
{
    let viewport = projection.viewport();
    let num_pixels = viewport.num_pixels();

    let mut data = Vec::new();
    data.try_reserve_exact(num_pixels)
        .map_err(|_| RenderError::TargetAllocation(num_pixels))?;
    data.resize(num_pixels, background);

    let mut pass = target.begin_pass(viewport)?;

    for face_id in 0..mesh.num_faces() {
        let corners = mesh.face_vertices(face_id).map(|v| projection.to_clip(v));
        let (clipped, len) = clip_near(&corners);
        if len < 3 {
            continue;
        }

        let screen: Vec<ScreenVertex> = clipped[..len]
            .iter()
            .map(|c| to_screen(*c, viewport))
            .collect();

        let value = shade(face_id);
        for i in 1..len - 1 {
            raster_triangle(
                [screen[0], screen[i], screen[i + 1]],
                viewport,
                &mut pass.depth,
                &mut data,
                value,
            );
        }
    }

    drop(pass);
    RenderBuffer::new(viewport, data)
}

// Sutherland-Hodgman against the near plane z >= -w.
fn clip_near(corners: &[DVec4; 3]) -> ([DVec4; MAX_CLIPPED_VERTICES], usize) {
    let mut out = [DVec4::ZERO; MAX_CLIPPED_VERTICES];
    let mut len = 0;
    let dist = |v: &DVec4| v.z + v.w;

    for i in 0..3 {
        let current = corners[i];
        let next = corners[(i + 1) % 3];
        let (d_current, d_next) = (dist(&current), dist(&next));

        if d_current >= 0.0 {
            out[len] = current;
            len += 1;
        }
        if (d_current >= 0.0) != (d_next >= 0.0) {
            let t = d_current / (d_current - d_next);
            out[len] = current + (next - current) * t;
            len += 1;
        }
    }
    (out, len)
}

fn to_screen(clip: DVec4, viewport: ImageSize) -> ScreenVertex {
    let ndc = clip.truncate() / clip.w;
    ScreenVertex {
        xy: DVec2::new(
            (ndc.x * 0.5 + 0.5) * viewport.width as f64,
            (ndc.y * 0.5 + 0.5) * viewport.height as f64,
        ),
        depth: ndc.z,
    }
}

#[inline]
fn edge(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn raster_triangle<T: Copy>(
    [a, b, c]: [ScreenVertex; 3],
    viewport: ImageSize,
    depth: &mut [f64],
    data: &mut [T],
    value: T,
) {
    // counter-clockwise on screen is front facing; the rest is culled
    let area = edge(a.xy, b.xy, c.xy);
    if area <= 0.0 || area.is_nan() {
        return;
    }

    let min = a.xy.min(b.xy).min(c.xy);
    let max = a.xy.max(b.xy).max(c.xy);
    let x0 = min.x.floor().max(0.0) as usize;
    let y0 = min.y.floor().max(0.0) as usize;
    let x1 = (max.x.ceil().max(0.0) as usize).min(viewport.width);
    let y1 = (max.y.ceil().max(0.0) as usize).min(viewport.height);

    for py in y0..y1 {
        // rows are stored top to bottom
        let row = (viewport.height - 1 - py) * viewport.width;
        for px in x0..x1 {
            let p = DVec2::new(px as f64 + 0.5, py as f64 + 0.5);
            let w0 = edge(b.xy, c.xy, p);
            let w1 = edge(c.xy, a.xy, p);
            let w2 = edge(a.xy, b.xy, p);
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = (w0 * a.depth + w1 * b.depth + w2 * c.depth) / area;
            if z > 1.0 {
                continue;
            }

            let idx = row + px;
            if z < depth[idx] {
                depth[idx] = z;
                data[idx] = value;
            }
        }
    }
}
