use glam::DMat4;
use nbv_3d::{camera::CameraIntrinsics, mesh::TriangleMesh, pose::CameraPose};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::projection::{Projection, RenderSettings};
use crate::raster::{rasterize_mesh, RenderTarget};

/// Value of a measure pixel that no face covers.
pub const NO_MEASURE: f32 = f32::NAN;

/// Renders an arbitrary per-face scalar with the visibility of the face id pass.
#[derive(Debug, Default)]
pub struct MeasureRenderer {
    settings: RenderSettings,
    target: RenderTarget,
}

impl MeasureRenderer {
    /// Create a renderer; the offscreen target is allocated by the first render.
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            target: RenderTarget::new(),
        }
    }

    /// The offscreen target owned by this renderer.
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Render `measure[face_id]` for the nearest face at every pixel.
    ///
    /// Pixels without a face hold [`NO_MEASURE`].
    ///
    /// # Errors
    ///
    /// Fails with [`RenderError::MeasureLengthMismatch`] if there is not exactly one
    /// value per face.
    pub fn render(
        &mut self,
        mesh: &TriangleMesh,
        view: &DMat4,
        intrinsics: &CameraIntrinsics,
        measure: &[f64],
    ) -> Result<RenderBuffer<f32>, RenderError> {
        if measure.len() != mesh.num_faces() {
            return Err(RenderError::MeasureLengthMismatch(
                measure.len(),
                mesh.num_faces(),
            ));
        }
        let projection = Projection::new(view, intrinsics, &self.settings)?;
        rasterize_mesh(mesh, &projection, &mut self.target, NO_MEASURE, |face_id| {
            measure[face_id] as f32
        })
    }

    /// Render a measure seen from a decomposed pose.
    pub fn render_from_pose(
        &mut self,
        mesh: &TriangleMesh,
        pose: &CameraPose,
        intrinsics: &CameraIntrinsics,
        measure: &[f64],
    ) -> Result<RenderBuffer<f32>, RenderError> {
        self.render(mesh, &pose.view_matrix(), intrinsics, measure)
    }

    /// Free the offscreen target.
    pub fn release(&mut self) {
        self.target.release();
    }
}
