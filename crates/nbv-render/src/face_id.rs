use glam::DMat4;
use nbv_3d::{camera::CameraIntrinsics, mesh::TriangleMesh, pose::CameraPose};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::projection::{Projection, RenderSettings};
use crate::raster::{rasterize_mesh, RenderTarget};

/// Value of a face id pixel that no face covers.
///
/// Face `i` is stored as `i + 1` so the sentinel never collides with a valid id.
pub const NO_FACE: u32 = 0;

/// Encode a face id as a pixel value.
#[inline]
pub fn encode_face_id(face_id: usize) -> u32 {
    face_id as u32 + 1
}

/// Decode a pixel value into a face id, `None` for [`NO_FACE`].
#[inline]
pub fn decode_face_id(value: u32) -> Option<usize> {
    value.checked_sub(1).map(|id| id as usize)
}

/// Renders which face of a mesh is visible at every pixel.
#[derive(Debug, Default)]
pub struct FaceIdRenderer {
    settings: RenderSettings,
    target: RenderTarget,
}

impl FaceIdRenderer {
    /// Create a renderer; the offscreen target is allocated by the first render.
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            target: RenderTarget::new(),
        }
    }

    /// The settings used by every pass of this renderer.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// The offscreen target owned by this renderer.
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Render the face id buffer seen by a camera.
    ///
    /// # Arguments
    ///
    /// * `mesh` - A validated mesh.
    /// * `view` - The world-to-camera transform.
    /// * `intrinsics` - The full resolution intrinsics; the buffer is downscaled.
    ///
    /// # Returns
    ///
    /// A buffer holding [`NO_FACE`] or `face_id + 1` per pixel.
    pub fn render(
        &mut self,
        mesh: &TriangleMesh,
        view: &DMat4,
        intrinsics: &CameraIntrinsics,
    ) -> Result<RenderBuffer<u32>, RenderError> {
        if mesh.num_faces() >= u32::MAX as usize {
            return Err(RenderError::TooManyFaces(mesh.num_faces()));
        }
        let projection = Projection::new(view, intrinsics, &self.settings)?;
        rasterize_mesh(mesh, &projection, &mut self.target, NO_FACE, encode_face_id)
    }

    /// Render the face id buffer seen from a decomposed pose.
    pub fn render_from_pose(
        &mut self,
        mesh: &TriangleMesh,
        pose: &CameraPose,
        intrinsics: &CameraIntrinsics,
    ) -> Result<RenderBuffer<u32>, RenderError> {
        self.render(mesh, &pose.view_matrix(), intrinsics)
    }

    /// Free the offscreen target.
    pub fn release(&mut self) {
        self.target.release();
    }
}
