use glam::DVec3;

use crate::camera::ReconstructionCamera;
use crate::mesh::TriangleMesh;

/// The reconstruction state consumed by the planner.
///
/// A scene owns the mesh and the calibrated cameras that produced it. Planning
/// components borrow it for as long as they live and never mutate it.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// The reconstructed surface.
    pub mesh: TriangleMesh,
    /// The cameras of the existing captures.
    pub cameras: Vec<ReconstructionCamera>,
}

impl Scene {
    /// Create a new scene from a mesh and its cameras.
    pub fn new(mesh: TriangleMesh, cameras: Vec<ReconstructionCamera>) -> Self {
        Self { mesh, cameras }
    }

    /// The camera used as canonical reference viewpoint, the first one.
    pub fn reference_camera(&self) -> Option<&ReconstructionCamera> {
        self.cameras.first()
    }

    /// The positions of all reconstruction cameras in world coordinates.
    pub fn camera_positions(&self) -> impl Iterator<Item = (usize, DVec3)> + '_ {
        self.cameras.iter().map(|camera| (camera.id, camera.pose.position))
    }
}
