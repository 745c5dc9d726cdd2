use glam::DVec3;
use nbv_3d::{
    camera::{CameraIntrinsics, ReconstructionCamera},
    mesh::{MeshError, TriangleMesh},
    ops::{triangle_center, triangle_normal_area},
};
use nbv_render::FaceIdRenderer;

use crate::error::PlannerError;
use crate::visibility::face_pixel_counts;

/// Cached geometry of one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry {
    /// Mean of the three corners.
    pub center: DVec3,
    /// Unit normal following the counter-clockwise winding, zero for degenerate faces.
    pub normal: DVec3,
    /// Area of the triangle.
    pub area: f64,
    /// Full resolution pixels per unit area seen from the reference camera.
    pub pixels_per_area: f64,
}

/// Compute center, normal and area of every face.
///
/// The pixels-per-area baseline is left at zero.
pub fn compute_face_geometry(mesh: &TriangleMesh) -> Result<Vec<FaceGeometry>, MeshError> {
    mesh.validate()?;
    Ok((0..mesh.num_faces())
        .map(|face_id| {
            let [v0, v1, v2] = mesh.face_vertices(face_id);
            let (normal, area) = triangle_normal_area(v0, v1, v2);
            FaceGeometry {
                center: triangle_center(v0, v1, v2),
                normal,
                area,
                pixels_per_area: 0.0,
            }
        })
        .collect())
}

/// Per-face geometry and the observation baseline of the existing reconstruction.
///
/// Built once per mesh and read-only afterwards. Entry `i` belongs to face `i`.
#[derive(Debug, Clone)]
pub struct GeometryCache {
    faces: Vec<FaceGeometry>,
    reference_distance: f64,
    mean_pixels_per_area: f64,
}

impl GeometryCache {
    /// Build the cache of a mesh as seen from a reference camera.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The mesh to plan against.
    /// * `reference` - The camera whose view defines the observation baseline.
    /// * `intrinsics` - The intrinsics to render the reference view with.
    /// * `renderer` - The face id renderer of the planning session.
    ///
    /// # Errors
    ///
    /// Fails with an initialization error if the mesh is empty or malformed, and
    /// with a render error if the reference view cannot be rendered.
    pub fn new(
        mesh: &TriangleMesh,
        reference: &ReconstructionCamera,
        intrinsics: &CameraIntrinsics,
        renderer: &mut FaceIdRenderer,
    ) -> Result<Self, PlannerError> {
        let mut faces = compute_face_geometry(mesh)?;

        let buffer = renderer.render_from_pose(mesh, &reference.pose, intrinsics)?;
        let counts = face_pixel_counts(&buffer, faces.len());
        let pixel_scale = renderer.settings().downscale_factor.powi(2);

        let mut distance_sum = 0.0;
        let mut num_seen = 0;
        let mut ppa_sum = 0.0;
        let mut num_observed = 0;
        for (face, &count) in faces.iter_mut().zip(&counts) {
            if count == 0 {
                continue;
            }
            distance_sum += face.center.distance(reference.pose.position);
            num_seen += 1;
            if face.area > 0.0 {
                face.pixels_per_area = count as f64 * pixel_scale / face.area;
                ppa_sum += face.pixels_per_area;
                num_observed += 1;
            }
        }

        let reference_distance = if num_seen > 0 {
            distance_sum / num_seen as f64
        } else {
            log::warn!(
                "Reference camera {} sees no face, using the distance to the mesh centroid",
                reference.id
            );
            mesh.centroid().distance(reference.pose.position)
        };
        let reference_distance = if reference_distance > f64::EPSILON {
            reference_distance
        } else {
            log::warn!("Reference camera {} sits on the mesh, using distance 1", reference.id);
            1.0
        };

        let mean_pixels_per_area = if num_observed > 0 {
            ppa_sum / num_observed as f64
        } else {
            1.0
        };

        log::info!(
            "Geometry cache: {} faces, {} seen from reference camera {}, reference distance {:.3}",
            faces.len(),
            num_seen,
            reference.id,
            reference_distance
        );

        Ok(Self {
            faces,
            reference_distance,
            mean_pixels_per_area,
        })
    }

    /// Number of cached faces, equal to the number of mesh faces.
    #[inline]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether the cache holds no face.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// All cached faces indexed by face id.
    pub fn faces(&self) -> &[FaceGeometry] {
        &self.faces
    }

    /// The cached geometry of one face.
    pub fn face(&self, face_id: usize) -> Option<&FaceGeometry> {
        self.faces.get(face_id)
    }

    /// Mean distance from the reference camera to the faces it sees.
    pub fn reference_distance(&self) -> f64 {
        self.reference_distance
    }

    /// Mean pixels-per-area over the faces the reference camera sees.
    pub fn mean_pixels_per_area(&self) -> f64 {
        self.mean_pixels_per_area
    }

    /// The pixels-per-area baseline of every face.
    pub fn pixels_per_area(&self) -> Vec<f64> {
        self.faces.iter().map(|f| f.pixels_per_area).collect()
    }

    /// The area of every face.
    pub fn face_areas(&self) -> Vec<f64> {
        self.faces.iter().map(|f| f.area).collect()
    }

    /// How much observing a face is still worth, in (0, 1].
    ///
    /// Faces never observed weigh one; well observed faces tend to zero.
    pub fn observation_weight(&self, face_id: usize) -> f64 {
        let ppa = self.faces.get(face_id).map_or(0.0, |f| f.pixels_per_area);
        1.0 / (1.0 + ppa / self.mean_pixels_per_area)
    }
}
