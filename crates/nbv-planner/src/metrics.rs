//! Per-face viewing metrics and the cost terms built from them.
//!
//! Every function here is pure: it reads the cached geometry and a visible set
//! extracted beforehand, and never renders.

use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;

use glam::DVec3;
use nbv_3d::{camera::ReconstructionCamera, ops::angle_between, pose::CameraPose};

use crate::geometry::{FaceGeometry, GeometryCache};
use crate::visibility::VisibleFaceSet;

/// The cost of a pose that sees no face.
///
/// Every pose that sees at least one face costs at most 1 per component, so this
/// stays strictly above any of them. The pose optimizer treats it as a pose without
/// a usable cost.
pub const WORST_CASE_COST: f64 = 1e6;

/// Map a non-negative cost onto [0, 1], keeping its order.
///
/// Costs of poses that see something go through this so they always stay below
/// [`WORST_CASE_COST`].
///
/// Example:
/// ```
/// use nbv_planner::metrics::saturate;
///
/// assert_eq!(saturate(0.0), 0.0);
/// assert_eq!(saturate(1.0), 0.5);
/// assert!(saturate(1e6) < 1.0);
/// ```
pub fn saturate(cost: f64) -> f64 {
    if cost.is_infinite() {
        return 1.0;
    }
    cost / (1.0 + cost)
}

/// Both cost components of a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    /// Coverage and observation distance cost.
    pub position: f64,
    /// Viewing angle cost.
    pub rotation: f64,
    /// Number of faces the pose sees.
    pub visible_faces: usize,
}

impl Cost {
    /// The cost of a pose that sees nothing.
    pub fn worst_case() -> Self {
        Self {
            position: WORST_CASE_COST,
            rotation: WORST_CASE_COST,
            visible_faces: 0,
        }
    }

    /// Weighted sum of both components.
    pub fn total(&self, position_weight: f64, rotation_weight: f64) -> f64 {
        position_weight * self.position + rotation_weight * self.rotation
    }
}

/// Angle in radians between each visible face's normal and the direction to the camera.
///
/// Zero means the face is seen head on, values near `pi / 2` are grazing and values
/// above it are seen from behind. Degenerate faces and a camera sitting on a face
/// center yield `pi / 2`.
///
/// Example:
/// ```
/// use glam::DVec3;
/// use nbv_3d::mesh::TriangleMesh;
/// use nbv_planner::{geometry::compute_face_geometry, metrics::face_angles};
///
/// let mesh = TriangleMesh::new(
///     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
///     vec![[0, 1, 2]],
/// );
/// let faces = compute_face_geometry(&mesh).unwrap();
/// let center = faces[0].center;
/// let angles = face_angles(&faces, [0].into_iter(), center + DVec3::Z);
/// assert!(angles[&0].abs() < 1e-9);
/// ```
pub fn face_angles(
    faces: &[FaceGeometry],
    face_ids: impl IntoIterator<Item = usize>,
    camera_position: DVec3,
) -> BTreeMap<usize, f64> {
    face_ids
        .into_iter()
        .filter_map(|id| faces.get(id).map(|face| (id, face)))
        .map(|(id, face)| {
            let angle = angle_between(face.normal, camera_position - face.center);
            (id, angle.unwrap_or(FRAC_PI_2))
        })
        .collect()
}

/// Distance from the camera position to each face center.
pub fn face_distances(
    faces: &[FaceGeometry],
    face_ids: impl IntoIterator<Item = usize>,
    camera_position: DVec3,
) -> BTreeMap<usize, f64> {
    face_ids
        .into_iter()
        .filter_map(|id| faces.get(id).map(|face| (id, face)))
        .map(|(id, face)| (id, face.center.distance(camera_position)))
        .collect()
}

/// Distance from a position to every reconstruction camera, keyed by camera id.
pub fn camera_distances(
    cameras: &[ReconstructionCamera],
    position: DVec3,
) -> BTreeMap<usize, f64> {
    cameras
        .iter()
        .map(|camera| (camera.id, camera.pose.position.distance(position)))
        .collect()
}

/// The reconstruction camera closest to a position and its distance.
///
/// Ties keep the camera listed first. `None` if there are no cameras.
pub fn closest_camera(cameras: &[ReconstructionCamera], position: DVec3) -> Option<(usize, f64)> {
    cameras
        .iter()
        .map(|camera| (camera.id, camera.pose.position.distance(position)))
        .fold(None, |best, (id, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((id, distance)),
        })
}

/// Squared relative deviation of the visible face count from the target.
///
/// # Arguments
///
/// * `num_visible` - Number of visible faces.
/// * `target` - The coverage target, clamped to at least one.
pub fn coverage_cost(num_visible: usize, target: usize) -> f64 {
    let target = target.max(1) as f64;
    ((num_visible as f64 - target) / target).powi(2)
}

/// Weighted squared relative deviation of the face distances from the reference distance.
///
/// Faces already well observed from the reference camera weigh less, see
/// [`GeometryCache::observation_weight`]. Returns [`WORST_CASE_COST`] for an empty
/// visible set.
pub fn distance_cost(cache: &GeometryCache, visible: &VisibleFaceSet, camera_position: DVec3) -> f64 {
    let d_ref = cache.reference_distance();
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (id, distance) in face_distances(cache.faces(), visible.iter().copied(), camera_position) {
        let weight = cache.observation_weight(id);
        weighted += weight * ((distance - d_ref) / d_ref).powi(2);
        weight_sum += weight;
    }
    if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        WORST_CASE_COST
    }
}

/// Mean normalized viewing angle over the visible faces.
///
/// Each face adds `(angle / (pi / 2))^2` for how obliquely it is seen, plus
/// `axis_weight * (axis / half_fov)^2` for how far it lies from the optical axis.
/// Returns [`WORST_CASE_COST`] for an empty visible set.
///
/// # Arguments
///
/// * `cache` - The geometry of the faces.
/// * `visible` - The faces seen from `pose`.
/// * `pose` - The camera pose.
/// * `half_fov` - Half of the diagonal field of view in radians.
/// * `axis_weight` - The weight of the optical axis term.
pub fn rotation_cost(
    cache: &GeometryCache,
    visible: &VisibleFaceSet,
    pose: &CameraPose,
    half_fov: f64,
    axis_weight: f64,
) -> f64 {
    if visible.is_empty() {
        return WORST_CASE_COST;
    }
    let forward = pose.forward();
    let angles = face_angles(cache.faces(), visible.iter().copied(), pose.position);

    let total: f64 = angles
        .iter()
        .map(|(&id, &angle)| {
            let axis = cache
                .face(id)
                .and_then(|face| angle_between(forward, face.center - pose.position))
                .unwrap_or(0.0);
            (angle / FRAC_PI_2).powi(2) + axis_weight * (axis / half_fov).powi(2)
        })
        .sum();
    total / angles.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::compute_face_geometry;
    use approx::assert_relative_eq;
    use nbv_3d::{camera::CameraIntrinsics, mesh::TriangleMesh};

    fn unit_square() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                [-0.5, -0.5, 0.0],
                [0.5, -0.5, 0.0],
                [0.5, 0.5, 0.0],
                [-0.5, 0.5, 0.0],
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_face_angles_and_distances() -> Result<(), Box<dyn std::error::Error>> {
        let faces = compute_face_geometry(&unit_square())?;
        let camera = faces[0].center + DVec3::new(0.0, 0.0, 2.0);

        let angles = face_angles(&faces, [0, 1], camera);
        assert_relative_eq!(angles[&0], 0.0, epsilon = 1e-9);
        assert!(angles[&1] > 0.0);

        // from below the square every face is seen from behind
        let angles = face_angles(&faces, [0, 1], DVec3::new(0.0, 0.0, -3.0));
        assert!(angles.values().all(|&a| a > FRAC_PI_2));

        let distances = face_distances(&faces, [1, 7], camera);
        assert_eq!(distances.len(), 1);
        assert_relative_eq!(distances[&1], faces[1].center.distance(camera));
        Ok(())
    }

    #[test]
    fn test_coverage_cost_minimum_at_target() {
        assert_eq!(coverage_cost(10, 10), 0.0);
        assert_relative_eq!(coverage_cost(5, 10), 0.25);
        assert_relative_eq!(coverage_cost(15, 10), 0.25);
        assert_relative_eq!(coverage_cost(0, 10), 1.0);
        assert_relative_eq!(coverage_cost(3, 0), 4.0);
        for n in 0..30 {
            assert!(coverage_cost(n, 12) >= coverage_cost(12, 12));
        }
    }

    #[test]
    fn test_closest_camera() {
        let intrinsics = CameraIntrinsics::new(640, 480, 500.0);
        let cameras = vec![
            ReconstructionCamera::new(4, CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0)), intrinsics),
            ReconstructionCamera::new(9, CameraPose::from_position(DVec3::new(3.0, 0.0, 4.0)), intrinsics),
        ];
        assert_eq!(closest_camera(&cameras, DVec3::new(3.0, 0.0, 4.0)), Some((9, 0.0)));
        assert_eq!(closest_camera(&cameras, DVec3::new(0.0, 0.0, 6.0)), Some((4, 1.0)));
        assert_eq!(closest_camera(&[], DVec3::ZERO), None);

        let distances = camera_distances(&cameras, DVec3::ZERO);
        assert_relative_eq!(distances[&4], 5.0);
        assert_relative_eq!(distances[&9], 5.0);
    }

    #[test]
    fn test_saturate_keeps_order() {
        let costs = [0.0, 1e-6, 0.25, 1.0, 3.0, 2.5e6, 1e12];
        for pair in costs.windows(2) {
            assert!(saturate(pair[0]) < saturate(pair[1]));
        }
        assert!(costs.iter().all(|&c| saturate(c) < 1.0));
        assert_relative_eq!(saturate(0.25), 0.2);
        assert_eq!(saturate(f64::INFINITY), 1.0);
    }

    #[test]
    fn test_cost_total() {
        let cost = Cost {
            position: 2.0,
            rotation: 3.0,
            visible_faces: 4,
        };
        assert_relative_eq!(cost.total(1.0, 0.5), 3.5);
        assert_eq!(Cost::worst_case().visible_faces, 0);
    }
}
