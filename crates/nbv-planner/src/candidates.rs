use glam::DVec3;
use nbv_3d::pose::CameraPose;

/// Place `count` cameras evenly on a horizontal ring, each looking at `center`.
///
/// The ring lies at `radius` from `center` and is raised by `elevation` radians
/// above the XZ plane; the first camera sits on the +Z side. Poses that cannot
/// look at the center, such as a zero radius, are skipped.
///
/// Example:
/// ```
/// use glam::DVec3;
/// use nbv_planner::candidates::ring_candidates;
///
/// let poses = ring_candidates(DVec3::ZERO, 5.0, 0.0, 4);
/// assert_eq!(poses.len(), 4);
/// assert!((poses[0].position - DVec3::new(0.0, 0.0, 5.0)).length() < 1e-12);
/// ```
pub fn ring_candidates(center: DVec3, radius: f64, elevation: f64, count: usize) -> Vec<CameraPose> {
    let (sin_el, cos_el) = elevation.sin_cos();
    (0..count)
        .filter_map(|i| {
            let azimuth = std::f64::consts::TAU * i as f64 / count as f64;
            let (sin_az, cos_az) = azimuth.sin_cos();
            let offset = DVec3::new(sin_az * cos_el, sin_el, cos_az * cos_el) * radius;
            CameraPose::look_at(center + offset, center, DVec3::Y)
        })
        .collect()
}
