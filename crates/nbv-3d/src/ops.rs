use glam::DVec3;

/// Center of a triangle as the mean of its three vertices.
pub fn triangle_center(v0: DVec3, v1: DVec3, v2: DVec3) -> DVec3 {
    (v0 + v1 + v2) / 3.0
}

/// Compute the unit normal and the area of a triangle.
///
/// The normal follows the counter-clockwise winding `(v1 - v0) x (v2 - v0)`.
/// Degenerate triangles return a zero normal and a zero area.
///
/// Example:
/// ```
/// use glam::DVec3;
/// use nbv_3d::ops::triangle_normal_area;
///
/// let (normal, area) = triangle_normal_area(DVec3::ZERO, DVec3::X, DVec3::Y);
/// assert_eq!(normal, DVec3::Z);
/// assert_eq!(area, 0.5);
/// ```
pub fn triangle_normal_area(v0: DVec3, v1: DVec3, v2: DVec3) -> (DVec3, f64) {
    let cross = (v1 - v0).cross(v2 - v0);
    let magnitude = cross.length();
    if magnitude < f64::EPSILON {
        return (DVec3::ZERO, 0.0);
    }
    (cross / magnitude, 0.5 * magnitude)
}

/// Angle in radians between two vectors, robust to rounding outside [-1, 1].
///
/// Returns `None` when either vector has zero length.
pub fn angle_between(a: DVec3, b: DVec3) -> Option<f64> {
    let a = a.try_normalize()?;
    let b = b.try_normalize()?;
    Some(a.dot(b).clamp(-1.0, 1.0).acos())
}
