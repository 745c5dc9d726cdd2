use glam::{DMat4, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};

/// A camera pose in decomposed form.
///
/// The rotation holds the pitch, yaw and roll angles in radians about the X, Y and Z
/// axes. The camera-to-world transform is `T(position) * Ry(yaw) * Rx(pitch) * Rz(roll)`
/// and the camera looks along its local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraPose {
    /// The camera center in world coordinates.
    pub position: DVec3,
    /// The (pitch, yaw, roll) angles in radians.
    pub rotation: DVec3,
}

impl CameraPose {
    /// Create a new pose from a position and (pitch, yaw, roll) angles.
    pub fn new(position: DVec3, rotation: DVec3) -> Self {
        Self { position, rotation }
    }

    /// Create a pose at `position` with the identity rotation, looking along -Z.
    pub fn from_position(position: DVec3) -> Self {
        Self::new(position, DVec3::ZERO)
    }

    /// Create a pose at `eye` looking at `target`.
    ///
    /// Returns `None` if `eye` and `target` coincide or the viewing direction is
    /// parallel to `up`.
    ///
    /// Example:
    /// ```
    /// use glam::DVec3;
    /// use nbv_3d::pose::CameraPose;
    ///
    /// let pose = CameraPose::look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, DVec3::Y).unwrap();
    /// assert!((pose.forward() - DVec3::NEG_Z).length() < 1e-12);
    /// ```
    pub fn look_at(eye: DVec3, target: DVec3, up: DVec3) -> Option<Self> {
        let dir = (target - eye).try_normalize()?;
        let up = up.try_normalize()?;
        if dir.cross(up).length_squared() < 1e-12 {
            return None;
        }
        Some(Self::from_view_matrix(&DMat4::look_to_rh(eye, dir, up)))
    }

    /// Recover the decomposed pose from a camera-to-world transform.
    pub fn from_camera_to_world(camera_to_world: &DMat4) -> Self {
        let (_scale, rotation, translation) = camera_to_world.to_scale_rotation_translation();
        let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
        Self::new(translation, DVec3::new(pitch, yaw, roll))
    }

    /// Recover the decomposed pose from a world-to-camera (view) matrix.
    pub fn from_view_matrix(view: &DMat4) -> Self {
        Self::from_camera_to_world(&view.inverse())
    }

    /// The orientation of the camera in the world frame.
    pub fn orientation(&self) -> DQuat {
        DQuat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        )
    }

    /// The composed camera-to-world transform.
    pub fn camera_to_world(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.orientation(), self.position)
    }

    /// The composed world-to-camera transform used for projection.
    pub fn view_matrix(&self) -> DMat4 {
        let inv = self.orientation().inverse();
        DMat4::from_rotation_translation(inv, -(inv * self.position))
    }

    /// The unit viewing direction in world coordinates.
    pub fn forward(&self) -> DVec3 {
        self.orientation() * DVec3::NEG_Z
    }

    /// The unit up direction in world coordinates.
    pub fn up(&self) -> DVec3 {
        self.orientation() * DVec3::Y
    }

    /// Return a copy of the pose with a different position.
    pub fn with_position(self, position: DVec3) -> Self {
        Self { position, ..self }
    }

    /// Return a copy of the pose with different (pitch, yaw, roll) angles.
    pub fn with_rotation(self, rotation: DVec3) -> Self {
        Self { rotation, ..self }
    }

    /// Return a copy with every angle wrapped to the range (-pi, pi].
    pub fn wrapped(self) -> Self {
        let r = self.rotation;
        self.with_rotation(DVec3::new(wrap_angle(r.x), wrap_angle(r.y), wrap_angle(r.z)))
    }
}

/// Wrap an angle in radians to the range (-pi, pi].
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_eq(a: DVec3, b: DVec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-9);
    }

    #[test]
    fn test_identity_pose_looks_down_negative_z() {
        let pose = CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0));
        assert_vec_eq(pose.forward(), DVec3::NEG_Z);
        assert_vec_eq(pose.up(), DVec3::Y);

        // the origin lands 5 units in front of the camera
        let origin_cam = pose.view_matrix().transform_point3(DVec3::ZERO);
        assert_vec_eq(origin_cam, DVec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_composed_and_decomposed_agree() {
        let pose = CameraPose::new(DVec3::new(1.0, -2.0, 3.0), DVec3::new(0.3, -1.1, 0.7));
        let view = pose.view_matrix();
        let product = view * pose.camera_to_world();
        assert!(product.abs_diff_eq(DMat4::IDENTITY, 1e-9));

        let recovered = CameraPose::from_view_matrix(&view);
        assert_vec_eq(recovered.position, pose.position);
        assert_vec_eq(recovered.rotation, pose.rotation);
    }

    #[test]
    fn test_yaw_turns_camera_left() {
        let pose = CameraPose::new(DVec3::ZERO, DVec3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0));
        assert_vec_eq(pose.forward(), DVec3::NEG_X);
    }

    #[test]
    fn test_look_at() {
        let eye = DVec3::new(3.0, 2.0, -4.0);
        let pose = CameraPose::look_at(eye, DVec3::ZERO, DVec3::Y).unwrap();
        assert_vec_eq(pose.position, eye);
        assert_vec_eq(pose.forward(), (-eye).normalize());

        assert!(CameraPose::look_at(eye, eye, DVec3::Y).is_none());
        assert!(CameraPose::look_at(DVec3::Y, DVec3::ZERO, DVec3::Y).is_none());
    }

    #[test]
    fn test_wrap_angle() {
        use std::f64::consts::PI;
        assert_relative_eq!(wrap_angle(0.5), 0.5);
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-5.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
    }
}
