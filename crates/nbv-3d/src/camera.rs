use serde::{Deserialize, Serialize};

use crate::pose::CameraPose;

/// Intrinsic parameters of a pinhole camera.
///
/// Only the vertical focal length is kept; the horizontal field of view follows from
/// the aspect ratio of the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// The image width in pixels.
    pub width: usize,
    /// The image height in pixels.
    pub height: usize,
    /// The vertical focal length in pixels.
    pub focal_y: f64,
}

impl CameraIntrinsics {
    /// Creates a new set of intrinsics.
    pub fn new(width: usize, height: usize, focal_y: f64) -> Self {
        Self {
            width,
            height,
            focal_y,
        }
    }

    /// Vertical field of view in radians.
    ///
    /// Example:
    /// ```
    /// use nbv_3d::camera::CameraIntrinsics;
    ///
    /// let intrinsics = CameraIntrinsics::new(640, 480, 240.0);
    /// assert!((intrinsics.fov_y() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    /// ```
    pub fn fov_y(&self) -> f64 {
        2.0 * (self.height as f64 / (2.0 * self.focal_y)).atan()
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Half of the diagonal field of view in radians.
    pub fn half_fov_diagonal(&self) -> f64 {
        let half_diagonal = 0.5 * ((self.width.pow(2) + self.height.pow(2)) as f64).sqrt();
        (half_diagonal / self.focal_y).atan()
    }
}

/// A calibrated camera of the existing reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionCamera {
    /// The id of the camera in the reconstruction.
    pub id: usize,
    /// Where the camera was placed.
    pub pose: CameraPose,
    /// The calibration of the camera.
    pub intrinsics: CameraIntrinsics,
}

impl ReconstructionCamera {
    /// Creates a new reconstruction camera.
    pub fn new(id: usize, pose: CameraPose, intrinsics: CameraIntrinsics) -> Self {
        Self {
            id,
            pose,
            intrinsics,
        }
    }
}
