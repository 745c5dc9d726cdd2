use glam::{DMat4, DVec3, DVec4};
use nbv_3d::camera::CameraIntrinsics;
use serde::{Deserialize, Serialize};

use crate::buffer::ImageSize;
use crate::error::RenderError;

/// Largest viewport side length accepted by the rasterizer.
pub const MAX_VIEWPORT_DIMENSION: usize = 16384;

/// Parameters shared by every render pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// The image is rasterized at `1 / downscale_factor` of the camera resolution.
    pub downscale_factor: f64,
    /// Distance to the near clipping plane.
    pub z_near: f64,
    /// Distance to the far clipping plane.
    pub z_far: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            downscale_factor: 4.0,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }
}

impl RenderSettings {
    /// Check that the settings describe a valid projection.
    pub fn validate(&self) -> Result<(), RenderError> {
        if !self.downscale_factor.is_finite() || self.downscale_factor <= 0.0 {
            return Err(RenderError::InvalidDownscale(self.downscale_factor));
        }
        if !(self.z_near > 0.0 && self.z_far > self.z_near && self.z_far.is_finite()) {
            return Err(RenderError::InvalidClipPlanes {
                near: self.z_near,
                far: self.z_far,
            });
        }
        Ok(())
    }

    /// The size of the rasterized image for a camera resolution.
    ///
    /// Example:
    /// ```
    /// use nbv_3d::camera::CameraIntrinsics;
    /// use nbv_render::{ImageSize, RenderSettings};
    ///
    /// let size = RenderSettings::default()
    ///     .viewport_size(&CameraIntrinsics::new(640, 480, 500.0))
    ///     .unwrap();
    /// assert_eq!(size, ImageSize { width: 160, height: 120 });
    /// ```
    pub fn viewport_size(&self, intrinsics: &CameraIntrinsics) -> Result<ImageSize, RenderError> {
        self.validate()?;
        let size = ImageSize {
            width: (intrinsics.width as f64 / self.downscale_factor).round() as usize,
            height: (intrinsics.height as f64 / self.downscale_factor).round() as usize,
        };
        let valid = |side: usize| (1..=MAX_VIEWPORT_DIMENSION).contains(&side);
        if !valid(size.width) || !valid(size.height) {
            return Err(RenderError::UnsupportedResolution(size));
        }
        Ok(size)
    }
}

/// A pinhole projection from world coordinates into a downscaled viewport.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    view_projection: DMat4,
    viewport: ImageSize,
}

impl Projection {
    /// Build the projection of a camera with the given view matrix and intrinsics.
    ///
    /// The vertical field of view is `2 * atan(height / (2 * focal_y))`. Downscaling
    /// changes the viewport resolution but not the field of view.
    ///
    /// # Arguments
    ///
    /// * `view` - The world-to-camera transform.
    /// * `intrinsics` - The full resolution camera intrinsics.
    /// * `settings` - Downscale factor and clipping planes.
    pub fn new(
        view: &DMat4,
        intrinsics: &CameraIntrinsics,
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        if !intrinsics.focal_y.is_finite() || intrinsics.focal_y <= 0.0 {
            return Err(RenderError::InvalidFocalLength(intrinsics.focal_y));
        }
        if intrinsics.width == 0 || intrinsics.height == 0 {
            return Err(RenderError::UnsupportedResolution(ImageSize {
                width: intrinsics.width,
                height: intrinsics.height,
            }));
        }
        let viewport = settings.viewport_size(intrinsics)?;
        let projection = DMat4::perspective_rh_gl(
            intrinsics.fov_y(),
            intrinsics.aspect_ratio(),
            settings.z_near,
            settings.z_far,
        );
        Ok(Self {
            view_projection: projection * *view,
            viewport,
        })
    }

    /// The resolution the projection rasterizes into.
    #[inline]
    pub fn viewport(&self) -> ImageSize {
        self.viewport
    }

    /// Transform a world point into homogeneous clip coordinates.
    #[inline]
    pub fn to_clip(&self, point: DVec3) -> DVec4 {
        self.view_projection * point.extend(1.0)
    }
}
