use nbv_3d::camera::CameraIntrinsics;
use nbv_render::RenderSettings;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::optim::OptimizerSettings;

/// Which target the coverage term of the position cost compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveragePolicy {
    /// Aim for exactly `visible_faces_target` visible faces.
    FaceCount,
    /// Aim for `visibility_ratio_target` of all faces being visible.
    #[default]
    Ratio,
}

/// Configuration of a planning session.
///
/// Every field has a default so partial JSON documents deserialize.
///
/// # Example
///
/// ```
/// use nbv_planner::{CoveragePolicy, PlannerConfig};
///
/// let config = PlannerConfig::default();
/// assert_eq!(config.coverage_policy, CoveragePolicy::Ratio);
/// assert_eq!(config.coverage_target(100), 80);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Settings of the face id and measure passes.
    pub render: RenderSettings,
    /// The active coverage target.
    pub coverage_policy: CoveragePolicy,
    /// Target number of visible faces for [`CoveragePolicy::FaceCount`].
    pub visible_faces_target: usize,
    /// Target fraction of visible faces for [`CoveragePolicy::Ratio`].
    pub visibility_ratio_target: f64,
    /// Weight of the coverage term in the position cost.
    pub coverage_weight: f64,
    /// Weight of the observation distance term in the position cost.
    pub distance_weight: f64,
    /// Weight of the optical axis term in the rotation cost.
    pub axis_weight: f64,
    /// Weight of the position cost in the joint cost.
    pub position_weight: f64,
    /// Weight of the rotation cost in the joint cost.
    pub rotation_weight: f64,
    /// Descent settings of the position sub-problem.
    pub position_optimizer: OptimizerSettings,
    /// Descent settings of the rotation sub-problem.
    pub rotation_optimizer: OptimizerSettings,
    /// Elevation in radians of generated candidate poses above the mesh centroid.
    pub candidate_elevation: f64,
    /// Intrinsics of the next capture, the reference camera's when `None`.
    pub intrinsics: Option<CameraIntrinsics>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            render: RenderSettings::default(),
            coverage_policy: CoveragePolicy::default(),
            visible_faces_target: 20,
            visibility_ratio_target: 0.8,
            coverage_weight: 1.0,
            distance_weight: 1.0,
            axis_weight: 0.5,
            position_weight: 1.0,
            rotation_weight: 1.0,
            position_optimizer: OptimizerSettings::default(),
            rotation_optimizer: OptimizerSettings::default(),
            candidate_elevation: 0.5,
            intrinsics: None,
        }
    }
}

impl PlannerConfig {
    /// The number of visible faces the coverage term aims for.
    ///
    /// Never less than one so the coverage term stays finite.
    pub fn coverage_target(&self, num_faces: usize) -> usize {
        let target = match self.coverage_policy {
            CoveragePolicy::FaceCount => self.visible_faces_target,
            CoveragePolicy::Ratio => (self.visibility_ratio_target * num_faces as f64).round() as usize,
        };
        target.max(1)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), PlannerError> {
        self.render.validate()?;

        if !(0.0..=1.0).contains(&self.visibility_ratio_target) {
            return Err(PlannerError::InvalidConfig(format!(
                "visibility_ratio_target must be in [0, 1], got {}",
                self.visibility_ratio_target
            )));
        }

        let weights = [
            ("coverage_weight", self.coverage_weight),
            ("distance_weight", self.distance_weight),
            ("axis_weight", self.axis_weight),
            ("position_weight", self.position_weight),
            ("rotation_weight", self.rotation_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PlannerError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }

        if self.position_weight + self.rotation_weight <= 0.0 {
            return Err(PlannerError::InvalidConfig(
                "position_weight and rotation_weight must not both be zero".to_string(),
            ));
        }

        self.position_optimizer.validate()?;
        self.rotation_optimizer.validate()?;
        Ok(())
    }
}
