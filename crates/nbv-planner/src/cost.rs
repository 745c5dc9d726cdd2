use nbv_3d::{camera::CameraIntrinsics, mesh::TriangleMesh, pose::CameraPose};
use nbv_render::{FaceIdRenderer, RenderError};

use crate::config::PlannerConfig;
use crate::geometry::GeometryCache;
use crate::metrics::{self, Cost, WORST_CASE_COST};
use crate::visibility::{self, VisibleFaceSet};

/// Evaluates the costs of candidate poses against a cached mesh.
///
/// Borrows the renderer mutably for its scratch target only; nothing else is
/// written, so repeated evaluations of the same pose give the same result.
pub struct CostEvaluator<'a> {
    mesh: &'a TriangleMesh,
    cache: &'a GeometryCache,
    config: &'a PlannerConfig,
    intrinsics: CameraIntrinsics,
    renderer: &'a mut FaceIdRenderer,
}

impl<'a> CostEvaluator<'a> {
    /// Create an evaluator rendering with `intrinsics`.
    pub fn new(
        mesh: &'a TriangleMesh,
        cache: &'a GeometryCache,
        config: &'a PlannerConfig,
        intrinsics: CameraIntrinsics,
        renderer: &'a mut FaceIdRenderer,
    ) -> Self {
        Self {
            mesh,
            cache,
            config,
            intrinsics,
            renderer,
        }
    }

    /// Render the pose and extract the faces it sees.
    pub fn visible_faces(&mut self, pose: &CameraPose) -> Result<VisibleFaceSet, RenderError> {
        let buffer = self
            .renderer
            .render_from_pose(self.mesh, pose, &self.intrinsics)?;
        Ok(visibility::visible_faces(&buffer, self.cache.len()))
    }

    /// The position cost of a pose for an already extracted visible set.
    ///
    /// In [0, 1] when something is visible, [`WORST_CASE_COST`] otherwise.
    pub fn position_cost_for(&self, pose: &CameraPose, visible: &VisibleFaceSet) -> f64 {
        if visible.is_empty() {
            return WORST_CASE_COST;
        }
        let target = self.config.coverage_target(self.cache.len());
        let raw = self.config.coverage_weight * metrics::coverage_cost(visible.len(), target)
            + self.config.distance_weight
                * metrics::distance_cost(self.cache, visible, pose.position);
        metrics::saturate(raw)
    }

    /// The rotation cost of a pose for an already extracted visible set.
    ///
    /// In [0, 1] when something is visible, [`WORST_CASE_COST`] otherwise.
    pub fn rotation_cost_for(&self, pose: &CameraPose, visible: &VisibleFaceSet) -> f64 {
        if visible.is_empty() {
            return WORST_CASE_COST;
        }
        metrics::saturate(metrics::rotation_cost(
            self.cache,
            visible,
            pose,
            self.intrinsics.half_fov_diagonal(),
            self.config.axis_weight,
        ))
    }

    /// Render a pose and compute both cost components.
    pub fn evaluate(&mut self, pose: &CameraPose) -> Result<Cost, RenderError> {
        let visible = self.visible_faces(pose)?;
        if visible.is_empty() {
            return Ok(Cost::worst_case());
        }
        Ok(Cost {
            position: self.position_cost_for(pose, &visible),
            rotation: self.rotation_cost_for(pose, &visible),
            visible_faces: visible.len(),
        })
    }

    /// Coverage and observation distance cost of a pose.
    pub fn position_cost(&mut self, pose: &CameraPose) -> Result<f64, RenderError> {
        let visible = self.visible_faces(pose)?;
        Ok(self.position_cost_for(pose, &visible))
    }

    /// Viewing angle cost of a pose.
    pub fn rotation_cost(&mut self, pose: &CameraPose) -> Result<f64, RenderError> {
        let visible = self.visible_faces(pose)?;
        Ok(self.rotation_cost_for(pose, &visible))
    }

    /// Weighted sum of the position and rotation cost of a pose.
    pub fn total_cost(&mut self, pose: &CameraPose) -> Result<f64, RenderError> {
        let cost = self.evaluate(pose)?;
        Ok(cost.total(self.config.position_weight, self.config.rotation_weight))
    }
}
