use std::collections::BTreeMap;

use glam::{DMat4, DVec3};
use nbv_3d::{camera::CameraIntrinsics, pose::CameraPose, scene::Scene};
use nbv_render::{FaceIdRenderer, MeasureRenderer, RenderBuffer, RenderError};

use crate::candidates::ring_candidates;
use crate::config::PlannerConfig;
use crate::cost::CostEvaluator;
use crate::error::{InitializationError, PlannerError};
use crate::geometry::GeometryCache;
use crate::metrics::{self, Cost, WORST_CASE_COST};
use crate::optim::{DescentResult, PoseOptimizer};
use crate::visibility::{self, VisibleFaceSet};

/// Lifecycle of a [`NextBestView`] planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    /// No geometry cache; only construction and initialization are allowed.
    Uninitialized,
    /// The geometry cache is built but there is no candidate pose yet.
    Initialized,
    /// A candidate pose is set and can be optimized.
    Ready,
    /// A bounded optimizer run is in progress.
    Optimizing,
}

#[derive(Debug, Clone, Copy)]
enum Subproblem {
    Position,
    Rotation,
}

/// Plans the next camera pose for an existing reconstruction.
///
/// The planner borrows the scene for its whole lifetime and owns the renderers and
/// their offscreen targets. Everything runs synchronously on the calling thread.
///
/// # Example
///
/// ```no_run
/// use glam::DVec3;
/// use nbv_3d::{camera::*, mesh::TriangleMesh, pose::CameraPose, scene::Scene};
/// use nbv_planner::{NextBestView, PlannerConfig};
///
/// let mesh = TriangleMesh::new(
///     vec![[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 2.0, 0.0]],
///     vec![[0, 1, 2]],
/// );
/// let intrinsics = CameraIntrinsics::new(640, 480, 500.0);
/// let camera = ReconstructionCamera::new(0, CameraPose::from_position(DVec3::Z * 5.0), intrinsics);
/// let scene = Scene::new(mesh, vec![camera]);
///
/// let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
/// planner.initialize()?;
/// planner.set_pose(CameraPose::from_position(DVec3::new(0.5, 0.0, 7.0)))?;
/// let step = planner.optimize_position_step()?;
/// println!("cost {} after {} steps", step.cost, step.iterations);
/// # Ok::<(), nbv_planner::PlannerError>(())
/// ```
pub struct NextBestView<'a> {
    scene: &'a Scene,
    config: PlannerConfig,
    state: PlannerState,
    cache: Option<GeometryCache>,
    intrinsics: Option<CameraIntrinsics>,
    pose: Option<CameraPose>,
    face_renderer: FaceIdRenderer,
    measure_renderer: MeasureRenderer,
    position_optimizer: PoseOptimizer,
    rotation_optimizer: PoseOptimizer,
}

impl<'a> NextBestView<'a> {
    /// Create an uninitialized planner for a scene.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::InvalidConfig`] or [`PlannerError::Render`] if a
    /// configuration value is out of range.
    pub fn new(scene: &'a Scene, config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        Ok(Self {
            scene,
            face_renderer: FaceIdRenderer::new(config.render),
            measure_renderer: MeasureRenderer::new(config.render),
            position_optimizer: PoseOptimizer::new(config.position_optimizer),
            rotation_optimizer: PoseOptimizer::new(config.rotation_optimizer),
            config,
            state: PlannerState::Uninitialized,
            cache: None,
            intrinsics: None,
            pose: None,
        })
    }

    /// Build the geometry cache of the scene.
    ///
    /// Releases the render targets and the previous cache first, so it can be
    /// called again to start over. A pose set before is kept.
    ///
    /// # Errors
    ///
    /// Fails with [`PlannerError::Initialization`] if the mesh is empty or malformed
    /// or the scene has no camera, and with [`PlannerError::Render`] if the
    /// reference view cannot be rendered. The planner is then uninitialized.
    pub fn initialize(&mut self) -> Result<(), PlannerError> {
        self.release();

        self.scene.mesh.validate()?;
        let reference = self
            .scene
            .reference_camera()
            .ok_or(InitializationError::NoReferenceCamera)?;

        let cache = GeometryCache::new(
            &self.scene.mesh,
            reference,
            &reference.intrinsics,
            &mut self.face_renderer,
        )
        .inspect_err(|err| log::error!("Failed to initialize the planner: {err}"))?;

        self.intrinsics = Some(self.config.intrinsics.unwrap_or(reference.intrinsics));
        self.cache = Some(cache);
        self.state = if self.pose.is_some() {
            PlannerState::Ready
        } else {
            PlannerState::Initialized
        };
        log::info!("Planner initialized, state {:?}", self.state);
        Ok(())
    }

    /// Drop the geometry cache and free the render targets.
    pub fn release(&mut self) {
        self.face_renderer.release();
        self.measure_renderer.release();
        self.position_optimizer.reset();
        self.rotation_optimizer.reset();
        self.cache = None;
        self.intrinsics = None;
        self.state = PlannerState::Uninitialized;
    }

    /// The current lifecycle state.
    pub fn state(&self) -> PlannerState {
        self.state
    }

    /// The scene being planned for.
    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    /// The configuration of the session.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The geometry cache, if initialized.
    pub fn cache(&self) -> Option<&GeometryCache> {
        self.cache.as_ref()
    }

    /// The intrinsics candidate poses are evaluated with, if initialized.
    pub fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.intrinsics
    }

    /// The current candidate pose.
    pub fn pose(&self) -> Option<CameraPose> {
        self.pose
    }

    /// Set the candidate pose that the optimizer refines.
    pub fn set_pose(&mut self, pose: CameraPose) -> Result<(), PlannerError> {
        self.require_cache()?;
        self.pose = Some(pose.wrapped());
        self.state = PlannerState::Ready;
        Ok(())
    }

    /// The optimizer of the position sub-problem.
    pub fn position_optimizer(&self) -> &PoseOptimizer {
        &self.position_optimizer
    }

    /// The optimizer of the rotation sub-problem.
    pub fn rotation_optimizer(&self) -> &PoseOptimizer {
        &self.rotation_optimizer
    }

    /// Render the face id buffer seen through a view matrix.
    pub fn render_face_id_from_camera(
        &mut self,
        view: &DMat4,
        intrinsics: &CameraIntrinsics,
    ) -> Result<RenderBuffer<u32>, PlannerError> {
        self.require_cache()?;
        let rendered = self.face_renderer.render(&self.scene.mesh, view, intrinsics);
        rendered.map_err(|err| self.fail(err))
    }

    /// Render one scalar per face through a view matrix.
    pub fn render_measure_from_camera(
        &mut self,
        view: &DMat4,
        intrinsics: &CameraIntrinsics,
        measure: &[f64],
    ) -> Result<RenderBuffer<f32>, PlannerError> {
        self.require_cache()?;
        let rendered = self
            .measure_renderer
            .render(&self.scene.mesh, view, intrinsics, measure);
        rendered.map_err(|err| self.fail(err))
    }

    /// Render the pixels-per-area baseline of every face as seen from a pose.
    pub fn render_ppa_measure(&mut self, pose: &CameraPose) -> Result<RenderBuffer<f32>, PlannerError> {
        let ppa = self.require_cache()?.pixels_per_area();
        let intrinsics = self.require_intrinsics()?;
        self.render_measure_from_camera(&pose.view_matrix(), &intrinsics, &ppa)
    }

    /// The faces seen from a pose with the planning intrinsics.
    pub fn visible_faces(&mut self, pose: &CameraPose) -> Result<VisibleFaceSet, PlannerError> {
        let result = self.evaluator()?.visible_faces(pose);
        result.map_err(|err| self.fail(err))
    }

    /// The faces seen through a view matrix with the given intrinsics.
    pub fn visible_faces_from_camera(
        &mut self,
        view: &DMat4,
        intrinsics: &CameraIntrinsics,
    ) -> Result<VisibleFaceSet, PlannerError> {
        let buffer = self.render_face_id_from_camera(view, intrinsics)?;
        Ok(visibility::visible_faces(&buffer, self.scene.mesh.num_faces()))
    }

    /// Number of faces seen from the current pose.
    pub fn visible_face_count(&mut self) -> Result<usize, PlannerError> {
        let pose = self.require_pose()?;
        Ok(self.visible_faces(&pose)?.len())
    }

    /// Viewing angle of each given face from a pose, see [`metrics::face_angles`].
    pub fn face_angles(
        &self,
        faces: &VisibleFaceSet,
        pose: &CameraPose,
    ) -> Result<BTreeMap<usize, f64>, PlannerError> {
        let cache = self.require_cache()?;
        Ok(metrics::face_angles(cache.faces(), faces.iter().copied(), pose.position))
    }

    /// Distance from a pose to each given face center.
    pub fn face_distances(
        &self,
        faces: &VisibleFaceSet,
        pose: &CameraPose,
    ) -> Result<BTreeMap<usize, f64>, PlannerError> {
        let cache = self.require_cache()?;
        Ok(metrics::face_distances(cache.faces(), faces.iter().copied(), pose.position))
    }

    /// Distance from a pose to every reconstruction camera, keyed by camera id.
    pub fn camera_distances(&self, pose: &CameraPose) -> BTreeMap<usize, f64> {
        metrics::camera_distances(&self.scene.cameras, pose.position)
    }

    /// The id of the reconstruction camera closest to a pose and its distance.
    pub fn closest_camera_id(&self, pose: &CameraPose) -> Option<(usize, f64)> {
        metrics::closest_camera(&self.scene.cameras, pose.position)
    }

    /// The pixels-per-area baseline of every face.
    pub fn pixels_per_area(&self) -> Result<Vec<f64>, PlannerError> {
        Ok(self.require_cache()?.pixels_per_area())
    }

    /// The area of every face.
    pub fn face_areas(&self) -> Result<Vec<f64>, PlannerError> {
        Ok(self.require_cache()?.face_areas())
    }

    /// Both cost components of a pose.
    pub fn evaluate(&mut self, pose: &CameraPose) -> Result<Cost, PlannerError> {
        let result = self.evaluator()?.evaluate(pose);
        result.map_err(|err| self.fail(err))
    }

    /// The weighted sum of the position and rotation cost of a pose.
    pub fn cost_function(&mut self, pose: &CameraPose) -> Result<f64, PlannerError> {
        let result = self.evaluator()?.total_cost(pose);
        result.map_err(|err| self.fail(err))
    }

    /// The coverage and observation distance cost of a pose.
    pub fn cost_function_position(&mut self, pose: &CameraPose) -> Result<f64, PlannerError> {
        let result = self.evaluator()?.position_cost(pose);
        result.map_err(|err| self.fail(err))
    }

    /// The viewing angle cost of a pose.
    pub fn cost_function_rotation(&mut self, pose: &CameraPose) -> Result<f64, PlannerError> {
        let result = self.evaluator()?.rotation_cost(pose);
        result.map_err(|err| self.fail(err))
    }

    /// Generate `count` seed poses on a ring around the mesh.
    ///
    /// The ring is centered on the mesh centroid at the reference distance and
    /// raised by the configured candidate elevation.
    pub fn initial_candidates(&self, count: usize) -> Result<Vec<CameraPose>, PlannerError> {
        let cache = self.require_cache()?;
        Ok(ring_candidates(
            self.scene.mesh.centroid(),
            cache.reference_distance(),
            self.config.candidate_elevation,
            count,
        ))
    }

    /// Generate `count` seed poses and sort them by ascending joint cost.
    pub fn rank_candidates(&mut self, count: usize) -> Result<Vec<(CameraPose, f64)>, PlannerError> {
        let mut ranked = self
            .initial_candidates(count)?
            .into_iter()
            .map(|pose| -> Result<_, PlannerError> { Ok((pose, self.cost_function(&pose)?)) })
            .collect::<Result<Vec<_>, _>>()?;
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((pose, cost)) = ranked.first() {
            log::debug!("Best of {count} candidates at {:?} with cost {cost:.6}", pose.position);
        }
        Ok(ranked)
    }

    /// Run one bounded descent on the position of the current pose.
    ///
    /// The rotation is held fixed. The refined pose becomes the current pose. An
    /// unconverged result is not an error; call again to continue.
    pub fn optimize_position_step(&mut self) -> Result<DescentResult, PlannerError> {
        self.optimize_step(Subproblem::Position)
    }

    /// Run one bounded descent on the rotation of the current pose.
    ///
    /// The position is held fixed and the refined angles are wrapped to (-pi, pi].
    pub fn optimize_rotation_step(&mut self) -> Result<DescentResult, PlannerError> {
        self.optimize_step(Subproblem::Rotation)
    }

    fn optimize_step(&mut self, subproblem: Subproblem) -> Result<DescentResult, PlannerError> {
        let pose = self.require_pose()?;
        let actual = self.state;

        let Self {
            scene,
            config,
            cache,
            intrinsics,
            face_renderer,
            position_optimizer,
            rotation_optimizer,
            state,
            ..
        } = self;
        let (Some(cache), Some(intrinsics)) = (cache.as_ref(), *intrinsics) else {
            return Err(PlannerError::InvalidState {
                expected: PlannerState::Ready,
                actual,
            });
        };
        *state = PlannerState::Optimizing;
        let mut evaluator = CostEvaluator::new(&scene.mesh, cache, config, intrinsics, face_renderer);

        let outcome = match subproblem {
            Subproblem::Position => position_optimizer
                .step(pose.position.to_array(), |p| {
                    let cost = evaluator.position_cost(&pose.with_position(DVec3::from_array(*p)));
                    cost.map(unusable_if_blind)
                })
                .map(|result| (pose.with_position(DVec3::from_array(result.params)), result)),
            Subproblem::Rotation => rotation_optimizer
                .step(pose.rotation.to_array(), |p| {
                    let cost = evaluator.rotation_cost(&pose.with_rotation(DVec3::from_array(*p)));
                    cost.map(unusable_if_blind)
                })
                .map(|mut result| {
                    let next = pose.with_rotation(DVec3::from_array(result.params)).wrapped();
                    result.params = next.rotation.to_array();
                    (next, result)
                }),
        };

        let (next, mut result) = outcome.map_err(|err| self.fail(err))?;
        self.pose = Some(next);
        self.state = PlannerState::Ready;

        if !result.cost.is_finite() {
            result.cost = WORST_CASE_COST;
            log::warn!("The {subproblem:?} step ended on a pose that sees no face");
        }
        log::debug!(
            "{subproblem:?} step: cost {:.6}, {} iterations, {:?}",
            result.cost,
            result.iterations,
            result.termination_reason
        );
        Ok(result)
    }

    fn evaluator(&mut self) -> Result<CostEvaluator<'_>, PlannerError> {
        let actual = self.state;
        let (Some(cache), Some(intrinsics)) = (self.cache.as_ref(), self.intrinsics) else {
            return Err(PlannerError::InvalidState {
                expected: PlannerState::Initialized,
                actual,
            });
        };
        Ok(CostEvaluator::new(
            &self.scene.mesh,
            cache,
            &self.config,
            intrinsics,
            &mut self.face_renderer,
        ))
    }

    fn require_cache(&self) -> Result<&GeometryCache, PlannerError> {
        self.cache.as_ref().ok_or(PlannerError::InvalidState {
            expected: PlannerState::Initialized,
            actual: self.state,
        })
    }

    fn require_intrinsics(&self) -> Result<CameraIntrinsics, PlannerError> {
        self.intrinsics.ok_or(PlannerError::InvalidState {
            expected: PlannerState::Initialized,
            actual: self.state,
        })
    }

    fn require_pose(&self) -> Result<CameraPose, PlannerError> {
        match (self.state, self.pose) {
            (PlannerState::Ready, Some(pose)) => Ok(pose),
            (actual, _) => Err(PlannerError::InvalidState {
                expected: PlannerState::Ready,
                actual,
            }),
        }
    }

    // Render failures end the session until the next initialization.
    fn fail(&mut self, err: RenderError) -> PlannerError {
        log::error!("Render failed, releasing the planner: {err}");
        self.release();
        PlannerError::Render(err)
    }
}

// Poses that see nothing have no usable cost for the optimizer.
fn unusable_if_blind(cost: f64) -> f64 {
    if cost >= WORST_CASE_COST {
        f64::INFINITY
    } else {
        cost
    }
}
