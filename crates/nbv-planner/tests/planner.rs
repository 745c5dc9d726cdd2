use approx::assert_relative_eq;
use glam::{DMat4, DVec3};
use nbv_3d::{
    camera::{CameraIntrinsics, ReconstructionCamera},
    mesh::{MeshError, TriangleMesh},
    pose::CameraPose,
    scene::Scene,
};
use nbv_planner::{
    metrics::WORST_CASE_COST, visibility::VisibleFaceSet, CoveragePolicy, InitializationError,
    NextBestView, OptimizerSettings, PlannerConfig, PlannerError, PlannerState, TerminationReason,
};
use nbv_render::RenderError;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::new(640, 480, 500.0)
}

fn camera(id: usize, position: DVec3) -> ReconstructionCamera {
    ReconstructionCamera::new(id, CameraPose::from_position(position), intrinsics())
}

fn unit_square_scene() -> Scene {
    let mesh = TriangleMesh::new(
        vec![
            [-0.5, -0.5, 0.0],
            [0.5, -0.5, 0.0],
            [0.5, 0.5, 0.0],
            [-0.5, 0.5, 0.0],
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    );
    Scene::new(mesh, vec![camera(0, DVec3::new(0.0, 0.0, 5.0))])
}

// a single face centered on the origin, facing +Z
fn triangle_scene() -> Scene {
    let mesh = TriangleMesh::new(
        vec![[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 2.0, 0.0]],
        vec![[0, 1, 2]],
    );
    Scene::new(mesh, vec![camera(0, DVec3::new(0.0, 0.0, 5.0))])
}

#[test]
fn unit_square_seen_head_on() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;
    assert_eq!(planner.state(), PlannerState::Initialized);

    let pose = CameraPose::look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO, DVec3::Y)
        .ok_or("invalid look at")?;
    let visible = planner.visible_faces(&pose)?;
    assert_eq!(visible, VisibleFaceSet::from([0, 1]));

    let angles = planner.face_angles(&visible, &pose)?;
    let distances = planner.face_distances(&visible, &pose)?;
    for id in [0, 1] {
        assert_relative_eq!(angles[&id], 0.0, epsilon = 0.05);
        assert_relative_eq!(distances[&id], 5.0, epsilon = 0.01);
    }

    let from_matrix = planner.visible_faces_from_camera(&pose.view_matrix(), &intrinsics())?;
    assert_eq!(from_matrix, visible);
    Ok(())
}

#[test]
fn isolated_triangle_is_the_only_visible_face() -> TestResult {
    let mesh = TriangleMesh::new(
        vec![
            [-1.0, -1.0, 0.0],
            [1.0, -1.0, 0.0],
            [0.0, 1.0, 0.0],
            [40.0, -1.0, 0.0],
            [42.0, -1.0, 0.0],
            [41.0, 1.0, 0.0],
        ],
        vec![[0, 1, 2], [3, 4, 5]],
    );
    let scene = Scene::new(mesh, vec![camera(0, DVec3::new(0.0, 0.0, 5.0))]);
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;

    let visible = planner.visible_faces(&CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0)))?;
    assert_eq!(visible, VisibleFaceSet::from([0]));
    Ok(())
}

#[test]
fn facing_away_yields_worst_case_cost() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;

    let away = CameraPose::new(
        DVec3::new(0.0, 0.0, 5.0),
        DVec3::new(0.0, std::f64::consts::PI, 0.0),
    );
    assert!(planner.visible_faces(&away)?.is_empty());
    assert_eq!(planner.cost_function_position(&away)?, WORST_CASE_COST);
    assert_eq!(planner.cost_function_rotation(&away)?, WORST_CASE_COST);

    let cost = planner.evaluate(&away)?;
    assert_eq!(cost.visible_faces, 0);
    assert!(planner.cost_function(&away)?.is_finite());
    Ok(())
}

#[test]
fn coverage_cost_vanishes_at_target() -> TestResult {
    let scene = unit_square_scene();
    let pose = CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0));

    let mut config = PlannerConfig {
        coverage_policy: CoveragePolicy::FaceCount,
        visible_faces_target: 2,
        distance_weight: 0.0,
        ..Default::default()
    };
    let mut planner = NextBestView::new(&scene, config.clone())?;
    planner.initialize()?;
    assert_eq!(planner.cost_function_position(&pose)?, 0.0);

    config.visible_faces_target = 4;
    let mut planner = NextBestView::new(&scene, config)?;
    planner.initialize()?;
    // ((2 - 4) / 4)^2 = 0.25, saturated to 0.25 / 1.25
    let cost = planner.cost_function_position(&pose)?;
    assert_relative_eq!(cost, 0.2);
    assert!(cost >= 0.0);
    Ok(())
}

// an n x n grid of cells on [-1, 1]^2 in the z = 0 plane, facing +Z
fn grid_scene(n: usize, intrinsics: CameraIntrinsics) -> Scene {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            let x = 2.0 * i as f64 / n as f64 - 1.0;
            let y = 2.0 * j as f64 / n as f64 - 1.0;
            vertices.push([x, y, 0.0]);
        }
    }
    let stride = (n + 1) as u32;
    let mut faces = Vec::with_capacity(2 * n * n);
    for j in 0..n as u32 {
        for i in 0..n as u32 {
            let v0 = j * stride + i;
            faces.push([v0, v0 + 1, v0 + stride + 1]);
            faces.push([v0, v0 + stride + 1, v0 + stride]);
        }
    }
    let reference = ReconstructionCamera::new(
        0,
        CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0)),
        intrinsics,
    );
    Scene::new(TriangleMesh::new(vertices, faces), vec![reference])
}

#[test]
fn seeing_far_too_many_faces_beats_seeing_none() -> TestResult {
    let scene = grid_scene(40, CameraIntrinsics::new(1920, 1080, 1000.0));
    let config = PlannerConfig {
        coverage_policy: CoveragePolicy::FaceCount,
        visible_faces_target: 2,
        ..Default::default()
    };
    let mut planner = NextBestView::new(&scene, config)?;
    planner.initialize()?;

    let seeing = CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0));
    let away = seeing.with_rotation(DVec3::new(0.0, std::f64::consts::PI, 0.0));

    let seen = planner.evaluate(&seeing)?;
    assert!(seen.visible_faces > 1000);
    assert!(seen.position < 1.0 && seen.rotation < 1.0);

    assert!(planner.cost_function_position(&seeing)? < planner.cost_function_position(&away)?);
    assert!(planner.cost_function_rotation(&seeing)? < planner.cost_function_rotation(&away)?);
    assert!(planner.cost_function(&seeing)? < planner.cost_function(&away)?);
    Ok(())
}

#[test]
fn position_descent_leaves_the_visibility_edge() -> TestResult {
    let scene = triangle_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;

    // bisect the x offset where the triangle leaves the view
    let at = |x: f64| CameraPose::from_position(DVec3::new(x, 0.0, 5.0));
    let (mut inside, mut outside) = (0.0, 10.0);
    for _ in 0..40 {
        let mid = 0.5 * (inside + outside);
        if planner.visible_faces(&at(mid))?.is_empty() {
            outside = mid;
        } else {
            inside = mid;
        }
    }
    assert!(inside > 1.0);

    let start = at(inside - 4e-4);
    planner.set_pose(start)?;
    let initial = planner.cost_function_position(&start)?;
    assert!(initial < WORST_CASE_COST);

    let mut previous = initial;
    for _ in 0..5 {
        let result = planner.optimize_position_step()?;
        assert_ne!(result.termination_reason, TerminationReason::StepRejected);
        assert!(result.cost < previous);
        assert!(result.gradient_norm < 1.0);
        previous = result.cost;
    }
    let pose = planner.pose().ok_or("no pose")?;
    assert!(pose.position.x < start.position.x);
    Ok(())
}

#[test]
fn position_descent_is_monotonic_until_tolerance() -> TestResult {
    let scene = triangle_scene();
    let config = PlannerConfig {
        visibility_ratio_target: 1.0,
        position_optimizer: OptimizerSettings {
            step_size: 5.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let err_tol = config.position_optimizer.err_tol;
    let mut planner = NextBestView::new(&scene, config)?;
    planner.initialize()?;
    planner.set_pose(CameraPose::from_position(DVec3::new(0.5, 0.3, 8.0)))?;
    assert_eq!(planner.state(), PlannerState::Ready);

    let initial = planner.cost_function_position(&planner.pose().ok_or("no pose")?)?;
    let mut previous = initial;
    let mut converged_at = None;
    for call in 0..50 {
        let result = planner.optimize_position_step()?;
        assert_eq!(planner.state(), PlannerState::Ready);
        if result.converged() {
            converged_at = Some(call);
            assert!(result.gradient_norm < err_tol);
            break;
        }
        assert!(result.cost < previous, "call {call}: {} >= {previous}", result.cost);
        previous = result.cost;
    }
    assert!(converged_at.is_some());

    // further calls stay within tolerance and keep the pose
    let pose = planner.pose().ok_or("no pose")?;
    for _ in 0..3 {
        let result = planner.optimize_position_step()?;
        assert!(result.converged());
        assert_eq!(planner.pose(), Some(pose));
    }
    assert_relative_eq!(pose.position.length(), 5.0, epsilon = 0.05);
    assert!(planner.position_optimizer().total_iterations() > 1);
    Ok(())
}

#[test]
fn rotation_descent_never_increases_cost() -> TestResult {
    let scene = triangle_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;
    let start = CameraPose::new(DVec3::new(0.0, 0.0, 5.0), DVec3::new(-0.1, 0.2, 0.0));
    planner.set_pose(start)?;

    let initial = planner.cost_function_rotation(&start)?;
    let mut previous = initial;
    for _ in 0..20 {
        let result = planner.optimize_rotation_step()?;
        assert!(result.cost <= previous);
        previous = result.cost;

        let pose = planner.pose().ok_or("no pose")?;
        assert_eq!(pose.position, start.position);
        for angle in pose.rotation.to_array() {
            assert!(angle > -std::f64::consts::PI && angle <= std::f64::consts::PI);
        }
    }
    assert!(previous < initial);
    Ok(())
}

#[test]
fn closest_camera_at_its_own_position() -> TestResult {
    let mut scene = unit_square_scene();
    scene.cameras.push(camera(7, DVec3::new(4.0, 1.0, 3.0)));
    let planner = NextBestView::new(&scene, PlannerConfig::default())?;

    let pose = CameraPose::from_position(DVec3::new(4.0, 1.0, 3.0));
    assert_eq!(planner.closest_camera_id(&pose), Some((7, 0.0)));

    let distances = planner.camera_distances(&pose);
    assert_eq!(distances.len(), 2);
    assert_eq!(distances[&7], 0.0);
    Ok(())
}

#[test]
fn initialization_errors_leave_planner_uninitialized() -> TestResult {
    let empty = Scene::new(TriangleMesh::default(), vec![camera(0, DVec3::Z)]);
    let mut planner = NextBestView::new(&empty, PlannerConfig::default())?;
    assert_eq!(
        planner.initialize(),
        Err(PlannerError::Initialization(InitializationError::Mesh(
            MeshError::EmptyMesh
        )))
    );
    assert_eq!(planner.state(), PlannerState::Uninitialized);

    let broken = Scene::new(
        TriangleMesh::new(vec![[0.0; 3]; 3], vec![[0, 1, 3]]),
        vec![camera(0, DVec3::Z)],
    );
    let mut planner = NextBestView::new(&broken, PlannerConfig::default())?;
    assert!(matches!(
        planner.initialize(),
        Err(PlannerError::Initialization(InitializationError::Mesh(
            MeshError::VertexOutOfRange { face: 0, vertex: 3, .. }
        )))
    ));

    let no_camera = Scene::new(unit_square_scene().mesh, vec![]);
    let mut planner = NextBestView::new(&no_camera, PlannerConfig::default())?;
    assert_eq!(
        planner.initialize(),
        Err(PlannerError::Initialization(
            InitializationError::NoReferenceCamera
        ))
    );
    assert!(planner.cache().is_none());
    Ok(())
}

#[test]
fn operations_require_the_right_state() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    let pose = CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0));

    assert_eq!(
        planner.visible_faces(&pose),
        Err(PlannerError::InvalidState {
            expected: PlannerState::Initialized,
            actual: PlannerState::Uninitialized,
        })
    );
    assert!(planner.set_pose(pose).is_err());

    planner.initialize()?;
    assert_eq!(
        planner.optimize_position_step(),
        Err(PlannerError::InvalidState {
            expected: PlannerState::Ready,
            actual: PlannerState::Initialized,
        })
    );

    planner.set_pose(pose)?;
    assert_eq!(planner.visible_face_count()?, 2);

    // the pose survives a re-initialization
    planner.initialize()?;
    assert_eq!(planner.state(), PlannerState::Ready);
    Ok(())
}

#[test]
fn refused_descent_leaves_the_state_untouched() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;
    planner.set_pose(CameraPose::from_position(DVec3::new(0.0, 0.0, 5.0)))?;
    planner.release();

    assert_eq!(
        planner.optimize_rotation_step(),
        Err(PlannerError::InvalidState {
            expected: PlannerState::Ready,
            actual: PlannerState::Uninitialized,
        })
    );
    assert_eq!(planner.state(), PlannerState::Uninitialized);

    planner.initialize()?;
    planner.optimize_position_step()?;
    assert_eq!(planner.state(), PlannerState::Ready);
    Ok(())
}

#[test]
fn render_failure_releases_the_session() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;

    let tiny = CameraIntrinsics::new(1, 1, 1.0);
    let result = planner.render_face_id_from_camera(&DMat4::IDENTITY, &tiny);
    assert!(matches!(
        result,
        Err(PlannerError::Render(RenderError::UnsupportedResolution(_)))
    ));
    assert_eq!(planner.state(), PlannerState::Uninitialized);
    assert!(planner.cache().is_none());

    planner.initialize()?;
    assert_eq!(planner.state(), PlannerState::Initialized);
    Ok(())
}

#[test]
fn invalid_config_is_rejected() {
    let scene = unit_square_scene();
    let config = PlannerConfig {
        rotation_weight: f64::NAN,
        ..Default::default()
    };
    assert!(matches!(
        NextBestView::new(&scene, config),
        Err(PlannerError::InvalidConfig(_))
    ));
}

#[test]
fn ranked_candidates_are_sorted() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;

    let ranked = planner.rank_candidates(8)?;
    assert_eq!(ranked.len(), 8);
    assert!(ranked.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(ranked[0].1 < WORST_CASE_COST);

    // the ring is centered on the mesh at the reference distance
    let reference_distance = planner.cache().ok_or("no cache")?.reference_distance();
    for (pose, _) in &ranked {
        assert_relative_eq!(pose.position.length(), reference_distance, epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn ppa_measure_matches_the_baseline() -> TestResult {
    let scene = unit_square_scene();
    let mut planner = NextBestView::new(&scene, PlannerConfig::default())?;
    planner.initialize()?;

    let ppa = planner.pixels_per_area()?;
    assert_eq!(ppa.len(), 2);
    assert!(ppa.iter().all(|&p| p > 0.0));
    assert_eq!(planner.face_areas()?, vec![0.5, 0.5]);

    let buffer = planner.render_ppa_measure(&scene.cameras[0].pose)?;
    let covered: Vec<f32> = buffer.as_slice().iter().copied().filter(|v| !v.is_nan()).collect();
    assert!(!covered.is_empty());
    assert!(covered
        .iter()
        .all(|&v| v == ppa[0] as f32 || v == ppa[1] as f32));
    Ok(())
}
