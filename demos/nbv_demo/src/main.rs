use argh::FromArgs;
use glam::DVec3;
use std::path::PathBuf;

use nbv::k3d::{
    camera::{CameraIntrinsics, ReconstructionCamera},
    mesh::TriangleMesh,
    pose::CameraPose,
    scene::Scene,
};
use nbv::planner::{NextBestView, PlannerConfig};

#[derive(FromArgs)]
/// Plan the next camera pose for a synthetic terrain patch
struct Args {
    /// path to a JSON planner configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// number of position and rotation steps to run
    #[argh(option, short = 's', default = "20")]
    steps: usize,

    /// number of seed poses around the mesh
    #[argh(option, default = "8")]
    candidates: usize,

    /// number of grid cells per side of the terrain
    #[argh(option, default = "12")]
    cells: usize,
}

// a gently rolling height field in the XY plane, facing +Z
fn terrain(cells: usize) -> TriangleMesh {
    let n = cells + 1;
    let size = 4.0;
    let mut vertices = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let x = size * (i as f64 / cells as f64 - 0.5);
            let y = size * (j as f64 / cells as f64 - 0.5);
            let z = 0.3 * (1.5 * x).sin() * (1.2 * y).cos();
            vertices.push([x, y, z]);
        }
    }

    let mut faces = Vec::with_capacity(2 * cells * cells);
    for j in 0..cells {
        for i in 0..cells {
            let v00 = (j * n + i) as u32;
            let v10 = v00 + 1;
            let v01 = v00 + n as u32;
            let v11 = v01 + 1;
            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }
    TriangleMesh::new(vertices, faces)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config: PlannerConfig = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => PlannerConfig::default(),
    };

    // two captures already cover the left half of the patch
    let intrinsics = CameraIntrinsics::new(640, 480, 500.0);
    let cameras = [DVec3::new(-1.5, 0.0, 4.0), DVec3::new(-1.0, -1.5, 4.0)]
        .into_iter()
        .enumerate()
        .filter_map(|(id, eye)| {
            let pose = CameraPose::look_at(eye, DVec3::new(-1.0, 0.0, 0.0), DVec3::Y)?;
            Some(ReconstructionCamera::new(id, pose, intrinsics))
        })
        .collect();
    let scene = Scene::new(terrain(args.cells), cameras);
    println!(
        "Scene: #{} faces, #{} cameras",
        scene.mesh.num_faces(),
        scene.cameras.len()
    );

    let mut planner = NextBestView::new(&scene, config)?;
    planner.initialize()?;

    let ranked = planner.rank_candidates(args.candidates)?;
    let Some(&(seed, seed_cost)) = ranked.first() else {
        return Err("no candidate pose could be generated".into());
    };
    println!("Seed pose {:?} with cost {seed_cost:.6}", seed.position);
    planner.set_pose(seed)?;

    for step in 0..args.steps {
        let position = planner.optimize_position_step()?;
        let rotation = planner.optimize_rotation_step()?;
        log::info!(
            "Step {step}: position cost {:.6} ({:?}), rotation cost {:.6} ({:?})",
            position.cost,
            position.termination_reason,
            rotation.cost,
            rotation.termination_reason
        );
        if position.converged() && rotation.converged() {
            println!("Converged after {} steps", step + 1);
            break;
        }
    }

    let pose = planner.pose().ok_or("the planner has no pose")?;
    let cost = planner.evaluate(&pose)?;
    println!("Next best view: position {:?}, rotation {:?}", pose.position, pose.rotation);
    println!(
        "Visible faces: {}, position cost {:.6}, rotation cost {:.6}",
        cost.visible_faces, cost.position, cost.rotation
    );
    if let Some((id, distance)) = planner.closest_camera_id(&pose) {
        println!("Closest existing camera: #{id} at {distance:.3}");
    }
    println!("Camera to world:\n{}", pose.camera_to_world());

    Ok(())
}
