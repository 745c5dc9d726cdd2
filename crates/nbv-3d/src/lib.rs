#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics and reconstruction cameras.
pub mod camera;

/// Triangle meshes and their validation.
pub mod mesh;

/// Geometric operations on points and triangles.
pub mod ops;

/// Camera poses in decomposed and composed form.
pub mod pose;

/// The scene context shared by the planner and the renderers.
pub mod scene;

pub use mesh::MeshError;
