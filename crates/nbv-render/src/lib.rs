#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Dense single channel render buffers.
pub mod buffer;

/// Error types for the render module.
pub mod error;

/// Face id rendering.
pub mod face_id;

/// Per-face measure rendering.
pub mod measure;

/// Pinhole projection and render settings.
pub mod projection;

/// Software triangle rasterization into an offscreen target.
pub mod raster;

pub use buffer::{ImageSize, RenderBuffer};
pub use error::RenderError;
pub use face_id::{FaceIdRenderer, NO_FACE};
pub use measure::{MeasureRenderer, NO_MEASURE};
pub use projection::{Projection, RenderSettings};
pub use raster::RenderTarget;
