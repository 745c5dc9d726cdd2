use crate::buffer::ImageSize;

/// An error type for the render module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RenderError {
    /// The requested image or viewport size cannot be rendered.
    #[error("Unsupported render resolution {0}")]
    UnsupportedResolution(ImageSize),

    /// The focal length is not a positive finite number.
    #[error("Invalid focal length ({0})")]
    InvalidFocalLength(f64),

    /// The downscale factor is not a positive finite number.
    #[error("Invalid downscale factor ({0})")]
    InvalidDownscale(f64),

    /// The clipping planes do not satisfy 0 < near < far.
    #[error("Invalid clipping planes (near: {near}, far: {far})")]
    InvalidClipPlanes {
        /// Distance to the near plane.
        near: f64,
        /// Distance to the far plane.
        far: f64,
    },

    /// The offscreen target could not be allocated.
    #[error("Failed to allocate an offscreen target of {0} pixels")]
    TargetAllocation(usize),

    /// The mesh has more faces than the face id encoding can hold.
    #[error("Too many faces to encode as ids ({0})")]
    TooManyFaces(usize),

    /// The per-face measure does not match the mesh.
    #[error("Measure length ({0}) does not match the number of faces ({1})")]
    MeasureLengthMismatch(usize, usize),

    /// Buffer data does not match the buffer size.
    #[error("Data length ({0}) does not match the buffer size ({1})")]
    InvalidBufferShape(usize, usize),
}
