use glam::DVec3;

/// Error types for the mesh module.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MeshError {
    /// The mesh has no faces to plan against.
    #[error("Mesh has no faces")]
    EmptyMesh,

    /// A face references a vertex that does not exist.
    #[error("Face {face} references vertex {vertex} but the mesh has {num_vertices} vertices")]
    VertexOutOfRange {
        /// Index of the offending face.
        face: usize,
        /// The out-of-range vertex index.
        vertex: u32,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },
}

/// A triangle mesh with vertices and faces.
///
/// The id of a face is its position in the face list.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    // The positions of the vertices.
    vertices: Vec<[f64; 3]>,
    // Three vertex indices per face, counter-clockwise when seen from the front.
    faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create a new mesh from vertices and faces.
    ///
    /// The mesh is not validated; call [`TriangleMesh::validate`] before using it.
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Get the number of vertices in the mesh.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces in the mesh.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get as reference the vertices of the mesh.
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Get as reference the faces of the mesh.
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Check that the mesh has faces and that every face index is in range.
    ///
    /// Example:
    /// ```
    /// use nbv_3d::mesh::{MeshError, TriangleMesh};
    ///
    /// let mesh = TriangleMesh::new(vec![[0.0; 3]; 3], vec![[0, 1, 3]]);
    /// assert!(matches!(mesh.validate(), Err(MeshError::VertexOutOfRange { .. })));
    /// ```
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.faces.is_empty() {
            return Err(MeshError::EmptyMesh);
        }
        let num_vertices = self.vertices.len();
        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&v| v as usize >= num_vertices) {
                return Err(MeshError::VertexOutOfRange {
                    face,
                    vertex,
                    num_vertices,
                });
            }
        }
        Ok(())
    }

    /// Get the three corner positions of a face.
    ///
    /// PRECONDITION: the mesh is valid and `face_id < num_faces()`.
    #[inline]
    pub fn face_vertices(&self, face_id: usize) -> [DVec3; 3] {
        let [a, b, c] = self.faces[face_id];
        [
            DVec3::from_array(self.vertices[a as usize]),
            DVec3::from_array(self.vertices[b as usize]),
            DVec3::from_array(self.vertices[c as usize]),
        ]
    }

    /// Get the centroid of the vertices, or zero for an empty mesh.
    pub fn centroid(&self) -> DVec3 {
        if self.vertices.is_empty() {
            return DVec3::ZERO;
        }
        let sum = self
            .vertices
            .iter()
            .fold(DVec3::ZERO, |acc, v| acc + DVec3::from_array(*v));
        sum / self.vertices.len() as f64
    }

    /// Get the axis-aligned bounds `(min, max)` of the vertices.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = DVec3::from_array(*self.vertices.first()?);
        Some(self.vertices.iter().fold((first, first), |(lo, hi), v| {
            let v = DVec3::from_array(*v);
            (lo.min(v), hi.max(v))
        }))
    }
}
