use std::collections::BTreeSet;

use nbv_render::{face_id::decode_face_id, RenderBuffer};

/// The ids of the faces seen by a camera, in ascending order.
pub type VisibleFaceSet = BTreeSet<usize>;

/// Collect the unique face ids present in a face id buffer.
///
/// Sentinel pixels and ids outside `[0, num_faces)` are skipped. Faces thinner than
/// a pixel at the rendered resolution may be missing from the result.
///
/// Example:
/// ```
/// use nbv_render::{ImageSize, RenderBuffer, NO_FACE};
/// use nbv_planner::visibility::visible_faces;
///
/// let buffer = RenderBuffer::new(ImageSize { width: 4, height: 1 }, vec![NO_FACE, 3, 1, 3]).unwrap();
/// let faces = visible_faces(&buffer, 8);
/// assert_eq!(faces.into_iter().collect::<Vec<_>>(), vec![0, 2]);
/// ```
pub fn visible_faces(buffer: &RenderBuffer<u32>, num_faces: usize) -> VisibleFaceSet {
    buffer
        .as_slice()
        .iter()
        .filter_map(|&value| decode_face_id(value))
        .filter(|&face_id| face_id < num_faces)
        .collect()
}

/// Count the pixels covered by each face.
pub fn face_pixel_counts(buffer: &RenderBuffer<u32>, num_faces: usize) -> Vec<usize> {
    let mut counts = vec![0; num_faces];
    for face_id in buffer.as_slice().iter().filter_map(|&v| decode_face_id(v)) {
        if let Some(count) = counts.get_mut(face_id) {
            *count += 1;
        }
    }
    counts
}
