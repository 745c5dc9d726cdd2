use crate::error::RenderError;

/// Image size in pixels
///
/// A struct to represent the size of a render buffer in pixels.
///
/// # Examples
///
/// ```
/// use nbv_render::ImageSize;
///
/// let size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(size.width, 10);
/// assert_eq!(size.height, 20);
/// assert_eq!(size.num_pixels(), 200);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl ImageSize {
    /// Number of pixels covered by the size.
    #[inline]
    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// A dense single channel buffer produced by a render pass.
///
/// Pixels are stored row-major with row 0 at the top of the image.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderBuffer<T> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T: Copy> RenderBuffer<T> {
    /// Create a new buffer from pixel data.
    ///
    /// # Errors
    ///
    /// If the length of the pixel data does not match the size, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use nbv_render::{ImageSize, RenderBuffer};
    ///
    /// let buffer = RenderBuffer::new(ImageSize { width: 2, height: 1 }, vec![1u32, 2]).unwrap();
    /// assert_eq!(buffer.get(1, 0), Some(2));
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, RenderError> {
        if data.len() != size.num_pixels() {
            return Err(RenderError::InvalidBufferShape(
                data.len(),
                size.num_pixels(),
            ));
        }
        Ok(Self { size, data })
    }

    /// Create a new buffer filled with `val`.
    pub fn from_size_val(size: ImageSize, val: T) -> Self {
        Self {
            size,
            data: vec![val; size.num_pixels()],
        }
    }

    /// The size of the buffer in pixels.
    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// The width of the buffer in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// The height of the buffer in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// The pixel data as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consume the buffer and return the pixel data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Get the value of the pixel at column `x` and row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.data.get(y * self.size.width + x).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_shape() {
        let size = ImageSize::from([3, 2]);
        let err = RenderBuffer::new(size, vec![0u32; 5]);
        assert_eq!(err, Err(RenderError::InvalidBufferShape(5, 6)));

        let buffer = RenderBuffer::new(size, (0..6u32).collect()).unwrap();
        assert_eq!(buffer.width(), 3);
        assert_eq!(buffer.height(), 2);
        assert_eq!(buffer.get(0, 1), Some(3));
        assert_eq!(buffer.get(2, 1), Some(5));
        assert_eq!(buffer.get(3, 0), None);
        assert_eq!(buffer.into_vec().len(), 6);
    }

    #[test]
    fn test_buffer_from_size_val() {
        let buffer = RenderBuffer::from_size_val(ImageSize::from([4, 4]), f32::NAN);
        assert!(buffer.as_slice().iter().all(|v| v.is_nan()));
    }
}
