// image.rs — Host-side pitched image container.
//
// `HostImage` is the CPU half of an Image2D memory object: raw element
// bytes, row-major, with an explicit row pitch in *bytes*.
//
// Memory layout (width = 3, 4×unorm8 elements, row_pitch = 16):
//
//   byte:   0 .. 12          12 .. 16
//   row 0:  [e00 e01 e02]    [padding]
//   row 1:  [e10 e11 e12]    [padding]
//
// The pitch is part of the declared shape. Uploads read only the active
// `width × element_size` bytes of each row and downloads write only those
// bytes back, leaving padding zero. Raw byte uploads and initial data must
// therefore carry zero padding, or they would not read back unchanged.
//
// The device side keeps its own pitch (rows aligned to 256 bytes for wgpu
// copies); conversion between the two happens in the memory layer.

use crate::error::{ComputeError, Result};
use crate::format::ElementFormat;

/// A 2D image in host memory with a row pitch that may exceed the packed
/// row size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostImage {
    /// Element bytes, `height * row_pitch` long.
    data: Vec<u8>,
    width: usize,
    height: usize,
    /// Bytes from the start of one row to the start of the next.
    row_pitch: usize,
    format: ElementFormat,
}

impl HostImage {
    // --- Constructors ---

    /// Zero-filled image with tightly packed rows.
    pub fn new(width: usize, height: usize, format: ElementFormat) -> Self {
        let pitch = width * format.element_size();
        HostImage {
            data: vec![0; pitch * height],
            width,
            height,
            row_pitch: pitch,
            format,
        }
    }

    /// Zero-filled image with an explicit row pitch.
    ///
    /// # Errors
    /// `ShapeMismatch` if `row_pitch` is smaller than a packed row.
    pub fn with_pitch(
        width: usize,
        height: usize,
        row_pitch: usize,
        format: ElementFormat,
    ) -> Result<Self> {
        check_pitch(width, row_pitch, format)?;
        Ok(HostImage {
            data: vec![0; row_pitch * height],
            width,
            height,
            row_pitch,
            format,
        })
    }

    /// Wrap tightly packed element bytes.
    ///
    /// # Errors
    /// `ShapeMismatch` unless `data.len() == width * height * element_size`.
    pub fn from_vec(
        width: usize,
        height: usize,
        format: ElementFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        Self::from_vec_with_pitch(width, height, width * format.element_size(), format, data)
    }

    /// Wrap pitched element bytes.
    ///
    /// # Errors
    /// `ShapeMismatch` unless `data.len() == height * row_pitch` and the
    /// pitch holds a packed row.
    pub fn from_vec_with_pitch(
        width: usize,
        height: usize,
        row_pitch: usize,
        format: ElementFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        check_pitch(width, row_pitch, format)?;
        if data.len() != height * row_pitch {
            return Err(ComputeError::ShapeMismatch(format!(
                "image data is {} bytes, expected height {height} × pitch {row_pitch} = {}",
                data.len(),
                height * row_pitch
            )));
        }
        Ok(HostImage { data, width, height, row_pitch, format })
    }

    // --- Accessors ---

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    #[inline]
    pub fn format(&self) -> ElementFormat {
        self.format
    }

    /// Active bytes per row (no padding).
    #[inline]
    pub fn packed_row_bytes(&self) -> usize {
        self.width * self.format.element_size()
    }

    /// All bytes including row padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Active bytes of row `y`.
    ///
    /// # Panics
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.row_pitch;
        &self.data[start..start + self.packed_row_bytes()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.row_pitch;
        let len = self.packed_row_bytes();
        &mut self.data[start..start + len]
    }

    /// Bytes of the element at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        assert!(x < self.width, "x {x} out of bounds (width {})", self.width);
        let size = self.format.element_size();
        &self.row(y)[x * size..(x + 1) * size]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, value: &[u8]) {
        assert!(x < self.width, "x {x} out of bounds (width {})", self.width);
        let size = self.format.element_size();
        assert_eq!(value.len(), size, "pixel is {size} bytes for {}", self.format);
        self.row_mut(y)[x * size..(x + 1) * size].copy_from_slice(value);
    }

    /// Copy with padding removed (row_pitch == packed row size).
    pub fn to_packed(&self) -> HostImage {
        let mut out = HostImage::new(self.width, self.height, self.format);
        for y in 0..self.height {
            out.row_mut(y).copy_from_slice(self.row(y));
        }
        out
    }

    /// Whether every byte outside the active rows is zero.
    pub fn padding_is_zero(&self) -> bool {
        let active = self.packed_row_bytes();
        self.data
            .chunks(self.row_pitch.max(1))
            .all(|row| row.iter().skip(active).all(|&b| b == 0))
    }

    /// Same pixels, same shape: pitch differences are ignored.
    pub fn same_pixels(&self, other: &HostImage) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && (0..self.height).all(|y| self.row(y) == other.row(y))
    }
}

fn check_pitch(width: usize, row_pitch: usize, format: ElementFormat) -> Result<()> {
    let packed = width * format.element_size();
    if row_pitch < packed {
        return Err(ComputeError::ShapeMismatch(format!(
            "row pitch {row_pitch} is smaller than a packed row of {width} × {format} ({packed} bytes)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_packed_and_zeroed() {
        let img = HostImage::new(3, 2, ElementFormat::RGBA8_UNORM);
        assert_eq!(img.row_pitch(), 12);
        assert_eq!(img.as_bytes().len(), 24);
        assert!(img.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pitch_smaller_than_row_rejected() {
        let err = HostImage::with_pitch(4, 2, 15, ElementFormat::RGBA8_UNORM).unwrap_err();
        assert!(matches!(err, ComputeError::ShapeMismatch(_)));
    }

    #[test]
    fn test_from_vec_length_checked() {
        let err = HostImage::from_vec(2, 2, ElementFormat::R8_UNORM, vec![0; 3]).unwrap_err();
        assert!(matches!(err, ComputeError::ShapeMismatch(_)));
    }

    #[test]
    fn test_row_excludes_padding() {
        // width 3, 1-byte elements, pitch 5: two padding bytes per row.
        let img = HostImage::from_vec_with_pitch(
            3,
            2,
            5,
            ElementFormat::R8_UNORM,
            vec![10, 20, 30, 0, 0, 40, 50, 60, 0, 0],
        )
        .unwrap();
        assert_eq!(img.row(0), &[10, 20, 30]);
        assert_eq!(img.row(1), &[40, 50, 60]);
        assert_eq!(img.pixel(2, 1), &[60]);
    }

    #[test]
    fn test_padding_is_zero() {
        let clean = HostImage::from_vec_with_pitch(
            3,
            2,
            4,
            ElementFormat::R8_UNORM,
            vec![1, 2, 3, 0, 5, 6, 7, 0],
        )
        .unwrap();
        assert!(clean.padding_is_zero());

        let dirty = HostImage::from_vec_with_pitch(
            3,
            2,
            4,
            ElementFormat::R8_UNORM,
            vec![1, 2, 3, 0, 5, 6, 7, 8],
        )
        .unwrap();
        assert!(!dirty.padding_is_zero());
        assert!(HostImage::new(3, 2, ElementFormat::R8_UNORM).padding_is_zero());
    }

    #[test]
    fn test_set_pixel_and_to_packed() {
        let mut img = HostImage::with_pitch(2, 2, 12, ElementFormat::RGBA8_UNORM).unwrap();
        img.set_pixel(1, 1, &[1, 2, 3, 4]);
        let packed = img.to_packed();
        assert_eq!(packed.row_pitch(), 8);
        assert_eq!(packed.pixel(1, 1), &[1, 2, 3, 4]);
        assert!(packed.same_pixels(&img));
        assert_ne!(packed, img);
    }
}
