// SPDX-License-Identifier: GPL-3.0-only

//! Video frame model
//!
//! A [`Frame`] is a view over an externally owned [`NativeBuffer`] plus the
//! plane layout and orientation metadata the capturer reported. Cloning a
//! frame clones the buffer handle, not the pixels.

pub mod buffer;

pub use buffer::{BufferGuard, NativeBuffer, SharedBuffer};

use crate::errors::FrameError;
use image::{GrayImage, RgbaImage};
use std::sync::Arc;

/// Rotation in degrees (clockwise)
///
/// Used both for the capturer's per-frame rotation hint and for the
/// compensation computed from sensor and device orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// No rotation
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl Rotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    ///
    /// Returns `None` for values that are not a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Rotate90),
            180 => Some(Rotation::Rotate180),
            270 => Some(Rotation::Rotate270),
            _ => None,
        }
    }

    /// Parse rotation from a string value (degrees)
    pub fn parse(degrees: &str) -> Option<Self> {
        match degrees.trim() {
            "" => Some(Rotation::None),
            other => other.parse::<i32>().ok().and_then(Self::from_degrees),
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Pixel format of a frame's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    /// The format WebRTC capturers deliver
    I420,
    /// RGBA - 32-bit with alpha (4 bytes per pixel, single plane)
    RGBA,
}

impl PixelFormat {
    /// Number of planes in this format
    pub fn plane_count(&self) -> usize {
        match self {
            PixelFormat::I420 => 3,
            PixelFormat::RGBA => 1,
        }
    }

    /// Bytes per pixel within each plane
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::I420 => 1,
            PixelFormat::RGBA => 4,
        }
    }

    /// Tightly packed plane layout for a `width` x `height` frame
    pub fn packed_planes(&self, width: u32, height: u32) -> Vec<Plane> {
        match self {
            PixelFormat::I420 => {
                let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
                let y_size = width as usize * height as usize;
                let c_size = cw as usize * ch as usize;
                vec![
                    Plane::new(0, width, width, height),
                    Plane::new(y_size, cw, cw, ch),
                    Plane::new(y_size + c_size, cw, cw, ch),
                ]
            }
            // Saturates so an oversized width fails stride validation
            PixelFormat::RGBA => vec![Plane::new(0, width.saturating_mul(4), width, height)],
        }
    }

    /// Pixel dimensions each plane must have for a `width` x `height` frame
    pub fn plane_dimensions(&self, width: u32, height: u32) -> Vec<(u32, u32)> {
        match self {
            PixelFormat::I420 => {
                let chroma = (width.div_ceil(2), height.div_ceil(2));
                vec![(width, height), chroma, chroma]
            }
            PixelFormat::RGBA => vec![(width, height)],
        }
    }
}

/// Location of one image plane within a frame's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    /// Byte offset of the first row
    pub offset: usize,
    /// Bytes per row including padding
    pub stride: u32,
    /// Plane width in pixels
    pub width: u32,
    /// Plane height in pixels
    pub height: u32,
}

impl Plane {
    pub fn new(offset: usize, stride: u32, width: u32, height: u32) -> Self {
        Self {
            offset,
            stride,
            width,
            height,
        }
    }

    /// Bytes the plane occupies from `offset` (the last row has no padding)
    fn span(&self, bytes_per_pixel: u32) -> usize {
        if self.height == 0 {
            return 0;
        }
        self.stride as usize * (self.height as usize - 1) + self.row_bytes(bytes_per_pixel)
    }

    /// Bytes of pixel data in one row, excluding padding
    fn row_bytes(&self, bytes_per_pixel: u32) -> usize {
        self.width as usize * bytes_per_pixel as usize
    }
}

/// A single captured video frame
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Rotation hint reported by the capturer
    pub rotation: Rotation,
    /// Capture timestamp in nanoseconds
    pub timestamp_ns: i64,
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
    /// Pixel storage, owned by the capturer
    pub buffer: Arc<dyn NativeBuffer>,
}

impl Frame {
    /// Create a frame with an explicit plane layout
    ///
    /// Validates the layout against the buffer so later plane reads are
    /// in bounds.
    pub fn new(
        buffer: Arc<dyn NativeBuffer>,
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<Plane>,
        rotation: Rotation,
        timestamp_ns: i64,
    ) -> Result<Self, FrameError> {
        let frame = Self {
            width,
            height,
            rotation,
            timestamp_ns,
            format,
            planes,
            buffer,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Create a tightly packed I420 frame
    pub fn i420(
        buffer: Arc<dyn NativeBuffer>,
        width: u32,
        height: u32,
        rotation: Rotation,
        timestamp_ns: i64,
    ) -> Result<Self, FrameError> {
        let planes = PixelFormat::I420.packed_planes(width, height);
        Self::new(
            buffer,
            PixelFormat::I420,
            width,
            height,
            planes,
            rotation,
            timestamp_ns,
        )
    }

    /// Create a tightly packed RGBA frame
    pub fn rgba(
        buffer: Arc<dyn NativeBuffer>,
        width: u32,
        height: u32,
        rotation: Rotation,
        timestamp_ns: i64,
    ) -> Result<Self, FrameError> {
        let planes = PixelFormat::RGBA.packed_planes(width, height);
        Self::new(
            buffer,
            PixelFormat::RGBA,
            width,
            height,
            planes,
            rotation,
            timestamp_ns,
        )
    }

    /// Wrap a decoded image in a frame backed by a fresh [`SharedBuffer`]
    pub fn from_rgba_image(
        image: RgbaImage,
        rotation: Rotation,
        timestamp_ns: i64,
    ) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        let buffer: Arc<dyn NativeBuffer> = SharedBuffer::new(image.into_raw());
        Self::rgba(buffer, width, height, rotation, timestamp_ns)
    }

    /// Check that dimensions, plane count and strides fit the buffer
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroDimensions);
        }
        let expected = self.format.plane_count();
        if self.planes.len() != expected {
            return Err(FrameError::PlaneCount {
                expected,
                actual: self.planes.len(),
            });
        }
        let bpp = self.format.bytes_per_pixel();
        let available = self.buffer.data().len();
        let dimensions = self.format.plane_dimensions(self.width, self.height);
        for (index, (plane, &expected)) in self.planes.iter().zip(&dimensions).enumerate() {
            if (plane.width, plane.height) != expected {
                return Err(FrameError::PlaneGeometry {
                    plane: index,
                    expected,
                    actual: (plane.width, plane.height),
                });
            }
            let row_bytes = plane.row_bytes(bpp);
            if (plane.stride as usize) < row_bytes {
                return Err(FrameError::StrideTooSmall {
                    plane: index,
                    stride: plane.stride,
                    row_bytes,
                });
            }
            let required = plane
                .offset
                .checked_add(plane.span(bpp))
                .unwrap_or(usize::MAX);
            if required > available {
                return Err(FrameError::BufferTooSmall {
                    required,
                    actual: available,
                });
            }
        }
        Ok(())
    }

    /// Whether `other` carries the same geometry and orientation metadata
    pub fn same_metadata(&self, other: &Frame) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.rotation == other.rotation
            && self.timestamp_ns == other.timestamp_ns
            && self.format == other.format
    }

    /// Copy one plane without stride padding
    pub fn copy_plane(&self, index: usize) -> Result<Vec<u8>, FrameError> {
        copy_plane_from(self.buffer.data(), self, index)
    }

    /// Luminance of the frame as a grayscale image
    ///
    /// I420 uses the Y plane directly; RGBA is converted with BT.601 weights.
    pub fn luma(&self) -> Result<GrayImage, FrameError> {
        luma_from(self.buffer.data(), self)
    }

    /// Convert to an RGBA image (for writing frames to disk)
    pub fn to_rgba_image(&self) -> Result<RgbaImage, FrameError> {
        let data = self.buffer.data();
        match self.format {
            PixelFormat::RGBA => {
                let pixels = copy_plane_from(data, self, 0)?;
                image_from_raw(self.width, self.height, pixels)
            }
            PixelFormat::I420 => {
                let y = copy_plane_from(data, self, 0)?;
                let u = copy_plane_from(data, self, 1)?;
                let v = copy_plane_from(data, self, 2)?;
                let cw = self.planes[1].width as usize;
                let (w, h) = (self.width as usize, self.height as usize);
                let mut out = Vec::with_capacity(w * h * 4);
                for row in 0..h {
                    for col in 0..w {
                        let c = (row / 2) * cw + col / 2;
                        let (r, g, b) = yuv_to_rgb(y[row * w + col], u[c], v[c]);
                        out.extend_from_slice(&[r, g, b, 255]);
                    }
                }
                image_from_raw(self.width, self.height, out)
            }
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("format", &self.format)
            .field("planes", &self.planes)
            .field("buffer_len", &self.buffer.data().len())
            .finish()
    }
}

/// Copy plane `index` of `frame` out of `data` (which may be a retained
/// view of the frame's buffer)
pub(crate) fn copy_plane_from(
    data: &[u8],
    frame: &Frame,
    index: usize,
) -> Result<Vec<u8>, FrameError> {
    let plane = frame.planes.get(index).ok_or(FrameError::PlaneCount {
        expected: frame.format.plane_count(),
        actual: frame.planes.len(),
    })?;
    let row_bytes = plane.row_bytes(frame.format.bytes_per_pixel());
    let stride = plane.stride as usize;
    let mut result = Vec::with_capacity(row_bytes * plane.height as usize);

    for row in 0..plane.height as usize {
        let start = plane.offset + row * stride;
        let end = start + row_bytes;
        let bytes = data.get(start..end).ok_or(FrameError::BufferTooSmall {
            required: end,
            actual: data.len(),
        })?;
        result.extend_from_slice(bytes);
    }

    Ok(result)
}

pub(crate) fn luma_from(data: &[u8], frame: &Frame) -> Result<GrayImage, FrameError> {
    let luma = match frame.format {
        PixelFormat::I420 => copy_plane_from(data, frame, 0)?,
        PixelFormat::RGBA => copy_plane_from(data, frame, 0)?
            .chunks_exact(4)
            .map(|px| {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect(),
    };
    GrayImage::from_raw(frame.width, frame.height, luma).ok_or(FrameError::BufferTooSmall {
        required: frame.width as usize * frame.height as usize,
        actual: data.len(),
    })
}

fn image_from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<RgbaImage, FrameError> {
    let actual = pixels.len();
    RgbaImage::from_raw(width, height, pixels).ok_or(FrameError::BufferTooSmall {
        required: width as usize * height as usize * 4,
        actual,
    })
}

/// BT.601 limited-range YUV to RGB
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let c = (y as f32 - 16.0) * 1.164;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    let r = c + 1.596 * e;
    let g = c - 0.392 * d - 0.813 * e;
    let b = c + 2.017 * d;
    (
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    )
}
