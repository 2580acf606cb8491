// SPDX-License-Identifier: GPL-3.0-only

//! Face presence detection
//!
//! The detector itself is an external capability ([`FaceDetect`]). This
//! module prepares the upright grayscale image it runs on and wraps it in a
//! [`ThrottledFaceDetector`] so the expensive call only happens every Nth
//! frame.

#[cfg(feature = "rustface")]
pub mod rustface_backend;
pub mod throttle;

#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;
pub use throttle::{Sample, ThrottledFaceDetector};

use crate::errors::{DetectionError, FrameError};
use crate::frame::{Frame, Rotation, luma_from};
use image::GrayImage;
use image::imageops::{self, FilterType};

/// Single-image face detector
///
/// Implementations may be slow; the pipeline only calls them on sampled
/// frames. Errors are absorbed by the caller.
pub trait FaceDetect: Send {
    /// `true` if at least one face is visible in `image`
    fn detect(&mut self, image: &OrientedImage) -> Result<bool, DetectionError>;
}

impl<F> FaceDetect for F
where
    F: FnMut(&OrientedImage) -> Result<bool, DetectionError> + Send,
{
    fn detect(&mut self, image: &OrientedImage) -> Result<bool, DetectionError> {
        self(image)
    }
}

/// Upright grayscale image handed to a [`FaceDetect`]
#[derive(Debug, Clone)]
pub struct OrientedImage {
    image: GrayImage,
    /// Rotation that was applied to the source frame
    rotation: Rotation,
}

impl OrientedImage {
    /// Build from a frame's retained pixel data
    ///
    /// The luma plane is downscaled so its longest edge is at most
    /// `max_dimension`, then rotated by `rotation`.
    pub fn from_frame(
        data: &[u8],
        frame: &Frame,
        rotation: Rotation,
        max_dimension: u32,
    ) -> Result<Self, FrameError> {
        let luma = luma_from(data, frame)?;
        let scaled = downscale(luma, max_dimension);
        Ok(Self::from_gray(scaled, rotation))
    }

    /// Rotate an already-extracted grayscale image
    pub fn from_gray(image: GrayImage, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::None => image,
            Rotation::Rotate90 => imageops::rotate90(&image),
            Rotation::Rotate180 => imageops::rotate180(&image),
            Rotation::Rotate270 => imageops::rotate270(&image),
        };
        Self { image, rotation }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Row-major grayscale pixels, `width * height` bytes
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

fn downscale(image: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }
    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}
