// SPDX-License-Identifier: GPL-3.0-only

//! Privacy blur
//!
//! Gaussian-blurs every plane of a frame into a freshly allocated buffer.
//! The source buffer is only read, so other holders of the capturer's
//! buffer never observe a partially blurred image.
//!
//! Large sigmas are expensive at full resolution (the kernel is ~6 sigma
//! wide), so a plane is first downscaled until the remaining sigma is at
//! most `working_sigma`, blurred there and scaled back up. The result is
//! still a deterministic function of (input, sigma).

use crate::constants::DEFAULT_BLUR_WORKING_SIGMA;
use crate::errors::FrameError;
use crate::frame::{Frame, NativeBuffer, PixelFormat, SharedBuffer, copy_plane_from};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use std::sync::Arc;
use tracing::trace;

/// Stateless blur transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurTransform {
    working_sigma: f32,
}

impl Default for BlurTransform {
    fn default() -> Self {
        Self::new(DEFAULT_BLUR_WORKING_SIGMA)
    }
}

impl BlurTransform {
    /// Create a transform that never blurs with more than `working_sigma`
    /// at working resolution
    pub fn new(working_sigma: f32) -> Self {
        Self {
            working_sigma: if working_sigma.is_finite() && working_sigma > 0.0 {
                working_sigma
            } else {
                DEFAULT_BLUR_WORKING_SIGMA
            },
        }
    }

    pub fn working_sigma(&self) -> f32 {
        self.working_sigma
    }

    /// Blur `frame` with strength `sigma`
    ///
    /// Returns a new tightly packed frame with the same dimensions,
    /// rotation, timestamp and pixel format.
    pub fn apply(&self, frame: &Frame, sigma: f32) -> Result<Frame, FrameError> {
        self.apply_to(frame.buffer.data(), frame, sigma)
    }

    /// Blur using an already retained view of the frame's pixel data
    pub fn apply_to(&self, data: &[u8], frame: &Frame, sigma: f32) -> Result<Frame, FrameError> {
        let start = std::time::Instant::now();

        let mut output = Vec::new();
        match frame.format {
            PixelFormat::I420 => {
                for (index, plane) in frame.planes.iter().enumerate() {
                    let pixels = copy_plane_from(data, frame, index)?;
                    let image = GrayImage::from_raw(plane.width, plane.height, pixels)
                        .ok_or(FrameError::BufferTooSmall {
                            required: plane.width as usize * plane.height as usize,
                            actual: data.len(),
                        })?;
                    // Chroma planes are half resolution, so half the sigma
                    // covers the same area of the picture
                    let plane_sigma = if index == 0 { sigma } else { sigma / 2.0 };
                    output.extend_from_slice(self.blur_plane(&image, plane_sigma).as_raw());
                }
            }
            PixelFormat::RGBA => {
                let pixels = copy_plane_from(data, frame, 0)?;
                let image = RgbaImage::from_raw(frame.width, frame.height, pixels).ok_or(
                    FrameError::BufferTooSmall {
                        required: frame.width as usize * frame.height as usize * 4,
                        actual: data.len(),
                    },
                )?;
                output = self.blur_plane(&image, sigma).into_raw();
            }
        }

        trace!(
            width = frame.width,
            height = frame.height,
            sigma,
            blur_ms = start.elapsed().as_millis(),
            "Blurred frame"
        );

        let buffer: Arc<dyn NativeBuffer> = SharedBuffer::new(output);
        let planes = frame.format.packed_planes(frame.width, frame.height);
        Frame::new(
            buffer,
            frame.format,
            frame.width,
            frame.height,
            planes,
            frame.rotation,
            frame.timestamp_ns,
        )
    }

    fn blur_plane<P>(
        &self,
        image: &image::ImageBuffer<P, Vec<u8>>,
        sigma: f32,
    ) -> image::ImageBuffer<P, Vec<u8>>
    where
        P: image::Pixel<Subpixel = u8> + 'static,
    {
        if !(sigma.is_finite() && sigma > 0.0) {
            return image.clone();
        }
        let (width, height) = image.dimensions();
        let factor = (sigma / self.working_sigma).ceil().max(1.0) as u32;
        if factor == 1 {
            return imageops::blur(image, sigma);
        }

        let small_width = width.div_ceil(factor);
        let small_height = height.div_ceil(factor);
        let small = imageops::resize(image, small_width, small_height, FilterType::Triangle);
        let blurred = imageops::blur(&small, sigma / factor as f32);
        imageops::resize(&blurred, width, height, FilterType::Triangle)
    }
}
