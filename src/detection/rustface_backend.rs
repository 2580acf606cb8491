// SPDX-License-Identifier: GPL-3.0-only

//! Face detector backed by the `rustface` crate (SeetaFace engine)

use super::{FaceDetect, OrientedImage};
use crate::errors::DetectionError;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

/// Smallest face (pixels, in the oriented detection image) worth reporting
const MIN_FACE_SIZE: u32 = 20;

/// SeetaFace frontal face detector
///
/// The model is loaded once; a detector instance is created per sample
/// since detector state is tied to a single image pyramid.
pub struct RustfaceDetector {
    model: rustface::Model,
    score_thresh: f64,
}

impl RustfaceDetector {
    /// Load a SeetaFace model file (e.g. `seeta_fd_frontal_v1.0.bin`)
    pub fn from_model_file(path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DetectionError::Model(format!("cannot open model {}: {}", path.display(), e))
        })?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| DetectionError::Model(format!("invalid model: {}", e)))?;
        debug!(path = %path.display(), "Loaded SeetaFace model");
        Ok(Self {
            model,
            score_thresh: 2.0,
        })
    }

    /// Minimum classifier score for a window to count as a face
    pub fn with_score_thresh(mut self, score_thresh: f64) -> Self {
        self.score_thresh = score_thresh;
        self
    }
}

impl FaceDetect for RustfaceDetector {
    fn detect(&mut self, image: &OrientedImage) -> Result<bool, DetectionError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(DetectionError::MalformedImage(format!(
                "{}x{} image",
                width, height
            )));
        }
        if width < MIN_FACE_SIZE || height < MIN_FACE_SIZE {
            return Ok(false);
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(MIN_FACE_SIZE);
        detector.set_score_thresh(self.score_thresh);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(image.pixels(), width, height));
        trace!(count = faces.len(), width, height, "SeetaFace detection");
        Ok(!faces.is_empty())
    }
}
