// SPDX-License-Identifier: GPL-3.0-only

//! Throttled face detection
//!
//! Runs the detector on frame 0, N, 2N, ... and answers every other frame
//! from the last real result. The cached value can be up to N-1 frames
//! stale; that is the accepted price for keeping the average per-frame cost
//! low.
//!
//! Failure policy: a failed sample keeps the previous cached result. The
//! cache starts at "no face", so a failure before the first successful
//! sample means the frame is blurred.

use super::{FaceDetect, OrientedImage};
use crate::errors::DetectionError;
use tracing::trace;

/// Result of one [`ThrottledFaceDetector::sample`] call
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Face presence to act on for this frame
    pub has_face: bool,
    /// Whether the detector was invoked for this frame
    pub sampled: bool,
    /// Detector (or image preparation) failure, already absorbed
    pub error: Option<DetectionError>,
}

/// Detection state plus the detector it throttles
pub struct ThrottledFaceDetector {
    detector: Box<dyn FaceDetect>,
    interval: u32,
    /// Frames seen since the last sample, always `< interval`
    counter: u32,
    last: bool,
}

impl ThrottledFaceDetector {
    /// Wrap `detector`, sampling once every `interval` frames
    ///
    /// An interval of 0 is treated as 1 (sample every frame).
    pub fn new(detector: impl FaceDetect + 'static, interval: u32) -> Self {
        Self {
            detector: Box::new(detector),
            interval: interval.max(1),
            counter: 0,
            last: false,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Position within the current sampling window
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Most recent actual detector result
    pub fn last(&self) -> bool {
        self.last
    }

    /// Change the sampling interval
    ///
    /// Restarts the window so the next frame is sampled; the cached result
    /// is kept.
    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval.max(1);
        self.counter = 0;
    }

    /// Back to the initial state: counter 0, no face
    pub fn reset(&mut self) {
        self.counter = 0;
        self.last = false;
    }

    /// Decide face presence for one frame
    ///
    /// `prepare` builds the oriented image and is only called on sampled
    /// frames. The counter advances on every call.
    pub fn sample<F>(&mut self, prepare: F) -> Sample
    where
        F: FnOnce() -> Result<OrientedImage, DetectionError>,
    {
        let due = self.counter == 0;
        self.counter = (self.counter + 1) % self.interval;

        if !due {
            return Sample {
                has_face: self.last,
                sampled: false,
                error: None,
            };
        }

        match prepare().and_then(|image| self.detector.detect(&image)) {
            Ok(has_face) => {
                trace!(has_face, "Face detector sampled");
                self.last = has_face;
                Sample {
                    has_face,
                    sampled: true,
                    error: None,
                }
            }
            Err(error) => Sample {
                has_face: self.last,
                sampled: true,
                error: Some(error),
            },
        }
    }
}
