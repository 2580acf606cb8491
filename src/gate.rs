// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame privacy gate
//!
//! [`FrameGate::process`] is called by the capturer once per frame, on the
//! capture thread, before the frame goes to the encoder:
//!
//! ```text
//! retain ─► orientation ─► throttled detection ─┬─ face ────► forward original ─► release
//!                                               └─ no face ─► blur ─► forward ─┘
//! ```
//!
//! Everything between retain and release runs under one lock. Orientation
//! and detection failures are absorbed (rotation 0, cached detection
//! result) so the sink always gets a frame unless the buffer itself is gone.

use crate::blur::BlurTransform;
use crate::config::Config;
use crate::constants::{ERROR_LOG_INTERVAL, FRAME_BUDGET_MS};
use crate::detection::{FaceDetect, OrientedImage, ThrottledFaceDetector};
use crate::errors::{BufferError, ConfigError, DetectionError};
use crate::frame::{BufferGuard, Frame, Rotation};
use crate::orientation::OrientationResolver;
use crate::stats::{PipelineStats, StatsSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Downstream consumer of processed frames (encoder / network path)
pub trait FrameSink {
    fn forward(&mut self, frame: Frame);
}

impl<F: FnMut(Frame)> FrameSink for F {
    fn forward(&mut self, frame: Frame) {
        self(frame)
    }
}

/// What [`FrameGate::process`] did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A face was present; the original frame was forwarded
    PassedThrough,
    /// No face; a blurred copy was forwarded
    Blurred,
    /// The buffer could not be retained but was still valid; the original
    /// was forwarded without detection or blur
    Unprocessed,
    /// Blurring failed; the original was forwarded
    BlurFailed,
    /// The buffer was already released; nothing was forwarded
    Dropped,
}

impl FrameOutcome {
    /// Whether the sink received a frame
    pub fn forwarded(&self) -> bool {
        !matches!(self, FrameOutcome::Dropped)
    }
}

/// Snapshot of the throttling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionState {
    /// Position in the sampling window; 0 means the next frame is sampled
    pub counter: u32,
    pub interval: u32,
    /// Most recent actual detector result
    pub last: bool,
}

struct GateState {
    resolver: OrientationResolver,
    detector: ThrottledFaceDetector,
    blur: BlurTransform,
    sigma: f32,
    max_dimension: u32,
}

/// The frame privacy pipeline
pub struct FrameGate {
    state: Mutex<GateState>,
    stats: Arc<PipelineStats>,
}

impl FrameGate {
    /// Build a gate from validated settings
    pub fn new(
        config: &Config,
        mut resolver: OrientationResolver,
        detector: impl FaceDetect + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(camera_id) = &config.camera_id {
            resolver.set_active_camera(camera_id.as_str());
        }

        info!(
            interval = config.face_detecting_frame_interval,
            sigma = config.blur_sigma,
            "Frame gate created"
        );

        Ok(Self {
            state: Mutex::new(GateState {
                resolver,
                detector: ThrottledFaceDetector::new(
                    detector,
                    config.face_detecting_frame_interval,
                ),
                blur: BlurTransform::new(config.blur_working_sigma),
                sigma: config.blur_sigma,
                max_dimension: config.detection_max_dimension,
            }),
            stats: Arc::new(PipelineStats::default()),
        })
    }

    /// Shared handle to this gate's counters
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn detection_state(&self) -> DetectionState {
        let state = self.lock();
        DetectionState {
            counter: state.detector.counter(),
            interval: state.detector.interval(),
            last: state.detector.last(),
        }
    }

    /// Apply new session settings between frames
    pub fn apply_config(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate()?;
        let mut state = self.lock();
        if state.detector.interval() != config.face_detecting_frame_interval {
            state
                .detector
                .set_interval(config.face_detecting_frame_interval);
        }
        state.sigma = config.blur_sigma;
        state.max_dimension = config.detection_max_dimension;
        state.blur = BlurTransform::new(config.blur_working_sigma);
        if let Some(camera_id) = &config.camera_id {
            state.resolver.set_active_camera(camera_id.as_str());
        }
        debug!(
            interval = config.face_detecting_frame_interval,
            sigma = config.blur_sigma,
            "Frame gate reconfigured"
        );
        Ok(())
    }

    /// Switch the camera used for orientation lookups (camera flip)
    pub fn set_active_camera(&self, camera_id: impl Into<String>) {
        self.lock().resolver.set_active_camera(camera_id);
    }

    /// Forget detection state (session closed)
    pub fn reset(&self) {
        self.lock().detector.reset();
        debug!("Frame gate reset");
    }

    /// Run one captured frame through the pipeline
    ///
    /// Calls `sink` at most once, synchronously, before returning. The sink
    /// is skipped only when the outcome is [`FrameOutcome::Dropped`].
    pub fn process<S: FrameSink + ?Sized>(&self, frame: Frame, sink: &mut S) -> FrameOutcome {
        let start = Instant::now();
        let frame_no = self.stats.record_frame();
        let mut state = self.lock();

        let buffer = Arc::clone(&frame.buffer);
        let guard = match BufferGuard::acquire(buffer.as_ref()) {
            Ok(guard) => guard,
            Err(error) => return self.retain_failed(frame, error, sink),
        };
        self.stats.record_retain();
        let data = guard.data();

        let rotation = match state.resolver.resolve(frame.rotation) {
            Ok(rotation) => rotation,
            Err(error) => {
                let count = self.stats.record_orientation_error();
                if should_log(count) {
                    warn!(error = %error, count, "Orientation lookup failed, assuming 0°");
                }
                Rotation::None
            }
        };

        let max_dimension = state.max_dimension;
        let sample = state.detector.sample(|| {
            OrientedImage::from_frame(data, &frame, rotation, max_dimension)
                .map_err(|e| DetectionError::MalformedImage(e.to_string()))
        });
        if sample.sampled {
            self.stats.record_detector_run();
        }
        if let Some(error) = &sample.error {
            let count = self.stats.record_detection_error();
            if should_log(count) {
                warn!(
                    error = %error,
                    count,
                    cached = sample.has_face,
                    "Face detection failed, reusing cached result"
                );
            }
        }

        let (output, outcome) = if sample.has_face {
            (frame, FrameOutcome::PassedThrough)
        } else {
            match state.blur.apply_to(data, &frame, state.sigma) {
                Ok(blurred) => (blurred, FrameOutcome::Blurred),
                Err(error) => {
                    let count = self.stats.record_blur_error();
                    if should_log(count) {
                        warn!(error = %error, count, "Blur failed, forwarding original frame");
                    }
                    (frame, FrameOutcome::BlurFailed)
                }
            }
        };

        trace!(
            frame = frame_no,
            rotation = %rotation,
            sampled = sample.sampled,
            has_face = sample.has_face,
            ?outcome,
            "Frame processed"
        );
        sink.forward(output);

        match guard.finish() {
            Ok(()) => {
                self.stats.record_release();
            }
            Err(error) => {
                self.stats.record_buffer_error();
                warn!(error = %error, frame = frame_no, "Buffer release failed");
            }
        }
        drop(state);

        self.record_outcome(outcome);
        let elapsed_ms = start.elapsed().as_millis();
        if elapsed_ms > FRAME_BUDGET_MS {
            let count = self.stats.record_overrun();
            if should_log(count) {
                debug!(elapsed_ms, sampled = sample.sampled, count, "Frame over budget");
            }
        }
        outcome
    }

    fn retain_failed<S: FrameSink + ?Sized>(
        &self,
        frame: Frame,
        error: BufferError,
        sink: &mut S,
    ) -> FrameOutcome {
        let count = self.stats.record_buffer_error();
        let outcome = if frame.buffer.is_valid() {
            if should_log(count) {
                warn!(error = %error, count, "Buffer retain failed, forwarding frame unprocessed");
            }
            sink.forward(frame);
            FrameOutcome::Unprocessed
        } else {
            if should_log(count) {
                warn!(error = %error, count, "Buffer already released, dropping frame");
            }
            FrameOutcome::Dropped
        };
        self.record_outcome(outcome);
        outcome
    }

    fn record_outcome(&self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::PassedThrough
            | FrameOutcome::Unprocessed
            | FrameOutcome::BlurFailed => {
                self.stats.record_passed_through();
            }
            FrameOutcome::Blurred => {
                self.stats.record_blurred();
            }
            FrameOutcome::Dropped => {
                self.stats.record_dropped();
            }
        }
    }

    // State is plain data that is consistent between statements, so a
    // panic in a sink doesn't leave it half-updated
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// First occurrence, then every `ERROR_LOG_INTERVAL`th
fn should_log(count: u64) -> bool {
    count == 1 || count % ERROR_LOG_INTERVAL == 0
}
