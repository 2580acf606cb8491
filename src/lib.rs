// SPDX-License-Identifier: GPL-3.0-only

//! Privacy Gate - blur outgoing video frames unless a face is visible
//!
//! Sits between a camera capturer and a video encoder. Each frame is
//! oriented upright, checked for faces by a throttled detector and either
//! forwarded untouched or replaced with a Gaussian-blurred copy.
//!
//! # Architecture
//!
//! - [`frame`]: frame data model and scoped buffer retain/release
//! - [`orientation`]: sensor/device rotation compensation per camera
//! - [`detection`]: face detector capability and frame-interval throttling
//! - [`blur`]: Gaussian blur of every plane into a new buffer
//! - [`gate`]: the per-frame orchestrator ([`FrameGate`])
//! - [`capture`]: capture thread driving a gate from a frame source
//! - [`config`]: tunables and JSON config file
//!
//! # Example
//!
//! ```no_run
//! use privacy_gate::orientation::{DeviceRotation, DeviceState, OrientationResolver};
//! use privacy_gate::detection::OrientedImage;
//! use privacy_gate::errors::DetectionError;
//! use privacy_gate::{Config, Frame, FrameGate};
//!
//! let resolver = OrientationResolver::new(DeviceState {
//!     rotation: DeviceRotation::Rotation0,
//!     auto_rotate: true,
//! });
//! let detector = |_: &OrientedImage| -> Result<bool, DetectionError> { Ok(false) };
//! let gate = FrameGate::new(&Config::default(), resolver, detector)?;
//!
//! let frame = Frame::from_rgba_image(image::RgbaImage::new(64, 48), Default::default(), 0)?;
//! gate.process(frame, &mut |out: Frame| {
//!     // hand `out` to the encoder
//!     let _ = out;
//! });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod blur;
pub mod capture;
pub mod config;
pub mod constants;
pub mod detection;
pub mod errors;
pub mod frame;
pub mod gate;
pub mod orientation;
pub mod stats;

// Re-export commonly used types
pub use blur::BlurTransform;
pub use capture::{CaptureLoopController, FrameSource};
pub use config::Config;
pub use errors::{PipelineError, PipelineResult};
pub use frame::{Frame, PixelFormat, Rotation};
pub use gate::{FrameGate, FrameOutcome, FrameSink};
pub use stats::{PipelineStats, StatsSnapshot};
