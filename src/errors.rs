// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame privacy pipeline
//!
//! Every error kind here is recoverable from the capture thread's point of
//! view: the gate absorbs them and still delivers a frame (or reports a
//! dropped frame). They exist so callers and logs can tell what degraded.

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level pipeline error
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Camera metadata or device state lookup failed
    Orientation(OrientationError),
    /// Underlying face detector failed
    Detection(DetectionError),
    /// Retain/release mismatch on an external pixel buffer
    Buffer(BufferError),
    /// Frame layout does not match its buffer
    Frame(FrameError),
    /// Invalid configuration
    Config(ConfigError),
}

/// Camera metadata lookup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrientationError {
    /// No camera metadata provider recognises this camera id
    UnknownCamera(String),
    /// The provider recognised the camera but the query failed
    Query { camera_id: String, message: String },
    /// Sensor orientation is not a multiple of 90 degrees
    InvalidSensorOrientation(i32),
    /// Device rotation or auto-rotate state could not be read
    DeviceState(String),
    /// No active camera has been selected
    NoActiveCamera,
}

/// Face detector errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// Image handed to the detector is empty or inconsistent
    MalformedImage(String),
    /// The detection model failed
    Model(String),
}

/// Buffer lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Buffer was already released by its owner; nothing was retained
    AlreadyReleased,
    /// Retain failed and it is unknown whether a reference was taken
    RetainUncertain(String),
    /// Release called more times than retain
    ReleaseUnderflow,
}

/// Frame layout errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Width or height is zero
    ZeroDimensions,
    /// Plane count does not match the pixel format
    PlaneCount { expected: usize, actual: usize },
    /// A plane's stride is narrower than its row
    StrideTooSmall {
        plane: usize,
        stride: u32,
        row_bytes: usize,
    },
    /// A plane's pixel size does not match the frame size for its format
    PlaneGeometry {
        plane: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Buffer ends before a plane does
    BufferTooSmall { required: usize, actual: usize },
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Detection interval must be at least 1
    InvalidInterval(u32),
    /// Blur sigma must be finite and positive
    InvalidSigma(f32),
    /// Detection max dimension must be non-zero
    InvalidMaxDimension,
    /// Working sigma must be finite and positive
    InvalidWorkingSigma(f32),
    /// Reading the config file failed
    Io(String),
    /// Parsing the config file failed
    Parse(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Orientation(e) => write!(f, "Orientation error: {}", e),
            PipelineError::Detection(e) => write!(f, "Detection error: {}", e),
            PipelineError::Buffer(e) => write!(f, "Buffer lifecycle error: {}", e),
            PipelineError::Frame(e) => write!(f, "Frame error: {}", e),
            PipelineError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for OrientationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrientationError::UnknownCamera(id) => write!(f, "Unknown camera id: {}", id),
            OrientationError::Query { camera_id, message } => {
                write!(f, "Metadata query for camera {} failed: {}", camera_id, message)
            }
            OrientationError::InvalidSensorOrientation(deg) => {
                write!(f, "Invalid sensor orientation: {}°", deg)
            }
            OrientationError::DeviceState(msg) => write!(f, "Device state unavailable: {}", msg),
            OrientationError::NoActiveCamera => write!(f, "No active camera selected"),
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::MalformedImage(msg) => write!(f, "Malformed image: {}", msg),
            DetectionError::Model(msg) => write!(f, "Model error: {}", msg),
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::AlreadyReleased => write!(f, "Buffer already released"),
            BufferError::RetainUncertain(msg) => write!(f, "Retain outcome uncertain: {}", msg),
            BufferError::ReleaseUnderflow => write!(f, "Release without matching retain"),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::ZeroDimensions => write!(f, "Frame has zero width or height"),
            FrameError::PlaneCount { expected, actual } => {
                write!(f, "Expected {} planes, got {}", expected, actual)
            }
            FrameError::StrideTooSmall {
                plane,
                stride,
                row_bytes,
            } => write!(
                f,
                "Plane {} stride {} is smaller than row size {}",
                plane, stride, row_bytes
            ),
            FrameError::PlaneGeometry {
                plane,
                expected,
                actual,
            } => write!(
                f,
                "Plane {} is {}x{}, expected {}x{}",
                plane, actual.0, actual.1, expected.0, expected.1
            ),
            FrameError::BufferTooSmall { required, actual } => {
                write!(f, "Buffer holds {} bytes, layout needs {}", actual, required)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidInterval(n) => {
                write!(f, "Face detecting frame interval must be positive, got {}", n)
            }
            ConfigError::InvalidSigma(s) => write!(f, "Blur sigma must be positive, got {}", s),
            ConfigError::InvalidMaxDimension => {
                write!(f, "Detection max dimension must be non-zero")
            }
            ConfigError::InvalidWorkingSigma(s) => {
                write!(f, "Blur working sigma must be positive, got {}", s)
            }
            ConfigError::Io(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for OrientationError {}
impl std::error::Error for DetectionError {}
impl std::error::Error for BufferError {}
impl std::error::Error for FrameError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to PipelineError
impl From<OrientationError> for PipelineError {
    fn from(err: OrientationError) -> Self {
        PipelineError::Orientation(err)
    }
}

impl From<DetectionError> for PipelineError {
    fn from(err: DetectionError) -> Self {
        PipelineError::Detection(err)
    }
}

impl From<BufferError> for PipelineError {
    fn from(err: BufferError) -> Self {
        PipelineError::Buffer(err)
    }
}

impl From<FrameError> for PipelineError {
    fn from(err: FrameError) -> Self {
        PipelineError::Frame(err)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
