// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants and tunable defaults

/// Default number of frames between two face detector invocations
///
/// Frames in between reuse the last detector result. Observed deployments
/// used 10 and 30; 10 keeps the privacy blur responsive when a face leaves
/// the picture (about a third of a second at 30fps).
pub const DEFAULT_FACE_DETECTING_FRAME_INTERVAL: u32 = 10;

/// Default gaussian blur strength applied to frames without a face
pub const DEFAULT_BLUR_SIGMA: f32 = 40.0;

/// Longest edge (pixels) of the image handed to the face detector
///
/// Larger frames are downscaled first, the same way the QR scanner keeps
/// detection cost bounded.
pub const DEFAULT_DETECTION_MAX_DIMENSION: u32 = 640;

/// Largest sigma applied at working resolution
///
/// Above this, the plane is downscaled by `ceil(sigma / working_sigma)`,
/// blurred with the reduced sigma and scaled back up.
pub const DEFAULT_BLUR_WORKING_SIGMA: f32 = 6.0;

/// Recoverable errors are logged on the first occurrence and then once
/// every this many occurrences
pub const ERROR_LOG_INTERVAL: u64 = 300;

/// Nominal frame interval at 30fps, used for overrun diagnostics
pub const FRAME_BUDGET_MS: u128 = 33;

/// Default folder name for CLI output
pub const DEFAULT_OUTPUT_FOLDER: &str = "PrivacyGate";

/// Application directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "privacy-gate";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Property keys understood by descriptor-based camera metadata
pub mod properties {
    /// Sensor mounting rotation in degrees (clockwise)
    pub const ROTATION: &str = "api.libcamera.rotation";

    /// Camera location: "front", "back" or "external"
    pub const LOCATION: &str = "api.libcamera.location";
}

/// Facing constants reported by the legacy camera API
pub mod legacy {
    /// Camera faces away from the screen
    pub const CAMERA_FACING_BACK: i32 = 0;

    /// Camera faces the same direction as the screen
    pub const CAMERA_FACING_FRONT: i32 = 1;
}
