// SPDX-License-Identifier: GPL-3.0-only

//! Orientation compensation
//!
//! Works out how far a captured frame must be rotated to appear upright.
//! With auto-rotation enabled the capturer's own per-frame hint is already
//! correct and is passed through. With rotation locked the compensation is
//! derived from the sensor mounting angle, the device rotation and which
//! way the camera faces:
//!
//! ```text
//! front:  (sensor + device) mod 360
//! back:   (sensor - device + 360) mod 360
//! ```

pub mod providers;

pub use providers::{
    CameraApi, CameraInfoProvider, DescriptorCameraInfo, DescriptorSource, LegacyCameraEntry,
    LegacyCameraInfo, LegacySource,
};

use crate::errors::OrientationError;
use crate::frame::Rotation;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::debug;

/// Which way a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraFacing {
    /// Same side as the screen (selfie camera)
    Front,
    /// Away from the screen
    Back,
    /// Not attached to the device body
    External,
}

impl CameraFacing {
    /// Parse a camera location string ("front", "back", "external")
    pub fn from_location(location: &str) -> Option<Self> {
        match location.trim().to_ascii_lowercase().as_str() {
            "front" => Some(CameraFacing::Front),
            "back" => Some(CameraFacing::Back),
            "external" => Some(CameraFacing::External),
            _ => None,
        }
    }
}

/// Static sensor metadata for one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraCharacteristics {
    /// Clockwise angle the sensor is mounted at
    pub sensor_orientation: Rotation,
    pub facing: CameraFacing,
}

/// Display rotation as reported by the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DeviceRotation {
    /// Map a surface rotation code (0..=3) to a rotation
    pub fn from_surface_rotation(code: i32) -> Option<Self> {
        match code {
            0 => Some(DeviceRotation::Rotation0),
            1 => Some(DeviceRotation::Rotation90),
            2 => Some(DeviceRotation::Rotation180),
            3 => Some(DeviceRotation::Rotation270),
            _ => None,
        }
    }

    /// Map a degree value (multiple of 90) to a rotation
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        Rotation::from_degrees(degrees).map(|r| match r {
            Rotation::None => DeviceRotation::Rotation0,
            Rotation::Rotate90 => DeviceRotation::Rotation90,
            Rotation::Rotate180 => DeviceRotation::Rotation180,
            Rotation::Rotate270 => DeviceRotation::Rotation270,
        })
    }

    pub fn degrees(&self) -> u32 {
        match self {
            DeviceRotation::Rotation0 => 0,
            DeviceRotation::Rotation90 => 90,
            DeviceRotation::Rotation180 => 180,
            DeviceRotation::Rotation270 => 270,
        }
    }

    fn surface_code(&self) -> u8 {
        match self {
            DeviceRotation::Rotation0 => 0,
            DeviceRotation::Rotation90 => 1,
            DeviceRotation::Rotation180 => 2,
            DeviceRotation::Rotation270 => 3,
        }
    }
}

/// Current device rotation and rotation-lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub rotation: DeviceRotation,
    /// `false` when the user has locked screen rotation
    pub auto_rotate: bool,
}

/// Source of the current [`DeviceState`]
pub trait DeviceStateProvider: Send + Sync {
    fn device_state(&self) -> Result<DeviceState, OrientationError>;
}

/// A fixed device state
impl DeviceStateProvider for DeviceState {
    fn device_state(&self) -> Result<DeviceState, OrientationError> {
        Ok(*self)
    }
}

/// Device state shared between the UI thread (writer) and the capture
/// thread (reader)
#[derive(Debug)]
pub struct DeviceStateCell {
    rotation: AtomicU8,
    auto_rotate: AtomicBool,
}

impl DeviceStateCell {
    pub fn new(state: DeviceState) -> Self {
        Self {
            rotation: AtomicU8::new(state.rotation.surface_code()),
            auto_rotate: AtomicBool::new(state.auto_rotate),
        }
    }

    pub fn set_rotation(&self, rotation: DeviceRotation) {
        self.rotation.store(rotation.surface_code(), Ordering::Release);
    }

    pub fn set_auto_rotate(&self, auto_rotate: bool) {
        self.auto_rotate.store(auto_rotate, Ordering::Release);
    }
}

impl DeviceStateProvider for DeviceStateCell {
    fn device_state(&self) -> Result<DeviceState, OrientationError> {
        let code = self.rotation.load(Ordering::Acquire);
        let rotation = DeviceRotation::from_surface_rotation(code as i32).ok_or_else(|| {
            OrientationError::DeviceState(format!("invalid rotation code {}", code))
        })?;
        Ok(DeviceState {
            rotation,
            auto_rotate: self.auto_rotate.load(Ordering::Acquire),
        })
    }
}

impl<T: DeviceStateProvider + ?Sized> DeviceStateProvider for std::sync::Arc<T> {
    fn device_state(&self) -> Result<DeviceState, OrientationError> {
        (**self).device_state()
    }
}

/// Rotation that makes a locked-orientation frame upright
pub fn compensation(sensor: Rotation, device: DeviceRotation, facing: CameraFacing) -> Rotation {
    let sensor = sensor.degrees() as i32;
    let device = device.degrees() as i32;
    let degrees = match facing {
        CameraFacing::Front => (sensor + device) % 360,
        CameraFacing::Back | CameraFacing::External => (sensor - device + 360) % 360,
    };
    // Both operands are multiples of 90, so the result is too
    Rotation::from_degrees(degrees).unwrap_or_default()
}

/// Pure resolution step: hint when auto-rotating, compensation otherwise
pub fn resolve_rotation(
    hint: Rotation,
    state: &DeviceState,
    characteristics: &CameraCharacteristics,
) -> Rotation {
    if state.auto_rotate {
        hint
    } else {
        compensation(
            characteristics.sensor_orientation,
            state.rotation,
            characteristics.facing,
        )
    }
}

struct CachedCamera {
    camera_id: String,
    characteristics: CameraCharacteristics,
}

/// Resolves frame orientation for the active camera
///
/// Camera characteristics are looked up through the first provider whose
/// probe accepts the active camera id and are cached until the camera or
/// the rotation-lock state changes.
pub struct OrientationResolver {
    providers: Vec<Box<dyn CameraInfoProvider>>,
    device: Box<dyn DeviceStateProvider>,
    active_camera: Option<String>,
    cache: Option<CachedCamera>,
}

impl OrientationResolver {
    /// Create a resolver with no metadata providers
    pub fn new(device: impl DeviceStateProvider + 'static) -> Self {
        Self {
            providers: Vec::new(),
            device: Box::new(device),
            active_camera: None,
            cache: None,
        }
    }

    /// Add a metadata provider; earlier providers are probed first
    pub fn with_provider(mut self, provider: impl CameraInfoProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn active_camera(&self) -> Option<&str> {
        self.active_camera.as_deref()
    }

    /// Switch the camera frames are coming from
    pub fn set_active_camera(&mut self, camera_id: impl Into<String>) {
        let camera_id = camera_id.into();
        if self.active_camera.as_deref() != Some(camera_id.as_str()) {
            debug!(camera_id = %camera_id, "Active camera changed");
            self.cache = None;
            self.active_camera = Some(camera_id);
        }
    }

    /// Rotation to present the current frame upright
    ///
    /// `hint` is the rotation the capturer attached to the frame.
    pub fn resolve(&mut self, hint: Rotation) -> Result<Rotation, OrientationError> {
        let state = self.device.device_state()?;
        if state.auto_rotate {
            // Lock state changed (or was never locked); re-read on next lock
            self.cache = None;
            return Ok(hint);
        }
        let characteristics = self.characteristics()?;
        Ok(resolve_rotation(hint, &state, &characteristics))
    }

    fn characteristics(&mut self) -> Result<CameraCharacteristics, OrientationError> {
        let camera_id = self
            .active_camera
            .as_deref()
            .ok_or(OrientationError::NoActiveCamera)?;

        if let Some(cached) = &self.cache
            && cached.camera_id == camera_id
        {
            return Ok(cached.characteristics);
        }

        let provider = self
            .providers
            .iter()
            .find(|p| p.probe(camera_id))
            .ok_or_else(|| OrientationError::UnknownCamera(camera_id.to_string()))?;
        let characteristics = provider.characteristics(camera_id)?;

        debug!(
            camera_id = %camera_id,
            api = %provider.api(),
            sensor = %characteristics.sensor_orientation,
            facing = ?characteristics.facing,
            "Loaded camera characteristics"
        );

        self.cache = Some(CachedCamera {
            camera_id: camera_id.to_string(),
            characteristics,
        });
        Ok(characteristics)
    }
}
