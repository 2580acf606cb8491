// SPDX-License-Identifier: GPL-3.0-only

//! Camera metadata providers
//!
//! Two camera stacks describe sensors differently: the descriptor API keys
//! cameras by string id and exposes a property list, the legacy API numbers
//! cameras and returns a fixed info record. Both are reduced to
//! [`CameraCharacteristics`] so the resolver never branches on which stack
//! answered.

use super::{CameraCharacteristics, CameraFacing};
use crate::constants::{legacy, properties};
use crate::errors::OrientationError;
use crate::frame::Rotation;
use std::collections::HashMap;

/// Which camera stack a provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraApi {
    /// Descriptor/property based API
    Descriptor,
    /// Index based legacy API
    Legacy,
}

impl std::fmt::Display for CameraApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraApi::Descriptor => write!(f, "descriptor"),
            CameraApi::Legacy => write!(f, "legacy"),
        }
    }
}

/// Source of per-camera sensor metadata
pub trait CameraInfoProvider: Send {
    /// Camera stack behind this provider
    fn api(&self) -> CameraApi;

    /// Whether this provider can answer for `camera_id`
    ///
    /// Probing must be cheap and must not fail; a stack that can't
    /// enumerate simply reports `false`.
    fn probe(&self, camera_id: &str) -> bool;

    /// Sensor orientation and facing for `camera_id`
    fn characteristics(&self, camera_id: &str)
    -> Result<CameraCharacteristics, OrientationError>;
}

/// Raw access to the descriptor camera stack
pub trait DescriptorSource: Send {
    /// Ids of all cameras the stack knows about
    fn camera_ids(&self) -> Result<Vec<String>, String>;

    /// Property list of one camera
    fn properties(&self, camera_id: &str) -> Result<HashMap<String, String>, String>;
}

/// Static descriptor table, keyed by camera id
impl DescriptorSource for HashMap<String, HashMap<String, String>> {
    fn camera_ids(&self) -> Result<Vec<String>, String> {
        Ok(self.keys().cloned().collect())
    }

    fn properties(&self, camera_id: &str) -> Result<HashMap<String, String>, String> {
        self.get(camera_id)
            .cloned()
            .ok_or_else(|| format!("no descriptor for {}", camera_id))
    }
}

/// Metadata provider for the descriptor camera stack
pub struct DescriptorCameraInfo<S> {
    source: S,
}

impl<S: DescriptorSource> DescriptorCameraInfo<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: DescriptorSource> CameraInfoProvider for DescriptorCameraInfo<S> {
    fn api(&self) -> CameraApi {
        CameraApi::Descriptor
    }

    fn probe(&self, camera_id: &str) -> bool {
        self.source
            .camera_ids()
            .map(|ids| ids.iter().any(|id| id == camera_id))
            .unwrap_or(false)
    }

    fn characteristics(
        &self,
        camera_id: &str,
    ) -> Result<CameraCharacteristics, OrientationError> {
        let props = self
            .source
            .properties(camera_id)
            .map_err(|message| OrientationError::Query {
                camera_id: camera_id.to_string(),
                message,
            })?;

        // Missing rotation means the sensor is mounted upright
        let raw_rotation = props
            .get(properties::ROTATION)
            .map(String::as_str)
            .unwrap_or("");
        let sensor_orientation = Rotation::parse(raw_rotation).ok_or_else(|| {
            raw_rotation
                .trim()
                .parse::<i32>()
                .map(OrientationError::InvalidSensorOrientation)
                .unwrap_or_else(|_| OrientationError::Query {
                    camera_id: camera_id.to_string(),
                    message: format!("unparseable rotation {:?}", raw_rotation),
                })
        })?;

        let facing = props
            .get(properties::LOCATION)
            .and_then(|loc| CameraFacing::from_location(loc))
            .unwrap_or(CameraFacing::External);

        Ok(CameraCharacteristics {
            sensor_orientation,
            facing,
        })
    }
}

/// Info record returned by the legacy camera stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyCameraEntry {
    /// Sensor orientation in degrees
    pub orientation: i32,
    /// `CAMERA_FACING_BACK` or `CAMERA_FACING_FRONT`
    pub facing: i32,
}

/// Raw access to the legacy camera stack
pub trait LegacySource: Send {
    fn number_of_cameras(&self) -> usize;

    fn camera_info(&self, index: usize) -> Result<LegacyCameraEntry, String>;
}

/// Static legacy table, indexed by camera number
impl LegacySource for Vec<LegacyCameraEntry> {
    fn number_of_cameras(&self) -> usize {
        self.len()
    }

    fn camera_info(&self, index: usize) -> Result<LegacyCameraEntry, String> {
        self.get(index)
            .copied()
            .ok_or_else(|| format!("camera index {} out of range", index))
    }
}

/// Metadata provider for the legacy camera stack
///
/// Legacy camera ids are decimal indices ("0", "1", ...).
pub struct LegacyCameraInfo<S> {
    source: S,
}

impl<S: LegacySource> LegacyCameraInfo<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: LegacySource> CameraInfoProvider for LegacyCameraInfo<S> {
    fn api(&self) -> CameraApi {
        CameraApi::Legacy
    }

    fn probe(&self, camera_id: &str) -> bool {
        camera_id
            .parse::<usize>()
            .is_ok_and(|index| index < self.source.number_of_cameras())
    }

    fn characteristics(
        &self,
        camera_id: &str,
    ) -> Result<CameraCharacteristics, OrientationError> {
        let index = camera_id
            .parse::<usize>()
            .map_err(|_| OrientationError::UnknownCamera(camera_id.to_string()))?;
        let entry = self
            .source
            .camera_info(index)
            .map_err(|message| OrientationError::Query {
                camera_id: camera_id.to_string(),
                message,
            })?;

        let sensor_orientation = Rotation::from_degrees(entry.orientation)
            .ok_or(OrientationError::InvalidSensorOrientation(entry.orientation))?;
        let facing = match entry.facing {
            legacy::CAMERA_FACING_FRONT => CameraFacing::Front,
            legacy::CAMERA_FACING_BACK => CameraFacing::Back,
            other => {
                return Err(OrientationError::Query {
                    camera_id: camera_id.to_string(),
                    message: format!("unknown facing constant {}", other),
                });
            }
        };

        Ok(CameraCharacteristics {
            sensor_orientation,
            facing,
        })
    }
}
