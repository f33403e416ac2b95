//! In-memory device runtime

use super::{DeviceProperties, DeviceRuntime};
use crate::error::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// `cudaErrorInvalidDevice`, returned for out-of-range ordinals
pub const INVALID_DEVICE: i32 = 101;

/// Device runtime serving fixed descriptors.
///
/// Used to replay a saved machine description, and as the stub capability
/// provider in tests. Peer access is granted between every pair of distinct
/// devices unless overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticRuntime {
    /// Packed driver version
    pub driver_version: i32,
    /// Packed runtime version
    pub runtime_version: i32,
    /// Device descriptors in ordinal order
    pub devices: Vec<DeviceProperties>,
    #[serde(skip)]
    peer_overrides: HashMap<(i32, i32), bool>,
    #[serde(skip)]
    count_error: Option<RuntimeError>,
    #[serde(skip)]
    property_errors: HashMap<i32, RuntimeError>,
}

impl SyntheticRuntime {
    /// Create a runtime with the given versions and no devices
    pub fn new(driver_version: i32, runtime_version: i32) -> Self {
        Self {
            driver_version,
            runtime_version,
            ..Self::default()
        }
    }

    /// Append a device; its ordinal is its position
    pub fn with_device(mut self, props: DeviceProperties) -> Self {
        self.devices.push(props);
        self
    }

    /// Override the peer access answer for one ordered pair
    pub fn with_peer_access(mut self, device: i32, peer: i32, supported: bool) -> Self {
        self.peer_overrides.insert((device, peer), supported);
        self
    }

    /// Make the device count query fail
    pub fn with_count_error(mut self, error: RuntimeError) -> Self {
        self.count_error = Some(error);
        self
    }

    /// Make the property query of one device fail
    pub fn with_properties_error(mut self, device: i32, error: RuntimeError) -> Self {
        self.property_errors.insert(device, error);
        self
    }

    /// Load a runtime description from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn device(&self, ordinal: i32) -> RuntimeResult<&DeviceProperties> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.devices.get(i))
            .ok_or_else(|| RuntimeError::new(INVALID_DEVICE, "invalid device ordinal"))
    }
}

impl DeviceRuntime for SyntheticRuntime {
    fn device_count(&self) -> RuntimeResult<i32> {
        match &self.count_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.devices.len() as i32),
        }
    }

    fn device_properties(&self, device: i32) -> RuntimeResult<DeviceProperties> {
        if let Some(err) = self.property_errors.get(&device) {
            return Err(err.clone());
        }
        self.device(device).cloned()
    }

    fn driver_version(&self) -> RuntimeResult<i32> {
        Ok(self.driver_version)
    }

    fn runtime_version(&self) -> RuntimeResult<i32> {
        Ok(self.runtime_version)
    }

    fn can_access_peer(&self, device: i32, peer: i32) -> RuntimeResult<bool> {
        self.device(device)?;
        self.device(peer)?;
        if device == peer {
            return Ok(false);
        }
        Ok(self
            .peer_overrides
            .get(&(device, peer))
            .copied()
            .unwrap_or(true))
    }
}
