//! Device runtime abstraction
//!
//! [`DeviceRuntime`] is the seam between the reporter and the vendor
//! capability-query API. Every per-device call takes the device ordinal
//! explicitly; implementations must not depend on an ambient "current
//! device".

#[cfg(feature = "cuda")]
pub mod driver;
mod synthetic;

#[cfg(feature = "cuda")]
pub use driver::DriverRuntime;
pub use synthetic::SyntheticRuntime;

use crate::error::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};

/// Raw capability descriptor of one device.
///
/// Flag-like fields keep the driver's integer encoding (nonzero means
/// supported); conversion to `bool` happens when the report is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProperties {
    /// Marketing name
    pub name: String,
    /// Global memory in bytes
    pub total_global_mem: u64,
    /// Compute capability major
    pub major: i32,
    /// Compute capability minor
    pub minor: i32,
    /// Number of multiprocessors
    pub multi_processor_count: i32,
    /// Peak core clock in kHz
    pub clock_rate: i32,
    /// Peak memory clock in kHz
    pub memory_clock_rate: i32,
    /// Memory bus width in bits
    pub memory_bus_width: i32,
    /// L2 cache size in bytes
    pub l2_cache_size: i32,
    /// Maximum 1D texture width
    pub max_texture_1d: i32,
    /// Maximum 2D texture (width, height)
    pub max_texture_2d: [i32; 2],
    /// Maximum 3D texture (width, height, depth)
    pub max_texture_3d: [i32; 3],
    /// Maximum layered 1D texture (width, layers)
    pub max_texture_1d_layered: [i32; 2],
    /// Maximum layered 2D texture (width, height, layers)
    pub max_texture_2d_layered: [i32; 3],
    /// Constant memory in bytes
    pub total_const_mem: u64,
    /// Shared memory per block in bytes
    pub shared_mem_per_block: u64,
    /// Shared memory per multiprocessor in bytes
    pub shared_mem_per_multiprocessor: u64,
    /// 32-bit registers per block
    pub regs_per_block: i32,
    /// Warp size in threads
    pub warp_size: i32,
    /// Maximum resident threads per multiprocessor
    pub max_threads_per_multi_processor: i32,
    /// Maximum threads per block
    pub max_threads_per_block: i32,
    /// Maximum block dimensions
    pub max_threads_dim: [i32; 3],
    /// Maximum grid dimensions
    pub max_grid_size: [i32; 3],
    /// Maximum memory pitch in bytes
    pub mem_pitch: u64,
    /// Texture alignment in bytes
    pub texture_alignment: u64,
    /// Surface alignment in bytes
    pub surface_alignment: u64,
    /// Concurrent copy and kernel execution
    pub device_overlap: i32,
    /// Number of asynchronous copy engines
    pub async_engine_count: i32,
    /// Kernel run time limit enabled
    pub kernel_exec_timeout_enabled: i32,
    /// Integrated device sharing host memory
    pub integrated: i32,
    /// Can map host memory
    pub can_map_host_memory: i32,
    /// ECC enabled
    pub ecc_enabled: i32,
    /// TCC driver in use (Windows)
    pub tcc_driver: i32,
    /// Unified virtual addressing
    pub unified_addressing: i32,
    /// Managed memory
    pub managed_memory: i32,
    /// Compute preemption
    pub compute_preemption_supported: i32,
    /// Cooperative kernel launch
    pub cooperative_launch: i32,
    /// Multi-device cooperative kernel launch
    pub cooperative_multi_device_launch: i32,
    /// PCI domain
    pub pci_domain_id: i32,
    /// PCI bus
    pub pci_bus_id: i32,
    /// PCI device (location)
    pub pci_device_id: i32,
    /// Raw compute mode
    pub compute_mode: i32,
}

/// Capability-query API of the accelerator runtime
#[cfg_attr(test, mockall::automock)]
pub trait DeviceRuntime {
    /// Number of attached devices
    fn device_count(&self) -> RuntimeResult<i32>;

    /// Capability descriptor for the device with the given ordinal
    fn device_properties(&self, device: i32) -> RuntimeResult<DeviceProperties>;

    /// Packed driver version (e.g. 11020)
    fn driver_version(&self) -> RuntimeResult<i32>;

    /// Packed runtime version (e.g. 11040)
    fn runtime_version(&self) -> RuntimeResult<i32>;

    /// Whether `device` can directly access memory of `peer`
    fn can_access_peer(&self, device: i32, peer: i32) -> RuntimeResult<bool>;
}

/// Result code reported when no CUDA backend is compiled in
pub const NOT_COMPILED_IN: i32 = -1;

/// Runtime used when the crate is built without the `cuda` feature.
///
/// Every call fails, so a query reports the device count as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRuntime;

impl UnavailableRuntime {
    fn error() -> RuntimeError {
        RuntimeError::new(NOT_COMPILED_IN, "CUDA support not compiled in")
    }
}

impl DeviceRuntime for UnavailableRuntime {
    fn device_count(&self) -> RuntimeResult<i32> {
        Err(Self::error())
    }

    fn device_properties(&self, _device: i32) -> RuntimeResult<DeviceProperties> {
        Err(Self::error())
    }

    fn driver_version(&self) -> RuntimeResult<i32> {
        Err(Self::error())
    }

    fn runtime_version(&self) -> RuntimeResult<i32> {
        Err(Self::error())
    }

    fn can_access_peer(&self, _device: i32, _peer: i32) -> RuntimeResult<bool> {
        Err(Self::error())
    }
}

/// The runtime selected at build time
pub fn default_runtime() -> Box<dyn DeviceRuntime> {
    #[cfg(feature = "cuda")]
    {
        Box::new(DriverRuntime::new())
    }
    #[cfg(not(feature = "cuda"))]
    {
        Box::new(UnavailableRuntime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_runtime_fails_count() {
        let err = UnavailableRuntime.device_count().unwrap_err();
        assert_eq!(err.code, NOT_COMPILED_IN);
    }

    #[test]
    fn test_properties_deserialize_with_defaults() {
        let props: DeviceProperties =
            serde_json::from_str(r#"{"name": "Tesla T4", "major": 7, "minor": 5}"#).unwrap();
        assert_eq!(props.name, "Tesla T4");
        assert_eq!(props.major, 7);
        assert_eq!(props.total_global_mem, 0);
        assert_eq!(props.max_threads_dim, [0, 0, 0]);
    }
}
