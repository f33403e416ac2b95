//! High-level API for CUDA device queries

use crate::bounded::BoundedString;
use crate::error::{QueryError, QueryResult};
use crate::mappings::ComputeMode;
use crate::query::{console_write, DeviceQuery, PeerAccess, QueryConfig};
use crate::runtime::{default_runtime, DeviceRuntime};
use crate::version::CudaVersion;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Capacity of the bounded text fields, including the C terminator
pub const TEXT_FIELD_LEN: usize = 256;

/// Bounded text field of a [`DeviceReport`]
pub type TextField = BoundedString<TEXT_FIELD_LEN>;

/// Maximum texture sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDimensions {
    /// 1D width
    pub d1: i32,
    /// 2D (width, height)
    pub d2: [i32; 2],
    /// 3D (width, height, depth)
    pub d3: [i32; 3],
}

/// Maximum layered 1D texture size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayeredTexture1d {
    /// Width
    pub width: i32,
    /// Number of layers
    pub layers: i32,
}

/// Maximum layered 2D texture size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayeredTexture2d {
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
    /// Number of layers
    pub layers: i32,
}

/// Three-component size limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dim3 {
    /// X extent
    pub x: i32,
    /// Y extent
    pub y: i32,
    /// Z extent
    pub z: i32,
}

impl From<[i32; 3]> for Dim3 {
    fn from(v: [i32; 3]) -> Self {
        Self { x: v[0], y: v[1], z: v[2] }
    }
}

/// PCI location of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciLocation {
    /// PCI domain
    pub domain_id: i32,
    /// PCI bus
    pub bus_id: i32,
    /// PCI device (location)
    pub location_id: i32,
}

/// Flat capability record of one device.
///
/// When `success` is false no other field is meaningful and all of them
/// hold their default values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReport {
    /// Query completed and at least one device was found
    pub success: bool,
    /// Device ordinal
    pub device_index: i32,
    /// Device name
    pub device_name: TextField,
    /// Installed driver version
    pub driver_version: CudaVersion,
    /// Linked runtime version
    pub runtime_version: CudaVersion,
    /// Compute capability
    pub compute_capability: CudaVersion,
    /// Architecture family name
    pub architecture: String,
    /// Global memory as `"<N> MBytes (<bytes> bytes)"`
    pub total_global_memory: TextField,
    /// Global memory in bytes
    pub total_global_memory_bytes: u64,
    /// Multiprocessor count
    pub multiprocessors: i32,
    /// CUDA cores per multiprocessor
    pub cuda_cores_per_multiprocessor: i32,
    /// Total CUDA cores
    pub cuda_cores: i32,
    /// Peak core clock in kHz
    pub gpu_max_clock_rate: i32,
    /// Peak memory clock in kHz
    pub memory_clock_rate: i32,
    /// Memory bus width in bits
    pub memory_bus_width: i32,
    /// L2 cache size in bytes
    pub l2_cache_size: i32,
    /// Maximum texture sizes
    pub max_texture_dimension_size: TextureDimensions,
    /// Maximum layered 1D texture size
    pub max_layered_1d_texture_size: LayeredTexture1d,
    /// Maximum layered 2D texture size
    pub max_layered_2d_texture_size: LayeredTexture2d,
    /// Constant memory in bytes
    pub total_constant_memory: i64,
    /// Shared memory per block in bytes
    pub total_shared_memory_per_block: i64,
    /// Shared memory per multiprocessor in bytes
    pub total_shared_memory_per_multiprocessor: i64,
    /// Registers per block
    pub total_registers_per_block: i32,
    /// Warp size
    pub warp_size: i32,
    /// Maximum threads per multiprocessor
    pub max_threads_per_multiprocessor: i32,
    /// Maximum threads per block
    pub max_threads_per_block: i32,
    /// Maximum block dimensions
    pub max_dimension_size_of_thread_block: Dim3,
    /// Maximum grid dimensions
    pub max_dimension_size_of_grid_size: Dim3,
    /// Maximum memory pitch in bytes
    pub max_memory_pitch: i64,
    /// Texture alignment in bytes
    pub texture_alignment: i64,
    /// Number of asynchronous copy engines
    pub async_engine_count: i32,
    /// Concurrent copy and kernel execution
    pub concurrent_copy_and_kernel_execution: bool,
    /// Run time limit on kernels
    pub run_time_limit_on_kernels: bool,
    /// Integrated GPU sharing host memory
    pub integrated_gpu_sharing_host_memory: bool,
    /// Host page-locked memory mapping
    pub support_host_page_locked_memory_mapping: bool,
    /// Alignment requirement for surfaces
    pub alignment_requirement_for_surfaces: bool,
    /// ECC enabled
    pub device_has_ecc_support: bool,
    /// Unified virtual addressing
    pub device_supports_unified_addressing: bool,
    /// Managed memory
    pub device_supports_managed_memory: bool,
    /// Compute preemption
    pub device_supports_compute_preemption: bool,
    /// Cooperative kernel launch
    pub supports_cooperative_kernel_launch: bool,
    /// Multi-device cooperative kernel launch
    pub supports_multi_device_coop_kernel_launch: bool,
    /// PCI location
    pub pci: PciLocation,
    /// Compute mode
    pub compute_mode: ComputeMode,
}

impl DeviceReport {
    /// The record returned for any failed query
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Result of one full device query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReport {
    /// One record per device, in ordinal order
    pub devices: Vec<DeviceReport>,
    /// Installed driver version
    pub driver_version: CudaVersion,
    /// Linked runtime version
    pub runtime_version: CudaVersion,
    /// Peer access results between eligible devices
    pub peer_access: Vec<PeerAccess>,
    /// One-line profile summary
    pub summary: String,
    /// When the query ran
    pub queried_at: DateTime<Utc>,
}

impl QueryReport {
    /// Number of devices found
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// The single record exposed by the flat interface.
    ///
    /// This is the last device enumerated, matching the historical
    /// contract where later devices overwrote earlier ones. Prefer
    /// [`QueryReport::devices`] when all devices matter.
    pub fn primary(&self) -> Option<&DeviceReport> {
        self.devices.last()
    }

    /// Consume the report, keeping only the primary record
    pub fn into_primary(mut self) -> DeviceReport {
        self.devices.pop().unwrap_or_else(DeviceReport::failed)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> QueryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Export the report to a JSON file
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> QueryResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Query all devices through the default runtime.
///
/// Never fails: any error yields a record with `success == false`. The
/// console report is written to stdout.
pub fn run_query() -> DeviceReport {
    let runtime = default_runtime();
    run_query_with(runtime.as_ref(), &QueryConfig::default())
}

/// Query all devices through a given runtime, flat interface
pub fn run_query_with(runtime: &dyn DeviceRuntime, config: &QueryConfig) -> DeviceReport {
    match query_devices(runtime, config) {
        Ok(report) => report.into_primary(),
        Err(_) => DeviceReport::failed(),
    }
}

/// Query all devices, printing the console report to stdout
pub fn query_devices(
    runtime: &dyn DeviceRuntime,
    config: &QueryConfig,
) -> QueryResult<QueryReport> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    query_devices_to(runtime, config, &mut out)
}

/// Query all devices, printing the console report to `out`
pub fn query_devices_to(
    runtime: &dyn DeviceRuntime,
    config: &QueryConfig,
    out: &mut dyn Write,
) -> QueryResult<QueryReport> {
    let query = DeviceQuery::new(runtime, config.clone());
    match query.run(out) {
        Ok(report) => Ok(report),
        Err(e) => {
            error!("device query failed: {}", e);
            console_write(query.print_failure(&e, out));
            Err(e)
        }
    }
}

/// Whether a failure means no usable device rather than a broken runtime
pub fn is_no_device(err: &QueryError) -> bool {
    matches!(err, QueryError::NoDevicesFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::runtime::{DeviceProperties, MockDeviceRuntime, SyntheticRuntime};
    use pretty_assertions::assert_eq;

    fn device(name: &str, major: i32) -> DeviceProperties {
        DeviceProperties {
            name: name.to_string(),
            total_global_mem: 8_589_934_592,
            major,
            minor: 0,
            multi_processor_count: 40,
            ..DeviceProperties::default()
        }
    }

    fn quiet() -> QueryConfig {
        QueryConfig::quiet()
    }

    #[test]
    fn test_zero_devices_is_failure_with_defaults() {
        let rt = SyntheticRuntime::new(11020, 11040);
        let report = run_query_with(&rt, &quiet());
        assert!(!report.success);
        assert_eq!(report, DeviceReport::default());
    }

    #[test]
    fn test_count_failure_is_failure() {
        let mut mock = MockDeviceRuntime::new();
        mock.expect_device_count()
            .times(2)
            .returning(|| Err(RuntimeError::new(35, "CUDA driver version is insufficient")));
        mock.expect_device_properties().never();

        let mut out = Vec::new();
        let err = query_devices_to(&mock, &quiet(), &mut out).unwrap_err();
        assert!(matches!(err, QueryError::DeviceCountQueryFailed(ref e) if e.code == 35));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("cudaGetDeviceCount returned 35"));
        assert!(text.contains("-> CUDA driver version is insufficient"));
        assert!(text.contains("Result = FAIL"));

        assert!(!run_query_with(&mock, &quiet()).success);
    }

    #[test]
    fn test_property_failure_fails_whole_query() {
        let mut mock = MockDeviceRuntime::new();
        mock.expect_device_count().returning(|| Ok(2));
        mock.expect_driver_version().returning(|| Ok(11020));
        mock.expect_runtime_version().returning(|| Ok(11040));
        mock.expect_device_properties()
            .withf(|d| *d == 0)
            .returning(|_| Ok(device("A", 8)));
        mock.expect_device_properties()
            .withf(|d| *d == 1)
            .returning(|_| Err(RuntimeError::new(101, "invalid device ordinal")));
        mock.expect_can_access_peer().never();

        let mut out = Vec::new();
        let err = query_devices_to(&mock, &quiet(), &mut out).unwrap_err();
        assert!(matches!(err, QueryError::PropertiesQueryFailed { device: 1, .. }));
    }

    #[test]
    fn test_primary_is_last_device() {
        let rt = SyntheticRuntime::new(11020, 11040)
            .with_device(device("First", 8))
            .with_device(device("Second", 7));
        let mut out = Vec::new();
        let report = query_devices_to(&rt, &quiet(), &mut out).unwrap();
        assert_eq!(report.device_count(), 2);
        assert_eq!(report.primary().unwrap().device_name.as_str(), "Second");
        assert_eq!(report.primary().unwrap().device_index, 1);

        let flat = run_query_with(&rt, &quiet());
        assert!(flat.success);
        assert_eq!(flat.device_name.as_str(), "Second");
    }

    #[test]
    fn test_export_json_roundtrip() {
        let rt = SyntheticRuntime::new(12020, 12000).with_device(device("Exported", 9));
        let mut out = Vec::new();
        let report = query_devices_to(&rt, &quiet(), &mut out).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.export_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: QueryReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.devices, report.devices);
        assert_eq!(parsed.driver_version, CudaVersion::new(12, 2));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }
    }

    #[test]
    fn test_closed_console_does_not_fail_query() {
        let rt = SyntheticRuntime::new(11020, 11040)
            .with_device(device("First", 8))
            .with_device(device("Second", 8));

        let report = query_devices_to(&rt, &QueryConfig::default(), &mut ClosedPipe).unwrap();
        assert_eq!(report.device_count(), 2);
        assert!(report.devices.iter().all(|d| d.success));
        assert!(report.summary.ends_with("NumDevs = 2"));
    }

    #[test]
    fn test_closed_console_keeps_query_error() {
        let rt = SyntheticRuntime::new(11020, 11040);
        let err = query_devices_to(&rt, &QueryConfig::default(), &mut ClosedPipe).unwrap_err();
        assert!(is_no_device(&err));
    }

    #[test]
    fn test_into_primary_of_empty_report() {
        let report = QueryReport {
            devices: Vec::new(),
            driver_version: CudaVersion::default(),
            runtime_version: CudaVersion::default(),
            peer_access: Vec::new(),
            summary: String::new(),
            queried_at: Utc::now(),
        };
        assert!(!report.into_primary().success);
    }
}
