//! C ABI for embedding hosts
//!
//! `devquery_run_query` returns a heap-allocated [`GpuInfoRecord`] that the
//! caller owns and must hand back to `devquery_free`. The record describes
//! the primary (last enumerated) device; see [`QueryReport::primary`](crate::QueryReport::primary).

use crate::api::{run_query, DeviceReport, TextField, TEXT_FIELD_LEN};
use libc::{c_char, c_int};
use std::panic;

/// Flat, fixed-layout device record
#[repr(C)]
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct GpuInfoRecord {
    pub success: bool,
    pub device_num: c_int,
    pub device_name: [c_char; TEXT_FIELD_LEN],
    pub cuda_driver_version: c_int,
    pub cuda_driver_version_minor: c_int,
    pub cuda_runtime_version: c_int,
    pub cuda_runtime_version_minor: c_int,
    pub cuda_capability_major: c_int,
    pub cuda_capability_minor: c_int,
    pub total_global_memory: [c_char; TEXT_FIELD_LEN],
    pub multiprocessors: c_int,
    pub cuda_cores_per_multiprocessor: c_int,
    pub gpu_max_clock_rate: c_int,
    pub memory_clock_rate: c_int,
    pub memory_bus_width: c_int,
    pub l2_cache_size: c_int,
    pub max_texture_dimension_size: [c_int; 6],
    pub max_layered_1d_texture_size: [c_int; 2],
    pub max_layered_2d_texture_size: [c_int; 3],
    pub total_constant_memory: i64,
    pub total_shared_memory_per_block: i64,
    pub total_shared_memory_per_multiprocessor: i64,
    pub total_registers_per_block: c_int,
    pub warp_size: c_int,
    pub max_threads_per_multiprocessor: c_int,
    pub max_threads_per_block: c_int,
    pub max_dimension_size_of_thread_block: [c_int; 3],
    pub max_dimension_size_of_grid_size: [c_int; 3],
    pub max_memory_pitch: i64,
    pub texture_alignment: i64,
    pub concurrent_copy_and_kernel_execution: bool,
    pub run_time_limit_on_kernels: bool,
    pub integrated_gpu_sharing_host_memory: bool,
    pub support_host_page_locked_memory_mapping: bool,
    pub alignment_requirement_for_surfaces: bool,
    pub device_has_ecc_support: bool,
    pub device_supports_unified_addressing: bool,
    pub device_supports_managed_memory: bool,
    pub device_supports_compute_preemption: bool,
    pub supports_cooperative_kernel_launch: bool,
    pub supports_multi_device_coop_kernel_launch: bool,
    pub device_pci_domain_id_bus_id_location_id: [c_int; 3],
}

fn to_c_buffer(text: &TextField) -> [c_char; TEXT_FIELD_LEN] {
    let mut bytes = [0u8; TEXT_FIELD_LEN];
    text.copy_to_buffer(&mut bytes);
    bytes.map(|b| b as c_char)
}

impl From<&DeviceReport> for GpuInfoRecord {
    fn from(d: &DeviceReport) -> Self {
        let tex = &d.max_texture_dimension_size;
        let block = &d.max_dimension_size_of_thread_block;
        let grid = &d.max_dimension_size_of_grid_size;
        Self {
            success: d.success,
            device_num: d.device_index,
            device_name: to_c_buffer(&d.device_name),
            cuda_driver_version: d.driver_version.major,
            cuda_driver_version_minor: d.driver_version.minor,
            cuda_runtime_version: d.runtime_version.major,
            cuda_runtime_version_minor: d.runtime_version.minor,
            cuda_capability_major: d.compute_capability.major,
            cuda_capability_minor: d.compute_capability.minor,
            total_global_memory: to_c_buffer(&d.total_global_memory),
            multiprocessors: d.multiprocessors,
            cuda_cores_per_multiprocessor: d.cuda_cores_per_multiprocessor,
            gpu_max_clock_rate: d.gpu_max_clock_rate,
            memory_clock_rate: d.memory_clock_rate,
            memory_bus_width: d.memory_bus_width,
            l2_cache_size: d.l2_cache_size,
            max_texture_dimension_size: [
                tex.d1, tex.d2[0], tex.d2[1], tex.d3[0], tex.d3[1], tex.d3[2],
            ],
            max_layered_1d_texture_size: [
                d.max_layered_1d_texture_size.width,
                d.max_layered_1d_texture_size.layers,
            ],
            max_layered_2d_texture_size: [
                d.max_layered_2d_texture_size.width,
                d.max_layered_2d_texture_size.height,
                d.max_layered_2d_texture_size.layers,
            ],
            total_constant_memory: d.total_constant_memory,
            total_shared_memory_per_block: d.total_shared_memory_per_block,
            total_shared_memory_per_multiprocessor: d.total_shared_memory_per_multiprocessor,
            total_registers_per_block: d.total_registers_per_block,
            warp_size: d.warp_size,
            max_threads_per_multiprocessor: d.max_threads_per_multiprocessor,
            max_threads_per_block: d.max_threads_per_block,
            max_dimension_size_of_thread_block: [block.x, block.y, block.z],
            max_dimension_size_of_grid_size: [grid.x, grid.y, grid.z],
            max_memory_pitch: d.max_memory_pitch,
            texture_alignment: d.texture_alignment,
            concurrent_copy_and_kernel_execution: d.concurrent_copy_and_kernel_execution,
            run_time_limit_on_kernels: d.run_time_limit_on_kernels,
            integrated_gpu_sharing_host_memory: d.integrated_gpu_sharing_host_memory,
            support_host_page_locked_memory_mapping: d.support_host_page_locked_memory_mapping,
            alignment_requirement_for_surfaces: d.alignment_requirement_for_surfaces,
            device_has_ecc_support: d.device_has_ecc_support,
            device_supports_unified_addressing: d.device_supports_unified_addressing,
            device_supports_managed_memory: d.device_supports_managed_memory,
            device_supports_compute_preemption: d.device_supports_compute_preemption,
            supports_cooperative_kernel_launch: d.supports_cooperative_kernel_launch,
            supports_multi_device_coop_kernel_launch: d.supports_multi_device_coop_kernel_launch,
            device_pci_domain_id_bus_id_location_id: [
                d.pci.domain_id,
                d.pci.bus_id,
                d.pci.location_id,
            ],
        }
    }
}

/// Run the device query and return an owned record.
///
/// Never returns null. Release the record with [`devquery_free`].
#[no_mangle]
pub extern "C" fn devquery_run_query() -> *mut GpuInfoRecord {
    into_record(run_query)
}

// A panic in `query` yields the failure record instead of unwinding into C.
fn into_record<F>(query: F) -> *mut GpuInfoRecord
where
    F: FnOnce() -> DeviceReport + panic::UnwindSafe,
{
    let report = panic::catch_unwind(query).unwrap_or_else(|_| DeviceReport::failed());
    Box::into_raw(Box::new(GpuInfoRecord::from(&report)))
}

/// Release a record returned by [`devquery_run_query`].
///
/// # Safety
///
/// `record` must be null or a pointer obtained from `devquery_run_query`
/// that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn devquery_free(record: *mut GpuInfoRecord) {
    if !record.is_null() {
        drop(Box::from_raw(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::CudaVersion;
    use std::ffi::CStr;

    #[test]
    fn test_record_copies_strings_with_terminator() {
        let report = DeviceReport {
            success: true,
            device_index: 1,
            device_name: TextField::new("NVIDIA A100-SXM4-40GB"),
            driver_version: CudaVersion::from_packed(11020),
            total_global_memory: TextField::new("40536 MBytes (42505273344 bytes)"),
            ..DeviceReport::default()
        };
        let record = GpuInfoRecord::from(&report);

        let name = unsafe { CStr::from_ptr(record.device_name.as_ptr()) };
        assert_eq!(name.to_str().unwrap(), "NVIDIA A100-SXM4-40GB");
        let mem = unsafe { CStr::from_ptr(record.total_global_memory.as_ptr()) };
        assert_eq!(mem.to_str().unwrap(), "40536 MBytes (42505273344 bytes)");
        assert_eq!(record.cuda_driver_version, 11);
        assert_eq!(record.cuda_driver_version_minor, 2);
        assert_eq!(record.device_num, 1);
    }

    #[test]
    fn test_max_length_name_keeps_terminator() {
        let report = DeviceReport {
            device_name: TextField::new(&"N".repeat(1000)),
            ..DeviceReport::default()
        };
        let record = GpuInfoRecord::from(&report);
        assert_eq!(record.device_name[TEXT_FIELD_LEN - 1], 0);
        assert_eq!(record.device_name[TEXT_FIELD_LEN - 2], b'N' as c_char);
    }

    #[test]
    fn test_panicking_query_yields_failure_record() {
        let record = into_record(|| panic!("driver exploded"));
        assert!(!record.is_null());
        let success = unsafe { (*record).success };
        assert!(!success);
        unsafe { devquery_free(record) };
    }

    #[test]
    fn test_free_accepts_null() {
        unsafe { devquery_free(std::ptr::null_mut()) };
    }
}
