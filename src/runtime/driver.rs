//! CUDA Driver API backend.
//!
//! Reads every property through `cuDeviceGetAttribute` with an explicit
//! device handle, so no per-thread current device is selected. The runtime
//! library is linked only for `cudaRuntimeGetVersion`.

use super::{DeviceProperties, DeviceRuntime};
use crate::error::{RuntimeError, RuntimeResult};
use libc::{c_char, c_int, c_uint, size_t};
use log::debug;
use std::ffi::CStr;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Once;

type CUresult = c_int;
type CUdevice = c_int;

const CUDA_SUCCESS: CUresult = 0;

// CUdevice_attribute values
const MAX_THREADS_PER_BLOCK: c_int = 1;
const MAX_BLOCK_DIM_X: c_int = 2;
const MAX_BLOCK_DIM_Y: c_int = 3;
const MAX_BLOCK_DIM_Z: c_int = 4;
const MAX_GRID_DIM_X: c_int = 5;
const MAX_GRID_DIM_Y: c_int = 6;
const MAX_GRID_DIM_Z: c_int = 7;
const MAX_SHARED_MEMORY_PER_BLOCK: c_int = 8;
const TOTAL_CONSTANT_MEMORY: c_int = 9;
const WARP_SIZE: c_int = 10;
const MAX_PITCH: c_int = 11;
const MAX_REGISTERS_PER_BLOCK: c_int = 12;
const CLOCK_RATE: c_int = 13;
const TEXTURE_ALIGNMENT: c_int = 14;
const GPU_OVERLAP: c_int = 15;
const MULTIPROCESSOR_COUNT: c_int = 16;
const KERNEL_EXEC_TIMEOUT: c_int = 17;
const INTEGRATED: c_int = 18;
const CAN_MAP_HOST_MEMORY: c_int = 19;
const COMPUTE_MODE: c_int = 20;
const MAXIMUM_TEXTURE1D_WIDTH: c_int = 21;
const MAXIMUM_TEXTURE2D_WIDTH: c_int = 22;
const MAXIMUM_TEXTURE2D_HEIGHT: c_int = 23;
const MAXIMUM_TEXTURE3D_WIDTH: c_int = 24;
const MAXIMUM_TEXTURE3D_HEIGHT: c_int = 25;
const MAXIMUM_TEXTURE3D_DEPTH: c_int = 26;
const MAXIMUM_TEXTURE2D_LAYERED_WIDTH: c_int = 27;
const MAXIMUM_TEXTURE2D_LAYERED_HEIGHT: c_int = 28;
const MAXIMUM_TEXTURE2D_LAYERED_LAYERS: c_int = 29;
const SURFACE_ALIGNMENT: c_int = 30;
const ECC_ENABLED: c_int = 32;
const PCI_BUS_ID: c_int = 33;
const PCI_DEVICE_ID: c_int = 34;
const TCC_DRIVER: c_int = 35;
const MEMORY_CLOCK_RATE: c_int = 36;
const GLOBAL_MEMORY_BUS_WIDTH: c_int = 37;
const L2_CACHE_SIZE: c_int = 38;
const MAX_THREADS_PER_MULTIPROCESSOR: c_int = 39;
const ASYNC_ENGINE_COUNT: c_int = 40;
const UNIFIED_ADDRESSING: c_int = 41;
const MAXIMUM_TEXTURE1D_LAYERED_WIDTH: c_int = 42;
const MAXIMUM_TEXTURE1D_LAYERED_LAYERS: c_int = 43;
const PCI_DOMAIN_ID: c_int = 50;
const COMPUTE_CAPABILITY_MAJOR: c_int = 75;
const COMPUTE_CAPABILITY_MINOR: c_int = 76;
const MAX_SHARED_MEMORY_PER_MULTIPROCESSOR: c_int = 81;
const MANAGED_MEMORY: c_int = 83;
const COMPUTE_PREEMPTION_SUPPORTED: c_int = 90;
const COOPERATIVE_LAUNCH: c_int = 95;
const COOPERATIVE_MULTI_DEVICE_LAUNCH: c_int = 96;

#[link(name = "cuda")]
extern "C" {
    fn cuInit(flags: c_uint) -> CUresult;
    fn cuDriverGetVersion(version: *mut c_int) -> CUresult;
    fn cuDeviceGetCount(count: *mut c_int) -> CUresult;
    fn cuDeviceGet(device: *mut CUdevice, ordinal: c_int) -> CUresult;
    fn cuDeviceGetName(name: *mut c_char, len: c_int, dev: CUdevice) -> CUresult;
    fn cuDeviceTotalMem_v2(bytes: *mut size_t, dev: CUdevice) -> CUresult;
    fn cuDeviceGetAttribute(value: *mut c_int, attrib: c_int, dev: CUdevice) -> CUresult;
    fn cuDeviceCanAccessPeer(can_access: *mut c_int, dev: CUdevice, peer: CUdevice) -> CUresult;
    fn cuGetErrorString(error: CUresult, description: *mut *const c_char) -> CUresult;
}

#[link(name = "cudart")]
extern "C" {
    fn cudaRuntimeGetVersion(version: *mut c_int) -> c_int;
    fn cudaGetErrorString(error: c_int) -> *const c_char;
}

static CUDA_INIT: Once = Once::new();
static CUDA_INIT_RESULT: AtomicI32 = AtomicI32::new(CUDA_SUCCESS);

/// Device runtime backed by the CUDA driver
#[derive(Debug, Default)]
pub struct DriverRuntime {
    _private: (),
}

impl DriverRuntime {
    /// Create the backend; the driver is initialized on first use
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn ensure_init(&self) -> RuntimeResult<()> {
        CUDA_INIT.call_once(|| {
            let result = unsafe { cuInit(0) };
            CUDA_INIT_RESULT.store(result, Ordering::SeqCst);
        });
        check(CUDA_INIT_RESULT.load(Ordering::SeqCst))
    }

    fn handle(&self, ordinal: i32) -> RuntimeResult<CUdevice> {
        self.ensure_init()?;
        let mut device: CUdevice = 0;
        check(unsafe { cuDeviceGet(&mut device, ordinal) })?;
        Ok(device)
    }
}

fn driver_error_string(code: CUresult) -> String {
    let mut description: *const c_char = ptr::null();
    let result = unsafe { cuGetErrorString(code, &mut description) };
    if result != CUDA_SUCCESS || description.is_null() {
        return format!("unknown CUDA driver error {}", code);
    }
    unsafe { CStr::from_ptr(description) }
        .to_string_lossy()
        .into_owned()
}

fn check(code: CUresult) -> RuntimeResult<()> {
    if code == CUDA_SUCCESS {
        Ok(())
    } else {
        Err(RuntimeError::new(code, driver_error_string(code)))
    }
}

fn attribute(device: CUdevice, attrib: c_int) -> RuntimeResult<i32> {
    let mut value: c_int = 0;
    check(unsafe { cuDeviceGetAttribute(&mut value, attrib, device) })?;
    Ok(value)
}

// Size-like attributes are reported as int by the driver.
fn attribute_bytes(device: CUdevice, attrib: c_int) -> RuntimeResult<u64> {
    Ok(attribute(device, attrib)?.max(0) as u64)
}

fn device_name(device: CUdevice) -> RuntimeResult<String> {
    let mut buf = [0u8; 256];
    check(unsafe { cuDeviceGetName(buf.as_mut_ptr() as *mut c_char, buf.len() as c_int, device) })?;
    let name = CStr::from_bytes_until_nul(&buf)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&buf).into_owned());
    Ok(name)
}

impl DeviceRuntime for DriverRuntime {
    fn device_count(&self) -> RuntimeResult<i32> {
        self.ensure_init()?;
        let mut count: c_int = 0;
        check(unsafe { cuDeviceGetCount(&mut count) })?;
        Ok(count)
    }

    fn device_properties(&self, ordinal: i32) -> RuntimeResult<DeviceProperties> {
        let dev = self.handle(ordinal)?;
        let mut total_mem: size_t = 0;
        check(unsafe { cuDeviceTotalMem_v2(&mut total_mem, dev) })?;

        let props = DeviceProperties {
            name: device_name(dev)?,
            total_global_mem: total_mem as u64,
            major: attribute(dev, COMPUTE_CAPABILITY_MAJOR)?,
            minor: attribute(dev, COMPUTE_CAPABILITY_MINOR)?,
            multi_processor_count: attribute(dev, MULTIPROCESSOR_COUNT)?,
            clock_rate: attribute(dev, CLOCK_RATE)?,
            memory_clock_rate: attribute(dev, MEMORY_CLOCK_RATE)?,
            memory_bus_width: attribute(dev, GLOBAL_MEMORY_BUS_WIDTH)?,
            l2_cache_size: attribute(dev, L2_CACHE_SIZE)?,
            max_texture_1d: attribute(dev, MAXIMUM_TEXTURE1D_WIDTH)?,
            max_texture_2d: [
                attribute(dev, MAXIMUM_TEXTURE2D_WIDTH)?,
                attribute(dev, MAXIMUM_TEXTURE2D_HEIGHT)?,
            ],
            max_texture_3d: [
                attribute(dev, MAXIMUM_TEXTURE3D_WIDTH)?,
                attribute(dev, MAXIMUM_TEXTURE3D_HEIGHT)?,
                attribute(dev, MAXIMUM_TEXTURE3D_DEPTH)?,
            ],
            max_texture_1d_layered: [
                attribute(dev, MAXIMUM_TEXTURE1D_LAYERED_WIDTH)?,
                attribute(dev, MAXIMUM_TEXTURE1D_LAYERED_LAYERS)?,
            ],
            max_texture_2d_layered: [
                attribute(dev, MAXIMUM_TEXTURE2D_LAYERED_WIDTH)?,
                attribute(dev, MAXIMUM_TEXTURE2D_LAYERED_HEIGHT)?,
                attribute(dev, MAXIMUM_TEXTURE2D_LAYERED_LAYERS)?,
            ],
            total_const_mem: attribute_bytes(dev, TOTAL_CONSTANT_MEMORY)?,
            shared_mem_per_block: attribute_bytes(dev, MAX_SHARED_MEMORY_PER_BLOCK)?,
            shared_mem_per_multiprocessor: attribute_bytes(
                dev,
                MAX_SHARED_MEMORY_PER_MULTIPROCESSOR,
            )?,
            regs_per_block: attribute(dev, MAX_REGISTERS_PER_BLOCK)?,
            warp_size: attribute(dev, WARP_SIZE)?,
            max_threads_per_multi_processor: attribute(dev, MAX_THREADS_PER_MULTIPROCESSOR)?,
            max_threads_per_block: attribute(dev, MAX_THREADS_PER_BLOCK)?,
            max_threads_dim: [
                attribute(dev, MAX_BLOCK_DIM_X)?,
                attribute(dev, MAX_BLOCK_DIM_Y)?,
                attribute(dev, MAX_BLOCK_DIM_Z)?,
            ],
            max_grid_size: [
                attribute(dev, MAX_GRID_DIM_X)?,
                attribute(dev, MAX_GRID_DIM_Y)?,
                attribute(dev, MAX_GRID_DIM_Z)?,
            ],
            mem_pitch: attribute_bytes(dev, MAX_PITCH)?,
            texture_alignment: attribute_bytes(dev, TEXTURE_ALIGNMENT)?,
            surface_alignment: attribute_bytes(dev, SURFACE_ALIGNMENT)?,
            device_overlap: attribute(dev, GPU_OVERLAP)?,
            async_engine_count: attribute(dev, ASYNC_ENGINE_COUNT)?,
            kernel_exec_timeout_enabled: attribute(dev, KERNEL_EXEC_TIMEOUT)?,
            integrated: attribute(dev, INTEGRATED)?,
            can_map_host_memory: attribute(dev, CAN_MAP_HOST_MEMORY)?,
            ecc_enabled: attribute(dev, ECC_ENABLED)?,
            tcc_driver: attribute(dev, TCC_DRIVER)?,
            unified_addressing: attribute(dev, UNIFIED_ADDRESSING)?,
            managed_memory: attribute(dev, MANAGED_MEMORY)?,
            compute_preemption_supported: attribute(dev, COMPUTE_PREEMPTION_SUPPORTED)?,
            cooperative_launch: attribute(dev, COOPERATIVE_LAUNCH)?,
            cooperative_multi_device_launch: attribute(dev, COOPERATIVE_MULTI_DEVICE_LAUNCH)?,
            pci_domain_id: attribute(dev, PCI_DOMAIN_ID)?,
            pci_bus_id: attribute(dev, PCI_BUS_ID)?,
            pci_device_id: attribute(dev, PCI_DEVICE_ID)?,
            compute_mode: attribute(dev, COMPUTE_MODE)?,
        };

        debug!("read properties of device {} ({})", ordinal, props.name);
        Ok(props)
    }

    fn driver_version(&self) -> RuntimeResult<i32> {
        let mut version: c_int = 0;
        check(unsafe { cuDriverGetVersion(&mut version) })?;
        Ok(version)
    }

    fn runtime_version(&self) -> RuntimeResult<i32> {
        let mut version: c_int = 0;
        let result = unsafe { cudaRuntimeGetVersion(&mut version) };
        if result != 0 {
            let description = unsafe { cudaGetErrorString(result) };
            let message = if description.is_null() {
                format!("unknown CUDA runtime error {}", result)
            } else {
                unsafe { CStr::from_ptr(description) }
                    .to_string_lossy()
                    .into_owned()
            };
            return Err(RuntimeError::new(result, message));
        }
        Ok(version)
    }

    fn can_access_peer(&self, device: i32, peer: i32) -> RuntimeResult<bool> {
        let dev = self.handle(device)?;
        let peer_dev = self.handle(peer)?;
        let mut can_access: c_int = 0;
        check(unsafe { cuDeviceCanAccessPeer(&mut can_access, dev, peer_dev) })?;
        Ok(can_access != 0)
    }
}
