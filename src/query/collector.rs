//! Device enumeration and descriptor transcription

use crate::api::{
    DeviceReport, Dim3, LayeredTexture1d, LayeredTexture2d, PciLocation, QueryReport, TextField,
    TextureDimensions,
};
use crate::error::{QueryError, QueryResult, VersionKind};
use crate::mappings::{architecture_name, cores_per_sm, ComputeMode};
use crate::query::peer::{check_peer_access, eligible_for_peer_access};
use crate::query::printer::{summary_line, ReportPrinter};
use crate::query::{QueryConfig, Verbosity};
use crate::runtime::{DeviceProperties, DeviceRuntime};
use crate::version::CudaVersion;
use chrono::Utc;
use log::{debug, info, warn};
use std::io::{self, Write};

const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;

/// Device query over one runtime
pub struct DeviceQuery<'a> {
    runtime: &'a dyn DeviceRuntime,
    options: QueryConfig,
}

impl<'a> DeviceQuery<'a> {
    /// Create a query over `runtime`
    pub fn new(runtime: &'a dyn DeviceRuntime, options: QueryConfig) -> Self {
        Self { runtime, options }
    }

    /// Run the query, writing the console report to `out`.
    ///
    /// Any runtime failure aborts the whole query; no call is retried.
    /// Failed console writes are logged and never change the outcome.
    pub fn run(&self, out: &mut dyn Write) -> QueryResult<QueryReport> {
        let printer = ReportPrinter::new(self.options.verbosity);
        console_write(printer.print_header(out));

        let count = self
            .runtime
            .device_count()
            .map_err(QueryError::DeviceCountQueryFailed)?;
        if count <= 0 {
            return Err(QueryError::NoDevicesFound);
        }
        info!("detected {} CUDA capable device(s)", count);
        console_write(printer.print_device_count(count, out));

        let driver_raw = self
            .runtime
            .driver_version()
            .map_err(|source| QueryError::VersionQueryFailed {
                which: VersionKind::Driver,
                source,
            })?;
        let runtime_raw = self
            .runtime
            .runtime_version()
            .map_err(|source| QueryError::VersionQueryFailed {
                which: VersionKind::Runtime,
                source,
            })?;
        let driver_version = CudaVersion::from_packed(driver_raw);
        let runtime_version = CudaVersion::from_packed(runtime_raw);

        let mut descriptors = Vec::with_capacity(count as usize);
        let mut devices = Vec::with_capacity(count as usize);

        for device in 0..count {
            let props = self
                .runtime
                .device_properties(device)
                .map_err(|source| QueryError::PropertiesQueryFailed { device, source })?;

            if self.options.verbosity.is_at_least(Verbosity::Debug) {
                debug!("device {} descriptor: {:?}", device, props);
            }

            let report = build_device_report(device, &props, driver_version, runtime_version);
            console_write(printer.print_device(&report, out));

            descriptors.push(props);
            devices.push(report);
        }

        let mut peer_access = Vec::new();
        if count >= 2 && self.options.peer_access {
            let eligible = eligible_for_peer_access(&descriptors);
            if eligible.len() >= 2 {
                peer_access = check_peer_access(self.runtime, &eligible, &descriptors)?;
                console_write(printer.print_peer_access(&peer_access, out));
            } else {
                debug!("fewer than two devices support peer access, skipping matrix");
            }
        }

        let summary = summary_line(driver_version, runtime_version, count);
        console_write(printer.print_summary(&summary, out));

        Ok(QueryReport {
            devices,
            driver_version,
            runtime_version,
            peer_access,
            summary,
            queried_at: Utc::now(),
        })
    }

    /// Print the diagnostic for a failed query
    pub fn print_failure(&self, err: &QueryError, out: &mut dyn Write) -> io::Result<()> {
        ReportPrinter::new(self.options.verbosity).print_failure(err, out)
    }
}

// The console report is informational only.
pub(crate) fn console_write(result: io::Result<()>) {
    if let Err(e) = result {
        warn!("failed to write console report: {}", e);
    }
}

/// Transcribe one device descriptor into a flat record
pub fn build_device_report(
    device: i32,
    props: &DeviceProperties,
    driver_version: CudaVersion,
    runtime_version: CudaVersion,
) -> DeviceReport {
    let (device_name, truncated) = TextField::new_checked(&props.name);
    if truncated {
        warn!("name of device {} truncated to {} bytes", device, TextField::CAPACITY);
    }
    let cores = cores_per_sm(props.major, props.minor);

    DeviceReport {
        success: true,
        device_index: device,
        device_name,
        driver_version,
        runtime_version,
        compute_capability: CudaVersion::new(props.major, props.minor),
        architecture: architecture_name(props.major, props.minor).to_string(),
        total_global_memory: format_global_memory(props.total_global_mem),
        total_global_memory_bytes: props.total_global_mem,
        multiprocessors: props.multi_processor_count,
        cuda_cores_per_multiprocessor: cores,
        cuda_cores: cores.saturating_mul(props.multi_processor_count),
        gpu_max_clock_rate: props.clock_rate,
        memory_clock_rate: props.memory_clock_rate,
        memory_bus_width: props.memory_bus_width,
        l2_cache_size: props.l2_cache_size,
        max_texture_dimension_size: TextureDimensions {
            d1: props.max_texture_1d,
            d2: props.max_texture_2d,
            d3: props.max_texture_3d,
        },
        max_layered_1d_texture_size: LayeredTexture1d {
            width: props.max_texture_1d_layered[0],
            layers: props.max_texture_1d_layered[1],
        },
        max_layered_2d_texture_size: LayeredTexture2d {
            width: props.max_texture_2d_layered[0],
            height: props.max_texture_2d_layered[1],
            layers: props.max_texture_2d_layered[2],
        },
        total_constant_memory: to_i64(props.total_const_mem),
        total_shared_memory_per_block: to_i64(props.shared_mem_per_block),
        total_shared_memory_per_multiprocessor: to_i64(props.shared_mem_per_multiprocessor),
        total_registers_per_block: props.regs_per_block,
        warp_size: props.warp_size,
        max_threads_per_multiprocessor: props.max_threads_per_multi_processor,
        max_threads_per_block: props.max_threads_per_block,
        max_dimension_size_of_thread_block: Dim3::from(props.max_threads_dim),
        max_dimension_size_of_grid_size: Dim3::from(props.max_grid_size),
        max_memory_pitch: to_i64(props.mem_pitch),
        texture_alignment: to_i64(props.texture_alignment),
        async_engine_count: props.async_engine_count,
        concurrent_copy_and_kernel_execution: props.device_overlap != 0,
        run_time_limit_on_kernels: props.kernel_exec_timeout_enabled != 0,
        integrated_gpu_sharing_host_memory: props.integrated != 0,
        support_host_page_locked_memory_mapping: props.can_map_host_memory != 0,
        alignment_requirement_for_surfaces: props.surface_alignment != 0,
        device_has_ecc_support: props.ecc_enabled != 0,
        device_supports_unified_addressing: props.unified_addressing != 0,
        device_supports_managed_memory: props.managed_memory != 0,
        device_supports_compute_preemption: props.compute_preemption_supported != 0,
        supports_cooperative_kernel_launch: props.cooperative_launch != 0,
        supports_multi_device_coop_kernel_launch: props.cooperative_multi_device_launch != 0,
        pci: PciLocation {
            domain_id: props.pci_domain_id,
            bus_id: props.pci_bus_id,
            location_id: props.pci_device_id,
        },
        compute_mode: ComputeMode::from_raw(props.compute_mode),
    }
}

/// Format a byte count as `"<N> MBytes (<bytes> bytes)"`
pub fn format_global_memory(bytes: u64) -> TextField {
    let text = format!("{:.0} MBytes ({} bytes)", bytes as f64 / BYTES_PER_MEGABYTE, bytes);
    TextField::new(&text)
}

// Byte counts beyond i64::MAX are clamped.
fn to_i64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SyntheticRuntime;
    use pretty_assertions::assert_eq;

    fn turing() -> DeviceProperties {
        DeviceProperties {
            name: "Tesla T4".to_string(),
            total_global_mem: 15_843_721_216,
            major: 7,
            minor: 5,
            multi_processor_count: 40,
            clock_rate: 1_590_000,
            memory_clock_rate: 5_001_000,
            memory_bus_width: 256,
            l2_cache_size: 4_194_304,
            max_texture_1d: 131_072,
            max_texture_2d: [131_072, 65_536],
            max_texture_3d: [16_384, 16_384, 16_384],
            max_texture_1d_layered: [32_768, 2_048],
            max_texture_2d_layered: [32_768, 32_768, 2_048],
            total_const_mem: 65_536,
            shared_mem_per_block: 49_152,
            shared_mem_per_multiprocessor: 65_536,
            regs_per_block: 65_536,
            warp_size: 32,
            max_threads_per_multi_processor: 1_024,
            max_threads_per_block: 1_024,
            max_threads_dim: [1_024, 1_024, 64],
            max_grid_size: [2_147_483_647, 65_535, 65_535],
            mem_pitch: 2_147_483_647,
            texture_alignment: 512,
            surface_alignment: 512,
            device_overlap: 1,
            async_engine_count: 3,
            ecc_enabled: 1,
            unified_addressing: 1,
            managed_memory: 1,
            compute_preemption_supported: 1,
            cooperative_launch: 1,
            cooperative_multi_device_launch: 1,
            pci_bus_id: 59,
            ..DeviceProperties::default()
        }
    }

    #[test]
    fn test_build_device_report_transcribes_fields() {
        let report = build_device_report(
            0,
            &turing(),
            CudaVersion::new(11, 2),
            CudaVersion::new(11, 4),
        );

        assert!(report.success);
        assert_eq!(report.device_name.as_str(), "Tesla T4");
        assert_eq!(report.compute_capability, CudaVersion::new(7, 5));
        assert_eq!(report.architecture, "Turing");
        assert_eq!(report.cuda_cores_per_multiprocessor, 64);
        assert_eq!(report.cuda_cores, 2_560);
        assert_eq!(report.total_global_memory.as_str(), "15110 MBytes (15843721216 bytes)");
        assert_eq!(
            report.max_texture_dimension_size,
            TextureDimensions { d1: 131_072, d2: [131_072, 65_536], d3: [16_384, 16_384, 16_384] }
        );
        assert_eq!(report.max_layered_2d_texture_size.layers, 2_048);
        assert_eq!(report.max_dimension_size_of_thread_block, Dim3 { x: 1_024, y: 1_024, z: 64 });
        assert_eq!(report.max_memory_pitch, 2_147_483_647);
        assert!(report.concurrent_copy_and_kernel_execution);
        assert!(report.alignment_requirement_for_surfaces);
        assert!(!report.run_time_limit_on_kernels);
        assert!(!report.integrated_gpu_sharing_host_memory);
        assert_eq!(report.pci, PciLocation { domain_id: 0, bus_id: 59, location_id: 0 });
        assert_eq!(report.compute_mode, ComputeMode::Default);
    }

    #[test]
    fn test_format_global_memory() {
        assert_eq!(
            format_global_memory(8_589_934_592).as_str(),
            "8192 MBytes (8589934592 bytes)"
        );
        assert_eq!(format_global_memory(0).as_str(), "0 MBytes (0 bytes)");
    }

    #[test]
    fn test_long_name_is_bounded() {
        let mut props = turing();
        props.name = "X".repeat(400);
        let report = build_device_report(0, &props, CudaVersion::default(), CudaVersion::default());
        assert_eq!(report.device_name.len(), TextField::CAPACITY);
    }

    #[test]
    fn test_huge_byte_count_is_clamped() {
        assert_eq!(to_i64(u64::MAX), i64::MAX);
        assert_eq!(to_i64(512), 512);
    }

    #[test]
    fn test_run_collects_every_device_in_order() {
        let mut second = turing();
        second.name = "Tesla T4 #2".to_string();
        let rt = SyntheticRuntime::new(11020, 11040)
            .with_device(turing())
            .with_device(second);

        let mut out = Vec::new();
        let report = DeviceQuery::new(&rt, QueryConfig::default()).run(&mut out).unwrap();

        let indices: Vec<i32> = report.devices.iter().map(|d| d.device_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(report.devices[1].device_name.as_str(), "Tesla T4 #2");
        assert_eq!(report.driver_version, CudaVersion::new(11, 2));
        assert_eq!(report.runtime_version, CudaVersion::new(11, 4));
        assert_eq!(report.peer_access.len(), 2);
    }

    #[test]
    fn test_peer_check_can_be_disabled() {
        let rt = SyntheticRuntime::new(11020, 11040)
            .with_device(turing())
            .with_device(turing());
        let config = QueryConfig { peer_access: false, ..QueryConfig::default() };

        let mut out = Vec::new();
        let report = DeviceQuery::new(&rt, config).run(&mut out).unwrap();
        assert!(report.peer_access.is_empty());
        assert!(!String::from_utf8(out).unwrap().contains("Peer access"));
    }
}
