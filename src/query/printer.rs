//! deviceQuery-style console report

use crate::api::DeviceReport;
use crate::error::QueryError;
use crate::query::{PeerAccess, Verbosity};
use crate::version::CudaVersion;
use std::io::{self, Write};

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// The one-line profile summary printed at the end of a query
pub fn summary_line(driver: CudaVersion, runtime: CudaVersion, device_count: i32) -> String {
    format!(
        "deviceQuery, CUDA Driver = CUDART, CUDA Driver Version = {}, CUDA Runtime Version = {}, NumDevs = {}",
        driver, runtime, device_count
    )
}

/// Writes the console report at a given verbosity
#[derive(Debug, Clone, Copy)]
pub struct ReportPrinter {
    verbosity: Verbosity,
}

impl ReportPrinter {
    /// Create a printer
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Print the report banner
    pub fn print_header(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.verbosity.is_at_least(Verbosity::Normal) {
            writeln!(out, " CUDA Device Query (Runtime API) version (CUDART static linking)\n")?;
        }
        Ok(())
    }

    /// Print the number of detected devices
    pub fn print_device_count(&self, count: i32, out: &mut dyn Write) -> io::Result<()> {
        if self.verbosity.is_at_least(Verbosity::Normal) {
            writeln!(out, "Detected {} CUDA Capable device(s)", count)?;
        }
        Ok(())
    }

    /// Print the block describing one device
    pub fn print_device(&self, d: &DeviceReport, out: &mut dyn Write) -> io::Result<()> {
        if !self.verbosity.is_at_least(Verbosity::Normal) {
            return Ok(());
        }

        writeln!(out, "\nDevice {}: \"{}\"", d.device_index, d.device_name)?;
        writeln!(
            out,
            "  CUDA Driver Version / Runtime Version          {} / {}",
            d.driver_version, d.runtime_version
        )?;
        writeln!(
            out,
            "  CUDA Capability Major/Minor version number:    {}",
            d.compute_capability
        )?;
        writeln!(
            out,
            "  Total amount of global memory:                 {}",
            d.total_global_memory
        )?;
        writeln!(
            out,
            "  ({:03}) Multiprocessors, ({:03}) CUDA Cores/MP:    {} CUDA Cores",
            d.multiprocessors, d.cuda_cores_per_multiprocessor, d.cuda_cores
        )?;
        writeln!(
            out,
            "  GPU Max Clock rate:                            {:.0} MHz ({:.2} GHz)",
            d.gpu_max_clock_rate as f64 * 1e-3,
            d.gpu_max_clock_rate as f64 * 1e-6
        )?;
        writeln!(
            out,
            "  Memory Clock rate:                             {:.0} Mhz",
            d.memory_clock_rate as f64 * 1e-3
        )?;
        writeln!(
            out,
            "  Memory Bus Width:                              {}-bit",
            d.memory_bus_width
        )?;
        if d.l2_cache_size != 0 {
            writeln!(
                out,
                "  L2 Cache Size:                                 {} bytes",
                d.l2_cache_size
            )?;
        }

        let tex = &d.max_texture_dimension_size;
        writeln!(
            out,
            "  Maximum Texture Dimension Size (x,y,z)         1D=({}), 2D=({}, {}), 3D=({}, {}, {})",
            tex.d1, tex.d2[0], tex.d2[1], tex.d3[0], tex.d3[1], tex.d3[2]
        )?;
        writeln!(
            out,
            "  Maximum Layered 1D Texture Size, (num) layers  1D=({}), {} layers",
            d.max_layered_1d_texture_size.width, d.max_layered_1d_texture_size.layers
        )?;
        writeln!(
            out,
            "  Maximum Layered 2D Texture Size, (num) layers  2D=({}, {}), {} layers",
            d.max_layered_2d_texture_size.width,
            d.max_layered_2d_texture_size.height,
            d.max_layered_2d_texture_size.layers
        )?;
        writeln!(
            out,
            "  Total amount of constant memory:               {} bytes",
            d.total_constant_memory
        )?;
        writeln!(
            out,
            "  Total amount of shared memory per block:       {} bytes",
            d.total_shared_memory_per_block
        )?;
        writeln!(
            out,
            "  Total shared memory per multiprocessor:        {} bytes",
            d.total_shared_memory_per_multiprocessor
        )?;
        writeln!(
            out,
            "  Total number of registers available per block: {}",
            d.total_registers_per_block
        )?;
        writeln!(out, "  Warp size:                                     {}", d.warp_size)?;
        writeln!(
            out,
            "  Maximum number of threads per multiprocessor:  {}",
            d.max_threads_per_multiprocessor
        )?;
        writeln!(
            out,
            "  Maximum number of threads per block:           {}",
            d.max_threads_per_block
        )?;

        let block = &d.max_dimension_size_of_thread_block;
        writeln!(
            out,
            "  Max dimension size of a thread block (x,y,z): ({}, {}, {})",
            block.x, block.y, block.z
        )?;
        let grid = &d.max_dimension_size_of_grid_size;
        writeln!(
            out,
            "  Max dimension size of a grid size    (x,y,z): ({}, {}, {})",
            grid.x, grid.y, grid.z
        )?;
        writeln!(
            out,
            "  Maximum memory pitch:                          {} bytes",
            d.max_memory_pitch
        )?;
        writeln!(
            out,
            "  Texture alignment:                             {} bytes",
            d.texture_alignment
        )?;
        writeln!(
            out,
            "  Concurrent copy and kernel execution:          {} with {} copy engine(s)",
            yes_no(d.concurrent_copy_and_kernel_execution),
            d.async_engine_count
        )?;
        writeln!(
            out,
            "  Run time limit on kernels:                     {}",
            yes_no(d.run_time_limit_on_kernels)
        )?;
        writeln!(
            out,
            "  Integrated GPU sharing Host Memory:            {}",
            yes_no(d.integrated_gpu_sharing_host_memory)
        )?;
        writeln!(
            out,
            "  Support host page-locked memory mapping:       {}",
            yes_no(d.support_host_page_locked_memory_mapping)
        )?;
        writeln!(
            out,
            "  Alignment requirement for Surfaces:            {}",
            yes_no(d.alignment_requirement_for_surfaces)
        )?;
        writeln!(
            out,
            "  Device has ECC support:                        {}",
            if d.device_has_ecc_support { "Enabled" } else { "Disabled" }
        )?;
        writeln!(
            out,
            "  Device supports Unified Addressing (UVA):      {}",
            yes_no(d.device_supports_unified_addressing)
        )?;
        writeln!(
            out,
            "  Device supports Managed Memory:                {}",
            yes_no(d.device_supports_managed_memory)
        )?;
        writeln!(
            out,
            "  Device supports Compute Preemption:            {}",
            yes_no(d.device_supports_compute_preemption)
        )?;
        writeln!(
            out,
            "  Supports Cooperative Kernel Launch:            {}",
            yes_no(d.supports_cooperative_kernel_launch)
        )?;
        writeln!(
            out,
            "  Supports MultiDevice Co-op Kernel Launch:      {}",
            yes_no(d.supports_multi_device_coop_kernel_launch)
        )?;
        writeln!(
            out,
            "  Device PCI Domain ID / Bus ID / location ID:   {} / {} / {}",
            d.pci.domain_id, d.pci.bus_id, d.pci.location_id
        )?;
        writeln!(out, "  Compute Mode:")?;
        writeln!(out, "     < {} >", d.compute_mode.description())?;
        Ok(())
    }

    /// Print the peer access matrix
    pub fn print_peer_access(&self, matrix: &[PeerAccess], out: &mut dyn Write) -> io::Result<()> {
        if !self.verbosity.is_at_least(Verbosity::Detailed) {
            return Ok(());
        }
        for entry in matrix {
            writeln!(
                out,
                "> Peer access from {} (GPU{}) -> {} (GPU{}) : {}",
                entry.from_name,
                entry.from,
                entry.to_name,
                entry.to,
                yes_no(entry.supported)
            )?;
        }
        Ok(())
    }

    /// Print the summary line and the pass marker
    pub fn print_summary(&self, summary: &str, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "{}", summary)?;
        writeln!(out, "Result = PASS")?;
        Ok(())
    }

    /// Print the diagnostic for a failed query
    pub fn print_failure(&self, err: &QueryError, out: &mut dyn Write) -> io::Result<()> {
        match err {
            QueryError::DeviceCountQueryFailed(source) => {
                writeln!(out, "cudaGetDeviceCount returned {}", source.code)?;
                writeln!(out, "-> {}", source.message)?;
            }
            QueryError::NoDevicesFound => {
                writeln!(out, "There are no available device(s) that support CUDA")?;
                return Ok(());
            }
            other => writeln!(out, "{}", other)?,
        }
        writeln!(out, "Result = FAIL")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TextField;
    use crate::error::RuntimeError;

    fn sample() -> DeviceReport {
        DeviceReport {
            success: true,
            device_index: 0,
            device_name: TextField::new("NVIDIA GeForce RTX 3080"),
            compute_capability: CudaVersion::new(8, 6),
            architecture: "Ampere".to_string(),
            gpu_max_clock_rate: 1_710_000,
            memory_clock_rate: 9_501_000,
            l2_cache_size: 0,
            device_has_ecc_support: false,
            concurrent_copy_and_kernel_execution: true,
            async_engine_count: 2,
            ..DeviceReport::default()
        }
    }

    fn render(verbosity: Verbosity, d: &DeviceReport) -> String {
        let mut out = Vec::new();
        ReportPrinter::new(verbosity).print_device(d, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_device_block_layout() {
        let text = render(Verbosity::Normal, &sample());
        assert!(text.contains("Device 0: \"NVIDIA GeForce RTX 3080\""));
        assert!(text.contains("CUDA Capability Major/Minor version number:    8.6\n"));
        assert!(
            text.contains("GPU Max Clock rate:                            1710 MHz (1.71 GHz)")
        );
        assert!(text.contains("Memory Clock rate:                             9501 Mhz"));
        assert!(
            text.contains("Concurrent copy and kernel execution:          Yes with 2 copy engine(s)")
        );
        assert!(text.contains("Device has ECC support:                        Disabled"));
        assert!(text.contains("< Default (multiple host threads"));
        assert!(!text.contains("L2 Cache Size"));
    }

    #[test]
    fn test_minimal_skips_device_block() {
        assert!(render(Verbosity::Minimal, &sample()).is_empty());
    }

    #[test]
    fn test_peer_lines() {
        let matrix = vec![PeerAccess {
            from: 0,
            from_name: "A".into(),
            to: 1,
            to_name: "B".into(),
            supported: true,
        }];
        let mut out = Vec::new();
        ReportPrinter::new(Verbosity::Detailed).print_peer_access(&matrix, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "> Peer access from A (GPU0) -> B (GPU1) : Yes\n"
        );

        let mut out = Vec::new();
        ReportPrinter::new(Verbosity::Normal).print_peer_access(&matrix, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            summary_line(CudaVersion::new(11, 2), CudaVersion::new(11, 4), 2),
            "deviceQuery, CUDA Driver = CUDART, CUDA Driver Version = 11.2, CUDA Runtime Version = 11.4, NumDevs = 2"
        );
    }

    #[test]
    fn test_failure_messages() {
        let mut out = Vec::new();
        ReportPrinter::new(Verbosity::Minimal)
            .print_failure(&QueryError::NoDevicesFound, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "There are no available device(s) that support CUDA\n");

        let mut out = Vec::new();
        let err = QueryError::DeviceCountQueryFailed(RuntimeError::new(
            100,
            "no CUDA-capable device is detected",
        ));
        ReportPrinter::new(Verbosity::Minimal).print_failure(&err, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "cudaGetDeviceCount returned 100\n-> no CUDA-capable device is detected\nResult = FAIL\n"
        );
    }
}
