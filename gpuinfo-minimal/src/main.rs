//! Minimal GPU info CLI tool

use devquery::QueryConfig;
use std::io;
use std::process;

fn main() {
    let runtime = devquery::default_runtime();
    match devquery::query_devices_to(runtime.as_ref(), &QueryConfig::quiet(), &mut io::sink()) {
        Ok(report) => {
            // One line per device
            for gpu in &report.devices {
                println!(
                    "{} (sm_{}{}, {} CUDA cores)",
                    gpu.device_name,
                    gpu.compute_capability.major,
                    gpu.compute_capability.minor,
                    gpu.cuda_cores
                );
            }
        }
        Err(e) if devquery::is_no_device(&e) => {
            eprintln!("no_gpu");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}
