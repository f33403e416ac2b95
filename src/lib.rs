//! # DEVQUERY - CUDA Device Capability Reporter
//!
//! Enumerates CUDA devices, reads their capability descriptors and turns
//! them into flat [`DeviceReport`] records plus a deviceQuery-style console
//! report.
//!
//! ## Features
//!
//! - **Per-device records** with bounded text fields
//! - **Version decomposition** of packed driver/runtime versions
//! - **Core counting** from the compute capability table
//! - **Peer access matrix** between eligible devices
//! - **JSON export** of a full query
//! - **C ABI** (`capi` feature) for embedding hosts
//! - **Pluggable runtime**: the CUDA driver (`cuda` feature) or an
//!   in-memory [`SyntheticRuntime`]
//!
//! ## Quick Start
//!
//! ```rust
//! use devquery::{query_devices, QueryConfig, SyntheticRuntime};
//! use devquery::runtime::DeviceProperties;
//!
//! let runtime = SyntheticRuntime::new(11020, 11040).with_device(DeviceProperties {
//!     name: "Tesla T4".into(),
//!     major: 7,
//!     minor: 5,
//!     ..DeviceProperties::default()
//! });
//! let report = query_devices(&runtime, &QueryConfig::quiet()).unwrap();
//! assert_eq!(report.devices[0].driver_version.to_string(), "11.2");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod bounded;
pub mod error;
#[cfg(feature = "capi")]
pub mod ffi;
pub mod mappings;
pub mod query;
pub mod runtime;
pub mod version;

// Re-export main API for easy access
pub use api::{
    is_no_device, query_devices, query_devices_to, run_query, run_query_with, DeviceReport,
    QueryReport,
};
pub use error::{QueryError, QueryResult, RuntimeError};
pub use mappings::{architecture_name, cores_per_sm, ComputeMode};
pub use query::{DeviceQuery, PeerAccess, QueryConfig, Verbosity};
pub use runtime::{default_runtime, DeviceRuntime, SyntheticRuntime};
pub use version::CudaVersion;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
///
/// # Example
///
/// ```no_run
/// println!("Using devquery v{}", devquery::version());
/// ```
pub fn version() -> &'static str {
    VERSION
}

/// Whether the default runtime reports at least one device
///
/// # Example
///
/// ```no_run
/// if devquery::is_supported() {
///     println!("System has a CUDA device");
/// }
/// ```
pub fn is_supported() -> bool {
    matches!(default_runtime().device_count(), Ok(n) if n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!version().is_empty());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_is_supported_without_backend() {
        assert!(!is_supported());
    }
}

/// Prelude module for convenient imports
///
/// # Example
///
/// ```no_run
/// use devquery::prelude::*;
///
/// let report = run_query();
/// ```
pub mod prelude {
    pub use crate::api::{query_devices, run_query, run_query_with, DeviceReport, QueryReport};
    pub use crate::query::{QueryConfig, Verbosity};
    pub use crate::runtime::{default_runtime, DeviceRuntime, SyntheticRuntime};
    pub use crate::{is_supported, version};
}
