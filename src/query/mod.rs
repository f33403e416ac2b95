//! Device query engine
//!
//! Enumerates devices through a [`DeviceRuntime`](crate::runtime::DeviceRuntime),
//! transcribes each descriptor into a [`DeviceReport`](crate::DeviceReport),
//! checks peer access between eligible devices and prints the console report.

mod collector;
mod peer;
mod printer;

pub(crate) use collector::console_write;
pub use collector::{build_device_report, format_global_memory, DeviceQuery};
pub use peer::{eligible_for_peer_access, peer_pairs, PeerAccess};
pub use printer::{summary_line, ReportPrinter};

/// Query configuration
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Verbosity level of the console report
    pub verbosity: Verbosity,
    /// Check peer access between devices when two or more are present
    pub peer_access: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Detailed,
            peer_access: true,
        }
    }
}

impl QueryConfig {
    /// Summary line only
    pub fn quiet() -> Self {
        Self {
            verbosity: Verbosity::Minimal,
            peer_access: true,
        }
    }

    /// Full report plus raw descriptor logging
    pub fn debug() -> Self {
        Self {
            verbosity: Verbosity::Debug,
            peer_access: true,
        }
    }
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Summary line only
    Minimal,
    /// Device blocks and summary
    Normal,
    /// Adds the peer access matrix
    Detailed,
    /// Adds raw descriptors at debug log level
    Debug,
}

impl Verbosity {
    fn is_at_least(&self, level: Verbosity) -> bool {
        *self >= level
    }
}
