//! Hardware database for CUDA device identification

pub mod sm;

// Re-exports for convenient usage
pub use sm::{architecture_name, cores_per_sm, identify_sm, SmArchitecture, SM_ARCHITECTURES};

/// Device compute modes as reported by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ComputeMode {
    /// Multiple host threads can use the device simultaneously
    #[default]
    Default,
    /// Only one host thread in one process can use the device
    Exclusive,
    /// No host thread can use the device
    Prohibited,
    /// Many threads in one process can use the device
    ExclusiveProcess,
    /// Value not known to this library
    Unknown,
}

impl ComputeMode {
    /// Decode the raw driver attribute value
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => ComputeMode::Default,
            1 => ComputeMode::Exclusive,
            2 => ComputeMode::Prohibited,
            3 => ComputeMode::ExclusiveProcess,
            _ => ComputeMode::Unknown,
        }
    }

    /// Long description used in the console report
    pub fn description(&self) -> &'static str {
        match self {
            ComputeMode::Default => {
                "Default (multiple host threads can use ::cudaSetDevice() with device simultaneously)"
            }
            ComputeMode::Exclusive => {
                "Exclusive (only one host thread in one process is able to use ::cudaSetDevice() with this device)"
            }
            ComputeMode::Prohibited => {
                "Prohibited (no host thread can use ::cudaSetDevice() with this device)"
            }
            ComputeMode::ExclusiveProcess => {
                "Exclusive Process (many threads in one process is able to use ::cudaSetDevice() with this device)"
            }
            ComputeMode::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ComputeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeMode::Default => write!(f, "Default"),
            ComputeMode::Exclusive => write!(f, "Exclusive"),
            ComputeMode::Prohibited => write!(f, "Prohibited"),
            ComputeMode::ExclusiveProcess => write!(f, "Exclusive Process"),
            ComputeMode::Unknown => write!(f, "Unknown"),
        }
    }
}
