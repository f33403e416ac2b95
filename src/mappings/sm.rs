//! Streaming multiprocessor (SM) database
//!
//! Maps compute capability versions to the number of CUDA cores per
//! multiprocessor and to the architecture family name.

use log::warn;
use serde::{Deserialize, Serialize};

/// SM generation information used for core counting and naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmArchitecture {
    /// Compute capability major version
    pub major: i32,
    /// Compute capability minor version
    pub minor: i32,
    /// CUDA cores per multiprocessor
    pub cores_per_sm: i32,
    /// Architecture family name
    pub name: &'static str,
}

impl SmArchitecture {
    /// Packed `0xMm` key (e.g. `0x86` for 8.6)
    pub const fn key(&self) -> i32 {
        (self.major << 4) + self.minor
    }
}

/// Known SM generations, ordered by compute capability
#[rustfmt::skip]
pub const SM_ARCHITECTURES: &[SmArchitecture] = &[
    // Kepler
    SmArchitecture { major: 3, minor: 0, cores_per_sm: 192, name: "Kepler" },
    SmArchitecture { major: 3, minor: 2, cores_per_sm: 192, name: "Kepler" },
    SmArchitecture { major: 3, minor: 5, cores_per_sm: 192, name: "Kepler" },
    SmArchitecture { major: 3, minor: 7, cores_per_sm: 192, name: "Kepler" },

    // Maxwell
    SmArchitecture { major: 5, minor: 0, cores_per_sm: 128, name: "Maxwell" },
    SmArchitecture { major: 5, minor: 2, cores_per_sm: 128, name: "Maxwell" },
    SmArchitecture { major: 5, minor: 3, cores_per_sm: 128, name: "Maxwell" },

    // Pascal
    SmArchitecture { major: 6, minor: 0, cores_per_sm: 64,  name: "Pascal" },
    SmArchitecture { major: 6, minor: 1, cores_per_sm: 128, name: "Pascal" },
    SmArchitecture { major: 6, minor: 2, cores_per_sm: 128, name: "Pascal" },

    // Volta / Turing
    SmArchitecture { major: 7, minor: 0, cores_per_sm: 64,  name: "Volta" },
    SmArchitecture { major: 7, minor: 2, cores_per_sm: 64,  name: "Xavier" },
    SmArchitecture { major: 7, minor: 5, cores_per_sm: 64,  name: "Turing" },

    // Ampere / Ada / Hopper
    SmArchitecture { major: 8, minor: 0, cores_per_sm: 64,  name: "Ampere" },
    SmArchitecture { major: 8, minor: 6, cores_per_sm: 128, name: "Ampere" },
    SmArchitecture { major: 8, minor: 7, cores_per_sm: 128, name: "Ampere" },
    SmArchitecture { major: 8, minor: 9, cores_per_sm: 128, name: "Ada" },
    SmArchitecture { major: 9, minor: 0, cores_per_sm: 128, name: "Hopper" },
];

/// Look up an SM generation by compute capability
pub fn identify_sm(major: i32, minor: i32) -> Option<&'static SmArchitecture> {
    SM_ARCHITECTURES
        .iter()
        .find(|arch| arch.major == major && arch.minor == minor)
}

// Unknown versions reuse the newest known generation.
fn newest() -> &'static SmArchitecture {
    &SM_ARCHITECTURES[SM_ARCHITECTURES.len() - 1]
}

/// CUDA cores per multiprocessor for a compute capability.
///
/// Unknown versions fall back to the value of the newest entry in
/// [`SM_ARCHITECTURES`] (128) instead of failing.
pub fn cores_per_sm(major: i32, minor: i32) -> i32 {
    match identify_sm(major, minor) {
        Some(arch) => arch.cores_per_sm,
        None => {
            let fallback = newest();
            warn!(
                "MapSMtoCores for SM {}.{} is undefined. Default to use {} Cores/SM",
                major, minor, fallback.cores_per_sm
            );
            fallback.cores_per_sm
        }
    }
}

/// Architecture family name for a compute capability.
///
/// Unknown versions fall back to the newest entry's name.
pub fn architecture_name(major: i32, minor: i32) -> &'static str {
    match identify_sm(major, minor) {
        Some(arch) => arch.name,
        None => {
            let fallback = newest();
            warn!(
                "MapSMtoArchName for SM {}.{} is undefined. Default to use {}",
                major, minor, fallback.name
            );
            fallback.name
        }
    }
}
