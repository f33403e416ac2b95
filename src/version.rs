//! Packed CUDA version numbers
//!
//! The driver and runtime report their versions as a single integer,
//! `1000 * major + 10 * minor` (e.g. `11020` for 11.2).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decomposed `major.minor` version
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CudaVersion {
    /// Major version
    pub major: i32,
    /// Minor version
    pub minor: i32,
}

impl CudaVersion {
    /// Create a version from its parts
    pub const fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }

    /// Decompose a packed driver/runtime version integer
    pub const fn from_packed(packed: i32) -> Self {
        Self {
            major: version_major(packed),
            minor: version_minor(packed),
        }
    }
}

impl fmt::Display for CudaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Major part of a packed version
pub const fn version_major(packed: i32) -> i32 {
    packed / 1000
}

/// Minor part of a packed version
pub const fn version_minor(packed: i32) -> i32 {
    (packed % 100) / 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1000, 1, 0)]
    #[case(1099, 1, 9)]
    #[case(11020, 11, 2)]
    #[case(11040, 11, 4)]
    #[case(12030, 12, 3)]
    #[case(0, 0, 0)]
    fn test_from_packed(#[case] packed: i32, #[case] major: i32, #[case] minor: i32) {
        let version = CudaVersion::from_packed(packed);
        assert_eq!(version.major, major);
        assert_eq!(version.minor, minor);
        assert_eq!(version_major(packed), packed / 1000);
        assert_eq!(version_minor(packed), (packed % 100) / 10);
    }

    #[test]
    fn test_display() {
        assert_eq!(CudaVersion::from_packed(11020).to_string(), "11.2");
        assert_eq!(CudaVersion::new(8, 6).to_string(), "8.6");
    }
}
