//! Peer access matrix between devices

use crate::error::{QueryError, QueryResult};
use crate::runtime::{DeviceProperties, DeviceRuntime};
use serde::{Deserialize, Serialize};

/// Minimum compute capability major version for peer access (Fermi)
const PEER_ACCESS_MIN_MAJOR: i32 = 2;

/// Peer access result for one ordered device pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAccess {
    /// Accessing device ordinal
    pub from: i32,
    /// Name of the accessing device
    pub from_name: String,
    /// Accessed device ordinal
    pub to: i32,
    /// Name of the accessed device
    pub to_name: String,
    /// Whether direct access is possible
    pub supported: bool,
}

/// Ordinals of devices that can take part in peer access.
///
/// `descriptors[i]` must describe ordinal `i`. On Windows the TCC driver
/// is also required.
pub fn eligible_for_peer_access(descriptors: &[DeviceProperties]) -> Vec<i32> {
    descriptors
        .iter()
        .enumerate()
        .filter(|(_, props)| {
            props.major >= PEER_ACCESS_MIN_MAJOR && (!cfg!(windows) || props.tcc_driver != 0)
        })
        .map(|(ordinal, _)| ordinal as i32)
        .collect()
}

/// Every ordered pair of distinct devices, in row-major order
pub fn peer_pairs(eligible: &[i32]) -> Vec<(i32, i32)> {
    let mut pairs = Vec::new();
    for &from in eligible {
        for &to in eligible {
            if from != to {
                pairs.push((from, to));
            }
        }
    }
    pairs
}

/// Query peer access for every ordered pair of eligible devices
pub(crate) fn check_peer_access(
    runtime: &dyn DeviceRuntime,
    eligible: &[i32],
    descriptors: &[DeviceProperties],
) -> QueryResult<Vec<PeerAccess>> {
    let name_of = |ordinal: i32| {
        descriptors
            .get(ordinal as usize)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    };

    peer_pairs(eligible)
        .into_iter()
        .map(|(from, to)| {
            let supported = runtime
                .can_access_peer(from, to)
                .map_err(|source| QueryError::PeerAccessQueryFailed { from, to, source })?;
            Ok(PeerAccess {
                from,
                from_name: name_of(from),
                to,
                to_name: name_of(to),
                supported,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::runtime::{MockDeviceRuntime, SyntheticRuntime};
    use pretty_assertions::assert_eq;

    fn with_major(name: &str, major: i32) -> DeviceProperties {
        DeviceProperties {
            name: name.to_string(),
            major,
            tcc_driver: 1,
            ..DeviceProperties::default()
        }
    }

    #[test]
    fn test_pairs_exclude_self() {
        assert_eq!(peer_pairs(&[0, 1]), vec![(0, 1), (1, 0)]);
        assert_eq!(peer_pairs(&[0, 1, 2]).len(), 6);
        assert!(peer_pairs(&[0, 1, 2]).iter().all(|(a, b)| a != b));
        assert!(peer_pairs(&[3]).is_empty());
        assert!(peer_pairs(&[]).is_empty());
    }

    #[test]
    fn test_eligibility_requires_fermi() {
        let descriptors = vec![
            with_major("old", 1),
            with_major("fermi", 2),
            with_major("ampere", 8),
        ];
        assert_eq!(eligible_for_peer_access(&descriptors), vec![1, 2]);
    }

    #[test]
    fn test_no_device_cap() {
        let descriptors: Vec<DeviceProperties> =
            (0..100).map(|i| with_major(&format!("gpu{}", i), 8)).collect();
        let eligible = eligible_for_peer_access(&descriptors);
        assert_eq!(eligible.len(), 100);
        assert_eq!(peer_pairs(&eligible).len(), 100 * 99);
    }

    #[test]
    fn test_check_peer_access_records_names() {
        let descriptors = vec![with_major("A", 8), with_major("B", 8)];
        let rt = SyntheticRuntime::new(11020, 11040)
            .with_device(descriptors[0].clone())
            .with_device(descriptors[1].clone())
            .with_peer_access(1, 0, false);

        let result = check_peer_access(&rt, &[0, 1], &descriptors).unwrap();
        assert_eq!(
            result,
            vec![
                PeerAccess {
                    from: 0,
                    from_name: "A".into(),
                    to: 1,
                    to_name: "B".into(),
                    supported: true,
                },
                PeerAccess {
                    from: 1,
                    from_name: "B".into(),
                    to: 0,
                    to_name: "A".into(),
                    supported: false,
                },
            ]
        );
    }

    #[test]
    fn test_check_peer_access_propagates_failure() {
        let mut mock = MockDeviceRuntime::new();
        mock.expect_can_access_peer()
            .times(1)
            .returning(|_, _| Err(RuntimeError::new(217, "peer access unsupported")));

        let descriptors = vec![with_major("A", 8), with_major("B", 8)];
        let err = check_peer_access(&mock, &[0, 1], &descriptors).unwrap_err();
        assert!(matches!(err, QueryError::PeerAccessQueryFailed { from: 0, to: 1, .. }));
    }
}
