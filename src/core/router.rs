use crate::errors::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two machines that actually run the LXC containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhysicalHost(String);

impl PhysicalHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhysicalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Picks the physical host for an address or container name by the parity
/// of its final digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRouter {
    even: PhysicalHost,
    odd: PhysicalHost,
}

impl HostRouter {
    pub fn new(even: PhysicalHost, odd: PhysicalHost) -> Self {
        Self { even, odd }
    }

    pub fn route(&self, target: &str) -> ClusterResult<&PhysicalHost> {
        let digit = target
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| ClusterError::InvalidAddress {
                address: target.to_string(),
                reason: "cannot route: final character is not a decimal digit".to_string(),
            })?;

        Ok(if digit % 2 == 0 { &self.even } else { &self.odd })
    }
}
