use crate::errors::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network address of a cluster node as handed to us by the caller.
///
/// Addresses end up inside shell command lines and drive host routing, so
/// only `[A-Za-z0-9.:-]` is accepted and the final character must be a digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn parse(raw: &str) -> ClusterResult<Self> {
        let invalid = |reason: &str| ClusterError::InvalidAddress {
            address: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.chars().count() < 2 {
            return Err(invalid("must be at least two characters long"));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-')))
        {
            return Err(invalid(&format!("unexpected character {:?}", bad)));
        }
        if !raw.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid("must end with a decimal digit"));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last two characters, the suffix used in container names.
    pub fn suffix(&self) -> &str {
        // validated ASCII, length >= 2
        &self.0[self.0.len() - 2..]
    }

    pub fn last_char(&self) -> char {
        self.0.chars().last().unwrap_or('0')
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = ClusterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeAddress> for String {
    fn from(address: NodeAddress) -> Self {
        address.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Worker,
}

impl Role {
    pub fn prefix(self) -> &'static str {
        match self {
            Role::Master => "master-",
            Role::Worker => "slave-",
        }
    }
}

/// Name of the LXC container hosting one node, e.g. `master-10` or `slave-11`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerIdentity(String);

impl ContainerIdentity {
    /// Role prefix plus the last two characters of the address.
    ///
    /// Two addresses sharing a suffix and a role map to the same identity;
    /// the topology planner reports that as a naming collision.
    pub fn resolve(address: &NodeAddress, role: Role) -> Self {
        Self(format!("{}{}", role.prefix(), address.suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContainerIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
