//! Node addressing and role.
//!
//! A node is identified on the mesh by its 6-byte hardware address. The
//! canonical rendering is 12 lowercase hex digits with no separators; all
//! comparisons between addresses received as text go through this form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a hardware address in bytes.
pub const ADDRESS_LEN: usize = 6;

/// Fixed-width hardware address of a mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress([u8; ADDRESS_LEN]);

impl NodeAddress {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Canonical rendering: lowercase hex, no separators.
    pub fn canonical(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; ADDRESS_LEN]> for NodeAddress {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    /// Accepts `aabbccddeeff`, `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`,
    /// in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits: String = if trimmed.contains([':', '-']) {
            let groups: Vec<&str> = trimmed.split([':', '-']).collect();
            if groups.len() != ADDRESS_LEN || groups.iter().any(|g| g.len() != 2) {
                return Err(AddressError::Malformed(s.to_string()));
            }
            groups.concat()
        } else {
            trimmed.to_string()
        };

        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::Malformed(s.to_string()));
        }
        let bytes = hex::decode(&digits).map_err(|_| AddressError::Malformed(s.to_string()))?;
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for NodeAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The part a node currently plays in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Bridges the mesh to the external broker.
    Root,
    /// Reports to, and receives broadcasts from, the root.
    NonRoot,
}

impl Role {
    pub fn is_root(self) -> bool {
        matches!(self, Role::Root)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Root => f.write_str("root"),
            Role::NonRoot => f.write_str("non-root"),
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "root" => Ok(Role::Root),
            "non-root" | "nonroot" | "child" => Ok(Role::NonRoot),
            other => Err(RoleError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("malformed node address: {0:?}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct RoleError(pub String);
