//! Network identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which chain a referendum belongs to.
///
/// The numeric value is assigned by configuration, not by the chain, and is
/// part of every record's primary key together with the referendum index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(u16);

impl NetworkId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Big-endian bytes, used as the leading part of storage keys so that
    /// per-network range scans stay ordered.
    pub fn to_be_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for NetworkId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}
