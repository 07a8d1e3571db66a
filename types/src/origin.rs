//! Proposal origins as carried by an ongoing referendum.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AccountId32;

/// `frame_system::RawOrigin`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemOrigin {
    Root,
    Signed(AccountId32),
    None,
}

/// The dispatch origin a referendum was submitted under.
///
/// System origins are decoded structurally. Every other origin caller is a
/// single-byte enum in the runtimes this indexer targets, kept as the pair
/// `(caller index, variant index)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    System(SystemOrigin),
    Custom { caller: u8, variant: u8 },
}

/// Variant names of the OpenGov `Origins` enum, by index.
const CUSTOM_ORIGIN_NAMES: &[&str] = &[
    "StakingAdmin",
    "Treasurer",
    "FellowshipAdmin",
    "GeneralAdmin",
    "AuctionAdmin",
    "LeaseAdmin",
    "ReferendumCanceller",
    "ReferendumKiller",
    "SmallTipper",
    "BigTipper",
    "SmallSpender",
    "MediumSpender",
    "BigSpender",
    "WhitelistedCaller",
    "WishForChange",
];

impl Origin {
    pub fn name(&self) -> String {
        match self {
            Self::System(SystemOrigin::Root) => "Root".to_string(),
            Self::System(SystemOrigin::Signed(who)) => format!("Signed({who})"),
            Self::System(SystemOrigin::None) => "None".to_string(),
            Self::Custom { caller, variant } => CUSTOM_ORIGIN_NAMES
                .get(*variant as usize)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Origin({caller}:{variant})")),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
