//! Referendum records and their lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{NetworkId, Origin, Timestamp, TypesError};

/// Placeholder written into provenance fields that could not be decoded.
pub const UNKNOWN_SUBMITTER: &str = "Unknown";

/// Lifecycle state of a referendum as last observed on chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferendumStatus {
    /// Still being decided; tally and phase blocks move.
    Ongoing,
    Approved,
    Rejected,
    Cancelled,
    TimedOut,
    Killed,
    /// The chain no longer stores the referendum.
    Cleared,
    Unknown,
}

impl ReferendumStatus {
    /// Whether the referendum can never change again once in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved
                | Self::Rejected
                | Self::Cancelled
                | Self::TimedOut
                | Self::Killed
                | Self::Cleared
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "Ongoing",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
            Self::Killed => "Killed",
            Self::Cleared => "Cleared",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ReferendumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferendumStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ongoing" => Ok(Self::Ongoing),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Cancelled" => Ok(Self::Cancelled),
            "TimedOut" => Ok(Self::TimedOut),
            "Killed" => Ok(Self::Killed),
            "Cleared" => Ok(Self::Cleared),
            "Unknown" => Ok(Self::Unknown),
            other => Err(TypesError::UnknownStatus(other.to_string())),
        }
    }
}

/// Current vote weights of an ongoing referendum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub ayes: u128,
    pub nays: u128,
    pub support: u128,
}

/// A deposit held against a referendum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// SS58 rendering of the depositor's account.
    pub who: String,
    pub amount: u128,
}

/// When an approved proposal is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enactment {
    /// At an absolute block number.
    At(u32),
    /// A number of blocks after approval.
    After(u32),
}

impl fmt::Display for Enactment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(block) => write!(f, "at #{block}"),
            Self::After(blocks) => write!(f, "after {blocks} blocks"),
        }
    }
}

/// Local mirror of one referendum, keyed by `(network_id, ref_id)`.
///
/// Rows are created the first time the indexer sees an id and are only
/// mutated while `finalized` is false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferendumRecord {
    pub network_id: NetworkId,
    pub ref_id: u32,
    pub status: ReferendumStatus,
    pub finalized: bool,

    pub track: Option<u16>,
    pub origin: Option<Origin>,
    pub enactment: Option<Enactment>,

    // Block numbers of phase transitions; zero until known.
    pub submitted_block: u32,
    pub decision_start_block: u32,
    pub decision_end_block: u32,
    pub confirm_start_block: u32,
    pub confirm_end_block: u32,

    /// Only carried while `status == Ongoing`.
    pub tally: Option<Tally>,
    pub in_queue: bool,

    pub submitter: String,
    pub submission_deposit: Option<Deposit>,
    pub decision_deposit: Option<Deposit>,

    pub updated_at: Timestamp,
}

impl ReferendumRecord {
    /// A record for an id the chain no longer stores.
    pub fn cleared(network_id: NetworkId, ref_id: u32, now: Timestamp) -> Self {
        Self {
            network_id,
            ref_id,
            status: ReferendumStatus::Cleared,
            finalized: true,
            track: None,
            origin: None,
            enactment: None,
            submitted_block: 0,
            decision_start_block: 0,
            decision_end_block: 0,
            confirm_start_block: 0,
            confirm_end_block: 0,
            tally: None,
            in_queue: false,
            submitter: UNKNOWN_SUBMITTER.to_string(),
            submission_deposit: None,
            decision_deposit: None,
            updated_at: now,
        }
    }

    pub fn track_name(&self) -> Option<String> {
        self.track.map(crate::track_name)
    }
}
