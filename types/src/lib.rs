//! Fundamental types for the govmirror referendum indexer.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! network identifiers, account ids, referendum records and their lifecycle
//! states, OpenGov track and origin names, and timestamps.

pub mod address;
pub mod error;
pub mod network;
pub mod origin;
pub mod referendum;
pub mod time;
pub mod track;

pub use address::AccountId32;
pub use error::TypesError;
pub use network::NetworkId;
pub use origin::{Origin, SystemOrigin};
pub use referendum::{
    Deposit, Enactment, ReferendumRecord, ReferendumStatus, Tally, UNKNOWN_SUBMITTER,
};
pub use time::{Clock, SystemClock, Timestamp};
pub use track::track_name;
