//! Storage addressing and binary decoding for the Referenda pallet.
//!
//! - [`hashing`]: the xxHash and Blake2 hashers used to build storage keys.
//! - [`address`]: deterministic storage addresses for pallet items and map
//!   entries, and recovery of referendum ids from enumerated keys.
//! - [`ss58`]: human-readable account rendering.
//! - [`referendum`]: the tagged `ReferendumInfo` layout and its defensive
//!   decoder.

pub mod address;
pub mod error;
pub mod hashing;
pub mod referendum;
pub mod ss58;

pub use address::{
    derive_address, referendum_count_address, referendum_id_from_address,
    referendum_info_address, referendum_info_prefix, StorageAddress, REFERENDA_PALLET,
    REFERENDUM_COUNT, REFERENDUM_INFO_FOR,
};
pub use error::DecodeError;
pub use referendum::{
    decode_referendum_count, decode_referendum_info, DecidingStatus, DecodedDeposit,
    DecodedReferendum, DispatchTime, OngoingStatus, ProposalBounded, RawDeposit, RawOrigin,
    RawTally, ReferendumInfo,
};
pub use ss58::ss58_encode;
