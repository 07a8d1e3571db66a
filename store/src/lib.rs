//! Abstract storage traits for the referendum mirror.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The indexer depends only on the traits.

pub mod error;
pub mod meta;
pub mod referendum;

pub use error::StoreError;
pub use meta::MetaStore;
pub use referendum::ReferendumStore;
