//! LMDB storage backend for the referendum mirror.
//!
//! Implements the storage traits from `govmirror-store` using the `heed` LMDB
//! bindings. Records and metadata live in two named databases within a single
//! environment.

pub mod environment;
pub mod error;
pub mod integrity;
pub mod key;
pub mod meta;
pub mod migration;
pub mod referendum;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use meta::LmdbMetaStore;
pub use referendum::LmdbReferendumStore;
