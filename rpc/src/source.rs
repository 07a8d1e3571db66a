//! Traits the reconciliation engine is written against.
//!
//! [`ChainClient`](crate::ChainClient) implements them over a live node;
//! `govmirror-nullables` implements them over an in-memory chain.

use std::future::Future;

use govmirror_codec::StorageAddress;

use crate::RpcError;

/// Read-only view of chain storage for the duration of one cycle.
pub trait ChainReader: Send + Sync + 'static {
    /// Fetch a storage value. `Ok(None)` means the key holds nothing.
    fn query_storage(
        &self,
        address: &StorageAddress,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, RpcError>> + Send;

    /// List every key currently stored under `prefix`.
    fn enumerate_keys(
        &self,
        prefix: &StorageAddress,
    ) -> impl Future<Output = Result<Vec<StorageAddress>, RpcError>> + Send;

    /// Release the underlying transport.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Opens a fresh [`ChainReader`] for a network's endpoint list.
pub trait ChainConnector: Send + Sync + 'static {
    type Reader: ChainReader;

    fn connect(
        &self,
        endpoints: &[String],
    ) -> impl Future<Output = Result<Self::Reader, RpcError>> + Send;
}
