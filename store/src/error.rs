use govmirror_types::NetworkId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row is finalized and may no longer be written.
    #[error("referendum {ref_id} on network {network} is finalized")]
    Finalized { network: NetworkId, ref_id: u32 },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
