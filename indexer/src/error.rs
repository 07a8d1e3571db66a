use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("rpc error: {0}")]
    Rpc(#[from] govmirror_rpc::RpcError),

    #[error("store error: {0}")]
    Store(#[from] govmirror_store::StoreError),

    #[error("decode error: {0}")]
    Decode(#[from] govmirror_codec::DecodeError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

impl IndexerError {
    /// Whether the chain connection behind this error is gone.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, IndexerError::Rpc(e) if e.is_connection_lost())
    }
}
