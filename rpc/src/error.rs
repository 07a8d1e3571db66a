//! RPC client error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Every configured endpoint failed to connect or to answer the probe.
    #[error("no reachable endpoint ({attempted} tried): {last_error}")]
    NoReachableEndpoint { attempted: usize, last_error: String },

    /// The connection itself failed or dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,

    /// A single round trip exceeded its deadline.
    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether the connection can no longer be used.
    ///
    /// Timeouts and node-side errors concern a single request and leave the
    /// connection usable.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Closed | Self::NoReachableEndpoint { .. }
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RpcError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::InvalidResponse(e.to_string())
    }
}

impl From<govmirror_codec::DecodeError> for RpcError {
    fn from(e: govmirror_codec::DecodeError) -> Self {
        RpcError::InvalidResponse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_loss_classification() {
        assert!(RpcError::Transport("reset".into()).is_connection_lost());
        assert!(RpcError::Closed.is_connection_lost());
        assert!(!RpcError::Timeout { method: "x".into(), after: Duration::from_secs(1) }
            .is_connection_lost());
        assert!(!RpcError::Rpc { code: -32000, message: "busy".into() }.is_connection_lost());
        assert!(!RpcError::InvalidResponse("bad".into()).is_connection_lost());
    }
}
