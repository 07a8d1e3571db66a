//! New-heads subscription stream.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::connection::WsConnection;
use crate::{Header, RpcError};

pub const SUBSCRIBE_NEW_HEADS: &str = "chain_subscribeNewHeads";
pub const UNSUBSCRIBE_NEW_HEADS: &str = "chain_unsubscribeNewHeads";

/// Push stream of new block headers.
///
/// The stream ends (`next` returns `None`) when the connection drops.
pub struct HeadSubscription {
    id: String,
    connection: Arc<WsConnection>,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl HeadSubscription {
    pub(crate) async fn open(connection: Arc<WsConnection>) -> Result<Self, RpcError> {
        let (id, rx) = connection.subscribe(SUBSCRIBE_NEW_HEADS, json!([])).await?;
        Ok(Self { id, connection, rx })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next header.
    pub async fn next(&mut self) -> Option<Result<Header, RpcError>> {
        let value = self.rx.recv().await?;
        Some(Header::from_value(value))
    }

    /// Cancel the subscription on the node.
    pub async fn unsubscribe(self) -> Result<(), RpcError> {
        self.connection.forget_subscription(&self.id).await;
        let _: Value = self
            .connection
            .request(UNSUBSCRIBE_NEW_HEADS, json!([self.id]))
            .await?;
        Ok(())
    }
}
