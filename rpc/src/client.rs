//! High-level chain client and endpoint failover.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use govmirror_codec::StorageAddress;

use crate::connection::WsConnection;
use crate::pagination::{effective_page_size, DEFAULT_PAGE_SIZE};
use crate::source::{ChainConnector, ChainReader};
use crate::{Header, HeadSubscription, RpcError};

/// Timeouts and paging for one client.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub keys_page_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            keys_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A live, probed connection to one node.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct ChainClient {
    connection: Arc<WsConnection>,
    options: ClientOptions,
}

impl ChainClient {
    /// Open a transport to `url` without probing it.
    pub async fn open(url: &str, options: ClientOptions) -> Result<Self, RpcError> {
        let connection =
            WsConnection::open(url, options.connect_timeout, options.request_timeout).await?;
        Ok(Self {
            connection: Arc::new(connection),
            options,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.connection.url()
    }

    /// Current best head (`chain_getHeader`). Doubles as the liveness probe.
    pub async fn head(&self) -> Result<Header, RpcError> {
        let value: serde_json::Value = self.connection.request("chain_getHeader", json!([])).await?;
        Header::from_value(value)
    }

    /// `state_getStorage`. An absent or empty value is `None`.
    pub async fn storage(&self, address: &StorageAddress) -> Result<Option<Vec<u8>>, RpcError> {
        let value: Option<String> = self
            .connection
            .request("state_getStorage", json!([address.to_hex()]))
            .await?;
        let Some(hex_value) = value else {
            return Ok(None);
        };
        let bytes = hex::decode(hex_value.trim_start_matches("0x"))
            .map_err(|e| RpcError::InvalidResponse(format!("storage value: {e}")))?;
        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }

    /// `state_getKeysPaged`, repeated until the node returns a short page.
    pub async fn keys(&self, prefix: &StorageAddress) -> Result<Vec<StorageAddress>, RpcError> {
        let page_size = effective_page_size(self.options.keys_page_size);
        let mut all = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page: Vec<String> = self
                .connection
                .request(
                    "state_getKeysPaged",
                    json!([prefix.to_hex(), page_size, start]),
                )
                .await?;
            let fetched = page.len();
            let last = page.last().cloned();
            for key in page {
                all.push(StorageAddress::from_hex(&key)?);
            }
            debug!(prefix = %prefix, fetched, total = all.len(), "keys page");

            if fetched < page_size as usize {
                break;
            }
            // A node that keeps returning the same cursor would loop forever.
            if last.is_none() || last == start {
                break;
            }
            start = last;
        }
        Ok(all)
    }

    pub async fn subscribe_new_heads(&self) -> Result<HeadSubscription, RpcError> {
        HeadSubscription::open(Arc::clone(&self.connection)).await
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }
}

impl ChainReader for ChainClient {
    async fn query_storage(&self, address: &StorageAddress) -> Result<Option<Vec<u8>>, RpcError> {
        self.storage(address).await
    }

    async fn enumerate_keys(
        &self,
        prefix: &StorageAddress,
    ) -> Result<Vec<StorageAddress>, RpcError> {
        self.keys(prefix).await
    }

    async fn close(&self) {
        ChainClient::close(self).await
    }
}

/// Try each endpoint in order; return the first that opens and answers the
/// head probe.
pub async fn connect(
    endpoints: &[String],
    options: &ClientOptions,
) -> Result<ChainClient, RpcError> {
    let mut last_error = String::from("no endpoints configured");

    for url in endpoints {
        let client = match ChainClient::open(url, options.clone()).await {
            Ok(client) => client,
            Err(e) => {
                warn!(endpoint = %url, error = %e, "endpoint unreachable");
                last_error = format!("{url}: {e}");
                continue;
            }
        };
        match client.head().await {
            Ok(head) => {
                info!(endpoint = %url, head = head.number, "connected to chain");
                return Ok(client);
            }
            Err(e) => {
                warn!(endpoint = %url, error = %e, "liveness probe failed");
                last_error = format!("{url}: {e}");
                client.close().await;
            }
        }
    }

    Err(RpcError::NoReachableEndpoint {
        attempted: endpoints.len(),
        last_error,
    })
}

/// [`ChainConnector`] over real WebSocket endpoints.
#[derive(Clone, Debug, Default)]
pub struct WsConnector {
    pub options: ClientOptions,
}

impl WsConnector {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

impl ChainConnector for WsConnector {
    type Reader = ChainClient;

    async fn connect(&self, endpoints: &[String]) -> Result<ChainClient, RpcError> {
        connect(endpoints, &self.options).await
    }
}
