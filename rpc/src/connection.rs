//! A single WebSocket connection to a node.
//!
//! One background task owns the socket. Requests are written through an
//! unbounded channel and matched back to their callers by JSON-RPC id;
//! subscription notifications are routed by subscription id. When the socket
//! fails, every pending request is failed with [`RpcError::Transport`] and
//! every subscription stream ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::jsonrpc::{parse_frame, Frame, Request};
use crate::RpcError;

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>;
type SubscriptionMap = HashMap<String, mpsc::UnboundedSender<Value>>;

static INSTALL_CRYPTO: Once = Once::new();

/// Install the process-wide rustls provider used for `wss://` endpoints.
fn install_crypto_provider() {
    INSTALL_CRYPTO.call_once(|| {
        // Another component may have installed one already; either is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub struct WsConnection {
    url: String,
    next_id: AtomicU64,
    outbound: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<PendingMap>>,
    subscriptions: Arc<Mutex<SubscriptionMap>>,
    alive: Arc<AtomicBool>,
    io_task: JoinHandle<()>,
    request_timeout: Duration,
}

impl WsConnection {
    /// Open the transport. Does not probe liveness.
    pub async fn open(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RpcError> {
        install_crypto_provider();

        let (stream, _response) =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| RpcError::Transport(format!("connect to {url} timed out")))??;
        debug!(endpoint = %url, "websocket opened");

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let subscriptions: Arc<Mutex<SubscriptionMap>> = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let task_pending = Arc::clone(&pending);
        let task_subs = Arc::clone(&subscriptions);
        let task_alive = Arc::clone(&alive);
        let task_url = url.to_string();

        let io_task = tokio::spawn(async move {
            let reason = loop {
                tokio::select! {
                    msg = outbound_rx.recv() => {
                        let Some(msg) = msg else {
                            let _ = sink.close().await;
                            break "closed locally".to_string();
                        };
                        if let Err(e) = sink.send(msg).await {
                            break format!("send failed: {e}");
                        }
                    }
                    incoming = source.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                dispatch(&text, &task_pending, &task_subs).await;
                            }
                            Some(Ok(Message::Binary(bytes))) => {
                                match std::str::from_utf8(&bytes) {
                                    Ok(text) => dispatch(text, &task_pending, &task_subs).await,
                                    Err(_) => {
                                        warn!(
                                            endpoint = %task_url,
                                            "dropping non-utf8 binary frame"
                                        )
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                break "closed by peer".to_string()
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break format!("receive failed: {e}"),
                        }
                    }
                }
            };

            task_alive.store(false, Ordering::SeqCst);
            debug!(endpoint = %task_url, %reason, "websocket task finished");
            for (_, tx) in task_pending.lock().await.drain() {
                let _ = tx.send(Err(RpcError::Transport(reason.clone())));
            }
            task_subs.lock().await.clear();
        });

        Ok(Self {
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            outbound,
            pending,
            subscriptions,
            alive,
            io_task,
            request_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// One request/response round trip, bounded by the request timeout.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let value = self.request_value(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))
    }

    async fn request_value(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        if !self.is_alive() {
            return Err(RpcError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&Request::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        trace!(endpoint = %self.url, id, method, "rpc request");

        if self.outbound.send(Message::Text(body)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::Transport("connection task stopped".into()));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Transport(
                "connection dropped while awaiting response".into(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(RpcError::Timeout {
                    method: method.to_string(),
                    after: self.request_timeout,
                })
            }
        }
    }

    /// Open a subscription and return its id plus the notification stream.
    ///
    /// Notifications that arrive before the subscription id is registered
    /// are dropped.
    pub async fn subscribe(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(String, mpsc::UnboundedReceiver<Value>), RpcError> {
        let id: Value = self.request_value(method, params).await?;
        let id = match id {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(RpcError::InvalidResponse(format!(
                    "{method}: unexpected subscription id {other}"
                )))
            }
        };
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.lock().await.insert(id.clone(), tx);
        Ok((id, rx))
    }

    /// Stop routing notifications for `subscription`.
    pub async fn forget_subscription(&self, subscription: &str) {
        self.subscriptions.lock().await.remove(subscription);
    }

    /// Close the socket and wait for the IO task to finish.
    pub async fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            while self.is_alive() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        self.io_task.abort();
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}

async fn dispatch(text: &str, pending: &Mutex<PendingMap>, subscriptions: &Mutex<SubscriptionMap>) {
    match parse_frame(text) {
        Ok(Some(Frame::Response { id, result })) => match pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => trace!(id, "response for unknown or expired request"),
        },
        Ok(Some(Frame::Notification {
            subscription,
            result,
        })) => {
            let mut subs = subscriptions.lock().await;
            if let Some(tx) = subs.get(&subscription) {
                if tx.send(result).is_err() {
                    subs.remove(&subscription);
                }
            }
        }
        Ok(None) => trace!("ignoring frame without id or subscription"),
        Err(e) => warn!(error = %e, "unparseable frame from node"),
    }
}
