//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RpcError;

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// Any frame the node may send: a response (has `id`) or a subscription
/// notification (has `method` + `params.subscription`).
#[derive(Debug, Deserialize)]
pub struct Incoming {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<NotificationParams>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub subscription: Value,
    pub result: Value,
}

/// Classified incoming frame.
#[derive(Debug)]
pub enum Frame {
    Response { id: u64, result: Result<Value, RpcError> },
    Notification { subscription: String, result: Value },
}

impl Incoming {
    pub fn into_frame(self) -> Option<Frame> {
        if let Some(id) = self.id {
            let result = match self.error {
                Some(err) => Err(RpcError::Rpc {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            return Some(Frame::Response { id, result });
        }
        let params = self.params?;
        self.method?;
        let subscription = match params.subscription {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Some(Frame::Notification {
            subscription,
            result: params.result,
        })
    }
}

/// Parse one text frame from the node.
pub fn parse_frame(text: &str) -> Result<Option<Frame>, RpcError> {
    let incoming: Incoming = serde_json::from_str(text)?;
    Ok(incoming.into_frame())
}
