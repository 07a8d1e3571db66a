//! Chain RPC client.
//!
//! Speaks Substrate JSON-RPC over a WebSocket:
//! - [`connect`] walks the configured endpoints in order and returns the
//!   first one that both opens and answers a liveness probe.
//! - [`ChainClient`] exposes storage reads, paged key enumeration, the
//!   current head and the new-heads subscription.
//! - [`ChainReader`] / [`ChainConnector`] are the seams the indexer is
//!   written against, so tests can swap in an in-memory chain.
//!
//! The client never retries. Retry policy belongs to the caller.

pub mod client;
pub mod connection;
pub mod error;
pub mod header;
pub mod jsonrpc;
pub mod pagination;
pub mod source;
pub mod subscription;

pub use client::{connect, ChainClient, ClientOptions, WsConnector};
pub use error::RpcError;
pub use header::Header;
pub use source::{ChainConnector, ChainReader};
pub use subscription::HeadSubscription;
