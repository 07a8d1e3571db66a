//! Pre-built [`tracing::Span`] constructors for indexer operations.
//!
//! Consistent span names and field sets make cycles easy to filter and
//! correlate in aggregated logs.

use tracing::{debug_span, info_span, Span};

use govmirror_types::NetworkId;

/// Span covering one reconciliation cycle of a network.
pub fn cycle_span(network: &str, network_id: NetworkId) -> Span {
    info_span!("cycle", network = %network, network_id = %network_id)
}

/// Span covering the fetch/decode/upsert of a single referendum.
pub fn reconcile_span(ref_id: u32) -> Span {
    debug_span!("reconcile", ref_id)
}
