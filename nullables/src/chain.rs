//! Nullable chain: an in-memory Referenda pallet behind the RPC seams.
//!
//! Payloads are stored as raw SCALE bytes under their real storage
//! addresses, so the reader exercises the same addressing and key recovery
//! code as a live node.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use govmirror_codec::{
    referendum_count_address, referendum_id_from_address, referendum_info_address,
    StorageAddress,
};
use govmirror_rpc::{ChainConnector, ChainReader, RpcError};

use crate::lock;

#[derive(Debug, Default)]
struct ChainState {
    referenda: BTreeMap<u32, Vec<u8>>,
    referendum_count: Option<u32>,
    unreachable: bool,
    enumeration_fails: bool,
    timeouts: HashSet<u32>,
    drop_after: Option<usize>,
    query_delay: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    closes: AtomicUsize,
    queries: AtomicUsize,
}

/// Controllable in-memory chain. Cloning shares the same state.
#[derive(Clone, Debug, Default)]
pub struct NullChain {
    state: Arc<Mutex<ChainState>>,
    counters: Arc<Counters>,
}

impl NullChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw `ReferendumInfoFor` payload for `ref_id`.
    pub fn set_referendum(&self, ref_id: u32, payload: Vec<u8>) {
        lock(&self.state).referenda.insert(ref_id, payload);
    }

    /// Prune `ref_id` from chain storage.
    pub fn remove_referendum(&self, ref_id: u32) {
        lock(&self.state).referenda.remove(&ref_id);
    }

    pub fn set_referendum_count(&self, count: u32) {
        lock(&self.state).referendum_count = Some(count);
    }

    /// Refuse every connection attempt.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    /// Fail key enumeration with a transport error.
    pub fn set_enumeration_fails(&self, fails: bool) {
        lock(&self.state).enumeration_fails = fails;
    }

    /// Make every storage query for `ref_id` time out.
    pub fn timeout_on(&self, ref_id: u32) {
        lock(&self.state).timeouts.insert(ref_id);
    }

    /// The next connection serves `queries` storage reads, then drops.
    pub fn drop_connection_after(&self, queries: usize) {
        lock(&self.state).drop_after = Some(queries);
    }

    /// Delay every storage query.
    pub fn set_query_delay(&self, delay: Duration) {
        lock(&self.state).query_delay = delay;
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Storage reads served across all connections.
    pub fn queries(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }
}

impl ChainConnector for NullChain {
    type Reader = NullChainReader;

    async fn connect(&self, endpoints: &[String]) -> Result<NullChainReader, RpcError> {
        let mut state = lock(&self.state);
        if state.unreachable || endpoints.is_empty() {
            return Err(RpcError::NoReachableEndpoint {
                attempted: endpoints.len(),
                last_error: "null chain unreachable".into(),
            });
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(NullChainReader {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            budget: state.drop_after.take().map(AtomicUsize::new),
        })
    }
}

/// One "connection" to a [`NullChain`].
#[derive(Debug)]
pub struct NullChainReader {
    state: Arc<Mutex<ChainState>>,
    counters: Arc<Counters>,
    budget: Option<AtomicUsize>,
}

impl NullChainReader {
    /// Consume one unit of the drop budget; false once the link has dropped.
    fn link_up(&self) -> bool {
        match &self.budget {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }
}

impl ChainReader for NullChainReader {
    async fn query_storage(&self, address: &StorageAddress) -> Result<Option<Vec<u8>>, RpcError> {
        let delay = lock(&self.state).query_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.link_up() {
            return Err(RpcError::Transport("null chain connection dropped".into()));
        }
        self.counters.queries.fetch_add(1, Ordering::SeqCst);

        let state = lock(&self.state);
        if *address == referendum_count_address() {
            return Ok(state.referendum_count.map(|c| c.to_le_bytes().to_vec()));
        }
        let Some(ref_id) = referendum_id_from_address(address) else {
            return Ok(None);
        };
        if state.timeouts.contains(&ref_id) {
            return Err(RpcError::Timeout {
                method: "state_getStorage".into(),
                after: Duration::from_secs(10),
            });
        }
        Ok(state.referenda.get(&ref_id).cloned())
    }

    async fn enumerate_keys(
        &self,
        prefix: &StorageAddress,
    ) -> Result<Vec<StorageAddress>, RpcError> {
        let state = lock(&self.state);
        if state.enumeration_fails {
            return Err(RpcError::Transport("null chain enumeration failed".into()));
        }
        Ok(state
            .referenda
            .keys()
            .map(|id| referendum_info_address(*id))
            .filter(|addr| addr.starts_with(prefix))
            .collect())
    }

    async fn close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govmirror_codec::{decode_referendum_count, referendum_info_prefix};

    fn endpoints() -> Vec<String> {
        vec!["null://chain".to_string()]
    }

    #[tokio::test]
    async fn serves_payloads_under_real_addresses() {
        let chain = NullChain::new();
        chain.set_referendum(6, vec![2, 1, 0, 0, 0]);
        chain.set_referendum_count(7);
        let reader = chain.connect(&endpoints()).await.unwrap();

        let keys = reader.enumerate_keys(&referendum_info_prefix()).await.unwrap();
        assert_eq!(keys, vec![referendum_info_address(6)]);
        assert_eq!(
            reader.query_storage(&referendum_info_address(6)).await.unwrap(),
            Some(vec![2, 1, 0, 0, 0])
        );
        assert_eq!(reader.query_storage(&referendum_info_address(5)).await.unwrap(), None);

        let count = reader.query_storage(&referendum_count_address()).await.unwrap().unwrap();
        assert_eq!(decode_referendum_count(&count).unwrap(), 7);
    }

    #[tokio::test]
    async fn unreachable_chain_refuses_connections() {
        let chain = NullChain::new();
        chain.set_unreachable(true);
        let err = chain.connect(&endpoints()).await.unwrap_err();
        assert!(matches!(err, RpcError::NoReachableEndpoint { attempted: 1, .. }));
        assert_eq!(chain.connects(), 0);
    }

    #[tokio::test]
    async fn dropped_link_stays_down() {
        let chain = NullChain::new();
        chain.set_referendum(1, vec![3, 0, 0, 0, 0]);
        chain.drop_connection_after(1);
        let reader = chain.connect(&endpoints()).await.unwrap();
        let addr = referendum_info_address(1);

        assert!(reader.query_storage(&addr).await.is_ok());
        assert!(reader.query_storage(&addr).await.unwrap_err().is_connection_lost());
        assert!(reader.query_storage(&addr).await.unwrap_err().is_connection_lost());

        // The budget applied to one connection only.
        let fresh = chain.connect(&endpoints()).await.unwrap();
        assert!(fresh.query_storage(&addr).await.is_ok());
    }
}
