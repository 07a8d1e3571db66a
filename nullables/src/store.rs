//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use govmirror_store::{ReferendumStore, StoreError};
use govmirror_types::{NetworkId, ReferendumRecord};

use crate::lock;

/// An in-memory referendum store that counts writes.
///
/// Enforces the same finalized-row guard as the LMDB backend.
#[derive(Debug, Default)]
pub struct NullReferendumStore {
    records: Mutex<BTreeMap<(NetworkId, u32), ReferendumRecord>>,
    failing_writes: Mutex<HashSet<u32>>,
    writes: AtomicUsize,
}

impl NullReferendumStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row without counting it as a write.
    pub fn seed(&self, record: ReferendumRecord) {
        lock(&self.records).insert((record.network_id, record.ref_id), record);
    }

    /// Make every upsert of `ref_id` fail with a backend error.
    pub fn fail_writes_for(&self, ref_id: u32) {
        lock(&self.failing_writes).insert(ref_id);
    }

    pub fn clear_write_failures(&self) {
        lock(&self.failing_writes).clear();
    }

    /// Number of successful upserts so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_writes(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Snapshot of one row.
    pub fn record(&self, network: NetworkId, ref_id: u32) -> Option<ReferendumRecord> {
        lock(&self.records).get(&(network, ref_id)).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReferendumStore for NullReferendumStore {
    fn max_ref_id(&self, network: NetworkId) -> Result<Option<u32>, StoreError> {
        Ok(lock(&self.records)
            .range((network, 0)..=(network, u32::MAX))
            .next_back()
            .map(|((_, id), _)| *id))
    }

    fn unfinalized_ref_ids(&self, network: NetworkId) -> Result<Vec<u32>, StoreError> {
        Ok(lock(&self.records)
            .range((network, 0)..=(network, u32::MAX))
            .filter(|(_, r)| !r.finalized)
            .map(|((_, id), _)| *id)
            .collect())
    }

    fn get_record(
        &self,
        network: NetworkId,
        ref_id: u32,
    ) -> Result<Option<ReferendumRecord>, StoreError> {
        Ok(self.record(network, ref_id))
    }

    fn exists_record(&self, network: NetworkId, ref_id: u32) -> Result<bool, StoreError> {
        Ok(lock(&self.records).contains_key(&(network, ref_id)))
    }

    fn upsert_record(&self, record: &ReferendumRecord) -> Result<(), StoreError> {
        if lock(&self.failing_writes).contains(&record.ref_id) {
            return Err(StoreError::Backend(format!(
                "injected write failure for {}",
                record.ref_id
            )));
        }
        let mut records = lock(&self.records);
        let key = (record.network_id, record.ref_id);
        if records.get(&key).is_some_and(|r| r.finalized) {
            return Err(StoreError::Finalized {
                network: record.network_id,
                ref_id: record.ref_id,
            });
        }
        records.insert(key, record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_records(&self, network: NetworkId) -> Result<Vec<ReferendumRecord>, StoreError> {
        Ok(lock(&self.records)
            .range((network, 0)..=(network, u32::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
