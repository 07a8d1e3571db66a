//! LMDB implementation of ReferendumStore.
//!
//! Key format: see [`crate::key`]. Values are bincode-encoded
//! [`ReferendumRecord`]s.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use govmirror_store::{ReferendumStore, StoreError};
use govmirror_types::{NetworkId, ReferendumRecord};

use crate::key::{network_range, record_key, ref_id_from_key};
use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbReferendumStore {
    pub(crate) env: Arc<Env>,
    pub(crate) records_db: Database<Bytes, Bytes>,
}

impl LmdbReferendumStore {
    /// Visit every row of a network in id order.
    fn scan<F>(&self, rtxn: &RoTxn, network: NetworkId, mut visit: F) -> Result<(), LmdbError>
    where
        F: FnMut(u32, &[u8]) -> Result<(), LmdbError>,
    {
        let (lo, hi) = network_range(network);
        let bounds = (Bound::Included(&lo[..]), Bound::Included(&hi[..]));
        for entry in self.records_db.range(rtxn, &bounds)? {
            let (key, val) = entry?;
            let ref_id = ref_id_from_key(key)
                .ok_or_else(|| LmdbError::Serialization("malformed record key".into()))?;
            visit(ref_id, val)?;
        }
        Ok(())
    }
}

impl ReferendumStore for LmdbReferendumStore {
    fn max_ref_id(&self, network: NetworkId) -> Result<Option<u32>, StoreError> {
        let (lo, hi) = network_range(network);
        let bounds = (Bound::Included(&lo[..]), Bound::Included(&hi[..]));
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut iter = self
            .records_db
            .rev_range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        match iter.next() {
            Some(entry) => {
                let (key, _) = entry.map_err(LmdbError::from)?;
                Ok(ref_id_from_key(key))
            }
            None => Ok(None),
        }
    }

    fn unfinalized_ref_ids(&self, network: NetworkId) -> Result<Vec<u32>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut ids = Vec::new();
        self.scan(&rtxn, network, |ref_id, val| {
            let record: ReferendumRecord = bincode::deserialize(val)?;
            if !record.finalized {
                ids.push(ref_id);
            }
            Ok(())
        })?;
        Ok(ids)
    }

    fn get_record(
        &self,
        network: NetworkId,
        ref_id: u32,
    ) -> Result<Option<ReferendumRecord>, StoreError> {
        let key = record_key(network, ref_id);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.records_db.get(&rtxn, &key[..]).map_err(LmdbError::from)? {
            Some(val) => {
                let record = bincode::deserialize(val).map_err(LmdbError::from)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn exists_record(&self, network: NetworkId, ref_id: u32) -> Result<bool, StoreError> {
        let key = record_key(network, ref_id);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self.records_db.get(&rtxn, &key[..]).map_err(LmdbError::from)?;
        Ok(found.is_some())
    }

    fn upsert_record(&self, record: &ReferendumRecord) -> Result<(), StoreError> {
        let key = record_key(record.network_id, record.ref_id);
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;

        // Read-check-write in one write transaction; LMDB serialises writers.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(existing) = self.records_db.get(&wtxn, &key[..]).map_err(LmdbError::from)? {
            let existing: ReferendumRecord =
                bincode::deserialize(existing).map_err(LmdbError::from)?;
            if existing.finalized {
                return Err(StoreError::Finalized {
                    network: record.network_id,
                    ref_id: record.ref_id,
                });
            }
        }
        self.records_db
            .put(&mut wtxn, &key[..], &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_records(&self, network: NetworkId) -> Result<Vec<ReferendumRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        self.scan(&rtxn, network, |_, val| {
            records.push(bincode::deserialize(val)?);
            Ok(())
        })?;
        Ok(records)
    }
}
