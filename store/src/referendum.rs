//! Referendum record storage trait.

use govmirror_types::{NetworkId, ReferendumRecord};

use crate::StoreError;

/// One row per `(network, ref_id)`.
///
/// Implementations must be safe to call concurrently for different ids.
pub trait ReferendumStore: Send + Sync {
    /// Highest stored id for the network, `None` when it has no rows.
    fn max_ref_id(&self, network: NetworkId) -> Result<Option<u32>, StoreError>;

    /// Ids of every row with `finalized == false`, ascending.
    fn unfinalized_ref_ids(&self, network: NetworkId) -> Result<Vec<u32>, StoreError>;

    fn get_record(
        &self,
        network: NetworkId,
        ref_id: u32,
    ) -> Result<Option<ReferendumRecord>, StoreError>;

    fn exists_record(&self, network: NetworkId, ref_id: u32) -> Result<bool, StoreError>;

    /// Insert or replace the row for `(record.network_id, record.ref_id)`.
    ///
    /// Fails with [`StoreError::Finalized`] when the stored row is already
    /// finalized.
    fn upsert_record(&self, record: &ReferendumRecord) -> Result<(), StoreError>;

    /// Every row of the network, ordered by id.
    fn list_records(&self, network: NetworkId) -> Result<Vec<ReferendumRecord>, StoreError>;
}
