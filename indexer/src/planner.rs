//! Work-set planning for one reconciliation cycle.
//!
//! The plan is derived from scratch every cycle from three snapshots: the
//! local high-water mark and unfinalized ids, the ids the chain enumerates,
//! and the chain's `ReferendumCount`.

use std::collections::{BTreeMap, BTreeSet};

use govmirror_store::StoreError;

/// Upper bound on the out-of-range span planned in one cycle.
///
/// A corrupt counter must not make a cycle plan billions of ids; the rest
/// of the span is picked up by later cycles as the high-water mark moves.
pub const MAX_SPAN: u32 = 1 << 16;

/// Why an id is in the work set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkReason {
    /// On chain, above the local high-water mark.
    New,
    /// On chain, below the high-water mark, never stored locally.
    Gap,
    /// Stored locally, not finalized, still on chain.
    Recheck,
    /// Stored locally, not finalized, no longer on chain.
    Missing,
    /// Above the high-water mark but absent from the enumeration.
    OutOfRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub ref_id: u32,
    pub reason: WorkReason,
}

/// Snapshots a plan is computed from.
#[derive(Clone, Debug, Default)]
pub struct PlanInput<'a> {
    /// `max(ref_id)` of the local store, `None` when empty.
    pub high_water_mark: Option<u32>,
    pub unfinalized: &'a [u32],
    /// Ids recovered from the enumerated storage keys.
    pub on_chain: &'a [u32],
    /// `Referenda.ReferendumCount`, when the chain returned one.
    pub referendum_count: Option<u32>,
}

/// Deduplicated, id-ordered work set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkPlan {
    items: BTreeMap<u32, WorkReason>,
    truncated: bool,
}

impl WorkPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn reason(&self, ref_id: u32) -> Option<WorkReason> {
        self.items.get(&ref_id).copied()
    }

    pub fn count(&self, reason: WorkReason) -> usize {
        self.items.values().filter(|r| **r == reason).count()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.keys().copied()
    }

    /// Whether the out-of-range span was cut at [`MAX_SPAN`].
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
            .into_iter()
            .map(|(ref_id, reason)| WorkItem { ref_id, reason })
            .collect()
    }
}

/// Compute the work set.
///
/// `exists` answers whether the store holds a row for an id; it is only
/// consulted for on-chain ids at or below the high-water mark that are not
/// already known to be unfinalized.
pub fn plan_work<F>(input: &PlanInput<'_>, mut exists: F) -> Result<WorkPlan, StoreError>
where
    F: FnMut(u32) -> Result<bool, StoreError>,
{
    let on_chain: BTreeSet<u32> = input.on_chain.iter().copied().collect();
    let unfinalized: BTreeSet<u32> = input.unfinalized.iter().copied().collect();
    let mut plan = WorkPlan::default();

    for &id in &on_chain {
        let reason = match input.high_water_mark {
            Some(hwm) if id <= hwm => {
                if unfinalized.contains(&id) {
                    WorkReason::Recheck
                } else if id != hwm && !exists(id)? {
                    WorkReason::Gap
                } else {
                    // Finalized locally.
                    continue;
                }
            }
            _ => WorkReason::New,
        };
        plan.items.insert(id, reason);
    }

    for &id in unfinalized.difference(&on_chain) {
        plan.items.insert(id, WorkReason::Missing);
    }

    let lower = match input.high_water_mark {
        Some(hwm) => hwm.checked_add(1),
        None => Some(0),
    };
    let upper = on_chain
        .last()
        .copied()
        .max(input.referendum_count.and_then(|c| c.checked_sub(1)));
    if let (Some(lower), Some(mut upper)) = (lower, upper) {
        if upper >= lower {
            if upper - lower >= MAX_SPAN {
                upper = lower + (MAX_SPAN - 1);
                plan.truncated = true;
            }
            for id in lower..=upper {
                plan.items.entry(id).or_insert(WorkReason::OutOfRange);
            }
        }
    }

    Ok(plan)
}
