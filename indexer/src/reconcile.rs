//! Upsert policy: what one fetched payload does to one local row.
//!
//! Pure functions; the worker pool feeds them and persists the result.

use govmirror_codec::DecodedReferendum;
use govmirror_types::{NetworkId, ReferendumRecord, ReferendumStatus, Timestamp};

/// What the chain returned for one id.
#[derive(Clone, Debug)]
pub enum Fetched {
    /// `state_getStorage` returned null.
    Absent,
    Decoded(DecodedReferendum),
}

/// The write (if any) a fetch leads to.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A row that did not exist, created from a payload.
    Created(ReferendumRecord),
    /// A row created as, or transitioned to, `Cleared`.
    Cleared(ReferendumRecord),
    Updated {
        record: ReferendumRecord,
        changed: Vec<&'static str>,
    },
    Unchanged,
    /// The local row is finalized; nothing may be written.
    Frozen,
}

impl Outcome {
    /// The row to persist, if any.
    pub fn record(&self) -> Option<&ReferendumRecord> {
        match self {
            Self::Created(r) | Self::Cleared(r) | Self::Updated { record: r, .. } => Some(r),
            Self::Unchanged | Self::Frozen => None,
        }
    }
}

/// Apply the upsert policy for one id.
pub fn reconcile(
    network: NetworkId,
    ss58_prefix: u16,
    ref_id: u32,
    existing: Option<&ReferendumRecord>,
    fetched: Fetched,
    now: Timestamp,
) -> Outcome {
    match (existing, fetched) {
        (Some(row), _) if row.finalized => Outcome::Frozen,

        (None, Fetched::Absent) => {
            Outcome::Cleared(ReferendumRecord::cleared(network, ref_id, now))
        }

        (Some(row), Fetched::Absent) => {
            let mut record = row.clone();
            record.status = ReferendumStatus::Cleared;
            record.finalized = true;
            record.in_queue = false;
            record.updated_at = now;
            Outcome::Cleared(record)
        }

        (None, Fetched::Decoded(decoded)) => {
            Outcome::Created(decoded.into_record(network, ss58_prefix, now))
        }

        (Some(row), Fetched::Decoded(decoded)) => {
            let mut record = row.clone();
            let changed = merge(&mut record, &decoded, ss58_prefix);
            if changed.is_empty() {
                Outcome::Unchanged
            } else {
                record.updated_at = now;
                Outcome::Updated { record, changed }
            }
        }
    }
}

fn set<T: PartialEq>(field: &mut T, value: T, name: &'static str, changed: &mut Vec<&'static str>) {
    if *field != value {
        *field = value;
        changed.push(name);
    }
}

/// Fold a payload into an unfinalized row and name every field that moved.
///
/// Classification and provenance fields are never erased: a payload that
/// no longer carries them (a concluded variant, a truncated body) leaves
/// the stored values in place. The tally follows the chain only while the
/// referendum is ongoing.
fn merge(
    record: &mut ReferendumRecord,
    decoded: &DecodedReferendum,
    ss58_prefix: u16,
) -> Vec<&'static str> {
    let mut changed = Vec::new();

    set(&mut record.status, decoded.status, "status", &mut changed);
    set(&mut record.finalized, decoded.status.is_terminal(), "finalized", &mut changed);

    if let Some(track) = decoded.track {
        set(&mut record.track, Some(track), "track", &mut changed);
    }
    if let Some(origin) = decoded.origin.clone() {
        set(&mut record.origin, Some(origin), "origin", &mut changed);
    }
    if let Some(enactment) = decoded.enactment {
        set(&mut record.enactment, Some(enactment), "enactment", &mut changed);
    }

    // A complete Ongoing decode carries the deciding phase exactly: a lapsed
    // confirmation puts its start back to zero.
    let deciding_exact = decoded.complete && decoded.status == ReferendumStatus::Ongoing;
    let blocks = [
        (&mut record.submitted_block, decoded.submitted_block, "submitted_block", false),
        (
            &mut record.decision_start_block,
            decoded.decision_start_block,
            "decision_start_block",
            deciding_exact,
        ),
        (&mut record.decision_end_block, decoded.decision_end_block, "decision_end_block", false),
        (
            &mut record.confirm_start_block,
            decoded.confirm_start_block,
            "confirm_start_block",
            deciding_exact,
        ),
        (&mut record.confirm_end_block, decoded.confirm_end_block, "confirm_end_block", false),
    ];
    for (field, value, name, exact) in blocks {
        if exact || value != 0 {
            set(field, value, name, &mut changed);
        }
    }

    if decoded.status == ReferendumStatus::Ongoing {
        if let Some(tally) = decoded.tally {
            set(&mut record.tally, Some(tally), "tally", &mut changed);
        }
        if decoded.complete {
            set(&mut record.in_queue, decoded.in_queue, "in_queue", &mut changed);
        }
    } else {
        set(&mut record.in_queue, false, "in_queue", &mut changed);
    }

    if let Some(deposit) = &decoded.submission_deposit {
        let rendered = deposit.render(ss58_prefix);
        set(&mut record.submitter, rendered.who.clone(), "submitter", &mut changed);
        set(&mut record.submission_deposit, Some(rendered), "submission_deposit", &mut changed);
    }
    if let Some(deposit) = &decoded.decision_deposit {
        set(
            &mut record.decision_deposit,
            Some(deposit.render(ss58_prefix)),
            "decision_deposit",
            &mut changed,
        );
    }

    changed
}
