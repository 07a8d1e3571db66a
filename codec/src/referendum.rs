//! `ReferendumInfo` layout and its defensive decoder.
//!
//! The first byte of a `ReferendumInfoFor` value is the variant tag:
//!
//! | tag | variant   | fields                                              |
//! |-----|-----------|-----------------------------------------------------|
//! | 0   | Ongoing   | [`OngoingStatus`]                                   |
//! | 1   | Approved  | `since: u32, Option<Deposit>, Option<Deposit>`      |
//! | 2   | Rejected  | same as Approved                                    |
//! | 3   | Cancelled | same as Approved                                    |
//! | 4   | TimedOut  | same as Approved                                    |
//! | 5   | Killed    | `since: u32`                                        |
//!
//! [`ReferendumInfo`] is the strict, fully typed form (also used to build
//! payloads in tests). [`decode_referendum_info`] walks the same layout one
//! field at a time and keeps whatever it could read: the tag must decode,
//! every later field falls back to its zero value once the payload stops
//! matching.

use parity_scale_codec::{Decode, Encode, Input, Output};

use govmirror_types::{
    AccountId32, Deposit, Enactment, NetworkId, Origin, ReferendumRecord, ReferendumStatus,
    SystemOrigin, Tally, Timestamp, UNKNOWN_SUBMITTER,
};

use crate::ss58::ss58_encode;
use crate::DecodeError;

const TAG_ONGOING: u8 = 0;
const TAG_APPROVED: u8 = 1;
const TAG_REJECTED: u8 = 2;
const TAG_CANCELLED: u8 = 3;
const TAG_TIMED_OUT: u8 = 4;
const TAG_KILLED: u8 = 5;

/// Caller index of `frame_system` in the `OriginCaller` enum.
const SYSTEM_CALLER: u8 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RawDeposit {
    pub who: [u8; 32],
    pub amount: u128,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct RawTally {
    pub ayes: u128,
    pub nays: u128,
    pub support: u128,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DecidingStatus {
    pub since: u32,
    pub confirming: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum DispatchTime {
    #[codec(index = 0)]
    At(u32),
    #[codec(index = 1)]
    After(u32),
}

/// `Bounded<Call>`: how the proposal preimage is referenced.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ProposalBounded {
    #[codec(index = 0)]
    Legacy { hash: [u8; 32] },
    #[codec(index = 1)]
    Inline(Vec<u8>),
    #[codec(index = 2)]
    Lookup { hash: [u8; 32], len: u32 },
}

/// `OriginCaller` restricted to the shapes referenda are submitted under.
///
/// Only the system caller's variants are known. Any other caller is read as
/// a fieldless enum, one variant byte after the caller index, which is how
/// the `Origins` pallet and collective-style callers encode. A caller whose
/// variant carries data would misalign every later field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawOrigin {
    Root,
    Signed([u8; 32]),
    None,
    Custom { caller: u8, variant: u8 },
}

impl Encode for RawOrigin {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        match self {
            Self::Root => {
                dest.push_byte(SYSTEM_CALLER);
                dest.push_byte(0);
            }
            Self::Signed(who) => {
                dest.push_byte(SYSTEM_CALLER);
                dest.push_byte(1);
                dest.write(who);
            }
            Self::None => {
                dest.push_byte(SYSTEM_CALLER);
                dest.push_byte(2);
            }
            Self::Custom { caller, variant } => {
                dest.push_byte(*caller);
                dest.push_byte(*variant);
            }
        }
    }
}

impl Decode for RawOrigin {
    fn decode<I: Input>(input: &mut I) -> Result<Self, parity_scale_codec::Error> {
        let caller = input.read_byte()?;
        let variant = input.read_byte()?;
        if caller != SYSTEM_CALLER {
            return Ok(Self::Custom { caller, variant });
        }
        match variant {
            0 => Ok(Self::Root),
            1 => Ok(Self::Signed(<[u8; 32]>::decode(input)?)),
            2 => Ok(Self::None),
            _ => Err("unknown system origin variant".into()),
        }
    }
}

impl From<RawOrigin> for Origin {
    fn from(raw: RawOrigin) -> Self {
        match raw {
            RawOrigin::Root => Origin::System(SystemOrigin::Root),
            RawOrigin::Signed(who) => Origin::System(SystemOrigin::Signed(AccountId32::new(who))),
            RawOrigin::None => Origin::System(SystemOrigin::None),
            RawOrigin::Custom { caller, variant } => Origin::Custom { caller, variant },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct OngoingStatus {
    pub track: u16,
    pub origin: RawOrigin,
    pub proposal: ProposalBounded,
    pub enactment: DispatchTime,
    pub submitted: u32,
    pub submission_deposit: RawDeposit,
    pub decision_deposit: Option<RawDeposit>,
    pub deciding: Option<DecidingStatus>,
    pub tally: RawTally,
    pub in_queue: bool,
    pub alarm: Option<(u32, (u32, u32))>,
}

/// Strict form of a `ReferendumInfoFor` value.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum ReferendumInfo {
    #[codec(index = 0)]
    Ongoing(OngoingStatus),
    #[codec(index = 1)]
    Approved(u32, Option<RawDeposit>, Option<RawDeposit>),
    #[codec(index = 2)]
    Rejected(u32, Option<RawDeposit>, Option<RawDeposit>),
    #[codec(index = 3)]
    Cancelled(u32, Option<RawDeposit>, Option<RawDeposit>),
    #[codec(index = 4)]
    TimedOut(u32, Option<RawDeposit>, Option<RawDeposit>),
    #[codec(index = 5)]
    Killed(u32),
}

/// A deposit with its account still in raw form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedDeposit {
    pub who: AccountId32,
    pub amount: u128,
}

impl From<RawDeposit> for DecodedDeposit {
    fn from(raw: RawDeposit) -> Self {
        Self {
            who: AccountId32::new(raw.who),
            amount: raw.amount,
        }
    }
}

impl DecodedDeposit {
    /// Render the account as SS58 with the network's prefix.
    pub fn render(&self, ss58_prefix: u16) -> Deposit {
        Deposit {
            who: ss58_encode(ss58_prefix, &self.who),
            amount: self.amount,
        }
    }
}

/// Everything the decoder managed to extract from one payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedReferendum {
    pub ref_id: u32,
    pub status: ReferendumStatus,
    pub track: Option<u16>,
    pub origin: Option<Origin>,
    pub enactment: Option<Enactment>,
    pub submitted_block: u32,
    pub decision_start_block: u32,
    pub decision_end_block: u32,
    pub confirm_start_block: u32,
    pub confirm_end_block: u32,
    pub tally: Option<Tally>,
    pub in_queue: bool,
    pub submission_deposit: Option<DecodedDeposit>,
    pub decision_deposit: Option<DecodedDeposit>,
    /// False when the payload ended or stopped matching before the last field.
    pub complete: bool,
}

impl DecodedReferendum {
    fn new(ref_id: u32, status: ReferendumStatus) -> Self {
        Self {
            ref_id,
            status,
            track: None,
            origin: None,
            enactment: None,
            submitted_block: 0,
            decision_start_block: 0,
            decision_end_block: 0,
            confirm_start_block: 0,
            confirm_end_block: 0,
            tally: None,
            in_queue: false,
            submission_deposit: None,
            decision_deposit: None,
            complete: false,
        }
    }

    pub fn finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Build a fresh store row from this payload.
    pub fn into_record(
        self,
        network_id: NetworkId,
        ss58_prefix: u16,
        now: Timestamp,
    ) -> ReferendumRecord {
        let submission_deposit = self.submission_deposit.map(|d| d.render(ss58_prefix));
        let decision_deposit = self.decision_deposit.map(|d| d.render(ss58_prefix));
        let submitter = submission_deposit
            .as_ref()
            .map(|d| d.who.clone())
            .unwrap_or_else(|| UNKNOWN_SUBMITTER.to_string());
        ReferendumRecord {
            network_id,
            ref_id: self.ref_id,
            finalized: self.status.is_terminal(),
            status: self.status,
            track: self.track,
            origin: self.origin,
            enactment: self.enactment,
            submitted_block: self.submitted_block,
            decision_start_block: self.decision_start_block,
            decision_end_block: self.decision_end_block,
            confirm_start_block: self.confirm_start_block,
            confirm_end_block: self.confirm_end_block,
            tally: self.tally,
            in_queue: self.in_queue,
            submitter,
            submission_deposit,
            decision_deposit,
            updated_at: now,
        }
    }
}

fn next<T: Decode>(input: &mut &[u8]) -> Option<T> {
    T::decode(input).ok()
}

fn status_for_tag(tag: u8) -> Option<ReferendumStatus> {
    match tag {
        TAG_ONGOING => Some(ReferendumStatus::Ongoing),
        TAG_APPROVED => Some(ReferendumStatus::Approved),
        TAG_REJECTED => Some(ReferendumStatus::Rejected),
        TAG_CANCELLED => Some(ReferendumStatus::Cancelled),
        TAG_TIMED_OUT => Some(ReferendumStatus::TimedOut),
        TAG_KILLED => Some(ReferendumStatus::Killed),
        _ => None,
    }
}

fn decode_ongoing(input: &mut &[u8], out: &mut DecodedReferendum) {
    let Some(track) = next::<u16>(input) else { return };
    out.track = Some(track);
    let Some(origin) = next::<RawOrigin>(input) else { return };
    out.origin = Some(origin.into());
    if next::<ProposalBounded>(input).is_none() {
        return;
    }
    let Some(enactment) = next::<DispatchTime>(input) else { return };
    out.enactment = Some(match enactment {
        DispatchTime::At(b) => Enactment::At(b),
        DispatchTime::After(b) => Enactment::After(b),
    });
    let Some(submitted) = next::<u32>(input) else { return };
    out.submitted_block = submitted;
    let Some(deposit) = next::<RawDeposit>(input) else { return };
    out.submission_deposit = Some(deposit.into());
    let Some(decision) = next::<Option<RawDeposit>>(input) else { return };
    out.decision_deposit = decision.map(Into::into);
    let Some(deciding) = next::<Option<DecidingStatus>>(input) else { return };
    if let Some(deciding) = deciding {
        out.decision_start_block = deciding.since;
        out.confirm_start_block = deciding.confirming.unwrap_or_default();
    }
    let Some(tally) = next::<RawTally>(input) else { return };
    out.tally = Some(Tally {
        ayes: tally.ayes,
        nays: tally.nays,
        support: tally.support,
    });
    let Some(in_queue) = next::<bool>(input) else { return };
    out.in_queue = in_queue;
    if next::<Option<(u32, (u32, u32))>>(input).is_none() {
        return;
    }
    out.complete = true;
}

fn decode_concluded(input: &mut &[u8], out: &mut DecodedReferendum) {
    let Some(since) = next::<u32>(input) else { return };
    out.decision_end_block = since;
    if out.status == ReferendumStatus::Approved {
        out.confirm_end_block = since;
    }
    let Some(submission) = next::<Option<RawDeposit>>(input) else { return };
    out.submission_deposit = submission.map(Into::into);
    let Some(decision) = next::<Option<RawDeposit>>(input) else { return };
    out.decision_deposit = decision.map(Into::into);
    out.complete = true;
}

/// Decode a `ReferendumInfoFor` value fetched for `ref_id`.
///
/// Fails only when the payload is empty or carries an unknown variant tag.
/// A tag that decodes but a body that does not yields a partial result with
/// `complete == false`.
pub fn decode_referendum_info(ref_id: u32, raw: &[u8]) -> Result<DecodedReferendum, DecodeError> {
    let (&tag, body) = raw.split_first().ok_or(DecodeError::Empty)?;
    let status = status_for_tag(tag).ok_or(DecodeError::UnknownVariant(tag))?;
    let mut out = DecodedReferendum::new(ref_id, status);
    let mut input = body;
    match tag {
        TAG_ONGOING => decode_ongoing(&mut input, &mut out),
        TAG_KILLED => {
            if let Some(since) = next::<u32>(&mut input) {
                out.decision_end_block = since;
                out.complete = true;
            }
        }
        _ => decode_concluded(&mut input, &mut out),
    }
    Ok(out)
}

/// Decode the `ReferendumCount` storage value: a little-endian `u32`.
pub fn decode_referendum_count(raw: &[u8]) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| DecodeError::InvalidLength { expected: 4, got: raw.len() })?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(seed: u8, amount: u128) -> RawDeposit {
        RawDeposit { who: [seed; 32], amount }
    }

    fn ongoing() -> OngoingStatus {
        OngoingStatus {
            track: 33,
            origin: RawOrigin::Custom { caller: 22, variant: 11 },
            proposal: ProposalBounded::Lookup { hash: [9; 32], len: 120 },
            enactment: DispatchTime::After(14_400),
            submitted: 1_000,
            submission_deposit: deposit(1, 10_000_000_000),
            decision_deposit: Some(deposit(2, 2_000_000_000_000)),
            deciding: Some(DecidingStatus { since: 1_200, confirming: Some(1_500) }),
            tally: RawTally { ayes: 100, nays: 40, support: 70 },
            in_queue: false,
            alarm: Some((2_000, (2_000, 0))),
        }
    }

    #[test]
    fn ongoing_payload_decodes_every_field() {
        let raw = ReferendumInfo::Ongoing(ongoing()).encode();
        let d = decode_referendum_info(8, &raw).unwrap();
        assert_eq!(d.ref_id, 8);
        assert_eq!(d.status, ReferendumStatus::Ongoing);
        assert!(!d.finalized());
        assert!(d.complete);
        assert_eq!(d.track, Some(33));
        assert_eq!(d.origin, Some(Origin::Custom { caller: 22, variant: 11 }));
        assert_eq!(d.enactment, Some(Enactment::After(14_400)));
        assert_eq!(d.submitted_block, 1_000);
        assert_eq!(d.decision_start_block, 1_200);
        assert_eq!(d.confirm_start_block, 1_500);
        assert_eq!(d.tally, Some(Tally { ayes: 100, nays: 40, support: 70 }));
        assert_eq!(d.submission_deposit.as_ref().unwrap().who, AccountId32::new([1; 32]));
        assert_eq!(d.decision_deposit.as_ref().unwrap().amount, 2_000_000_000_000);
    }

    #[test]
    fn inline_proposal_and_signed_origin() {
        let mut status = ongoing();
        status.origin = RawOrigin::Signed([7; 32]);
        status.proposal = ProposalBounded::Inline(vec![0, 1, 2, 3, 4]);
        status.deciding = None;
        status.decision_deposit = None;
        let raw = ReferendumInfo::Ongoing(status).encode();
        let d = decode_referendum_info(1, &raw).unwrap();
        assert!(d.complete);
        assert_eq!(
            d.origin,
            Some(Origin::System(SystemOrigin::Signed(AccountId32::new([7; 32]))))
        );
        assert_eq!(d.decision_start_block, 0);
        assert!(d.decision_deposit.is_none());
        assert_eq!(d.tally.unwrap().ayes, 100);
    }

    #[test]
    fn terminal_variants_map_to_statuses() {
        let cases = [
            (ReferendumInfo::Approved(500, Some(deposit(1, 5)), None), ReferendumStatus::Approved),
            (ReferendumInfo::Rejected(501, None, None), ReferendumStatus::Rejected),
            (ReferendumInfo::Cancelled(502, None, None), ReferendumStatus::Cancelled),
            (ReferendumInfo::TimedOut(503, None, None), ReferendumStatus::TimedOut),
            (ReferendumInfo::Killed(504), ReferendumStatus::Killed),
        ];
        for (info, expected) in cases {
            let d = decode_referendum_info(3, &info.encode()).unwrap();
            assert_eq!(d.status, expected);
            assert!(d.finalized());
            assert!(d.complete);
            assert!(d.decision_end_block >= 500);
            assert!(d.tally.is_none());
        }
    }

    #[test]
    fn approved_sets_confirm_end() {
        let approved = ReferendumInfo::Approved(777, None, None).encode();
        let d = decode_referendum_info(3, &approved).unwrap();
        assert_eq!(d.decision_end_block, 777);
        assert_eq!(d.confirm_end_block, 777);
        let rejected = ReferendumInfo::Rejected(777, None, None).encode();
        let d = decode_referendum_info(3, &rejected).unwrap();
        assert_eq!(d.confirm_end_block, 0);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = decode_referendum_info(1, &[6, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownVariant(6)));
        let err = decode_referendum_info(1, &[0xff]).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownVariant(0xff)));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(decode_referendum_info(1, &[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn truncated_ongoing_keeps_leading_fields() {
        let raw = ReferendumInfo::Ongoing(ongoing()).encode();
        // tag + track + origin + proposal(1 + 32 + 4) + enactment(1 + 4) + submitted(4)
        let cut = 1 + 2 + 2 + 37 + 5 + 4;
        let d = decode_referendum_info(8, &raw[..cut + 10]).unwrap();
        assert_eq!(d.status, ReferendumStatus::Ongoing);
        assert!(!d.complete);
        assert_eq!(d.track, Some(33));
        assert_eq!(d.submitted_block, 1_000);
        assert!(d.submission_deposit.is_none());
        assert!(d.tally.is_none());
    }

    #[test]
    fn bare_tag_decodes_to_status_only() {
        let d = decode_referendum_info(4, &[TAG_REJECTED]).unwrap();
        assert_eq!(d.status, ReferendumStatus::Rejected);
        assert!(!d.complete);
        assert_eq!(d.decision_end_block, 0);
    }

    #[test]
    fn record_renders_submitter_as_ss58() {
        let raw = ReferendumInfo::Ongoing(ongoing()).encode();
        let rec = decode_referendum_info(8, &raw)
            .unwrap()
            .into_record(NetworkId::new(0), 0, Timestamp::new(9));
        assert_eq!(rec.submitter, ss58_encode(0, &AccountId32::new([1; 32])));
        assert_eq!(rec.submission_deposit.unwrap().who, rec.submitter);
        assert!(!rec.finalized);
        assert_eq!(rec.updated_at, Timestamp::new(9));
    }

    #[test]
    fn record_without_deposit_has_unknown_submitter() {
        let rec = decode_referendum_info(2, &ReferendumInfo::Killed(10).encode())
            .unwrap()
            .into_record(NetworkId::new(1), 2, Timestamp::new(1));
        assert_eq!(rec.submitter, UNKNOWN_SUBMITTER);
        assert!(rec.finalized);
        assert_eq!(rec.status, ReferendumStatus::Killed);
    }

    #[test]
    fn custom_origin_consumes_caller_and_variant_only() {
        let origin = RawOrigin::Custom { caller: 22, variant: 11 };
        let mut raw = origin.encode();
        assert_eq!(raw, vec![22, 11]);
        raw.extend_from_slice(&1_234u32.to_le_bytes());

        let mut input = &raw[..];
        assert_eq!(RawOrigin::decode(&mut input).unwrap(), origin);
        assert_eq!(u32::decode(&mut input).unwrap(), 1_234);
        assert!(input.is_empty());
    }

    #[test]
    fn unknown_system_origin_variant_is_rejected() {
        let mut input = &[SYSTEM_CALLER, 9][..];
        assert!(RawOrigin::decode(&mut input).is_err());
    }

    #[test]
    fn referendum_count() {
        assert_eq!(decode_referendum_count(&1_234u32.to_le_bytes()).unwrap(), 1_234);
        assert!(matches!(
            decode_referendum_count(&[1, 2, 3]),
            Err(DecodeError::InvalidLength { expected: 4, got: 3 })
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
                match decode_referendum_info(1, &raw) {
                    Ok(decoded) => prop_assert!(raw[0] <= TAG_KILLED && decoded.ref_id == 1),
                    Err(_) => prop_assert!(raw.is_empty() || raw[0] > TAG_KILLED),
                }
            }

            #[test]
            fn truncation_only_loses_trailing_fields(ayes in any::<u128>(), cut in 1usize..200) {
                let full = ReferendumInfo::Ongoing(OngoingStatus {
                    track: 11,
                    origin: RawOrigin::Root,
                    proposal: ProposalBounded::Legacy { hash: [5; 32] },
                    enactment: DispatchTime::At(99),
                    submitted: 1_000,
                    submission_deposit: deposit(1, 10),
                    decision_deposit: Some(deposit(2, 20)),
                    deciding: Some(DecidingStatus { since: 1_100, confirming: Some(1_200) }),
                    tally: RawTally { ayes, nays: 1, support: 2 },
                    in_queue: true,
                    alarm: None,
                })
                .encode();
                let cut = cut.min(full.len());
                let partial = decode_referendum_info(4, &full[..cut]).unwrap();
                let whole = decode_referendum_info(4, &full).unwrap();
                prop_assert!(whole.complete);
                prop_assert_eq!(partial.complete, cut == full.len());
                if partial.track.is_some() {
                    prop_assert_eq!(partial.track, whole.track);
                }
                if partial.tally.is_some() {
                    prop_assert_eq!(partial.submitted_block, whole.submitted_block);
                    prop_assert_eq!(partial.tally, whole.tally);
                }
            }
        }
    }
}
