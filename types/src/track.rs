//! OpenGov track names.

/// Human-readable name of a referenda track id.
///
/// Covers the track ids shared by the Polkadot and Kusama relay chains;
/// anything else renders as `track_<id>`.
pub fn track_name(id: u16) -> String {
    let name = match id {
        0 => "root",
        1 => "whitelisted_caller",
        2 => "wish_for_change",
        10 => "staking_admin",
        11 => "treasurer",
        12 => "lease_admin",
        13 => "fellowship_admin",
        14 => "general_admin",
        15 => "auction_admin",
        20 => "referendum_canceller",
        21 => "referendum_killer",
        30 => "small_tipper",
        31 => "big_tipper",
        32 => "small_spender",
        33 => "medium_spender",
        34 => "big_spender",
        other => return format!("track_{other}"),
    };
    name.to_string()
}
