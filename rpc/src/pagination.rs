//! Page sizing for `state_getKeysPaged`.

/// Default number of keys requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Substrate nodes reject pages larger than this.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Resolve an effective page size, clamped to [1, MAX_PAGE_SIZE].
pub fn effective_page_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_PAGE_SIZE)
}
