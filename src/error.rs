//! Error kinds surfaced by lookups and cursors.

/// Failures reported by [`CoalescedHashMap`](crate::CoalescedHashMap) and its
/// [`Cursor`](crate::Cursor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// A cursor was dereferenced at or past the end of the table.
    #[error("cursor does not point at a live entry")]
    OutOfRange,
    /// A checked lookup was made for a key that is not in the map.
    #[error("key not found")]
    KeyNotFound,
}
