//! Per-call behaviour flags.

use bitflags::bitflags;

bitflags! {
    /// Flags accepted by read and update operations.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Bypass the cache: reads miss, updates skip the copy for the caller.
        const IGNORE_CACHE = 1 << 0;
        /// Treat zero values in a payload (empty strings, 0, false, null) as
        /// absent fields.
        const IGNORE_EMPTY_PARAMS = 1 << 1;
    }
}
