//! Shared primitive IDs.

/// Store-assigned jump record identifier.
pub type JumpId = i64;
/// User-entered jump number.
pub type JumpNumber = i64;
/// Exit object identifier.
pub type ObjectId = i64;
/// Jump type identifier.
pub type JumpTypeId = i64;
/// Load generation counter; bumped once per successful load.
pub type Generation = u64;
