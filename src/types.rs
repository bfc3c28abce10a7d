//! Shared primitive IDs and units.

/// Team identifier.
pub type TeamId = u64;
/// User identifier. Users live outside the ledger; only the id is recorded.
pub type UserId = u64;
/// Challenge identifier.
pub type ChallengeId = u64;
/// Hint identifier.
pub type HintId = u64;
/// Award identifier.
pub type AwardId = u64;
/// Solve identifier.
pub type SolveId = u64;
/// Bracket identifier.
pub type BracketId = u64;
/// Timestamp in milliseconds since epoch.
pub type Timestamp = u64;
/// Signed point quantity. Awards may be negative.
pub type Points = i64;
