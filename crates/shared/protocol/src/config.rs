//! Protocol-level constants shared by validation and the chain.

/// Seconds between block production slots.
pub const BLOCK_INTERVAL_SECS: u32 = 3;

/// Size of a witness scheduling round.
pub const MAX_WITNESSES: u32 = 51;

/// Upper bound on a transaction's serialized size.
pub const MAX_TRANSACTION_SIZE: usize = 64 * 1024;

/// Smallest value a witness may propose for the maximum block size.
pub const MIN_BLOCK_SIZE_LIMIT: u32 = 64 * 1024;

/// Default maximum block size before witnesses vote it elsewhere.
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 128 * 1024;

/// Longest a transaction may remain valid past its creation.
pub const MAX_EXPIRATION_SECS: u32 = 3600;

/// Upper bound on transfer memos.
pub const MAX_MEMO_LENGTH: usize = 2048;

/// Upper bound on custom operation payloads.
pub const MAX_CUSTOM_DATA_SIZE: usize = 8192;

/// Upper bound on witness URLs.
pub const MAX_WITNESS_URL_LENGTH: usize = 2048;

/// Number of weekly payouts a vesting withdrawal is split into.
pub const VESTING_WITHDRAW_INTERVALS: u32 = 13;

/// Seconds between two vesting withdrawal payouts.
pub const VESTING_WITHDRAW_INTERVAL_SECS: u32 = 7 * 24 * 3600;

/// Witness approvals a block needs before it is beyond pop/undo reach.
/// Two thirds of a full round, as on the main network.
pub const IRREVERSIBLE_THRESHOLD: u32 = MAX_WITNESSES * 2 / 3;
