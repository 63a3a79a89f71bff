//! Validation steps the caller may waive.
//!
//! Debug generation and log replay both run the same application path as
//! live blocks; these flags are how they shed the checks that cannot hold
//! there (a debug key signing for an arbitrary witness, for example).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SkipFlags: u32 {
        /// Skip verifying the producing witness's signature and key.
        const WITNESS_SIGNATURE = 1 << 0;
        /// Skip verifying transaction signatures (authority still applies
        /// unless also skipped).
        const TRANSACTION_SIGNATURES = 1 << 1;
        /// Skip the account authority check entirely.
        const AUTHORITY_CHECK = 1 << 2;
        /// Skip the reference-block anchor check.
        const TAPOS_CHECK = 1 << 3;
        /// Skip the expiration window check.
        const EXPIRATION_CHECK = 1 << 4;
        /// Skip structural validation of transactions and operations.
        const VALIDATION = 1 << 5;
        /// Skip checking that the block's witness owns the slot.
        const WITNESS_SCHEDULE_CHECK = 1 << 6;
        /// Skip recomputing the transaction merkle root.
        const MERKLE_CHECK = 1 << 7;
        /// Skip the duplicate-transaction check.
        const DUPLICATE_CHECK = 1 << 8;
        /// Skip the maximum-block-size check.
        const BLOCK_SIZE_CHECK = 1 << 9;
    }
}

impl SkipFlags {
    /// What log replay skips: the log already passed every check once.
    #[must_use]
    pub fn replay() -> Self {
        Self::WITNESS_SIGNATURE
            | Self::TRANSACTION_SIGNATURES
            | Self::AUTHORITY_CHECK
            | Self::TAPOS_CHECK
            | Self::EXPIRATION_CHECK
            | Self::VALIDATION
    }

    /// What debug generation skips: the debug key signs for whatever witness
    /// the schedule names.
    #[must_use]
    pub fn debug_generation() -> Self {
        Self::WITNESS_SIGNATURE
    }
}
