//! The state objects the chain maintains while applying blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use stx_protocol::operations::ChainProperties;
use stx_protocol::{
    AccountName, Asset, Authority, BlockId, ChainId, HardforkVersion, PublicKey, SPHTX_SYMBOL,
    TimePointSec, VESTS_SYMBOL,
};

/// An account and everything the chain tracks about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountObject {
    pub name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
    /// Liquid SPHTX.
    pub balance: Asset,
    /// Vesting shares backing witness participation.
    pub vesting_shares: Asset,
    /// VESTS paid out per withdrawal interval while a withdrawal runs.
    pub vesting_withdraw_rate: Asset,
    /// When the next payout fires; absent while no withdrawal runs.
    pub next_vesting_withdrawal: Option<TimePointSec>,
    pub withdrawn: Asset,
    pub to_withdraw: Asset,
    /// Witnesses this account currently approves.
    pub witness_votes: BTreeSet<AccountName>,
    pub created: TimePointSec,
}

impl AccountObject {
    /// A fresh account with the given authorities and empty balances.
    #[must_use]
    pub fn new(
        name: AccountName,
        owner: Authority,
        active: Authority,
        memo_key: PublicKey,
        created: TimePointSec,
    ) -> Self {
        Self {
            name,
            owner,
            active,
            memo_key,
            json_metadata: String::new(),
            balance: Asset::new(0, SPHTX_SYMBOL),
            vesting_shares: Asset::new(0, VESTS_SYMBOL),
            vesting_withdraw_rate: Asset::new(0, VESTS_SYMBOL),
            next_vesting_withdrawal: None,
            withdrawn: Asset::new(0, VESTS_SYMBOL),
            to_withdraw: Asset::new(0, VESTS_SYMBOL),
            witness_votes: BTreeSet::new(),
            created,
        }
    }
}

/// A registered block producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessObject {
    pub owner: AccountName,
    pub url: String,
    pub signing_key: PublicKey,
    pub props: ChainProperties,
    pub total_missed: u32,
    pub last_confirmed_block_num: u32,
    /// Stopped witnesses keep their record but leave the schedule.
    pub running: bool,
    /// Accumulated approval weight.
    pub votes: u64,
    pub created: TimePointSec,
}

/// Maintains global state information.
///
/// The values here are calculated during normal chain operations and reflect
/// the current values of global blockchain properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u32,
    pub head_block_id: BlockId,
    pub time: TimePointSec,
    pub current_witness: AccountName,

    pub current_supply: Asset,
    pub total_vesting_shares: Asset,

    /// Maximum block size is decided by the set of active witnesses which
    /// change every round. Each witness posts what they think it should be
    /// as part of their witness properties, and the median takes effect.
    pub maximum_block_size: u32,

    /// The current absolute slot number. Equal to the total number of slots
    /// since genesis. Also equal to the total number of missed slots plus
    /// `head_block_number`.
    pub current_aslot: u64,

    /// Used to compute witness participation.
    pub recent_slots_filled: u128,
    /// Divide by 128 to compute participation percentage.
    pub participation_count: u8,

    pub last_irreversible_block_num: u32,

    pub chain_id: ChainId,
    pub genesis_time: TimePointSec,
    pub private_net: bool,
}

/// The shuffled witness round currently producing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSchedule {
    pub current_shuffled_witnesses: Vec<AccountName>,
    pub num_scheduled_witnesses: u32,
    pub next_shuffle_block_num: u32,
}

/// Which hardforks this chain has passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardforkState {
    pub current_hardfork_version: HardforkVersion,
    pub last_hardfork: u32,
    /// Activation times, indexed by hardfork number minus one.
    pub processed_hardforks: Vec<TimePointSec>,
}
