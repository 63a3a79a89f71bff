//! The in-memory chain state and its slot/schedule machinery.

use crate::error::ChainError;
use crate::objects::{
    AccountObject, DynamicGlobalProperties, HardforkState, WitnessObject, WitnessSchedule,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stx_protocol::types::sha256_pair;
use stx_protocol::{AccountName, BlockId, HardforkVersion, TimePointSec, TransactionId};

/// How many block ids stay resolvable for TaPoS anchoring. The 16-bit
/// reference number wraps at this horizon.
const TAPOS_WINDOW: u32 = 0x1_0000;

/// Hardforks this build knows about, in activation order.
pub const HARDFORKS: &[HardforkVersion] =
    &[HardforkVersion::new(1, 1), HardforkVersion::new(1, 2)];

/// The number of the last hardfork this build understands.
#[must_use]
pub fn max_hardfork() -> u32 {
    HARDFORKS.len() as u32
}

/// The complete materialized state of the chain at some head block.
///
/// Cloning a `State` is the undo checkpoint mechanism: debug nets are small,
/// so whole-state checkpoints replace fine-grained per-object undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub accounts: BTreeMap<AccountName, AccountObject>,
    pub witnesses: BTreeMap<AccountName, WitnessObject>,
    pub dgp: DynamicGlobalProperties,
    pub schedule: WitnessSchedule,
    pub hardforks: HardforkState,
    /// Seconds between production slots, fixed at genesis.
    pub block_interval: u32,
    /// Scheduling round size, fixed at genesis.
    pub max_witnesses: u32,
    /// Block ids inside the TaPoS window, keyed by block number.
    pub recent_block_ids: BTreeMap<u32, BlockId>,
    /// Where each applied transaction landed.
    pub transaction_index: BTreeMap<TransactionId, (u32, u32)>,
}

impl State {
    #[must_use]
    pub fn head_block_num(&self) -> u32 {
        self.dgp.head_block_number
    }

    #[must_use]
    pub fn head_block_id(&self) -> BlockId {
        self.dgp.head_block_id
    }

    #[must_use]
    pub fn head_block_time(&self) -> TimePointSec {
        self.dgp.time
    }

    /// Looks up an account or fails with [`ChainError::UnknownAccount`].
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnknownAccount`] when absent.
    pub fn get_account(&self, name: &AccountName) -> Result<&AccountObject, ChainError> {
        self.accounts.get(name).ok_or_else(|| ChainError::UnknownAccount {
            message: name.to_string().into(),
            context: None,
        })
    }

    /// Mutable account lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnknownAccount`] when absent.
    pub fn get_account_mut(
        &mut self,
        name: &AccountName,
    ) -> Result<&mut AccountObject, ChainError> {
        self.accounts.get_mut(name).ok_or_else(|| ChainError::UnknownAccount {
            message: name.to_string().into(),
            context: None,
        })
    }

    /// Looks up a witness or fails with [`ChainError::UnknownWitness`].
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnknownWitness`] when absent.
    pub fn get_witness(&self, name: &AccountName) -> Result<&WitnessObject, ChainError> {
        self.witnesses.get(name).ok_or_else(|| ChainError::UnknownWitness {
            message: name.to_string().into(),
            context: None,
        })
    }

    // --- Slot machinery ---

    /// The wall-clock time of the given future slot. Slot 0 is the head
    /// block's own time.
    #[must_use]
    pub fn get_slot_time(&self, slot: u32) -> TimePointSec {
        if self.dgp.head_block_number == 0 {
            // Before the first block, slot 1 lands one interval past genesis.
            return self.dgp.genesis_time.saturating_add_secs(slot * self.block_interval);
        }
        self.dgp.time.saturating_add_secs(slot * self.block_interval)
    }

    /// The slot a timestamp falls into, zero when it precedes slot 1.
    #[must_use]
    pub fn get_slot_at_time(&self, when: TimePointSec) -> u32 {
        let first_slot_time = self.get_slot_time(1);
        if when < first_slot_time {
            return 0;
        }
        when.secs_since(first_slot_time) / self.block_interval + 1
    }

    /// The witness scheduled to produce at the given future slot.
    #[must_use]
    pub fn get_scheduled_witness(&self, slot: u32) -> AccountName {
        let index = (self.dgp.current_aslot + u64::from(slot))
            % self.schedule.current_shuffled_witnesses.len() as u64;
        self.schedule.current_shuffled_witnesses[index as usize].clone()
    }

    /// Percentage of the last 128 slots that carried a block.
    #[must_use]
    pub fn witness_participation_rate(&self) -> u32 {
        self.dgp.recent_slots_filled.count_ones() * 100 / 128
    }

    /// Reshuffles the production round from the currently running witnesses.
    ///
    /// The shuffle is deterministic: seeded by the head block id and number,
    /// so a replayed debug chain always schedules identically.
    pub fn update_witness_schedule(&mut self) {
        let mut active: Vec<&WitnessObject> =
            self.witnesses.values().filter(|w| w.running).collect();
        // Strongest approval first; names break ties for determinism.
        active.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.owner.cmp(&b.owner)));

        let mut shuffled: Vec<AccountName> = active
            .into_iter()
            .take(self.max_witnesses as usize)
            .map(|w| w.owner.clone())
            .collect();

        if shuffled.is_empty() {
            // A chain with no running witnesses keeps its last round rather
            // than deadlocking the schedule.
            return;
        }

        let seed = sha256_pair(
            self.dgp.head_block_id.as_bytes(),
            &u64::from(self.dgp.head_block_number).to_le_bytes(),
        );
        let len = shuffled.len();
        for i in 0..len {
            let entropy = u64::from_le_bytes([
                seed[(i * 8) % 32],
                seed[(i * 8 + 1) % 32],
                seed[(i * 8 + 2) % 32],
                seed[(i * 8 + 3) % 32],
                seed[(i * 8 + 4) % 32],
                seed[(i * 8 + 5) % 32],
                seed[(i * 8 + 6) % 32],
                seed[(i * 8 + 7) % 32],
            ]);
            let j = i + (entropy as usize) % (len - i);
            shuffled.swap(i, j);
        }

        self.schedule.current_shuffled_witnesses = shuffled;
        self.schedule.num_scheduled_witnesses =
            self.schedule.current_shuffled_witnesses.len() as u32;
        self.schedule.next_shuffle_block_num = self.dgp.head_block_number + self.max_witnesses;
    }

    // --- TaPoS ---

    /// Records a block id for TaPoS resolution and trims the window.
    pub fn record_block_id(&mut self, block_num: u32, id: BlockId) {
        self.recent_block_ids.insert(block_num, id);
        let horizon = block_num.saturating_sub(TAPOS_WINDOW);
        self.recent_block_ids.retain(|&num, _| num >= horizon);
    }

    /// Resolves the block id a `(ref_block_num, ref_block_prefix)` pair must
    /// match. A transaction anchored at `(0, 0)` references the pre-genesis
    /// zero id, which is always valid.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::TaposMismatch`] when no block in the window
    /// carries the referenced number.
    pub fn check_tapos(&self, ref_block_num: u16, ref_block_prefix: u32) -> Result<(), ChainError> {
        let candidate = self
            .recent_block_ids
            .iter()
            .rev()
            .find(|(num, _)| (**num & 0xFFFF) as u16 == ref_block_num)
            .map(|(_, id)| *id);

        let expected_prefix = match candidate {
            Some(id) => id.tapos_prefix(),
            None if ref_block_num == 0 => BlockId::default().tapos_prefix(),
            None => {
                return Err(ChainError::TaposMismatch {
                    message: format!("No block with reference number {ref_block_num} in window")
                        .into(),
                    context: None,
                });
            },
        };

        if expected_prefix != ref_block_prefix {
            return Err(ChainError::TaposMismatch {
                message: format!(
                    "Reference prefix {ref_block_prefix} does not match chain ({expected_prefix})"
                )
                .into(),
                context: None,
            });
        }
        Ok(())
    }

    // --- Hardforks ---

    /// Applies hardforks up to and including `hardfork`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::OperationRejected`] for an unknown hardfork
    /// number.
    pub fn apply_hardfork(&mut self, hardfork: u32, now: TimePointSec) -> Result<(), ChainError> {
        if hardfork > max_hardfork() {
            return Err(ChainError::OperationRejected {
                message: format!(
                    "Hardfork {hardfork} is unknown to this build (max {})",
                    max_hardfork()
                )
                .into(),
                context: None,
            });
        }

        while self.hardforks.last_hardfork < hardfork {
            let next = self.hardforks.last_hardfork + 1;
            self.hardforks.current_hardfork_version = HARDFORKS[(next - 1) as usize];
            self.hardforks.last_hardfork = next;
            self.hardforks.processed_hardforks.push(now);
            tracing::info!(
                hardfork = next,
                version = %self.hardforks.current_hardfork_version,
                "Hardfork applied"
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn has_hardfork(&self, hardfork: u32) -> bool {
        self.hardforks.last_hardfork >= hardfork
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::GenesisState;

    fn fresh_state() -> State {
        GenesisState::default().build_state().unwrap()
    }

    #[test]
    fn slots_start_one_interval_past_genesis() {
        let state = fresh_state();
        let genesis_time = state.dgp.genesis_time;
        let interval = state.block_interval;

        assert_eq!(state.get_slot_time(1), genesis_time.saturating_add_secs(interval));
        assert_eq!(state.get_slot_at_time(genesis_time), 0);
        assert_eq!(state.get_slot_at_time(state.get_slot_time(1)), 1);
        assert_eq!(state.get_slot_at_time(state.get_slot_time(5)), 5);
    }

    #[test]
    fn fresh_chain_has_full_participation() {
        let state = fresh_state();
        assert_eq!(state.witness_participation_rate(), 100);
    }

    #[test]
    fn hardforks_apply_in_order_and_reject_unknown() {
        let mut state = fresh_state();
        assert!(!state.has_hardfork(1));

        state.apply_hardfork(2, TimePointSec::from_secs(1)).unwrap();
        assert!(state.has_hardfork(1));
        assert!(state.has_hardfork(2));
        assert_eq!(state.hardforks.current_hardfork_version, HardforkVersion::new(1, 2));
        assert_eq!(state.hardforks.processed_hardforks.len(), 2);

        assert!(state.apply_hardfork(max_hardfork() + 1, TimePointSec::from_secs(2)).is_err());
    }

    #[test]
    fn tapos_accepts_the_zero_anchor_on_a_fresh_chain() {
        let state = fresh_state();
        state.check_tapos(0, 0).unwrap();
        assert!(state.check_tapos(1, 0).is_err());
    }
}
