//! The debug node core: deterministic, on-demand block generation against
//! the live chain, with every safety check the debug key cannot satisfy
//! waived explicitly.

use crate::error::DebugError;
use stx_chain::{Chain, SkipFlags, State};
use stx_protocol::{PrivateKey, SignedBlock, TimePointSec};
use tracing::{debug, info};

/// Drives the chain from the debug API: generates blocks for whatever
/// witness the schedule names, signing with a single debug key.
#[derive(Debug, Clone)]
pub struct DebugNode {
    chain: Chain,
    debug_key: PrivateKey,
}

impl DebugNode {
    #[must_use]
    pub fn new(chain: Chain, debug_key: PrivateKey) -> Self {
        Self { chain, debug_key }
    }

    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Generates `count` blocks, the first one `miss_blocks` slots late.
    ///
    /// Whatever witness the schedule names owns each block; the debug key
    /// signs for it with witness-signature verification waived.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Chain`] when a block fails to apply.
    pub async fn generate_blocks(
        &self,
        count: u32,
        skip: SkipFlags,
        miss_blocks: u32,
    ) -> Result<u32, DebugError> {
        let mut produced = 0;
        for i in 0..count {
            let miss = if i == 0 { miss_blocks } else { 0 };
            let slot = miss + 1;
            let (when, witness) = self
                .chain
                .with_state(|state| (state.get_slot_time(slot), state.get_scheduled_witness(slot)));

            self.chain
                .generate_block(when, witness, &self.debug_key, skip | SkipFlags::debug_generation())
                .await?;
            produced += 1;
        }

        debug!(produced, miss_blocks, "Debug blocks generated");
        Ok(produced)
    }

    /// Generates blocks until the head reaches `head_block_time`.
    ///
    /// Sparse generation jumps there in a single block; dense generation
    /// fills every slot on the way.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Chain`] when a block fails to apply.
    pub async fn generate_blocks_until(
        &self,
        head_block_time: TimePointSec,
        generate_sparsely: bool,
        skip: SkipFlags,
    ) -> Result<u32, DebugError> {
        if self.chain.head_block_time() >= head_block_time {
            return Ok(0);
        }

        if generate_sparsely {
            let slot = self.chain.with_state(|state| state.get_slot_at_time(head_block_time));
            if slot == 0 {
                return Ok(0);
            }
            return self.generate_blocks(1, skip, slot - 1).await;
        }

        let mut produced = 0;
        while self.chain.head_block_time() < head_block_time {
            produced += self.generate_blocks(1, skip, 0).await?;
        }
        Ok(produced)
    }

    /// Applies an externally built block.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Chain`] when the block fails its checks.
    pub async fn push_block(&self, block: SignedBlock, skip: SkipFlags) -> Result<(), DebugError> {
        self.chain.push_block(block, skip).await?;
        Ok(())
    }

    /// Pops the head block, or returns `None` at genesis.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Chain`] when the undo horizon has passed.
    pub async fn pop_block(&self) -> Result<Option<SignedBlock>, DebugError> {
        if self.chain.head_block_num() == 0 {
            return Ok(None);
        }
        Ok(Some(self.chain.pop_block().await?))
    }

    /// Fast-forwards the chain through hardforks up to `hardfork`.
    ///
    /// # Errors
    ///
    /// Returns [`DebugError::Chain`] for an unknown hardfork number.
    pub fn set_hardfork(&self, hardfork: u32) -> Result<(), DebugError> {
        self.chain.state_update(|state| {
            let now = state.head_block_time();
            state.apply_hardfork(hardfork, now)
        })?;
        info!(hardfork, "Debug hardfork applied");
        Ok(())
    }

    #[must_use]
    pub fn has_hardfork(&self, hardfork: u32) -> bool {
        self.chain.with_state(|state| state.has_hardfork(hardfork))
    }

    /// Edits the chain state directly, outside consensus.
    ///
    /// The debug plugin's state-editing hook: tests fabricate balances,
    /// schedules, or hardfork states without crafting operations for them.
    pub fn state_update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        self.chain.state_update(f)
    }
}
