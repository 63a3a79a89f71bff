//! The block production loop.
//!
//! Wakes close to each slot boundary, decides whether this node owns the
//! slot, and produces through the chain when it does. Every other outcome is
//! reported as a [`BlockProductionCondition`] and logged the way operators
//! expect from the witness plugin.

use fxhash::FxHashMap;
use std::collections::BTreeSet;
use std::time::Duration;
use stx_chain::{Chain, SkipFlags};
use stx_protocol::{AccountName, PrivateKey, PublicKey, TimePointSec};
use tracing::{error, info, warn};

/// Tolerated distance between waking up and the slot time.
const BLOCK_PRODUCING_LAG_MS: u32 = 750;

/// The loop ticks at this cadence between slots.
const PRODUCTION_LOOP_SLEEP: Duration = Duration::from_millis(200);

/// Why the loop did or did not produce on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockProductionCondition {
    Produced,
    NotSynced,
    NotMyTurn,
    NotTimeYet,
    NoPrivateKey,
    LowParticipation,
    Lag,
    WaitForGenesis,
    ExceptionProducingBlock,
}

/// Everything the loop needs besides the chain handle.
#[derive(Clone)]
pub struct ProductionParams {
    pub witnesses: BTreeSet<AccountName>,
    pub keys: FxHashMap<PublicKey, PrivateKey>,
    pub required_participation: u32,
    pub enable_stale_production: bool,
}

impl std::fmt::Debug for ProductionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductionParams")
            .field("witnesses", &self.witnesses)
            .field("keys", &self.keys.len())
            .field("required_participation", &self.required_participation)
            .field("enable_stale_production", &self.enable_stale_production)
            .finish()
    }
}

/// Runs until aborted, producing whenever a controlled witness owns a slot.
pub async fn production_loop(chain: Chain, params: ProductionParams) {
    let mut production_enabled = params.enable_stale_production;

    loop {
        tokio::time::sleep(PRODUCTION_LOOP_SLEEP).await;

        let condition = maybe_produce_block(&chain, &params, &mut production_enabled).await;
        match condition {
            BlockProductionCondition::Produced => {
                info!(
                    block_num = chain.head_block_num(),
                    time = %chain.head_block_time(),
                    "Generated block"
                );
            },
            BlockProductionCondition::NotSynced => {
                warn!(
                    "Not producing block because production is disabled until a recent block arrives (see witness.enable_stale_production)"
                );
            },
            BlockProductionCondition::NotMyTurn | BlockProductionCondition::NotTimeYet => {},
            BlockProductionCondition::NoPrivateKey => {
                info!("Not producing block because the scheduled signing key is not loaded");
            },
            BlockProductionCondition::LowParticipation => {
                error!(
                    participation = chain.with_state(stx_chain::State::witness_participation_rate),
                    "Not producing block: node appears to be on a minority fork"
                );
            },
            BlockProductionCondition::Lag => {
                error!(
                    "Not producing block because the node did not wake up within {BLOCK_PRODUCING_LAG_MS}ms of the slot time"
                );
            },
            BlockProductionCondition::WaitForGenesis => {
                warn!(
                    genesis = %chain.with_state(|s| s.dgp.genesis_time),
                    "Waiting for the genesis time to produce blocks"
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            },
            BlockProductionCondition::ExceptionProducingBlock => {
                error!("Exception producing block");
            },
        }
    }
}

/// One production decision, mirroring the plugin's condition ladder.
pub async fn maybe_produce_block(
    chain: &Chain,
    params: &ProductionParams,
    production_enabled: &mut bool,
) -> BlockProductionCondition {
    // Round half a second forward so a wake-up just shy of the slot still
    // lands on it.
    let now = TimePointSec::now().saturating_add_secs(1);

    let decision = chain.with_state(|state| {
        if now < state.dgp.genesis_time {
            return Err(BlockProductionCondition::WaitForGenesis);
        }

        if !*production_enabled {
            if state.get_slot_time(1) >= now {
                *production_enabled = true;
            } else {
                return Err(BlockProductionCondition::NotSynced);
            }
        }

        let slot = state.get_slot_at_time(now);
        if slot == 0 {
            return Err(BlockProductionCondition::NotTimeYet);
        }

        let scheduled_witness = state.get_scheduled_witness(slot);
        if !params.witnesses.contains(&scheduled_witness) {
            return Err(BlockProductionCondition::NotMyTurn);
        }

        let scheduled_time = state.get_slot_time(slot);
        let scheduled_key = match state.get_witness(&scheduled_witness) {
            Ok(witness) => witness.signing_key,
            Err(_) => return Err(BlockProductionCondition::NoPrivateKey),
        };

        if !params.keys.contains_key(&scheduled_key) {
            return Err(BlockProductionCondition::NoPrivateKey);
        }

        if state.witness_participation_rate() < params.required_participation {
            return Err(BlockProductionCondition::LowParticipation);
        }

        let distance_ms = scheduled_time.secs_since(now).max(now.secs_since(scheduled_time)) * 1000;
        if distance_ms > BLOCK_PRODUCING_LAG_MS {
            return Err(BlockProductionCondition::Lag);
        }

        Ok((scheduled_time, scheduled_witness, scheduled_key))
    });

    let (scheduled_time, scheduled_witness, scheduled_key) = match decision {
        Ok(target) => target,
        Err(condition) => return condition,
    };

    let Some(key) = params.keys.get(&scheduled_key) else {
        return BlockProductionCondition::NoPrivateKey;
    };

    match chain.generate_block(scheduled_time, scheduled_witness, key, SkipFlags::empty()).await {
        Ok(_) => BlockProductionCondition::Produced,
        Err(e) => {
            error!(error = %e, "Got exception while generating block");
            BlockProductionCondition::ExceptionProducingBlock
        },
    }
}
