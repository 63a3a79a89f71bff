//! Genesis: the state a chain starts from, and the chain id derived from it.

use crate::error::ChainError;
use crate::objects::{
    AccountObject, DynamicGlobalProperties, HardforkState, WitnessObject, WitnessSchedule,
};
use crate::state::State;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stx_protocol::operations::ChainProperties;
use stx_protocol::types::sha256;
use stx_protocol::{
    AccountName, Asset, Authority, BlockId, ChainId, HardforkVersion, PrivateKey, PublicKey,
    SPHTX_SYMBOL, TimePointSec, VESTS_SYMBOL,
};

/// The account that bootstraps a fresh chain.
pub const INITMINER: &str = "initminer";

/// Seed of the built-in private-net initminer key. Public knowledge; private
/// nets are for development only.
pub const INITMINER_KEY_SEED: &str = "initminer-private-net";

/// An account funded at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialAccount {
    pub name: AccountName,
    pub key: PublicKey,
    pub balance: Asset,
}

/// Everything needed to initialize (and identify) a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisState {
    pub initial_public_key: PublicKey,
    /// Initminer's starting balance, in satoshis.
    pub initial_supply: i64,
    pub max_witnesses: u32,
    pub block_interval: u32,
    pub max_block_size: u32,
    pub genesis_time: TimePointSec,
    /// Explicit chain id; absent means the digest of this genesis.
    pub initial_chain_id: Option<ChainId>,
    pub is_private_net: bool,
    pub initial_accounts: Vec<InitialAccount>,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            initial_public_key: PrivateKey::regenerate(INITMINER_KEY_SEED).public_key(),
            initial_supply: 350_000_000 * stx_protocol::asset::SATOSHIS_PER_COIN,
            max_witnesses: stx_protocol::config::MAX_WITNESSES,
            block_interval: stx_protocol::config::BLOCK_INTERVAL_SECS,
            max_block_size: stx_protocol::config::DEFAULT_MAX_BLOCK_SIZE,
            genesis_time: TimePointSec::from_secs(1_536_000_000),
            initial_chain_id: None,
            is_private_net: true,
            initial_accounts: Vec::new(),
        }
    }
}

impl GenesisState {
    /// The chain id corresponding to this genesis state: the explicit id when
    /// present, otherwise the SHA-256 of the canonical genesis encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Encoding`] if serialization fails.
    pub fn chain_id(&self) -> Result<ChainId, ChainError> {
        if let Some(id) = self.initial_chain_id {
            return Ok(id);
        }
        let mut canonical = self.clone();
        canonical.initial_chain_id = None;
        Ok(ChainId(sha256(&postcard::to_stdvec(&canonical)?)))
    }

    /// Builds the pre-block-one chain state.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Encoding`] if the chain id cannot be derived.
    pub fn build_state(&self) -> Result<State, ChainError> {
        let chain_id = self.chain_id()?;
        let initminer = AccountName::new(INITMINER).map_err(|e| ChainError::Internal {
            message: format!("Genesis account name invalid: {e}").into(),
            context: None,
        })?;

        let mut accounts = BTreeMap::new();
        let mut current_supply = Asset::new(self.initial_supply, SPHTX_SYMBOL);

        let mut miner = AccountObject::new(
            initminer.clone(),
            Authority::single_key(self.initial_public_key),
            Authority::single_key(self.initial_public_key),
            self.initial_public_key,
            self.genesis_time,
        );
        miner.balance = Asset::new(self.initial_supply, SPHTX_SYMBOL);
        accounts.insert(initminer.clone(), miner);

        for initial in &self.initial_accounts {
            let mut account = AccountObject::new(
                initial.name.clone(),
                Authority::single_key(initial.key),
                Authority::single_key(initial.key),
                initial.key,
                self.genesis_time,
            );
            account.balance = initial.balance;
            current_supply = current_supply.checked_add(&initial.balance).map_err(|e| {
                ChainError::Internal {
                    message: format!("Genesis supply overflow: {e}").into(),
                    context: None,
                }
            })?;
            accounts.insert(initial.name.clone(), account);
        }

        let mut witnesses = BTreeMap::new();
        witnesses.insert(
            initminer.clone(),
            WitnessObject {
                owner: initminer.clone(),
                url: String::new(),
                signing_key: self.initial_public_key,
                props: ChainProperties {
                    account_creation_fee: Asset::new(0, SPHTX_SYMBOL),
                    maximum_block_size: self.max_block_size,
                },
                total_missed: 0,
                last_confirmed_block_num: 0,
                running: true,
                votes: 0,
                created: self.genesis_time,
            },
        );

        let dgp = DynamicGlobalProperties {
            head_block_number: 0,
            head_block_id: BlockId::default(),
            time: self.genesis_time,
            current_witness: initminer.clone(),
            current_supply,
            total_vesting_shares: Asset::new(0, VESTS_SYMBOL),
            maximum_block_size: self.max_block_size,
            current_aslot: 0,
            // A fresh chain starts at full participation.
            recent_slots_filled: u128::MAX,
            participation_count: 128,
            last_irreversible_block_num: 0,
            chain_id,
            genesis_time: self.genesis_time,
            private_net: self.is_private_net,
        };

        let schedule = WitnessSchedule {
            current_shuffled_witnesses: vec![initminer],
            num_scheduled_witnesses: 1,
            next_shuffle_block_num: self.max_witnesses,
        };

        let hardforks = HardforkState {
            current_hardfork_version: HardforkVersion::new(1, 0),
            last_hardfork: 0,
            processed_hardforks: Vec::new(),
        };

        Ok(State {
            accounts,
            witnesses,
            dgp,
            schedule,
            hardforks,
            block_interval: self.block_interval,
            max_witnesses: self.max_witnesses,
            recent_block_ids: BTreeMap::new(),
            transaction_index: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_is_stable_and_sensitive() {
        let genesis = GenesisState::default();
        assert_eq!(genesis.chain_id().unwrap(), genesis.chain_id().unwrap());

        let mut other = GenesisState::default();
        other.initial_supply += 1;
        assert_ne!(genesis.chain_id().unwrap(), other.chain_id().unwrap());

        let mut pinned = GenesisState::default();
        let id = ChainId(sha256(b"pinned"));
        pinned.initial_chain_id = Some(id);
        assert_eq!(pinned.chain_id().unwrap(), id);
    }

    #[test]
    fn build_state_seeds_initminer() {
        let genesis = GenesisState::default();
        let state = genesis.build_state().unwrap();

        let initminer = state.accounts.get(&AccountName::new(INITMINER).unwrap()).unwrap();
        assert_eq!(initminer.balance.amount, genesis.initial_supply);
        assert_eq!(state.dgp.current_supply.amount, genesis.initial_supply);
        assert_eq!(state.dgp.head_block_number, 0);
        assert_eq!(state.schedule.current_shuffled_witnesses.len(), 1);
        assert!(state.witnesses.contains_key(&AccountName::new(INITMINER).unwrap()));
    }

    #[test]
    fn initial_accounts_add_to_supply() {
        let key = PrivateKey::regenerate("alice").public_key();
        let mut genesis = GenesisState::default();
        genesis.initial_accounts.push(InitialAccount {
            name: AccountName::new("alice").unwrap(),
            key,
            balance: Asset::sphtx(1000),
        });

        let state = genesis.build_state().unwrap();
        assert_eq!(
            state.dgp.current_supply.amount,
            genesis.initial_supply + Asset::sphtx(1000).amount
        );
        assert!(state.accounts.contains_key(&AccountName::new("alice").unwrap()));
    }
}
