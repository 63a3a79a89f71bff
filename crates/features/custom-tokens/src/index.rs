//! The token index: interprets `custom_json` actions into token objects,
//! balances, an audit log, and recorded errors.
//!
//! The index is off-consensus. A malformed or rejected action never fails the
//! enclosing block; it is recorded as a token error keyed by transaction id,
//! exactly so wrappers can ask "why did my token action not happen".

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stx_chain::{ChainObserver, OperationNotification};
use stx_protocol::{AccountName, AssetSymbol, Operation, SignedBlock, TransactionId};
use tracing::debug;

/// A registered custom token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTokenObject {
    pub owner_name: AccountName,
    pub token_symbol: AssetSymbol,
    pub total_supply: u64,
    pub max_supply: u64,
    pub paused: bool,
}

/// One account's holding of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account: AccountName,
    pub amount: u64,
}

/// A recorded failure of a token action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenError {
    pub trx_id: TransactionId,
    pub block: u32,
    pub token_symbol: Option<AssetSymbol>,
    pub error: String,
}

/// One applied token action, kept for history and for rollback replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOperationRecord {
    pub trx_id: TransactionId,
    pub block: u32,
    pub sender: AccountName,
    pub action: TokenAction,
}

/// The actions understood on the configured app id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TokenAction {
    CreateToken {
        token_symbol: AssetSymbol,
        total_supply: u64,
        #[serde(default)]
        max_supply: Option<u64>,
    },
    IssueToken {
        token_symbol: AssetSymbol,
        additional_amount: u64,
    },
    PauseToken {
        token_symbol: AssetSymbol,
    },
    TransferToken {
        token_symbol: AssetSymbol,
        to: AccountName,
        amount: u64,
    },
    BurnToken {
        token_symbol: AssetSymbol,
        amount: u64,
    },
}

impl TokenAction {
    fn symbol(&self) -> AssetSymbol {
        match self {
            Self::CreateToken { token_symbol, .. }
            | Self::IssueToken { token_symbol, .. }
            | Self::PauseToken { token_symbol }
            | Self::TransferToken { token_symbol, .. }
            | Self::BurnToken { token_symbol, .. } => *token_symbol,
        }
    }
}

#[derive(Debug, Default)]
struct TokenStore {
    tokens: BTreeMap<AssetSymbol, CustomTokenObject>,
    balances: BTreeMap<(AssetSymbol, AccountName), u64>,
    operations: Vec<TokenOperationRecord>,
    errors: Vec<TokenError>,
}

impl TokenStore {
    /// Applies one parsed action, or explains why it cannot apply.
    fn apply(&mut self, sender: &AccountName, action: &TokenAction) -> Result<(), String> {
        let symbol = action.symbol();

        match action {
            TokenAction::CreateToken { total_supply, max_supply, .. } => {
                if self.tokens.contains_key(&symbol) {
                    return Err(format!("Token '{symbol}' already exists"));
                }
                let max = max_supply.unwrap_or(u64::MAX);
                if *total_supply > max {
                    return Err(format!(
                        "Initial supply {total_supply} exceeds max supply {max}"
                    ));
                }
                self.tokens.insert(
                    symbol,
                    CustomTokenObject {
                        owner_name: sender.clone(),
                        token_symbol: symbol,
                        total_supply: *total_supply,
                        max_supply: max,
                        paused: false,
                    },
                );
                if *total_supply > 0 {
                    self.balances.insert((symbol, sender.clone()), *total_supply);
                }
                Ok(())
            },
            TokenAction::IssueToken { additional_amount, .. } => {
                let token = self
                    .tokens
                    .get_mut(&symbol)
                    .ok_or_else(|| format!("No such a token '{symbol}'"))?;
                if token.owner_name != *sender {
                    return Err(format!("Only the owner may issue '{symbol}'"));
                }
                let new_supply = token
                    .total_supply
                    .checked_add(*additional_amount)
                    .filter(|&supply| supply <= token.max_supply)
                    .ok_or_else(|| format!("Issuing past the max supply of '{symbol}'"))?;
                token.total_supply = new_supply;
                let owner = token.owner_name.clone();
                *self.balances.entry((symbol, owner)).or_insert(0) += additional_amount;
                Ok(())
            },
            TokenAction::PauseToken { .. } => {
                let token = self
                    .tokens
                    .get_mut(&symbol)
                    .ok_or_else(|| format!("No such a token '{symbol}'"))?;
                if token.owner_name != *sender {
                    return Err(format!("Only the owner may pause '{symbol}'"));
                }
                token.paused ^= true;
                Ok(())
            },
            TokenAction::TransferToken { to, amount, .. } => {
                let token = self
                    .tokens
                    .get(&symbol)
                    .ok_or_else(|| format!("No such a token '{symbol}'"))?;
                if token.paused {
                    return Err(format!("Token '{symbol}' is paused"));
                }
                let held =
                    self.balances.get(&(symbol, sender.clone())).copied().unwrap_or(0);
                if held < *amount {
                    return Err(format!(
                        "'{sender}' holds {held} of '{symbol}', needs {amount}"
                    ));
                }
                self.balances.insert((symbol, sender.clone()), held - amount);
                *self.balances.entry((symbol, to.clone())).or_insert(0) += amount;
                Ok(())
            },
            TokenAction::BurnToken { amount, .. } => {
                let held =
                    self.balances.get(&(symbol, sender.clone())).copied().unwrap_or(0);
                if held < *amount {
                    return Err(format!(
                        "'{sender}' holds {held} of '{symbol}', cannot burn {amount}"
                    ));
                }
                let token = self
                    .tokens
                    .get_mut(&symbol)
                    .ok_or_else(|| format!("No such a token '{symbol}'"))?;
                token.total_supply = token.total_supply.saturating_sub(*amount);
                self.balances.insert((symbol, sender.clone()), held - amount);
                Ok(())
            },
        }
    }
}

/// The chain observer maintaining the token index for one app id.
#[derive(Debug)]
pub struct TokenIndex {
    app_id: u64,
    store: RwLock<TokenStore>,
}

impl TokenIndex {
    #[must_use]
    pub fn new(app_id: u64) -> Self {
        Self { app_id, store: RwLock::new(TokenStore::default()) }
    }

    #[must_use]
    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    #[must_use]
    pub fn get_token(&self, symbol: AssetSymbol) -> Option<CustomTokenObject> {
        self.store.read().tokens.get(&symbol).cloned()
    }

    #[must_use]
    pub fn get_balances(&self, symbol: AssetSymbol) -> Vec<TokenBalance> {
        self.store
            .read()
            .balances
            .iter()
            .filter(|((s, _), amount)| *s == symbol && **amount > 0)
            .map(|((_, account), amount)| TokenBalance {
                account: account.clone(),
                amount: *amount,
            })
            .collect()
    }

    #[must_use]
    pub fn get_errors(&self, symbol: Option<AssetSymbol>) -> Vec<TokenError> {
        self.store
            .read()
            .errors
            .iter()
            .filter(|error| symbol.is_none() || error.token_symbol == symbol)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get_history(&self, symbol: AssetSymbol, limit: usize) -> Vec<TokenOperationRecord> {
        let store = self.store.read();
        store
            .operations
            .iter()
            .rev()
            .filter(|record| record.action.symbol() == symbol)
            .take(limit)
            .cloned()
            .collect()
    }

    fn handle(&self, note: &OperationNotification, sender: &AccountName, json: &str) {
        let mut store = self.store.write();

        let action: TokenAction = match serde_json::from_str(json) {
            Ok(action) => action,
            Err(e) => {
                store.errors.push(TokenError {
                    trx_id: note.trx_id,
                    block: note.block,
                    token_symbol: None,
                    error: format!("Unknown action for custom token: {e}"),
                });
                return;
            },
        };

        match store.apply(sender, &action) {
            Ok(()) => {
                debug!(symbol = %action.symbol(), "Token action applied");
                store.operations.push(TokenOperationRecord {
                    trx_id: note.trx_id,
                    block: note.block,
                    sender: sender.clone(),
                    action,
                });
            },
            Err(error) => {
                store.errors.push(TokenError {
                    trx_id: note.trx_id,
                    block: note.block,
                    token_symbol: Some(action.symbol()),
                    error,
                });
            },
        }
    }

    /// Rebuilds the materialized maps from the surviving operation log.
    fn rebuild(store: &mut TokenStore) {
        let operations = std::mem::take(&mut store.operations);
        store.tokens.clear();
        store.balances.clear();

        for record in operations {
            // Records replay cleanly by construction; a failure here means
            // the log itself is inconsistent.
            if let Err(error) = store.apply(&record.sender, &record.action) {
                tracing::error!(%error, "Token log replay diverged; dropping record");
                continue;
            }
            store.operations.push(record);
        }
    }
}

impl ChainObserver for TokenIndex {
    fn on_operation(&self, note: &OperationNotification) {
        if let Operation::CustomJson(op) = &note.op
            && op.app_id == self.app_id
        {
            self.handle(note, &op.sender, &op.json);
        }
    }

    fn on_block_removed(&self, block: &SignedBlock) {
        let block_num = block.block_num();
        let mut store = self.store.write();

        let before = store.operations.len();
        store.operations.retain(|record| record.block != block_num);
        store.errors.retain(|error| error.block != block_num);

        if store.operations.len() != before {
            Self::rebuild(&mut store);
        }
    }
}
