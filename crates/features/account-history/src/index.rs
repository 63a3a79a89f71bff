//! The history index: one append-only operation sequence per account.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use stx_chain::{ChainObserver, OperationNotification};
use stx_protocol::{AccountName, Operation, SignedBlock, TimePointSec, TransactionId};

/// An operation as it landed on the chain, annotated with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOperation {
    pub trx_id: TransactionId,
    pub block: u32,
    pub trx_in_block: u32,
    pub op_in_trx: u32,
    pub timestamp: TimePointSec,
    pub op: Operation,
}

/// The accounts an operation touches, fee payer included.
#[must_use]
pub fn impacted_accounts(op: &Operation) -> BTreeSet<AccountName> {
    let mut out = BTreeSet::new();
    out.insert(op.fee_payer().clone());

    match op {
        Operation::AccountCreate(op) => {
            out.insert(stx_protocol::derive_account_name(&op.name_seed));
        },
        Operation::Transfer(op) => {
            out.insert(op.to.clone());
        },
        Operation::TransferToVesting(op) => {
            if let Some(to) = &op.to {
                out.insert(to.clone());
            }
        },
        Operation::AccountWitnessVote(op) => {
            out.insert(op.witness.clone());
        },
        Operation::CustomJson(custom) => {
            out.extend(custom.recipients.iter().cloned());
        },
        Operation::CustomBinary(custom) => {
            out.extend(custom.recipients.iter().cloned());
        },
        _ => {},
    }

    out
}

#[derive(Debug, Default)]
struct HistoryStore {
    /// Sequence per account; the vector index is the account-local sequence
    /// number.
    accounts: BTreeMap<AccountName, Vec<AppliedOperation>>,
    /// Operations seen for the block currently applying, flushed with its
    /// timestamp once the block lands.
    staging: Vec<OperationNotification>,
}

/// The chain observer maintaining per-account operation history.
#[derive(Debug, Default)]
pub struct HistoryIndex {
    store: RwLock<HistoryStore>,
}

impl HistoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of recorded entries for an account.
    #[must_use]
    pub fn account_length(&self, account: &AccountName) -> u64 {
        self.store.read().accounts.get(account).map_or(0, |entries| entries.len() as u64)
    }

    /// A window of an account's history: entries with sequence numbers in
    /// `(start - limit, start]`, newest last. `start = -1` means the newest
    /// entry.
    #[must_use]
    pub fn account_window(
        &self,
        account: &AccountName,
        start: i64,
        limit: u32,
    ) -> Vec<(u64, AppliedOperation)> {
        let store = self.store.read();
        let Some(entries) = store.accounts.get(account) else {
            return Vec::new();
        };
        if entries.is_empty() {
            return Vec::new();
        }

        let newest = entries.len() as u64 - 1;
        let start = if start < 0 { newest } else { (start as u64).min(newest) };
        let from = start.saturating_sub(u64::from(limit).saturating_sub(1));

        (from..=start)
            .map(|seq| (seq, entries[seq as usize].clone()))
            .collect()
    }
}

impl ChainObserver for HistoryIndex {
    fn on_operation(&self, note: &OperationNotification) {
        self.store.write().staging.push(note.clone());
    }

    fn on_block_applied(&self, block: &SignedBlock) {
        let mut store = self.store.write();
        let staged = std::mem::take(&mut store.staging);

        for note in staged {
            let applied = AppliedOperation {
                trx_id: note.trx_id,
                block: note.block,
                trx_in_block: note.trx_in_block,
                op_in_trx: note.op_in_trx,
                timestamp: block.header.timestamp,
                op: note.op,
            };
            for account in impacted_accounts(&applied.op) {
                store.accounts.entry(account).or_default().push(applied.clone());
            }
        }
    }

    fn on_block_removed(&self, block: &SignedBlock) {
        let block_num = block.block_num();
        let mut store = self.store.write();
        for entries in store.accounts.values_mut() {
            entries.retain(|entry| entry.block != block_num);
        }
        store.accounts.retain(|_, entries| !entries.is_empty());
    }
}
