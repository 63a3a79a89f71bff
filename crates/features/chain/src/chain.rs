//! The chain handle: transaction admission, block application and
//! production, and the undo machinery behind `pop_block`.

use crate::error::{ChainError, ChainErrorExt};
use crate::evaluator;
use crate::genesis::GenesisState;
use crate::observer::{BlockApplied, ChainObserver, OperationNotification, TransactionApplied};
use crate::skip::SkipFlags;
use crate::state::State;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use stx_blockstore::BlockStore;
use stx_event_bus::EventBus;
use stx_protocol::block::BlockHeader;
use stx_protocol::config::{IRREVERSIBLE_THRESHOLD, MAX_EXPIRATION_SECS};
use stx_protocol::{
    AccountName, ChainId, PrivateKey, SignedBlock, SignedTransaction, TimePointSec, TransactionId,
};
use tracing::{debug, info, warn};

pub(crate) struct ChainInner {
    state: RwLock<State>,
    /// State checkpoints taken before each applied block, newest last.
    undo: RwLock<VecDeque<State>>,
    pending: RwLock<Vec<SignedTransaction>>,
    /// Serializes block application and popping end to end, including the
    /// block log write. The state lock alone cannot span the await points.
    commit_lock: tokio::sync::Mutex<()>,
    observers: RwLock<Vec<Arc<dyn ChainObserver>>>,
    store: BlockStore,
    events: EventBus,
    genesis: GenesisState,
    chain_id: ChainId,
    undo_limit: usize,
}

impl std::fmt::Debug for ChainInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainInner")
            .field("chain_id", &self.chain_id)
            .field("head", &self.state.read().head_block_num())
            .finish_non_exhaustive()
    }
}

/// A cheaply clonable handle to the node's single chain.
///
/// All state access goes through [`Chain::with_state`]; mutation happens only
/// by applying blocks (or through the explicitly unsafe-by-design
/// [`Chain::state_update`] debug hook).
#[derive(Debug, Clone)]
pub struct Chain {
    inner: Arc<ChainInner>,
}

impl Chain {
    /// Opens a chain against a block log: builds the genesis state, then
    /// replays whatever the log already holds.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Store`] for log failures and
    /// [`ChainError::InvalidBlock`] when the log does not replay cleanly
    /// against this genesis.
    pub async fn open(
        genesis: GenesisState,
        store: BlockStore,
        events: EventBus,
        undo_limit: usize,
    ) -> Result<Self, ChainError> {
        let chain_id = genesis.chain_id()?;
        let state = genesis.build_state()?;

        let chain = Self {
            inner: Arc::new(ChainInner {
                state: RwLock::new(state),
                undo: RwLock::new(VecDeque::new()),
                pending: RwLock::new(Vec::new()),
                commit_lock: tokio::sync::Mutex::new(()),
                observers: RwLock::new(Vec::new()),
                store,
                events,
                genesis,
                chain_id,
                undo_limit: undo_limit.max(1),
            }),
        };

        let head = chain.inner.store.head_num();
        if head > 0 {
            info!(head, "Replaying block log");
            for num in 1..=head {
                let payload = chain.inner.store.read(num).await?;
                let block: SignedBlock =
                    postcard::from_bytes(&payload).context(format!("Decoding block {num}"))?;
                chain
                    .apply_block_internal(&block, SkipFlags::replay(), false)
                    .await
                    .context(format!("Replaying block {num}"))?;
            }
        }

        info!(chain_id = %chain_id, head = chain.head_block_num(), "Chain open");
        Ok(chain)
    }

    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.inner.chain_id
    }

    #[must_use]
    pub fn genesis(&self) -> &GenesisState {
        &self.inner.genesis
    }

    #[must_use]
    pub fn store(&self) -> &BlockStore {
        &self.inner.store
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    #[must_use]
    pub fn head_block_num(&self) -> u32 {
        self.inner.state.read().head_block_num()
    }

    #[must_use]
    pub fn head_block_time(&self) -> TimePointSec {
        self.inner.state.read().head_block_time()
    }

    /// Runs a closure against the current state under the read lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.inner.state.read())
    }

    /// Directly edits the state, bypassing consensus and undo tracking.
    ///
    /// This is the debug plugin's state-editing hook; it has no place in a
    /// production flow and exists so tests and the debug API can fabricate
    /// scenarios (fund an account, corrupt a schedule) without blocks.
    pub fn state_update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.inner.state.write())
    }

    /// Registers a synchronous observer. Observers added after open miss
    /// replayed blocks.
    pub fn add_observer(&self, observer: Arc<dyn ChainObserver>) {
        self.inner.observers.write().push(observer);
    }

    #[must_use]
    pub fn pending_transactions(&self) -> Vec<SignedTransaction> {
        self.inner.pending.read().clone()
    }

    /// Admits a transaction to the pending pool.
    ///
    /// The transaction is fully checked (structure, TaPoS, expiration,
    /// signatures, authorities) and dry-run against a copy of the head state
    /// so failures surface to the submitter instead of at production time.
    ///
    /// # Errors
    ///
    /// Any validation or evaluator failure; [`ChainError::DuplicateTransaction`]
    /// when the id is already pending or applied.
    pub fn push_transaction(
        &self,
        tx: SignedTransaction,
        skip: SkipFlags,
    ) -> Result<TransactionId, ChainError> {
        let id = tx.trx.id()?;

        {
            let pending = self.inner.pending.read();
            for queued in pending.iter() {
                if queued.trx.id()? == id {
                    return Err(ChainError::DuplicateTransaction {
                        message: format!("{id} is already pending").into(),
                        context: None,
                    });
                }
            }
        }

        {
            let state = self.inner.state.read();
            let mut probe = state.clone();
            let now = state.get_slot_time(1);
            let mut discard = Vec::new();
            apply_transaction_to(
                &mut probe,
                &tx,
                now,
                self.inner.chain_id,
                skip,
                state.head_block_num() + 1,
                0,
                &mut discard,
            )?;
        }

        self.inner.pending.write().push(tx);
        debug!(%id, "Transaction admitted to pending pool");
        Ok(id)
    }

    /// Produces, applies, and persists the next block.
    ///
    /// Pending transactions are packed in admission order until the block is
    /// full; a pending transaction that no longer applies is dropped with a
    /// warning, as it would be on the main network.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidBlock`] for slot/schedule violations and
    /// any application or persistence failure.
    pub async fn generate_block(
        &self,
        when: TimePointSec,
        witness: AccountName,
        key: &PrivateKey,
        skip: SkipFlags,
    ) -> Result<SignedBlock, ChainError> {
        let block = self.build_block(when, witness, key, skip)?;
        self.apply_block_internal(&block, skip, true).await?;
        Ok(block)
    }

    /// Applies and persists an externally produced block.
    ///
    /// # Errors
    ///
    /// Any check or application failure; the state is untouched on error.
    pub async fn push_block(&self, block: SignedBlock, skip: SkipFlags) -> Result<(), ChainError> {
        self.apply_block_internal(&block, skip, true).await
    }

    /// Pops the head block: restores the previous state checkpoint, truncates
    /// the log, and reinstates the popped transactions as pending.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NoUndoHistory`] at genesis or past the undo
    /// horizon.
    pub async fn pop_block(&self) -> Result<SignedBlock, ChainError> {
        let _commit = self.inner.commit_lock.lock().await;

        let head = self.head_block_num();
        if head == 0 {
            return Err(ChainError::NoUndoHistory {
                message: "Cannot pop the genesis state".into(),
                context: None,
            });
        }

        let checkpoint = self.inner.undo.write().pop_back().ok_or_else(|| {
            ChainError::NoUndoHistory {
                message: format!("Undo horizon passed block {head}").into(),
                context: None,
            }
        })?;

        let payload = self.inner.store.read(head).await?;
        let block: SignedBlock =
            postcard::from_bytes(&payload).context(format!("Decoding block {head}"))?;
        self.inner.store.truncate_to(head - 1).await?;

        *self.inner.state.write() = checkpoint;

        {
            let mut pending = self.inner.pending.write();
            for tx in block.transactions.iter().rev() {
                pending.insert(0, tx.clone());
            }
        }

        let observers = self.inner.observers.read().clone();
        for observer in observers {
            observer.on_block_removed(&block);
        }

        info!(block_num = head, "Block popped");
        Ok(block)
    }

    fn build_block(
        &self,
        when: TimePointSec,
        witness: AccountName,
        key: &PrivateKey,
        skip: SkipFlags,
    ) -> Result<SignedBlock, ChainError> {
        let state = self.inner.state.read();

        let slot = state.get_slot_at_time(when);
        if slot == 0 {
            return Err(ChainError::InvalidBlock {
                message: format!("Timestamp {when} is not past the head block").into(),
                context: None,
            });
        }
        if !skip.contains(SkipFlags::WITNESS_SCHEDULE_CHECK) {
            let scheduled = state.get_scheduled_witness(slot);
            if scheduled != witness {
                return Err(ChainError::InvalidBlock {
                    message: format!("Slot belongs to '{scheduled}', not '{witness}'").into(),
                    context: None,
                });
            }
        }
        if !skip.contains(SkipFlags::WITNESS_SIGNATURE) {
            let expected = state.get_witness(&witness)?.signing_key;
            if expected != key.public_key() {
                return Err(ChainError::InvalidBlock {
                    message: format!("Provided key does not sign for witness '{witness}'").into(),
                    context: None,
                });
            }
        }

        // Pack pending transactions against a working copy of the state.
        let mut probe = state.clone();
        let pending = self.inner.pending.read().clone();
        let mut included = Vec::new();
        let mut dropped = Vec::new();
        let mut total_size = 0usize;
        // Leave headroom for the header and signature.
        let budget = state.dgp.maximum_block_size.saturating_sub(256) as usize;

        for tx in pending {
            let size = postcard::to_stdvec(&tx)?.len();
            if total_size + size > budget {
                break;
            }
            let mut discard = Vec::new();
            match apply_transaction_to(
                &mut probe,
                &tx,
                when,
                self.inner.chain_id,
                skip,
                state.head_block_num() + 1,
                included.len() as u32,
                &mut discard,
            ) {
                Ok(()) => {
                    total_size += size;
                    included.push(tx);
                },
                Err(e) => {
                    warn!(error = %e, "Dropping pending transaction that no longer applies");
                    if let Ok(id) = tx.trx.id() {
                        dropped.push(id);
                    }
                },
            }
        }

        if !dropped.is_empty() {
            self.inner
                .pending
                .write()
                .retain(|tx| tx.trx.id().map_or(true, |id| !dropped.contains(&id)));
        }

        let mut block = SignedBlock {
            header: BlockHeader {
                previous: state.head_block_id(),
                timestamp: when,
                witness,
                transaction_merkle_root: stx_protocol::Digest::default(),
            },
            transactions: included,
            ..Default::default()
        };
        block.header.transaction_merkle_root = block.calculate_merkle_root()?;
        block.sign(key)?;
        Ok(block)
    }

    async fn apply_block_internal(
        &self,
        block: &SignedBlock,
        skip: SkipFlags,
        persist: bool,
    ) -> Result<(), ChainError> {
        let _commit = self.inner.commit_lock.lock().await;

        // Phase 1: apply against a working copy; the live state stays
        // untouched until the block is durable.
        let (next, notifications) = {
            let state = self.inner.state.read();
            let mut working = state.clone();
            let notes = apply_block_to(&mut working, block, self.inner.chain_id, skip)?;
            (working, notes)
        };

        if persist {
            let payload = postcard::to_stdvec(block)?;
            self.inner.store.append(block.block_num(), &payload).await?;
        }

        // Phase 2: commit and checkpoint.
        {
            let mut state = self.inner.state.write();
            let previous = std::mem::replace(&mut *state, next);
            let mut undo = self.inner.undo.write();
            undo.push_back(previous);
            while undo.len() > self.inner.undo_limit {
                undo.pop_front();
            }
        }

        self.prune_pending(block);
        self.notify(block, &notifications);

        debug!(
            block_num = block.block_num(),
            transactions = block.transactions.len(),
            witness = %block.header.witness,
            "Block applied"
        );
        Ok(())
    }

    /// Removes included and newly expired transactions from the pool.
    fn prune_pending(&self, block: &SignedBlock) {
        let included: Vec<TransactionId> =
            block.transactions.iter().filter_map(|tx| tx.trx.id().ok()).collect();
        let head_time = self.head_block_time();

        self.inner.pending.write().retain(|tx| {
            let keep_id = tx.trx.id().map_or(false, |id| !included.contains(&id));
            keep_id && tx.trx.expiration > head_time
        });
    }

    fn notify(&self, block: &SignedBlock, notifications: &[OperationNotification]) {
        let observers = self.inner.observers.read().clone();
        for observer in &observers {
            for note in notifications {
                observer.on_operation(note);
            }
            observer.on_block_applied(block);
        }

        let shared = Arc::new(block.clone());
        if let Err(e) = self.inner.events.publish(BlockApplied { block: shared }) {
            warn!(error = %e, "Block event not published");
        }
        for (trx_num, tx) in block.transactions.iter().enumerate() {
            if let Ok(id) = tx.trx.id() {
                let event = TransactionApplied {
                    id,
                    block_num: block.block_num(),
                    trx_num: trx_num as u32,
                };
                if let Err(e) = self.inner.events.publish(event) {
                    warn!(error = %e, "Transaction event not published");
                }
            }
        }
    }
}

/// Applies a full block to `state`, returning the operation notifications.
fn apply_block_to(
    state: &mut State,
    block: &SignedBlock,
    chain_id: ChainId,
    skip: SkipFlags,
) -> Result<Vec<OperationNotification>, ChainError> {
    let header = &block.header;
    let block_num = block.block_num();
    let invalid = |message: String| ChainError::InvalidBlock {
        message: message.into(),
        context: None,
    };

    if header.previous != state.dgp.head_block_id {
        return Err(invalid(format!(
            "Block {block_num} does not link to the head ({} != {})",
            header.previous, state.dgp.head_block_id
        )));
    }

    let slot = state.get_slot_at_time(header.timestamp);
    if slot == 0 {
        return Err(invalid(format!(
            "Timestamp {} is not past the head block",
            header.timestamp
        )));
    }
    if state.get_slot_time(slot) != header.timestamp {
        return Err(invalid(format!("Timestamp {} is off the slot grid", header.timestamp)));
    }

    if !skip.contains(SkipFlags::WITNESS_SCHEDULE_CHECK) {
        let scheduled = state.get_scheduled_witness(slot);
        if scheduled != header.witness {
            return Err(invalid(format!(
                "Slot belongs to '{scheduled}', block names '{}'",
                header.witness
            )));
        }
    }

    if !skip.contains(SkipFlags::WITNESS_SIGNATURE) {
        block.verify_witness_signature()?;
        let expected = state.get_witness(&header.witness)?.signing_key;
        if expected != block.signing_key {
            return Err(invalid(format!(
                "Block signed with a key that is not witness '{}''s signing key",
                header.witness
            )));
        }
    }

    if !skip.contains(SkipFlags::MERKLE_CHECK) {
        let computed = block.calculate_merkle_root()?;
        if computed != header.transaction_merkle_root {
            return Err(invalid("Transaction merkle root mismatch".to_owned()));
        }
    }

    if !skip.contains(SkipFlags::BLOCK_SIZE_CHECK) {
        let size = postcard::to_stdvec(block)?.len();
        if size > state.dgp.maximum_block_size as usize {
            return Err(invalid(format!(
                "Block of {size} bytes exceeds the maximum of {}",
                state.dgp.maximum_block_size
            )));
        }
    }

    let mut notifications = Vec::new();
    for (trx_in_block, tx) in block.transactions.iter().enumerate() {
        apply_transaction_to(
            state,
            tx,
            header.timestamp,
            chain_id,
            skip,
            block_num,
            trx_in_block as u32,
            &mut notifications,
        )?;
    }

    // Missed-slot accounting for everyone scheduled between head and here.
    if slot > 1 && !skip.contains(SkipFlags::WITNESS_SCHEDULE_CHECK) {
        for missed_slot in 1..slot {
            let missed = state.get_scheduled_witness(missed_slot);
            if missed != header.witness
                && let Some(witness) = state.witnesses.get_mut(&missed)
            {
                witness.total_missed += 1;
            }
        }
    }

    let id = header.id()?;
    state.dgp.current_aslot += u64::from(slot);
    state.dgp.recent_slots_filled = state
        .dgp
        .recent_slots_filled
        .checked_shl(slot)
        .map_or(1, |shifted| shifted | 1);
    state.dgp.participation_count = state.dgp.recent_slots_filled.count_ones() as u8;

    state.dgp.head_block_number = block_num;
    state.dgp.head_block_id = id;
    state.dgp.time = header.timestamp;
    state.dgp.current_witness = header.witness.clone();
    if let Some(witness) = state.witnesses.get_mut(&header.witness) {
        witness.last_confirmed_block_num = block_num;
    }
    state.dgp.last_irreversible_block_num = state
        .dgp
        .last_irreversible_block_num
        .max(block_num.saturating_sub(IRREVERSIBLE_THRESHOLD));

    state.record_block_id(block_num, id);

    evaluator::process_vesting_withdrawals(state, header.timestamp);

    if block_num >= state.schedule.next_shuffle_block_num {
        state.update_witness_schedule();
    }

    Ok(notifications)
}

/// Applies a single transaction to `state` at chain time `now`.
#[allow(clippy::too_many_arguments)]
fn apply_transaction_to(
    state: &mut State,
    tx: &SignedTransaction,
    now: TimePointSec,
    chain_id: ChainId,
    skip: SkipFlags,
    block_num: u32,
    trx_in_block: u32,
    notifications: &mut Vec<OperationNotification>,
) -> Result<(), ChainError> {
    if !skip.contains(SkipFlags::VALIDATION) {
        tx.trx.validate()?;
    }

    if !skip.contains(SkipFlags::TAPOS_CHECK) {
        state.check_tapos(tx.trx.ref_block_num, tx.trx.ref_block_prefix)?;
    }

    if !skip.contains(SkipFlags::EXPIRATION_CHECK) {
        if tx.trx.expiration < now {
            return Err(ChainError::Expired {
                message: format!("Expired {} against chain time {now}", tx.trx.expiration).into(),
                context: None,
            });
        }
        let horizon = now.saturating_add_secs(MAX_EXPIRATION_SECS);
        if tx.trx.expiration > horizon {
            return Err(ChainError::Expired {
                message: format!(
                    "Expiration {} lies beyond the {MAX_EXPIRATION_SECS}s horizon",
                    tx.trx.expiration
                )
                .into(),
                context: None,
            });
        }
    }

    let id = tx.trx.id()?;
    if !skip.contains(SkipFlags::DUPLICATE_CHECK) && state.transaction_index.contains_key(&id) {
        return Err(ChainError::DuplicateTransaction {
            message: format!("{id} was already applied").into(),
            context: None,
        });
    }

    if !skip.contains(SkipFlags::AUTHORITY_CHECK) {
        let accounts = &state.accounts;
        tx.verify_authority(
            &chain_id,
            |name| accounts.get(name).map(|a| &a.active),
            |name| accounts.get(name).map(|a| &a.owner),
        )?;
    } else if !skip.contains(SkipFlags::TRANSACTION_SIGNATURES) {
        tx.signature_keys(&chain_id)?;
    }

    for (op_in_trx, op) in tx.trx.operations.iter().enumerate() {
        evaluator::apply_operation(state, op, now)?;
        notifications.push(OperationNotification {
            trx_id: id,
            block: block_num,
            trx_in_block,
            op_in_trx: op_in_trx as u32,
            op: op.clone(),
        });
    }

    state.transaction_index.insert(id, (block_num, trx_in_block));
    Ok(())
}
