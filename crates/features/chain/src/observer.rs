//! Synchronous chain observers and the async bus events.
//!
//! Observers see every applied operation and block in application order,
//! before the corresponding bus events go out. Index-building slices
//! (account history, custom tokens) implement [`ChainObserver`]; anything
//! that only needs eventual notification subscribes to the bus instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stx_protocol::{Operation, SignedBlock, TransactionId};

/// Context delivered alongside every applied operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationNotification {
    pub trx_id: TransactionId,
    pub block: u32,
    pub trx_in_block: u32,
    pub op_in_trx: u32,
    pub op: Operation,
}

/// A synchronous observer of chain application.
///
/// Callbacks run outside the state lock, after a block has fully applied
/// (or been popped); reading the chain from inside a callback is safe.
pub trait ChainObserver: Send + Sync {
    /// An operation inside an applied block.
    fn on_operation(&self, _note: &OperationNotification) {}

    /// A block finished applying.
    fn on_block_applied(&self, _block: &SignedBlock) {}

    /// A block was popped; indexes derived from it must roll back.
    fn on_block_removed(&self, _block: &SignedBlock) {}
}

/// Bus event: a block was applied to the chain.
#[derive(Debug, Clone)]
pub struct BlockApplied {
    pub block: Arc<SignedBlock>,
}

/// Bus event: a transaction landed in a block.
#[derive(Debug, Clone, Copy)]
pub struct TransactionApplied {
    pub id: TransactionId,
    pub block_num: u32,
    pub trx_num: u32,
}
