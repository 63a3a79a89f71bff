//! The `account_history_api` query surface.

use crate::index::{AppliedOperation, HistoryIndex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stx_chain::Chain;
use stx_kernel::rpc::{ApiError, ApiRegistry};
use stx_protocol::{AccountName, SignedBlock, SignedTransaction, TransactionId};

/// The original API refuses windows larger than this.
const MAX_HISTORY_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountHistoryArgs {
    pub account: AccountName,
    /// `-1` means the newest entry.
    #[serde(default = "default_start")]
    pub start: i64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_start() -> i64 {
    -1
}

const fn default_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountHistoryReturn {
    pub history: Vec<(u64, AppliedOperation)>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetTransactionArgs {
    pub id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransactionReturn {
    pub trx: SignedTransaction,
    pub block_num: u32,
    pub transaction_num: u32,
}

/// Registers the `account_history_api` methods.
pub fn register_api(registry: &ApiRegistry, index: &Arc<HistoryIndex>, chain: &Chain) {
    let api = "account_history_api";

    let for_history = index.clone();
    registry.register(api, "get_account_history", move |args: GetAccountHistoryArgs| {
        if args.limit == 0 || args.limit > MAX_HISTORY_LIMIT {
            return Err(ApiError::InvalidParams {
                message: format!("limit must be 1..={MAX_HISTORY_LIMIT}").into(),
                context: None,
            });
        }
        Ok(GetAccountHistoryReturn {
            history: for_history.account_window(&args.account, args.start, args.limit),
        })
    });

    let for_trx = chain.clone();
    registry.register_async(api, "get_transaction", move |args: GetTransactionArgs| {
        let chain = for_trx.clone();
        async move { get_transaction(&chain, args.id).await }
    });
}

/// Resolves a transaction id to the stored transaction via the chain's index.
async fn get_transaction(chain: &Chain, id: TransactionId) -> Result<GetTransactionReturn, ApiError> {
    let location = chain.with_state(|state| state.transaction_index.get(&id).copied());
    let Some((block_num, trx_num)) = location else {
        return Err(ApiError::NotFound {
            message: format!("Unknown transaction {id}").into(),
            context: None,
        });
    };

    let payload = chain.store().read(block_num).await.map_err(|e| ApiError::Execution {
        message: e.to_string().into(),
        context: None,
    })?;
    let block: SignedBlock = postcard::from_bytes(&payload).map_err(|e| ApiError::Internal {
        message: e.to_string().into(),
        context: None,
    })?;

    let trx = block.transactions.get(trx_num as usize).cloned().ok_or_else(|| {
        ApiError::Internal {
            message: format!("Transaction index points past block {block_num}").into(),
            context: None,
        }
    })?;

    Ok(GetTransactionReturn { trx, block_num, transaction_num: trx_num })
}
