//! The chain's JSON-RPC surface: `block_api`, `database_api`, and
//! `network_broadcast_api`.

use crate::chain::Chain;
use crate::objects::{
    AccountObject, DynamicGlobalProperties, HardforkState, WitnessObject, WitnessSchedule,
};
use crate::skip::SkipFlags;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stx_event_bus::EventBusError;
use stx_kernel::rpc::{ApiError, ApiRegistry, VoidArgs};
use stx_protocol::block::BlockHeader;
use stx_protocol::{AccountName, SignedBlock, SignedTransaction, TimePointSec, TransactionId};
use tracing::warn;

/// How long a synchronous broadcast waits for its confirmation.
const BROADCAST_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

fn execution_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::Execution { message: e.to_string().into(), context: None }
}

// --- block_api ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetBlockHeaderArgs {
    pub block_num: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlockHeaderReturn {
    pub header: Option<BlockHeader>,
}

pub type GetBlockArgs = GetBlockHeaderArgs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlockReturn {
    pub block: Option<SignedBlock>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GetAverageBlockSizeReturn {
    pub average_block_size: u64,
}

// --- database_api ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountsArgs {
    pub accounts: Vec<AccountName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountsReturn {
    pub accounts: Vec<AccountObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWitnessesArgs {
    pub witnesses: Vec<AccountName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWitnessesReturn {
    pub witnesses: Vec<WitnessObject>,
}

// --- network_broadcast_api ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastTransactionArgs {
    pub trx: SignedTransaction,
    #[serde(default = "default_max_block_age")]
    pub max_block_age: i32,
}

const fn default_max_block_age() -> i32 {
    -1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BroadcastTransactionReturn {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastTransactionSynchronousReturn {
    pub id: TransactionId,
    pub block_num: u32,
    pub trx_num: u32,
    pub expired: bool,
}

/// Fails when the head block is older than the client tolerates.
fn check_max_block_age(chain: &Chain, max_block_age: i32) -> Result<(), ApiError> {
    if max_block_age < 0 {
        return Ok(());
    }
    let head_time = chain.head_block_time();
    let now = TimePointSec::now();
    if now.secs_since(head_time) > max_block_age.unsigned_abs() {
        return Err(ApiError::Execution {
            message: format!(
                "Head block is older than the requested maximum age of {max_block_age}s"
            )
            .into(),
            context: None,
        });
    }
    Ok(())
}

/// Registers the chain's three APIs on the method table.
pub fn register_apis(registry: &ApiRegistry, chain: &Chain) {
    register_block_api(registry, chain);
    register_database_api(registry, chain);
    register_network_broadcast_api(registry, chain);
}

fn register_block_api(registry: &ApiRegistry, chain: &Chain) {
    let api = "block_api";

    let for_header = chain.clone();
    registry.register_async(api, "get_block_header", move |args: GetBlockHeaderArgs| {
        let chain = for_header.clone();
        async move {
            let block = fetch_block(&chain, args.block_num).await?;
            Ok(GetBlockHeaderReturn { header: block.map(|b| b.header) })
        }
    });

    let for_block = chain.clone();
    registry.register_async(api, "get_block", move |args: GetBlockArgs| {
        let chain = for_block.clone();
        async move {
            let block = fetch_block(&chain, args.block_num).await?;
            Ok(GetBlockReturn { block })
        }
    });

    let for_average = chain.clone();
    registry.register_async(api, "get_average_block_size", move |_: VoidArgs| {
        let chain = for_average.clone();
        async move {
            let head = chain.head_block_num();
            let stop = head.saturating_sub(1000);
            let mut total: u64 = 0;
            for num in (stop + 1)..=head {
                let size = chain.store().payload_size(num).await.map_err(execution_error)?;
                total += size as u64;
            }
            let window = u64::from((head - stop).max(1));
            Ok(GetAverageBlockSizeReturn { average_block_size: total / window })
        }
    });
}

async fn fetch_block(chain: &Chain, block_num: u32) -> Result<Option<SignedBlock>, ApiError> {
    if block_num == 0 || block_num > chain.head_block_num() {
        return Ok(None);
    }
    let payload = chain.store().read(block_num).await.map_err(execution_error)?;
    let block: SignedBlock = postcard::from_bytes(&payload).map_err(execution_error)?;
    Ok(Some(block))
}

fn register_database_api(registry: &ApiRegistry, chain: &Chain) {
    let api = "database_api";

    let for_dgp = chain.clone();
    registry.register(api, "get_dynamic_global_properties", move |_: VoidArgs| {
        Ok::<DynamicGlobalProperties, ApiError>(for_dgp.with_state(|state| state.dgp.clone()))
    });

    let for_accounts = chain.clone();
    registry.register(api, "get_accounts", move |args: GetAccountsArgs| {
        let accounts = for_accounts.with_state(|state| {
            args.accounts
                .iter()
                .filter_map(|name| state.accounts.get(name).cloned())
                .collect::<Vec<_>>()
        });
        Ok::<_, ApiError>(GetAccountsReturn { accounts })
    });

    let for_witnesses = chain.clone();
    registry.register(api, "get_witnesses", move |args: GetWitnessesArgs| {
        let witnesses = for_witnesses.with_state(|state| {
            args.witnesses
                .iter()
                .filter_map(|name| state.witnesses.get(name).cloned())
                .collect::<Vec<_>>()
        });
        Ok::<_, ApiError>(GetWitnessesReturn { witnesses })
    });

    let for_schedule = chain.clone();
    registry.register(api, "get_witness_schedule", move |_: VoidArgs| {
        Ok::<WitnessSchedule, ApiError>(for_schedule.with_state(|state| state.schedule.clone()))
    });

    let for_hardforks = chain.clone();
    registry.register(api, "get_hardfork_properties", move |_: VoidArgs| {
        Ok::<HardforkState, ApiError>(for_hardforks.with_state(|state| state.hardforks.clone()))
    });
}

fn register_network_broadcast_api(registry: &ApiRegistry, chain: &Chain) {
    let api = "network_broadcast_api";

    let for_async = chain.clone();
    registry.register(api, "broadcast_transaction", move |args: BroadcastTransactionArgs| {
        check_max_block_age(&for_async, args.max_block_age)?;
        for_async
            .push_transaction(args.trx, SkipFlags::empty())
            .map_err(execution_error)?;
        Ok(BroadcastTransactionReturn {})
    });

    let for_sync = chain.clone();
    registry.register_async(
        api,
        "broadcast_transaction_synchronous",
        move |args: BroadcastTransactionArgs| {
            let chain = for_sync.clone();
            async move { broadcast_synchronous(&chain, args).await }
        },
    );
}

/// Pushes the transaction and waits for its inclusion event, like the
/// confirmation-callback flow of the original broadcast API.
async fn broadcast_synchronous(
    chain: &Chain,
    args: BroadcastTransactionArgs,
) -> Result<BroadcastTransactionSynchronousReturn, ApiError> {
    use crate::observer::TransactionApplied;

    check_max_block_age(chain, args.max_block_age)?;

    // Subscribe before pushing so the confirmation cannot race past us.
    let mut confirmations = chain
        .events()
        .subscribe::<TransactionApplied>()
        .map_err(|e: EventBusError| execution_error(e))?;

    let id = chain.push_transaction(args.trx, SkipFlags::empty()).map_err(execution_error)?;

    let wait = async {
        loop {
            match confirmations.recv().await {
                Ok(event) if event.id == id => {
                    return Some((event.block_num, event.trx_num));
                },
                Ok(_) => {},
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Confirmation stream lagged");
                },
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    };

    match tokio::time::timeout(BROADCAST_CONFIRMATION_TIMEOUT, wait).await {
        Ok(Some((block_num, trx_num))) => {
            Ok(BroadcastTransactionSynchronousReturn { id, block_num, trx_num, expired: false })
        },
        _ => Ok(BroadcastTransactionSynchronousReturn {
            id,
            block_num: 0,
            trx_num: 0,
            expired: true,
        }),
    }
}
