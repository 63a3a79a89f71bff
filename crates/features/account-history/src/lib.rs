//! # Account History
//!
//! A per-account index of every applied operation, with the classic
//! `get_account_history` window queries and transaction lookup by id.

pub mod api;
mod error;
mod index;

pub use error::{HistoryError, HistoryErrorExt};
pub use index::{AppliedOperation, HistoryIndex, impacted_accounts};

use std::sync::Arc;
use stx_chain::Chain;
use stx_kernel::registry::InitializedSlice;
use stx_kernel::rpc::ApiRegistry;

/// Account history feature state.
#[stx_derive::stx_slice]
pub struct AccountHistory {
    pub index: Arc<HistoryIndex>,
}

/// Initialize the account history feature: hooks the index into the chain
/// and registers its API.
///
/// # Errors
///
/// Infallible today; kept fallible to match the slice-init contract.
pub fn init(chain: &Chain, registry: &ApiRegistry) -> Result<InitializedSlice, HistoryError> {
    let index = Arc::new(HistoryIndex::new());

    chain.add_observer(index.clone());
    api::register_api(registry, &index, chain);
    tracing::info!("Account history slice initialized");

    let slice = AccountHistory::new(AccountHistoryInner { index });
    Ok(InitializedSlice::new(slice))
}
