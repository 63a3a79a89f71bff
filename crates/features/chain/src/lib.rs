//! # Chain
//!
//! The node's single chain: materialized state, operation evaluators, block
//! application and production, the undo machinery behind `pop_block`, and
//! the `block_api` / `database_api` / `network_broadcast_api` surfaces.

pub mod api;
mod chain;
mod error;
pub mod evaluator;
pub mod genesis;
pub mod objects;
mod observer;
mod skip;
pub mod state;

pub use chain::Chain;
pub use error::{ChainError, ChainErrorExt};
pub use genesis::{GenesisState, INITMINER, INITMINER_KEY_SEED, InitialAccount};
pub use observer::{BlockApplied, ChainObserver, OperationNotification, TransactionApplied};
pub use skip::SkipFlags;
pub use state::State;

use stx_kernel::registry::InitializedSlice;
use stx_kernel::rpc::ApiRegistry;

/// Chain feature state registered into the kernel.
#[stx_derive::stx_slice]
pub struct ChainFeature {
    pub chain: Chain,
}

/// Initialize the chain feature: registers the chain's APIs and wraps the
/// handle as a slice.
///
/// # Errors
///
/// Infallible today; kept fallible to match the slice-init contract.
pub fn init(chain: Chain, registry: &ApiRegistry) -> Result<InitializedSlice, ChainError> {
    api::register_apis(registry, &chain);
    tracing::info!("Chain slice initialized");

    let slice = ChainFeature::new(ChainFeatureInner { chain });
    Ok(InitializedSlice::new(slice))
}
