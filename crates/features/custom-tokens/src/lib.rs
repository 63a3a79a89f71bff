//! # Custom Tokens
//!
//! An off-consensus token system riding on `custom_json` operations: token
//! creation, issuance, pausing, transfers, and burns on a configured app id,
//! with rejected actions recorded per transaction for inspection.

pub mod api;
mod error;
mod index;

pub use error::{TokenFeatureError, TokenFeatureErrorExt};
pub use index::{
    CustomTokenObject, TokenAction, TokenBalance, TokenError, TokenIndex, TokenOperationRecord,
};

use std::sync::Arc;
use stx_chain::Chain;
use stx_kernel::config::NodeConfig;
use stx_kernel::registry::InitializedSlice;
use stx_kernel::rpc::ApiRegistry;

/// Custom tokens feature state.
#[stx_derive::stx_slice]
pub struct CustomTokens {
    pub index: Arc<TokenIndex>,
}

/// Initialize the custom tokens feature: hooks the index into the chain and
/// registers its API.
///
/// # Errors
///
/// Infallible today; kept fallible to match the slice-init contract.
pub fn init(
    cfg: &NodeConfig,
    chain: &Chain,
    registry: &ApiRegistry,
) -> Result<InitializedSlice, TokenFeatureError> {
    let index = Arc::new(TokenIndex::new(cfg.tokens.app_id));

    chain.add_observer(index.clone());
    api::register_api(registry, &index);
    tracing::info!(app_id = cfg.tokens.app_id, "Custom tokens slice initialized");

    let slice = CustomTokens::new(CustomTokensInner { index });
    Ok(InitializedSlice::new(slice))
}
