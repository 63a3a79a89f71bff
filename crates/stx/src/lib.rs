//! Facade crate for the debug node's features and shared modules.
//! Re-exports protocol/kernel primitives and aggregates feature initialization.
//! Keep this crate thin: it should compose other crates, not implement chain logic.
//!
//! ## Usage
//! - Open a [`chain::Chain`] against a block log.
//! - Call [`init`] to register every feature slice and its API methods.

pub use stx_chain as chain;
pub use stx_event_bus as events;
pub use stx_kernel as kernel;
pub use stx_protocol as protocol;

use stx_chain::Chain;
use stx_kernel::config::NodeConfig;
use stx_kernel::registry::InitializedSlice;
use stx_kernel::rpc::ApiRegistry;

/// Feature registry for runtime introspection.
pub mod features {
    pub use stx_account_history as account_history;
    pub use stx_custom_tokens as custom_tokens;
    pub use stx_debug as debug;
    pub use stx_witness as witness;

    /// Features this build carries.
    pub const ENABLED: &[&str] =
        &["chain", "account_history", "custom_tokens", "debug", "witness"];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

/// Initialize all features against the opened chain.
///
/// Every feature registers its API methods on `registry` and, where it
/// indexes the chain, hooks itself in as an observer. The debug API honors
/// `debug.enabled`; the witness loop honors `witness.enabled`.
///
/// # Errors
/// Returns an error if any feature initialization fails.
pub async fn init(
    config: &NodeConfig,
    chain: &Chain,
    registry: &ApiRegistry,
) -> Result<Vec<InitializedSlice>, Box<dyn std::error::Error + Send + Sync>> {
    let mut slices = Vec::new();

    // Chain (block_api / database_api / network_broadcast_api)
    slices.push(stx_chain::init(chain.clone(), registry)?);

    // Account history
    slices.push(features::account_history::init(chain, registry)?);

    // Custom tokens
    slices.push(features::custom_tokens::init(config, chain, registry)?);

    // Debug node (the point of this binary; off only when explicitly disabled)
    if config.debug.enabled {
        slices.push(features::debug::init(config, chain.clone(), registry)?);
    } else {
        tracing::info!("Debug API disabled by configuration");
    }

    // Witness production
    slices.push(features::witness::init(config, chain.clone()).await?);

    Ok(slices)
}
