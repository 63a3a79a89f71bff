//! # Debug
//!
//! The debug-node feature: deterministic on-demand block generation, block
//! pushing/popping, hardfork fast-forwarding, and direct state editing.
//! Everything a wrapper needs to drive a sandboxed chain through arbitrary
//! scenarios, exposed as `debug_node_api`.

pub mod api;
mod error;
mod node;

pub use error::{DebugError, DebugErrorExt};
pub use node::DebugNode;

use stx_chain::{Chain, INITMINER_KEY_SEED};
use stx_kernel::config::NodeConfig;
use stx_kernel::registry::InitializedSlice;
use stx_kernel::rpc::ApiRegistry;
use stx_protocol::PrivateKey;

/// Debug feature state.
#[stx_derive::stx_slice]
pub struct Debug {
    pub node: DebugNode,
}

/// Initialize the debug feature and register its API.
///
/// The generation key defaults to the built-in private-net initminer key and
/// can be overridden with `debug.debug_key` (a hex seed).
///
/// # Errors
///
/// Returns [`DebugError::Configuration`] for an unparsable debug key.
pub fn init(
    cfg: &NodeConfig,
    chain: Chain,
    registry: &ApiRegistry,
) -> Result<InitializedSlice, DebugError> {
    let debug_key = match &cfg.debug.debug_key {
        Some(seed) => PrivateKey::from_hex(seed).map_err(|e| DebugError::Configuration {
            message: format!("debug.debug_key: {e}").into(),
            context: None,
        })?,
        None => PrivateKey::regenerate(INITMINER_KEY_SEED),
    };

    let node = DebugNode::new(chain, debug_key);
    api::register_api(registry, &node);
    tracing::info!("Debug slice initialized");

    let slice = Debug::new(DebugInner { node });
    Ok(InitializedSlice::new(slice))
}
