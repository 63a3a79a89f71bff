//! # Kernel
//!
//! The shared plumbing every feature slice builds on: layered configuration
//! loading, the JSON-RPC method registry and dispatch core, the type-erased
//! slice registry, and the Axum state/router glue for the node's endpoint.
//!
//! Business logic does not live here; the kernel only composes it.

pub mod config;
pub mod registry;
pub mod rpc;
pub mod server;

/// Convenience imports for feature crates.
pub mod prelude {
    pub use crate::config::NodeConfig;
    pub use crate::registry::{FeatureSlice, InitializedSlice};
    pub use crate::rpc::{ApiError, ApiRegistry, VoidArgs};
    pub use crate::server::ApiState;
}
