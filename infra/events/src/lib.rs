//! # Event Bus
//!
//! A type-safe, asynchronous event bus connecting the chain to the feature
//! slices that observe it.
//!
//! ## Overview
//!
//! Provides a centralized `EventBus` with multiple channel kinds (`broadcast`,
//! `mpsc`, `watch`). The chain publishes applied blocks and transaction
//! confirmations; slices such as the broadcast API subscribe without holding
//! a direct reference to the chain.
//!
//! # Example
//!
//! ```rust
//! use stx_event_bus::{EventBus, EventReceiverExt, ChannelKind, EventBusError};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct BlockApplied { num: u32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!
//!     // Default broadcast channel.
//!     let mut rx = bus.subscribe::<BlockApplied>()?;
//!     bus.publish(BlockApplied { num: 42 })?;
//!
//!     if let Ok(event) = rx.recv().await {
//!         assert_eq!(event.num, 42);
//!     }
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{ChannelKind, Event, EventBus};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
