//! The persistent block log of the debug node.
//!
//! Stores the canonical binary encoding of every applied block, one file per
//! block, sharded into fixed-size directories. Appends are atomic (unique
//! temp write + `fsync` + rename) and strictly contiguous: the head marker
//! only advances after the block file is durable, so a crash can never
//! produce a log that claims blocks it does not hold.
//!
//! # Core Features
//!
//! - **Contiguous appends**: the log is the chain; gaps are impossible.
//! - **Atomic writes**: torn block files cannot survive a crash.
//! - **Transparent compression**: optional LZ4, invisible to the consumer.
//! - **Read cache**: recently fetched payloads served from memory.
//! - **Self-healing**: orphaned temp files are swept on open.
//!
//! # Example
//!
//! ```rust
//! use stx_blockstore::{BlockStore, Compression, BlockStoreError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BlockStoreError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("blocks");
//!     let store = BlockStore::builder()
//!         .root(&root)
//!         .compression(Compression::Lz4)
//!         .connect()
//!         .await?;
//!
//!     store.append(1, b"encoded block").await?;
//!     assert_eq!(store.read(1).await?.as_slice(), b"encoded block");
//!     Ok(())
//! }
//! ```

mod builder;
mod error;
mod layout;
mod maintenance;
mod store;

pub use builder::BlockStoreBuilder;
pub use error::{BlockStoreError, BlockStoreErrorExt};
pub use store::{BlockStore, Compression};
