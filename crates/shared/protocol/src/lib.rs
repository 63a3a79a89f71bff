//! # Protocol
//!
//! The pure domain of the chain: validated names, fixed-point assets,
//! operations with their authority contracts, signed transactions, and
//! blocks. No I/O and no chain state: just data, validation, and signing.
//!
//! The canonical binary encoding everywhere (digests, block log payloads,
//! signing) is postcard; human-readable serializers see string forms
//! (`"1.000000 SPHTX"`, `STX`-prefixed keys, ISO timestamps).

pub mod asset;
pub mod authority;
pub mod block;
pub mod config;
mod crypto;
mod error;
pub mod operations;
pub mod transaction;
pub mod types;
pub mod version;

pub use asset::{Asset, AssetSymbol, SPHTX_SYMBOL, VESTS_SYMBOL};
pub use authority::Authority;
pub use block::{BlockHeader, SignedBlock};
pub use crypto::{PUBLIC_KEY_PREFIX, PrivateKey, PublicKey, Signature};
pub use error::{ProtocolError, ProtocolErrorExt};
pub use operations::Operation;
pub use transaction::{SignedTransaction, Transaction, TransactionSignature};
pub use types::{
    AccountName, BlockId, ChainId, Digest, TimePointSec, TransactionId, derive_account_name,
};
pub use version::{HardforkVersion, Version};
