//! Encrypted signing-key storage for the debug node.
//!
//! The witness plugin and the debug API need raw Ed25519 seeds at runtime,
//! but those seeds should never sit on disk in the clear. This crate seals a
//! name→seed map into a single file: AES-256-GCM over a postcard payload,
//! with the file key derived from a passphrase via HKDF-SHA256 and a random
//! per-file salt. Seeds are zeroized when dropped.
//!
//! See [`Keystore`] for the full API.

mod error;
mod store;

pub use error::{KeystoreError, KeystoreErrorExt};
pub use store::{Keystore, KeystoreBuilder, SecretSeed};
