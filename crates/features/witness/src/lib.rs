//! # Witness
//!
//! Scheduled block production. Loads this node's witness names and signing
//! keys (inline dev seeds and/or the sealed keystore), then runs the
//! production loop against the chain.

mod error;
pub mod production;

pub use error::{WitnessError, WitnessErrorExt};
pub use production::{BlockProductionCondition, ProductionParams, maybe_produce_block};

use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use stx_chain::Chain;
use stx_kernel::config::{NodeConfig, WitnessSettings};
use stx_kernel::registry::InitializedSlice;
use stx_protocol::{AccountName, PrivateKey, PublicKey};
use tokio::task::JoinHandle;
use tracing::info;

/// Witness feature state.
#[stx_derive::stx_slice]
pub struct Witness {
    pub chain: Chain,
    pub params: ProductionParams,
    pub task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Witness {
    /// Stops the production loop, if one is running.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Block production loop stopped");
        }
    }
}

/// Initialize the witness feature.
///
/// Signing keys come from the inline `private_keys` seeds and, when
/// configured, the sealed keystore (passphrase read from the configured
/// environment variable). The production loop is spawned only when the
/// feature is enabled and at least one witness/key pair is usable.
///
/// # Errors
///
/// Returns [`WitnessError::Configuration`] for unparsable names or seeds and
/// [`WitnessError::Keystore`] when the key file cannot be unsealed.
pub async fn init(cfg: &NodeConfig, chain: Chain) -> Result<InitializedSlice, WitnessError> {
    let params = load_params(&cfg.witness).await?;

    let task = if cfg.witness.enabled && !params.witnesses.is_empty() {
        if params.keys.is_empty() {
            return Err(WitnessError::Configuration {
                message: "Witness production enabled but no signing keys are loaded".into(),
                context: None,
            });
        }
        info!(
            witnesses = params.witnesses.len(),
            keys = params.keys.len(),
            "Launching block production loop"
        );
        Some(tokio::spawn(production::production_loop(chain.clone(), params.clone())))
    } else {
        None
    };

    let slice = Witness::new(WitnessInner { chain, params, task: Arc::new(Mutex::new(task)) });
    tracing::info!("Witness slice initialized");
    Ok(InitializedSlice::new(slice))
}

async fn load_params(settings: &WitnessSettings) -> Result<ProductionParams, WitnessError> {
    let mut witnesses = BTreeSet::new();
    for name in &settings.witnesses {
        let parsed: AccountName = name.parse().map_err(|e| WitnessError::Configuration {
            message: format!("Witness name '{name}': {e}").into(),
            context: None,
        })?;
        witnesses.insert(parsed);
    }

    let mut keys: FxHashMap<PublicKey, PrivateKey> = FxHashMap::default();
    for seed in &settings.private_keys {
        let key = PrivateKey::from_hex(seed).map_err(|e| WitnessError::Configuration {
            message: format!("Inline signing seed: {e}").into(),
            context: None,
        })?;
        keys.insert(key.public_key(), key);
    }

    if let Some(keystore_cfg) = &settings.keystore {
        let passphrase = std::env::var(&keystore_cfg.passphrase_env).map_err(|_| {
            WitnessError::Configuration {
                message: format!(
                    "Keystore passphrase variable '{}' is not set",
                    keystore_cfg.passphrase_env
                )
                .into(),
                context: None,
            }
        })?;

        let keystore = stx_keystore::Keystore::builder()
            .path(&keystore_cfg.path)
            .passphrase(passphrase)
            .open()
            .await?;

        let names: Vec<String> = keystore.names().map(str::to_owned).collect();
        for name in names {
            if let Some(seed) = keystore.get(&name) {
                let key = PrivateKey::from_seed(seed.0);
                keys.insert(key.public_key(), key);
            }
        }
        info!(path = %keystore_cfg.path.display(), "Loaded signing keys from keystore");
    }

    Ok(ProductionParams {
        witnesses,
        keys,
        required_participation: settings.required_participation,
        enable_stale_production: settings.enable_stale_production,
    })
}
