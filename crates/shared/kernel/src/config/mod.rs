use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Custom error type for config loading.
#[stx_derive::stx_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// A reusable configuration loader that combines file-based settings with environment overrides.
///
/// This function implements a layered configuration strategy:
/// 1. **Base File**: Loads settings from a file (e.g., `node.toml`). If no path is provided, it defaults to `"node"`.
/// 2. **Environment Overrides**: Overlays values from environment variables prefixed with `STX__`.
///    Nested structures are accessed using double underscores (e.g., `STX__SERVER__PORT` maps to `server.port`).
///
/// # Errors
/// This function will return an error if:
/// * The specified (or default) configuration file cannot be found.
/// * The content of the file does not match the structure of type `T`.
///
/// # Example
/// ```rust
/// use stx_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// let cfg: AppConfig = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path = path.map_or_else(|| PathBuf::from("node"), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(true))
        .add_source(
            Environment::with_prefix("STX")
                .separator("__")
                .convert_case(config::Case::Snake),  // Env var overrides (e.g., STX__SERVER__PORT)
        );

    info!("Loading config from {}", effective_path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

/// Top-level node configuration shared across subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfigInner {
    pub server: ServerConfig,
    pub chain: ChainSettings,
    pub witness: WitnessSettings,
    pub debug: DebugSettings,
    pub tokens: TokenSettings,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(flatten, default)]
    inner: Arc<NodeConfigInner>,
}

impl Deref for NodeConfig {
    type Target = NodeConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for NodeConfig {
    fn deref_mut(&mut self) -> &mut NodeConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub ssl: Option<SslConfig>,
}

/// TLS certificate/key paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Chain state and block log settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Directory holding the block log (and, later, other node data).
    pub data_dir: PathBuf,
    /// Optional path to a genesis file; absent means the built-in private net.
    pub genesis: Option<PathBuf>,
    /// LZ4-compress block log payloads.
    pub compression: bool,
    /// How many recent blocks stay reachable for `pop_block`.
    pub undo_limit: usize,
}

/// Block production settings (original witness plugin options).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WitnessSettings {
    /// Spawn the production loop at startup.
    pub enabled: bool,
    /// Accounts this node produces for.
    pub witnesses: Vec<String>,
    /// Inline hex signing seeds. Development convenience only.
    pub private_keys: Vec<String>,
    /// Sealed key file holding production seeds.
    pub keystore: Option<KeystoreSettings>,
    /// Minimum observed participation before producing, in percent.
    pub required_participation: u32,
    /// Produce even when the chain looks stale (fresh private nets).
    pub enable_stale_production: bool,
}

/// Where to find the sealed key file and its passphrase.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeystoreSettings {
    pub path: PathBuf,
    /// Environment variable the passphrase is read from.
    pub passphrase_env: String,
}

/// Debug API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Register the debug API. The point of this node, on by default.
    pub enabled: bool,
    /// Hex seed the debug generator signs with; defaults to the initminer key.
    pub debug_key: Option<String>,
}

/// Custom tokens settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// The `custom_json` app id the token index listens on.
    pub app_id: u64,
}

// --- Default ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9193, ssl: None }
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { cert: PathBuf::from("cert.pem"), key: PathBuf::from("key.pem") }
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            genesis: None,
            compression: true,
            undo_limit: 64,
        }
    }
}

impl Default for WitnessSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            witnesses: Vec::new(),
            private_keys: Vec::new(),
            keystore: None,
            required_participation: 33,
            enable_stale_production: false,
        }
    }
}

impl Default for KeystoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("keys.seal"),
            passphrase_env: "STX_KEYSTORE_PASSPHRASE".to_owned(),
        }
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self { enabled: true, debug_key: None }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self { app_id: 2 }
    }
}
