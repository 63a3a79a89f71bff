//! # SophiaTX Debug Node
//!
//! A wrapper for launching and interacting with a SophiaTX debug node: a
//! single-process, sandboxed chain with its APIs on a JSON-RPC/HTTP
//! endpoint.
//!
//! ## Example
//! ```no_run
//! use stx_node::Node;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Node::builder()
//!         .port(9193)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

mod router;

use anyhow::{Context, Result, anyhow};
use axum_server::Handle;
use std::net::SocketAddr;
use stx::chain::{Chain, GenesisState};
use stx::kernel::config::NodeConfig;
use stx::kernel::rpc::ApiRegistry;
use stx::kernel::server::ApiState;
use stx_blockstore::{BlockStore, Compression};
use stx_event_bus::EventBus;
use tokio::signal;
use tracing::{error, info};

/// A fluent builder for configuring and initializing the [`Node`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct NodeBuilder {
    cfg: NodeConfig,
}

impl NodeBuilder {
    /// Set up the node's configuration.
    pub fn config(mut self, cfg: NodeConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    async fn init_blockstore(&self) -> Result<BlockStore> {
        let compression =
            if self.cfg.chain.compression { Compression::Lz4 } else { Compression::None };
        BlockStore::builder()
            .root(self.cfg.chain.data_dir.join("blocks"))
            .compression(compression)
            .connect()
            .await
            .context("Failed to open the block log")
    }

    fn load_genesis(&self) -> Result<GenesisState> {
        match &self.cfg.chain.genesis {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .context(format!("Failed to read genesis file: {}", path.display()))?;
                let genesis: GenesisState = serde_json::from_str(&raw)
                    .context(format!("Malformed genesis file: {}", path.display()))?;
                info!(path = %path.display(), "Loaded genesis file");
                Ok(genesis)
            },
            None => {
                info!("Using the built-in private-net genesis");
                Ok(GenesisState::default())
            },
        }
    }

    fn validate_ssl_config(&self) -> Result<()> {
        if let Some(ssl) = &self.cfg.server.ssl {
            if !ssl.cert.exists() {
                anyhow::bail!("SSL certificate not found at: {}", ssl.cert.display());
            }
            if !ssl.key.exists() {
                anyhow::bail!("SSL key not found at: {}", ssl.key.display());
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let metadata = ssl.key.metadata()?;
                if metadata.permissions().mode() & 0o077 != 0 {
                    tracing::warn!(
                        "SECURITY: SSL Private Key {} has insecure permissions (should be 600)",
                        ssl.key.display()
                    );
                }
            }
        }
        Ok(())
    }

    /// Consumes the builder and initializes the node.
    ///
    /// # Process
    /// 1. Validates the TLS configuration, if any
    /// 2. Opens the block log and loads (or defaults) the genesis
    /// 3. Opens the chain, replaying the log
    /// 4. Initializes the event bus and every feature slice
    /// 5. Constructs the shared API state
    ///
    /// # Errors
    /// Returns an error if:
    /// * The block log cannot be opened or fails to replay
    /// * The genesis file is missing or malformed
    /// * A feature slice fails to initialize
    pub async fn build(self) -> Result<Node> {
        self.validate_ssl_config()?;

        let address = SocketAddr::new(self.cfg.server.address, self.cfg.server.port);
        info!(address = %address, "Initializing node");

        let store = self.init_blockstore().await?;
        let genesis = self.load_genesis()?;

        let events = EventBus::new();
        let chain = Chain::open(genesis, store, events.clone(), self.cfg.chain.undo_limit)
            .await
            .context("Failed to open the chain")?;

        let registry = ApiRegistry::new();
        let slices = stx::init(&self.cfg, &chain, &registry)
            .await
            .map_err(|e| anyhow!("Node bootstrap failed: {e}"))?;

        let state = slices
            .into_iter()
            .fold(
                ApiState::builder().config(self.cfg).events(events).registry(registry),
                |builder, slice| builder.register_slice(slice),
            )
            .build()
            .context("Failed to finalize API state registry")?;

        Ok(Node { state })
    }
}

/// A fully initialized debug node ready to serve.
///
/// This struct is returned by [`NodeBuilder::build`] and contains
/// all necessary runtime state.
#[must_use = "call .run().await to start the node"]
#[derive(Debug)]
pub struct Node {
    state: ApiState,
}

impl Node {
    /// Returns a new [`NodeBuilder`] to configure the node.
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Shared API state, for embedding the node in tests and tooling.
    #[must_use]
    pub fn state(&self) -> &ApiState {
        &self.state
    }

    /// Starts the endpoint and runs until the shutdown signal is received.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured address
    /// or if TLS setup fails.
    pub async fn run(self) -> Result<()> {
        let cfg = self.state.config.clone();
        let address = SocketAddr::new(cfg.server.address, cfg.server.port);

        info!(
            address = %address,
            ssl = cfg.server.ssl.is_some(),
            methods = self.state.registry.method_names().len(),
            "Starting node endpoint"
        );

        let app = router::init(self.state);

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();

        // Spawn shutdown signal listener
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(30)));
        });

        if let Some(ssl_config) = &cfg.server.ssl {
            info!("Starting HTTPS endpoint on https://{address}");

            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                &ssl_config.cert,
                &ssl_config.key,
            )
            .await
            .context("Failed to load SSL/TLS certificates")?;

            axum_server::bind_rustls(address, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS endpoint failed")?;
        } else {
            info!("Starting HTTP endpoint on http://{address}");

            axum_server::bind(address)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTP endpoint failed")?;
        }

        info!("Node stopped");
        Ok(())
    }
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = ctrl_c => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await
    }
}
