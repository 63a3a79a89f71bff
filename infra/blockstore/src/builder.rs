use crate::error::{BlockStoreError, BlockStoreErrorExt};
use crate::layout;
use crate::store::{BlockStore, BlockStoreInner, Compression};
use moka::sync::Cache;
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64};
use tokio::fs;
use tracing::info;

/// Default number of decoded block payloads kept in the read cache.
const DEFAULT_CACHE_CAPACITY: u64 = 256;

#[derive(Debug, Clone)]
struct BlockStoreConfig {
    compression: Compression,
    create: bool,
    cache_capacity: u64,
}

impl Default for BlockStoreConfig {
    fn default() -> Self {
        Self { compression: Compression::None, create: true, cache_capacity: DEFAULT_CACHE_CAPACITY }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct BlockStoreBuilder<S: Sealed = NoRoot> {
    state: S,
    config: BlockStoreConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> BlockStoreBuilder<S> {
    #[must_use = "Sets compression for the block log"]
    pub const fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    #[must_use = "Sets whether the block log root should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    #[must_use = "Sets the read cache capacity in blocks"]
    pub const fn cache_capacity(mut self, capacity: u64) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> BlockStoreBuilder<N> {
        BlockStoreBuilder { state, config: self.config }
    }
}

impl BlockStoreBuilder<NoRoot> {
    #[must_use = "Creates a new block store builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the root directory path for the block log"]
    pub fn root(self, path: impl Into<PathBuf>) -> BlockStoreBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl BlockStoreBuilder<WithRoot> {
    /// Consumes the configuration and opens the block log.
    ///
    /// Boot sequence:
    /// 1. **Bootstrapping**: Creates the root directory if `create(true)` was set.
    /// 2. **Canonicalization**: Resolves the root to an absolute, physical path.
    /// 3. **Head recovery**: Reads the head marker; an absent marker means an
    ///    empty log.
    /// 4. **Self-Healing**: Removes orphaned temp files left behind by crashes.
    ///
    /// The self-healing routine is non-critical; if cleanup fails the
    /// initialization still proceeds with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`BlockStoreError::Io`] if the root cannot be created or
    /// resolved, and [`BlockStoreError::Corrupted`] if the head marker exists
    /// but cannot be parsed.
    pub async fn connect(self) -> Result<BlockStore, BlockStoreError> {
        let root = &self.state.0;

        if self.config.create {
            fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap block log root: {}", root.display()))?;
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve block log root: {}", root.display()))?;

        let head = read_head(&canonical).await?;

        let store = BlockStore {
            inner: Arc::new(BlockStoreInner {
                root: canonical,
                compression: self.config.compression,
                head: AtomicU32::new(head),
                cache: Cache::new(self.config.cache_capacity),
                tmp_counter: AtomicU64::new(1),
            }),
        };

        store.purge_tmp().await;

        info!(path = %store.root().display(), head, "Opened block log");
        Ok(store)
    }
}

async fn read_head(root: &std::path::Path) -> Result<u32, BlockStoreError> {
    let path = layout::head_path(root);
    match fs::read(&path).await {
        Ok(bytes) => {
            let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                BlockStoreError::Corrupted {
                    message: format!("Head marker has {} bytes, expected 4", bytes.len()).into(),
                    context: Some(path.display().to_string().into()),
                }
            })?;
            Ok(u32::from_le_bytes(raw))
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(err) => Err(BlockStoreError::Io {
            source: err,
            context: Some(format!("Failed to read head marker: {}", path.display()).into()),
        }),
    }
}
