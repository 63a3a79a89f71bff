//! Core block log implementation providing atomic, compressed block I/O.
//!
//! This module contains the primary [`BlockStore`] handle. It owns the
//! physical log root, enforces contiguous appends, and serves reads through
//! an in-memory cache.

use crate::builder::BlockStoreBuilder;
use crate::error::{BlockStoreError, BlockStoreErrorExt};
use crate::{layout, maintenance};
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Compression {
    #[default]
    None,
    Lz4,
}

impl Compression {
    #[must_use]
    fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::None => data.to_vec(),
            Self::Lz4 => lz4_flex::compress_prepend_size(data),
        }
    }

    fn decompress(self, data: &[u8]) -> Result<Vec<u8>, BlockStoreError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4 => {
                lz4_flex::decompress_size_prepended(data).context("Lz4 decompression failed")
            },
        }
    }
}

/// The internal shared state of a [`BlockStore`] instance.
#[derive(Debug)]
pub struct BlockStoreInner {
    /// The canonicalized physical path of the block log root.
    pub(crate) root: PathBuf,
    /// Whether transparent LZ4 compression is enabled for this log.
    pub(crate) compression: Compression,
    /// Highest contiguous block number persisted so far (0 = empty log).
    pub(crate) head: AtomicU32,
    /// Decoded payload cache keyed by block number.
    pub(crate) cache: Cache<u32, Arc<Vec<u8>>>,
    /// A unique counter used to generate temporary file names.
    pub(crate) tmp_counter: AtomicU64,
}

/// A thread-safe handle to the persistent block log.
///
/// `BlockStore` keeps the raw, canonical encodings of signed blocks on disk:
/// - **Atomic Writes**: Prevents torn block files using temp files and renames.
/// - **Contiguity**: Appends must extend the log by exactly one block; the
///   head marker is only advanced after the block file is durable.
/// - **Transparent Compression**: Optional LZ4 block compression.
/// - **Read Cache**: Recently fetched payloads are served from memory.
/// - **Self-Healing**: Stale temp files are removed on open.
///
/// This handle is internally reference-counted (`Arc`) and can be cheaply
/// cloned across threads or tasks.
///
/// # Example
///
/// ```rust
/// use stx_blockstore::{BlockStore, Compression, BlockStoreError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), BlockStoreError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("blocks");
///     let store = BlockStore::builder()
///         .root(&root)
///         .compression(Compression::Lz4)
///         .connect()
///         .await?;
///
///     store.append(1, b"genesis successor").await?;
///     let payload = store.read(1).await?;
///     assert_eq!(payload.as_slice(), b"genesis successor");
///     assert_eq!(store.head_num(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BlockStore {
    pub(crate) inner: Arc<BlockStoreInner>,
}

impl BlockStore {
    #[must_use = "The block store is not opened until you call .connect()"]
    pub fn builder() -> BlockStoreBuilder {
        BlockStoreBuilder::new()
    }

    /// The canonical root directory of this log.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Highest contiguous block number persisted so far. Zero for an empty log.
    #[must_use]
    pub fn head_num(&self) -> u32 {
        self.inner.head.load(Ordering::Acquire)
    }

    /// Whether the log holds no blocks yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head_num() == 0
    }

    /// Appends the canonical encoding of block `block_num` to the log.
    ///
    /// The write is a two-step durability sequence: the block file is written
    /// atomically first, and only then is the head marker advanced. A crash
    /// between the two steps leaves an orphaned block file which the next
    /// append simply overwrites.
    ///
    /// # Errors
    ///
    /// Returns [`BlockStoreError::OutOfOrder`] unless `block_num` is exactly
    /// `head_num() + 1`, and [`BlockStoreError::Io`] on disk failures.
    pub async fn append(&self, block_num: u32, payload: &[u8]) -> Result<(), BlockStoreError> {
        let head = self.head_num();
        if block_num != head + 1 {
            return Err(BlockStoreError::OutOfOrder {
                message: format!("append of block {block_num} onto head {head}").into(),
                context: None,
            });
        }

        let path = layout::block_path(&self.inner.root, block_num);
        let compressed = self.inner.compression.compress(payload);
        self.write_atomic(&path, &compressed).await?;

        self.set_head(block_num).await?;
        self.inner.cache.insert(block_num, Arc::new(payload.to_vec()));

        debug!(block_num, bytes = payload.len(), "Block persisted");
        Ok(())
    }

    /// Reads the canonical encoding of block `block_num`.
    ///
    /// Recently read payloads are served from the in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns [`BlockStoreError::BlockNotFound`] when the number is zero,
    /// beyond the head, or the file is missing, and
    /// [`BlockStoreError::Decompress`] when the on-disk data is corrupted.
    pub async fn read(&self, block_num: u32) -> Result<Arc<Vec<u8>>, BlockStoreError> {
        if block_num == 0 || block_num > self.head_num() {
            return Err(BlockStoreError::BlockNotFound {
                message: format!("block {block_num} (head {})", self.head_num()).into(),
                context: None,
            });
        }

        if let Some(cached) = self.inner.cache.get(&block_num) {
            return Ok(cached);
        }

        let path = layout::block_path(&self.inner.root, block_num);
        let raw = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlockStoreError::BlockNotFound {
                    message: path.display().to_string().into(),
                    context: None,
                });
            },
            Err(err) => {
                return Err(BlockStoreError::Io {
                    source: err,
                    context: Some(format!("Read failed: {}", path.display()).into()),
                });
            },
        };

        let payload = Arc::new(self.inner.compression.decompress(&raw)?);
        self.inner.cache.insert(block_num, payload.clone());
        Ok(payload)
    }

    /// On-disk payload size of block `block_num` before compression.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`BlockStore::read`].
    pub async fn payload_size(&self, block_num: u32) -> Result<usize, BlockStoreError> {
        Ok(self.read(block_num).await?.len())
    }

    /// Shrinks the log so `new_head` becomes the highest block.
    ///
    /// Used when blocks are popped off the chain. Files above the new head
    /// are removed best-effort after the head marker has moved; a leftover
    /// file is overwritten by the next append.
    ///
    /// # Errors
    ///
    /// Returns [`BlockStoreError::OutOfOrder`] if `new_head` is above the
    /// current head, and [`BlockStoreError::Io`] if the head marker cannot
    /// be rewritten.
    pub async fn truncate_to(&self, new_head: u32) -> Result<(), BlockStoreError> {
        let head = self.head_num();
        if new_head > head {
            return Err(BlockStoreError::OutOfOrder {
                message: format!("truncate to {new_head} beyond head {head}").into(),
                context: None,
            });
        }
        if new_head == head {
            return Ok(());
        }

        self.set_head(new_head).await?;

        for num in (new_head + 1)..=head {
            self.inner.cache.invalidate(&num);
            let path = layout::block_path(&self.inner.root, num);
            if let Err(err) = fs::remove_file(&path).await
                && err.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %path.display(), error = %err, "Orphan block file not removed");
            }
        }

        debug!(new_head, removed = head - new_head, "Block log truncated");
        Ok(())
    }

    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.inner.root).await;
    }

    async fn set_head(&self, block_num: u32) -> Result<(), BlockStoreError> {
        let path = layout::head_path(&self.inner.root);
        self.write_atomic(&path, &block_num.to_le_bytes()).await?;
        self.inner.head.store(block_num, Ordering::Release);
        Ok(())
    }

    /// Atomic swap write: unique temp file + `fsync` + rename + parent sync.
    async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<(), BlockStoreError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create shard for {}", target.display()))?;
        }

        let temp = unique_tmp_path(target, &self.inner.tmp_counter);

        {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp)
                .await
                .context(format!("Temp creation failed: {}", temp.display()))?;
            file.write_all(data).await.context("Write failed")?;
            file.sync_all().await.context("Hardware sync failed")?;
        }

        if let Err(err) = fs::rename(&temp, target).await {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                fs::remove_file(target)
                    .await
                    .context(format!("Failed to replace existing file: {}", target.display()))?;
                fs::rename(&temp, target).await.context(format!(
                    "Atomic swap failed: {} -> {}",
                    temp.display(),
                    target.display()
                ))?;
            } else {
                return Err(BlockStoreError::Io {
                    source: err,
                    context: Some(
                        format!("Atomic swap failed: {} -> {}", temp.display(), target.display())
                            .into(),
                    ),
                });
            }
        }

        if let Some(parent) = target.parent() {
            Self::sync_dir(parent).await;
        }

        Ok(())
    }

    async fn sync_dir(path: &Path) {
        match fs::File::open(path).await {
            Ok(dir) => {
                if let Err(err) = dir.sync_all().await {
                    tracing::warn!(path = %path.display(), error = %err, "Directory sync failed");
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Directory open failed");
            },
        }
    }
}

pub(crate) const TMP_MARKER: &str = ".stxtmp.";

fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("block");
    let tmp_name = format!("{file_name}{TMP_MARKER}{counter}");
    target.with_file_name(tmp_name)
}
