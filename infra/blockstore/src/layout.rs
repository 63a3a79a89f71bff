//! On-disk layout of the block log.
//!
//! Blocks are sharded into directories of [`BLOCKS_PER_SHARD`] entries so a
//! long chain never degrades directory lookups. The head marker lives next to
//! the shards and names the highest contiguous block number.

use std::path::{Path, PathBuf};

/// Blocks per shard directory.
pub(crate) const BLOCKS_PER_SHARD: u32 = 1000;

/// File name of the head marker.
pub(crate) const HEAD_FILE: &str = "HEAD";

/// Extension used for block payload files.
const BLOCK_SUFFIX: &str = "blk";

/// Physical path of the given block number inside `root`.
pub(crate) fn block_path(root: &Path, block_num: u32) -> PathBuf {
    let shard = block_num / BLOCKS_PER_SHARD;
    root.join(format!("{shard:06}")).join(format!("{block_num:010}.{BLOCK_SUFFIX}"))
}

/// Physical path of the head marker inside `root`.
pub(crate) fn head_path(root: &Path) -> PathBuf {
    root.join(HEAD_FILE)
}
