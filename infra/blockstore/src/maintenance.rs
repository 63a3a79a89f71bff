//! Startup cleanup of temp files orphaned by crashes mid-append.

use crate::store::TMP_MARKER;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

/// Temp files younger than this may belong to a concurrent writer.
const STALE_THRESHOLD: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(root: &Path) {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up temporary block files");
        },
        Err(e) => {
            error!(error = %e, "Temp file cleanup task panicked");
        },
        _ => {},
    }
}

/// Walks the root and its shard directories (the layout is exactly two levels
/// deep) and removes stale temp files.
fn remove_stale(root: &Path, now: SystemTime) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    let Ok(entries) = std::fs::read_dir(root) else {
        return (removed, failed);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Ok(shard) = std::fs::read_dir(&path) {
                for file in shard.flatten() {
                    sweep_file(&file.path(), now, &mut removed, &mut failed);
                }
            }
        } else {
            sweep_file(&path, now, &mut removed, &mut failed);
        }
    }

    (removed, failed)
}

fn sweep_file(path: &Path, now: SystemTime, removed: &mut usize, failed: &mut usize) {
    if !is_stale_tmp(path, now) {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => *removed += 1,
        Err(e) => {
            tracing::warn!(p = %path.display(), err = %e, "IO fail");
            *failed += 1;
        },
    }
}

fn is_stale_tmp(path: &Path, now: SystemTime) -> bool {
    let is_tmp = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(TMP_MARKER));
    if !is_tmp {
        return false;
    }

    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > STALE_THRESHOLD)
}
