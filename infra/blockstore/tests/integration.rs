use stx_blockstore::{BlockStore, BlockStoreError, Compression};
use tempfile::tempdir;

async fn open(root: &std::path::Path, compression: Compression) -> BlockStore {
    BlockStore::builder().root(root).compression(compression).connect().await.unwrap()
}

#[tokio::test]
async fn append_and_read_roundtrip() {
    let tmp = tempdir().unwrap();
    let store = open(&tmp.path().join("blocks"), Compression::Lz4).await;

    assert!(store.is_empty());

    store.append(1, b"first").await.unwrap();
    store.append(2, b"second").await.unwrap();

    assert_eq!(store.head_num(), 2);
    assert_eq!(store.read(1).await.unwrap().as_slice(), b"first");
    assert_eq!(store.read(2).await.unwrap().as_slice(), b"second");
}

#[tokio::test]
async fn rejects_non_contiguous_appends() {
    let tmp = tempdir().unwrap();
    let store = open(&tmp.path().join("blocks"), Compression::None).await;

    let err = store.append(2, b"gap").await.unwrap_err();
    assert!(matches!(err, BlockStoreError::OutOfOrder { .. }));

    store.append(1, b"first").await.unwrap();
    let err = store.append(1, b"again").await.unwrap_err();
    assert!(matches!(err, BlockStoreError::OutOfOrder { .. }));
}

#[tokio::test]
async fn missing_blocks_are_reported() {
    let tmp = tempdir().unwrap();
    let store = open(&tmp.path().join("blocks"), Compression::None).await;

    let err = store.read(1).await.unwrap_err();
    assert!(matches!(err, BlockStoreError::BlockNotFound { .. }));

    let err = store.read(0).await.unwrap_err();
    assert!(matches!(err, BlockStoreError::BlockNotFound { .. }));
}

#[tokio::test]
async fn head_survives_reopen() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("blocks");

    {
        let store = open(&root, Compression::Lz4).await;
        store.append(1, b"one").await.unwrap();
        store.append(2, b"two").await.unwrap();
        store.append(3, b"three").await.unwrap();
    }

    let reopened = open(&root, Compression::Lz4).await;
    assert_eq!(reopened.head_num(), 3);
    assert_eq!(reopened.read(3).await.unwrap().as_slice(), b"three");
}

#[tokio::test]
async fn truncate_drops_blocks_above_new_head() {
    let tmp = tempdir().unwrap();
    let store = open(&tmp.path().join("blocks"), Compression::None).await;

    for num in 1..=5u32 {
        store.append(num, format!("block-{num}").as_bytes()).await.unwrap();
    }

    store.truncate_to(3).await.unwrap();
    assert_eq!(store.head_num(), 3);

    assert!(store.read(4).await.is_err());
    assert_eq!(store.read(3).await.unwrap().as_slice(), b"block-3");

    // The log keeps accepting appends from the new head.
    store.append(4, b"replacement").await.unwrap();
    assert_eq!(store.read(4).await.unwrap().as_slice(), b"replacement");

    let err = store.truncate_to(10).await.unwrap_err();
    assert!(matches!(err, BlockStoreError::OutOfOrder { .. }));
}

#[tokio::test]
async fn sharding_spreads_blocks_across_directories() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("blocks");
    let store = open(&root, Compression::None).await;

    for num in 1..=3u32 {
        store.append(num, b"x").await.unwrap();
    }

    assert!(root.join("000000").is_dir());
    let entries: Vec<_> = std::fs::read_dir(root.join("000000")).unwrap().flatten().collect();
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn stale_tmp_files_are_purged_on_open() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("blocks");
    std::fs::create_dir_all(&root).unwrap();

    let stale = root.join("0000000001.blk.stxtmp.7");
    std::fs::write(&stale, b"partial").unwrap();
    // Backdate far enough past the stale threshold.
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    let file = std::fs::File::open(&stale).unwrap();
    file.set_modified(old).unwrap();
    drop(file);

    let _store = open(&root, Compression::None).await;
    assert!(!stale.exists(), "stale temp file should be swept on open");
}
