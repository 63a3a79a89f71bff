use stx_keystore::{Keystore, KeystoreError, SecretSeed};
use tempfile::tempdir;

#[tokio::test]
async fn seal_and_unseal_roundtrip() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("keys.seal");

    {
        let mut store =
            Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap();
        assert!(store.is_empty());

        store.insert("initminer", SecretSeed([7u8; 32]));
        store.insert("witness-a", SecretSeed([9u8; 32]));
        store.save().await.unwrap();
    }

    let store = Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("initminer").unwrap().0, [7u8; 32]);
    assert_eq!(store.names().collect::<Vec<_>>(), vec!["initminer", "witness-a"]);
}

#[tokio::test]
async fn wrong_passphrase_is_rejected() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("keys.seal");

    let mut store = Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap();
    store.insert("initminer", SecretSeed([7u8; 32]));
    store.save().await.unwrap();

    let err = Keystore::builder().path(&path).passphrase("marlin").open().await.unwrap_err();
    assert!(matches!(err, KeystoreError::Unsealing { .. }));
}

#[tokio::test]
async fn tampered_file_is_rejected() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("keys.seal");

    let mut store = Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap();
    store.insert("initminer", SecretSeed([7u8; 32]));
    store.save().await.unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let err = Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap_err();
    assert!(matches!(
        err,
        KeystoreError::Unsealing { .. } | KeystoreError::InvalidPayload { .. }
    ));
}

#[tokio::test]
async fn remove_and_resave() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("keys.seal");

    let mut store = Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap();
    store.insert("initminer", SecretSeed([7u8; 32]));
    store.insert("witness-a", SecretSeed([9u8; 32]));
    store.save().await.unwrap();

    assert!(store.remove("witness-a").is_some());
    assert!(store.remove("witness-a").is_none());
    store.save().await.unwrap();

    let store = Keystore::builder().path(&path).passphrase("swordfish").open().await.unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.get("witness-a").is_none());
}

#[tokio::test]
async fn missing_builder_fields_fail() {
    let err = Keystore::builder().passphrase("x").open().await.unwrap_err();
    assert!(matches!(err, KeystoreError::Internal { .. }));

    let err = Keystore::builder().path("nowhere.seal").open().await.unwrap_err();
    assert!(matches!(err, KeystoreError::Internal { .. }));
}
