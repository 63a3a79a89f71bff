use crate::error::{KeystoreError, KeystoreErrorExt};
use aead::inout::InOutBuf;
use aead::{AeadInOut, Key, KeyInit, Nonce};
use aes_gcm::Aes256Gcm;
use getrandom::fill;
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Sealed file layout constants.
const FILE_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Domain separation for the derived file key and the AEAD associated data.
const KEY_INFO: &[u8] = b"stx_keystore.v1:file-key";
const AAD: &[u8] = b"stx_keystore.v1";

/// A named Ed25519 signing seed.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretSeed(pub [u8; 32]);

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed(<redacted>)")
    }
}

/// On-disk envelope of the sealed key file.
#[derive(Serialize, Deserialize)]
struct SealedKeyFile {
    version: u8,
    salt: [u8; SALT_LEN],
    /// `[nonce(12)][ciphertext][tag(16)]`
    payload: Vec<u8>,
}

/// A passphrase-sealed store for signing keys.
///
/// Witness and debug keys are kept encrypted at rest: the file key is derived
/// from the passphrase with HKDF-SHA256 over a random per-file salt, and the
/// postcard-encoded name→seed map is sealed with AES-256-GCM. Saving uses the
/// same atomic temp-write + rename sequence as the block log, so a crash
/// cannot leave a half-written key file behind.
///
/// # Example
///
/// ```rust
/// use stx_keystore::{Keystore, SecretSeed};
///
/// #[tokio::main]
/// async fn main() -> Result<(), stx_keystore::KeystoreError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let path = tmp.path().join("keys.seal");
///     let mut keystore = Keystore::builder()
///         .path(&path)
///         .passphrase("correct horse battery staple")
///         .open()
///         .await?;
///
///     keystore.insert("initminer", SecretSeed([7u8; 32]));
///     keystore.save().await?;
///
///     assert!(keystore.get("initminer").is_some());
///     Ok(())
/// }
/// ```
pub struct Keystore {
    path: PathBuf,
    cipher: Aes256Gcm,
    salt: [u8; SALT_LEN],
    keys: BTreeMap<String, SecretSeed>,
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("path", &self.path)
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl Keystore {
    #[must_use = "The keystore is not opened until you call .open()"]
    pub fn builder() -> KeystoreBuilder {
        KeystoreBuilder::default()
    }

    /// Returns the seed stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecretSeed> {
        self.keys.get(name)
    }

    /// Stores (or replaces) a seed under `name`. Call [`Keystore::save`] to persist.
    pub fn insert(&mut self, name: impl Into<String>, seed: SecretSeed) {
        self.keys.insert(name.into(), seed);
    }

    /// Removes the seed stored under `name`, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<SecretSeed> {
        self.keys.remove(name)
    }

    /// Iterates over the stored key names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Seals the current key map and atomically replaces the key file.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::Sealing`] if encryption fails and
    /// [`KeystoreError::Io`] on disk failures.
    pub async fn save(&self) -> Result<(), KeystoreError> {
        let mut plaintext =
            postcard::to_stdvec(&self.keys).context("Encoding key map for sealing")?;

        let sealed = seal(&self.cipher, &plaintext)?;
        plaintext.zeroize();

        let file = SealedKeyFile { version: FILE_VERSION, salt: self.salt, payload: sealed };
        let bytes = postcard::to_stdvec(&file).context("Encoding sealed key file")?;

        write_atomic(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), keys = self.keys.len(), "Key file sealed");
        Ok(())
    }
}

#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct KeystoreBuilder {
    #[zeroize(skip)]
    path: Option<PathBuf>,
    passphrase: Option<String>,
}

impl std::fmt::Debug for KeystoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreBuilder").field("path", &self.path).finish_non_exhaustive()
    }
}

impl KeystoreBuilder {
    #[must_use = "Sets the key file path"]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use = "Sets the passphrase protecting the key file"]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Opens an existing key file, or starts an empty store for a path that
    /// does not exist yet (the file appears on the first [`Keystore::save`]).
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::Unsealing`] when the passphrase does not match
    /// an existing file, [`KeystoreError::InvalidPayload`] for malformed
    /// files, and [`KeystoreError::Internal`] when the builder is incomplete
    /// or the system RNG fails.
    pub async fn open(mut self) -> Result<Keystore, KeystoreError> {
        let path = self.path.take().ok_or(KeystoreError::Internal {
            message: "Key file path not provided".into(),
            context: None,
        })?;
        let passphrase = self.passphrase.take().ok_or(KeystoreError::Internal {
            message: "Passphrase not provided".into(),
            context: None,
        })?;

        let store = match fs::read(&path).await {
            Ok(bytes) => open_existing(path, &passphrase, &bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let mut salt = [0u8; SALT_LEN];
                fill(&mut salt).map_err(|e| KeystoreError::Internal {
                    message: e.to_string().into(),
                    context: Some("Failed to generate key file salt".into()),
                })?;
                let cipher = derive_cipher(&passphrase, &salt)?;
                info!(path = %path.display(), "Starting new key store");
                Keystore { path, cipher, salt, keys: BTreeMap::new() }
            },
            Err(err) => {
                return Err(KeystoreError::Io {
                    source: err,
                    context: Some(format!("Failed to read key file: {}", path.display()).into()),
                });
            },
        };

        Ok(store)
    }
}

fn open_existing(
    path: PathBuf,
    passphrase: &str,
    bytes: &[u8],
) -> Result<Keystore, KeystoreError> {
    let file: SealedKeyFile = postcard::from_bytes(bytes).context("Decoding sealed key file")?;
    if file.version != FILE_VERSION {
        return Err(KeystoreError::InvalidPayload {
            message: format!("Unsupported key file version {}", file.version).into(),
            context: Some(path.display().to_string().into()),
        });
    }

    let cipher = derive_cipher(passphrase, &file.salt)?;
    let mut plaintext = unseal(&cipher, &file.payload)?;

    let keys: BTreeMap<String, SecretSeed> =
        postcard::from_bytes(&plaintext).context("Decoding key map")?;
    plaintext.zeroize();

    info!(path = %path.display(), keys = keys.len(), "Key store unsealed");
    Ok(Keystore { path, cipher, salt: file.salt, keys })
}

/// HKDF-SHA256 over the passphrase with the per-file salt.
fn derive_cipher(passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<Aes256Gcm, KeystoreError> {
    let (_, hk) = Hkdf::<Sha256>::extract(Some(salt), passphrase.as_bytes());

    let mut key_bytes = [0u8; 32];
    hk.expand(KEY_INFO, &mut key_bytes).map_err(|_| KeystoreError::Internal {
        message: "HKDF expansion failed for file key".into(),
        context: None,
    })?;

    let key = Key::<Aes256Gcm>::try_from(&key_bytes[..]).map_err(|_| KeystoreError::Internal {
        message: "Invalid derived key length".into(),
        context: None,
    })?;
    let cipher = Aes256Gcm::new(&key);
    key_bytes.zeroize();

    Ok(cipher)
}

/// Seals plaintext into `[nonce(12)][ciphertext][tag(16)]`.
fn seal(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    let mut nonce = Nonce::<Aes256Gcm>::default();
    fill(&mut nonce).map_err(|e| KeystoreError::Internal {
        message: e.to_string().into(),
        context: Some("Failed to generate nonce".into()),
    })?;

    let mut buf = Vec::with_capacity(NONCE_LEN + plaintext.len() + TAG_LEN);
    buf.extend_from_slice(&nonce);
    buf.extend_from_slice(plaintext);

    let (_nonce_part, data_part) = buf.split_at_mut(NONCE_LEN);
    let in_out = InOutBuf::from(data_part);

    let tag = cipher.encrypt_inout_detached(&nonce, AAD, in_out).map_err(|_| {
        KeystoreError::Sealing {
            message: "AEAD encryption failed".into(),
            context: None,
        }
    })?;

    buf.extend_from_slice(tag.as_slice());
    Ok(buf)
}

/// Unseals `[nonce(12)][ciphertext][tag(16)]` back into plaintext.
fn unseal(cipher: &Aes256Gcm, payload: &[u8]) -> Result<Vec<u8>, KeystoreError> {
    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(KeystoreError::InvalidPayload {
            message: format!(
                "Sealed payload too short ({} bytes). Expected at least {}",
                payload.len(),
                NONCE_LEN + TAG_LEN
            )
            .into(),
            context: None,
        });
    }

    let (nonce_slice, rest) = payload.split_at(NONCE_LEN);
    let (ciphertext, tag_slice) = rest.split_at(rest.len() - TAG_LEN);

    let nonce = nonce_slice.try_into().map_err(|_| KeystoreError::Unsealing {
        message: "Invalid nonce length".into(),
        context: None,
    })?;
    let tag = tag_slice.try_into().map_err(|_| KeystoreError::Unsealing {
        message: "Invalid tag length".into(),
        context: None,
    })?;

    let mut buf = ciphertext.to_vec();
    let in_out = InOutBuf::from(&mut buf[..]);

    cipher.decrypt_inout_detached(&nonce, AAD, in_out, &tag).map_err(|_| {
        KeystoreError::Unsealing {
            message: "Wrong passphrase or corrupted key file".into(),
            context: None,
        }
    })?;

    Ok(buf)
}

/// Atomic swap write, mirroring the block log's durability sequence.
async fn write_atomic(target: &Path, data: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .context(format!("Failed to create key file directory: {}", parent.display()))?;
    }

    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("keys");
    let temp = target.with_file_name(format!("{file_name}.stxtmp"));

    {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
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
            return Err(KeystoreError::Io {
                source: err,
                context: Some(
                    format!("Atomic swap failed: {} -> {}", temp.display(), target.display())
                        .into(),
                ),
            });
        }
    }

    Ok(())
}
