//! Ed25519 key material and signatures.
//!
//! Signatures always cover a 32-byte SHA-256 digest of the canonical
//! (postcard) encoding of the signed structure, never the structure itself.

use crate::error::ProtocolError;
use crate::types::{Digest, sha256};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Prefix carried by the human-readable form of public keys.
pub const PUBLIC_KEY_PREFIX: &str = "STX";

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verifies `signature` over `digest` with this key.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Crypto`] when the key is malformed or the
    /// signature does not verify.
    pub fn verify(&self, digest: &Digest, signature: &Signature) -> Result<(), ProtocolError> {
        let key = VerifyingKey::from_bytes(&self.0)?;
        let sig = ed25519_dalek::Signature::from_slice(&signature.0)?;
        key.verify(digest.as_bytes(), &sig)?;
        Ok(())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PUBLIC_KEY_PREFIX}{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.strip_prefix(PUBLIC_KEY_PREFIX).ok_or_else(|| {
            ProtocolError::Validation {
                message: format!("Public key '{s}' is missing the {PUBLIC_KEY_PREFIX} prefix")
                    .into(),
                context: None,
            }
        })?;
        let raw = hex::decode(hex_part).map_err(|e| ProtocolError::Validation {
            message: format!("Invalid public key hex: {e}").into(),
            context: None,
        })?;
        let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| ProtocolError::Validation {
            message: format!("Public key must be 32 bytes, got {}", raw.len()).into(),
            context: None,
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = PublicKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an STX-prefixed hex public key or 32 raw bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(de::Error::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                let bytes: [u8; 32] =
                    v.try_into().map_err(|_| de::Error::custom("public key must be 32 bytes"))?;
                Ok(PublicKey(bytes))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = [0u8; 32];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot =
                        seq.next_element()?.ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(PublicKey(out))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(KeyVisitor)
        } else {
            deserializer.deserialize_bytes(KeyVisitor)
        }
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl Signature {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| ProtocolError::Validation {
            message: format!("Invalid signature hex: {e}").into(),
            context: None,
        })?;
        let bytes: [u8; 64] = raw.as_slice().try_into().map_err(|_| ProtocolError::Validation {
            message: format!("Signature must be 64 bytes, got {}", raw.len()).into(),
            context: None,
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SigVisitor;

        impl<'de> Visitor<'de> for SigVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a hex signature or 64 raw bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(de::Error::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                let bytes: [u8; 64] =
                    v.try_into().map_err(|_| de::Error::custom("signature must be 64 bytes"))?;
                Ok(Signature(bytes))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = [0u8; 64];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot =
                        seq.next_element()?.ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(Signature(out))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(SigVisitor)
        } else {
            deserializer.deserialize_bytes(SigVisitor)
        }
    }
}

/// An Ed25519 signing key. Never serialized; the seed is wiped on drop.
pub struct PrivateKey {
    key: SigningKey,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key())
    }
}

impl PrivateKey {
    /// Builds a key from a raw 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let mut seed = seed;
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { key }
    }

    /// Deterministically regenerates a key from an arbitrary seed string,
    /// the way account keys are derived from name+role+password seeds.
    #[must_use]
    pub fn regenerate(seed: &str) -> Self {
        Self::from_seed(sha256(seed.as_bytes()))
    }

    /// Generates a fresh key from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Internal`] if the system entropy source fails.
    pub fn generate() -> Result<Self, ProtocolError> {
        let mut seed = [0u8; 32];
        getrandom::fill(&mut seed).map_err(|e| ProtocolError::Internal {
            message: e.to_string().into(),
            context: Some("Failed to generate signing key seed".into()),
        })?;
        Ok(Self::from_seed(seed))
    }

    /// Parses a key from a 64-character hex seed.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] for malformed input.
    pub fn from_hex(s: &str) -> Result<Self, ProtocolError> {
        let raw = hex::decode(s).map_err(|e| ProtocolError::Validation {
            message: format!("Invalid private key hex: {e}").into(),
            context: None,
        })?;
        let seed: [u8; 32] = raw.as_slice().try_into().map_err(|_| ProtocolError::Validation {
            message: format!("Private key seed must be 32 bytes, got {}", raw.len()).into(),
            context: None,
        })?;
        Ok(Self::from_seed(seed))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.key.verifying_key().to_bytes())
    }

    /// Signs a digest.
    #[must_use]
    pub fn sign(&self, digest: &Digest) -> Signature {
        Signature(self.key.sign(digest.as_bytes()).to_bytes())
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self { key: SigningKey::from_bytes(&self.key.to_bytes()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = PrivateKey::regenerate("initminer-active");
        let digest = Digest(sha256(b"payload"));

        let signature = key.sign(&digest);
        key.public_key().verify(&digest, &signature).unwrap();

        let other = Digest(sha256(b"other payload"));
        assert!(key.public_key().verify(&other, &signature).is_err());
    }

    #[test]
    fn regenerate_is_deterministic() {
        let a = PrivateKey::regenerate("seed");
        let b = PrivateKey::regenerate("seed");
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn public_key_string_roundtrip() {
        let key = PrivateKey::regenerate("seed").public_key();
        let rendered = key.to_string();
        assert!(rendered.starts_with(PUBLIC_KEY_PREFIX));
        assert_eq!(rendered.parse::<PublicKey>().unwrap(), key);
    }

    #[test]
    fn signature_string_roundtrip() {
        let key = PrivateKey::regenerate("seed");
        let sig = key.sign(&Digest(sha256(b"x")));
        assert_eq!(sig.to_string().parse::<Signature>().unwrap(), sig);
    }
}
