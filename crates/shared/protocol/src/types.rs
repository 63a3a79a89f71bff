//! Fundamental wire types: digests, identifiers, timestamps, account names.

use crate::error::ProtocolError;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// SHA-256 over a single byte slice.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// SHA-256 over the concatenation of two byte slices.
#[must_use]
pub fn sha256_pair(left: &[u8], right: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

macro_rules! hash_newtype {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = ProtocolError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = hex::decode(s).map_err(|e| ProtocolError::Validation {
                    message: format!("Invalid hex digest: {e}").into(),
                    context: None,
                })?;
                let bytes: [u8; 32] =
                    raw.as_slice().try_into().map_err(|_| ProtocolError::Validation {
                        message: format!("Digest must be 32 bytes, got {}", raw.len()).into(),
                        context: None,
                    })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&hex::encode(self.0))
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct BytesVisitor;

                impl<'de> Visitor<'de> for BytesVisitor {
                    type Value = [u8; 32];

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("a 32-byte digest as hex string or raw bytes")
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                        let raw = hex::decode(v).map_err(de::Error::custom)?;
                        raw.as_slice()
                            .try_into()
                            .map_err(|_| de::Error::custom("digest must be 32 bytes"))
                    }

                    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                        v.try_into().map_err(|_| de::Error::custom("digest must be 32 bytes"))
                    }

                    fn visit_seq<A: de::SeqAccess<'de>>(
                        self,
                        mut seq: A,
                    ) -> Result<Self::Value, A::Error> {
                        let mut out = [0u8; 32];
                        for (i, slot) in out.iter_mut().enumerate() {
                            *slot = seq
                                .next_element()?
                                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                        }
                        Ok(out)
                    }
                }

                if deserializer.is_human_readable() {
                    deserializer.deserialize_str(BytesVisitor).map(Self)
                } else {
                    deserializer.deserialize_bytes(BytesVisitor).map(Self)
                }
            }
        }
    };
}

hash_newtype! {
    /// A generic SHA-256 digest.
    Digest
}
hash_newtype! {
    /// Identifies a chain: the digest of its canonical genesis encoding.
    ChainId
}
hash_newtype! {
    /// A transaction id: the digest of the unsigned transaction.
    TransactionId
}
hash_newtype! {
    /// A block id: the header digest with the block number embedded in the
    /// first four bytes.
    BlockId
}

impl BlockId {
    /// Builds a block id from a header digest and the block's number.
    #[must_use]
    pub fn from_digest(digest: Digest, block_num: u32) -> Self {
        let mut bytes = digest.0;
        bytes[..4].copy_from_slice(&block_num.to_be_bytes());
        Self(bytes)
    }

    /// The block number embedded in the id.
    #[must_use]
    pub fn block_num(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// The TaPoS prefix: bytes 4..8 of the id.
    #[must_use]
    pub fn tapos_prefix(&self) -> u32 {
        u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }
}

/// Seconds since the UNIX epoch, the chain's native timestamp resolution.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct TimePointSec(pub u32);

impl TimePointSec {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(u32::MAX);

    #[must_use]
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    #[must_use]
    pub const fn secs(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn saturating_add_secs(self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }

    #[must_use]
    pub const fn saturating_sub_secs(self, secs: u32) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Whole seconds between `self` and an earlier point (saturating).
    #[must_use]
    pub const fn secs_since(self, earlier: Self) -> u32 {
        self.0.saturating_sub(earlier.0)
    }

    /// The current wall-clock time truncated to seconds.
    ///
    /// Times before the epoch or after 2106 clamp to the representable range.
    #[must_use]
    pub fn now() -> Self {
        let secs = chrono::Utc::now().timestamp();
        Self(u32::try_from(secs).unwrap_or(0))
    }
}

impl fmt::Display for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(i64::from(self.0), 0) {
            Some(dt) => f.write_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => f.write_str("1970-01-01T00:00:00"),
        }
    }
}

impl fmt::Debug for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimePointSec({self})")
    }
}

impl FromStr for TimePointSec {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map_err(
            |e| ProtocolError::Validation {
                message: format!("Invalid timestamp '{s}': {e}").into(),
                context: None,
            },
        )?;
        let secs = naive.and_utc().timestamp();
        let secs = u32::try_from(secs).map_err(|_| ProtocolError::Validation {
            message: format!("Timestamp '{s}' outside the representable range").into(),
            context: None,
        })?;
        Ok(Self(secs))
    }
}

impl Serialize for TimePointSec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for TimePointSec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        } else {
            Ok(Self(u32::deserialize(deserializer)?))
        }
    }
}

/// Maximum account name length on the wire.
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 16;
const MIN_ACCOUNT_NAME_LENGTH: usize = 3;

/// A validated on-chain account name.
///
/// Names are 3 to 16 characters of lowercase letters, digits, dots, and
/// dashes; separators may not lead, trail, or repeat. Derived names (from
/// `account_create` name seeds) fall inside this grammar by construction.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountName(String);

impl AccountName {
    /// Parses and validates an account name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidName`] when the grammar is violated.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), ProtocolError> {
        let invalid = |message: String| ProtocolError::InvalidName {
            message: message.into(),
            context: None,
        };

        if name.len() < MIN_ACCOUNT_NAME_LENGTH || name.len() > MAX_ACCOUNT_NAME_LENGTH {
            return Err(invalid(format!(
                "'{name}' must be {MIN_ACCOUNT_NAME_LENGTH}..={MAX_ACCOUNT_NAME_LENGTH} characters"
            )));
        }

        let bytes = name.as_bytes();
        let is_separator = |b: u8| b == b'.' || b == b'-';

        for (i, &b) in bytes.iter().enumerate() {
            let ok = b.is_ascii_lowercase() || b.is_ascii_digit() || is_separator(b);
            if !ok {
                return Err(invalid(format!("'{name}' contains invalid character at {i}")));
            }
            if is_separator(b) {
                let at_edge = i == 0 || i == bytes.len() - 1;
                let doubled = i > 0 && is_separator(bytes[i - 1]);
                if at_edge || doubled {
                    return Err(invalid(format!("'{name}' has a misplaced separator at {i}")));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountName({})", self.0)
    }
}

impl FromStr for AccountName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for AccountName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for AccountName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(de::Error::custom)
    }
}

/// Derives a deterministic account name from a creator-chosen seed, the way
/// created accounts get their fixed names.
#[must_use]
pub fn derive_account_name(seed: &str) -> AccountName {
    let digest = sha256(seed.as_bytes());
    // 8 bytes of entropy rendered as 16 hex chars always satisfy the grammar.
    AccountName(hex::encode(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_account_names() {
        for name in ["initminer", "alice", "a-1.b-2", "abc", "0123456789abcdef"] {
            assert!(AccountName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn invalid_account_names() {
        for name in ["", "ab", "Alice", "-abc", "abc-", "a..b", "a_b", "averyveryverylongname"] {
            assert!(AccountName::new(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn derived_names_are_stable_and_valid() {
        let a = derive_account_name("seed-1");
        let b = derive_account_name("seed-1");
        let c = derive_account_name("seed-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn block_id_embeds_number_and_prefix() {
        let digest = Digest(sha256(b"header"));
        let id = BlockId::from_digest(digest, 0x0102_0304);
        assert_eq!(id.block_num(), 0x0102_0304);
        assert_eq!(
            id.tapos_prefix(),
            u32::from_le_bytes([id.0[4], id.0[5], id.0[6], id.0[7]])
        );
    }

    #[test]
    fn time_point_round_trips_through_string() {
        let t = TimePointSec::from_secs(1_537_000_000);
        let s = t.to_string();
        assert_eq!(s.parse::<TimePointSec>().unwrap(), t);
    }

    #[test]
    fn digest_round_trips_through_hex() {
        let d = Digest(sha256(b"x"));
        let parsed: Digest = d.to_string().parse().unwrap();
        assert_eq!(parsed, d);
    }
}
