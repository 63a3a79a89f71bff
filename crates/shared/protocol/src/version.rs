//! Protocol versioning: a packed `major.minor.revision` triple, and the
//! hardfork variant that masks the revision.

use crate::error::ProtocolError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A protocol version packed into a `u32`: `[major:8][minor:8][revision:16]`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(pub u32);

impl Version {
    #[must_use]
    pub const fn new(major: u8, minor: u8, revision: u16) -> Self {
        Self(((major as u32) << 24) | ((minor as u32) << 16) | revision as u32)
    }

    #[must_use]
    pub const fn major(self) -> u32 {
        (self.0 & 0xFF00_0000) >> 24
    }

    #[must_use]
    pub const fn minor(self) -> u32 {
        (self.0 & 0x00FF_0000) >> 16
    }

    #[must_use]
    pub const fn revision(self) -> u32 {
        self.0 & 0x0000_FFFF
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.revision())
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl FromStr for Version {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: String| ProtocolError::Validation {
            message: detail.into(),
            context: None,
        };

        let mut parts = s.split('.');
        let major: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| invalid(format!("Malformed version '{s}'")))?;
        let minor: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| invalid(format!("Malformed version '{s}'")))?;
        let revision: u16 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| invalid(format!("Malformed version '{s}'")))?;
        if parts.next().is_some() {
            return Err(invalid(format!("Malformed version '{s}'")));
        }

        Ok(Self::new(major, minor, revision))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(de::Error::custom)
        } else {
            Ok(Self(u32::deserialize(deserializer)?))
        }
    }
}

/// A hardfork version: a [`Version`] with the revision bits masked out.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HardforkVersion(pub u32);

impl HardforkVersion {
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self(Version::new(major, minor, 0).0)
    }

    #[must_use]
    pub const fn major(self) -> u32 {
        Version(self.0).major()
    }

    #[must_use]
    pub const fn minor(self) -> u32 {
        Version(self.0).minor()
    }
}

impl From<Version> for HardforkVersion {
    fn from(v: Version) -> Self {
        Self(v.0 & 0xFFFF_0000)
    }
}

impl fmt::Display for HardforkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl fmt::Debug for HardforkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardforkVersion({self})")
    }
}

impl FromStr for HardforkVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: String| ProtocolError::Validation {
            message: detail.into(),
            context: None,
        };

        let mut parts = s.split('.');
        let major: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| invalid(format!("Malformed hardfork version '{s}'")))?;
        let minor: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| invalid(format!("Malformed hardfork version '{s}'")))?;
        if parts.next().is_some() {
            return Err(invalid(format!("Malformed hardfork version '{s}'")));
        }

        Ok(Self::new(major, minor))
    }
}

impl Serialize for HardforkVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for HardforkVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(de::Error::custom)
        } else {
            Ok(Self(u32::deserialize(deserializer)? & 0xFFFF_0000))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack() {
        let v = Version::new(1, 2, 300);
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.revision(), 300);
        assert_eq!(v.to_string(), "1.2.300");
        assert_eq!("1.2.300".parse::<Version>().unwrap(), v);
    }

    #[test]
    fn hardfork_masks_revision() {
        let hf: HardforkVersion = Version::new(1, 2, 300).into();
        assert_eq!(hf, HardforkVersion::new(1, 2));
        assert_eq!(hf.to_string(), "1.2");
    }

    #[test]
    fn ordering_follows_the_packed_value() {
        assert!(Version::new(1, 2, 0) < Version::new(1, 3, 0));
        assert!(Version::new(1, 2, 5) > Version::new(1, 2, 4));
        assert!(HardforkVersion::new(1, 1) < HardforkVersion::new(1, 2));
    }

    #[test]
    fn malformed_versions_are_rejected() {
        for s in ["", "1", "1.2", "1.2.3.4", "a.b.c", "256.0.0"] {
            assert!(s.parse::<Version>().is_err(), "{s} should be rejected");
        }
    }
}
