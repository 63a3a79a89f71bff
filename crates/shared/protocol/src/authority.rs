//! Weighted key authorities guarding accounts.

use crate::crypto::PublicKey;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A weighted set of keys with a satisfaction threshold.
///
/// An authority is satisfied when the summed weights of the provided keys
/// reach `weight_threshold`. The common case is a single key with weight one
/// and threshold one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
    /// The usual single-key authority: one key, weight one, threshold one.
    #[must_use]
    pub fn single_key(key: PublicKey) -> Self {
        let mut key_auths = BTreeMap::new();
        key_auths.insert(key, 1);
        Self { weight_threshold: 1, key_auths }
    }

    /// Structural validation.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] for a zero threshold, an empty
    /// key set, a zero weight, or a threshold no combination of keys can
    /// reach.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let invalid = |detail: &'static str| ProtocolError::Validation {
            message: detail.into(),
            context: Some("authority".into()),
        };

        if self.weight_threshold == 0 {
            return Err(invalid("Weight threshold may not be zero"));
        }
        if self.key_auths.is_empty() {
            return Err(invalid("Authority requires at least one key"));
        }
        if self.key_auths.values().any(|&w| w == 0) {
            return Err(invalid("Key weights may not be zero"));
        }

        let total: u64 = self.key_auths.values().map(|&w| u64::from(w)).sum();
        if total < u64::from(self.weight_threshold) {
            return Err(invalid("Threshold is unreachable by the listed keys"));
        }

        Ok(())
    }

    /// Whether the given keys carry enough weight to satisfy this authority.
    #[must_use]
    pub fn is_satisfied_by(&self, provided: &BTreeSet<PublicKey>) -> bool {
        let mut total: u64 = 0;
        for key in provided {
            if let Some(&weight) = self.key_auths.get(key) {
                total += u64::from(weight);
                if total >= u64::from(self.weight_threshold) {
                    return true;
                }
            }
        }
        false
    }

    /// Iterates over the authority's keys.
    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.key_auths.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn key(seed: &str) -> PublicKey {
        PrivateKey::regenerate(seed).public_key()
    }

    #[test]
    fn single_key_authority_is_satisfied_by_its_key() {
        let k = key("owner");
        let auth = Authority::single_key(k);
        auth.validate().unwrap();

        let mut provided = BTreeSet::new();
        assert!(!auth.is_satisfied_by(&provided));
        provided.insert(k);
        assert!(auth.is_satisfied_by(&provided));
    }

    #[test]
    fn weights_accumulate_to_the_threshold() {
        let (a, b, c) = (key("a"), key("b"), key("c"));
        let mut key_auths = BTreeMap::new();
        key_auths.insert(a, 1);
        key_auths.insert(b, 1);
        key_auths.insert(c, 2);
        let auth = Authority { weight_threshold: 2, key_auths };
        auth.validate().unwrap();

        let mut provided = BTreeSet::new();
        provided.insert(a);
        assert!(!auth.is_satisfied_by(&provided));
        provided.insert(b);
        assert!(auth.is_satisfied_by(&provided));

        let mut only_c = BTreeSet::new();
        only_c.insert(c);
        assert!(auth.is_satisfied_by(&only_c));
    }

    #[test]
    fn degenerate_authorities_fail_validation() {
        let k = key("x");

        let mut auth = Authority::single_key(k);
        auth.weight_threshold = 0;
        assert!(auth.validate().is_err());

        let empty = Authority { weight_threshold: 1, key_auths: BTreeMap::new() };
        assert!(empty.validate().is_err());

        let mut unreachable = Authority::single_key(k);
        unreachable.weight_threshold = 5;
        assert!(unreachable.validate().is_err());
    }
}
