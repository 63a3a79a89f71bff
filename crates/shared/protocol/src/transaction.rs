//! Transactions: reference-block anchoring, digests, signing, and authority
//! verification.

use crate::authority::Authority;
use crate::config::MAX_TRANSACTION_SIZE;
use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::error::ProtocolError;
use crate::operations::Operation;
use crate::types::{BlockId, ChainId, Digest, TimePointSec, TransactionId, sha256_pair};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An unsigned transaction.
///
/// `ref_block_num`/`ref_block_prefix` anchor the transaction to a recent
/// block (TaPoS), and `expiration` bounds how long it may float before a
/// block includes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Transaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: TimePointSec,
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Structural validation of the transaction and all carried operations.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] for an empty or oversized
    /// transaction, and each operation's own error for field violations.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.operations.is_empty() {
            return Err(ProtocolError::Validation {
                message: "A transaction must have at least one operation".into(),
                context: None,
            });
        }
        for op in &self.operations {
            op.validate()?;
        }
        if self.encoded()?.len() > MAX_TRANSACTION_SIZE {
            return Err(ProtocolError::Validation {
                message: format!("Transaction exceeds {MAX_TRANSACTION_SIZE} bytes").into(),
                context: None,
            });
        }
        Ok(())
    }

    /// Canonical binary encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn encoded(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(postcard::to_stdvec(self)?)
    }

    /// Digest of the canonical encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn digest(&self) -> Result<Digest, ProtocolError> {
        Ok(Digest(crate::types::sha256(&self.encoded()?)))
    }

    /// The transaction id: its digest, independent of signatures.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn id(&self) -> Result<TransactionId, ProtocolError> {
        Ok(TransactionId(self.digest()?.0))
    }

    /// Digest that signatures cover: the chain id followed by the
    /// transaction, so signatures never replay across chains.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn sig_digest(&self, chain_id: &ChainId) -> Result<Digest, ProtocolError> {
        Ok(Digest(sha256_pair(chain_id.as_bytes(), &self.encoded()?)))
    }

    /// Anchors this transaction to `reference_block` for TaPoS.
    pub fn set_reference_block(&mut self, reference_block: &BlockId) {
        self.ref_block_num = (reference_block.block_num() & 0xFFFF) as u16;
        self.ref_block_prefix = reference_block.tapos_prefix();
    }

    pub fn set_expiration(&mut self, expiration: TimePointSec) {
        self.expiration = expiration;
    }

    /// Accounts whose active/owner authorities this transaction requires.
    #[must_use]
    pub fn required_authorities(&self) -> RequiredAuthorities {
        let mut required = RequiredAuthorities::default();
        for op in &self.operations {
            op.required_active_authorities(&mut required.active);
            op.required_owner_authorities(&mut required.owner);
        }
        required
    }
}

/// The accounts a transaction needs signatures for, split by authority level.
#[derive(Debug, Clone, Default)]
pub struct RequiredAuthorities {
    pub active: BTreeSet<crate::types::AccountName>,
    pub owner: BTreeSet<crate::types::AccountName>,
}

/// One signature together with the key that produced it.
///
/// Ed25519 cannot recover the signer from a signature, so the key rides along
/// and verification checks both that the signature is valid for the key and
/// that the key satisfies the required authorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub key: PublicKey,
    pub signature: Signature,
}

/// A transaction plus its signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedTransaction {
    pub trx: Transaction,
    pub signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    #[must_use]
    pub fn new(trx: Transaction) -> Self {
        Self { trx, signatures: Vec::new() }
    }

    /// Appends a signature over this transaction for `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn sign(&mut self, key: &PrivateKey, chain_id: &ChainId) -> Result<(), ProtocolError> {
        let digest = self.trx.sig_digest(chain_id)?;
        self.signatures
            .push(TransactionSignature { key: key.public_key(), signature: key.sign(&digest) });
        Ok(())
    }

    /// Digest of the full signed transaction, used as a merkle leaf.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn merkle_digest(&self) -> Result<Digest, ProtocolError> {
        Ok(Digest(crate::types::sha256(&postcard::to_stdvec(self)?)))
    }

    /// Verifies every attached signature and returns the signer set.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Crypto`] for an invalid signature and
    /// [`ProtocolError::DuplicateSignature`] when one key signed twice.
    pub fn signature_keys(&self, chain_id: &ChainId) -> Result<BTreeSet<PublicKey>, ProtocolError> {
        let digest = self.trx.sig_digest(chain_id)?;
        let mut keys = BTreeSet::new();

        for sig in &self.signatures {
            sig.key.verify(&digest, &sig.signature)?;
            if !keys.insert(sig.key) {
                return Err(ProtocolError::DuplicateSignature {
                    message: sig.key.to_string().into(),
                    context: None,
                });
            }
        }

        Ok(keys)
    }

    /// Full authority check: signatures verify, and every required account
    /// authority is satisfied by the signing keys.
    ///
    /// The authority resolvers return `None` for unknown accounts, which
    /// fails the check.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingAuthority`] naming the unsatisfied
    /// account, or a crypto/duplicate error from signature verification.
    pub fn verify_authority<'a>(
        &self,
        chain_id: &ChainId,
        get_active: impl Fn(&crate::types::AccountName) -> Option<&'a Authority>,
        get_owner: impl Fn(&crate::types::AccountName) -> Option<&'a Authority>,
    ) -> Result<(), ProtocolError> {
        let keys = self.signature_keys(chain_id)?;
        let required = self.trx.required_authorities();

        for account in &required.active {
            // The owner authority may always stand in for active.
            let active_ok =
                get_active(account).is_some_and(|auth| auth.is_satisfied_by(&keys));
            let owner_ok = get_owner(account).is_some_and(|auth| auth.is_satisfied_by(&keys));
            if !active_ok && !owner_ok {
                return Err(ProtocolError::MissingAuthority {
                    message: format!("Missing active authority for {account}").into(),
                    context: None,
                });
            }
        }

        for account in &required.owner {
            let owner_ok = get_owner(account).is_some_and(|auth| auth.is_satisfied_by(&keys));
            if !owner_ok {
                return Err(ProtocolError::MissingAuthority {
                    message: format!("Missing owner authority for {account}").into(),
                    context: None,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::operations::TransferOperation;
    use crate::types::{AccountName, sha256};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn chain_id() -> ChainId {
        ChainId(sha256(b"test-chain"))
    }

    fn sample_transaction() -> Transaction {
        Transaction {
            ref_block_num: 42,
            ref_block_prefix: 7,
            expiration: TimePointSec::from_secs(1_537_000_000),
            operations: vec![Operation::Transfer(TransferOperation {
                from: name("alice"),
                to: name("bobby"),
                amount: Asset::sphtx(1),
                memo: String::new(),
            })],
        }
    }

    #[test]
    fn empty_transactions_are_invalid() {
        let trx = Transaction::default();
        assert!(trx.validate().is_err());
        sample_transaction().validate().unwrap();
    }

    #[test]
    fn ids_ignore_signatures() {
        let trx = sample_transaction();
        let unsigned_id = trx.id().unwrap();

        let mut signed = SignedTransaction::new(trx);
        signed.sign(&PrivateKey::regenerate("alice-active"), &chain_id()).unwrap();
        assert_eq!(signed.trx.id().unwrap(), unsigned_id);

        // The merkle leaf, by contrast, covers the signatures too.
        let leaf_signed = signed.merkle_digest().unwrap();
        signed.signatures.clear();
        assert_ne!(signed.merkle_digest().unwrap(), leaf_signed);
    }

    #[test]
    fn signature_keys_verify_and_reject_duplicates() {
        let key = PrivateKey::regenerate("alice-active");
        let mut signed = SignedTransaction::new(sample_transaction());
        signed.sign(&key, &chain_id()).unwrap();

        let keys = signed.signature_keys(&chain_id()).unwrap();
        assert!(keys.contains(&key.public_key()));

        signed.sign(&key, &chain_id()).unwrap();
        let err = signed.signature_keys(&chain_id()).unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateSignature { .. }));
    }

    #[test]
    fn signatures_are_chain_bound() {
        let key = PrivateKey::regenerate("alice-active");
        let mut signed = SignedTransaction::new(sample_transaction());
        signed.sign(&key, &chain_id()).unwrap();

        let other_chain = ChainId(sha256(b"other-chain"));
        assert!(signed.signature_keys(&other_chain).is_err());
    }

    #[test]
    fn authority_verification_accepts_owner_for_active() {
        let active_key = PrivateKey::regenerate("alice-active");
        let owner_key = PrivateKey::regenerate("alice-owner");
        let active_auth = Authority::single_key(active_key.public_key());
        let owner_auth = Authority::single_key(owner_key.public_key());

        let mut signed = SignedTransaction::new(sample_transaction());
        signed.sign(&owner_key, &chain_id()).unwrap();

        signed
            .verify_authority(
                &chain_id(),
                |_| Some(&active_auth),
                |_| Some(&owner_auth),
            )
            .unwrap();

        let stranger = PrivateKey::regenerate("mallory");
        let mut forged = SignedTransaction::new(sample_transaction());
        forged.sign(&stranger, &chain_id()).unwrap();
        let err = forged
            .verify_authority(&chain_id(), |_| Some(&active_auth), |_| Some(&owner_auth))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingAuthority { .. }));
    }

    #[test]
    fn reference_block_anchoring() {
        let digest = Digest(sha256(b"some header"));
        let id = BlockId::from_digest(digest, 0x0001_0002);

        let mut trx = sample_transaction();
        trx.set_reference_block(&id);
        assert_eq!(trx.ref_block_num, 2);
        assert_eq!(trx.ref_block_prefix, id.tapos_prefix());
    }

    #[test]
    fn canonical_encoding_round_trips() {
        let mut signed = SignedTransaction::new(sample_transaction());
        signed.sign(&PrivateKey::regenerate("alice-active"), &chain_id()).unwrap();

        let bytes = postcard::to_stdvec(&signed).unwrap();
        let decoded: SignedTransaction = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, signed);

        let json = serde_json::to_string(&signed).unwrap();
        let decoded: SignedTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, signed);
    }
}
