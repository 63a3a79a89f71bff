//! Blocks: headers, witness signatures, and the transaction merkle tree.

use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::error::ProtocolError;
use crate::transaction::SignedTransaction;
use crate::types::{AccountName, BlockId, Digest, TimePointSec, sha256, sha256_pair};
use serde::{Deserialize, Serialize};

/// The part of a block every node agrees on before the witness signs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    pub previous: BlockId,
    pub timestamp: TimePointSec,
    pub witness: AccountName,
    pub transaction_merkle_root: Digest,
}

impl BlockHeader {
    /// The number this block occupies: one past its predecessor.
    #[must_use]
    pub fn block_num(&self) -> u32 {
        self.previous.block_num() + 1
    }

    /// Digest of the canonical header encoding; what the witness signs.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn digest(&self) -> Result<Digest, ProtocolError> {
        Ok(Digest(sha256(&postcard::to_stdvec(self)?)))
    }

    /// The block id: the header digest with the block number embedded.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn id(&self) -> Result<BlockId, ProtocolError> {
        Ok(BlockId::from_digest(self.digest()?, self.block_num()))
    }
}

/// A full block: header, witness signature, and payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub signing_key: PublicKey,
    pub witness_signature: Signature,
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    #[must_use]
    pub fn block_num(&self) -> u32 {
        self.header.block_num()
    }

    /// The block id, derived purely from the header.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn id(&self) -> Result<BlockId, ProtocolError> {
        self.header.id()
    }

    /// Signs the header with the producing witness key.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<(), ProtocolError> {
        self.signing_key = key.public_key();
        self.witness_signature = key.sign(&self.header.digest()?);
        Ok(())
    }

    /// Verifies the witness signature against the attached signing key.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Crypto`] when the signature does not verify.
    pub fn verify_witness_signature(&self) -> Result<(), ProtocolError> {
        self.signing_key.verify(&self.header.digest()?, &self.witness_signature)
    }

    /// Root of the transaction merkle tree.
    ///
    /// Leaves are the digests of the full signed transactions. Pairs hash
    /// together level by level; an odd node is carried up unchanged. An empty
    /// block has the zero root.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encoding`] if serialization fails.
    pub fn calculate_merkle_root(&self) -> Result<Digest, ProtocolError> {
        if self.transactions.is_empty() {
            return Ok(Digest::default());
        }

        let mut level: Vec<Digest> = self
            .transactions
            .iter()
            .map(SignedTransaction::merkle_digest)
            .collect::<Result<_, _>>()?;

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match pair {
                    [left, right] => {
                        next.push(Digest(sha256_pair(left.as_bytes(), right.as_bytes())));
                    },
                    [lone] => next.push(*lone),
                    _ => unreachable!("chunks(2) yields one- or two-element slices"),
                }
            }
            level = next;
        }

        Ok(level[0])
    }
}
