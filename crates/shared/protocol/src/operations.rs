//! The operation set accepted by the debug node.
//!
//! Every operation knows its structural validation rules, its fee payer, and
//! the authorities a signed transaction must satisfy to carry it.

use crate::asset::{Asset, SPHTX_SYMBOL, VESTS_SYMBOL};
use crate::authority::Authority;
use crate::config::{
    MAX_CUSTOM_DATA_SIZE, MAX_MEMO_LENGTH, MAX_WITNESS_URL_LENGTH, MIN_BLOCK_SIZE_LIMIT,
};
use crate::crypto::PublicKey;
use crate::error::ProtocolError;
use crate::types::AccountName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn validation_error(message: String) -> ProtocolError {
    ProtocolError::Validation { message: message.into(), context: None }
}

fn require_json(field: &str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(value)
        .map(|_| ())
        .map_err(|e| validation_error(format!("{field} is not valid JSON: {e}")))
}

/// Creates a new account with a name derived from `name_seed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreateOperation {
    pub creator: AccountName,
    pub name_seed: String,
    pub owner: Authority,
    pub active: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

impl AccountCreateOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.name_seed.is_empty() || self.name_seed.len() > 32 {
            return Err(validation_error("name_seed must be 1..=32 characters".to_owned()));
        }
        self.owner.validate()?;
        self.active.validate()?;
        require_json("json_metadata", &self.json_metadata)
    }
}

/// Replaces an account's authorities, memo key, or metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateOperation {
    pub account: AccountName,
    pub owner: Option<Authority>,
    pub active: Option<Authority>,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

impl AccountUpdateOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        if let Some(owner) = &self.owner {
            owner.validate()?;
        }
        if let Some(active) = &self.active {
            active.validate()?;
        }
        require_json("json_metadata", &self.json_metadata)
    }
}

/// Removes an account. Rejected while balances remain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeleteOperation {
    pub account: AccountName,
}

/// Moves SPHTX between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOperation {
    pub from: AccountName,
    /// Account to transfer asset to
    pub to: AccountName,
    /// The amount of asset to transfer from `from` to `to`
    pub amount: Asset,
    /// The memo is plain-text, any encryption on the memo is up to
    /// a higher level protocol.
    pub memo: String,
}

impl TransferOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        self.amount.validate()?;
        if self.amount.amount <= 0 {
            return Err(validation_error(format!("Cannot transfer {}", self.amount)));
        }
        if self.from == self.to {
            return Err(validation_error("Cannot transfer to self".to_owned()));
        }
        if self.memo.len() > MAX_MEMO_LENGTH {
            return Err(validation_error(format!(
                "Memo exceeds {MAX_MEMO_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

/// Converts liquid SPHTX into vesting shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferToVestingOperation {
    pub from: AccountName,
    /// Defaults to `from` when absent.
    pub to: Option<AccountName>,
    pub amount: Asset,
}

impl TransferToVestingOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        self.amount.validate()?;
        if self.amount.symbol != SPHTX_SYMBOL {
            return Err(validation_error(format!(
                "Vesting deposits take SPHTX, not {}",
                self.amount.symbol
            )));
        }
        if self.amount.amount <= 0 {
            return Err(validation_error(format!("Cannot vest {}", self.amount)));
        }
        Ok(())
    }
}

/// Starts (or resets) a staged withdrawal of vesting shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawVestingOperation {
    pub account: AccountName,
    /// Zero cancels a running withdrawal.
    pub vesting_shares: Asset,
}

impl WithdrawVestingOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.vesting_shares.symbol != VESTS_SYMBOL {
            return Err(validation_error(format!(
                "Withdrawals take VESTS, not {}",
                self.vesting_shares.symbol
            )));
        }
        if self.vesting_shares.amount < 0 {
            return Err(validation_error(format!(
                "Cannot withdraw {}",
                self.vesting_shares
            )));
        }
        Ok(())
    }
}

/// Witness-published chain parameters; the round median takes effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub account_creation_fee: Asset,
    pub maximum_block_size: u32,
}

impl Default for ChainProperties {
    fn default() -> Self {
        Self {
            account_creation_fee: Asset::new(0, SPHTX_SYMBOL),
            maximum_block_size: crate::config::DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

impl ChainProperties {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.account_creation_fee.symbol != SPHTX_SYMBOL {
            return Err(validation_error("Account creation fee must be SPHTX".to_owned()));
        }
        self.account_creation_fee.validate()?;
        if self.maximum_block_size < MIN_BLOCK_SIZE_LIMIT {
            return Err(validation_error(format!(
                "maximum_block_size below the protocol floor of {MIN_BLOCK_SIZE_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Registers or updates a block-producing witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessUpdateOperation {
    pub owner: AccountName,
    pub url: String,
    pub block_signing_key: PublicKey,
    pub props: ChainProperties,
}

impl WitnessUpdateOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.url.is_empty() || self.url.len() > MAX_WITNESS_URL_LENGTH {
            return Err(validation_error(format!(
                "Witness URL must be 1..={MAX_WITNESS_URL_LENGTH} bytes"
            )));
        }
        self.props.validate()
    }
}

/// Takes a witness out of the schedule without deleting its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessStopOperation {
    pub owner: AccountName,
}

/// Approves or revokes a witness vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWitnessVoteOperation {
    pub account: AccountName,
    pub witness: AccountName,
    pub approve: bool,
}

/// An application-defined JSON payload, interpreted off-consensus by plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomJsonOperation {
    pub app_id: u64,
    pub sender: AccountName,
    pub recipients: Vec<AccountName>,
    pub json: String,
}

impl CustomJsonOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.json.is_empty() {
            return Err(validation_error("custom_json payload may not be empty".to_owned()));
        }
        if self.json.len() > MAX_CUSTOM_DATA_SIZE {
            return Err(validation_error(format!(
                "custom_json payload exceeds {MAX_CUSTOM_DATA_SIZE} bytes"
            )));
        }
        require_json("json", &self.json)
    }
}

/// An application-defined binary payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomBinaryOperation {
    pub app_id: u64,
    pub sender: AccountName,
    pub recipients: Vec<AccountName>,
    #[serde(with = "bytes_as_hex")]
    pub data: Vec<u8>,
}

impl CustomBinaryOperation {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.data.is_empty() {
            return Err(validation_error("custom_binary payload may not be empty".to_owned()));
        }
        if self.data.len() > MAX_CUSTOM_DATA_SIZE {
            return Err(validation_error(format!(
                "custom_binary payload exceeds {MAX_CUSTOM_DATA_SIZE} bytes"
            )));
        }
        Ok(())
    }
}

/// Helper module for transparently serializing byte buffers to hex strings.
pub mod bytes_as_hex {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            String::serialize(&hex::encode(v), s)
        } else {
            v.serialize(s)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        if d.is_human_readable() {
            let raw = String::deserialize(d)?;
            hex::decode(&raw).map_err(|e| serde::de::Error::custom(format!("Invalid hex: {e}")))
        } else {
            Vec::<u8>::deserialize(d)
        }
    }
}

/// Everything a transaction can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum_macros::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    AccountCreate(AccountCreateOperation),
    AccountUpdate(AccountUpdateOperation),
    AccountDelete(AccountDeleteOperation),
    Transfer(TransferOperation),
    TransferToVesting(TransferToVestingOperation),
    WithdrawVesting(WithdrawVestingOperation),
    WitnessUpdate(WitnessUpdateOperation),
    WitnessStop(WitnessStopOperation),
    AccountWitnessVote(AccountWitnessVoteOperation),
    CustomJson(CustomJsonOperation),
    CustomBinary(CustomBinaryOperation),
}

impl Operation {
    /// The operation's wire name, e.g. `transfer`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Structural validation, independent of chain state.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] (or a more specific variant)
    /// when a field violates its rules.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::AccountCreate(op) => op.validate(),
            Self::AccountUpdate(op) => op.validate(),
            Self::AccountDelete(_) | Self::WitnessStop(_) | Self::AccountWitnessVote(_) => Ok(()),
            Self::Transfer(op) => op.validate(),
            Self::TransferToVesting(op) => op.validate(),
            Self::WithdrawVesting(op) => op.validate(),
            Self::WitnessUpdate(op) => op.validate(),
            Self::CustomJson(op) => op.validate(),
            Self::CustomBinary(op) => op.validate(),
        }
    }

    /// The account charged for this operation.
    #[must_use]
    pub fn fee_payer(&self) -> &AccountName {
        match self {
            Self::AccountCreate(op) => &op.creator,
            Self::AccountUpdate(op) => &op.account,
            Self::AccountDelete(op) => &op.account,
            Self::Transfer(op) => &op.from,
            Self::TransferToVesting(op) => &op.from,
            Self::WithdrawVesting(op) => &op.account,
            Self::WitnessUpdate(op) => &op.owner,
            Self::WitnessStop(op) => &op.owner,
            Self::AccountWitnessVote(op) => &op.account,
            Self::CustomJson(op) => &op.sender,
            Self::CustomBinary(op) => &op.sender,
        }
    }

    /// Accounts whose **active** authority must sign.
    pub fn required_active_authorities(&self, out: &mut BTreeSet<AccountName>) {
        match self {
            Self::AccountCreate(op) => {
                out.insert(op.creator.clone());
            },
            // Changing the owner authority escalates to the owner key.
            Self::AccountUpdate(op) if op.owner.is_none() => {
                out.insert(op.account.clone());
            },
            Self::AccountUpdate(_) | Self::AccountDelete(_) => {},
            Self::Transfer(op) if op.amount.symbol != VESTS_SYMBOL => {
                out.insert(op.from.clone());
            },
            Self::Transfer(_) => {},
            Self::TransferToVesting(op) => {
                out.insert(op.from.clone());
            },
            Self::WithdrawVesting(op) => {
                out.insert(op.account.clone());
            },
            Self::WitnessUpdate(op) => {
                out.insert(op.owner.clone());
            },
            Self::WitnessStop(op) => {
                out.insert(op.owner.clone());
            },
            Self::AccountWitnessVote(op) => {
                out.insert(op.account.clone());
            },
            Self::CustomJson(op) => {
                out.insert(op.sender.clone());
            },
            Self::CustomBinary(op) => {
                out.insert(op.sender.clone());
            },
        }
    }

    /// Accounts whose **owner** authority must sign.
    pub fn required_owner_authorities(&self, out: &mut BTreeSet<AccountName>) {
        match self {
            Self::AccountUpdate(op) if op.owner.is_some() => {
                out.insert(op.account.clone());
            },
            Self::AccountDelete(op) => {
                out.insert(op.account.clone());
            },
            // Moving vesting shares is guarded by the owner key.
            Self::Transfer(op) if op.amount.symbol == VESTS_SYMBOL => {
                out.insert(op.from.clone());
            },
            _ => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn transfer(amount: Asset) -> TransferOperation {
        TransferOperation {
            from: name("alice"),
            to: name("bobby"),
            amount,
            memo: String::new(),
        }
    }

    #[test]
    fn transfer_validation() {
        transfer(Asset::sphtx(1)).validate().unwrap();
        assert!(transfer(Asset::new(0, SPHTX_SYMBOL)).validate().is_err());
        assert!(transfer(Asset::new(-5, SPHTX_SYMBOL)).validate().is_err());

        let mut self_send = transfer(Asset::sphtx(1));
        self_send.to = self_send.from.clone();
        assert!(self_send.validate().is_err());

        let mut long_memo = transfer(Asset::sphtx(1));
        long_memo.memo = "m".repeat(MAX_MEMO_LENGTH + 1);
        assert!(long_memo.validate().is_err());
    }

    #[test]
    fn transfer_authority_depends_on_symbol() {
        let mut active = BTreeSet::new();
        let mut owner = BTreeSet::new();

        let liquid = Operation::Transfer(transfer(Asset::sphtx(1)));
        liquid.required_active_authorities(&mut active);
        liquid.required_owner_authorities(&mut owner);
        assert!(active.contains(&name("alice")));
        assert!(owner.is_empty());

        active.clear();
        let vesting = Operation::Transfer(transfer(Asset::vests(1)));
        vesting.required_active_authorities(&mut active);
        vesting.required_owner_authorities(&mut owner);
        assert!(active.is_empty());
        assert!(owner.contains(&name("alice")));
    }

    #[test]
    fn account_update_escalates_to_owner_when_owner_changes() {
        let key = PrivateKey::regenerate("k").public_key();
        let mut op = AccountUpdateOperation {
            account: name("alice"),
            owner: None,
            active: None,
            memo_key: key,
            json_metadata: String::new(),
        };

        let mut active = BTreeSet::new();
        let mut owner = BTreeSet::new();
        Operation::AccountUpdate(op.clone()).required_active_authorities(&mut active);
        Operation::AccountUpdate(op.clone()).required_owner_authorities(&mut owner);
        assert!(active.contains(&name("alice")) && owner.is_empty());

        active.clear();
        op.owner = Some(Authority::single_key(key));
        Operation::AccountUpdate(op.clone()).required_active_authorities(&mut active);
        Operation::AccountUpdate(op).required_owner_authorities(&mut owner);
        assert!(active.is_empty() && owner.contains(&name("alice")));
    }

    #[test]
    fn custom_json_requires_valid_payload() {
        let mut op = CustomJsonOperation {
            app_id: 1,
            sender: name("alice"),
            recipients: vec![],
            json: r#"{"action":"create_token"}"#.to_owned(),
        };
        op.validate().unwrap();

        op.json = "not json".to_owned();
        assert!(op.validate().is_err());

        op.json = String::new();
        assert!(op.validate().is_err());
    }

    #[test]
    fn operation_names_follow_the_wire_convention() {
        let op = Operation::Transfer(transfer(Asset::sphtx(1)));
        assert_eq!(op.name(), "transfer");

        let vote = Operation::AccountWitnessVote(AccountWitnessVoteOperation {
            account: name("alice"),
            witness: name("initminer"),
            approve: true,
        });
        assert_eq!(vote.name(), "account_witness_vote");
    }

    #[test]
    fn witness_props_guard_the_block_size_floor() {
        let mut props = ChainProperties::default();
        props.validate().unwrap();
        props.maximum_block_size = 1024;
        assert!(props.validate().is_err());
    }
}
