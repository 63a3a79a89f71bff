//! Operation evaluators: how each operation mutates the chain state.
//!
//! Structural validation has already happened by the time an evaluator runs;
//! evaluators enforce the state-dependent rules and perform the mutation.

use crate::error::ChainError;
use crate::objects::WitnessObject;
use crate::state::State;
use stx_protocol::operations::{
    AccountCreateOperation, AccountDeleteOperation, AccountUpdateOperation,
    AccountWitnessVoteOperation, TransferOperation, TransferToVestingOperation,
    WithdrawVestingOperation, WitnessStopOperation, WitnessUpdateOperation,
};
use stx_protocol::{
    AccountName, Asset, Operation, SPHTX_SYMBOL, TimePointSec, VESTS_SYMBOL, derive_account_name,
};

fn rejected(message: String) -> ChainError {
    ChainError::OperationRejected { message: message.into(), context: None }
}

/// Applies one operation to the state at the given chain time.
///
/// # Errors
///
/// Returns the evaluator's specific rejection when the operation cannot
/// apply against the current state.
pub fn apply_operation(
    state: &mut State,
    op: &Operation,
    now: TimePointSec,
) -> Result<(), ChainError> {
    match op {
        Operation::AccountCreate(op) => account_create(state, op, now),
        Operation::AccountUpdate(op) => account_update(state, op),
        Operation::AccountDelete(op) => account_delete(state, op),
        Operation::Transfer(op) => transfer(state, op),
        Operation::TransferToVesting(op) => transfer_to_vesting(state, op),
        Operation::WithdrawVesting(op) => withdraw_vesting(state, op, now),
        Operation::WitnessUpdate(op) => witness_update(state, op, now),
        Operation::WitnessStop(op) => witness_stop(state, op),
        Operation::AccountWitnessVote(op) => account_witness_vote(state, op),
        // Custom payloads are consensus-neutral; plugins interpret them
        // through the observer notifications.
        Operation::CustomJson(_) | Operation::CustomBinary(_) => Ok(()),
    }
}

fn account_create(
    state: &mut State,
    op: &AccountCreateOperation,
    now: TimePointSec,
) -> Result<(), ChainError> {
    state.get_account(&op.creator)?;

    let name = derive_account_name(&op.name_seed);
    if state.accounts.contains_key(&name) {
        return Err(rejected(format!(
            "Account '{name}' (seed '{}') already exists",
            op.name_seed
        )));
    }

    let mut account = crate::objects::AccountObject::new(
        name.clone(),
        op.owner.clone(),
        op.active.clone(),
        op.memo_key,
        now,
    );
    account.json_metadata = op.json_metadata.clone();
    state.accounts.insert(name, account);
    Ok(())
}

fn account_update(state: &mut State, op: &AccountUpdateOperation) -> Result<(), ChainError> {
    let account = state.get_account_mut(&op.account)?;
    if let Some(owner) = &op.owner {
        account.owner = owner.clone();
    }
    if let Some(active) = &op.active {
        account.active = active.clone();
    }
    account.memo_key = op.memo_key;
    account.json_metadata = op.json_metadata.clone();
    Ok(())
}

fn account_delete(state: &mut State, op: &AccountDeleteOperation) -> Result<(), ChainError> {
    let account = state.get_account(&op.account)?;
    if account.balance.amount != 0 || account.vesting_shares.amount != 0 {
        return Err(rejected(format!(
            "Account '{}' still holds funds; drain it before deletion",
            op.account
        )));
    }
    if state.witnesses.contains_key(&op.account) {
        return Err(rejected(format!(
            "Account '{}' is a witness; stop and remove it first",
            op.account
        )));
    }

    // Drained accounts carry no vote weight, so approvals vanish with them.
    state.accounts.remove(&op.account);
    Ok(())
}

fn transfer(state: &mut State, op: &TransferOperation) -> Result<(), ChainError> {
    state.get_account(&op.to)?;
    let from = state.get_account(&op.from)?;

    let held = match op.amount.symbol {
        s if s == SPHTX_SYMBOL => from.balance,
        s if s == VESTS_SYMBOL => from.vesting_shares,
        other => {
            return Err(rejected(format!("Transfers do not move '{other}' directly")));
        },
    };
    if held.amount < op.amount.amount {
        return Err(ChainError::InsufficientBalance {
            message: format!("'{}' holds {held}, needs {}", op.from, op.amount).into(),
            context: None,
        });
    }

    if op.amount.symbol == SPHTX_SYMBOL {
        let from = state.get_account_mut(&op.from)?;
        from.balance = from.balance.checked_sub(&op.amount)?;
        let to = state.get_account_mut(&op.to)?;
        to.balance = to.balance.checked_add(&op.amount)?;
    } else {
        let from = state.get_account_mut(&op.from)?;
        from.vesting_shares = from.vesting_shares.checked_sub(&op.amount)?;
        let to = state.get_account_mut(&op.to)?;
        to.vesting_shares = to.vesting_shares.checked_add(&op.amount)?;
    }
    Ok(())
}

fn transfer_to_vesting(
    state: &mut State,
    op: &TransferToVestingOperation,
) -> Result<(), ChainError> {
    let recipient = op.to.clone().unwrap_or_else(|| op.from.clone());
    state.get_account(&recipient)?;

    let from = state.get_account(&op.from)?;
    if from.balance.amount < op.amount.amount {
        return Err(ChainError::InsufficientBalance {
            message: format!("'{}' holds {}, needs {}", op.from, from.balance, op.amount).into(),
            context: None,
        });
    }

    // Vesting shares convert one to one on this chain.
    let vests = Asset::new(op.amount.amount, VESTS_SYMBOL);

    let from = state.get_account_mut(&op.from)?;
    from.balance = from.balance.checked_sub(&op.amount)?;
    let to = state.get_account_mut(&recipient)?;
    to.vesting_shares = to.vesting_shares.checked_add(&vests)?;

    state.dgp.total_vesting_shares = state.dgp.total_vesting_shares.checked_add(&vests)?;
    Ok(())
}

fn withdraw_vesting(
    state: &mut State,
    op: &WithdrawVestingOperation,
    now: TimePointSec,
) -> Result<(), ChainError> {
    let account = state.get_account_mut(&op.account)?;

    if op.vesting_shares.amount == 0 {
        // Cancels any running withdrawal.
        account.vesting_withdraw_rate = Asset::new(0, VESTS_SYMBOL);
        account.to_withdraw = Asset::new(0, VESTS_SYMBOL);
        account.withdrawn = Asset::new(0, VESTS_SYMBOL);
        account.next_vesting_withdrawal = None;
        return Ok(());
    }

    if account.vesting_shares.amount < op.vesting_shares.amount {
        return Err(ChainError::InsufficientBalance {
            message: format!(
                "'{}' holds {}, cannot withdraw {}",
                op.account, account.vesting_shares, op.vesting_shares
            )
            .into(),
            context: None,
        });
    }

    let intervals = i64::from(stx_protocol::config::VESTING_WITHDRAW_INTERVALS);
    let rate = (op.vesting_shares.amount / intervals).max(1);

    account.vesting_withdraw_rate = Asset::new(rate, VESTS_SYMBOL);
    account.to_withdraw = op.vesting_shares;
    account.withdrawn = Asset::new(0, VESTS_SYMBOL);
    account.next_vesting_withdrawal = Some(
        now.saturating_add_secs(stx_protocol::config::VESTING_WITHDRAW_INTERVAL_SECS),
    );
    Ok(())
}

fn witness_update(
    state: &mut State,
    op: &WitnessUpdateOperation,
    now: TimePointSec,
) -> Result<(), ChainError> {
    state.get_account(&op.owner)?;

    match state.witnesses.get_mut(&op.owner) {
        Some(witness) => {
            witness.url = op.url.clone();
            witness.signing_key = op.block_signing_key;
            witness.props = op.props.clone();
            witness.running = true;
        },
        None => {
            state.witnesses.insert(
                op.owner.clone(),
                WitnessObject {
                    owner: op.owner.clone(),
                    url: op.url.clone(),
                    signing_key: op.block_signing_key,
                    props: op.props.clone(),
                    total_missed: 0,
                    last_confirmed_block_num: 0,
                    running: true,
                    votes: 0,
                    created: now,
                },
            );
        },
    }
    Ok(())
}

fn witness_stop(state: &mut State, op: &WitnessStopOperation) -> Result<(), ChainError> {
    let witness =
        state.witnesses.get_mut(&op.owner).ok_or_else(|| ChainError::UnknownWitness {
            message: op.owner.to_string().into(),
            context: None,
        })?;
    witness.running = false;
    Ok(())
}

fn account_witness_vote(
    state: &mut State,
    op: &AccountWitnessVoteOperation,
) -> Result<(), ChainError> {
    state.get_witness(&op.witness)?;
    let account = state.get_account(&op.account)?;
    let weight = vote_weight(account.vesting_shares.amount);

    if op.approve {
        if account.witness_votes.contains(&op.witness) {
            return Err(rejected(format!(
                "'{}' already approves witness '{}'",
                op.account, op.witness
            )));
        }
        state.get_account_mut(&op.account)?.witness_votes.insert(op.witness.clone());
        if let Some(witness) = state.witnesses.get_mut(&op.witness) {
            witness.votes = witness.votes.saturating_add(weight);
        }
    } else {
        if !account.witness_votes.contains(&op.witness) {
            return Err(rejected(format!(
                "'{}' does not approve witness '{}'",
                op.account, op.witness
            )));
        }
        state.get_account_mut(&op.account)?.witness_votes.remove(&op.witness);
        if let Some(witness) = state.witnesses.get_mut(&op.witness) {
            witness.votes = witness.votes.saturating_sub(weight);
        }
    }
    Ok(())
}

fn vote_weight(vesting_satoshis: i64) -> u64 {
    u64::try_from(vesting_satoshis).unwrap_or(0)
}

/// Pays out any vesting withdrawals that have come due by `now`.
pub fn process_vesting_withdrawals(state: &mut State, now: TimePointSec) {
    let due: Vec<AccountName> = state
        .accounts
        .iter()
        .filter(|(_, account)| {
            account.next_vesting_withdrawal.is_some_and(|next| next <= now)
        })
        .map(|(name, _)| name.clone())
        .collect();

    for name in due {
        let Some(account) = state.accounts.get_mut(&name) else { continue };

        let remaining = account
            .to_withdraw
            .amount
            .saturating_sub(account.withdrawn.amount)
            .min(account.vesting_shares.amount);
        let payout = account.vesting_withdraw_rate.amount.min(remaining).max(0);

        if payout > 0 {
            account.vesting_shares.amount -= payout;
            account.balance.amount += payout;
            account.withdrawn.amount += payout;
        }

        if account.withdrawn.amount >= account.to_withdraw.amount || payout == 0 {
            account.vesting_withdraw_rate = Asset::new(0, VESTS_SYMBOL);
            account.next_vesting_withdrawal = None;
        } else {
            account.next_vesting_withdrawal = Some(
                now.saturating_add_secs(stx_protocol::config::VESTING_WITHDRAW_INTERVAL_SECS),
            );
        }

        let paid = Asset::new(payout, VESTS_SYMBOL);
        state.dgp.total_vesting_shares =
            state.dgp.total_vesting_shares.checked_sub(&paid).unwrap_or_else(|_| {
                tracing::warn!("Vesting ledger underflow; clamping to zero");
                Asset::new(0, VESTS_SYMBOL)
            });
    }
}
