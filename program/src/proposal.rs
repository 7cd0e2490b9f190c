//! Proposal engine: create, approve, reject, execute.
//!
//! Status transitions are one-directional: `pending` moves to exactly one
//! of `executed`, `rejected` or `expired`, and attempts against a
//! non-pending proposal fail with a status-conflict error. Expiry is
//! evaluated lazily wherever a pending proposal is touched; no background
//! process exists.

use crate::address::{signature_address, Address};
use crate::error::{CustodyError, Result};
use crate::events::Event;
use crate::instruction::InstructionContext;
use crate::ledger::{Account, AccountData, Env};
use crate::message::{approve_message, reject_message, ACTION_TRANSFER};
use crate::state::{
    Guardian, Proposal, ProposalSignature, ProposalStatus, ActionParams, MAX_DESCRIPTION_LEN,
    TIMESTAMP_FUTURE_TOLERANCE_SECS, TIMESTAMP_MAX_AGE_SECS,
};
use crate::wallet::execute_transfer;

/// Load a proposal and require it to be pending and unexpired.
///
/// An expired-but-still-pending proposal fails the attempted action with
/// [`CustodyError::ProposalExpired`]; the persistent flip to `Expired`
/// happens on the read path ([`crate::ledger::Ledger::proposal_status`]),
/// since a failing transaction commits nothing.
fn load_pending(env: &Env, wallet: &Address, proposal_id: u64) -> Result<(Address, Proposal)> {
    let (address, proposal) = env.proposal(wallet, proposal_id)?;
    if proposal.is_expired_at(env.now) {
        return Err(CustodyError::ProposalExpired);
    }
    if proposal.status != ProposalStatus::Pending {
        return Err(CustodyError::ProposalNotPending);
    }
    Ok((address, proposal))
}

/// Load an active guardian of `wallet`.
fn load_active_guardian(env: &Env, wallet: &Address, guardian_id: u64) -> Result<Guardian> {
    let (_, guardian) = env.guardian(wallet, guardian_id)?;
    if !guardian.is_active {
        return Err(CustodyError::InactiveGuardian);
    }
    Ok(guardian)
}

/// Reject timestamps outside the signing window.
fn check_timestamp_window(now: i64, timestamp: i64) -> Result<()> {
    if timestamp > now + TIMESTAMP_FUTURE_TOLERANCE_SECS {
        return Err(CustodyError::FutureTimestamp);
    }
    if timestamp < now - TIMESTAMP_MAX_AGE_SECS {
        return Err(CustodyError::ExpiredTimestamp);
    }
    Ok(())
}

/// When the guardian has a registered key, require a matching preceding
/// verification entry over `challenge`. Guardians without a key
/// participate in quorum decisions without one.
fn check_guardian_assertion(
    ctx: &InstructionContext,
    guardian: &Guardian,
    challenge: &str,
) -> Result<()> {
    match &guardian.public_key {
        Some(public_key) => ctx.expect_verification(public_key, challenge.as_bytes()),
        None => Ok(()),
    }
}

/// Open a proposal for quorum approval.
///
/// `required_signatures` snapshots the wallet threshold at creation time;
/// later threshold changes do not retroactively apply.
pub(crate) fn create_proposal(
    env: &mut Env,
    wallet_addr: &Address,
    proposal_id: u64,
    proposer_guardian_id: u64,
    description: &str,
    action: &str,
    params: &ActionParams,
) -> Result<()> {
    let wallet = env.wallet(wallet_addr)?;
    load_active_guardian(env, wallet_addr, proposer_guardian_id)?;

    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(CustodyError::DescriptionTooLong(MAX_DESCRIPTION_LEN));
    }
    if action != ACTION_TRANSFER {
        return Err(CustodyError::UnsupportedAction(action.to_string()));
    }

    let (address, bump) = crate::address::proposal_address(&env.program_id, wallet_addr, proposal_id)?;
    let proposal = Proposal {
        wallet: *wallet_addr,
        proposal_id,
        proposer: env.payer,
        description: description.to_string(),
        action: action.to_string(),
        params: params.clone(),
        status: ProposalStatus::Pending,
        created_at: env.now,
        executed_at: None,
        signatures_count: 0,
        required_signatures: wallet.threshold,
        bump,
    };
    env.create_account(
        address,
        Account {
            lamports: 0,
            data: AccountData::Proposal(proposal),
        },
    )?;

    env.record(Event::ProposalCreated {
        wallet: *wallet_addr,
        proposal_id,
        required_signatures: wallet.threshold,
    });
    Ok(())
}

/// Record one guardian's approval.
///
/// The signature record's derived address makes a second approval from the
/// same guardian fail with [`CustodyError::DuplicateSignature`]. Reaching
/// the required count makes the proposal eligible for execution but does
/// not auto-execute it.
pub(crate) fn approve_proposal(
    env: &mut Env,
    ctx: &InstructionContext,
    wallet_addr: &Address,
    proposal_id: u64,
    guardian_id: u64,
    timestamp: i64,
) -> Result<()> {
    let (proposal_addr, mut proposal) = load_pending(env, wallet_addr, proposal_id)?;
    let guardian = load_active_guardian(env, wallet_addr, guardian_id)?;

    check_timestamp_window(env.now, timestamp)?;
    check_guardian_assertion(ctx, &guardian, &approve_message(proposal_id, timestamp))?;

    let (signature_addr, bump) = signature_address(&env.program_id, &proposal_addr, guardian_id)?;
    let signature = ProposalSignature {
        proposal: proposal_addr,
        guardian_id,
        signature_time: env.now,
        bump,
    };
    env.create_account(
        signature_addr,
        Account {
            lamports: 0,
            data: AccountData::ProposalSignature(signature),
        },
    )
    .map_err(|err| match err {
        CustodyError::AccountExists => CustodyError::DuplicateSignature,
        other => other,
    })?;

    proposal.signatures_count += 1;
    let signatures_count = proposal.signatures_count;
    env.store_proposal(proposal_addr, proposal);

    env.record(Event::ProposalApproved {
        wallet: *wallet_addr,
        proposal_id,
        guardian_id,
        signatures_count,
    });
    Ok(())
}

/// Veto a proposal.
///
/// A single authenticated rejection from any active guardian finalizes the
/// proposal as `rejected`.
pub(crate) fn reject_proposal(
    env: &mut Env,
    ctx: &InstructionContext,
    wallet_addr: &Address,
    proposal_id: u64,
    guardian_id: u64,
    timestamp: i64,
) -> Result<()> {
    let (proposal_addr, mut proposal) = load_pending(env, wallet_addr, proposal_id)?;
    let guardian = load_active_guardian(env, wallet_addr, guardian_id)?;

    check_timestamp_window(env.now, timestamp)?;
    check_guardian_assertion(ctx, &guardian, &reject_message(proposal_id, timestamp))?;

    proposal.status = ProposalStatus::Rejected;
    env.store_proposal(proposal_addr, proposal);

    env.record(Event::ProposalRejected {
        wallet: *wallet_addr,
        proposal_id,
        guardian_id,
    });
    env.record(Event::ProposalStatusChanged {
        wallet: *wallet_addr,
        proposal_id,
        status: ProposalStatus::Rejected,
    });
    Ok(())
}

/// Execute a proposal that has collected its required approvals.
pub(crate) fn execute_proposal(
    env: &mut Env,
    wallet_addr: &Address,
    proposal_id: u64,
) -> Result<()> {
    let (proposal_addr, mut proposal) = load_pending(env, wallet_addr, proposal_id)?;

    if proposal.signatures_count < proposal.required_signatures {
        return Err(CustodyError::ThresholdNotMet);
    }

    match proposal.action.as_str() {
        ACTION_TRANSFER => execute_transfer(env, wallet_addr, &proposal.params)?,
        other => return Err(CustodyError::UnsupportedAction(other.to_string())),
    }

    proposal.status = ProposalStatus::Executed;
    proposal.executed_at = Some(env.now);
    env.store_proposal(proposal_addr, proposal);

    let mut wallet = env.wallet(wallet_addr)?;
    wallet.transaction_nonce += 1;
    wallet.last_transaction_timestamp = env.now;
    env.store_wallet(*wallet_addr, wallet);

    env.record(Event::ProposalStatusChanged {
        wallet: *wallet_addr,
        proposal_id,
        status: ProposalStatus::Executed,
    });
    Ok(())
}
