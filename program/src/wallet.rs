//! Wallet initialization and direct single-signer execution.
//!
//! `verify_and_execute` is the replay-protection core: an exact-match
//! nonce, a bounded timestamp window with distinct error kinds for each
//! edge, and an introspected native verification entry bound to the acting
//! guardian's registered key and the canonical message. Weakening any of
//! these checks reopens a replay vulnerability.

use crate::address::{wallet_address, Address};
use crate::error::{CustodyError, Result};
use crate::events::Event;
use crate::instruction::InstructionContext;
use crate::ledger::{Account, AccountData, Env};
use crate::message::{transfer_message, ACTION_TRANSFER};
use crate::state::{
    ActionParams, Wallet, MAX_CREDENTIAL_LEN, MAX_GUARDIANS, TIMESTAMP_FUTURE_TOLERANCE_SECS,
    TIMESTAMP_MAX_AGE_SECS,
};

/// Create the wallet account scoped by `credential_id`.
///
/// The wallet address is derived, never assigned; creating the same
/// credential scope twice fails with [`CustodyError::AccountExists`].
pub(crate) fn initialize_wallet(
    env: &mut Env,
    threshold: u8,
    credential_id: &[u8],
) -> Result<Address> {
    if threshold == 0 || threshold > MAX_GUARDIANS {
        return Err(CustodyError::InvalidThreshold);
    }
    if credential_id.is_empty() || credential_id.len() > MAX_CREDENTIAL_LEN {
        return Err(CustodyError::InvalidCredentialId(MAX_CREDENTIAL_LEN));
    }

    let (address, bump) = wallet_address(&env.program_id, credential_id)?;
    let wallet = Wallet {
        owner: env.payer,
        threshold,
        guardian_count: 0,
        credential_id: credential_id.to_vec(),
        recovery_nonce: 0,
        transaction_nonce: 0,
        last_transaction_timestamp: 0,
        bump,
    };
    env.create_account(
        address,
        Account {
            lamports: 0,
            data: AccountData::Wallet(wallet),
        },
    )?;

    env.record(Event::WalletInitialized {
        wallet: address,
        owner: env.payer,
        threshold,
    });
    Ok(address)
}

/// Authenticated direct execution.
///
/// # Errors
/// Replay class: [`CustodyError::NonceMismatch`] unless the nonce is
/// exactly the expected next value; [`CustodyError::FutureTimestamp`],
/// [`CustodyError::ExpiredTimestamp`] and [`CustodyError::OutdatedTimestamp`]
/// for the three timestamp-window edges. Authentication class when the
/// introspected verification entry is missing or does not match the
/// guardian's key and the canonical message.
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_and_execute(
    env: &mut Env,
    ctx: &InstructionContext,
    wallet_addr: &Address,
    guardian_id: u64,
    action: &str,
    params: &ActionParams,
    nonce: u64,
    timestamp: i64,
) -> Result<()> {
    let mut wallet = env.wallet(wallet_addr)?;
    let (_, guardian) = env.guardian(wallet_addr, guardian_id)?;

    if !guardian.is_owner {
        return Err(CustodyError::NotOwner);
    }
    if !guardian.is_active {
        return Err(CustodyError::InactiveGuardian);
    }
    let public_key = guardian.public_key.ok_or(CustodyError::MissingPublicKey)?;

    if nonce != wallet.expected_nonce() {
        return Err(CustodyError::NonceMismatch {
            expected: wallet.expected_nonce(),
            got: nonce,
        });
    }

    if timestamp > env.now + TIMESTAMP_FUTURE_TOLERANCE_SECS {
        return Err(CustodyError::FutureTimestamp);
    }
    if timestamp < wallet.last_transaction_timestamp {
        return Err(CustodyError::OutdatedTimestamp);
    }
    if timestamp < env.now - TIMESTAMP_MAX_AGE_SECS {
        return Err(CustodyError::ExpiredTimestamp);
    }

    let expected = match action {
        ACTION_TRANSFER => {
            let amount = params.amount.ok_or(CustodyError::MissingParam("amount"))?;
            let destination = params
                .destination
                .ok_or(CustodyError::MissingParam("destination"))?;
            transfer_message(amount, &destination, nonce, timestamp, &public_key)
        }
        other => return Err(CustodyError::UnsupportedAction(other.to_string())),
    };

    ctx.expect_verification(&public_key, expected.as_bytes())?;

    wallet.transaction_nonce = nonce;
    wallet.last_transaction_timestamp = timestamp;
    env.store_wallet(*wallet_addr, wallet);

    execute_transfer(env, wallet_addr, params)
}

/// Move lamports out of the wallet per `params`.
pub(crate) fn execute_transfer(
    env: &mut Env,
    wallet_addr: &Address,
    params: &ActionParams,
) -> Result<()> {
    let amount = params.amount.ok_or(CustodyError::MissingParam("amount"))?;
    let destination = params
        .destination
        .ok_or(CustodyError::MissingParam("destination"))?;

    env.debit(wallet_addr, amount)?;
    env.credit(destination, amount)?;

    env.record(Event::TransferExecuted {
        wallet: *wallet_addr,
        destination,
        amount,
    });
    Ok(())
}
