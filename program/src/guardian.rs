//! Guardian registry: add, remove, status updates and recovery.
//!
//! Ownership rules: the first guardian of a fresh wallet bootstraps the
//! set without an authorizer and must itself be an owner; every later
//! change requires an active owner guardian. No operation may leave the
//! wallet with zero active owners.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::address::{guardian_address, Address};
use crate::error::{CustodyError, Result};
use crate::events::Event;
use crate::ledger::{Account, AccountData, Env};
use crate::state::{Guardian, PublicKey, MAX_GUARDIANS, MAX_NAME_LEN};

/// Require that `acting_owner_id` names an active owner guardian.
fn require_active_owner(env: &Env, wallet: &Address, acting_owner_id: u64) -> Result<()> {
    let (_, acting) = env.guardian(wallet, acting_owner_id)?;
    if !acting.is_owner {
        return Err(CustodyError::NotOwner);
    }
    if !acting.is_active {
        return Err(CustodyError::InactiveGuardian);
    }
    Ok(())
}

/// Register a guardian and return its assigned id.
///
/// Ids are assigned by the registry (`max existing + 1`), never reused
/// within the live set. The stored recovery hash is the SHA-256 of the
/// presented intermediate hash; the secret itself never reaches the
/// program.
pub(crate) fn add_guardian(
    env: &mut Env,
    wallet_addr: &Address,
    name: &str,
    recovery_hash_intermediate: &[u8; 32],
    is_owner: bool,
    public_key: Option<PublicKey>,
    acting_owner_id: Option<u64>,
) -> Result<u64> {
    let mut wallet = env.wallet(wallet_addr)?;

    if wallet.guardian_count >= MAX_GUARDIANS {
        return Err(CustodyError::GuardianLimitReached);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CustodyError::NameTooLong(MAX_NAME_LEN));
    }

    if wallet.guardian_count == 0 {
        // Bootstrap: the wallet's first guardian must be its owner.
        if !is_owner {
            return Err(CustodyError::OwnerRequired);
        }
    } else {
        let acting_owner_id = acting_owner_id.ok_or(CustodyError::OwnerRequired)?;
        require_active_owner(env, wallet_addr, acting_owner_id)?;
    }

    if is_owner && public_key.is_none() {
        return Err(CustodyError::MissingPublicKey);
    }

    let guardian_id = env.next_guardian_id(wallet_addr);
    let (address, bump) = guardian_address(&env.program_id, wallet_addr, guardian_id)?;

    let recovery_hash: [u8; 32] = Sha256::digest(recovery_hash_intermediate).into();

    let guardian = Guardian {
        wallet: *wallet_addr,
        guardian_id,
        name: name.to_string(),
        is_active: true,
        recovery_hash,
        is_owner,
        public_key,
        bump,
    };
    env.create_account(
        address,
        Account {
            lamports: 0,
            data: AccountData::Guardian(guardian),
        },
    )?;

    wallet.guardian_count += 1;
    env.store_wallet(*wallet_addr, wallet);

    env.record(Event::GuardianAdded {
        wallet: *wallet_addr,
        guardian_id,
        is_owner,
    });
    Ok(guardian_id)
}

/// Remove a guardian account.
///
/// Rejected when it would remove the last active owner, or when the
/// remaining guardian set could no longer satisfy the wallet threshold.
pub(crate) fn remove_guardian(
    env: &mut Env,
    wallet_addr: &Address,
    guardian_id: u64,
    acting_owner_id: u64,
) -> Result<()> {
    let mut wallet = env.wallet(wallet_addr)?;
    require_active_owner(env, wallet_addr, acting_owner_id)?;

    let (address, target) = env.guardian(wallet_addr, guardian_id)?;

    if target.is_owner && target.is_active && env.active_owner_count(wallet_addr) <= 1 {
        return Err(CustodyError::LastActiveOwner);
    }
    if wallet.guardian_count.saturating_sub(1) < wallet.threshold {
        return Err(CustodyError::InvalidThreshold);
    }

    env.remove_account(&address)?;
    wallet.guardian_count -= 1;
    env.store_wallet(*wallet_addr, wallet);

    env.record(Event::GuardianRemoved {
        wallet: *wallet_addr,
        guardian_id,
    });
    Ok(())
}

/// Toggle a guardian's active flag.
///
/// Deactivating the last active owner is rejected; a deactivated
/// guardian's signatures are refused by the validator even though its
/// public key stays on record.
pub(crate) fn update_guardian_status(
    env: &mut Env,
    wallet_addr: &Address,
    guardian_id: u64,
    is_active: bool,
    acting_owner_id: u64,
) -> Result<()> {
    require_active_owner(env, wallet_addr, acting_owner_id)?;

    let (address, mut target) = env.guardian(wallet_addr, guardian_id)?;

    if !is_active
        && target.is_owner
        && target.is_active
        && env.active_owner_count(wallet_addr) <= 1
    {
        return Err(CustodyError::LastActiveOwner);
    }

    target.is_active = is_active;
    env.store_guardian(address, target);

    env.record(Event::GuardianStatusUpdated {
        wallet: *wallet_addr,
        guardian_id,
        is_active,
    });
    Ok(())
}

/// Rotate ownership to a replacement guardian after device loss.
///
/// The presented intermediate hash must hash to the stored recovery hash;
/// the comparison is constant-time. On success the old owner is demoted
/// and stripped of its key, the replacement is promoted with the new key,
/// and the wallet's recovery nonce increments.
pub(crate) fn recover_access(
    env: &mut Env,
    wallet_addr: &Address,
    old_guardian_id: u64,
    new_guardian_id: u64,
    recovery_hash_intermediate: &[u8; 32],
    new_public_key: PublicKey,
) -> Result<()> {
    let mut wallet = env.wallet(wallet_addr)?;
    let (old_address, mut old_guardian) = env.guardian(wallet_addr, old_guardian_id)?;
    let (new_address, mut new_guardian) = env.guardian(wallet_addr, new_guardian_id)?;

    if !old_guardian.is_owner {
        return Err(CustodyError::NotOwner);
    }
    if !old_guardian.is_active {
        return Err(CustodyError::InactiveGuardian);
    }
    if !new_guardian.is_active {
        return Err(CustodyError::InactiveGuardian);
    }

    let computed: [u8; 32] = Sha256::digest(recovery_hash_intermediate).into();
    let matches: bool = computed
        .as_slice()
        .ct_eq(old_guardian.recovery_hash.as_slice())
        .into();
    if !matches {
        return Err(CustodyError::InvalidRecoverySecret);
    }

    old_guardian.is_owner = false;
    old_guardian.public_key = None;
    new_guardian.is_owner = true;
    new_guardian.public_key = Some(new_public_key);
    env.store_guardian(old_address, old_guardian);
    env.store_guardian(new_address, new_guardian);

    wallet.recovery_nonce += 1;
    env.store_wallet(*wallet_addr, wallet);

    env.record(Event::AccessRecovered {
        wallet: *wallet_addr,
        old_guardian_id,
        new_guardian_id,
    });
    Ok(())
}
