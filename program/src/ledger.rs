//! Ledger runtime model.
//!
//! The authoritative state lives on a single ledger that serializes every
//! state-mutating request against a given account; `&mut self` on
//! [`Ledger::process_transaction`] models exactly that, so handlers run
//! single-threaded with no internal locking. A transaction executes against
//! a scratch copy of the state and commits only if every instruction
//! succeeds; a failing check anywhere aborts the whole batch with no
//! partial mutation.
//!
//! Native secp256r1 verification entries are executed by the runtime
//! itself; custody handlers only match their typed output by introspection
//! (see [`crate::instruction::InstructionContext`]).

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use std::collections::HashMap;

use crate::address::{guardian_address, proposal_address, Address};
use crate::error::{CustodyError, Result};
use crate::events::{Event, EventRecord};
use crate::instruction::{
    CustodyInstruction, Instruction, InstructionContext, Secp256r1VerifyArgs, Transaction,
};
use crate::state::{Guardian, Proposal, ProposalSignature, ProposalStatus, Wallet};
use crate::{guardian, proposal, wallet, PROGRAM_ID};

/// Typed payload of an account.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountData {
    /// A wallet account
    Wallet(Wallet),
    /// A guardian account
    Guardian(Guardian),
    /// A proposal account
    Proposal(Proposal),
    /// A proposal-signature record
    ProposalSignature(ProposalSignature),
    /// A plain lamport holder (payers, transfer destinations)
    System,
}

/// An account: lamport balance plus typed data.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Balance in lamports
    pub lamports: u64,
    /// Typed payload
    pub data: AccountData,
}

/// Committed ledger state: accounts plus the event log.
#[derive(Debug, Clone, Default)]
pub(crate) struct LedgerState {
    pub accounts: HashMap<Address, Account>,
    pub events: Vec<EventRecord>,
}

/// Execution environment handed to custody instruction handlers.
pub(crate) struct Env<'a> {
    pub state: &'a mut LedgerState,
    pub program_id: Address,
    pub now: i64,
    pub payer: Address,
}

impl Env<'_> {
    /// Create an account; fails if the address is already occupied. This
    /// is the primitive the double-sign guard rests on.
    pub fn create_account(&mut self, address: Address, account: Account) -> Result<()> {
        if self.state.accounts.contains_key(&address) {
            return Err(CustodyError::AccountExists);
        }
        self.state.accounts.insert(address, account);
        Ok(())
    }

    /// Remove an account, returning its lamports to the payer.
    pub fn remove_account(&mut self, address: &Address) -> Result<()> {
        let account = self
            .state
            .accounts
            .remove(address)
            .ok_or(CustodyError::AccountNotFound)?;
        self.credit(self.payer, account.lamports)?;
        Ok(())
    }

    /// Read the wallet at `address`.
    pub fn wallet(&self, address: &Address) -> Result<Wallet> {
        match self.state.accounts.get(address) {
            Some(Account {
                data: AccountData::Wallet(wallet),
                ..
            }) => Ok(wallet.clone()),
            Some(_) => Err(CustodyError::AccountTypeMismatch),
            None => Err(CustodyError::AccountNotFound),
        }
    }

    /// Write back the wallet at `address`, preserving its lamports.
    pub fn store_wallet(&mut self, address: Address, wallet: Wallet) {
        let lamports = self
            .state
            .accounts
            .get(&address)
            .map(|a| a.lamports)
            .unwrap_or(0);
        self.state.accounts.insert(
            address,
            Account {
                lamports,
                data: AccountData::Wallet(wallet),
            },
        );
    }

    /// Read guardian `guardian_id` of `wallet`, returning its derived
    /// address alongside.
    pub fn guardian(&self, wallet: &Address, guardian_id: u64) -> Result<(Address, Guardian)> {
        let (address, _) = guardian_address(&self.program_id, wallet, guardian_id)?;
        match self.state.accounts.get(&address) {
            Some(Account {
                data: AccountData::Guardian(guardian),
                ..
            }) => Ok((address, guardian.clone())),
            Some(_) => Err(CustodyError::AccountTypeMismatch),
            None => Err(CustodyError::AccountNotFound),
        }
    }

    /// Write back a guardian at `address`, preserving its lamports.
    pub fn store_guardian(&mut self, address: Address, guardian: Guardian) {
        let lamports = self
            .state
            .accounts
            .get(&address)
            .map(|a| a.lamports)
            .unwrap_or(0);
        self.state.accounts.insert(
            address,
            Account {
                lamports,
                data: AccountData::Guardian(guardian),
            },
        );
    }

    /// Read proposal `proposal_id` of `wallet` with its derived address.
    pub fn proposal(&self, wallet: &Address, proposal_id: u64) -> Result<(Address, Proposal)> {
        let (address, _) = proposal_address(&self.program_id, wallet, proposal_id)?;
        match self.state.accounts.get(&address) {
            Some(Account {
                data: AccountData::Proposal(proposal),
                ..
            }) => Ok((address, proposal.clone())),
            Some(_) => Err(CustodyError::AccountTypeMismatch),
            None => Err(CustodyError::AccountNotFound),
        }
    }

    /// Write back a proposal at `address`, preserving its lamports.
    pub fn store_proposal(&mut self, address: Address, proposal: Proposal) {
        let lamports = self
            .state
            .accounts
            .get(&address)
            .map(|a| a.lamports)
            .unwrap_or(0);
        self.state.accounts.insert(
            address,
            Account {
                lamports,
                data: AccountData::Proposal(proposal),
            },
        );
    }

    /// All guardians registered under `wallet`.
    pub fn guardians_of(&self, wallet: &Address) -> Vec<Guardian> {
        self.state
            .accounts
            .values()
            .filter_map(|account| match &account.data {
                AccountData::Guardian(g) if g.wallet == *wallet => Some(g.clone()),
                _ => None,
            })
            .collect()
    }

    /// Count of guardians that are both active and owner-flagged.
    pub fn active_owner_count(&self, wallet: &Address) -> usize {
        self.guardians_of(wallet)
            .iter()
            .filter(|g| g.is_active && g.is_owner)
            .count()
    }

    /// Next free guardian id under `wallet`.
    pub fn next_guardian_id(&self, wallet: &Address) -> u64 {
        self.guardians_of(wallet)
            .iter()
            .map(|g| g.guardian_id)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Add lamports to an account, creating a system account if absent.
    pub fn credit(&mut self, address: Address, amount: u64) -> Result<()> {
        let account = self.state.accounts.entry(address).or_insert(Account {
            lamports: 0,
            data: AccountData::System,
        });
        account.lamports = account
            .lamports
            .checked_add(amount)
            .ok_or(CustodyError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Withdraw lamports from an account.
    pub fn debit(&mut self, address: &Address, amount: u64) -> Result<()> {
        let account = self
            .state
            .accounts
            .get_mut(address)
            .ok_or(CustodyError::AccountNotFound)?;
        account.lamports = account
            .lamports
            .checked_sub(amount)
            .ok_or(CustodyError::InsufficientFunds)?;
        Ok(())
    }

    /// Append an event at the current ledger time.
    pub fn record(&mut self, event: Event) {
        self.state.events.push(EventRecord {
            timestamp: self.now,
            event,
        });
    }
}

/// The ledger: program state, clock and transaction processing.
#[derive(Debug)]
pub struct Ledger {
    program_id: Address,
    clock: i64,
    state: LedgerState,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Fresh ledger owned by the canonical program id.
    pub fn new() -> Self {
        Self::with_program_id(PROGRAM_ID)
    }

    /// Fresh ledger owned by a custom program id.
    pub fn with_program_id(program_id: Address) -> Self {
        Self {
            program_id,
            clock: 0,
            state: LedgerState::default(),
        }
    }

    /// The program id this ledger dispatches custody instructions to.
    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// Current ledger time (unix seconds).
    pub fn clock(&self) -> i64 {
        self.clock
    }

    /// Set the ledger clock.
    pub fn set_clock(&mut self, timestamp: i64) {
        self.clock = timestamp;
    }

    /// Advance the ledger clock.
    pub fn advance_clock(&mut self, secs: i64) {
        self.clock += secs;
    }

    /// Credit lamports to an account (faucet semantics).
    pub fn fund(&mut self, address: Address, lamports: u64) {
        let account = self.state.accounts.entry(address).or_insert(Account {
            lamports: 0,
            data: AccountData::System,
        });
        account.lamports = account.lamports.saturating_add(lamports);
    }

    /// Lamport balance of an account; zero when absent.
    pub fn balance(&self, address: &Address) -> u64 {
        self.state
            .accounts
            .get(address)
            .map_or(0, |account| account.lamports)
    }

    /// The wallet stored at `address`, if any.
    pub fn wallet(&self, address: &Address) -> Option<&Wallet> {
        match self.state.accounts.get(address) {
            Some(Account {
                data: AccountData::Wallet(wallet),
                ..
            }) => Some(wallet),
            _ => None,
        }
    }

    /// Guardian `guardian_id` of `wallet`, if registered.
    pub fn guardian(&self, wallet: &Address, guardian_id: u64) -> Option<Guardian> {
        let (address, _) = guardian_address(&self.program_id, wallet, guardian_id).ok()?;
        match self.state.accounts.get(&address) {
            Some(Account {
                data: AccountData::Guardian(guardian),
                ..
            }) => Some(guardian.clone()),
            _ => None,
        }
    }

    /// Proposal `proposal_id` of `wallet`, if it exists.
    pub fn proposal(&self, wallet: &Address, proposal_id: u64) -> Option<Proposal> {
        let (address, _) = proposal_address(&self.program_id, wallet, proposal_id).ok()?;
        match self.state.accounts.get(&address) {
            Some(Account {
                data: AccountData::Proposal(proposal),
                ..
            }) => Some(proposal.clone()),
            _ => None,
        }
    }

    /// Current status of a proposal, applying lazy expiry.
    ///
    /// A pending proposal past its lifetime is transitioned to `Expired`
    /// here, at read time; no background process exists.
    pub fn proposal_status(
        &mut self,
        wallet: &Address,
        proposal_id: u64,
    ) -> Result<ProposalStatus> {
        let (address, _) = proposal_address(&self.program_id, wallet, proposal_id)?;
        let account = self
            .state
            .accounts
            .get_mut(&address)
            .ok_or(CustodyError::AccountNotFound)?;
        let AccountData::Proposal(proposal) = &mut account.data else {
            return Err(CustodyError::AccountTypeMismatch);
        };

        if proposal.is_expired_at(self.clock) {
            proposal.status = ProposalStatus::Expired;
            let event = Event::ProposalStatusChanged {
                wallet: *wallet,
                proposal_id,
                status: ProposalStatus::Expired,
            };
            self.state.events.push(EventRecord {
                timestamp: self.clock,
                event,
            });
        }
        Ok(proposal.status)
    }

    /// Events committed so far, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.state.events
    }

    /// Execute a transaction atomically.
    ///
    /// Instructions run in order against a scratch copy of the state; the
    /// first failure aborts and nothing is committed.
    pub fn process_transaction(&mut self, tx: &Transaction) -> Result<()> {
        let mut work = self.state.clone();

        for (index, instruction) in tx.instructions.iter().enumerate() {
            match instruction {
                Instruction::Secp256r1Verify(args) => verify_native(args)?,
                Instruction::Custody(custody) => {
                    let ctx = InstructionContext::new(&tx.instructions, index);
                    let mut env = Env {
                        state: &mut work,
                        program_id: self.program_id,
                        now: self.clock,
                        payer: tx.payer,
                    };
                    dispatch(&mut env, &ctx, custody)?;
                }
            }
        }

        self.state = work;
        Ok(())
    }
}

/// Execute a native secp256r1 verification entry.
fn verify_native(args: &Secp256r1VerifyArgs) -> Result<()> {
    let key = VerifyingKey::from_sec1_bytes(&args.public_key.0)
        .map_err(|_| CustodyError::SignatureInvalid)?;
    let signature =
        Signature::from_slice(&args.signature.0).map_err(|_| CustodyError::SignatureInvalid)?;
    key.verify(&args.message, &signature)
        .map_err(|_| CustodyError::SignatureInvalid)
}

/// Route a custody instruction to its handler.
fn dispatch(env: &mut Env, ctx: &InstructionContext, instruction: &CustodyInstruction) -> Result<()> {
    match instruction {
        CustodyInstruction::InitializeWallet {
            threshold,
            credential_id,
        } => wallet::initialize_wallet(env, *threshold, credential_id).map(|_| ()),
        CustodyInstruction::AddGuardian {
            wallet,
            name,
            recovery_hash_intermediate,
            is_owner,
            public_key,
            acting_owner_id,
        } => guardian::add_guardian(
            env,
            wallet,
            name,
            recovery_hash_intermediate,
            *is_owner,
            *public_key,
            *acting_owner_id,
        )
        .map(|_| ()),
        CustodyInstruction::RemoveGuardian {
            wallet,
            guardian_id,
            acting_owner_id,
        } => guardian::remove_guardian(env, wallet, *guardian_id, *acting_owner_id),
        CustodyInstruction::UpdateGuardianStatus {
            wallet,
            guardian_id,
            is_active,
            acting_owner_id,
        } => guardian::update_guardian_status(env, wallet, *guardian_id, *is_active, *acting_owner_id),
        CustodyInstruction::RecoverAccess {
            wallet,
            old_guardian_id,
            new_guardian_id,
            recovery_hash_intermediate,
            new_public_key,
        } => guardian::recover_access(
            env,
            wallet,
            *old_guardian_id,
            *new_guardian_id,
            recovery_hash_intermediate,
            *new_public_key,
        ),
        CustodyInstruction::VerifyAndExecute {
            wallet,
            guardian_id,
            action,
            params,
            nonce,
            timestamp,
        } => wallet::verify_and_execute(
            env,
            ctx,
            wallet,
            *guardian_id,
            action,
            params,
            *nonce,
            *timestamp,
        ),
        CustodyInstruction::CreateProposal {
            wallet,
            proposal_id,
            proposer_guardian_id,
            description,
            action,
            params,
        } => proposal::create_proposal(
            env,
            wallet,
            *proposal_id,
            *proposer_guardian_id,
            description,
            action,
            params,
        ),
        CustodyInstruction::ApproveProposal {
            wallet,
            proposal_id,
            guardian_id,
            timestamp,
        } => proposal::approve_proposal(env, ctx, wallet, *proposal_id, *guardian_id, *timestamp),
        CustodyInstruction::RejectProposal {
            wallet,
            proposal_id,
            guardian_id,
            timestamp,
        } => proposal::reject_proposal(env, ctx, wallet, *proposal_id, *guardian_id, *timestamp),
        CustodyInstruction::ExecuteProposal {
            wallet,
            proposal_id,
        } => proposal::execute_proposal(env, wallet, *proposal_id),
    }
}
