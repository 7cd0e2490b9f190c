//! Shared fixtures: deterministic P-256 signers and ledger setup.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};

use crate::address::{wallet_address, Address};
use crate::events::Event;
use crate::instruction::{
    CustodyInstruction, Instruction, Secp256r1VerifyArgs, SignatureBytes, Transaction,
};
use crate::ledger::Ledger;
use crate::state::{ActionParams, PublicKey};
use crate::PROGRAM_ID;

/// Fixed ledger time used by the tests.
pub const NOW: i64 = 1_700_000_000;

/// Fee payer used by all test transactions.
pub const PAYER: Address = Address([0x99; 32]);

/// Credential id the test wallet is scoped by.
pub const CREDENTIAL_ID: &[u8] = b"test-credential";

/// A deterministic P-256 signer.
pub struct TestSigner {
    key: SigningKey,
}

impl TestSigner {
    /// Signer seeded from a repeated byte; any nonzero byte is a valid
    /// scalar for P-256.
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed; 32]).expect("valid scalar");
        Self { key }
    }

    /// Compressed SEC1 public key.
    pub fn public_key(&self) -> PublicKey {
        let point = self.key.verifying_key().to_encoded_point(true);
        let bytes: [u8; 33] = point.as_bytes().try_into().expect("compressed point");
        PublicKey(bytes)
    }

    /// Raw 64-byte signature over `message`.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        let signature: Signature = self.key.sign(message);
        let bytes: [u8; 64] = signature
            .to_bytes()
            .as_slice()
            .try_into()
            .expect("64-byte signature");
        SignatureBytes(bytes)
    }
}

/// Fresh ledger with the clock pinned to [`NOW`].
pub fn init_ledger() -> Ledger {
    let mut ledger = Ledger::new();
    ledger.set_clock(NOW);
    ledger
}

/// A transaction carrying a single custody instruction.
pub fn custody_tx(instruction: CustodyInstruction) -> Transaction {
    Transaction {
        payer: PAYER,
        instructions: vec![Instruction::Custody(instruction)],
    }
}

/// A transaction with a native verification entry over `message`
/// preceding the custody instruction.
pub fn signed_custody_tx(
    signer: &TestSigner,
    message: &str,
    instruction: CustodyInstruction,
) -> Transaction {
    Transaction {
        payer: PAYER,
        instructions: vec![
            Instruction::Secp256r1Verify(Secp256r1VerifyArgs {
                public_key: signer.public_key(),
                message: message.as_bytes().to_vec(),
                signature: signer.sign(message.as_bytes()),
            }),
            Instruction::Custody(instruction),
        ],
    }
}

/// Initialize a wallet with the test credential and return its address.
pub fn create_wallet(ledger: &mut Ledger, threshold: u8) -> Address {
    ledger
        .process_transaction(&custody_tx(CustodyInstruction::InitializeWallet {
            threshold,
            credential_id: CREDENTIAL_ID.to_vec(),
        }))
        .expect("initialize wallet");
    wallet_address(&PROGRAM_ID, CREDENTIAL_ID).unwrap().0
}

/// Register a guardian and return the id the registry assigned.
pub fn add_guardian(
    ledger: &mut Ledger,
    wallet: &Address,
    name: &str,
    is_owner: bool,
    public_key: Option<PublicKey>,
    acting_owner_id: Option<u64>,
) -> crate::error::Result<u64> {
    ledger.process_transaction(&custody_tx(CustodyInstruction::AddGuardian {
        wallet: *wallet,
        name: name.to_string(),
        recovery_hash_intermediate: [0x11; 32],
        is_owner,
        public_key,
        acting_owner_id,
    }))?;

    let id = ledger
        .events()
        .iter()
        .rev()
        .find_map(|record| match record.event {
            Event::GuardianAdded { guardian_id, .. } => Some(guardian_id),
            _ => None,
        })
        .expect("guardian added event");
    Ok(id)
}

/// Transfer parameters targeting `destination`.
pub fn transfer_params(amount: u64, destination: Address) -> ActionParams {
    ActionParams {
        amount: Some(amount),
        destination: Some(destination),
        token_mint: None,
    }
}
