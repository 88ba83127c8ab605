//! Test utilities: fixed keys, challenges and a scripted hardware device
//!
//! The keys and address below are the published TON Connect reference
//! vectors, so signatures made with them can be compared byte for byte.

use crate::hardware::{
    DeviceError, HardwareProofRequest, HardwareTransaction, HardwareTransport, Result,
};
use crate::keys::{KeyPair, Signature};
use crate::proof::TonProofChallenge;
use crate::sign_data::SignDataPayload;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use semver::Version;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tonsign_cell::{Address, CellBuilder, CellRef, boc};

/// 64-byte secret key used for the proof vectors
pub const PROOF_SECRET_KEY_B64: &str =
    "fXaAuTRa6zvLnARTnVd2Llb1MDYLfhJsDKa9IXptmrnVI3r3b7swQGk4qik0ZnUfJbhu1yC82DUCSiVHvyHZ/Q==";

/// 64-byte secret key used for the sign-data vectors
pub const DATA_SECRET_KEY_B64: &str =
    "g4aJS60IkrE/pfCQzDp8+zpzwTP1cSfvTKVHFa4H7E/2Xzi4I+htfxgE7VSkBqjSwuMhkdO+SuLRrEXNzXP0eg==";

/// Wallet address shared by all vectors
pub const TEST_ADDRESS: &str = "UQCyqTmXJpshFu1GW1tyTX6paa3c-37OG9s3uv8ZzX_9GDfx";

/// Timestamp of the sign-data vectors
pub const SIGN_DATA_TIMESTAMP: u64 = 1_703_980_800;

/// Schema of the sample cell payload
pub const SAMPLE_SCHEMA: &str = "message#_ text:string = Message;";

/// Decode a base64 secret key
#[must_use]
pub fn decode_secret_key(encoded: &str) -> Vec<u8> {
    STANDARD.decode(encoded).unwrap()
}

/// Parsed [`TEST_ADDRESS`]
#[must_use]
pub fn test_address() -> Address {
    Address::parse(TEST_ADDRESS).unwrap()
}

/// Key pair from [`PROOF_SECRET_KEY_B64`]
#[must_use]
pub fn test_key_pair() -> KeyPair {
    KeyPair::from_private_key(&decode_secret_key(PROOF_SECRET_KEY_B64)).unwrap()
}

/// Key pair from [`DATA_SECRET_KEY_B64`]
#[must_use]
pub fn data_key_pair() -> KeyPair {
    KeyPair::from_private_key(&decode_secret_key(DATA_SECRET_KEY_B64)).unwrap()
}

/// The proof reference challenge
#[must_use]
pub fn proof_challenge() -> TonProofChallenge {
    TonProofChallenge {
        timestamp: 1_703_731_900,
        domain: "example.com".to_string(),
        payload: "Hello, world".to_string(),
    }
}

/// Cell payload holding the comment "Hello, TON!"
#[must_use]
pub fn sample_cell_payload() -> SignDataPayload {
    let mut builder = CellBuilder::new();
    builder
        .store_u32(0)
        .unwrap()
        .store_string_tail(b"Hello, TON!")
        .unwrap();
    let cell = builder.build().unwrap().into_ref();
    SignDataPayload::Cell {
        schema: SAMPLE_SCHEMA.to_string(),
        cell: boc::to_base64(&cell).unwrap(),
    }
}

/// Signed body the [`MockDevice`] returns for a transaction
///
/// Holds the seqno and amount so tests can tell bodies apart.
#[must_use]
pub fn mock_signed_body(transaction: &HardwareTransaction) -> CellRef {
    let mut builder = CellBuilder::new();
    builder
        .store_u32(transaction.seqno)
        .unwrap()
        .store_coins(transaction.amount)
        .unwrap();
    builder.build().unwrap().into_ref()
}

/// Scripted hardware device
///
/// Signing calls consume queued status words first; once the queue is empty
/// they succeed, except data signing which answers unsupported like every
/// shipped app. Proof and transaction requests are recorded.
pub struct MockDevice {
    version: Version,
    statuses: Mutex<VecDeque<u16>>,
    transactions: Mutex<Vec<HardwareTransaction>>,
    proofs: Mutex<Vec<(Vec<u32>, HardwareProofRequest)>>,
}

impl MockDevice {
    /// Device running TON app `version`
    #[must_use]
    pub fn new(version: &str) -> Self {
        Self {
            version: Version::parse(version).unwrap(),
            statuses: Mutex::new(VecDeque::new()),
            transactions: Mutex::new(Vec::new()),
            proofs: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next signing call with `status`
    #[must_use]
    pub fn with_status(self, status: u16) -> Self {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(status);
        self
    }

    /// Transactions the device was asked to sign, including declined ones
    #[must_use]
    pub fn transactions(&self) -> Vec<HardwareTransaction> {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Proof requests with their derivation paths
    #[must_use]
    pub fn proofs(&self) -> Vec<(Vec<u32>, HardwareProofRequest)> {
        self.proofs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_status(&self) -> Option<u16> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[async_trait]
impl HardwareTransport for MockDevice {
    async fn app_version(&self) -> Result<Version> {
        Ok(self.version.clone())
    }

    async fn sign_address_proof(
        &self,
        path: &[u32; 6],
        request: &HardwareProofRequest,
    ) -> Result<Signature> {
        self.proofs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_vec(), request.clone()));
        match self.next_status() {
            Some(status) => Err(DeviceError::Status(status)),
            None => Ok([0xAB; 64]),
        }
    }

    async fn sign_transaction(
        &self,
        _path: &[u32; 6],
        transaction: &HardwareTransaction,
    ) -> Result<CellRef> {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transaction.clone());
        match self.next_status() {
            Some(status) => Err(DeviceError::Status(status)),
            None => Ok(mock_signed_body(transaction)),
        }
    }

    async fn sign_data(
        &self,
        _path: &[u32; 6],
        _timestamp: u64,
        _domain: &str,
        _payload: &SignDataPayload,
    ) -> Result<Signature> {
        match self.next_status() {
            Some(status) => Err(DeviceError::Status(status)),
            None => Err(DeviceError::Unsupported),
        }
    }
}
