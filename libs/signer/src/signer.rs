//! Signer facade
//!
//! Every signing operation returns `Result<Outcome<T>>`:
//!
//! - `Err(SignerError)`: the caller broke the contract (missing key, bad
//!   payload, unsupported auth type) or a primitive failed. An upstream bug.
//! - `Ok(Err(ExpectedError))`: an anticipated outcome the user must be told
//!   about, e.g. the hardware device cannot do this or the user declined.
//! - `Ok(Ok(value))`: the signature or signed transfers.
//!
//! [`get_signer`] picks the variant once, from the account record.

use crate::account::{AccountError, AccountKind, AccountRecord};
use crate::contract::{Network, WalletVersion};
use crate::hardware::{DeviceError, HardwareSigner, HardwareTransport};
use crate::keys::{FixedKeyProvider, KeyPair, KeyPairProvider, Signature, ZeroKeyProvider};
use crate::proof::{TonProofChallenge, sign_ton_proof};
use crate::sign_data::{SignDataPayload, sign_data};
use crate::transaction::sign_transfers;
use crate::transfer::{AuthType, PreparedTransfer, SignedTransfer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tonsign_cell::{Address, AddressError, BocError, CellError};

/// Contract violations and primitive failures
#[derive(Error, Debug)]
pub enum SignerError {
    /// A software signer needs an unlocked private key
    #[error("Private key is required for a software signer")]
    MissingPrivateKey,

    /// The wallet record carries no public key
    #[error("Wallet has no public key")]
    MissingPublicKey,

    /// A hardware account was used without a device transport
    #[error("Hardware account requires a connected device")]
    MissingDevice,

    /// A hardware account without a derivation index
    #[error("Hardware wallet has no account index")]
    MissingAccountIndex,

    /// Private key bytes are unusable
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Requested auth type is not available for this wallet
    #[error("Unsupported transaction authType \"{auth_type}\" for {version} wallet")]
    UnsupportedAuthType {
        /// Wallet dialect
        version: WalletVersion,
        /// Requested auth type
        auth_type: AuthType,
    },

    /// Transfer cannot be built (no messages, too many messages)
    #[error("Malformed transfer: {0}")]
    MalformedTransfer(String),

    /// Payload bytes from the caller are malformed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Domain cannot be canonicalized
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// Timestamp does not fit a signed 64-bit field
    #[error("Timestamp {0} out of range")]
    TimestampOutOfRange(u64),

    /// Unrecognized wallet version name
    #[error("Unknown wallet version: {0}")]
    UnknownWalletVersion(String),

    /// Unrecognized network name
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Address primitive failure
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Cell primitive failure
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Bag-of-cells primitive failure
    #[error(transparent)]
    Boc(#[from] BocError),

    /// Account record failure
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Device failure that is not an expected outcome
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Result type for signer operations
pub type Result<T> = std::result::Result<T, SignerError>;

/// Anticipated outcomes returned as values
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedError {
    /// The device or its firmware cannot perform this operation
    #[error("Operation is not supported by the hardware wallet")]
    NotSupportedHardwareOperation,

    /// The device needs blind signing enabled for this payload
    #[error("Blind signing is not enabled on the hardware wallet")]
    HardwareBlindSigningNotEnabled,

    /// The user declined on the device
    #[error("Rejected by user")]
    RejectedByUser,
}

/// Value or anticipated outcome
pub type Outcome<T> = std::result::Result<T, ExpectedError>;

/// Which variant a signer is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    /// Real software key
    Software,
    /// External device
    Hardware,
    /// Zero key for view accounts and fee estimation
    Mock,
}

/// Uniform signing contract
#[async_trait]
pub trait Signer: Send + Sync {
    /// Variant of this signer
    fn kind(&self) -> SignerKind;

    /// Sign a TON Connect proof challenge
    async fn sign_ton_proof(&self, challenge: &TonProofChallenge) -> Result<Outcome<Signature>>;

    /// Sign transfers, one result per input in the same order
    async fn sign_transactions(
        &self,
        transfers: &[PreparedTransfer],
    ) -> Result<Outcome<Vec<SignedTransfer>>>;

    /// Sign a TON Connect sign-data request
    async fn sign_data(
        &self,
        timestamp: u64,
        domain: &str,
        payload: &SignDataPayload,
    ) -> Result<Outcome<Signature>>;
}

/// Signer holding a key-pair provider
///
/// The provider is asked for the key pair on every operation and the pair is
/// dropped (and wiped) before the call returns.
pub struct SoftwareSigner<P> {
    address: Address,
    version: WalletVersion,
    network: Network,
    provider: P,
}

/// Software signer over an all-zero key
pub type MockSigner = SoftwareSigner<ZeroKeyProvider>;

impl<P: KeyPairProvider> SoftwareSigner<P> {
    /// Bind a provider to one wallet
    pub fn new(address: Address, version: WalletVersion, network: Network, provider: P) -> Self {
        Self {
            address,
            version,
            network,
            provider,
        }
    }

    /// Wallet address
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl MockSigner {
    /// Mock signer reporting `public_key` when known
    #[must_use]
    pub fn mock(
        address: Address,
        version: WalletVersion,
        network: Network,
        public_key: Option<[u8; 32]>,
    ) -> Self {
        Self::new(address, version, network, ZeroKeyProvider::new(public_key))
    }
}

#[async_trait]
impl<P: KeyPairProvider + 'static> Signer for SoftwareSigner<P> {
    fn kind(&self) -> SignerKind {
        if self.provider.is_mock() {
            SignerKind::Mock
        } else {
            SignerKind::Software
        }
    }

    async fn sign_ton_proof(&self, challenge: &TonProofChallenge) -> Result<Outcome<Signature>> {
        let key_pair = self.provider.key_pair().await?;
        Ok(Ok(sign_ton_proof(&self.address, &key_pair, challenge)?))
    }

    async fn sign_transactions(
        &self,
        transfers: &[PreparedTransfer],
    ) -> Result<Outcome<Vec<SignedTransfer>>> {
        let key_pair = self.provider.key_pair().await?;
        Ok(Ok(sign_transfers(
            self.version,
            self.network,
            &self.address,
            &key_pair,
            transfers,
        )?))
    }

    async fn sign_data(
        &self,
        timestamp: u64,
        domain: &str,
        payload: &SignDataPayload,
    ) -> Result<Outcome<Signature>> {
        let key_pair = self.provider.key_pair().await?;
        Ok(Ok(sign_data(
            &self.address,
            &key_pair,
            timestamp,
            domain,
            payload,
        )?))
    }
}

/// Inputs to [`get_signer`] besides the account record
#[derive(Default)]
pub struct SignerOptions<'a> {
    /// Network the account lives on
    pub network: Network,
    /// Already-unlocked private key for normal accounts
    pub private_key: Option<&'a [u8]>,
    /// Build a mock signer regardless of account kind
    pub mock: bool,
    /// Sub-wallet id for hardware signing
    pub subwallet_id: Option<u32>,
    /// Device transport for hardware accounts
    pub device: Option<Arc<dyn HardwareTransport>>,
}

/// Build the signer for `account`
///
/// Mock when requested or for view accounts, hardware for hardware
/// accounts, otherwise software with the supplied private key.
pub fn get_signer(account: &AccountRecord, options: SignerOptions<'_>) -> Result<Box<dyn Signer>> {
    let wallet = &account.ton;
    let address = wallet.parsed_address()?;

    if options.mock || account.kind == AccountKind::View {
        log::debug!("Using mock signer for account {}", account.id);
        return Ok(Box::new(MockSigner::mock(
            address,
            wallet.version,
            options.network,
            wallet.public_key_bytes()?,
        )));
    }

    if account.kind == AccountKind::Hardware {
        let device = options.device.ok_or(SignerError::MissingDevice)?;
        log::debug!("Using hardware signer for account {}", account.id);
        return Ok(Box::new(HardwareSigner::new(
            device,
            options.network,
            wallet.clone(),
            options.subwallet_id,
        )?));
    }

    let private_key = options.private_key.ok_or(SignerError::MissingPrivateKey)?;
    let public_key = wallet
        .public_key_bytes()?
        .ok_or(SignerError::MissingPublicKey)?;

    let unlocked = KeyPair::from_private_key(private_key)?;
    if unlocked.public_key() != &public_key {
        log::warn!(
            "Private key does not match the stored public key of account {}",
            account.id
        );
    }
    let key_pair = KeyPair::from_parts(public_key, *unlocked.secret_key());

    Ok(Box::new(SoftwareSigner::new(
        address,
        wallet.version,
        options.network,
        FixedKeyProvider::new(key_pair),
    )))
}
