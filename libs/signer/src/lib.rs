//! Signing subsystem of a TON wallet
//!
//! Produces TON Connect proofs, TON Connect `signData` signatures and signed
//! wallet transfers for one account at a time, through a single [`Signer`]
//! contract with three variants:
//!
//! - software: an ed25519 key pair handed out per operation by a
//!   [`KeyPairProvider`]
//! - hardware: a device behind a [`HardwareTransport`]
//! - mock: an all-zero key, for view-only accounts and fee estimation
//!
//! Anticipated outcomes ("not supported by this device", "declined by the
//! user") are returned as [`ExpectedError`] values inside `Ok`. Everything
//! in `Err` is a caller mistake or a primitive failure.
//!
//! # Example Usage
//!
//! ```rust
//! use tonsign_signer_lib::{FixedKeyProvider, KeyPair, Network, Signer, SoftwareSigner,
//!     TonProofChallenge, WalletVersion};
//! use tonsign_cell::Address;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let address = Address::parse("UQCyqTmXJpshFu1GW1tyTX6paa3c-37OG9s3uv8ZzX_9GDfx").unwrap();
//!     let signer = SoftwareSigner::new(
//!         address,
//!         WalletVersion::W5,
//!         Network::Mainnet,
//!         FixedKeyProvider::new(KeyPair::from_seed(&[42u8; 32])),
//!     );
//!
//!     let challenge = TonProofChallenge {
//!         timestamp: 1_703_731_900,
//!         domain: "example.com".to_string(),
//!         payload: "Hello, world".to_string(),
//!     };
//!     let signature = signer.sign_ton_proof(&challenge).await.unwrap().unwrap();
//!     assert_eq!(signature.len(), 64);
//! });
//! ```

#![warn(missing_docs)]

pub mod account;
mod bytes;
pub mod contract;
pub mod crc32;
pub mod hardware;
pub mod keys;
pub mod proof;
pub mod sign_data;
pub mod signer;
/// Reference keys, challenges and a scripted device for tests
pub mod test_utils;
pub mod transaction;
pub mod transfer;

// Re-export commonly used types
pub use account::{AccountError, AccountKind, AccountRecord, AccountStore, TonWallet};
pub use contract::{Network, WalletContract, WalletVersion};
pub use crc32::crc32;
pub use hardware::{DeviceError, HardwareSigner, HardwareTransport};
pub use keys::{FixedKeyProvider, KeyPair, KeyPairProvider, Signature, ZeroKeyProvider};
pub use proof::{TonProofChallenge, TonProofReply, sign_ton_proof};
pub use sign_data::{SignDataPayload, SignDataResult, sign_data};
pub use signer::{
    ExpectedError, MockSigner, Outcome, Signer, SignerError, SignerKind, SignerOptions,
    SoftwareSigner, get_signer,
};
pub use transaction::{reverse_messages_for_w5, sign_transfers};
pub use transfer::{AuthType, InternalMessage, PreparedTransfer, SendMode, SignedTransfer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
