//! Ed25519 key pairs and the providers that hand them out per operation
//!
//! A [`KeyPair`] is never stored by a signer. Signers hold a
//! [`KeyPairProvider`] and ask it for a fresh pair on every call, so a
//! password-gated provider can decrypt on demand and the decrypted bytes are
//! wiped when the pair is dropped.

use crate::signer::{Result, SignerError};
use async_trait::async_trait;
use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey, Verifier as _, VerifyingKey,
};
use std::fmt;
use std::future::Future;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Detached ed25519 signature
pub type Signature = [u8; 64];

/// Ed25519 key pair in the 64-byte `seed || public key` secret-key layout
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    public_key: [u8; 32],
    secret_key: [u8; 64],
}

impl KeyPair {
    /// Derive the pair from a 32-byte seed
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self {
            public_key: signing_key.verifying_key().to_bytes(),
            secret_key: signing_key.to_keypair_bytes(),
        }
    }

    /// Build from an already-unlocked private key
    ///
    /// Accepts a 32-byte seed or a 64-byte secret key whose last 32 bytes are
    /// the public key.
    pub fn from_private_key(private_key: &[u8]) -> Result<Self> {
        match private_key.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(private_key);
                let pair = Self::from_seed(&seed);
                seed.zeroize();
                Ok(pair)
            }
            64 => {
                let mut secret_key = [0u8; 64];
                secret_key.copy_from_slice(private_key);
                let mut public_key = [0u8; 32];
                public_key.copy_from_slice(&private_key[32..]);
                Ok(Self {
                    public_key,
                    secret_key,
                })
            }
            len => Err(SignerError::InvalidKey(format!(
                "expected 32 or 64 bytes, got {len}"
            ))),
        }
    }

    /// Assemble a pair from raw parts without checking they match
    #[must_use]
    pub fn from_parts(public_key: [u8; 32], secret_key: [u8; 64]) -> Self {
        Self {
            public_key,
            secret_key,
        }
    }

    /// Public key
    #[must_use]
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// 64-byte secret key
    #[must_use]
    pub fn secret_key(&self) -> &[u8; 64] {
        &self.secret_key
    }

    /// Detached signature of `message`, keyed by the first 32 secret-key bytes
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&self.secret_key[..32]);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Verify a detached signature; malformed public keys verify as `false`
#[must_use]
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    key.verify(message, &DalekSignature::from_bytes(signature))
        .is_ok()
}

/// Source of a key pair, queried once per signing operation
#[async_trait]
pub trait KeyPairProvider: Send + Sync {
    /// Produce the key pair for one operation
    async fn key_pair(&self) -> Result<KeyPair>;

    /// Whether the pairs are placeholders that never verify
    fn is_mock(&self) -> bool {
        false
    }
}

/// Provider returning a fixed, already-unlocked key pair
pub struct FixedKeyProvider {
    key_pair: KeyPair,
}

impl FixedKeyProvider {
    /// Wrap an unlocked key pair
    #[must_use]
    pub fn new(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }
}

#[async_trait]
impl KeyPairProvider for FixedKeyProvider {
    async fn key_pair(&self) -> Result<KeyPair> {
        Ok(self.key_pair.clone())
    }
}

/// Provider for mock and view-only signing
///
/// Always returns an all-zero secret key, paired with the account's real
/// public key when one is known. Signatures it yields never verify against
/// that public key.
#[derive(Debug, Clone, Default)]
pub struct ZeroKeyProvider {
    public_key: Option<[u8; 32]>,
}

impl ZeroKeyProvider {
    /// Create a provider reporting `public_key` (or a zero key)
    #[must_use]
    pub fn new(public_key: Option<[u8; 32]>) -> Self {
        Self { public_key }
    }
}

#[async_trait]
impl KeyPairProvider for ZeroKeyProvider {
    async fn key_pair(&self) -> Result<KeyPair> {
        Ok(KeyPair::from_parts(
            self.public_key.unwrap_or([0u8; 32]),
            [0u8; 64],
        ))
    }

    fn is_mock(&self) -> bool {
        true
    }
}

/// Provider backed by an async closure, e.g. a password prompt plus decryption
pub struct FnKeyProvider<F> {
    f: F,
}

/// Wrap an async closure as a [`KeyPairProvider`]
pub fn from_fn<F, Fut>(f: F) -> FnKeyProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<KeyPair>> + Send,
{
    FnKeyProvider { f }
}

#[async_trait]
impl<F, Fut> KeyPairProvider for FnKeyProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<KeyPair>> + Send,
{
    async fn key_pair(&self) -> Result<KeyPair> {
        (self.f)().await
    }
}
