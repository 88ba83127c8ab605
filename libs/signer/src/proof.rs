//! TON Connect `ton_proof` signing
//!
//! ```text
//! message = "ton-proof-item-v2/" || workchain:be32 || hash:32
//!        || domain_len:le32 || domain || timestamp:le64 || payload
//! signed  = sha256( 0xFFFF || "ton-connect" || sha256(message) )
//! ```

use crate::bytes::{ByteOrder, address_buf, domain_buf, timestamp_buf};
use crate::keys::{KeyPair, Signature, verify};
use crate::signer::{Result, SignerError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tonsign_cell::Address;

const PROOF_PREFIX: &[u8] = b"ton-proof-item-v2/";
const CONNECT_PREFIX: &[u8] = b"ton-connect";

/// Domain-ownership challenge from a dApp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProofChallenge {
    /// Unix seconds
    pub timestamp: u64,
    /// Requesting application's domain
    pub domain: String,
    /// Opaque dApp payload, signed as raw bytes
    pub payload: String,
}

/// Unhashed proof message
pub fn proof_message(address: &Address, challenge: &TonProofChallenge) -> Result<Vec<u8>> {
    let mut message = Vec::with_capacity(
        PROOF_PREFIX.len() + 36 + 4 + challenge.domain.len() + 8 + challenge.payload.len(),
    );
    message.extend_from_slice(PROOF_PREFIX);
    message.extend_from_slice(&address_buf(address));
    message.extend_from_slice(&domain_buf(&challenge.domain, ByteOrder::Little)?);
    message.extend_from_slice(&timestamp_buf(challenge.timestamp, ByteOrder::Little)?);
    message.extend_from_slice(challenge.payload.as_bytes());
    Ok(message)
}

/// The 32-byte value the wallet signs
pub fn proof_hash(address: &Address, challenge: &TonProofChallenge) -> Result<[u8; 32]> {
    let inner = Sha256::digest(proof_message(address, challenge)?);

    let mut hasher = Sha256::new();
    hasher.update([0xFF, 0xFF]);
    hasher.update(CONNECT_PREFIX);
    hasher.update(inner);
    Ok(hasher.finalize().into())
}

/// Sign a proof challenge for `address`
pub fn sign_ton_proof(
    address: &Address,
    key_pair: &KeyPair,
    challenge: &TonProofChallenge,
) -> Result<Signature> {
    let hash = proof_hash(address, challenge)?;
    log::debug!("Signing ton_proof for domain {}", challenge.domain);
    Ok(key_pair.sign(&hash))
}

/// Check a proof signature the way a dApp backend would
pub fn verify_ton_proof(
    address: &Address,
    public_key: &[u8; 32],
    challenge: &TonProofChallenge,
    signature: &Signature,
) -> Result<bool> {
    Ok(verify(public_key, &proof_hash(address, challenge)?, signature))
}

/// Domain part of a proof reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofDomain {
    /// UTF-8 byte length of `value`
    pub length_bytes: u32,
    /// The domain
    pub value: String,
}

/// Body of a `ton_proof` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBody {
    /// Challenge timestamp
    pub timestamp: u64,
    /// Challenge domain
    pub domain: ProofDomain,
    /// Base64 signature
    pub signature: String,
    /// Challenge payload
    pub payload: String,
}

/// `ton_proof` reply item returned to the dApp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProofReply {
    /// Always `"ton_proof"`
    pub name: String,
    /// Signed proof
    pub proof: ProofBody,
}

impl TonProofReply {
    /// Package a signature for the connect reply
    pub fn new(challenge: &TonProofChallenge, signature: &Signature) -> Result<Self> {
        let length_bytes = u32::try_from(challenge.domain.len())
            .map_err(|_| SignerError::InvalidPayload("domain longer than u32".to_string()))?;
        Ok(Self {
            name: "ton_proof".to_string(),
            proof: ProofBody {
                timestamp: challenge.timestamp,
                domain: ProofDomain {
                    length_bytes,
                    value: challenge.domain.clone(),
                },
                signature: STANDARD.encode(signature),
                payload: challenge.payload.clone(),
            },
        })
    }
}
