//! TON Connect `signData`
//!
//! Text and binary payloads are signed over the SHA-256 of a flat message:
//! ```text
//! 0xFFFF || "ton-connect/sign-data/" || workchain:be32 || hash:32
//!        || domain_len:be32 || domain || timestamp:be64
//!        || "txt" | "bin" || data_len:be32 || data
//! ```
//!
//! Cell payloads are signed over the representation hash of a cell:
//! ```text
//! 0x75569022:32  crc32(schema):32  timestamp:64  address
//! ^[dns-encoded domain]  ^[payload cell]
//! ```

use crate::bytes::{
    ByteOrder, address_buf, dns_encoded_domain, domain_buf, length_prefixed, timestamp_buf,
};
use crate::crc32::crc32;
use crate::keys::{KeyPair, Signature};
use crate::signer::{Result, SignerError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tonsign_cell::{Address, Cell, CellBuilder, boc};

const SIGN_DATA_PREFIX: &[u8] = b"ton-connect/sign-data/";
const CELL_PAYLOAD_MAGIC: u32 = 0x7556_9022;

/// Data a dApp asks the wallet to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignDataPayload {
    /// Human-readable text
    Text {
        /// UTF-8 text
        text: String,
    },
    /// Opaque bytes
    Binary {
        /// Base64-encoded bytes
        bytes: String,
    },
    /// Structured cell described by a TL-B schema
    Cell {
        /// TL-B schema; only its CRC-32 is signed
        schema: String,
        /// Base64 bag of cells with one root
        cell: String,
    },
}

impl SignDataPayload {
    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Binary { .. } => "binary",
            Self::Cell { .. } => "cell",
        }
    }
}

fn flat_message(
    address: &Address,
    timestamp: u64,
    domain: &str,
    tag: &[u8; 3],
    data: &[u8],
) -> Result<Vec<u8>> {
    let mut message =
        Vec::with_capacity(2 + SIGN_DATA_PREFIX.len() + 36 + domain.len() + data.len() + 23);
    message.extend_from_slice(&[0xFF, 0xFF]);
    message.extend_from_slice(SIGN_DATA_PREFIX);
    message.extend_from_slice(&address_buf(address));
    message.extend_from_slice(&domain_buf(domain, ByteOrder::Big)?);
    message.extend_from_slice(&timestamp_buf(timestamp, ByteOrder::Big)?);
    message.extend_from_slice(tag);
    message.extend_from_slice(&length_prefixed(data)?);
    Ok(message)
}

/// Cell whose representation hash is signed for a cell payload
pub fn cell_payload_envelope(
    address: &Address,
    timestamp: u64,
    domain: &str,
    schema: &str,
    payload_cell: &str,
) -> Result<Cell> {
    let payload = boc::from_base64(payload_cell)?;

    let mut builder = CellBuilder::new();
    builder
        .store_u32(CELL_PAYLOAD_MAGIC)?
        .store_u32(crc32(schema.as_bytes()))?
        .store_u64(timestamp)?
        .store_address(address)?
        .store_string_ref_tail(&dns_encoded_domain(domain)?)?
        .store_reference(payload)?;
    Ok(builder.build()?)
}

/// The 32-byte value signed for `payload`
pub fn sign_data_hash(
    address: &Address,
    timestamp: u64,
    domain: &str,
    payload: &SignDataPayload,
) -> Result<[u8; 32]> {
    match payload {
        SignDataPayload::Cell { schema, cell } => {
            let envelope = cell_payload_envelope(address, timestamp, domain, schema, cell)?;
            Ok(*envelope.hash())
        }
        SignDataPayload::Text { text } => {
            let message = flat_message(address, timestamp, domain, b"txt", text.as_bytes())?;
            Ok(Sha256::digest(message).into())
        }
        SignDataPayload::Binary { bytes } => {
            let data = STANDARD
                .decode(bytes)
                .map_err(|e| SignerError::InvalidPayload(format!("binary payload: {e}")))?;
            let message = flat_message(address, timestamp, domain, b"bin", &data)?;
            Ok(Sha256::digest(message).into())
        }
    }
}

/// Sign a sign-data request for `address`
pub fn sign_data(
    address: &Address,
    key_pair: &KeyPair,
    timestamp: u64,
    domain: &str,
    payload: &SignDataPayload,
) -> Result<Signature> {
    let hash = sign_data_hash(address, timestamp, domain, payload)?;
    log::debug!("Signing {} data for domain {domain}", payload.kind());
    Ok(key_pair.sign(&hash))
}

/// Sign-data result returned to the dApp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDataResult {
    /// Base64 signature
    pub signature: String,
    /// Raw-form signing address
    pub address: String,
    /// Unix seconds used in the signature
    pub timestamp: u64,
    /// Domain used in the signature
    pub domain: String,
    /// The payload as requested
    pub payload: SignDataPayload,
}

impl SignDataResult {
    /// Package a signature for the connect reply
    #[must_use]
    pub fn new(
        address: &Address,
        timestamp: u64,
        domain: &str,
        payload: SignDataPayload,
        signature: &Signature,
    ) -> Self {
        Self {
            signature: STANDARD.encode(signature),
            address: address.to_raw_string(),
            timestamp,
            domain: domain.to_string(),
            payload,
        }
    }
}
