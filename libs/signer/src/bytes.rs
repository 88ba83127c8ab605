//! Byte-layout helpers shared by the proof and sign-data algorithms
//!
//! The two TON Connect message formats encode the same fields with different
//! byte orders: the proof message uses little-endian lengths and timestamps,
//! the text/binary sign-data message uses big-endian ones.

use crate::signer::{Result, SignerError};
use tonsign_cell::Address;

/// Byte order of length and timestamp fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Used by the `ton-proof-item-v2/` message
    Little,
    /// Used by the `ton-connect/sign-data/` message
    Big,
}

/// Big-endian workchain followed by the 32-byte account hash
#[must_use]
pub fn address_buf(address: &Address) -> [u8; 36] {
    let mut buf = [0u8; 36];
    buf[..4].copy_from_slice(&address.workchain.to_be_bytes());
    buf[4..].copy_from_slice(&address.hash);
    buf
}

fn length_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| SignerError::InvalidPayload(format!("length {len} exceeds u32")))
}

/// 32-bit length of the UTF-8 domain followed by the domain bytes
pub fn domain_buf(domain: &str, order: ByteOrder) -> Result<Vec<u8>> {
    let bytes = domain.as_bytes();
    let len = length_u32(bytes.len())?;
    let mut buf = Vec::with_capacity(4 + bytes.len());
    match order {
        ByteOrder::Little => buf.extend_from_slice(&len.to_le_bytes()),
        ByteOrder::Big => buf.extend_from_slice(&len.to_be_bytes()),
    }
    buf.extend_from_slice(bytes);
    Ok(buf)
}

/// Timestamp as an 8-byte signed integer
pub fn timestamp_buf(timestamp: u64, order: ByteOrder) -> Result<[u8; 8]> {
    let signed = i64::try_from(timestamp).map_err(|_| SignerError::TimestampOutOfRange(timestamp))?;
    Ok(match order {
        ByteOrder::Little => signed.to_le_bytes(),
        ByteOrder::Big => signed.to_be_bytes(),
    })
}

/// Big-endian 32-bit length followed by the bytes
pub fn length_prefixed(data: &[u8]) -> Result<Vec<u8>> {
    let len = length_u32(data.len())?;
    let mut buf = Vec::with_capacity(4 + data.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(buf)
}

/// IDNA ASCII form of `domain` in DNS-like encoding
///
/// Labels are written in reverse order, each terminated by a zero byte:
/// `example.com` becomes `com\0example\0`.
pub fn dns_encoded_domain(domain: &str) -> Result<Vec<u8>> {
    let ascii = idna::domain_to_ascii(domain)
        .map_err(|e| SignerError::InvalidDomain(format!("{domain}: {e}")))?;

    let labels: Vec<&str> = ascii.split('.').filter(|l| !l.is_empty()).collect();
    if labels.is_empty() {
        return Err(SignerError::InvalidDomain(format!("'{domain}' has no labels")));
    }

    let mut encoded = Vec::with_capacity(ascii.len() + 1);
    for label in labels.iter().rev() {
        encoded.extend_from_slice(label.as_bytes());
        encoded.push(0);
    }
    Ok(encoded)
}
