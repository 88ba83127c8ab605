//! CRC-32 (ISO-HDLC) used to fingerprint sign-data cell schemas
//!
//! Reflected polynomial `0xEDB88320`, initial value and final XOR `0xFFFFFFFF`.

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 of `data`
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
