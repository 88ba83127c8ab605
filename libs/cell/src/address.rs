//! Account addresses
//!
//! An address is a signed 32-bit workchain plus a 32-byte account hash. Two
//! textual forms are supported:
//!
//! - raw: `"<workchain>:<64 hex chars>"`
//! - user-friendly: 48 base64 (standard or url-safe) characters encoding
//!   `[tag:1][workchain:1][hash:32][crc16:2]`
//!
//! The tag carries the bounceable and test-only flags; the checksum is
//! CRC-16/XMODEM over the first 34 bytes, big-endian.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use crc::{CRC_16_XMODEM, Crc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TEST_ONLY: u8 = 0x80;

/// Length of a user-friendly address string
pub const FRIENDLY_LEN: usize = 48;

/// Address parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input is neither raw nor user-friendly
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),

    /// Base64 payload could not be decoded
    #[error("Invalid address encoding: {0}")]
    InvalidEncoding(String),

    /// Unknown tag byte in a user-friendly address
    #[error("Unknown address tag: 0x{0:02X}")]
    UnknownTag(u8),

    /// CRC-16 mismatch in a user-friendly address
    #[error("Address checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch {
        /// Checksum computed over the address bytes
        expected: u16,
        /// Checksum carried by the address
        actual: u16,
    },

    /// Workchain does not fit the 8-bit field of the encoding
    #[error("Workchain {0} cannot be encoded in 8 bits")]
    WorkchainOutOfRange(i32),
}

/// Result type for address operations
pub type Result<T> = std::result::Result<T, AddressError>;

/// Standard account address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain id (0 for basechain, -1 for masterchain)
    pub workchain: i32,
    /// Account id
    pub hash: [u8; 32],
}

/// Flags carried by the user-friendly form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FriendlyFlags {
    /// Messages to this address bounce on failure
    pub bounceable: bool,
    /// Address is only valid on testnet
    pub test_only: bool,
    /// Use the url-safe base64 alphabet
    pub url_safe: bool,
}

impl Address {
    /// Create an address from its parts
    #[must_use]
    pub const fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Parse either textual form, discarding user-friendly flags
    pub fn parse(s: &str) -> Result<Self> {
        if s.contains(':') {
            Self::parse_raw(s)
        } else {
            Self::parse_friendly(s).map(|(address, _)| address)
        }
    }

    /// Parse the raw `"<workchain>:<hex>"` form
    pub fn parse_raw(s: &str) -> Result<Self> {
        let (workchain, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| AddressError::InvalidFormat(s.to_string()))?;

        let workchain = workchain
            .parse::<i32>()
            .map_err(|e| AddressError::InvalidFormat(format!("bad workchain in '{s}': {e}")))?;

        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)
            .map_err(|e| AddressError::InvalidFormat(format!("bad hash in '{s}': {e}")))?;

        Ok(Self { workchain, hash })
    }

    /// Parse the 48-character user-friendly form and return its flags
    pub fn parse_friendly(s: &str) -> Result<(Self, FriendlyFlags)> {
        if s.len() != FRIENDLY_LEN {
            return Err(AddressError::InvalidFormat(format!(
                "expected {FRIENDLY_LEN} characters, got {}",
                s.len()
            )));
        }

        let url_safe = s.contains(['-', '_']);
        let engine = if url_safe { &URL_SAFE } else { &STANDARD };
        let bytes = engine
            .decode(s)
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

        if bytes.len() != 36 {
            return Err(AddressError::InvalidEncoding(format!(
                "expected 36 bytes, got {}",
                bytes.len()
            )));
        }

        let expected = CRC16.checksum(&bytes[..34]);
        let actual = u16::from_be_bytes([bytes[34], bytes[35]]);
        if expected != actual {
            return Err(AddressError::ChecksumMismatch { expected, actual });
        }

        let mut tag = bytes[0];
        let test_only = tag & TAG_TEST_ONLY != 0;
        tag &= !TAG_TEST_ONLY;
        let bounceable = match tag {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            _ => return Err(AddressError::UnknownTag(bytes[0])),
        };

        let workchain = i32::from(i8::from_be_bytes([bytes[1]]));
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);

        Ok((
            Self { workchain, hash },
            FriendlyFlags {
                bounceable,
                test_only,
                url_safe,
            },
        ))
    }

    /// Workchain as the signed byte used by the cell and friendly encodings
    pub fn workchain_i8(&self) -> Result<i8> {
        i8::try_from(self.workchain).map_err(|_| AddressError::WorkchainOutOfRange(self.workchain))
    }

    /// Render the raw form
    #[must_use]
    pub fn to_raw_string(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// Render the user-friendly form
    pub fn to_friendly_string(&self, flags: FriendlyFlags) -> Result<String> {
        let mut tag = if flags.bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if flags.test_only {
            tag |= TAG_TEST_ONLY;
        }

        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.extend_from_slice(&self.workchain_i8()?.to_be_bytes());
        bytes.extend_from_slice(&self.hash);
        let crc = CRC16.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());

        let engine = if flags.url_safe { &URL_SAFE } else { &STANDARD };
        Ok(engine.encode(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw_string())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
