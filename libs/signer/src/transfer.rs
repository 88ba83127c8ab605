//! Wallet-version-agnostic transfer requests and their signed results

use crate::signer::Result;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::time::{SystemTime, UNIX_EPOCH};
use tonsign_cell::{Address, Cell, CellBuilder, CellRef, boc};

/// Validity window applied when a transfer does not set one
pub const TRANSFER_TIMEOUT_SEC: u32 = 600;

/// How the wallet contract authenticates the signed body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// External message signed by the owner key
    #[default]
    External,
    /// Signed body carried by an internal message (W5 gasless relays)
    Internal,
    /// Request issued by an installed W5 extension
    Extension,
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::External => "external",
            Self::Internal => "internal",
            Self::Extension => "extension",
        })
    }
}

/// Outgoing message send mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendMode(pub u8);

impl SendMode {
    /// Fees are paid from the wallet balance, not the message value
    pub const PAY_GAS_SEPARATELY: Self = Self(1);
    /// Errors in the action phase are ignored
    pub const IGNORE_ERRORS: Self = Self(2);
    /// Send the whole remaining balance
    pub const CARRY_ALL_REMAINING_BALANCE: Self = Self(128);

    /// Raw mode byte
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for SendMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One outgoing internal message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalMessage {
    /// Destination
    pub to: Address,
    /// Value in nanotons
    pub amount: u128,
    /// Bounce back on failure
    pub bounce: bool,
    /// Message body
    pub body: Option<CellRef>,
    /// State init for deploying the destination
    pub state_init: Option<CellRef>,
}

impl InternalMessage {
    /// Plain value transfer without body
    #[must_use]
    pub fn new(to: Address, amount: u128, bounce: bool) -> Self {
        Self {
            to,
            amount,
            bounce,
            body: None,
            state_init: None,
        }
    }

    /// Attach a text comment body (`op = 0` followed by the text)
    pub fn with_comment(mut self, comment: &str) -> Result<Self> {
        let mut builder = CellBuilder::new();
        builder.store_u32(0)?.store_string_tail(comment.as_bytes())?;
        self.body = Some(builder.build()?.into_ref());
        Ok(self)
    }

    /// Attach an arbitrary body
    #[must_use]
    pub fn with_body(mut self, body: CellRef) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a state init
    #[must_use]
    pub fn with_state_init(mut self, state_init: CellRef) -> Self {
        self.state_init = Some(state_init);
        self
    }

    /// Serialize as `MessageRelaxed` with `int_msg_info$0`
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(self.bounce)?
            .store_bit(false)? // bounced
            .store_address_none()?
            .store_address(&self.to)?
            .store_coins(self.amount)?
            .store_bit(false)? // extra currencies
            .store_coins(0)? // ihr_fee
            .store_coins(0)? // fwd_fee
            .store_u64(0)? // created_lt
            .store_u32(0)?; // created_at

        store_init_and_body(&mut builder, self.state_init.as_ref(), self.body.as_ref())?;
        Ok(builder.build()?)
    }
}

/// `init:(Maybe (Either StateInit ^StateInit)) body:(Either X ^X)`
pub(crate) fn store_init_and_body(
    builder: &mut CellBuilder,
    state_init: Option<&CellRef>,
    body: Option<&CellRef>,
) -> Result<()> {
    match state_init {
        Some(init) => {
            builder.store_bit(true)?;
            let inline = builder.remaining_bits() >= init.bit_len() + 2
                && builder.remaining_refs() >= init.references().len() + 1;
            if inline {
                builder.store_bit(false)?.store_cell(init)?;
            } else {
                builder.store_bit(true)?.store_reference(init.clone())?;
            }
        }
        None => {
            builder.store_bit(false)?;
        }
    }

    match body {
        Some(body) => {
            let inline = builder.remaining_bits() > body.bit_len()
                && builder.remaining_refs() >= body.references().len();
            if inline {
                builder.store_bit(false)?.store_cell(body)?;
            } else {
                builder.store_bit(true)?.store_reference(body.clone())?;
            }
        }
        None => {
            builder.store_bit(false)?;
        }
    }
    Ok(())
}

/// One unsigned on-chain transaction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransfer {
    /// Wallet sequence number this transaction consumes
    pub seqno: u32,
    /// Outgoing messages, in execution order
    pub messages: Vec<InternalMessage>,
    /// Send mode applied to every message
    pub send_mode: SendMode,
    /// Unix seconds after which the wallet rejects the body
    pub timeout: Option<u32>,
    /// Requested authentication
    pub auth_type: AuthType,
}

impl PreparedTransfer {
    /// External transfer with the default send mode
    #[must_use]
    pub fn new(seqno: u32, messages: Vec<InternalMessage>) -> Self {
        Self {
            seqno,
            messages,
            send_mode: SendMode::PAY_GAS_SEPARATELY | SendMode::IGNORE_ERRORS,
            timeout: None,
            auth_type: AuthType::External,
        }
    }

    /// `valid_until` written into the body
    ///
    /// A wallet at seqno 0 is being deployed and accepts any time.
    #[must_use]
    pub fn valid_until(&self) -> u32 {
        if self.seqno == 0 {
            return u32::MAX;
        }
        self.timeout.unwrap_or_else(fallback_timeout)
    }
}

/// Now plus [`TRANSFER_TIMEOUT_SEC`]
#[must_use]
pub fn fallback_timeout() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    u32::try_from(now)
        .unwrap_or(u32::MAX)
        .saturating_add(TRANSFER_TIMEOUT_SEC)
}

/// Signed, submittable wallet body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    /// Seqno the body consumes
    pub seqno: u32,
    /// Signed body cell
    pub body: CellRef,
}

impl SignedTransfer {
    /// Body as a base64 bag of cells
    pub fn to_boc_base64(&self) -> Result<String> {
        Ok(boc::to_base64(&self.body)?)
    }

    /// Wrap the body in an `ext_in_msg_info$10` message to `wallet`
    pub fn to_external_message(
        &self,
        wallet: &Address,
        state_init: Option<&CellRef>,
    ) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_uint(2, 0b10)?
            .store_address_none()?
            .store_address(wallet)?
            .store_coins(0)?; // import_fee
        store_init_and_body(&mut builder, state_init, Some(&self.body))?;
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_address;

    #[test]
    fn test_send_mode_combination() {
        let mode = SendMode::PAY_GAS_SEPARATELY | SendMode::IGNORE_ERRORS;
        assert_eq!(mode.bits(), 3);
        let mode = SendMode::CARRY_ALL_REMAINING_BALANCE | SendMode::IGNORE_ERRORS;
        assert_eq!(mode.bits(), 130);
    }

    #[test]
    fn test_internal_message_layout() {
        let message = InternalMessage::new(test_address(), 1_000_000_000, true);
        let cell = message.to_cell().unwrap();
        let mut slice = cell.parser();

        assert!(!slice.load_bit().unwrap());
        assert!(slice.load_bit().unwrap()); // ihr_disabled
        assert!(slice.load_bit().unwrap()); // bounce
        assert!(!slice.load_bit().unwrap()); // bounced
        assert_eq!(slice.load_uint(2).unwrap(), 0); // addr_none
        assert_eq!(slice.load_uint(2).unwrap(), 0b10);
        slice.skip_bits(1 + 8).unwrap();
        assert_eq!(slice.load_bytes(32).unwrap(), test_address().hash.to_vec());
        assert_eq!(slice.load_uint(4).unwrap(), 4);
        assert_eq!(slice.load_uint(32).unwrap(), 1_000_000_000);
        // extra currencies, ihr_fee, fwd_fee, lt, at, no init, inline empty body
        assert_eq!(slice.remaining_bits(), 1 + 4 + 4 + 64 + 32 + 1 + 1);
    }

    #[test]
    fn test_comment_body_inline() {
        let message = InternalMessage::new(test_address(), 1, false)
            .with_comment("hello")
            .unwrap();
        let cell = message.to_cell().unwrap();
        assert!(cell.references().is_empty());
    }

    #[test]
    fn test_large_body_goes_by_reference() {
        let long = "x".repeat(300);
        let message = InternalMessage::new(test_address(), 1, false)
            .with_comment(&long)
            .unwrap();
        let cell = message.to_cell().unwrap();
        assert_eq!(cell.references().len(), 1);
        assert_eq!(cell.reference(0), message.body.as_ref());
    }

    #[test]
    fn test_valid_until() {
        let mut transfer = PreparedTransfer::new(0, Vec::new());
        transfer.timeout = Some(100);
        assert_eq!(transfer.valid_until(), u32::MAX);

        transfer.seqno = 5;
        assert_eq!(transfer.valid_until(), 100);

        transfer.timeout = None;
        assert!(transfer.valid_until() > TRANSFER_TIMEOUT_SEC);
    }

    #[test]
    fn test_external_message_wraps_body() {
        let body = Cell::empty().into_ref();
        let signed = SignedTransfer {
            seqno: 1,
            body: body.clone(),
        };
        let external = signed.to_external_message(&test_address(), None).unwrap();
        let mut slice = external.parser();
        assert_eq!(slice.load_uint(2).unwrap(), 0b10);
        assert_eq!(slice.load_uint(2).unwrap(), 0);
        assert!(signed.to_boc_base64().unwrap().starts_with("te6c"));
    }
}
