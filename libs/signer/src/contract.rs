//! Wallet contract dialects and their signed transfer bodies
//!
//! # v3R2 / v4R2
//! ```text
//! signature:512 wallet_id:32 valid_until:32 seqno:32 [op:8 = 0 (v4)]
//! (mode:8 ^message)*
//! ```
//!
//! # W5 (wallet v5r1)
//! ```text
//! opcode:32 wallet_id:int32 valid_until:32 seqno:32
//! out_actions:(Maybe ^OutList) has_extended:1 signature:512
//! ```
//! The out list is a chain of `prev:^OutList action_send_msg#0ec3c86d mode:8 ^message`.

use crate::keys::KeyPair;
use crate::signer::{Result, SignerError};
use crate::transfer::{AuthType, PreparedTransfer, SignedTransfer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tonsign_cell::{Cell, CellBuilder, CellRef};

/// Default v3/v4 wallet id before adding the workchain
pub const DEFAULT_WALLET_ID: u32 = 698_983_191;

const W5_OP_EXTERNAL: u32 = 0x7369_676e;
const W5_OP_INTERNAL: u32 = 0x7369_6e74;
const ACTION_SEND_MSG: u32 = 0x0ec3_c86d;

/// Wallet contract dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletVersion {
    /// Wallet v3 revision 2
    #[serde(rename = "v3R2")]
    V3R2,
    /// Wallet v4 revision 2
    #[serde(rename = "v4R2")]
    V4R2,
    /// Wallet v5 revision 1
    #[serde(rename = "W5")]
    W5,
}

impl WalletVersion {
    /// Most messages one transaction may carry
    #[must_use]
    pub fn max_messages(self) -> usize {
        match self {
            Self::V3R2 | Self::V4R2 => 4,
            Self::W5 => 255,
        }
    }
}

impl fmt::Display for WalletVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V3R2 => "v3R2",
            Self::V4R2 => "v4R2",
            Self::W5 => "W5",
        })
    }
}

impl FromStr for WalletVersion {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v3R2" => Ok(Self::V3R2),
            "v4R2" => Ok(Self::V4R2),
            "W5" => Ok(Self::W5),
            other => Err(SignerError::UnknownWalletVersion(other.to_string())),
        }
    }
}

/// Network the wallet lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network
    #[default]
    Mainnet,
    /// Test network
    Testnet,
}

impl Network {
    /// Global id mixed into the W5 wallet id
    #[must_use]
    pub fn global_id(self) -> i32 {
        match self {
            Self::Mainnet => -239,
            Self::Testnet => -3,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        })
    }
}

impl FromStr for Network {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(SignerError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A wallet contract instance bound to one public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletContract {
    version: WalletVersion,
    public_key: [u8; 32],
    wallet_id: i32,
}

impl WalletContract {
    /// Instantiate a wallet
    ///
    /// `subwallet_id` overrides the default id (v3/v4) or the subwallet
    /// number inside the W5 context.
    pub fn new(
        version: WalletVersion,
        network: Network,
        workchain: i32,
        public_key: [u8; 32],
        subwallet_id: Option<u32>,
    ) -> Result<Self> {
        let wallet_id = match version {
            WalletVersion::V3R2 | WalletVersion::V4R2 => {
                let id = subwallet_id
                    .unwrap_or_else(|| DEFAULT_WALLET_ID.wrapping_add_signed(workchain));
                id.cast_signed()
            }
            WalletVersion::W5 => {
                let subwallet = subwallet_id.unwrap_or(0);
                if subwallet >= 1 << 15 {
                    return Err(SignerError::MalformedTransfer(format!(
                        "W5 subwallet id {subwallet} exceeds 15 bits"
                    )));
                }
                let wc = i8::try_from(workchain).map_err(|_| {
                    SignerError::MalformedTransfer(format!("workchain {workchain} exceeds int8"))
                })?;
                let context: u32 =
                    (1 << 31) | (u32::from(wc.cast_unsigned()) << 23) | subwallet;
                network.global_id() ^ context.cast_signed()
            }
        };

        Ok(Self {
            version,
            public_key,
            wallet_id,
        })
    }

    /// Contract dialect
    #[must_use]
    pub fn version(&self) -> WalletVersion {
        self.version
    }

    /// Owner public key
    #[must_use]
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Wallet id as written in signed bodies
    #[must_use]
    pub fn wallet_id(&self) -> i32 {
        self.wallet_id
    }

    fn check_transfer(&self, transfer: &PreparedTransfer) -> Result<()> {
        let auth_ok = match self.version {
            WalletVersion::V3R2 | WalletVersion::V4R2 => transfer.auth_type == AuthType::External,
            WalletVersion::W5 => transfer.auth_type != AuthType::Extension,
        };
        if !auth_ok {
            return Err(SignerError::UnsupportedAuthType {
                version: self.version,
                auth_type: transfer.auth_type,
            });
        }

        let count = transfer.messages.len();
        if count == 0 {
            return Err(SignerError::MalformedTransfer("no messages".to_string()));
        }
        if count > self.version.max_messages() {
            return Err(SignerError::MalformedTransfer(format!(
                "{count} messages exceed the {} limit of {}",
                self.version,
                self.version.max_messages()
            )));
        }
        Ok(())
    }

    /// Unsigned body covered by the signature
    pub fn create_signing_message(&self, transfer: &PreparedTransfer) -> Result<Cell> {
        self.check_transfer(transfer)?;
        let mode = transfer.send_mode.bits();

        let mut builder = CellBuilder::new();
        match self.version {
            WalletVersion::V3R2 | WalletVersion::V4R2 => {
                builder
                    .store_int(32, i64::from(self.wallet_id))?
                    .store_u32(transfer.valid_until())?
                    .store_u32(transfer.seqno)?;
                if self.version == WalletVersion::V4R2 {
                    builder.store_u8(0)?; // simple send
                }
                for message in &transfer.messages {
                    builder
                        .store_u8(mode)?
                        .store_reference(message.to_cell()?.into_ref())?;
                }
            }
            WalletVersion::W5 => {
                let opcode = match transfer.auth_type {
                    AuthType::Internal => W5_OP_INTERNAL,
                    _ => W5_OP_EXTERNAL,
                };
                let messages = transfer
                    .messages
                    .iter()
                    .map(|m| Ok(m.to_cell()?.into_ref()))
                    .collect::<Result<Vec<_>>>()?;
                builder
                    .store_u32(opcode)?
                    .store_int(32, i64::from(self.wallet_id))?
                    .store_u32(transfer.valid_until())?
                    .store_u32(transfer.seqno)?
                    .store_maybe_reference(Some(w5_out_list(&messages, mode)?))?
                    .store_bit(false)?; // no extended actions
            }
        }
        Ok(builder.build()?)
    }

    /// Sign one transfer
    pub fn sign_transfer(
        &self,
        key_pair: &KeyPair,
        transfer: &PreparedTransfer,
    ) -> Result<SignedTransfer> {
        let unsigned = self.create_signing_message(transfer)?;
        let signature = key_pair.sign(unsigned.hash());

        let mut builder = CellBuilder::new();
        match self.version {
            WalletVersion::V3R2 | WalletVersion::V4R2 => {
                builder.store_bytes(&signature)?.store_cell(&unsigned)?;
            }
            WalletVersion::W5 => {
                builder.store_cell(&unsigned)?.store_bytes(&signature)?;
            }
        }

        Ok(SignedTransfer {
            seqno: transfer.seqno,
            body: builder.build()?.into_ref(),
        })
    }
}

/// Out-action list in the layout the W5 message builder produces
///
/// The builder folds the actions in reverse, so the first message ends up
/// at the head of the list and is executed last on-chain.
fn w5_out_list(messages: &[CellRef], mode: u8) -> Result<CellRef> {
    let mut list = Cell::empty().into_ref();
    for message in messages.iter().rev() {
        let mut builder = CellBuilder::new();
        builder
            .store_reference(list)?
            .store_u32(ACTION_SEND_MSG)?
            .store_u8(mode)?
            .store_reference(message.clone())?;
        list = builder.build()?.into_ref();
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_address, test_key_pair};
    use crate::transfer::InternalMessage;

    fn transfer(count: usize) -> PreparedTransfer {
        let messages = (0..count)
            .map(|i| InternalMessage::new(test_address(), 1000 + i as u128, false))
            .collect();
        let mut transfer = PreparedTransfer::new(7, messages);
        transfer.timeout = Some(1_700_000_000);
        transfer
    }

    fn contract(version: WalletVersion) -> WalletContract {
        WalletContract::new(
            version,
            Network::Mainnet,
            0,
            *test_key_pair().public_key(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_default_wallet_ids() {
        assert_eq!(contract(WalletVersion::V3R2).wallet_id(), 698_983_191);
        assert_eq!(contract(WalletVersion::V4R2).wallet_id(), 698_983_191);
        // 0x80000000 ^ -239
        assert_eq!(contract(WalletVersion::W5).wallet_id(), 2_147_483_409);
    }

    #[test]
    fn test_masterchain_wallet_id() {
        let wallet =
            WalletContract::new(WalletVersion::V4R2, Network::Mainnet, -1, [0; 32], None).unwrap();
        assert_eq!(wallet.wallet_id(), 698_983_190);
    }

    #[test]
    fn test_testnet_w5_wallet_id() {
        let wallet =
            WalletContract::new(WalletVersion::W5, Network::Testnet, 0, [0; 32], None).unwrap();
        assert_eq!(wallet.wallet_id(), 2_147_483_645);
    }

    #[test]
    fn test_explicit_subwallet() {
        let wallet =
            WalletContract::new(WalletVersion::V4R2, Network::Mainnet, 0, [0; 32], Some(42))
                .unwrap();
        assert_eq!(wallet.wallet_id(), 42);
    }

    #[test]
    fn test_v4_body_layout() {
        let body = contract(WalletVersion::V4R2)
            .create_signing_message(&transfer(2))
            .unwrap();
        let mut slice = body.parser();
        assert_eq!(slice.load_u32().unwrap(), 698_983_191);
        assert_eq!(slice.load_u32().unwrap(), 1_700_000_000);
        assert_eq!(slice.load_u32().unwrap(), 7);
        assert_eq!(slice.load_uint(8).unwrap(), 0);
        assert_eq!(slice.load_uint(8).unwrap(), 3);
        assert_eq!(slice.load_uint(8).unwrap(), 3);
        assert_eq!(slice.remaining_bits(), 0);
        assert_eq!(body.references().len(), 2);
    }

    #[test]
    fn test_v3_has_no_op() {
        let body = contract(WalletVersion::V3R2)
            .create_signing_message(&transfer(1))
            .unwrap();
        assert_eq!(body.bit_len(), 32 * 3 + 8);
    }

    #[test]
    fn test_w5_body_layout() {
        let body = contract(WalletVersion::W5)
            .create_signing_message(&transfer(1))
            .unwrap();
        let mut slice = body.parser();
        assert_eq!(slice.load_u32().unwrap(), W5_OP_EXTERNAL);
        assert_eq!(slice.load_u32().unwrap(), 2_147_483_409);
        slice.skip_bits(64).unwrap();
        assert!(slice.load_bit().unwrap());
        assert!(!slice.load_bit().unwrap());
        assert_eq!(slice.remaining_bits(), 0);

        let head = body.reference(0).unwrap();
        let mut action = head.parser();
        assert_eq!(action.load_u32().unwrap(), ACTION_SEND_MSG);
        assert_eq!(action.load_uint(8).unwrap(), 3);
        assert_eq!(head.reference(0).unwrap().hash(), Cell::empty().hash());
    }

    #[test]
    fn test_signature_placement() {
        let pair = test_key_pair();
        let v4 = contract(WalletVersion::V4R2);
        let signed = v4.sign_transfer(&pair, &transfer(1)).unwrap();
        let unsigned = v4.create_signing_message(&transfer(1)).unwrap();
        let signature = signed.body.parser().load_bytes(64).unwrap();
        assert!(crate::keys::verify(
            pair.public_key(),
            unsigned.hash(),
            &signature.try_into().unwrap()
        ));

        let w5 = contract(WalletVersion::W5);
        let signed = w5.sign_transfer(&pair, &transfer(1)).unwrap();
        let unsigned = w5.create_signing_message(&transfer(1)).unwrap();
        let mut slice = signed.body.parser();
        slice.skip_bits(unsigned.bit_len()).unwrap();
        let signature: [u8; 64] = slice.load_bytes(64).unwrap().try_into().unwrap();
        assert!(crate::keys::verify(pair.public_key(), unsigned.hash(), &signature));
    }

    #[test]
    fn test_seqno_zero_never_expires() {
        let mut t = transfer(1);
        t.seqno = 0;
        let body = contract(WalletVersion::V3R2)
            .create_signing_message(&t)
            .unwrap();
        let mut slice = body.parser();
        slice.skip_bits(32).unwrap();
        assert_eq!(slice.load_u32().unwrap(), u32::MAX);
    }

    #[test]
    fn test_message_limits() {
        assert!(matches!(
            contract(WalletVersion::V4R2).create_signing_message(&transfer(0)),
            Err(SignerError::MalformedTransfer(_))
        ));
        assert!(matches!(
            contract(WalletVersion::V4R2).create_signing_message(&transfer(5)),
            Err(SignerError::MalformedTransfer(_))
        ));
        assert!(
            contract(WalletVersion::W5)
                .create_signing_message(&transfer(5))
                .is_ok()
        );
    }

    #[test]
    fn test_auth_type_rules() {
        let mut internal = transfer(1);
        internal.auth_type = AuthType::Internal;
        assert!(matches!(
            contract(WalletVersion::V4R2).create_signing_message(&internal),
            Err(SignerError::UnsupportedAuthType { .. })
        ));

        let body = contract(WalletVersion::W5)
            .create_signing_message(&internal)
            .unwrap();
        assert_eq!(body.parser().load_u32().unwrap(), W5_OP_INTERNAL);

        internal.auth_type = AuthType::Extension;
        assert!(contract(WalletVersion::W5)
            .create_signing_message(&internal)
            .is_err());
    }

    #[test]
    fn test_version_names() {
        assert_eq!("v3R2".parse::<WalletVersion>().unwrap(), WalletVersion::V3R2);
        assert_eq!(WalletVersion::W5.to_string(), "W5");
        assert_eq!(
            serde_json::to_string(&WalletVersion::V4R2).unwrap(),
            "\"v4R2\""
        );
        assert!("v5".parse::<WalletVersion>().is_err());
    }
}
