//! Hardware wallet signing
//!
//! The device signs one single-message transfer at a time and never exposes
//! key material. Every transfer is converted and checked against the app
//! firmware before the device is asked to sign anything, so an unsupported
//! batch fails without the user confirming half of it.

use crate::account::TonWallet;
use crate::contract::{Network, WalletVersion};
use crate::keys::Signature;
use crate::proof::TonProofChallenge;
use crate::sign_data::SignDataPayload;
use crate::signer::{self, ExpectedError, Outcome, Signer, SignerError, SignerKind};
use crate::transfer::{AuthType, PreparedTransfer, SendMode, SignedTransfer, fallback_timeout};
use async_trait::async_trait;
use semver::Version;
use std::sync::Arc;
use thiserror::Error;
use tonsign_cell::{Address, Cell, CellBuilder, CellError, CellRef, CellSlice};

/// Status word: blind signing is disabled in the app settings
pub const STATUS_BLIND_SIGNING_DISABLED: u16 = 0xBD00;

/// Status word: conditions of use not satisfied (user declined)
pub const STATUS_REJECTED: u16 = 0x6985;

/// SLIP-44 coin type
pub const TON_COIN_TYPE: u32 = 607;

/// Longest comment the device displays as text
pub const MAX_COMMENT_LEN: usize = 120;

/// Jetton wallet `transfer` op
pub const JETTON_TRANSFER_OP: u32 = 0x0f8a_7ea5;

/// NFT item `transfer` op
pub const NFT_TRANSFER_OP: u32 = 0x5fcc_3d14;

/// First app version with wallet specifiers
const VERSION_WITH_WALLET_SPECIFIERS: Version = Version::new(2, 1, 0);

/// First app version that signs opaque bodies
const VERSION_WITH_UNSAFE_PAYLOAD: Version = Version::new(2, 1, 0);

/// First app version that displays NFT transfers
const VERSION_WITH_NFT_PAYLOAD: Version = Version::new(2, 1, 0);

/// Device transport failures
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Device answered with a non-success status word
    #[error("Device returned status 0x{0:04x}")]
    Status(u16),

    /// Communication with the device failed
    #[error("Device transport error: {0}")]
    Transport(String),

    /// The device does not implement this operation
    #[error("Operation not implemented by the device")]
    Unsupported,
}

/// Result type for device calls
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Derivation path of account `index`
#[must_use]
pub fn account_path(network: Network, index: u32) -> [u32; 6] {
    let network_index = match network {
        Network::Mainnet => 0,
        Network::Testnet => 1,
    };
    [44, TON_COIN_TYPE, network_index, 0, index, 0]
}

/// Jetton wallet transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonTransfer {
    /// Caller-chosen query id
    pub query_id: u64,
    /// Jetton amount in base units
    pub amount: u128,
    /// Owner receiving the jettons
    pub destination: Address,
    /// Where excess TON is returned
    pub response_destination: Address,
    /// Custom payload for the jetton wallet
    pub custom_payload: Option<CellRef>,
    /// Nanotons forwarded to the destination
    pub forward_amount: u128,
    /// Body of the transfer notification
    pub forward_payload: Option<CellRef>,
}

impl JettonTransfer {
    /// Canonical message body
    pub fn to_cell(&self) -> std::result::Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        builder
            .store_u32(JETTON_TRANSFER_OP)?
            .store_u64(self.query_id)?
            .store_coins(self.amount)?
            .store_address(&self.destination)?
            .store_address(&self.response_destination)?
            .store_maybe_reference(self.custom_payload.clone())?
            .store_coins(self.forward_amount)?
            .store_maybe_reference(self.forward_payload.clone())?;
        builder.build()
    }

    fn parse(body: &Cell) -> Option<Self> {
        let mut slice = body.parser();
        if slice.load_u32().ok()? != JETTON_TRANSFER_OP {
            return None;
        }
        let transfer = Self {
            query_id: slice.load_u64().ok()?,
            amount: slice.load_coins().ok()?,
            destination: slice.load_address().ok()?,
            response_destination: slice.load_address().ok()?,
            custom_payload: slice.load_maybe_reference().ok()?.cloned(),
            forward_amount: slice.load_coins().ok()?,
            forward_payload: load_forward_payload(&mut slice)?,
        };
        is_canonical(body, &transfer.to_cell().ok()?).then_some(transfer)
    }
}

/// NFT item transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftTransfer {
    /// Caller-chosen query id
    pub query_id: u64,
    /// Owner receiving the item
    pub new_owner: Address,
    /// Where excess TON is returned
    pub response_destination: Address,
    /// Custom payload for the item contract
    pub custom_payload: Option<CellRef>,
    /// Nanotons forwarded to the new owner
    pub forward_amount: u128,
    /// Body of the ownership notification
    pub forward_payload: Option<CellRef>,
}

impl NftTransfer {
    /// Canonical message body
    pub fn to_cell(&self) -> std::result::Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        builder
            .store_u32(NFT_TRANSFER_OP)?
            .store_u64(self.query_id)?
            .store_address(&self.new_owner)?
            .store_address(&self.response_destination)?
            .store_maybe_reference(self.custom_payload.clone())?
            .store_coins(self.forward_amount)?
            .store_maybe_reference(self.forward_payload.clone())?;
        builder.build()
    }

    fn parse(body: &Cell) -> Option<Self> {
        let mut slice = body.parser();
        if slice.load_u32().ok()? != NFT_TRANSFER_OP {
            return None;
        }
        let transfer = Self {
            query_id: slice.load_u64().ok()?,
            new_owner: slice.load_address().ok()?,
            response_destination: slice.load_address().ok()?,
            custom_payload: slice.load_maybe_reference().ok()?.cloned(),
            forward_amount: slice.load_coins().ok()?,
            forward_payload: load_forward_payload(&mut slice)?,
        };
        is_canonical(body, &transfer.to_cell().ok()?).then_some(transfer)
    }
}

/// `Either Cell ^Cell` forward payload; only an empty inline branch is accepted
fn load_forward_payload(slice: &mut CellSlice<'_>) -> Option<Option<CellRef>> {
    let payload = if slice.load_bit().ok()? {
        Some(slice.load_reference().ok()?.clone())
    } else {
        None
    };
    (slice.remaining_bits() == 0 && slice.remaining_refs() == 0).then_some(payload)
}

// Anything not byte-identical to the canonical encoding is unsafe
fn is_canonical(body: &Cell, canonical: &Cell) -> bool {
    canonical.hash() == body.hash()
}

/// Message body as the device understands it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwarePayload {
    /// Plain text comment shown on screen
    Comment(String),
    /// Jetton transfer shown field by field
    JettonTransfer(JettonTransfer),
    /// NFT transfer shown field by field
    NftTransfer(NftTransfer),
    /// Opaque body, needs blind signing
    Unsafe(CellRef),
}

impl HardwarePayload {
    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Comment(_) => "comment",
            Self::JettonTransfer(_) => "jetton-transfer",
            Self::NftTransfer(_) => "nft-transfer",
            Self::Unsafe(_) => "unsafe",
        }
    }

    /// Oldest app version able to sign this payload
    #[must_use]
    pub fn min_app_version(&self) -> Version {
        match self {
            Self::Comment(_) | Self::JettonTransfer(_) => Version::new(0, 0, 0),
            Self::NftTransfer(_) => VERSION_WITH_NFT_PAYLOAD,
            Self::Unsafe(_) => VERSION_WITH_UNSAFE_PAYLOAD,
        }
    }
}

/// Wallet contract hints for non-default wallets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletSpecifiers {
    /// Sub-wallet id to sign for
    pub subwallet_id: Option<u32>,
    /// Whether the body carries the v4 wallet op
    pub include_wallet_op: bool,
}

/// One transfer in device form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareTransaction {
    /// Destination
    pub to: Address,
    /// Send mode
    pub send_mode: SendMode,
    /// Wallet seqno
    pub seqno: u32,
    /// Absolute expiry, unix seconds
    pub timeout: u32,
    /// Bounce flag
    pub bounce: bool,
    /// Value in nanotons
    pub amount: u128,
    /// Destination state init
    pub state_init: Option<CellRef>,
    /// Classified body
    pub payload: Option<HardwarePayload>,
    /// Wallet hints
    pub wallet_specifiers: Option<WalletSpecifiers>,
}

/// Proof request in device form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProofRequest {
    /// Requesting app domain
    pub domain: String,
    /// Unix seconds
    pub timestamp: u64,
    /// Challenge payload bytes
    pub payload: Vec<u8>,
}

/// Physical device seam
#[async_trait]
pub trait HardwareTransport: Send + Sync {
    /// Version of the TON app running on the device
    async fn app_version(&self) -> Result<Version>;

    /// Sign a TON Connect address proof
    async fn sign_address_proof(
        &self,
        path: &[u32; 6],
        request: &HardwareProofRequest,
    ) -> Result<Signature>;

    /// Sign one transfer, returning the signed wallet body
    async fn sign_transaction(
        &self,
        path: &[u32; 6],
        transaction: &HardwareTransaction,
    ) -> Result<CellRef>;

    /// Sign a TON Connect data request
    ///
    /// No current device app implements this, so the default answers
    /// [`DeviceError::Unsupported`].
    async fn sign_data(
        &self,
        _path: &[u32; 6],
        _timestamp: u64,
        _domain: &str,
        _payload: &SignDataPayload,
    ) -> Result<Signature> {
        Err(DeviceError::Unsupported)
    }
}

fn supports_wallet_specifiers(app_version: &Version) -> bool {
    *app_version >= VERSION_WITH_WALLET_SPECIFIERS
}

/// Text of a canonical comment body, if `body` is one the device can display
fn parse_comment(body: &Cell) -> Option<String> {
    let mut slice = body.parser();
    if slice.load_u32().ok()? != 0 {
        return None;
    }
    let text = slice.load_string_tail().ok()?;
    if text.len() > MAX_COMMENT_LEN || !text.iter().all(|b| (0x20..=0x7e).contains(b)) {
        return None;
    }

    let mut canonical = CellBuilder::new();
    canonical.store_u32(0).ok()?.store_string_tail(&text).ok()?;
    if !is_canonical(body, &canonical.build().ok()?) {
        return None;
    }
    String::from_utf8(text).ok()
}

fn parse_payload(body: &Cell) -> Option<HardwarePayload> {
    match body.parser().load_u32().ok()? {
        0 => parse_comment(body).map(HardwarePayload::Comment),
        JETTON_TRANSFER_OP => JettonTransfer::parse(body).map(HardwarePayload::JettonTransfer),
        NFT_TRANSFER_OP => NftTransfer::parse(body).map(HardwarePayload::NftTransfer),
        _ => None,
    }
}

/// Classify a message body for the device
///
/// Comments and jetton transfers are supported by every app version. A
/// recognised body the app is too old to display falls back to an unsafe
/// payload when the app signs those (2.1.0 or later); anything unrecognised
/// is sent as unsafe.
pub fn classify_payload(
    body: Option<&CellRef>,
    app_version: &Version,
) -> Outcome<Option<HardwarePayload>> {
    let Some(body) = body else {
        return Ok(None);
    };
    let payload = parse_payload(body).unwrap_or_else(|| {
        log::debug!("Unsafe hardware payload {}", hex::encode(body.hash()));
        HardwarePayload::Unsafe(body.clone())
    });
    if *app_version >= payload.min_app_version() {
        return Ok(Some(payload));
    }

    log::debug!(
        "{} payloads are not supported by TON app v{app_version}",
        payload.kind()
    );
    if *app_version < VERSION_WITH_UNSAFE_PAYLOAD {
        return Err(ExpectedError::NotSupportedHardwareOperation);
    }
    Ok(Some(HardwarePayload::Unsafe(body.clone())))
}

/// Wallet hints for `version`, gated on the app version
pub fn wallet_specifiers(
    version: WalletVersion,
    app_version: &Version,
    subwallet_id: Option<u32>,
) -> Outcome<Option<WalletSpecifiers>> {
    let specifiers = match (version, subwallet_id) {
        (WalletVersion::V3R2, _) => WalletSpecifiers {
            subwallet_id: None,
            include_wallet_op: false,
        },
        (_, Some(id)) => WalletSpecifiers {
            subwallet_id: Some(id),
            include_wallet_op: false,
        },
        (_, None) => return Ok(None),
    };
    if !supports_wallet_specifiers(app_version) {
        return Err(ExpectedError::NotSupportedHardwareOperation);
    }
    Ok(Some(specifiers))
}

/// Convert one transfer to device form
///
/// Transfers with other than exactly one message, or with a non-external
/// auth type, are caller errors.
pub fn to_hardware_transaction(
    version: WalletVersion,
    transfer: &PreparedTransfer,
    app_version: &Version,
    subwallet_id: Option<u32>,
) -> signer::Result<Outcome<HardwareTransaction>> {
    if transfer.auth_type != AuthType::External {
        return Err(SignerError::UnsupportedAuthType {
            version,
            auth_type: transfer.auth_type,
        });
    }
    let message = match transfer.messages.as_slice() {
        [message] => message,
        [] => return Err(SignerError::MalformedTransfer("no messages".to_string())),
        _ => {
            return Err(SignerError::MalformedTransfer(
                "hardware wallets sign one message per transfer".to_string(),
            ));
        }
    };

    let payload = match classify_payload(message.body.as_ref(), app_version) {
        Ok(payload) => payload,
        Err(expected) => return Ok(Err(expected)),
    };
    let wallet_specifiers = match wallet_specifiers(version, app_version, subwallet_id) {
        Ok(specifiers) => specifiers,
        Err(expected) => return Ok(Err(expected)),
    };

    Ok(Ok(HardwareTransaction {
        to: message.to,
        send_mode: transfer.send_mode,
        seqno: transfer.seqno,
        timeout: transfer.timeout.unwrap_or_else(fallback_timeout),
        bounce: message.bounce,
        amount: message.amount,
        state_init: message.state_init.clone(),
        payload,
        wallet_specifiers,
    }))
}

/// Expected outcome for a device status, or the error to throw
fn expected_outcome(error: DeviceError) -> signer::Result<ExpectedError> {
    match error {
        DeviceError::Status(STATUS_BLIND_SIGNING_DISABLED) => {
            Ok(ExpectedError::HardwareBlindSigningNotEnabled)
        }
        DeviceError::Status(STATUS_REJECTED) => Ok(ExpectedError::RejectedByUser),
        other => Err(other.into()),
    }
}

/// Signer delegating to a hardware device
pub struct HardwareSigner {
    transport: Arc<dyn HardwareTransport>,
    wallet: TonWallet,
    path: [u32; 6],
    subwallet_id: Option<u32>,
}

impl HardwareSigner {
    /// Bind a device to the hardware wallet `wallet`
    pub fn new(
        transport: Arc<dyn HardwareTransport>,
        network: Network,
        wallet: TonWallet,
        subwallet_id: Option<u32>,
    ) -> signer::Result<Self> {
        let index = wallet.index.ok_or(SignerError::MissingAccountIndex)?;
        Ok(Self {
            transport,
            path: account_path(network, index),
            wallet,
            subwallet_id,
        })
    }

    /// Derivation path used for every request
    #[must_use]
    pub fn path(&self) -> &[u32; 6] {
        &self.path
    }
}

#[async_trait]
impl Signer for HardwareSigner {
    fn kind(&self) -> SignerKind {
        SignerKind::Hardware
    }

    async fn sign_ton_proof(
        &self,
        challenge: &TonProofChallenge,
    ) -> signer::Result<Outcome<Signature>> {
        let request = HardwareProofRequest {
            domain: challenge.domain.clone(),
            timestamp: challenge.timestamp,
            payload: challenge.payload.as_bytes().to_vec(),
        };
        match self.transport.sign_address_proof(&self.path, &request).await {
            Ok(signature) => Ok(Ok(signature)),
            Err(e) => expected_outcome(e).map(Err),
        }
    }

    async fn sign_transactions(
        &self,
        transfers: &[PreparedTransfer],
    ) -> signer::Result<Outcome<Vec<SignedTransfer>>> {
        let app_version = self.transport.app_version().await?;
        log::debug!(
            "Signing {} transfer(s) on device, TON app v{app_version}",
            transfers.len()
        );

        let mut transactions = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            match to_hardware_transaction(
                self.wallet.version,
                transfer,
                &app_version,
                self.subwallet_id,
            )? {
                Ok(transaction) => transactions.push(transaction),
                Err(expected) => return Ok(Err(expected)),
            }
        }

        let mut signed = Vec::with_capacity(transactions.len());
        for transaction in &transactions {
            match self
                .transport
                .sign_transaction(&self.path, transaction)
                .await
            {
                Ok(body) => signed.push(SignedTransfer {
                    seqno: transaction.seqno,
                    body,
                }),
                Err(e) => {
                    log::info!("Device declined transfer seqno={}: {e}", transaction.seqno);
                    return expected_outcome(e).map(Err);
                }
            }
        }
        Ok(Ok(signed))
    }

    async fn sign_data(
        &self,
        timestamp: u64,
        domain: &str,
        payload: &SignDataPayload,
    ) -> signer::Result<Outcome<Signature>> {
        log::debug!("Hardware sign-data requested for {} payload", payload.kind());
        match self
            .transport
            .sign_data(&self.path, timestamp, domain, payload)
            .await
        {
            Ok(signature) => Ok(Ok(signature)),
            Err(DeviceError::Unsupported) => Ok(Err(ExpectedError::NotSupportedHardwareOperation)),
            Err(e) => expected_outcome(e).map(Err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_address;
    use crate::transfer::InternalMessage;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn single(body: Option<CellRef>) -> PreparedTransfer {
        let mut message = InternalMessage::new(test_address(), 5, true);
        message.body = body;
        let mut transfer = PreparedTransfer::new(7, vec![message]);
        transfer.timeout = Some(1_800_000_000);
        transfer
    }

    fn comment_cell(text: &str) -> CellRef {
        InternalMessage::new(test_address(), 0, false)
            .with_comment(text)
            .unwrap()
            .body
            .unwrap()
    }

    #[test]
    fn test_account_path() {
        assert_eq!(account_path(Network::Mainnet, 3), [44, 607, 0, 0, 3, 0]);
        assert_eq!(account_path(Network::Testnet, 0), [44, 607, 1, 0, 0, 0]);
    }

    #[test]
    fn test_comment_payload_on_old_firmware() {
        let payload = classify_payload(Some(&comment_cell("Hello")), &v("2.0.0")).unwrap();
        assert_eq!(payload, Some(HardwarePayload::Comment("Hello".to_string())));
    }

    fn jetton_transfer() -> JettonTransfer {
        JettonTransfer {
            query_id: 1,
            amount: 1_000_000,
            destination: test_address(),
            response_destination: Address::new(0, [0x11; 32]),
            custom_payload: None,
            forward_amount: 1,
            forward_payload: Some(comment_cell("gift")),
        }
    }

    fn nft_transfer() -> NftTransfer {
        NftTransfer {
            query_id: 0,
            new_owner: test_address(),
            response_destination: Address::new(-1, [0x22; 32]),
            custom_payload: Some(Cell::empty().into_ref()),
            forward_amount: 0,
            forward_payload: None,
        }
    }

    #[test]
    fn test_jetton_transfer_on_old_firmware() {
        let transfer = jetton_transfer();
        let body = transfer.to_cell().unwrap().into_ref();
        assert_eq!(
            classify_payload(Some(&body), &v("2.0.0")),
            Ok(Some(HardwarePayload::JettonTransfer(transfer)))
        );
    }

    #[test]
    fn test_nft_transfer_needs_2_1() {
        let transfer = nft_transfer();
        let body = transfer.to_cell().unwrap().into_ref();
        assert_eq!(
            classify_payload(Some(&body), &v("2.0.0")),
            Err(ExpectedError::NotSupportedHardwareOperation)
        );
        assert_eq!(
            classify_payload(Some(&body), &v("2.1.0")),
            Ok(Some(HardwarePayload::NftTransfer(transfer)))
        );
    }

    #[test]
    fn test_non_canonical_transfers_are_unsafe() {
        let transfer = jetton_transfer();

        // Amount 1_000_000 written with a padded 4-byte length
        let mut padded = CellBuilder::new();
        padded
            .store_u32(JETTON_TRANSFER_OP)
            .unwrap()
            .store_u64(transfer.query_id)
            .unwrap()
            .store_uint(4, 4)
            .unwrap()
            .store_uint(32, transfer.amount)
            .unwrap()
            .store_address(&transfer.destination)
            .unwrap()
            .store_address(&transfer.response_destination)
            .unwrap()
            .store_maybe_reference(None)
            .unwrap()
            .store_coins(transfer.forward_amount)
            .unwrap()
            .store_maybe_reference(None)
            .unwrap();

        // Forward payload stored inline instead of by reference
        let mut inline = CellBuilder::new();
        inline
            .store_u32(NFT_TRANSFER_OP)
            .unwrap()
            .store_u64(0)
            .unwrap()
            .store_address(&test_address())
            .unwrap()
            .store_address(&test_address())
            .unwrap()
            .store_maybe_reference(None)
            .unwrap()
            .store_coins(0)
            .unwrap()
            .store_bit(false)
            .unwrap()
            .store_u32(0)
            .unwrap();

        for body in [padded, inline] {
            let body = body.build().unwrap().into_ref();
            assert!(matches!(
                classify_payload(Some(&body), &v("2.1.0")),
                Ok(Some(HardwarePayload::Unsafe(_)))
            ));
        }
    }

    #[test]
    fn test_unrecognised_payloads_are_unsafe() {
        let long = "a".repeat(MAX_COMMENT_LEN + 1);
        let mut truncated = CellBuilder::new();
        truncated.store_u32(JETTON_TRANSFER_OP).unwrap().store_u64(0).unwrap();
        let truncated = truncated.build().unwrap().into_ref();

        for body in [comment_cell(&long), comment_cell("tab\there"), truncated] {
            assert!(matches!(
                classify_payload(Some(&body), &v("2.1.0")),
                Ok(Some(HardwarePayload::Unsafe(_)))
            ));
            assert_eq!(
                classify_payload(Some(&body), &v("2.0.1")),
                Err(ExpectedError::NotSupportedHardwareOperation)
            );
        }
    }

    #[test]
    fn test_empty_body_has_no_payload() {
        assert_eq!(classify_payload(None, &v("1.0.0")), Ok(None));
    }

    #[test]
    fn test_wallet_specifiers() {
        let old = v("2.0.0");
        let new = v("2.1.0");
        assert_eq!(wallet_specifiers(WalletVersion::V4R2, &old, None), Ok(None));
        assert_eq!(wallet_specifiers(WalletVersion::W5, &old, None), Ok(None));
        assert_eq!(
            wallet_specifiers(WalletVersion::V3R2, &new, None),
            Ok(Some(WalletSpecifiers {
                subwallet_id: None,
                include_wallet_op: false
            }))
        );
        assert_eq!(
            wallet_specifiers(WalletVersion::V4R2, &new, Some(42)),
            Ok(Some(WalletSpecifiers {
                subwallet_id: Some(42),
                include_wallet_op: false
            }))
        );
        assert_eq!(
            wallet_specifiers(WalletVersion::V3R2, &old, None),
            Err(ExpectedError::NotSupportedHardwareOperation)
        );
        assert_eq!(
            wallet_specifiers(WalletVersion::V4R2, &old, Some(1)),
            Err(ExpectedError::NotSupportedHardwareOperation)
        );
    }

    #[test]
    fn test_conversion_copies_fields() {
        let transaction =
            to_hardware_transaction(WalletVersion::V4R2, &single(None), &v("2.0.0"), None)
                .unwrap()
                .unwrap();
        assert_eq!(transaction.to, test_address());
        assert_eq!(transaction.seqno, 7);
        assert_eq!(transaction.timeout, 1_800_000_000);
        assert_eq!(transaction.amount, 5);
        assert!(transaction.bounce);
        assert_eq!(transaction.send_mode.bits(), 3);
        assert_eq!(transaction.payload, None);
        assert_eq!(transaction.wallet_specifiers, None);
    }

    #[test]
    fn test_conversion_keeps_timeout_for_first_transfer() {
        let mut transfer = single(None);
        transfer.seqno = 0;
        let transaction =
            to_hardware_transaction(WalletVersion::V4R2, &transfer, &v("2.0.0"), None)
                .unwrap()
                .unwrap();
        assert_eq!(transaction.seqno, 0);
        assert_eq!(transaction.timeout, 1_800_000_000);

        transfer.timeout = None;
        let earliest = fallback_timeout();
        let transaction =
            to_hardware_transaction(WalletVersion::V4R2, &transfer, &v("2.0.0"), None)
                .unwrap()
                .unwrap();
        assert!(transaction.timeout >= earliest);
        assert!(transaction.timeout <= fallback_timeout());
    }

    #[test]
    fn test_conversion_rejects_message_counts() {
        let mut empty = single(None);
        empty.messages.clear();
        let mut double = single(None);
        double.messages.push(double.messages[0].clone());

        for transfer in [empty, double] {
            assert!(matches!(
                to_hardware_transaction(WalletVersion::W5, &transfer, &v("2.1.0"), None),
                Err(SignerError::MalformedTransfer(_))
            ));
        }
    }

    #[test]
    fn test_conversion_rejects_non_external_auth() {
        let mut transfer = single(None);
        transfer.auth_type = AuthType::Internal;
        assert!(matches!(
            to_hardware_transaction(WalletVersion::W5, &transfer, &v("2.1.0"), None),
            Err(SignerError::UnsupportedAuthType { .. })
        ));
    }

    /// Device that only knows its version
    struct BareDevice;

    #[async_trait]
    impl HardwareTransport for BareDevice {
        async fn app_version(&self) -> Result<Version> {
            Ok(Version::new(2, 2, 0))
        }

        async fn sign_address_proof(
            &self,
            _path: &[u32; 6],
            _request: &HardwareProofRequest,
        ) -> Result<Signature> {
            Err(DeviceError::Transport("unexpected proof request".into()))
        }

        async fn sign_transaction(
            &self,
            _path: &[u32; 6],
            _transaction: &HardwareTransaction,
        ) -> Result<CellRef> {
            Err(DeviceError::Transport("unexpected transaction".into()))
        }
    }

    #[tokio::test]
    async fn test_default_sign_data_is_not_supported() {
        let wallet = TonWallet {
            address: test_address().to_raw_string(),
            public_key: None,
            version: WalletVersion::W5,
            index: Some(0),
        };
        let signer =
            HardwareSigner::new(Arc::new(BareDevice), Network::Mainnet, wallet, None).unwrap();
        let payload = SignDataPayload::Text {
            text: "hi".to_string(),
        };
        assert_eq!(
            signer.sign_data(1, "example.com", &payload).await.unwrap(),
            Err(ExpectedError::NotSupportedHardwareOperation)
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            expected_outcome(DeviceError::Status(0xBD00)).unwrap(),
            ExpectedError::HardwareBlindSigningNotEnabled
        );
        assert_eq!(
            expected_outcome(DeviceError::Status(0x6985)).unwrap(),
            ExpectedError::RejectedByUser
        );
        assert!(matches!(
            expected_outcome(DeviceError::Status(0x6a80)),
            Err(SignerError::Device(DeviceError::Status(0x6a80)))
        ));
        assert!(expected_outcome(DeviceError::Transport("unplugged".into())).is_err());
    }
}
