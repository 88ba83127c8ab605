//! Hardware signer flows against a scripted device

use std::sync::Arc;
use tonsign_cell::{Address, CellBuilder};
use tonsign_signer_lib::hardware::{
    HardwarePayload, JettonTransfer, STATUS_BLIND_SIGNING_DISABLED, STATUS_REJECTED,
    WalletSpecifiers,
};
use tonsign_signer_lib::test_utils::{
    MockDevice, SIGN_DATA_TIMESTAMP, TEST_ADDRESS, mock_signed_body, proof_challenge,
    sample_cell_payload, test_address,
};
use tonsign_signer_lib::{
    DeviceError, ExpectedError, HardwareSigner, InternalMessage, Network, PreparedTransfer, Signer,
    SignerError, TonWallet, WalletVersion,
};

fn wallet(version: WalletVersion) -> TonWallet {
    TonWallet {
        address: TEST_ADDRESS.to_string(),
        public_key: None,
        version,
        index: Some(2),
    }
}

fn signer(
    device: &Arc<MockDevice>,
    network: Network,
    version: WalletVersion,
    subwallet_id: Option<u32>,
) -> HardwareSigner {
    HardwareSigner::new(device.clone(), network, wallet(version), subwallet_id).unwrap()
}

fn transfer(seqno: u32, comment: Option<&str>) -> PreparedTransfer {
    let mut message = InternalMessage::new(test_address(), 1_000, true);
    if let Some(comment) = comment {
        message = message.with_comment(comment).unwrap();
    }
    let mut transfer = PreparedTransfer::new(seqno, vec![message]);
    transfer.timeout = Some(1_900_000_000);
    transfer
}

fn unsafe_transfer(seqno: u32) -> PreparedTransfer {
    let mut body = CellBuilder::new();
    body.store_u32(0x0f8a_7ea5).unwrap().store_u64(7).unwrap();
    let mut transfer = transfer(seqno, None);
    transfer.messages[0] = transfer.messages[0]
        .clone()
        .with_body(body.build().unwrap().into_ref());
    transfer
}

#[tokio::test]
async fn test_transfers_signed_in_order() {
    let device = Arc::new(MockDevice::new("2.0.0"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::V4R2, None);
    let transfers = vec![transfer(5, Some("first")), transfer(6, None)];

    let signed = signer.sign_transactions(&transfers).await.unwrap().unwrap();

    let requests = device.transactions();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].payload,
        Some(HardwarePayload::Comment("first".to_string()))
    );
    assert_eq!(requests[1].payload, None);
    assert_eq!(signed.len(), 2);
    for (request, result) in requests.iter().zip(&signed) {
        assert_eq!(request.seqno, result.seqno);
        assert_eq!(result.body, mock_signed_body(request));
    }
}

#[tokio::test]
async fn test_unsafe_payload_needs_new_firmware() {
    let device = Arc::new(MockDevice::new("2.0.9"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::W5, None);
    let transfers = vec![transfer(1, Some("fine")), unsafe_transfer(2)];

    let outcome = signer.sign_transactions(&transfers).await.unwrap();
    assert_eq!(outcome, Err(ExpectedError::NotSupportedHardwareOperation));
    // Nothing reaches the device when any transfer is unsupported
    assert!(device.transactions().is_empty());
}

#[tokio::test]
async fn test_unsafe_payload_on_new_firmware() {
    let device = Arc::new(MockDevice::new("2.1.0"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::W5, None);

    let signed = signer
        .sign_transactions(&[unsafe_transfer(3)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signed.len(), 1);
    assert!(matches!(
        device.transactions()[0].payload,
        Some(HardwarePayload::Unsafe(_))
    ));
}

#[tokio::test]
async fn test_v3_wallet_specifiers() {
    let old = Arc::new(MockDevice::new("2.0.0"));
    let outcome = signer(&old, Network::Mainnet, WalletVersion::V3R2, None)
        .sign_transactions(&[transfer(1, None)])
        .await
        .unwrap();
    assert_eq!(outcome, Err(ExpectedError::NotSupportedHardwareOperation));

    let new = Arc::new(MockDevice::new("2.1.0"));
    signer(&new, Network::Mainnet, WalletVersion::V3R2, None)
        .sign_transactions(&[transfer(1, None)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        new.transactions()[0].wallet_specifiers,
        Some(WalletSpecifiers {
            subwallet_id: None,
            include_wallet_op: false,
        })
    );
}

#[tokio::test]
async fn test_subwallet_specifiers() {
    let device = Arc::new(MockDevice::new("2.2.0"));
    signer(&device, Network::Testnet, WalletVersion::V4R2, Some(17))
        .sign_transactions(&[transfer(1, None)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        device.transactions()[0].wallet_specifiers,
        Some(WalletSpecifiers {
            subwallet_id: Some(17),
            include_wallet_op: false,
        })
    );
}

#[tokio::test]
async fn test_user_rejection_stops_batch() {
    let device = Arc::new(MockDevice::new("2.1.0").with_status(STATUS_REJECTED));
    let signer = signer(&device, Network::Mainnet, WalletVersion::V4R2, None);

    let outcome = signer
        .sign_transactions(&[transfer(1, None), transfer(2, None)])
        .await
        .unwrap();
    assert_eq!(outcome, Err(ExpectedError::RejectedByUser));
    assert_eq!(device.transactions().len(), 1);
}

#[tokio::test]
async fn test_blind_signing_disabled() {
    let device = Arc::new(MockDevice::new("2.1.0").with_status(STATUS_BLIND_SIGNING_DISABLED));
    let signer = signer(&device, Network::Mainnet, WalletVersion::W5, None);

    let outcome = signer
        .sign_transactions(&[unsafe_transfer(1)])
        .await
        .unwrap();
    assert_eq!(outcome, Err(ExpectedError::HardwareBlindSigningNotEnabled));
}

#[tokio::test]
async fn test_other_status_is_an_error() {
    let device = Arc::new(MockDevice::new("2.1.0").with_status(0x6a80));
    let signer = signer(&device, Network::Mainnet, WalletVersion::V4R2, None);

    let result = signer.sign_transactions(&[transfer(1, None)]).await;
    assert!(matches!(
        result,
        Err(SignerError::Device(DeviceError::Status(0x6a80)))
    ));
    // No automatic retry
    assert_eq!(device.transactions().len(), 1);
}

#[tokio::test]
async fn test_multi_message_transfer_is_rejected() {
    let device = Arc::new(MockDevice::new("2.1.0"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::W5, None);
    let mut two = transfer(1, None);
    two.messages.push(two.messages[0].clone());

    let result = signer.sign_transactions(&[two]).await;
    assert!(matches!(result, Err(SignerError::MalformedTransfer(_))));
    assert!(device.transactions().is_empty());
}

#[tokio::test]
async fn test_missing_timeout_uses_fallback() {
    let device = Arc::new(MockDevice::new("2.1.0"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::V4R2, None);
    let mut input = transfer(4, None);
    input.timeout = None;

    signer.sign_transactions(&[input]).await.unwrap().unwrap();
    let timeout = device.transactions()[0].timeout;
    assert!(timeout > 1_700_000_000);
    assert!(timeout < u32::MAX);
}

#[tokio::test]
async fn test_proof_uses_account_path() {
    let device = Arc::new(MockDevice::new("2.1.0"));
    let signer = signer(&device, Network::Testnet, WalletVersion::W5, None);

    let signature = signer
        .sign_ton_proof(&proof_challenge())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signature, [0xAB; 64]);

    let proofs = device.proofs();
    let (path, request) = &proofs[0];
    assert_eq!(path, &vec![44, 607, 1, 0, 2, 0]);
    assert_eq!(request.domain, "example.com");
    assert_eq!(request.timestamp, 1_703_731_900);
    assert_eq!(request.payload, b"Hello, world");
}

#[tokio::test]
async fn test_proof_rejection_is_expected() {
    let device = Arc::new(MockDevice::new("2.1.0").with_status(STATUS_REJECTED));
    let signer = signer(&device, Network::Mainnet, WalletVersion::W5, None);
    let outcome = signer.sign_ton_proof(&proof_challenge()).await.unwrap();
    assert_eq!(outcome, Err(ExpectedError::RejectedByUser));
}

#[tokio::test]
async fn test_sign_data_unsupported_by_device() {
    let device = Arc::new(MockDevice::new("2.2.0"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::W5, None);

    let outcome = signer
        .sign_data(SIGN_DATA_TIMESTAMP, "example.com", &sample_cell_payload())
        .await
        .unwrap();
    assert_eq!(outcome, Err(ExpectedError::NotSupportedHardwareOperation));
    assert!(device.proofs().is_empty());
    assert!(device.transactions().is_empty());
}

#[tokio::test]
async fn test_sign_data_device_statuses() {
    let rejected = Arc::new(MockDevice::new("2.2.0").with_status(STATUS_REJECTED));
    let outcome = signer(&rejected, Network::Mainnet, WalletVersion::W5, None)
        .sign_data(SIGN_DATA_TIMESTAMP, "example.com", &sample_cell_payload())
        .await
        .unwrap();
    assert_eq!(outcome, Err(ExpectedError::RejectedByUser));

    let failing = Arc::new(MockDevice::new("2.2.0").with_status(0x6a80));
    let result = signer(&failing, Network::Mainnet, WalletVersion::W5, None)
        .sign_data(SIGN_DATA_TIMESTAMP, "example.com", &sample_cell_payload())
        .await;
    assert!(matches!(
        result,
        Err(SignerError::Device(DeviceError::Status(0x6a80)))
    ));
}

#[tokio::test]
async fn test_jetton_transfer_on_old_firmware() {
    let device = Arc::new(MockDevice::new("2.0.0"));
    let signer = signer(&device, Network::Mainnet, WalletVersion::V4R2, None);
    let jetton = JettonTransfer {
        query_id: 9,
        amount: 5_000_000_000,
        destination: Address::new(0, [0x33; 32]),
        response_destination: test_address(),
        custom_payload: None,
        forward_amount: 1,
        forward_payload: None,
    };
    let mut input = transfer(8, None);
    input.messages[0] = input.messages[0]
        .clone()
        .with_body(jetton.to_cell().unwrap().into_ref());

    signer.sign_transactions(&[input]).await.unwrap().unwrap();
    assert_eq!(
        device.transactions()[0].payload,
        Some(HardwarePayload::JettonTransfer(jetton))
    );
}
