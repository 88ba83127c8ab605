//! TON Connect signing demo
//!
//! Signs a proof challenge and a text sign-data request with a throwaway
//! key, then signs the same proof with a mock signer to show that its
//! signature does not verify.
//!
//! Run with: cargo run --example connect_demo

use tonsign_signer_lib::keys::verify;
use tonsign_signer_lib::proof::{TonProofReply, proof_hash};
use tonsign_signer_lib::{
    FixedKeyProvider, KeyPair, MockSigner, Network, SignDataPayload, SignDataResult, Signer,
    SoftwareSigner, TonProofChallenge, WalletVersion,
};
use tonsign_cell::{Address, FriendlyFlags};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let key_pair = KeyPair::from_seed(&[42u8; 32]);
    let address = Address::new(0, [0x5A; 32]);
    println!(
        "Wallet: {}",
        address.to_friendly_string(FriendlyFlags {
            bounceable: false,
            test_only: false,
            url_safe: true,
        })?
    );
    println!("Public key: {}\n", hex::encode(key_pair.public_key()));

    let signer = SoftwareSigner::new(
        address,
        WalletVersion::W5,
        Network::Mainnet,
        FixedKeyProvider::new(key_pair.clone()),
    );

    let challenge = TonProofChallenge {
        timestamp: 1_703_731_900,
        domain: "example.com".to_string(),
        payload: "demo".to_string(),
    };
    let signature = signer.sign_ton_proof(&challenge).await??;
    let reply = TonProofReply::new(&challenge, &signature)?;
    println!("ton_proof reply:\n{}\n", serde_json::to_string_pretty(&reply)?);

    let payload = SignDataPayload::Text {
        text: "Hello, TON!".to_string(),
    };
    let signature = signer.sign_data(1_703_980_800, "example.com", &payload).await??;
    let result = SignDataResult::new(&address, 1_703_980_800, "example.com", payload, &signature);
    println!("signData result:\n{}\n", serde_json::to_string_pretty(&result)?);

    let mock = MockSigner::mock(
        address,
        WalletVersion::W5,
        Network::Mainnet,
        Some(*key_pair.public_key()),
    );
    let mock_signature = mock.sign_ton_proof(&challenge).await??;
    let hash = proof_hash(&address, &challenge)?;
    println!(
        "Mock proof verifies: {}",
        verify(key_pair.public_key(), &hash, &mock_signature)
    );

    Ok(())
}
