//! Property-based tests for the signing algorithms using proptest
//!
//! These tests verify that:
//! 1. Sign-data never panics on arbitrary caller input
//! 2. Proof and sign-data signatures are deterministic and verify
//! 3. Hardware payload classification never panics

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;
use semver::Version;
use tonsign_cell::{Address, CellBuilder};
use tonsign_signer_lib::hardware::classify_payload;
use tonsign_signer_lib::keys::verify;
use tonsign_signer_lib::proof::{proof_hash, sign_ton_proof};
use tonsign_signer_lib::sign_data::sign_data_hash;
use tonsign_signer_lib::{KeyPair, SignDataPayload, TonProofChallenge, sign_data};

fn address(workchain: i32, hash: [u8; 32]) -> Address {
    Address::new(workchain, hash)
}

// ============================================================================
// Sign Data - Crash Safety
// ============================================================================

proptest! {
    /// Arbitrary base64-ish strings must give Ok or Err, never panic
    #[test]
    fn binary_payload_never_panics(bytes in "[A-Za-z0-9+/=]{0,64}") {
        let payload = SignDataPayload::Binary { bytes };
        let _ = sign_data_hash(&address(0, [1; 32]), 1, "example.com", &payload);
    }

    /// Arbitrary cell strings must give Ok or Err, never panic
    #[test]
    fn cell_payload_never_panics(cell in "[A-Za-z0-9+/=]{0,128}", schema in ".{0,32}") {
        let payload = SignDataPayload::Cell { schema, cell };
        let _ = sign_data_hash(&address(0, [1; 32]), 1, "example.com", &payload);
    }

    /// Arbitrary domains must give Ok or Err, never panic
    #[test]
    fn cell_domain_never_panics(domain in ".{0,64}") {
        let mut builder = CellBuilder::new();
        builder.store_u32(0).unwrap();
        let cell = tonsign_cell::boc::to_base64(&builder.build().unwrap().into_ref()).unwrap();
        let payload = SignDataPayload::Cell { schema: String::new(), cell };
        let _ = sign_data_hash(&address(-1, [2; 32]), 1, &domain, &payload);
    }
}

// ============================================================================
// Signatures - Determinism and Verification
// ============================================================================

proptest! {
    #[test]
    fn proof_signature_verifies(
        seed in any::<[u8; 32]>(),
        hash in any::<[u8; 32]>(),
        timestamp in 0..=i64::MAX.cast_unsigned(),
        domain in "[a-z]{1,20}\\.[a-z]{2,5}",
        payload in ".{0,64}",
    ) {
        let pair = KeyPair::from_seed(&seed);
        let wallet = address(0, hash);
        let challenge = TonProofChallenge { timestamp, domain, payload };

        let first = sign_ton_proof(&wallet, &pair, &challenge).unwrap();
        let second = sign_ton_proof(&wallet, &pair, &challenge).unwrap();
        prop_assert_eq!(first, second);

        let signed = proof_hash(&wallet, &challenge).unwrap();
        prop_assert!(verify(pair.public_key(), &signed, &first));
    }

    #[test]
    fn text_and_binary_signatures_verify(
        seed in any::<[u8; 32]>(),
        data in prop::collection::vec(any::<u8>(), 0..256),
        timestamp in 0..=i64::MAX.cast_unsigned(),
    ) {
        let pair = KeyPair::from_seed(&seed);
        let wallet = address(0, [7; 32]);
        let payload = SignDataPayload::Binary { bytes: STANDARD.encode(&data) };

        let signature = sign_data(&wallet, &pair, timestamp, "example.com", &payload).unwrap();
        let signed = sign_data_hash(&wallet, timestamp, "example.com", &payload).unwrap();
        prop_assert!(verify(pair.public_key(), &signed, &signature));

        // The same bytes signed as text carry a different tag
        if let Ok(text) = String::from_utf8(data) {
            let as_text = SignDataPayload::Text { text };
            let text_hash = sign_data_hash(&wallet, timestamp, "example.com", &as_text).unwrap();
            prop_assert_ne!(text_hash, signed);
        }
    }
}

// ============================================================================
// Hardware Payloads - Crash Safety
// ============================================================================

proptest! {
    #[test]
    fn classify_payload_never_panics(
        op in any::<u32>(),
        tail in prop::collection::vec(any::<u8>(), 0..300),
        minor in 0u64..4,
    ) {
        let mut builder = CellBuilder::new();
        builder.store_u32(op).unwrap().store_string_tail(&tail).unwrap();
        let body = builder.build().unwrap().into_ref();
        let _ = classify_payload(Some(&body), &Version::new(2, minor, 0));
    }
}
