#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_core::{Ed25519, Secp256k1};
use tessera_dkg::{schnorr, CommitmentPackage, SessionId};

fuzz_target!(|data: &[u8]| {
    if let Ok(pkg) = CommitmentPackage::<Ed25519>::from_bytes(data) {
        // If parsing succeeded, serialization should round-trip
        assert_eq!(pkg.to_bytes(), data);

        // Verifying a random proof should not panic
        let session = SessionId::from_bytes([0u8; 32]);
        let ctx = schnorr::proof_context(&session, pkg.sender);
        if let Some(c0) = pkg.constant_term() {
            let _ = schnorr::verify::<Ed25519>(c0, &pkg.proof, &ctx);
        }
    }

    if let Ok(pkg) = CommitmentPackage::<Secp256k1>::from_bytes(data) {
        assert_eq!(pkg.to_bytes(), data);
        assert!(!pkg.commitments.is_empty());
    }
});
