//! End-to-end tests for the Tessera DKG
//!
//! These tests run complete key generations across every party and check
//! the outputs against each other: shared group key, reconstruction from any
//! quorum, and threshold signing with the resulting key packages.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tessera_core::{interpolate_at_zero, CurvePoint, Ed25519, Group, ScalarOf, Secp256k1};
use tessera_dkg::{
    run_dkg, signing, Coordinator, DkgConfig, DkgOutcome, KeyPackage, ParticipantId, SessionId,
    SigningPackage,
};

/// Every `size`-subset of `1..=n`
fn subsets(n: u16, size: usize) -> Vec<Vec<ParticipantId>> {
    let mut out = Vec::new();
    for mask in 0u32..(1 << n) {
        if mask.count_ones() as usize == size {
            out.push((1..=n).filter(|i| mask & (1 << (i - 1)) != 0).collect());
        }
    }
    out
}

fn reconstruct<G: Group>(outcome: &DkgOutcome<G>, ids: &[ParticipantId]) -> ScalarOf<G> {
    let shares: Vec<_> = ids
        .iter()
        .map(|id| (*id, *outcome.key_package(*id).unwrap().secret_share()))
        .collect();
    interpolate_at_zero::<G::Order>(&shares).unwrap()
}

async fn full_run<G: Group>() {
    // ==========================================
    // STEP 1: Run the DKG with N = 4, t = 2
    // ==========================================
    let outcome = run_dkg::<G>(4, 2).await.unwrap();
    assert_eq!(outcome.key_packages.len(), 4);

    // ==========================================
    // STEP 2: Everyone agrees on the group key
    // ==========================================
    for pkg in &outcome.key_packages {
        assert_eq!(pkg.group_key, outcome.group_key, "{}", G::NAME);
        assert_eq!(pkg.verification_hash, outcome.verification_hash());
        assert_eq!(pkg.verifying_shares.len(), 4);
        assert_eq!(pkg.verifying_shares, outcome.key_packages[0].verifying_shares);
    }
    assert!(!outcome.group_key.is_identity());

    // ==========================================
    // STEP 3: Shares are distinct, non-zero, and match the public shares
    // ==========================================
    let mut seen = BTreeSet::new();
    for pkg in &outcome.key_packages {
        let share = pkg.secret_share();
        assert!(!share.is_zero());
        assert!(seen.insert(share.to_be_bytes()), "duplicate share");
        assert_eq!(pkg.verifying_share(), Some(&G::mul_base(share)));
    }

    // ==========================================
    // STEP 4: Any 3 of 4 reconstruct the committed secret
    // ==========================================
    for quorum in subsets(4, 3) {
        let secret = reconstruct(&outcome, &quorum);
        assert_eq!(G::mul_base(&secret), outcome.group_key, "quorum {:?}", quorum);
    }
    let all = reconstruct(&outcome, &[1, 2, 3, 4]);
    assert_eq!(G::mul_base(&all), outcome.group_key);

    // Two shares are not enough
    for pair in subsets(4, 2) {
        let guess = reconstruct(&outcome, &pair);
        assert_ne!(G::mul_base(&guess), outcome.group_key);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_run_ed25519() {
    full_run::<Ed25519>().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_run_secp256k1() {
    full_run::<Secp256k1>().await;
}

#[tokio::test]
async fn test_current_thread_runtime() {
    // The protocol must not depend on parallel workers to make progress
    let outcome = run_dkg::<Ed25519>(5, 2).await.unwrap();
    assert_eq!(outcome.key_packages.len(), 5);
    let secret = reconstruct(&outcome, &[1, 3, 5]);
    assert_eq!(Ed25519::mul_base(&secret), outcome.group_key);
}

#[test]
fn test_blocking_entry_point() {
    let outcome = tessera_dkg::run_dkg_blocking::<Secp256k1>(3, 2).unwrap();
    let secret = reconstruct(&outcome, &[1, 2, 3]);
    assert_eq!(Secp256k1::mul_base(&secret), outcome.group_key);
    // Compressed SEC1 group key
    assert_eq!(outcome.group_key.encode().len(), 33);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let config = || {
        let mut c = DkgConfig::new(3, 1);
        c.seed = Some("ab".repeat(32));
        c
    };
    let a = Coordinator::<Ed25519>::new(config())
        .unwrap()
        .with_session_id(SessionId::from_bytes([1; 32]))
        .run()
        .await
        .unwrap();
    let b = Coordinator::<Ed25519>::new(config())
        .unwrap()
        .with_session_id(SessionId::from_bytes([2; 32]))
        .run()
        .await
        .unwrap();
    assert_ne!(a.group_key, b.group_key);
    assert_ne!(a.transcript_hash, b.transcript_hash);
}

async fn threshold_signing<G: Group>() {
    let outcome = run_dkg::<G>(4, 2).await.unwrap();
    let public = outcome.public_key_package().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(77);
    let message = b"transfer 10 units to account 7";

    for signers in subsets(4, 3).into_iter().chain(subsets(4, 4)) {
        let mut nonces = Vec::new();
        let mut commitments = Vec::new();
        for id in &signers {
            let (n, c) = signing::commit::<G, _>(*id, &mut rng);
            nonces.push(n);
            commitments.push(c);
        }
        let package = SigningPackage::new(message, commitments).unwrap();
        let shares: Vec<_> = signers
            .iter()
            .zip(nonces)
            .map(|(id, n)| signing::sign(outcome.key_package(*id).unwrap(), n, &package).unwrap())
            .collect();

        let signature = signing::aggregate(&package, &shares, &public).unwrap();
        assert!(
            signing::verify::<G>(&outcome.group_key, message, &signature),
            "{} signers {:?}",
            G::NAME,
            signers
        );
        assert!(!signing::verify::<G>(&outcome.group_key, b"other", &signature));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_threshold_signing_ed25519() {
    threshold_signing::<Ed25519>().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_threshold_signing_secp256k1() {
    threshold_signing::<Secp256k1>().await;
}

#[tokio::test]
async fn test_key_packages_survive_disk() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_dkg::<Secp256k1>(3, 1).await.unwrap();

    for pkg in &outcome.key_packages {
        let path = dir.path().join(format!("party-{}.json", pkg.participant_id));
        std::fs::write(&path, serde_json::to_string(pkg).unwrap()).unwrap();
    }

    let loaded: Vec<KeyPackage<Secp256k1>> = (1..=3)
        .map(|id| {
            let json = std::fs::read_to_string(dir.path().join(format!("party-{}.json", id)))
                .unwrap();
            serde_json::from_str(&json).unwrap()
        })
        .collect();

    let shares: Vec<_> = loaded
        .iter()
        .take(2)
        .map(|p| (p.participant_id, *p.secret_share()))
        .collect();
    let secret = interpolate_at_zero::<<Secp256k1 as Group>::Order>(&shares).unwrap();
    assert_eq!(Secp256k1::mul_base(&secret), outcome.group_key);

    // A key package for one suite does not load as another
    let json = std::fs::read_to_string(dir.path().join("party-1.json")).unwrap();
    assert!(serde_json::from_str::<KeyPackage<Ed25519>>(&json).is_err());
}
