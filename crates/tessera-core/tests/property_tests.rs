//! Property-based tests for tessera-core using proptest
//!
//! Field arithmetic is checked against `num-bigint`, and both groups against
//! independent implementations (`curve25519-dalek`, `k256`).

use num_bigint::BigUint;
use proptest::prelude::*;
use tessera_core::field::{
    Curve25519Base, Ed25519Order, Scalar25519, ScalarSecp256k1, Secp256k1Base, Secp256k1Order,
};
use tessera_core::{
    evaluate_commitments, CurvePoint, Ed25519, EdwardsPoint, Fp, Group, Modulus, Polynomial,
    Secp256k1, Secp256k1Point,
};

// ============================================
// Helpers
// ============================================

fn arb_wide() -> impl Strategy<Value = [u8; 64]> {
    prop::collection::vec(any::<u8>(), 64).prop_map(|v| {
        let mut out = [0u8; 64];
        out.copy_from_slice(&v);
        out
    })
}

fn modulus<M: Modulus>() -> BigUint {
    BigUint::from_bytes_le(&M::MODULUS.to_le_bytes())
}

fn big<M: Modulus>(x: &Fp<M>) -> BigUint {
    BigUint::from_bytes_le(&x.to_le_bytes())
}

fn check_reduction<M: Modulus>(a_wide: &[u8; 64], b_wide: &[u8; 64]) -> Result<(), TestCaseError> {
    let p = modulus::<M>();

    let a = Fp::<M>::from_bytes_wide(a_wide);
    let b = Fp::<M>::from_bytes_wide(b_wide);
    prop_assert_eq!(big(&a), BigUint::from_bytes_le(a_wide) % &p, "{}", M::NAME);
    prop_assert!(big(&a) < p);

    prop_assert_eq!(big(&(a * b)), (big(&a) * big(&b)) % &p, "{} mul", M::NAME);
    prop_assert_eq!(big(&(a + b)), (big(&a) + big(&b)) % &p, "{} add", M::NAME);
    prop_assert_eq!(big(&(a - b)), (&p + big(&a) - big(&b)) % &p, "{} sub", M::NAME);
    prop_assert_eq!(big(&a.square()), big(&a).pow(2u32) % &p, "{} square", M::NAME);
    Ok(())
}

fn dalek_mul_base(k: &Scalar25519) -> [u8; 32] {
    let s = curve25519_dalek::Scalar::from_bytes_mod_order(k.to_le_bytes());
    (curve25519_dalek::constants::ED25519_BASEPOINT_POINT * s)
        .compress()
        .to_bytes()
}

fn k256_mul_base(k: &ScalarSecp256k1) -> Vec<u8> {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use k256::elliptic_curve::PrimeField;

    let s = k256::Scalar::from_repr(k.to_be_bytes().into()).unwrap();
    (k256::ProjectivePoint::GENERATOR * s)
        .to_affine()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec()
}

// ============================================
// Field arithmetic
// ============================================

proptest! {
    #[test]
    fn reduction_matches_bigint_all_moduli(a in arb_wide(), b in arb_wide()) {
        check_reduction::<Curve25519Base>(&a, &b)?;
        check_reduction::<Secp256k1Base>(&a, &b)?;
        check_reduction::<Ed25519Order>(&a, &b)?;
        check_reduction::<Secp256k1Order>(&a, &b)?;
    }

    #[test]
    fn reduction_of_max_limbs(fill in 0xf0u8..=0xff) {
        // Near-2^512 inputs exercise the most folding passes.
        let wide = [fill; 64];
        check_reduction::<Curve25519Base>(&wide, &wide)?;
        check_reduction::<Secp256k1Base>(&wide, &wide)?;
        check_reduction::<Ed25519Order>(&wide, &wide)?;
        check_reduction::<Secp256k1Order>(&wide, &wide)?;
    }

    #[test]
    fn canonical_bytes_rejected_above_modulus(offset in 0u64..1000) {
        let p = modulus::<Curve25519Base>() + BigUint::from(offset);
        let mut bytes = [0u8; 32];
        let le = p.to_bytes_le();
        bytes[..le.len()].copy_from_slice(&le);
        prop_assert!(Fp::<Curve25519Base>::from_le_bytes(&bytes).is_err());
    }

    #[test]
    fn invert_is_inverse(a in arb_wide()) {
        let x = Scalar25519::from_bytes_wide(&a);
        prop_assume!(!x.is_zero());
        prop_assert_eq!(x * x.invert().unwrap(), Scalar25519::ONE);
    }
}

// ============================================
// Groups
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn ed25519_mul_base_matches_dalek(k in arb_wide()) {
        let k = Scalar25519::from_bytes_wide(&k);
        let ours = Ed25519::mul_base(&k).encode();
        let theirs = dalek_mul_base(&k).to_vec();
        prop_assert_eq!(ours, theirs);
    }

    #[test]
    fn secp256k1_mul_base_matches_k256(k in arb_wide()) {
        let k = ScalarSecp256k1::from_bytes_wide(&k);
        prop_assume!(!k.is_zero());
        prop_assert_eq!(Secp256k1::mul_base(&k).encode(), k256_mul_base(&k));
    }

    #[test]
    fn ed25519_decode_inverts_encode(k in arb_wide()) {
        let p = Ed25519::mul_base(&Scalar25519::from_bytes_wide(&k));
        let decoded = EdwardsPoint::decode(&p.encode()).unwrap();
        prop_assert_eq!(decoded, p);
    }

    #[test]
    fn secp256k1_decode_inverts_encode(k in arb_wide()) {
        let p = Secp256k1::mul_base(&ScalarSecp256k1::from_bytes_wide(&k));
        let decoded = Secp256k1Point::decode(&p.encode()).unwrap();
        prop_assert_eq!(decoded, p);
    }

    #[test]
    fn ed25519_decode_agrees_with_dalek(bytes in any::<[u8; 32]>()) {
        // Whatever dalek accepts and we accept must be the same point.
        let ours = EdwardsPoint::decode(&bytes);
        let theirs = curve25519_dalek::edwards::CompressedEdwardsY(bytes).decompress();
        if let Ok(p) = ours {
            let theirs = theirs.expect("dalek rejects a point we accepted");
            prop_assert!(theirs.is_torsion_free());
            prop_assert_eq!(p.encode(), theirs.compress().to_bytes().to_vec());
        }
    }

    #[test]
    fn group_law_additive(a in arb_wide(), b in arb_wide()) {
        let a = ScalarSecp256k1::from_bytes_wide(&a);
        let b = ScalarSecp256k1::from_bytes_wide(&b);
        prop_assert_eq!(
            Secp256k1::mul_base(&(a + b)),
            Secp256k1::mul_base(&a).add(&Secp256k1::mul_base(&b))
        );
        let p = Secp256k1::mul_base(&a);
        prop_assert_eq!(p.double(), p.add(&p));
    }

    #[test]
    fn ladder_matches_vartime(a in arb_wide(), b in arb_wide()) {
        let p = Ed25519::mul_base(&Scalar25519::from_bytes_wide(&a));
        let k = Scalar25519::from_bytes_wide(&b);
        prop_assert_eq!(p.mul(&k), p.mul_vartime(&k));
    }
}

// ============================================
// Polynomials
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn horner_matches_power_sum(coeffs in prop::collection::vec(any::<u64>(), 1..8), x in any::<u64>()) {
        let coeffs: Vec<Scalar25519> = coeffs.into_iter().map(Scalar25519::from_u64).collect();
        let poly = Polynomial::from_coefficients(coeffs.clone()).unwrap();
        let x = Scalar25519::from_u64(x);

        let mut power = Scalar25519::ONE;
        let mut expected = Scalar25519::ZERO;
        for c in &coeffs {
            expected += *c * power;
            power *= x;
        }
        prop_assert_eq!(poly.evaluate(&x), expected);
    }

    #[test]
    fn commitments_match_evaluation(threshold in 1usize..5, seed in any::<u64>(), x in 1u64..256) {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(seed);
        let poly = Polynomial::<Secp256k1Order>::random(threshold, &mut rng);
        let commitments = poly.commitments::<Secp256k1Point>();
        let x = ScalarSecp256k1::from_u64(x);
        prop_assert_eq!(
            evaluate_commitments(&commitments, &x),
            Secp256k1::mul_base(&poly.evaluate(&x))
        );
    }
}
