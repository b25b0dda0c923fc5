//! Feldman verifiable secret sharing checks.

use tessera_core::{CurvePoint, Group, ScalarOf};

use crate::ParticipantId;

/// `Σ_k [i^k]·C_k`, the public image of `f(i)`.
///
/// Index powers are public, so the variable-time multiply is used.
pub fn commitment_at<G: Group>(index: ParticipantId, commitments: &[G::Point]) -> G::Point {
    let i = ScalarOf::<G>::from_u64(index as u64);
    let mut power = ScalarOf::<G>::ONE;
    let mut acc = G::identity();
    for c in commitments {
        acc = acc.add(&c.mul_vartime(&power));
        power *= i;
    }
    acc
}

/// Check a received share against the sender's commitments:
/// `[share]·G == C_0 + Σ_{k≥1} [index^k]·C_k`.
pub fn verify_share<G: Group>(
    share: &ScalarOf<G>,
    index: ParticipantId,
    commitments: &[G::Point],
) -> bool {
    if commitments.is_empty() || index == 0 {
        return false;
    }
    G::mul_base(share) == commitment_at::<G>(index, commitments)
}

/// Public verifying share of `index`: `Σ_senders Σ_k [index^k]·C_{sender,k}`.
///
/// Equals `[s_index]·G` when every sender dealt consistently.
pub fn expected_verifying_share<'a, G, I>(index: ParticipantId, commitment_sets: I) -> G::Point
where
    G: Group,
    I: IntoIterator<Item = &'a [G::Point]>,
{
    commitment_sets
        .into_iter()
        .fold(G::identity(), |acc, set| acc.add(&commitment_at::<G>(index, set)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tessera_core::{Ed25519, Polynomial, Secp256k1};

    fn consistency<G: Group>() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let poly = Polynomial::<G::Order>::random(2, &mut rng);
        let commitments = poly.commitments::<G::Point>();

        for i in 1..=5u16 {
            let share = poly.evaluate_at(i);
            assert!(verify_share::<G>(&share, i, &commitments), "{}", G::NAME);
            // Idempotent
            assert!(verify_share::<G>(&share, i, &commitments));

            let tampered = share + ScalarOf::<G>::ONE;
            assert!(!verify_share::<G>(&tampered, i, &commitments));

            // Right share, wrong index
            assert!(!verify_share::<G>(&share, i + 1, &commitments));
        }

        // Commitments from a different polynomial
        let other = Polynomial::<G::Order>::random(2, &mut rng).commitments::<G::Point>();
        assert!(!verify_share::<G>(&poly.evaluate_at(1), 1, &other));

        assert!(!verify_share::<G>(&poly.evaluate_at(1), 1, &[]));
        assert!(!verify_share::<G>(&poly.secret(), 0, &commitments));
    }

    #[test]
    fn test_vss_ed25519() {
        consistency::<Ed25519>();
    }

    #[test]
    fn test_vss_secp256k1() {
        consistency::<Secp256k1>();
    }

    #[test]
    fn test_expected_verifying_share() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let polys: Vec<_> = (0..3)
            .map(|_| Polynomial::<<Secp256k1 as Group>::Order>::random(1, &mut rng))
            .collect();
        let sets: Vec<_> = polys
            .iter()
            .map(|p| p.commitments::<<Secp256k1 as Group>::Point>())
            .collect();

        let index = 2;
        let share: ScalarOf<Secp256k1> = polys.iter().map(|p| p.evaluate_at(index)).sum();
        let expected =
            expected_verifying_share::<Secp256k1, _>(index, sets.iter().map(|s| s.as_slice()));
        assert_eq!(expected, Secp256k1::mul_base(&share));
    }
}
