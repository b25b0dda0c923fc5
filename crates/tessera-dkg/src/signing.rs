//! Two-round threshold Schnorr signing with DKG key packages.
//!
//! 1. Every signer calls [`commit`] and publishes its [`SigningCommitments`].
//! 2. The commitments and the message form a [`SigningPackage`]; each signer
//!    calls [`sign`], consuming its [`SigningNonces`].
//! 3. [`aggregate`] checks every share against the signer's verifying share
//!    and sums them into a [`Signature`] that [`verify`] accepts under the
//!    group key.
//!
//! Nonces are single-use. [`sign`] takes them by value and they are zeroized
//! when dropped.

use std::collections::BTreeMap;
use std::fmt;

use rand::{CryptoRng, RngCore};
use tracing::{debug, instrument, warn};
use zeroize::Zeroize;

use tessera_core::{lagrange_coefficient, CoreError, CurvePoint, Group, ScalarOf};

use crate::error::{DkgError, Result};
use crate::package::{KeyPackage, PublicKeyPackage};
use crate::ParticipantId;

const BINDING_TAG: &[u8] = b"tessera-sign/rho/v1";
const CHALLENGE_TAG: &[u8] = b"tessera-sign/chal/v1";

/// Secret nonces `(d, e)` for one signing session.
pub struct SigningNonces<G: Group> {
    pub(crate) hiding: ScalarOf<G>,
    pub(crate) binding: ScalarOf<G>,
    pub(crate) commitments: SigningCommitments<G>,
}

impl<G: Group> SigningNonces<G> {
    /// The public commitments matching these nonces
    pub fn commitments(&self) -> &SigningCommitments<G> {
        &self.commitments
    }
}

impl<G: Group> Drop for SigningNonces<G> {
    fn drop(&mut self) {
        self.hiding.zeroize();
        self.binding.zeroize();
    }
}

impl<G: Group> fmt::Debug for SigningNonces<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningNonces")
            .field("signer", &self.commitments.signer)
            .field("hiding", &"[REDACTED]")
            .field("binding", &"[REDACTED]")
            .finish()
    }
}

/// Public nonce commitments `(D, E) = ([d]G, [e]G)`.
#[derive(Debug, Clone, Copy)]
pub struct SigningCommitments<G: Group> {
    pub signer: ParticipantId,
    pub hiding: G::Point,
    pub binding: G::Point,
}

impl<G: Group> PartialEq for SigningCommitments<G> {
    fn eq(&self, other: &Self) -> bool {
        self.signer == other.signer && self.hiding == other.hiding && self.binding == other.binding
    }
}

impl<G: Group> Eq for SigningCommitments<G> {}

/// Round one: draw fresh nonces for `signer`.
///
/// `rng` must never repeat a stream across signing sessions. Reusing a
/// nonce pair under two messages reveals the signer's share.
pub fn commit<G, R>(signer: ParticipantId, rng: &mut R) -> (SigningNonces<G>, SigningCommitments<G>)
where
    G: Group,
    R: RngCore + CryptoRng + ?Sized,
{
    let hiding = ScalarOf::<G>::random(rng);
    let binding = ScalarOf::<G>::random(rng);
    let commitments = SigningCommitments {
        signer,
        hiding: G::mul_base(&hiding),
        binding: G::mul_base(&binding),
    };
    let nonces = SigningNonces {
        hiding,
        binding,
        commitments,
    };
    (nonces, commitments)
}

/// Message plus every participating signer's commitments.
#[derive(Debug, Clone)]
pub struct SigningPackage<G: Group> {
    message: Vec<u8>,
    commitments: BTreeMap<ParticipantId, SigningCommitments<G>>,
}

impl<G: Group> SigningPackage<G> {
    pub fn new(message: &[u8], commitments: Vec<SigningCommitments<G>>) -> Result<Self> {
        if commitments.is_empty() {
            return Err(DkgError::Signing("no signer commitments".to_string()));
        }
        let mut map = BTreeMap::new();
        for c in commitments {
            if c.signer == 0 {
                return Err(DkgError::Signing("signer index 0 is reserved".to_string()));
            }
            if map.insert(c.signer, c).is_some() {
                return Err(DkgError::Signing(format!(
                    "duplicate commitments from signer {}",
                    c.signer
                )));
            }
        }
        Ok(Self {
            message: message.to_vec(),
            commitments: map,
        })
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Signer indices in ascending order
    pub fn signers(&self) -> Vec<ParticipantId> {
        self.commitments.keys().copied().collect()
    }

    pub fn commitments(&self, signer: ParticipantId) -> Option<&SigningCommitments<G>> {
        self.commitments.get(&signer)
    }

    /// `id ‖ D ‖ E` for every signer, in index order
    fn encoded_commitments(&self) -> Vec<u8> {
        let point_len = <G::Point as CurvePoint>::ENCODED_LEN;
        let mut out = Vec::with_capacity(self.commitments.len() * (2 + 2 * point_len));
        for (id, c) in &self.commitments {
            out.extend_from_slice(&id.to_be_bytes());
            out.extend_from_slice(&c.hiding.encode());
            out.extend_from_slice(&c.binding.encode());
        }
        out
    }

    /// `ρ_j` for every signer
    fn binding_factors(&self) -> BTreeMap<ParticipantId, ScalarOf<G>> {
        let encoded = self.encoded_commitments();
        self.commitments
            .keys()
            .map(|id| {
                let rho = G::hash_to_scalar(
                    BINDING_TAG,
                    &[&id.to_be_bytes(), &self.message, &encoded],
                );
                (*id, rho)
            })
            .collect()
    }

    /// `R = Σ D_j + [ρ_j]E_j`
    fn group_commitment(&self, factors: &BTreeMap<ParticipantId, ScalarOf<G>>) -> Result<G::Point> {
        let mut r = G::identity();
        for (id, c) in &self.commitments {
            let rho = factors
                .get(id)
                .ok_or_else(|| DkgError::Signing(format!("no binding factor for signer {}", id)))?;
            r = r.add(&c.hiding).add(&c.binding.mul_vartime(rho));
        }
        Ok(r)
    }
}

fn challenge<G: Group>(r: &G::Point, group_key: &G::Point, message: &[u8]) -> ScalarOf<G> {
    G::hash_to_scalar(CHALLENGE_TAG, &[&r.encode(), &group_key.encode(), message])
}

/// One signer's contribution `z_j`.
#[derive(Debug, Clone, Copy)]
pub struct SignatureShare<G: Group> {
    pub signer: ParticipantId,
    pub share: ScalarOf<G>,
}

/// Shared values every signer and the aggregator derive from a package.
pub(crate) struct SessionValues<G: Group> {
    factors: BTreeMap<ParticipantId, ScalarOf<G>>,
    pub(crate) group_commitment: G::Point,
    pub(crate) challenge: ScalarOf<G>,
    signers: Vec<ParticipantId>,
}

impl<G: Group> SessionValues<G> {
    fn derive(package: &SigningPackage<G>, group_key: &G::Point) -> Result<Self> {
        Self::with_challenge(package, |r| {
            Ok(challenge::<G>(r, group_key, &package.message))
        })
    }

    /// Binding factors and `R` from the package, with the challenge
    /// computed from `R` by `challenge_fn`.
    pub(crate) fn with_challenge<F>(package: &SigningPackage<G>, challenge_fn: F) -> Result<Self>
    where
        F: FnOnce(&G::Point) -> Result<ScalarOf<G>>,
    {
        let factors = package.binding_factors();
        let group_commitment = package.group_commitment(&factors)?;
        let challenge = challenge_fn(&group_commitment)?;
        Ok(Self {
            factors,
            group_commitment,
            challenge,
            signers: package.signers(),
        })
    }

    pub(crate) fn factor(&self, signer: ParticipantId) -> Result<ScalarOf<G>> {
        self.factors
            .get(&signer)
            .copied()
            .ok_or_else(|| DkgError::Signing(format!("signer {} is not in the package", signer)))
    }

    pub(crate) fn lagrange(&self, signer: ParticipantId) -> Result<ScalarOf<G>> {
        Ok(lagrange_coefficient::<G::Order>(signer, &self.signers)?)
    }
}

fn check_quorum(signers: usize, min_signers: usize) -> Result<()> {
    if signers < min_signers {
        return Err(DkgError::Signing(format!(
            "{} signers, at least {} required",
            signers, min_signers
        )));
    }
    Ok(())
}

/// The package has a quorum and carries exactly the commitments of `nonces`
/// for this signer.
pub(crate) fn check_signer<G: Group>(
    key_package: &KeyPackage<G>,
    nonces: &SigningNonces<G>,
    package: &SigningPackage<G>,
) -> Result<()> {
    let signer = key_package.participant_id;
    check_quorum(package.commitments.len(), key_package.min_signers())?;

    let published = package
        .commitments(signer)
        .ok_or_else(|| DkgError::Signing(format!("signer {} is not in the package", signer)))?;
    if *published != nonces.commitments {
        return Err(DkgError::Signing(format!(
            "nonces of signer {} do not match its published commitments",
            signer
        )));
    }
    Ok(())
}

/// Shares keyed by signer, rejecting duplicates and any mismatch with the
/// package's signer set.
pub(crate) fn index_shares<'a, G: Group>(
    package: &SigningPackage<G>,
    shares: &'a [SignatureShare<G>],
    min_signers: usize,
) -> Result<BTreeMap<ParticipantId, &'a SignatureShare<G>>> {
    check_quorum(package.commitments.len(), min_signers)?;

    let mut by_signer = BTreeMap::new();
    for s in shares {
        if by_signer.insert(s.signer, s).is_some() {
            return Err(DkgError::Signing(format!(
                "duplicate share from signer {}",
                s.signer
            )));
        }
    }
    if by_signer.keys().copied().collect::<Vec<_>>() != package.signers() {
        return Err(DkgError::Signing(
            "signature shares do not match the package's signers".to_string(),
        ));
    }
    Ok(by_signer)
}

/// Round two: `z_j = d_j + e_j·ρ_j + λ_j·s_j·c`.
#[instrument(skip_all, fields(signer = key_package.participant_id))]
pub fn sign<G: Group>(
    key_package: &KeyPackage<G>,
    nonces: SigningNonces<G>,
    package: &SigningPackage<G>,
) -> Result<SignatureShare<G>> {
    let signer = key_package.participant_id;
    check_signer(key_package, &nonces, package)?;

    let values = SessionValues::derive(package, &key_package.group_key)?;
    let rho = values.factor(signer)?;
    let lambda = values.lagrange(signer)?;

    let share = nonces.hiding + nonces.binding * rho + lambda * *key_package.secret_share() * values.challenge;
    debug!("signature share computed");
    Ok(SignatureShare { signer, share })
}

/// Check `[z_j]G == D_j + [ρ_j]E_j + [λ_j·c]Y_j`.
pub fn verify_share<G: Group>(
    share: &SignatureShare<G>,
    verifying_share: &G::Point,
    package: &SigningPackage<G>,
    group_key: &G::Point,
) -> Result<bool> {
    let values = SessionValues::derive(package, group_key)?;
    verify_share_with(share, verifying_share, package, &values)
}

fn verify_share_with<G: Group>(
    share: &SignatureShare<G>,
    verifying_share: &G::Point,
    package: &SigningPackage<G>,
    values: &SessionValues<G>,
) -> Result<bool> {
    let commitments = package.commitments(share.signer).ok_or_else(|| {
        DkgError::Signing(format!("signer {} is not in the package", share.signer))
    })?;
    let rho = values.factor(share.signer)?;
    let lambda = values.lagrange(share.signer)?;

    let lhs = G::generator().mul_vartime(&share.share);
    let rhs = commitments
        .hiding
        .add(&commitments.binding.mul_vartime(&rho))
        .add(&verifying_share.mul_vartime(&(lambda * values.challenge)));
    Ok(lhs == rhs)
}

/// Check every share and combine them into a group signature.
///
/// Fails naming the first signer whose share does not verify.
#[instrument(skip_all, fields(signers = shares.len()))]
pub fn aggregate<G: Group>(
    package: &SigningPackage<G>,
    shares: &[SignatureShare<G>],
    public: &PublicKeyPackage<G>,
) -> Result<Signature<G>> {
    let by_signer = index_shares(package, shares, public.min_signers())?;

    let values = SessionValues::derive(package, &public.group_key)?;
    let mut z = ScalarOf::<G>::ZERO;
    for (signer, share) in by_signer {
        let verifying_share = public.verifying_shares.get(&signer).ok_or_else(|| {
            DkgError::Signing(format!("no verifying share for signer {}", signer))
        })?;
        if !verify_share_with(share, verifying_share, package, &values)? {
            warn!(signer, "invalid signature share");
            return Err(DkgError::Signing(format!(
                "invalid signature share from signer {}",
                signer
            )));
        }
        z += share.share;
    }

    Ok(Signature {
        r: values.group_commitment,
        z,
    })
}

/// A Schnorr signature `(R, z)`.
#[derive(Debug, Clone, Copy)]
pub struct Signature<G: Group> {
    pub r: G::Point,
    pub z: ScalarOf<G>,
}

impl<G: Group> Signature<G> {
    /// `R ‖ z` with `z` little-endian
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.r.encode();
        out.extend_from_slice(&self.z.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let point_len = <G::Point as CurvePoint>::ENCODED_LEN;
        if bytes.len() != point_len + 32 {
            return Err(CoreError::MalformedInput {
                what: "signature",
                reason: format!("expected {} bytes, got {}", point_len + 32, bytes.len()),
            }
            .into());
        }
        let r = <G::Point as CurvePoint>::decode(&bytes[..point_len])?;
        let mut z = [0u8; 32];
        z.copy_from_slice(&bytes[point_len..]);
        Ok(Self {
            r,
            z: ScalarOf::<G>::from_le_bytes(&z)?,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl<G: Group> PartialEq for Signature<G> {
    fn eq(&self, other: &Self) -> bool {
        self.r == other.r && self.z == other.z
    }
}

impl<G: Group> Eq for Signature<G> {}

/// Check `[z]G == R + [c]Y`.
pub fn verify<G: Group>(group_key: &G::Point, message: &[u8], signature: &Signature<G>) -> bool {
    let c = challenge::<G>(&signature.r, group_key, message);
    let lhs = G::generator().mul_vartime(&signature.z);
    let rhs = signature.r.add(&group_key.mul_vartime(&c));
    lhs == rhs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DkgConfig;
    use crate::coordinator::Coordinator;
    use crate::types::SessionId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tessera_core::{Ed25519, Secp256k1};

    async fn keygen<G: Group>(n: u16, t: u16) -> Vec<KeyPackage<G>> {
        let mut config = DkgConfig::new(n, t);
        config.seed = Some("42".repeat(32));
        Coordinator::<G>::new(config)
            .unwrap()
            .with_session_id(SessionId::from_bytes([9u8; 32]))
            .run()
            .await
            .unwrap()
            .key_packages
    }

    fn sign_with<G: Group>(
        packages: &[KeyPackage<G>],
        signers: &[ParticipantId],
        message: &[u8],
        rng: &mut ChaCha20Rng,
    ) -> (SigningPackage<G>, Vec<SignatureShare<G>>) {
        let mut nonces = Vec::new();
        let mut commitments = Vec::new();
        for id in signers {
            let (n, c) = commit::<G, _>(*id, rng);
            nonces.push(n);
            commitments.push(c);
        }
        let package = SigningPackage::new(message, commitments).unwrap();
        let shares = signers
            .iter()
            .zip(nonces)
            .map(|(id, n)| sign(&packages[*id as usize - 1], n, &package).unwrap())
            .collect();
        (package, shares)
    }

    async fn quorum_signs<G: Group>() {
        let packages = keygen::<G>(4, 2).await;
        let public = packages[0].public_key_package();
        let mut rng = ChaCha20Rng::seed_from_u64(5);

        for signers in [[1u16, 2, 3], [2, 3, 4], [1, 3, 4]] {
            let (package, shares) = sign_with(&packages, &signers, b"hello", &mut rng);
            for s in &shares {
                let vs = &public.verifying_shares[&s.signer];
                assert!(verify_share(s, vs, &package, &public.group_key).unwrap());
            }
            let sig = aggregate(&package, &shares, &public).unwrap();
            assert!(verify::<G>(&public.group_key, b"hello", &sig), "{}", G::NAME);
            assert!(!verify::<G>(&public.group_key, b"hellO", &sig));

            let back = Signature::<G>::from_bytes(&sig.to_bytes()).unwrap();
            assert_eq!(back, sig);
        }
    }

    #[tokio::test]
    async fn test_quorum_signs_ed25519() {
        quorum_signs::<Ed25519>().await;
    }

    #[tokio::test]
    async fn test_quorum_signs_secp256k1() {
        quorum_signs::<Secp256k1>().await;
    }

    #[tokio::test]
    async fn test_all_parties_sign() {
        let packages = keygen::<Ed25519>(3, 1).await;
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let (package, shares) = sign_with(&packages, &[1, 2, 3], b"msg", &mut rng);
        let sig = aggregate(&package, &shares, &packages[2].public_key_package()).unwrap();
        assert!(verify::<Ed25519>(&packages[0].group_key, b"msg", &sig));
    }

    #[tokio::test]
    async fn test_below_quorum_rejected() {
        let packages = keygen::<Secp256k1>(4, 2).await;
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let (n1, c1) = commit::<Secp256k1, _>(1, &mut rng);
        let (_n2, c2) = commit::<Secp256k1, _>(2, &mut rng);
        let package = SigningPackage::new(b"m", vec![c1, c2]).unwrap();
        let err = sign(&packages[0], n1, &package).unwrap_err();
        assert!(matches!(err, DkgError::Signing(_)));
    }

    #[tokio::test]
    async fn test_bad_share_names_signer() {
        let packages = keygen::<Ed25519>(4, 2).await;
        let public = packages[0].public_key_package();
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let (package, mut shares) = sign_with(&packages, &[1, 2, 4], b"m", &mut rng);
        shares[2].share += ScalarOf::<Ed25519>::ONE;

        let err = aggregate(&package, &shares, &public).unwrap_err();
        assert!(err.to_string().contains("signer 4"), "{}", err);
    }

    #[tokio::test]
    async fn test_mismatched_nonces_rejected() {
        let packages = keygen::<Ed25519>(3, 1).await;
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let (_n1, c1) = commit::<Ed25519, _>(1, &mut rng);
        let (_n2, c2) = commit::<Ed25519, _>(2, &mut rng);
        let (other, _) = commit::<Ed25519, _>(1, &mut rng);
        let package = SigningPackage::new(b"m", vec![c1, c2]).unwrap();
        assert!(sign(&packages[0], other, &package).is_err());
    }

    #[test]
    fn test_package_rejects_duplicates_and_empty() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let (_n, c) = commit::<Ed25519, _>(1, &mut rng);
        assert!(SigningPackage::<Ed25519>::new(b"m", vec![]).is_err());
        assert!(SigningPackage::new(b"m", vec![c, c]).is_err());
        let (_z, zero) = commit::<Ed25519, _>(0, &mut rng);
        assert!(SigningPackage::new(b"m", vec![zero]).is_err());
    }

    #[test]
    fn test_nonces_debug_redacted() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let (nonces, _) = commit::<Secp256k1, _>(3, &mut rng);
        let debug = format!("{:?}", nonces);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&format!("{:?}", nonces.hiding)));
    }
}
