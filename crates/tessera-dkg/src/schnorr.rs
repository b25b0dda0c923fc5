//! Schnorr proof of knowledge of a discrete logarithm.
//!
//! Each party proves it knows `a_0` for its commitment `C_0 = [a_0]G`, which
//! stops a party from choosing its commitment as a function of the others'
//! (rogue-key attack). The challenge is
//! `c = H(tag ‖ C ‖ R ‖ context)` and the context binds the run's session id
//! and the prover's index, so a proof cannot be replayed in another run or by
//! another party.

use std::fmt;

use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use tessera_core::{CoreError, CurvePoint, Group, ScalarOf};

use crate::types::SessionId;
use crate::ParticipantId;

const PROOF_TAG: &[u8] = b"tessera-dkg/pok/v1";

/// A proof `(R, z)` with `[z]G = R + [c]C`.
pub struct SchnorrProof<G: Group> {
    pub commitment: G::Point,
    pub response: ScalarOf<G>,
}

impl<G: Group> SchnorrProof<G> {
    /// `R ‖ z` with `z` little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.commitment.encode();
        out.extend_from_slice(&self.response.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> tessera_core::Result<Self> {
        let point_len = <G::Point as CurvePoint>::ENCODED_LEN;
        if bytes.len() != point_len + 32 {
            return Err(CoreError::MalformedInput {
                what: "schnorr proof",
                reason: format!("expected {} bytes, got {}", point_len + 32, bytes.len()),
            });
        }
        let commitment = <G::Point as CurvePoint>::decode(&bytes[..point_len])?;
        let mut z = [0u8; 32];
        z.copy_from_slice(&bytes[point_len..]);
        let response = ScalarOf::<G>::from_le_bytes(&z)?;
        Ok(Self {
            commitment,
            response,
        })
    }
}

impl<G: Group> Clone for SchnorrProof<G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: Group> Copy for SchnorrProof<G> {}

impl<G: Group> PartialEq for SchnorrProof<G> {
    fn eq(&self, other: &Self) -> bool {
        self.commitment == other.commitment && self.response == other.response
    }
}

impl<G: Group> Eq for SchnorrProof<G> {}

impl<G: Group> fmt::Debug for SchnorrProof<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchnorrProof")
            .field("commitment", &self.commitment)
            .field("response", &self.response)
            .finish()
    }
}

/// Proof context for `participant` in `session`.
pub fn proof_context(session: &SessionId, participant: ParticipantId) -> Vec<u8> {
    let mut ctx = Vec::with_capacity(34);
    ctx.extend_from_slice(session.as_bytes());
    ctx.extend_from_slice(&participant.to_be_bytes());
    ctx
}

fn challenge<G: Group>(public: &G::Point, nonce_commitment: &G::Point, context: &[u8]) -> ScalarOf<G> {
    G::hash_to_scalar(
        PROOF_TAG,
        &[&public.encode(), &nonce_commitment.encode(), context],
    )
}

/// Prove knowledge of `secret` where `public = [secret]G`.
pub fn prove<G, R>(
    secret: &ScalarOf<G>,
    public: &G::Point,
    context: &[u8],
    rng: &mut R,
) -> SchnorrProof<G>
where
    G: Group,
    R: RngCore + CryptoRng + ?Sized,
{
    let mut k = ScalarOf::<G>::random(rng);
    let commitment = G::mul_base(&k);
    let c = challenge::<G>(public, &commitment, context);
    let response = k + c * *secret;
    k.zeroize();
    SchnorrProof {
        commitment,
        response,
    }
}

/// Check `[z]G == R + [c]C`.
pub fn verify<G: Group>(public: &G::Point, proof: &SchnorrProof<G>, context: &[u8]) -> bool {
    let c = challenge::<G>(public, &proof.commitment, context);
    let lhs = G::generator().mul_vartime(&proof.response);
    let rhs = proof.commitment.add(&public.mul_vartime(&c));
    lhs == rhs
}
