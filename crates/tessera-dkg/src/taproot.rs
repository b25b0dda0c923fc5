//! BIP-340 signatures and BIP-341 key-path tweaks for secp256k1 key packages.
//!
//! Bitcoin public keys are x-only: the 32-byte x-coordinate of the point with
//! even `y`. A DKG group key has arbitrary parity, and so does the nonce
//! commitment `R`, so signers fold the needed negations into their shares
//! instead of rewriting their key packages:
//!
//! ```text
//! P   = g_Y·Y                      internal key (even y)
//! Q   = P + [t]G                   output key, t = H_TapTweak(x(P) ‖ root)
//! c   = H_BIP0340/challenge(x(R) ‖ x(Q) ‖ m)
//! z_j = g_R·(d_j + e_j·ρ_j) + c·g_Q·g_Y·λ_j·s_j
//! z   = Σ z_j + c·g_Q·t
//! ```
//!
//! where each `g` is `±1`, chosen to make the named point's `y` even. Then
//! `[z]G = g_R·R + [c]·g_Q·Q`, which is the BIP-340 equation under the
//! x-only key `x(Q)`.
//!
//! Nonce rounds, binding factors and [`SigningPackage`] are shared with
//! [`crate::signing`].

use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use tessera_core::{CurvePoint, Group, ScalarOf, Secp256k1, Secp256k1Point};

use crate::error::{DkgError, Result};
use crate::package::{KeyPackage, PublicKeyPackage};
use crate::signing::{self, SessionValues, SignatureShare, SigningNonces, SigningPackage};

type Scalar = ScalarOf<Secp256k1>;

const CHALLENGE_TAG: &str = "BIP0340/challenge";
const TWEAK_TAG: &str = "TapTweak";

/// `SHA256(SHA256(tag) ‖ SHA256(tag) ‖ parts…)`
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `1` if `point` has even `y`, else `-1`.
fn parity(point: &Secp256k1Point) -> Scalar {
    if point.has_even_y() {
        Scalar::ONE
    } else {
        -Scalar::ONE
    }
}

fn x_only(point: &Secp256k1Point, what: &str) -> Result<[u8; 32]> {
    point
        .x_only()
        .ok_or_else(|| DkgError::Signing(format!("{} is the point at infinity", what)))
}

/// The x-only keys a secp256k1 group key signs under.
#[derive(Debug, Clone, Copy)]
pub struct TaprootKey {
    group_key: Secp256k1Point,
    internal: [u8; 32],
    output: [u8; 32],
    /// `g_Q·g_Y`
    key_sign: Scalar,
    /// `g_Q·t`
    tweak_term: Scalar,
}

impl TaprootKey {
    /// Plain BIP-340: the output key is the group key's x-coordinate.
    pub fn untweaked(group_key: &Secp256k1Point) -> Result<Self> {
        let internal = x_only(group_key, "group key")?;
        Ok(Self {
            group_key: *group_key,
            internal,
            output: internal,
            key_sign: parity(group_key),
            tweak_term: Scalar::ZERO,
        })
    }

    /// BIP-341 key-path output key `Q = P + [t]G` with
    /// `t = H_TapTweak(x(P) ‖ merkle_root)`. Without a script tree the root is
    /// omitted from the hash.
    pub fn tweaked(group_key: &Secp256k1Point, merkle_root: Option<&[u8; 32]>) -> Result<Self> {
        let internal = x_only(group_key, "group key")?;
        let digest = match merkle_root {
            Some(root) => tagged_hash(TWEAK_TAG, &[&internal, root]),
            None => tagged_hash(TWEAK_TAG, &[&internal]),
        };
        // BIP-341 rejects tweaks at or above the group order
        let tweak = Scalar::from_be_bytes(&digest)?;

        let even_internal = if group_key.has_even_y() {
            *group_key
        } else {
            group_key.negate()
        };
        let output_point = even_internal.add(&Secp256k1::mul_base(&tweak));
        let output = x_only(&output_point, "tweaked output key")?;
        let output_sign = parity(&output_point);

        Ok(Self {
            group_key: *group_key,
            internal,
            output,
            key_sign: output_sign * parity(group_key),
            tweak_term: output_sign * tweak,
        })
    }

    /// x-only internal key `x(P)`
    pub fn internal_key(&self) -> [u8; 32] {
        self.internal
    }

    /// x-only key that signatures verify under
    pub fn output_key(&self) -> [u8; 32] {
        self.output
    }

    pub fn group_key(&self) -> &Secp256k1Point {
        &self.group_key
    }

    fn check_group_key(&self, group_key: &Secp256k1Point) -> Result<()> {
        if *group_key != self.group_key {
            return Err(DkgError::Signing(
                "taproot key was derived from another group key".to_string(),
            ));
        }
        Ok(())
    }
}

fn challenge(r: &Secp256k1Point, output_key: &[u8; 32], message: &[u8]) -> Result<Scalar> {
    let rx = x_only(r, "group commitment")?;
    let digest = tagged_hash(CHALLENGE_TAG, &[&rx, output_key, message]);
    Ok(Scalar::from_be_bytes_reduced(&digest))
}

fn session(package: &SigningPackage<Secp256k1>, key: &TaprootKey) -> Result<SessionValues<Secp256k1>> {
    SessionValues::with_challenge(package, |r| {
        challenge(r, &key.output, package.message())
    })
}

/// Round two: `z_j = g_R·(d_j + e_j·ρ_j) + c·g_Q·g_Y·λ_j·s_j`.
#[instrument(skip_all, fields(signer = key_package.participant_id))]
pub fn sign(
    key_package: &KeyPackage<Secp256k1>,
    nonces: SigningNonces<Secp256k1>,
    package: &SigningPackage<Secp256k1>,
    key: &TaprootKey,
) -> Result<SignatureShare<Secp256k1>> {
    let signer = key_package.participant_id;
    key.check_group_key(&key_package.group_key)?;
    signing::check_signer(key_package, &nonces, package)?;

    let values = session(package, key)?;
    let rho = values.factor(signer)?;
    let lambda = values.lagrange(signer)?;
    let nonce_sign = parity(&values.group_commitment);

    let share = nonce_sign * (nonces.hiding + nonces.binding * rho)
        + values.challenge * key.key_sign * lambda * *key_package.secret_share();
    debug!("taproot signature share computed");
    Ok(SignatureShare { signer, share })
}

/// Check `[z_j]G == g_R·(D_j + [ρ_j]E_j) + [c·g_Q·g_Y·λ_j]Y_j`.
pub fn verify_share(
    share: &SignatureShare<Secp256k1>,
    verifying_share: &Secp256k1Point,
    package: &SigningPackage<Secp256k1>,
    key: &TaprootKey,
) -> Result<bool> {
    let values = session(package, key)?;
    verify_share_with(share, verifying_share, package, key, &values)
}

fn verify_share_with(
    share: &SignatureShare<Secp256k1>,
    verifying_share: &Secp256k1Point,
    package: &SigningPackage<Secp256k1>,
    key: &TaprootKey,
    values: &SessionValues<Secp256k1>,
) -> Result<bool> {
    let commitments = package.commitments(share.signer).ok_or_else(|| {
        DkgError::Signing(format!("signer {} is not in the package", share.signer))
    })?;
    let rho = values.factor(share.signer)?;
    let lambda = values.lagrange(share.signer)?;

    let mut nonce_part = commitments.hiding.add(&commitments.binding.mul_vartime(&rho));
    if !values.group_commitment.has_even_y() {
        nonce_part = nonce_part.negate();
    }
    let lhs = Secp256k1::generator().mul_vartime(&share.share);
    let rhs = nonce_part.add(&verifying_share.mul_vartime(&(values.challenge * key.key_sign * lambda)));
    Ok(lhs == rhs)
}

/// Check every share and combine them into a BIP-340 signature under
/// `key.output_key()`.
#[instrument(skip_all, fields(signers = shares.len()))]
pub fn aggregate(
    package: &SigningPackage<Secp256k1>,
    shares: &[SignatureShare<Secp256k1>],
    public: &PublicKeyPackage<Secp256k1>,
    key: &TaprootKey,
) -> Result<TaprootSignature> {
    key.check_group_key(&public.group_key)?;
    let by_signer = signing::index_shares(package, shares, public.min_signers())?;

    let values = session(package, key)?;
    let mut z = values.challenge * key.tweak_term;
    for (signer, share) in by_signer {
        let verifying_share = public.verifying_shares.get(&signer).ok_or_else(|| {
            DkgError::Signing(format!("no verifying share for signer {}", signer))
        })?;
        if !verify_share_with(share, verifying_share, package, key, &values)? {
            warn!(signer, "invalid taproot signature share");
            return Err(DkgError::Signing(format!(
                "invalid signature share from signer {}",
                signer
            )));
        }
        z += share.share;
    }

    Ok(TaprootSignature {
        r: x_only(&values.group_commitment, "group commitment")?,
        s: z,
    })
}

/// A 64-byte BIP-340 signature `x(R) ‖ s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaprootSignature {
    pub r: [u8; 32],
    pub s: Scalar,
}

impl TaprootSignature {
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s.to_be_bytes());
        out
    }

    /// Parse `x(R) ‖ s`, rejecting `s` at or above the group order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 64 {
            return Err(DkgError::Signing(format!(
                "expected a 64-byte signature, got {} bytes",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        let mut s = [0u8; 32];
        s.copy_from_slice(&bytes[32..]);
        Ok(Self {
            r,
            s: Scalar::from_be_bytes(&s)?,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// BIP-340 verification under an x-only public key.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &TaprootSignature) -> bool {
    let Ok(p) = Secp256k1Point::lift_x(public_key) else {
        return false;
    };
    let e = Scalar::from_be_bytes_reduced(&tagged_hash(
        CHALLENGE_TAG,
        &[&signature.r, public_key, message],
    ));
    let r = Secp256k1::generator()
        .mul_vartime(&signature.s)
        .sub(&p.mul_vartime(&e));
    r.has_even_y() && r.x_only() == Some(signature.r)
}
