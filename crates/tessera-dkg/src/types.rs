//! Round packages and identifiers

use std::fmt;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use tessera_core::{CoreError, CurvePoint, Group, ScalarOf};

use crate::schnorr::SchnorrProof;

/// Participant identifier (1-indexed)
pub type ParticipantId = u16;

/// 32-byte identifier of one DKG run.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 32]);

impl SessionId {
    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 4 bytes as hex, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.short())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Round 1 broadcast: the full Feldman commitment vector plus a proof of
/// knowledge of the constant term.
pub struct CommitmentPackage<G: Group> {
    /// Sender's participant ID
    pub sender: ParticipantId,

    /// `C_0..C_t`
    pub commitments: Vec<G::Point>,

    /// Proof of knowledge of `a_0` for `C_0`
    pub proof: SchnorrProof<G>,
}

impl<G: Group> CommitmentPackage<G> {
    /// The commitment to the sender's secret, `C_0`
    pub fn constant_term(&self) -> Option<&G::Point> {
        self.commitments.first()
    }

    /// Serialize as `sender (u16 BE) ‖ count (u16 BE) ‖ C_0..C_t ‖ proof`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.sender.to_be_bytes());
        out.extend_from_slice(&(self.commitments.len() as u16).to_be_bytes());
        for c in &self.commitments {
            out.extend_from_slice(&c.encode());
        }
        out.extend_from_slice(&self.proof.to_bytes());
        out
    }

    /// Deserialize, decoding and validating every point
    pub fn from_bytes(bytes: &[u8]) -> tessera_core::Result<Self> {
        let point_len = <G::Point as CurvePoint>::ENCODED_LEN;
        let malformed = |reason: String| CoreError::MalformedInput {
            what: "commitment package",
            reason,
        };

        if bytes.len() < 4 {
            return Err(malformed(format!("{} bytes is too short", bytes.len())));
        }
        let sender = u16::from_be_bytes([bytes[0], bytes[1]]);
        let count = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if count == 0 {
            return Err(malformed("empty commitment vector".into()));
        }
        let expected = 4 + count * point_len + point_len + 32;
        if bytes.len() != expected {
            return Err(malformed(format!(
                "expected {} bytes for {} commitments, got {}",
                expected,
                count,
                bytes.len()
            )));
        }

        let body = &bytes[4..];
        let commitments = body[..count * point_len]
            .chunks_exact(point_len)
            .map(<G::Point as CurvePoint>::decode)
            .collect::<tessera_core::Result<Vec<_>>>()?;
        let proof = SchnorrProof::from_bytes(&body[count * point_len..])?;

        Ok(Self {
            sender,
            commitments,
            proof,
        })
    }

    /// Hash of this package, used to bind the transcript
    pub fn binding_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(G::NAME.as_bytes());
        hasher.update(self.to_bytes());
        hasher.finalize().into()
    }
}

impl<G: Group> Clone for CommitmentPackage<G> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender,
            commitments: self.commitments.clone(),
            proof: self.proof,
        }
    }
}

impl<G: Group> fmt::Debug for CommitmentPackage<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitmentPackage")
            .field("sender", &self.sender)
            .field("commitments", &self.commitments)
            .field("proof", &self.proof)
            .finish()
    }
}

/// Transcript hash over all Round 1 packages, independent of arrival order
pub fn compute_transcript_hash<G: Group>(
    session: &SessionId,
    packages: &[&CommitmentPackage<G>],
) -> [u8; 32] {
    let mut sorted: Vec<_> = packages.to_vec();
    sorted.sort_by_key(|p| p.sender);

    let mut hasher = Sha256::new();
    hasher.update(session.as_bytes());
    for pkg in sorted {
        hasher.update(pkg.binding_hash());
    }
    hasher.finalize().into()
}

/// Round 2 point-to-point message: `f_sender(recipient)`.
pub struct SharePackage<G: Group> {
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    pub share: ScalarOf<G>,
}

impl<G: Group> Clone for SharePackage<G> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender,
            recipient: self.recipient,
            share: self.share,
        }
    }
}

impl<G: Group> Drop for SharePackage<G> {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}

impl<G: Group> fmt::Debug for SharePackage<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharePackage")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("share", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schnorr;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tessera_core::{Ed25519, Polynomial, Secp256k1};

    fn package<G: Group>(sender: ParticipantId, seed: u64) -> CommitmentPackage<G> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let poly = Polynomial::<G::Order>::random(2, &mut rng);
        let commitments = poly.commitments::<G::Point>();
        let proof = schnorr::prove::<G, _>(&poly.secret(), &commitments[0], b"ctx", &mut rng);
        CommitmentPackage {
            sender,
            commitments,
            proof,
        }
    }

    #[test]
    fn test_commitment_package_bytes() {
        let pkg = package::<Ed25519>(3, 1);
        let bytes = pkg.to_bytes();
        assert_eq!(bytes.len(), 4 + 3 * 32 + 32 + 32);

        let decoded = CommitmentPackage::<Ed25519>::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.sender, 3);
        assert_eq!(decoded.commitments, pkg.commitments);
        assert_eq!(decoded.proof, pkg.proof);
    }

    #[test]
    fn test_commitment_package_rejects_truncation() {
        let bytes = package::<Secp256k1>(1, 2).to_bytes();
        assert!(CommitmentPackage::<Secp256k1>::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(CommitmentPackage::<Secp256k1>::from_bytes(&bytes[..3]).is_err());

        let mut zero_count = bytes.clone();
        zero_count[2] = 0;
        zero_count[3] = 0;
        assert!(CommitmentPackage::<Secp256k1>::from_bytes(&zero_count).is_err());
    }

    #[test]
    fn test_transcript_hash_order_independent() {
        let session = SessionId::from_bytes([1u8; 32]);
        let a = package::<Ed25519>(1, 10);
        let b = package::<Ed25519>(2, 20);

        let h1 = compute_transcript_hash(&session, &[&a, &b]);
        let h2 = compute_transcript_hash(&session, &[&b, &a]);
        assert_eq!(h1, h2);

        let other = SessionId::from_bytes([2u8; 32]);
        assert_ne!(h1, compute_transcript_hash(&other, &[&a, &b]));
    }

    #[test]
    fn test_session_id_serde() {
        let id = SessionId::from_bytes([0x5a; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "5a".repeat(32)));
        assert_eq!(serde_json::from_str::<SessionId>(&json).unwrap(), id);
        assert_eq!(id.short(), "5a5a5a5a");
    }

    #[test]
    fn test_share_package_debug_redacted() {
        let pkg = SharePackage::<Ed25519> {
            sender: 1,
            recipient: 2,
            share: ScalarOf::<Ed25519>::from_u64(99),
        };
        assert!(format!("{:?}", pkg).contains("REDACTED"));
    }
}
