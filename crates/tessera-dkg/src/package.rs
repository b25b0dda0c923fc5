//! Per-party DKG output

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use tessera_core::{CurvePoint, Group, ScalarOf};

use crate::error::{DkgError, Result};
use crate::ParticipantId;

/// Verification hash of a group key; equal across all parties of one run.
pub fn verification_hash<P: CurvePoint>(group_key: &P) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(group_key.encode());
    hasher.finalize().into()
}

/// A party's key material after a successful run.
pub struct KeyPackage<G: Group> {
    /// This party's index
    pub participant_id: ParticipantId,

    /// Total parties `N`
    pub num_parties: u16,

    /// Polynomial degree `t`; signing needs `t + 1` parties
    pub threshold: u16,

    /// `s_j = Σ_i f_i(j)` (secret)
    secret_share: ScalarOf<G>,

    /// Every party's public share `[s_k]G`, including this one
    pub verifying_shares: BTreeMap<ParticipantId, G::Point>,

    /// `Y = Σ_i C_{i,0}`
    pub group_key: G::Point,

    /// SHA-256 of the encoded group key
    pub verification_hash: [u8; 32],
}

impl<G: Group> KeyPackage<G> {
    pub fn new(
        participant_id: ParticipantId,
        num_parties: u16,
        threshold: u16,
        secret_share: ScalarOf<G>,
        verifying_shares: BTreeMap<ParticipantId, G::Point>,
        group_key: G::Point,
    ) -> Self {
        Self {
            participant_id,
            num_parties,
            threshold,
            secret_share,
            verifying_shares,
            verification_hash: verification_hash(&group_key),
            group_key,
        }
    }

    pub fn secret_share(&self) -> &ScalarOf<G> {
        &self.secret_share
    }

    /// This party's public share `[s_j]G`
    pub fn verifying_share(&self) -> Option<&G::Point> {
        self.verifying_shares.get(&self.participant_id)
    }

    /// Minimum number of signers
    pub fn min_signers(&self) -> usize {
        self.threshold as usize + 1
    }

    /// The public part, shareable with a signature aggregator
    pub fn public_key_package(&self) -> PublicKeyPackage<G> {
        PublicKeyPackage {
            threshold: self.threshold,
            verifying_shares: self.verifying_shares.clone(),
            group_key: self.group_key,
        }
    }
}

/// Public output of a run: enough to check signature shares and signatures.
#[derive(Clone, Debug)]
pub struct PublicKeyPackage<G: Group> {
    pub threshold: u16,
    pub verifying_shares: BTreeMap<ParticipantId, G::Point>,
    pub group_key: G::Point,
}

impl<G: Group> PublicKeyPackage<G> {
    pub fn min_signers(&self) -> usize {
        self.threshold as usize + 1
    }
}

impl<G: Group> Clone for KeyPackage<G> {
    fn clone(&self) -> Self {
        Self {
            participant_id: self.participant_id,
            num_parties: self.num_parties,
            threshold: self.threshold,
            secret_share: self.secret_share,
            verifying_shares: self.verifying_shares.clone(),
            group_key: self.group_key,
            verification_hash: self.verification_hash,
        }
    }
}

impl<G: Group> Drop for KeyPackage<G> {
    fn drop(&mut self) {
        self.secret_share.zeroize();
    }
}

impl<G: Group> fmt::Debug for KeyPackage<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPackage")
            .field("suite", &G::NAME)
            .field("participant_id", &self.participant_id)
            .field("num_parties", &self.num_parties)
            .field("threshold", &self.threshold)
            .field("secret_share", &"[REDACTED]")
            .field("group_key", &self.group_key)
            .field("verification_hash", &hex::encode(self.verification_hash))
            .finish()
    }
}

/// Hex-encoded on-disk form
#[derive(Serialize, Deserialize)]
struct KeyPackageData {
    suite: String,
    participant_id: ParticipantId,
    num_parties: u16,
    threshold: u16,
    secret_share: String,
    verifying_shares: BTreeMap<ParticipantId, String>,
    group_key: String,
    verification_hash: String,
}

fn decode_point<G: Group>(s: &str) -> Result<G::Point> {
    let bytes = hex::decode(s).map_err(|e| DkgError::Config(format!("bad point hex: {}", e)))?;
    Ok(<G::Point as CurvePoint>::decode(&bytes)?)
}

impl<G: Group> KeyPackage<G> {
    fn to_data(&self) -> KeyPackageData {
        KeyPackageData {
            suite: G::NAME.to_string(),
            participant_id: self.participant_id,
            num_parties: self.num_parties,
            threshold: self.threshold,
            secret_share: hex::encode(self.secret_share.to_be_bytes()),
            verifying_shares: self
                .verifying_shares
                .iter()
                .map(|(id, p)| (*id, hex::encode(p.encode())))
                .collect(),
            group_key: hex::encode(self.group_key.encode()),
            verification_hash: hex::encode(self.verification_hash),
        }
    }

    fn from_data(data: KeyPackageData) -> Result<Self> {
        if data.suite != G::NAME {
            return Err(DkgError::Config(format!(
                "key package is for {}, expected {}",
                data.suite,
                G::NAME
            )));
        }
        let mut secret = [0u8; 32];
        hex::decode_to_slice(&data.secret_share, &mut secret)
            .map_err(|e| DkgError::Config(format!("bad secret share hex: {}", e)))?;
        let secret_share = ScalarOf::<G>::from_be_bytes(&secret)?;
        secret.zeroize();

        let verifying_shares = data
            .verifying_shares
            .iter()
            .map(|(id, p)| Ok((*id, decode_point::<G>(p)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let group_key = decode_point::<G>(&data.group_key)?;

        let package = Self::new(
            data.participant_id,
            data.num_parties,
            data.threshold,
            secret_share,
            verifying_shares,
            group_key,
        );
        if hex::encode(package.verification_hash) != data.verification_hash {
            return Err(DkgError::Config(
                "verification hash does not match group key".to_string(),
            ));
        }
        Ok(package)
    }
}

impl<G: Group> Serialize for KeyPackage<G> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_data().serialize(serializer)
    }
}

impl<'de, G: Group> Deserialize<'de> for KeyPackage<G> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let data = KeyPackageData::deserialize(deserializer)?;
        Self::from_data(data).map_err(serde::de::Error::custom)
    }
}
