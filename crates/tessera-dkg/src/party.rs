//! Per-party protocol state machine.
//!
//! A [`Party`] walks a fixed sequence of states. Each [`Party::step`] runs
//! one state's action and advances; only the two wait states suspend. The
//! party never has more than one computation in flight.
//!
//! ```text
//! Idle → GeneratePolynomial → ComputeCommitments → GenerateProof
//!      → BroadcastCommitment → WaitForAllCommitments → VerifyAllProofs
//!      → EvaluateSharesForEachPeer → SendShares → WaitForAllShares
//!      → VerifyAllShares → DeriveFinalKey → Done
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use tessera_core::{CurvePoint, Group, Polynomial, ScalarOf};

use crate::config::FailurePolicy;
use crate::error::{DkgError, FailureKind, Result, VerificationFailure};
use crate::package::KeyPackage;
use crate::schnorr::{self, SchnorrProof};
use crate::staging::{Round, StagingArea};
use crate::types::{compute_transcript_hash, CommitmentPackage, SessionId, SharePackage};
use crate::vss;
use crate::ParticipantId;

/// Protocol states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyState {
    Idle,
    GeneratePolynomial,
    ComputeCommitments,
    GenerateProof,
    BroadcastCommitment,
    WaitForAllCommitments,
    VerifyAllProofs,
    EvaluateSharesForEachPeer,
    SendShares,
    WaitForAllShares,
    VerifyAllShares,
    DeriveFinalKey,
    Done,
}

impl PartyState {
    /// Every state in order
    pub const ALL: [PartyState; 13] = [
        PartyState::Idle,
        PartyState::GeneratePolynomial,
        PartyState::ComputeCommitments,
        PartyState::GenerateProof,
        PartyState::BroadcastCommitment,
        PartyState::WaitForAllCommitments,
        PartyState::VerifyAllProofs,
        PartyState::EvaluateSharesForEachPeer,
        PartyState::SendShares,
        PartyState::WaitForAllShares,
        PartyState::VerifyAllShares,
        PartyState::DeriveFinalKey,
        PartyState::Done,
    ];

    /// The following state; `Done` is terminal
    pub fn next(self) -> Option<PartyState> {
        let pos = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(pos + 1).copied()
    }

    /// States that block on a round barrier
    pub fn is_wait(self) -> bool {
        matches!(
            self,
            PartyState::WaitForAllCommitments | PartyState::WaitForAllShares
        )
    }
}

impl fmt::Display for PartyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Deviation from the protocol, for exercising failure paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Behavior {
    #[default]
    Honest,
    /// Publish a proof whose response is off by one
    CorruptProof,
    /// Deal an inconsistent share to one recipient
    CorruptShareFor(ParticipantId),
    /// Publish a commitment vector missing its top coefficient
    TruncateCommitments,
    /// Never publish commitments
    WithholdCommitments,
    /// Never publish shares
    WithholdShares,
}

/// Static parameters of one party.
#[derive(Debug, Clone)]
pub struct PartyParams {
    pub id: ParticipantId,
    pub num_parties: u16,
    pub threshold: u16,
    pub session: SessionId,
    pub policy: FailurePolicy,
    pub behavior: Behavior,
}

/// What a party hands back after reaching `Done`.
#[derive(Debug)]
pub struct PartyReport<G: Group> {
    pub participant_id: ParticipantId,
    pub key_package: KeyPackage<G>,
    /// Failed checks seen by this party (always empty under `Abort`)
    pub failures: Vec<VerificationFailure>,
    /// Hash over every commitment package this party accepted
    pub transcript_hash: [u8; 32],
}

/// One protocol participant.
pub struct Party<G: Group> {
    params: PartyParams,
    state: PartyState,
    staging: Arc<StagingArea<G>>,
    rng: ChaCha20Rng,

    polynomial: Option<Polynomial<G::Order>>,
    commitments: Vec<G::Point>,
    proof: Option<SchnorrProof<G>>,
    outgoing: Vec<SharePackage<G>>,
    received: Vec<(ParticipantId, ScalarOf<G>)>,
    failures: Vec<VerificationFailure>,
    transcript_hash: Option<[u8; 32]>,
    key_package: Option<KeyPackage<G>>,
}

impl<G: Group> Party<G> {
    pub fn new(params: PartyParams, staging: Arc<StagingArea<G>>, rng: ChaCha20Rng) -> Self {
        Self {
            params,
            state: PartyState::Idle,
            staging,
            rng,
            polynomial: None,
            commitments: Vec::new(),
            proof: None,
            outgoing: Vec::new(),
            received: Vec::new(),
            failures: Vec::new(),
            transcript_hash: None,
            key_package: None,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.params.id
    }

    pub fn state(&self) -> PartyState {
        self.state
    }

    pub fn failures(&self) -> &[VerificationFailure] {
        &self.failures
    }

    /// Run the current state's action and advance. Returns the new state.
    #[instrument(skip_all, fields(party = self.params.id, state = %self.state))]
    pub async fn step(&mut self) -> Result<PartyState> {
        match self.state {
            PartyState::Idle => {}
            PartyState::GeneratePolynomial => self.generate_polynomial(),
            PartyState::ComputeCommitments => self.compute_commitments()?,
            PartyState::GenerateProof => self.generate_proof()?,
            PartyState::BroadcastCommitment => self.broadcast_commitment()?,
            PartyState::WaitForAllCommitments => {
                self.staging.barrier(Round::Commitments).wait_all().await?
            }
            PartyState::VerifyAllProofs => self.verify_all_proofs()?,
            PartyState::EvaluateSharesForEachPeer => self.evaluate_shares()?,
            PartyState::SendShares => self.send_shares()?,
            PartyState::WaitForAllShares => self.staging.barrier(Round::Shares).wait_all().await?,
            PartyState::VerifyAllShares => self.verify_all_shares()?,
            PartyState::DeriveFinalKey => self.derive_final_key()?,
            PartyState::Done => {
                return Err(DkgError::InvalidState(format!(
                    "party {} is already done",
                    self.params.id
                )))
            }
        }

        let next = self.state.next().unwrap_or(PartyState::Done);
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        Ok(next)
    }

    /// Step until `Done`.
    pub async fn run(mut self) -> Result<PartyReport<G>> {
        while self.state != PartyState::Done {
            self.step().await?;
        }

        let key_package = self.key_package.take().ok_or_else(|| {
            DkgError::InvalidState(format!("party {} finished without a key", self.params.id))
        })?;
        let transcript_hash = self.transcript_hash.unwrap_or_default();
        Ok(PartyReport {
            participant_id: self.params.id,
            key_package,
            failures: std::mem::take(&mut self.failures),
            transcript_hash,
        })
    }

    fn missing(&self, what: &str) -> DkgError {
        DkgError::InvalidState(format!(
            "party {} has no {} in state {}",
            self.params.id, what, self.state
        ))
    }

    fn record(&mut self, sender: ParticipantId, kind: FailureKind) -> Result<()> {
        let failure = VerificationFailure {
            verifier: self.params.id,
            sender,
            kind,
        };
        warn!(sender, ?kind, "verification failed");
        match self.params.policy {
            FailurePolicy::Record => {
                self.failures.push(failure);
                Ok(())
            }
            FailurePolicy::Abort => Err(DkgError::VerificationFailed(vec![failure])),
        }
    }

    fn generate_polynomial(&mut self) {
        self.polynomial = Some(Polynomial::random(
            self.params.threshold as usize,
            &mut self.rng,
        ));
    }

    fn compute_commitments(&mut self) -> Result<()> {
        let poly = self.polynomial.as_ref().ok_or_else(|| self.missing("polynomial"))?;
        self.commitments = poly.commitments::<G::Point>();
        Ok(())
    }

    fn generate_proof(&mut self) -> Result<()> {
        let poly = self.polynomial.as_ref().ok_or_else(|| self.missing("polynomial"))?;
        let c0 = self.commitments.first().ok_or_else(|| self.missing("commitments"))?;
        let context = schnorr::proof_context(&self.params.session, self.params.id);

        let mut proof = schnorr::prove::<G, _>(&poly.secret(), c0, &context, &mut self.rng);
        if self.params.behavior == Behavior::CorruptProof {
            proof.response += ScalarOf::<G>::ONE;
        }
        self.proof = Some(proof);
        Ok(())
    }

    fn broadcast_commitment(&mut self) -> Result<()> {
        let proof = self.proof.ok_or_else(|| self.missing("proof"))?;
        if self.params.behavior == Behavior::WithholdCommitments {
            debug!("withholding commitments");
            return Ok(());
        }
        let mut commitments = self.commitments.clone();
        if self.params.behavior == Behavior::TruncateCommitments {
            commitments.pop();
        }
        self.staging.publish_commitments(CommitmentPackage {
            sender: self.params.id,
            commitments,
            proof,
        })
    }

    fn verify_all_proofs(&mut self) -> Result<()> {
        let expected_len = self.params.threshold as usize + 1;
        let staging = Arc::clone(&self.staging);
        let mut accepted = Vec::with_capacity(self.params.num_parties as usize);

        for sender in 1..=self.params.num_parties {
            let package = staging
                .commitments(sender)
                .ok_or_else(|| self.missing("published commitments"))?;
            accepted.push(package);
            if sender == self.params.id {
                continue;
            }

            if package.commitments.len() != expected_len {
                self.record(sender, FailureKind::Commitment)?;
                continue;
            }
            let context = schnorr::proof_context(&self.params.session, sender);
            if !schnorr::verify::<G>(&package.commitments[0], &package.proof, &context) {
                self.record(sender, FailureKind::Proof)?;
            }
        }

        self.transcript_hash = Some(compute_transcript_hash(&self.params.session, &accepted));
        info!(parties = self.params.num_parties, "commitment round complete");
        Ok(())
    }

    fn evaluate_shares(&mut self) -> Result<()> {
        let poly = self.polynomial.as_ref().ok_or_else(|| self.missing("polynomial"))?;
        let mut outgoing = Vec::with_capacity(self.params.num_parties as usize);
        for recipient in 1..=self.params.num_parties {
            let mut share = poly.evaluate_at(recipient);
            if self.params.behavior == Behavior::CorruptShareFor(recipient) {
                share += ScalarOf::<G>::ONE;
            }
            outgoing.push(SharePackage {
                sender: self.params.id,
                recipient,
                share,
            });
        }
        self.outgoing = outgoing;
        Ok(())
    }

    fn send_shares(&mut self) -> Result<()> {
        let outgoing = std::mem::take(&mut self.outgoing);
        if self.params.behavior == Behavior::WithholdShares {
            debug!("withholding shares");
            return Ok(());
        }
        self.staging.publish_shares(self.params.id, outgoing)
    }

    fn verify_all_shares(&mut self) -> Result<()> {
        let me = self.params.id;
        let staging = Arc::clone(&self.staging);
        let mut received = Vec::with_capacity(self.params.num_parties as usize);

        for sender in 1..=self.params.num_parties {
            let share = staging
                .share(sender, me)
                .map(|p| p.share)
                .ok_or_else(|| self.missing("published share"))?;
            let commitments = staging
                .commitments(sender)
                .map(|p| p.commitments.as_slice())
                .ok_or_else(|| self.missing("published commitments"))?;

            if !vss::verify_share::<G>(&share, me, commitments) {
                self.record(sender, FailureKind::Share)?;
            }
            received.push((sender, share));
        }

        self.received = received;
        info!(parties = self.params.num_parties, "share round complete");
        Ok(())
    }

    fn derive_final_key(&mut self) -> Result<()> {
        let secret_share: ScalarOf<G> = self.received.iter().map(|(_, s)| s).sum();

        let staging = Arc::clone(&self.staging);
        let mut group_key = G::identity();
        let mut sets = Vec::with_capacity(self.params.num_parties as usize);
        for sender in 1..=self.params.num_parties {
            let package = staging
                .commitments(sender)
                .ok_or_else(|| self.missing("published commitments"))?;
            let c0 = package
                .constant_term()
                .ok_or_else(|| self.missing("constant-term commitment"))?;
            group_key = group_key.add(c0);
            sets.push(package.commitments.as_slice());
        }

        let verifying_shares: BTreeMap<ParticipantId, G::Point> = (1..=self.params.num_parties)
            .map(|j| {
                (
                    j,
                    vss::expected_verifying_share::<G, _>(j, sets.iter().copied()),
                )
            })
            .collect();

        if self.failures.is_empty()
            && verifying_shares.get(&self.params.id) != Some(&G::mul_base(&secret_share))
        {
            return Err(DkgError::InvalidState(format!(
                "party {} derived a share inconsistent with the commitments",
                self.params.id
            )));
        }

        debug!(group_key = ?group_key, "derived final key");
        self.key_package = Some(KeyPackage::new(
            self.params.id,
            self.params.num_parties,
            self.params.threshold,
            secret_share,
            verifying_shares,
            group_key,
        ));
        // Secret material is no longer needed
        self.polynomial = None;
        self.received.clear();
        Ok(())
    }
}

impl<G: Group> fmt::Debug for Party<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Party")
            .field("id", &self.params.id)
            .field("state", &self.state)
            .field("failures", &self.failures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tessera_core::{party_rng, Ed25519};
    use tokio_util::sync::CancellationToken;

    fn params(id: ParticipantId, n: u16, t: u16) -> PartyParams {
        PartyParams {
            id,
            num_parties: n,
            threshold: t,
            session: SessionId::from_bytes([3u8; 32]),
            policy: FailurePolicy::Record,
            behavior: Behavior::Honest,
        }
    }

    #[test]
    fn test_state_order() {
        let mut state = PartyState::Idle;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            visited.push(next);
            state = next;
        }
        assert_eq!(visited, PartyState::ALL.to_vec());
        assert_eq!(state, PartyState::Done);
        assert!(PartyState::WaitForAllShares.is_wait());
        assert!(!PartyState::SendShares.is_wait());
    }

    #[tokio::test]
    async fn test_step_runs_one_state_at_a_time() {
        let staging = Arc::new(StagingArea::<Ed25519>::new(
            2,
            Duration::from_millis(100),
            CancellationToken::new(),
        ));
        let seed = [1u8; 32];
        let mut party = Party::new(params(1, 2, 1), staging.clone(), party_rng(Some(&seed), b"t", 1));

        assert_eq!(party.step().await.unwrap(), PartyState::GeneratePolynomial);
        assert_eq!(party.step().await.unwrap(), PartyState::ComputeCommitments);
        assert!(party.commitments.is_empty());
        assert_eq!(party.step().await.unwrap(), PartyState::GenerateProof);
        assert_eq!(party.commitments.len(), 2);
        assert_eq!(party.step().await.unwrap(), PartyState::BroadcastCommitment);
        assert!(staging.commitments(1).is_none());
        assert_eq!(party.step().await.unwrap(), PartyState::WaitForAllCommitments);
        assert!(staging.commitments(1).is_some());

        // Party 2 never shows up
        assert!(matches!(
            party.step().await,
            Err(DkgError::BarrierTimeout { missing, .. }) if missing == vec![2]
        ));
        assert_eq!(party.state(), PartyState::WaitForAllCommitments);
    }

    #[tokio::test]
    async fn test_two_parties_agree() {
        let staging = Arc::new(StagingArea::<Ed25519>::new(
            2,
            Duration::from_secs(10),
            CancellationToken::new(),
        ));
        let seed = [2u8; 32];
        let a = Party::new(params(1, 2, 1), staging.clone(), party_rng(Some(&seed), b"t", 1));
        let b = Party::new(params(2, 2, 1), staging.clone(), party_rng(Some(&seed), b"t", 2));

        let (ra, rb) = tokio::join!(a.run(), b.run());
        let (ra, rb) = (ra.unwrap(), rb.unwrap());
        assert_eq!(ra.key_package.group_key, rb.key_package.group_key);
        assert_eq!(ra.transcript_hash, rb.transcript_hash);
        assert!(ra.failures.is_empty() && rb.failures.is_empty());
        assert_ne!(ra.key_package.secret_share(), rb.key_package.secret_share());
    }

    #[tokio::test]
    async fn test_done_cannot_step() {
        let staging = Arc::new(StagingArea::<Ed25519>::new(
            2,
            Duration::from_secs(10),
            CancellationToken::new(),
        ));
        let mut party = Party::new(params(1, 2, 1), staging, party_rng(None, b"t", 1));
        party.state = PartyState::Done;
        assert!(matches!(party.step().await, Err(DkgError::InvalidState(_))));
    }
}
