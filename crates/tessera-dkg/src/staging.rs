//! Staging storage and round barriers shared by all parties.
//!
//! Every slot has exactly one writer (the party whose index it carries) and
//! is written at most once. A party publishes by writing its slot and then
//! setting its bit in the round's [`ReadinessBitmap`]; readers go through
//! accessors that return `None` until the writer's bit is set, so a slot is
//! never read before it is complete.
//!
//! A [`RoundBarrier`] keeps its bitmap in a `tokio::sync::watch` channel.
//! Waiting parties are woken on every arrival and return once all bits are
//! set, the timeout elapses or the run is cancelled.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tessera_core::Group;

use crate::error::{DkgError, Result};
use crate::types::{CommitmentPackage, SharePackage};
use crate::ParticipantId;

/// Synchronised rounds of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    /// Commitment vectors and proofs have been broadcast
    Commitments,
    /// Shares have been sent to every peer
    Shares,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Round::Commitments => f.write_str("commitments"),
            Round::Shares => f.write_str("shares"),
        }
    }
}

/// One readiness bit per party, indexed by 1-based participant id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessBitmap {
    words: Vec<u64>,
    parties: u16,
}

impl ReadinessBitmap {
    pub fn new(parties: u16) -> Self {
        Self {
            words: vec![0; (parties as usize).div_ceil(64)],
            parties,
        }
    }

    fn position(&self, id: ParticipantId) -> Option<(usize, u64)> {
        if id == 0 || id > self.parties {
            return None;
        }
        let bit = (id - 1) as usize;
        Some((bit / 64, 1u64 << (bit % 64)))
    }

    /// Set the bit for `id`. Returns false if `id` is out of range.
    pub fn set(&mut self, id: ParticipantId) -> bool {
        match self.position(id) {
            Some((word, mask)) => {
                self.words[word] |= mask;
                true
            }
            None => false,
        }
    }

    pub fn is_set(&self, id: ParticipantId) -> bool {
        self.position(id)
            .map(|(word, mask)| self.words[word] & mask != 0)
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.count() == self.parties as usize
    }

    /// Parties whose bit is still clear
    pub fn missing(&self) -> Vec<ParticipantId> {
        (1..=self.parties).filter(|id| !self.is_set(*id)).collect()
    }
}

/// All-parties barrier for one round.
#[derive(Debug)]
pub struct RoundBarrier {
    round: Round,
    ready: watch::Sender<ReadinessBitmap>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl RoundBarrier {
    pub fn new(round: Round, parties: u16, timeout: Duration, cancel: CancellationToken) -> Self {
        let (ready, _) = watch::channel(ReadinessBitmap::new(parties));
        Self {
            round,
            ready,
            timeout,
            cancel,
        }
    }

    pub fn round(&self) -> Round {
        self.round
    }

    /// Mark `id` as arrived and wake every waiter.
    pub fn arrive(&self, id: ParticipantId) -> Result<()> {
        let mut in_range = false;
        self.ready.send_modify(|bitmap| in_range = bitmap.set(id));
        if !in_range {
            return Err(DkgError::InvalidParameters(format!(
                "participant {} is outside the {} barrier",
                id, self.round
            )));
        }
        debug!(round = %self.round, party = id, "arrived at barrier");
        Ok(())
    }

    pub fn has_arrived(&self, id: ParticipantId) -> bool {
        self.ready.borrow().is_set(id)
    }

    pub fn snapshot(&self) -> ReadinessBitmap {
        self.ready.borrow().clone()
    }

    /// Wait until every party has arrived.
    pub async fn wait_all(&self) -> Result<()> {
        let mut rx = self.ready.subscribe();
        let all_set = async move { rx.wait_for(ReadinessBitmap::is_complete).await.is_ok() };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(DkgError::Cancelled),
            waited = tokio::time::timeout(self.timeout, all_set) => match waited {
                Ok(true) => Ok(()),
                // The sender lives as long as `self`
                Ok(false) => Err(DkgError::Cancelled),
                Err(_) => Err(DkgError::BarrierTimeout {
                    round: self.round,
                    missing: self.snapshot().missing(),
                }),
            },
        }
    }
}

/// Per-run shared storage: one commitment slot per party, one share row per
/// sender, and a barrier per round.
pub struct StagingArea<G: Group> {
    parties: u16,
    commitments: Vec<OnceLock<CommitmentPackage<G>>>,
    /// `shares[sender - 1][recipient - 1]`
    shares: Vec<Vec<OnceLock<SharePackage<G>>>>,
    commitment_barrier: RoundBarrier,
    share_barrier: RoundBarrier,
}

impl<G: Group> StagingArea<G> {
    pub fn new(parties: u16, timeout: Duration, cancel: CancellationToken) -> Self {
        let n = parties as usize;
        Self {
            parties,
            commitments: (0..n).map(|_| OnceLock::new()).collect(),
            shares: (0..n)
                .map(|_| (0..n).map(|_| OnceLock::new()).collect())
                .collect(),
            commitment_barrier: RoundBarrier::new(
                Round::Commitments,
                parties,
                timeout,
                cancel.clone(),
            ),
            share_barrier: RoundBarrier::new(Round::Shares, parties, timeout, cancel),
        }
    }

    pub fn parties(&self) -> u16 {
        self.parties
    }

    pub fn barrier(&self, round: Round) -> &RoundBarrier {
        match round {
            Round::Commitments => &self.commitment_barrier,
            Round::Shares => &self.share_barrier,
        }
    }

    fn slot_index(&self, id: ParticipantId) -> Result<usize> {
        if id == 0 || id > self.parties {
            return Err(DkgError::InvalidParameters(format!(
                "participant {} out of range 1..={}",
                id, self.parties
            )));
        }
        Ok((id - 1) as usize)
    }

    /// Write the sender's commitment slot, then set its readiness bit.
    pub fn publish_commitments(&self, package: CommitmentPackage<G>) -> Result<()> {
        let sender = package.sender;
        let slot = &self.commitments[self.slot_index(sender)?];
        slot.set(package).map_err(|_| {
            DkgError::InvalidState(format!("party {} already published commitments", sender))
        })?;
        self.commitment_barrier.arrive(sender)
    }

    /// The sender's commitments, once its readiness bit is set.
    pub fn commitments(&self, sender: ParticipantId) -> Option<&CommitmentPackage<G>> {
        let idx = self.slot_index(sender).ok()?;
        if !self.commitment_barrier.has_arrived(sender) {
            return None;
        }
        self.commitments[idx].get()
    }

    /// Write one share per recipient into the sender's row, then set its
    /// readiness bit. Every package must name `sender`.
    ///
    /// The whole batch is checked before any slot is written, so a rejected
    /// batch leaves the row untouched.
    pub fn publish_shares(&self, sender: ParticipantId, packages: Vec<SharePackage<G>>) -> Result<()> {
        let row = &self.shares[self.slot_index(sender)?];

        let mut targets = Vec::with_capacity(packages.len());
        for package in &packages {
            if package.sender != sender {
                return Err(DkgError::InvalidState(format!(
                    "party {} cannot write a share for party {}",
                    sender, package.sender
                )));
            }
            let recipient = package.recipient;
            let idx = self.slot_index(recipient)?;
            if targets.contains(&idx) || row[idx].get().is_some() {
                return Err(DkgError::InvalidState(format!(
                    "party {} already sent a share to party {}",
                    sender, recipient
                )));
            }
            targets.push(idx);
        }

        for (idx, package) in targets.into_iter().zip(packages) {
            let recipient = package.recipient;
            row[idx].set(package).map_err(|_| {
                DkgError::InvalidState(format!(
                    "party {} already sent a share to party {}",
                    sender, recipient
                ))
            })?;
        }
        self.share_barrier.arrive(sender)
    }

    /// The share `sender` dealt to `recipient`, once the sender's bit is set.
    pub fn share(&self, sender: ParticipantId, recipient: ParticipantId) -> Option<&SharePackage<G>> {
        let s = self.slot_index(sender).ok()?;
        let r = self.slot_index(recipient).ok()?;
        if !self.share_barrier.has_arrived(sender) {
            return None;
        }
        self.shares[s][r].get()
    }
}

impl<G: Group> fmt::Debug for StagingArea<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingArea")
            .field("parties", &self.parties)
            .field("commitments_ready", &self.commitment_barrier.snapshot().count())
            .field("shares_ready", &self.share_barrier.snapshot().count())
            .finish()
    }
}
