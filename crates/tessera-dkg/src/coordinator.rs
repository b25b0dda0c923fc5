//! Protocol coordinator: spawns the parties, owns the shared staging area,
//! and collects the results.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use tessera_core::{party_rng, CurvePoint, Group};

use crate::config::DkgConfig;
use crate::error::{DkgError, Result};
use crate::package::{KeyPackage, PublicKeyPackage};
use crate::party::{Behavior, Party, PartyParams, PartyReport};
use crate::staging::StagingArea;
use crate::types::SessionId;
use crate::ParticipantId;

const SESSION_LABEL: &[u8] = b"tessera-dkg/session";
const PARTY_LABEL: &[u8] = b"tessera-dkg/party";

/// Result of a successful run
pub struct DkgOutcome<G: Group> {
    pub session_id: SessionId,

    /// `Y = Σ_i C_{i,0}`, identical at every party
    pub group_key: G::Point,

    /// One package per party, in index order
    pub key_packages: Vec<KeyPackage<G>>,

    /// Hash over every party's commitment package
    pub transcript_hash: [u8; 32],

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl<G: Group> DkgOutcome<G> {
    pub fn key_package(&self, id: ParticipantId) -> Option<&KeyPackage<G>> {
        self.key_packages.iter().find(|p| p.participant_id == id)
    }

    /// SHA-256 of the encoded group key
    pub fn verification_hash(&self) -> [u8; 32] {
        crate::package::verification_hash(&self.group_key)
    }

    pub fn public_key_package(&self) -> Option<PublicKeyPackage<G>> {
        self.key_packages.first().map(KeyPackage::public_key_package)
    }

    pub fn group_key_hex(&self) -> String {
        hex::encode(self.group_key.encode())
    }
}

impl<G: Group> fmt::Debug for DkgOutcome<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkgOutcome")
            .field("suite", &G::NAME)
            .field("session_id", &self.session_id)
            .field("group_key", &self.group_key_hex())
            .field("parties", &self.key_packages.len())
            .field("duration", &self.duration)
            .finish()
    }
}

/// Runs one DKG across `N` in-process parties.
pub struct Coordinator<G: Group> {
    config: DkgConfig,
    session_id: Option<SessionId>,
    behaviors: BTreeMap<ParticipantId, Behavior>,
    _group: PhantomData<G>,
}

impl<G: Group> Coordinator<G> {
    pub fn new(config: DkgConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session_id: None,
            behaviors: BTreeMap::new(),
            _group: PhantomData,
        })
    }

    pub fn config(&self) -> &DkgConfig {
        &self.config
    }

    /// Use a fixed session id instead of a fresh one
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Make party `id` deviate from the protocol
    pub fn with_behavior(mut self, id: ParticipantId, behavior: Behavior) -> Result<Self> {
        if id == 0 || id > self.config.num_parties {
            return Err(DkgError::InvalidParameters(format!(
                "participant {} out of range 1..={}",
                id, self.config.num_parties
            )));
        }
        self.behaviors.insert(id, behavior);
        Ok(self)
    }

    /// Run every party to completion and check that they agree.
    #[instrument(skip_all, fields(
        suite = G::NAME,
        parties = self.config.num_parties,
        threshold = self.config.threshold,
    ))]
    pub async fn run(self) -> Result<DkgOutcome<G>> {
        let start = Instant::now();
        let n = self.config.num_parties;
        let seed = self.config.seed_bytes()?;

        let session_id = self
            .session_id
            .unwrap_or_else(|| SessionId::random(&mut party_rng(seed.as_ref(), SESSION_LABEL, 0)));
        info!(session = %session_id.short(), "starting DKG");

        let cancel = CancellationToken::new();
        let staging = Arc::new(StagingArea::<G>::new(
            n,
            self.config.barrier_timeout(),
            cancel.clone(),
        ));

        let mut tasks = JoinSet::new();
        for id in 1..=n {
            let params = PartyParams {
                id,
                num_parties: n,
                threshold: self.config.threshold,
                session: session_id,
                policy: self.config.failure_policy,
                behavior: self.behaviors.get(&id).copied().unwrap_or_default(),
            };
            // Mix the session into the seed so distinct sessions never reuse
            // coefficient streams.
            let party_seed = seed.map(|s| {
                let mut mixed = s;
                for (m, b) in mixed.iter_mut().zip(session_id.as_bytes()) {
                    *m ^= b;
                }
                mixed
            });
            let rng = party_rng(party_seed.as_ref(), PARTY_LABEL, id);
            let party = Party::new(params, Arc::clone(&staging), rng);
            tasks.spawn(party.run());
        }

        let mut reports = Vec::with_capacity(n as usize);
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(DkgError::from).and_then(|r| r) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    if !matches!(e, DkgError::Cancelled) {
                        error!(error = %e, "party failed");
                    }
                    // No other party can finish once one has stopped.
                    cancel.cancel();
                    errors.push(e);
                }
            }
        }

        if !errors.is_empty() {
            return Err(pick_error(errors));
        }

        let outcome = aggregate(session_id, reports, start.elapsed())?;
        info!(
            session = %session_id.short(),
            group_key = %outcome.group_key_hex(),
            duration_ms = outcome.duration.as_millis() as u64,
            "DKG complete"
        );
        Ok(outcome)
    }
}

/// The most informative error among several failed parties: anything but
/// `Cancelled`, which is only a consequence of another failure.
fn pick_error(errors: Vec<DkgError>) -> DkgError {
    let mut failures = Vec::new();
    let mut other = None;
    for e in errors {
        match e {
            DkgError::VerificationFailed(f) => failures.extend(f),
            DkgError::Cancelled => {}
            e => {
                other.get_or_insert(e);
            }
        }
    }
    if !failures.is_empty() {
        failures.sort_by_key(|f| (f.verifier, f.sender));
        return DkgError::VerificationFailed(failures);
    }
    other.unwrap_or(DkgError::Cancelled)
}

fn aggregate<G: Group>(
    session_id: SessionId,
    mut reports: Vec<PartyReport<G>>,
    duration: Duration,
) -> Result<DkgOutcome<G>> {
    reports.sort_by_key(|r| r.participant_id);

    let mut failures: Vec<_> = reports.iter().flat_map(|r| r.failures.clone()).collect();
    if !failures.is_empty() {
        failures.sort_by_key(|f| (f.verifier, f.sender));
        return Err(DkgError::VerificationFailed(failures));
    }

    let first = reports
        .first()
        .ok_or_else(|| DkgError::InvalidState("no party reported".to_string()))?;
    let group_key = first.key_package.group_key;
    let transcript_hash = first.transcript_hash;
    for report in &reports {
        if report.key_package.group_key != group_key || report.transcript_hash != transcript_hash {
            return Err(DkgError::InconsistentGroupKey {
                participant: report.participant_id,
            });
        }
    }

    Ok(DkgOutcome {
        session_id,
        group_key,
        key_packages: reports.into_iter().map(|r| r.key_package).collect(),
        transcript_hash,
        duration,
    })
}

/// Run a DKG with default configuration.
pub async fn run_dkg<G: Group>(num_parties: u16, threshold: u16) -> Result<DkgOutcome<G>> {
    Coordinator::<G>::new(DkgConfig::new(num_parties, threshold))?
        .run()
        .await
}

/// Blocking wrapper around [`run_dkg`] on a fresh multi-thread runtime.
pub fn run_dkg_blocking<G: Group>(num_parties: u16, threshold: u16) -> Result<DkgOutcome<G>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_dkg::<G>(num_parties, threshold))
}
