//! # Tessera DKG
//!
//! Distributed key generation for FROST-style threshold Schnorr signatures.
//!
//! `N` parties each deal a random degree-`t` polynomial. After the run every
//! party holds a secret share `s_j`, every party agrees on the group key
//! `Y = [Σ_i a_{i,0}]G`, and any `t + 1` shares can sign for `Y`.
//!
//! ## Rounds
//!
//! ```text
//! Party i                              staging area
//! ─────────────────────────────────    ───────────────────────────────
//! sample f_i, commit C_i = [a_i]G  ──► commitments[i]   (barrier 1)
//! prove knowledge of a_{i,0}
//! verify every proof               ◄── commitments[*]
//! evaluate f_i(j) for every j      ──► shares[i][j]     (barrier 2)
//! verify shares against C_j        ◄── shares[*][i]
//! s_i = Σ_j f_j(i),  Y = Σ_j C_{j,0}
//! ```
//!
//! Each party is a tokio task driven by [`Party::step`]. The two waits are
//! [`RoundBarrier`]s; a party that never arrives surfaces as
//! [`DkgError::BarrierTimeout`] naming the missing indices.
//!
//! ## Example
//!
//! ```no_run
//! use tessera_core::Ed25519;
//!
//! # async fn demo() -> tessera_dkg::Result<()> {
//! let outcome = tessera_dkg::run_dkg::<Ed25519>(4, 2).await?;
//! println!("group key {}", outcome.group_key_hex());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod package;
pub mod party;
pub mod schnorr;
pub mod signing;
pub mod staging;
pub mod taproot;
pub mod types;
pub mod vss;

pub use config::{DkgConfig, FailurePolicy, MAX_PARTIES};
pub use coordinator::{run_dkg, run_dkg_blocking, Coordinator, DkgOutcome};
pub use error::{DkgError, FailureKind, Result, VerificationFailure};
pub use package::{verification_hash, KeyPackage, PublicKeyPackage};
pub use party::{Behavior, Party, PartyParams, PartyReport, PartyState};
pub use schnorr::SchnorrProof;
pub use signing::{Signature, SignatureShare, SigningCommitments, SigningNonces, SigningPackage};
pub use staging::{ReadinessBitmap, Round, RoundBarrier, StagingArea};
pub use taproot::{TaprootKey, TaprootSignature};
pub use types::{CommitmentPackage, ParticipantId, SessionId, SharePackage};
