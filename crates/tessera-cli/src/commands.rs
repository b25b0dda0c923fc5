//! Command handlers

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use rand::rngs::OsRng;
use serde_json::json;
use tracing::{debug, info};

use tessera_core::{CurvePoint, Ed25519, Group, Secp256k1};
use tessera_dkg::{
    signing, taproot, Coordinator, DkgConfig, DkgOutcome, FailurePolicy, ParticipantId, Signature,
    SigningCommitments, SigningNonces, SigningPackage, TaprootKey, TaprootSignature,
};

use crate::{DkgArgs, Suite};

/// Config file (if any) with command-line overrides applied.
pub fn resolve_config(args: &DkgArgs) -> Result<DkgConfig> {
    let mut config = match &args.config {
        Some(path) => DkgConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let (Some(n), Some(t)) = (args.parties, args.threshold) else {
                bail!("--parties and --threshold are required without --config");
            };
            DkgConfig::new(n, t)
        }
    };

    if let Some(n) = args.parties {
        config.num_parties = n;
    }
    if let Some(t) = args.threshold {
        config.threshold = t;
    }
    if let Some(ms) = args.timeout_ms {
        config.barrier_timeout_ms = ms;
    }
    if args.seed.is_some() {
        config.seed = args.seed.clone();
    }
    if args.abort_on_failure {
        config.failure_policy = FailurePolicy::Abort;
    }
    config.validate()?;
    Ok(config)
}

pub async fn keygen(args: DkgArgs, output: Option<std::path::PathBuf>) -> Result<()> {
    let config = resolve_config(&args)?;
    let output = output.as_deref();
    match args.suite {
        Suite::Ed25519 => keygen_with::<Ed25519>(config, args.json, output).await,
        Suite::Secp256k1 => keygen_with::<Secp256k1>(config, args.json, output).await,
        Suite::Taproot => keygen_taproot(config, args.json, output).await,
    }
}

async fn run_keygen<G: Group>(config: DkgConfig, output: Option<&Path>) -> Result<DkgOutcome<G>> {
    let outcome = Coordinator::<G>::new(config)?.run().await?;
    if let Some(dir) = output {
        write_key_packages(&outcome, dir)?;
    }
    Ok(outcome)
}

async fn keygen_with<G: Group>(config: DkgConfig, json: bool, output: Option<&Path>) -> Result<()> {
    let outcome = run_keygen::<G>(config, output).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary(&outcome))?);
    } else {
        print_summary(&outcome);
        print_output_dir(output);
    }
    Ok(())
}

async fn keygen_taproot(config: DkgConfig, json: bool, output: Option<&Path>) -> Result<()> {
    let outcome = run_keygen::<Secp256k1>(config, output).await?;
    let key = TaprootKey::tweaked(&outcome.group_key, None)?;
    if json {
        let mut out = summary(&outcome);
        add_taproot_keys(&mut out, &key);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&outcome);
        print_taproot_keys(&key);
        print_output_dir(output);
    }
    Ok(())
}

fn print_output_dir(output: Option<&Path>) {
    if let Some(dir) = output {
        println!("  Key packages: {}", dir.display());
    }
}

fn add_taproot_keys(out: &mut serde_json::Value, key: &TaprootKey) {
    out["suite"] = json!("taproot");
    out["internal_key"] = json!(hex::encode(key.internal_key()));
    out["output_key"] = json!(hex::encode(key.output_key()));
}

fn print_taproot_keys(key: &TaprootKey) {
    println!("  Internal key (x-only): {}", hex::encode(key.internal_key()));
    println!("  Output key (x-only): {}", hex::encode(key.output_key()));
}

pub async fn sign(args: DkgArgs, message: String, signers: Vec<ParticipantId>) -> Result<()> {
    let config = resolve_config(&args)?;
    let signers = if signers.is_empty() {
        (1..=config.threshold + 1).collect()
    } else {
        signers
    };
    match args.suite {
        Suite::Ed25519 => sign_with::<Ed25519>(config, args.json, &message, signers).await,
        Suite::Secp256k1 => sign_with::<Secp256k1>(config, args.json, &message, signers).await,
        Suite::Taproot => sign_taproot(config, args.json, &message, signers).await,
    }
}

async fn sign_with<G: Group>(
    config: DkgConfig,
    json: bool,
    message: &str,
    signers: Vec<ParticipantId>,
) -> Result<()> {
    let outcome = Coordinator::<G>::new(config)?.run().await?;
    let (signature, mut timings) = quorum_sign(&outcome, &signers, message.as_bytes())?;
    let valid = timings.time("verify", || {
        Ok(signing::verify::<G>(&outcome.group_key, message.as_bytes(), &signature))
    })?;
    if !valid {
        bail!("aggregated signature does not verify");
    }

    if json {
        let mut out = summary(&outcome);
        add_signature(&mut out, &signers, message, signature.to_hex(), &timings);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&outcome);
        print_signature(&signers, message, &signature.to_hex(), &timings);
    }
    Ok(())
}

async fn sign_taproot(
    config: DkgConfig,
    json: bool,
    message: &str,
    signers: Vec<ParticipantId>,
) -> Result<()> {
    let outcome = Coordinator::<Secp256k1>::new(config)?.run().await?;
    let key = TaprootKey::tweaked(&outcome.group_key, None)?;
    let (signature, mut timings) = taproot_sign(&outcome, &key, &signers, message.as_bytes())?;
    let valid = timings.time("verify", || {
        Ok(taproot::verify(&key.output_key(), message.as_bytes(), &signature))
    })?;
    if !valid {
        bail!("aggregated BIP-340 signature does not verify");
    }

    if json {
        let mut out = summary(&outcome);
        add_taproot_keys(&mut out, &key);
        add_signature(&mut out, &signers, message, signature.to_hex(), &timings);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&outcome);
        print_taproot_keys(&key);
        print_signature(&signers, message, &signature.to_hex(), &timings);
    }
    Ok(())
}

/// Wall-clock duration of each signing step, in the order they ran.
#[derive(Debug, Default)]
pub struct StepTimings {
    steps: Vec<(&'static str, Duration)>,
}

impl StepTimings {
    /// Run `f` and record how long it took under `step`.
    pub fn time<T>(&mut self, step: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        debug!(step, elapsed_us = elapsed.as_micros() as u64, "signing step");
        self.steps.push((step, elapsed));
        out
    }

    pub fn steps(&self) -> &[(&'static str, Duration)] {
        &self.steps
    }

    pub fn total(&self) -> Duration {
        self.steps.iter().map(|(_, d)| *d).sum()
    }

    fn to_json(&self) -> serde_json::Value {
        let steps: Vec<_> = self
            .steps
            .iter()
            .map(|(step, d)| json!({ "step": step, "micros": d.as_micros() as u64 }))
            .collect();
        json!(steps)
    }
}

/// Round one for every signer, with nonces from the OS generator.
///
/// Signing nonces never come from the run seed: a seeded stream would repeat
/// the same nonces for every message and expose the signers' shares.
pub fn commit_round<G: Group>(
    signers: &[ParticipantId],
) -> (Vec<SigningNonces<G>>, Vec<SigningCommitments<G>>) {
    signers
        .iter()
        .map(|id| signing::commit::<G, _>(*id, &mut OsRng))
        .unzip()
}

fn key_packages<'a, G: Group>(
    outcome: &'a DkgOutcome<G>,
    signers: &[ParticipantId],
) -> Result<Vec<&'a tessera_dkg::KeyPackage<G>>> {
    signers
        .iter()
        .map(|id| outcome.key_package(*id).with_context(|| format!("no party {}", id)))
        .collect()
}

/// Both signing rounds across `signers`, then aggregation.
pub fn quorum_sign<G: Group>(
    outcome: &DkgOutcome<G>,
    signers: &[ParticipantId],
    message: &[u8],
) -> Result<(Signature<G>, StepTimings)> {
    let mut timings = StepTimings::default();
    let key_packages = key_packages(outcome, signers)?;
    let public = outcome
        .public_key_package()
        .context("DKG produced no key packages")?;

    let (nonces, commitments) = timings.time("commit", || Ok(commit_round::<G>(signers)))?;
    let package = SigningPackage::new(message, commitments)?;

    let shares = timings.time("sign", || {
        key_packages
            .iter()
            .zip(nonces)
            .map(|(kp, n)| Ok(signing::sign(kp, n, &package)?))
            .collect::<Result<Vec<_>>>()
    })?;
    let signature = timings.time("aggregate", || {
        Ok(signing::aggregate(&package, &shares, &public)?)
    })?;

    info!(signers = ?signers, "signature aggregated");
    Ok((signature, timings))
}

/// [`quorum_sign`] producing a BIP-340 signature under `key.output_key()`.
pub fn taproot_sign(
    outcome: &DkgOutcome<Secp256k1>,
    key: &TaprootKey,
    signers: &[ParticipantId],
    message: &[u8],
) -> Result<(TaprootSignature, StepTimings)> {
    let mut timings = StepTimings::default();
    let key_packages = key_packages(outcome, signers)?;
    let public = outcome
        .public_key_package()
        .context("DKG produced no key packages")?;

    let (nonces, commitments) =
        timings.time("commit", || Ok(commit_round::<Secp256k1>(signers)))?;
    let package = SigningPackage::new(message, commitments)?;

    let shares = timings.time("sign", || {
        key_packages
            .iter()
            .zip(nonces)
            .map(|(kp, n)| Ok(taproot::sign(kp, n, &package, key)?))
            .collect::<Result<Vec<_>>>()
    })?;
    let signature = timings.time("aggregate", || {
        Ok(taproot::aggregate(&package, &shares, &public, key)?)
    })?;

    info!(signers = ?signers, output_key = %hex::encode(key.output_key()), "BIP-340 signature aggregated");
    Ok((signature, timings))
}

fn add_signature(
    out: &mut serde_json::Value,
    signers: &[ParticipantId],
    message: &str,
    signature: String,
    timings: &StepTimings,
) {
    out["signers"] = json!(signers);
    out["message"] = json!(message);
    out["signature"] = json!(signature);
    out["signing_steps"] = timings.to_json();
}

fn print_signature(signers: &[ParticipantId], message: &str, signature: &str, timings: &StepTimings) {
    println!("\nSignature:");
    println!("  Signers: {:?}", signers);
    println!("  Message: {:?}", message);
    println!("  Signature: {}", signature);
    println!("  Verified: true");
    println!("\nSigning steps:");
    for (step, elapsed) in timings.steps() {
        println!("  {:<10} {:>10.3} ms", step, elapsed.as_secs_f64() * 1000.0);
    }
    println!("  {:<10} {:>10.3} ms", "total", timings.total().as_secs_f64() * 1000.0);
}

fn summary<G: Group>(outcome: &DkgOutcome<G>) -> serde_json::Value {
    let parties: Vec<_> = outcome
        .key_packages
        .iter()
        .map(|p| {
            json!({
                "participant_id": p.participant_id,
                "verifying_share": p.verifying_share().map(|v| hex::encode(v.encode())),
            })
        })
        .collect();
    json!({
        "suite": G::NAME,
        "session_id": outcome.session_id.to_hex(),
        "group_key": outcome.group_key_hex(),
        "verification_hash": hex::encode(outcome.verification_hash()),
        "transcript_hash": hex::encode(outcome.transcript_hash),
        "duration_ms": outcome.duration.as_millis() as u64,
        "parties": parties,
    })
}

fn print_summary<G: Group>(outcome: &DkgOutcome<G>) {
    let threshold = outcome
        .key_packages
        .first()
        .map(|p| p.threshold)
        .unwrap_or_default();
    println!("✓ DKG complete");
    println!("  Suite: {}", G::NAME);
    println!("  Session: {}", outcome.session_id);
    println!(
        "  Parties: {} (any {} can sign)",
        outcome.key_packages.len(),
        threshold + 1
    );
    println!("  Group key: {}", outcome.group_key_hex());
    println!(
        "  Verification hash: {}",
        hex::encode(outcome.verification_hash())
    );
    println!("  Duration: {:.3}s", outcome.duration.as_secs_f64());
}

fn write_key_packages<G: Group>(outcome: &DkgOutcome<G>, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for package in &outcome.key_packages {
        let path = dir.join(format!("party-{}.json", package.participant_id));
        fs::write(&path, serde_json::to_string_pretty(package)?)
            .with_context(|| format!("writing {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
    }
    info!(count = outcome.key_packages.len(), dir = %dir.display(), "wrote key packages");
    Ok(())
}

pub fn config_init(output: &Path, parties: u16, threshold: u16, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    let config = DkgConfig::new(parties, threshold);
    config.validate()?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    config.save(output)?;
    println!("✓ Wrote {}", output.display());
    Ok(())
}
