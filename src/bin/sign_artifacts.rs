//! Artifact signing utility.
//!
//! Signs the `manifest.json` written by `train_model` with Ed25519 and stores
//! the raw 64-byte signature as `artifacts.sig` next to it. The manifest is
//! checked against the artifact files first, so a stale manifest is never
//! signed.
//!
//! # Usage
//!
//! ```bash
//! sign_artifacts <artifact_dir> [--key-file <path>]
//! sign_artifacts --generate-key <path> [--force]
//! ```
//!
//! The signing seed (base64, 32 bytes) comes from `--key-file`, then
//! `CARDIORISK_SIGNING_KEY_B64_FILE`, then (debug builds only)
//! `CARDIORISK_SIGNING_KEY_B64`. The base64 verifying key is printed so it
//! can be configured as `CARDIORISK_ARTIFACT_PUBKEY_B64`.

use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use cardiorisk::adapters::artifacts::{
    verify_manifest_files, ArtifactManifest, MANIFEST_FILE, MANIFEST_VERSION, SIGNATURE_FILE,
};

const KEY_FILE_ENV: &str = "CARDIORISK_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "CARDIORISK_SIGNING_KEY_B64";

const USAGE: &str = "Usage: sign_artifacts <artifact_dir> [--key-file <path>]\n       \
                     sign_artifacts --generate-key <path> [--force]";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

enum Command {
    Sign {
        dir: PathBuf,
        key_file: Option<PathBuf>,
    },
    GenerateKey {
        path: PathBuf,
        force: bool,
    },
}

fn parse_args() -> Result<Command> {
    let mut args = env::args().skip(1);
    let mut dir: Option<PathBuf> = None;
    let mut key_file: Option<PathBuf> = None;
    let mut generate: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--key-file" => key_file = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "--generate-key" => generate = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "--force" => force = true,
            "-h" | "--help" => bail!(USAGE),
            _ if dir.is_none() && !arg.starts_with('-') => dir = Some(PathBuf::from(arg)),
            _ => bail!("Unknown argument: {arg}\n{}", USAGE),
        }
    }

    match (generate, dir) {
        (Some(path), None) => Ok(Command::GenerateKey { path, force }),
        (None, Some(dir)) => Ok(Command::Sign { dir, key_file }),
        _ => bail!(USAGE),
    }
}

fn read_seed_b64(key_file: Option<&Path>) -> Result<Zeroizing<String>> {
    let from_file = |path: &Path| -> Result<Zeroizing<String>> {
        let content = Zeroizing::new(
            fs::read_to_string(path)
                .with_context(|| format!("Failed reading signing key file {path:?}"))?,
        );
        Ok(Zeroizing::new(content.trim().to_string()))
    };

    if let Some(path) = key_file {
        return from_file(path);
    }
    if let Ok(path) = env::var(KEY_FILE_ENV) {
        return from_file(Path::new(path.trim()));
    }

    // Dev-only fallback for convenience.
    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV) {
            return Ok(Zeroizing::new(v.trim().to_string()));
        }
    }

    bail!(
        "Missing signing key. Provide --key-file or {} ({} only in debug builds).",
        KEY_FILE_ENV,
        KEY_ENV
    )
}

fn decode_seed(b64: &str) -> Result<Seed> {
    if b64.is_empty() {
        bail!("Empty signing key");
    }
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64)
            .context("Invalid base64 in signing key")?,
    );
    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        anyhow!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        )
    })?;
    Ok(Seed(bytes))
}

/// Refuse to sign a manifest that does not describe the files on disk.
fn check_manifest(dir: &Path, manifest_bytes: &[u8]) -> Result<ArtifactManifest> {
    let manifest: ArtifactManifest =
        serde_json::from_slice(manifest_bytes).context("Invalid manifest.json")?;
    if manifest.version != MANIFEST_VERSION {
        bail!("Unsupported manifest version {}", manifest.version);
    }
    if manifest.files.is_empty() {
        bail!("manifest.json binds no files");
    }
    verify_manifest_files(dir, &manifest)
        .context("Artifacts do not match manifest.json; re-run train_model")?;
    Ok(manifest)
}

fn sign(dir: &Path, key_file: Option<&Path>) -> Result<()> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest_bytes =
        fs::read(&manifest_path).with_context(|| format!("Failed to read {manifest_path:?}"))?;
    let manifest = check_manifest(dir, &manifest_bytes)?;

    let seed = decode_seed(&read_seed_b64(key_file)?)?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes()).with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!(
        "Signed {manifest_path:?} ({} files, created {})",
        manifest.files.len(),
        manifest.created_at.to_rfc3339()
    );
    println!("Wrote signature: {sig_path:?}");
    println!(
        "CARDIORISK_ARTIFACT_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}

fn generate_key(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing {path:?} (use --force)");
    }

    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);
    let signing_key = SigningKey::from_bytes(&seed.0);
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    seed.zeroize();

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {path:?}"))?;
    writeln!(file, "{}", seed_b64.as_str()).with_context(|| format!("Failed to write {path:?}"))?;

    println!("Wrote signing seed: {path:?}");
    println!(
        "CARDIORISK_ARTIFACT_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    match parse_args()? {
        Command::Sign { dir, key_file } => sign(&dir, key_file.as_deref()),
        Command::GenerateKey { path, force } => generate_key(&path, force),
    }
}
