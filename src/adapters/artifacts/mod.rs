//! Filesystem artifact store: Implementation of ArtifactStore.
//!
//! An artifact set is a directory holding:
//! - `scaler.json`: the training-fitted [`ScalerState`]
//! - `classifier.json`: the fitted [`RandomForest`]
//! - `manifest.json`: format version, creation time, feature contract and the
//!   SHA-256 of both artifacts
//! - `artifacts.sig` (optional): raw 64-byte Ed25519 signature over the exact
//!   bytes of `manifest.json`
//!
//! Loading never trusts a file that the manifest does not bind. When a
//! signature is present it is always verified; when signatures are required
//! its absence is fatal.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::adapters::forest::RandomForest;
use crate::config::{Config, PubkeySource};
use crate::domain::{check_schema, feature_names, ScalerError, ScalerState, SchemaError};
use crate::ports::{ArtifactStore, LoadedArtifacts, ModelError};

/// Current manifest layout version.
pub const MANIFEST_VERSION: u32 = 1;

pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "artifacts.sig";

/// Errors from saving or loading an artifact set.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {file}: {source}")]
    Serialization {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported manifest version {found} (expected {MANIFEST_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("Manifest does not bind {0}")]
    UnboundFile(&'static str),

    #[error("SHA-256 mismatch for {0}")]
    HashMismatch(String),

    #[error("Manifest entry {0:?} is not a plain file name")]
    UnsafeFileName(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Artifacts are unsigned but a signature is required")]
    MissingSignature,

    #[error("Artifact schema skew: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid scaler artifact: {0}")]
    Scaler(#[from] ScalerError),

    #[error("Invalid classifier artifact: {0}")]
    Model(#[from] ModelError),
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Classifier input columns, in order
    pub feature_names: Vec<String>,
    /// Scaler columns, in order
    pub scaler_columns: Vec<String>,
    /// File name to lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

/// Whether unsigned artifact sets are acceptable, and the key to check
/// signed ones against.
#[derive(Debug, Clone, Default)]
pub struct SignaturePolicy {
    pub require_signature: bool,
    pub verifying_key: Option<VerifyingKey>,
}

/// Artifact store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    policy: SignaturePolicy,
}

impl FsArtifactStore {
    /// Store with the default policy: signatures verified when present.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            policy: SignaturePolicy::default(),
        }
    }

    /// Store configured from the environment.
    ///
    /// # Errors
    /// Returns [`ArtifactError`] if a configured verifying key cannot be read
    /// or decoded.
    pub fn from_config(config: &Config) -> Result<Self, ArtifactError> {
        let verifying_key = match &config.artifact_pubkey {
            Some(PubkeySource::File(path)) => {
                let b64 = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
                    path: path.clone(),
                    source,
                })?;
                Some(verifying_key_from_b64(&b64)?)
            }
            Some(PubkeySource::Inline(b64)) => Some(verifying_key_from_b64(b64)?),
            None => None,
        };

        Ok(Self::new(&config.artifact_dir).with_policy(SignaturePolicy {
            require_signature: config.require_signed_artifacts,
            verifying_key,
        }))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SignaturePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.dir.join(name);
        fs::read(&path).map_err(|source| ArtifactError::Io { path, source })
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let path = self.dir.join(name);
        fs::write(&path, bytes).map_err(|source| ArtifactError::Io { path, source })
    }

    /// Verify `artifacts.sig` over the manifest bytes according to policy.
    ///
    /// Returns whether a signature was checked.
    fn verify_signature(&self, manifest_bytes: &[u8]) -> Result<bool, ArtifactError> {
        let sig_path = self.dir.join(SIGNATURE_FILE);
        if !sig_path.exists() {
            if self.policy.require_signature {
                tracing::error!(
                    "No {} in {:?}; signed artifacts are required",
                    SIGNATURE_FILE,
                    self.dir
                );
                return Err(ArtifactError::MissingSignature);
            }
            tracing::warn!("Loading UNSIGNED artifacts from {:?}", self.dir);
            return Ok(false);
        }

        let Some(key) = &self.policy.verifying_key else {
            return Err(ArtifactError::Signature(
                "artifacts are signed but no verifying key is configured".into(),
            ));
        };

        let sig_bytes = self.read(SIGNATURE_FILE)?;
        let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
            ArtifactError::Signature(format!(
                "invalid signature length {} (expected 64 bytes)",
                sig_bytes.len()
            ))
        })?;
        let signature = Signature::from_bytes(&sig_array);

        key.verify(manifest_bytes, &signature)
            .map_err(|_| ArtifactError::Signature("manifest signature does not verify".into()))?;

        Ok(true)
    }

    /// Read a manifest-bound file and check its digest.
    fn read_bound(
        &self,
        manifest: &ArtifactManifest,
        name: &'static str,
    ) -> Result<Vec<u8>, ArtifactError> {
        let expected = manifest
            .files
            .get(name)
            .ok_or(ArtifactError::UnboundFile(name))?;
        let bytes = self.read(name)?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected) {
            return Err(ArtifactError::HashMismatch(name.to_string()));
        }
        Ok(bytes)
    }
}

impl ArtifactStore for FsArtifactStore {
    type Model = RandomForest;
    type Error = ArtifactError;

    fn save(&self, scaler: &ScalerState, classifier: &RandomForest) -> Result<(), ArtifactError> {
        scaler.validate()?;
        classifier.validate()?;
        check_schema(&classifier.feature_names)?;

        fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let scaler_bytes = serde_json::to_vec_pretty(scaler).map_err(|source| {
            ArtifactError::Serialization {
                file: SCALER_FILE,
                source,
            }
        })?;
        let classifier_bytes = serde_json::to_vec(classifier).map_err(|source| {
            ArtifactError::Serialization {
                file: CLASSIFIER_FILE,
                source,
            }
        })?;

        let manifest = ArtifactManifest {
            version: MANIFEST_VERSION,
            created_at: Utc::now(),
            feature_names: feature_names(),
            scaler_columns: scaler.columns.clone(),
            files: BTreeMap::from([
                (SCALER_FILE.to_string(), sha256_hex(&scaler_bytes)),
                (CLASSIFIER_FILE.to_string(), sha256_hex(&classifier_bytes)),
            ]),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest).map_err(|source| {
            ArtifactError::Serialization {
                file: MANIFEST_FILE,
                source,
            }
        })?;

        self.write(SCALER_FILE, &scaler_bytes)?;
        self.write(CLASSIFIER_FILE, &classifier_bytes)?;
        self.write(MANIFEST_FILE, &manifest_bytes)?;

        // A signature from a previous save no longer matches the new manifest.
        let sig_path = self.dir.join(SIGNATURE_FILE);
        if sig_path.exists() {
            tracing::warn!("Removing stale {:?}; re-sign the new artifacts", sig_path);
            fs::remove_file(&sig_path).map_err(|source| ArtifactError::Io {
                path: sig_path.clone(),
                source,
            })?;
        }

        tracing::info!(
            "Saved artifacts to {:?} ({} trees, scaler fitted on {} rows)",
            self.dir,
            classifier.trees.len(),
            scaler.n_samples_seen
        );
        Ok(())
    }

    fn load(&self) -> Result<LoadedArtifacts<RandomForest>, ArtifactError> {
        let manifest_bytes = self.read(MANIFEST_FILE)?;
        let signed = self.verify_signature(&manifest_bytes)?;

        let manifest: ArtifactManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|source| {
                ArtifactError::Serialization {
                    file: MANIFEST_FILE,
                    source,
                }
            })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: manifest.version,
            });
        }
        check_schema(&manifest.feature_names)?;

        let scaler_bytes = self.read_bound(&manifest, SCALER_FILE)?;
        let classifier_bytes = self.read_bound(&manifest, CLASSIFIER_FILE)?;

        let scaler: ScalerState = serde_json::from_slice(&scaler_bytes).map_err(|source| {
            ArtifactError::Serialization {
                file: SCALER_FILE,
                source,
            }
        })?;
        let classifier: RandomForest =
            serde_json::from_slice(&classifier_bytes).map_err(|source| {
                ArtifactError::Serialization {
                    file: CLASSIFIER_FILE,
                    source,
                }
            })?;

        scaler.validate()?;
        if scaler.columns != manifest.scaler_columns {
            return Err(ScalerError::ColumnMismatch {
                expected: manifest.scaler_columns,
                actual: scaler.columns,
            }
            .into());
        }
        classifier.validate()?;
        check_schema(&classifier.feature_names)?;

        tracing::info!(
            "Loaded artifacts from {:?} (created {}, {} trees, signed={})",
            self.dir,
            manifest.created_at.to_rfc3339(),
            classifier.trees.len(),
            signed
        );

        Ok(LoadedArtifacts { scaler, classifier })
    }
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns [`ArtifactError::Signature`] for bad base64, a wrong length, or
/// an invalid curve point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ArtifactError::Signature("invalid public key length (expected 32 bytes)".into())
    })?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

/// Check every file a manifest binds against its copy in `dir`.
///
/// Entries must be plain file names; nothing outside `dir` is ever read.
///
/// # Errors
/// Returns [`ArtifactError`] for a name with a path component, an
/// unreadable file, or a digest that differs.
pub fn verify_manifest_files(
    dir: &Path,
    manifest: &ArtifactManifest,
) -> Result<(), ArtifactError> {
    for (name, expected) in &manifest.files {
        if !is_plain_file_name(name) {
            return Err(ArtifactError::UnsafeFileName(name.clone()));
        }
        let path = dir.join(name);
        let bytes = fs::read(&path).map_err(|source| ArtifactError::Io { path, source })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected) {
            return Err(ArtifactError::HashMismatch(name.clone()));
        }
    }
    Ok(())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\')
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::forest::{DecisionTree, ForestParams, Node, FOREST_FORMAT_VERSION};
    use crate::domain::{derive_interactions, BaseFeatures, FEATURE_COUNT};
    use ed25519_dalek::{Signer, SigningKey};
    use rand::RngCore;
    use tempfile::tempdir;

    fn scaler() -> ScalerState {
        let rows = [
            BaseFeatures {
                age: 40.0,
                trestbps: 120.0,
                chol: 200.0,
                thalach: 150.0,
                ..BaseFeatures::default()
            },
            BaseFeatures {
                age: 60.0,
                trestbps: 140.0,
                chol: 300.0,
                thalach: 170.0,
                oldpeak: 2.0,
                ..BaseFeatures::default()
            },
        ];
        ScalerState::fit(&rows).expect("Should fit scaler")
    }

    fn forest() -> RandomForest {
        RandomForest {
            format_version: FOREST_FORMAT_VERSION,
            feature_names: feature_names(),
            params: ForestParams::default(),
            trees: vec![DecisionTree::new(vec![Node::leaf(0.25)])],
        }
    }

    fn signing_key() -> SigningKey {
        let mut sk = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut sk);
        SigningKey::from_bytes(&sk)
    }

    fn sign_dir(dir: &Path, key: &SigningKey) {
        let manifest = fs::read(dir.join(MANIFEST_FILE)).expect("read manifest");
        let signature: Signature = key.sign(&manifest);
        fs::write(dir.join(SIGNATURE_FILE), signature.to_bytes()).expect("write signature");
    }

    fn saved_store() -> (tempfile::TempDir, FsArtifactStore) {
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&scaler(), &forest()).expect("Should save artifacts");
        (temp, store)
    }

    #[test]
    fn test_save_then_load_unsigned() {
        let (_temp, store) = saved_store();
        let loaded = store.load().expect("Should load artifacts");
        assert_eq!(loaded.scaler, scaler());
        assert_eq!(loaded.classifier, forest());

        let manifest: ArtifactManifest =
            serde_json::from_slice(&fs::read(store.dir().join(MANIFEST_FILE)).expect("read"))
                .expect("parse manifest");
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.feature_names, feature_names());
        assert_eq!(manifest.files.len(), 2);
    }

    /// Scaler and forest fitted on data whose statistics are not short
    /// decimals, so a lossy float parse would show up.
    fn fitted() -> (ScalerState, RandomForest) {
        let rows: Vec<BaseFeatures> = (0..30u32)
            .map(|i| BaseFeatures {
                age: 40.0 + f64::from(i) / 3.0,
                sex: f64::from(i % 2),
                trestbps: 120.0 + f64::from(i % 7) * 1.1,
                chol: 200.0 + f64::from(i * 13 % 11) / 7.0,
                thalach: 150.0 + f64::from(i % 5) * 0.3,
                oldpeak: f64::from(i % 4) / 3.0,
                ..BaseFeatures::default()
            })
            .collect();
        let labels: Vec<u8> = (0..30u32).map(|i| u8::from(i % 3 != 0)).collect();

        let scaler = ScalerState::fit(&rows).expect("Should fit scaler");
        let design: Vec<[f64; FEATURE_COUNT]> = rows
            .iter()
            .map(|r| derive_interactions(scaler.transform(r).expect("transform")).to_array())
            .collect();
        let params = ForestParams {
            n_estimators: 5,
            max_depth: 4,
            ..ForestParams::default()
        };
        let forest =
            RandomForest::fit(params, feature_names(), &design, &labels).expect("Should fit");
        (scaler, forest)
    }

    fn forest_bits(forest: &RandomForest) -> Vec<u64> {
        forest
            .trees
            .iter()
            .flat_map(|t| &t.nodes)
            .map(|node| match node {
                Node::Leaf { probability } => probability.to_bits(),
                Node::Split { condition, .. } => condition.threshold.to_bits(),
            })
            .collect()
    }

    #[test]
    fn test_reload_is_bit_exact() {
        let (scaler, forest) = fitted();
        let temp = tempdir().expect("tempdir");
        let store = FsArtifactStore::new(temp.path());
        store.save(&scaler, &forest).expect("Should save");
        let loaded = store.load().expect("Should load");

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&loaded.scaler.mean), bits(&scaler.mean));
        assert_eq!(bits(&loaded.scaler.scale), bits(&scaler.scale));
        assert_eq!(forest_bits(&loaded.classifier), forest_bits(&forest));
        assert_eq!(loaded.classifier, forest);
    }

    #[test]
    fn test_tampered_classifier_is_rejected() {
        let (_temp, store) = saved_store();
        let path = store.dir().join(CLASSIFIER_FILE);
        let tampered = fs::read_to_string(&path)
            .expect("read")
            .replace("0.25", "0.95");
        fs::write(&path, tampered).expect("write");

        assert!(matches!(
            store.load(),
            Err(ArtifactError::HashMismatch(name)) if name == CLASSIFIER_FILE
        ));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let (_temp, store) = saved_store();
        fs::remove_file(store.dir().join(SCALER_FILE)).expect("remove");
        assert!(matches!(store.load(), Err(ArtifactError::Io { .. })));

        let empty = tempdir().expect("tempdir");
        assert!(matches!(
            FsArtifactStore::new(empty.path()).load(),
            Err(ArtifactError::Io { .. })
        ));
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let (_temp, store) = saved_store();
        let path = store.dir().join(MANIFEST_FILE);
        let mut manifest: ArtifactManifest =
            serde_json::from_slice(&fs::read(&path).expect("read")).expect("parse");
        manifest.version = 2;
        fs::write(&path, serde_json::to_vec(&manifest).expect("serialize")).expect("write");

        assert!(matches!(
            store.load(),
            Err(ArtifactError::UnsupportedVersion { found: 2 })
        ));
    }

    #[test]
    fn test_manifest_schema_skew_is_fatal() {
        let (_temp, store) = saved_store();
        let path = store.dir().join(MANIFEST_FILE);
        let mut manifest: ArtifactManifest =
            serde_json::from_slice(&fs::read(&path).expect("read")).expect("parse");
        manifest.feature_names.swap(0, 1);
        fs::write(&path, serde_json::to_vec(&manifest).expect("serialize")).expect("write");

        assert!(matches!(
            store.load(),
            Err(ArtifactError::Schema(SchemaError::NameMismatch { index: 0, .. }))
        ));
    }

    #[test]
    fn test_save_refuses_wrong_width_classifier() {
        let temp = tempdir().expect("tempdir");
        let mut narrow = forest();
        narrow.feature_names.pop();
        assert!(matches!(
            FsArtifactStore::new(temp.path()).save(&scaler(), &narrow),
            Err(ArtifactError::Schema(SchemaError::WidthMismatch { .. }))
        ));
    }

    #[test]
    fn test_signed_artifacts_verify() {
        let (_temp, store) = saved_store();
        let key = signing_key();
        sign_dir(store.dir(), &key);

        let store = store.with_policy(SignaturePolicy {
            require_signature: true,
            verifying_key: Some(key.verifying_key()),
        });
        assert!(store.load().is_ok());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let (_temp, store) = saved_store();
        sign_dir(store.dir(), &signing_key());

        let store = store.with_policy(SignaturePolicy {
            require_signature: false,
            verifying_key: Some(signing_key().verifying_key()),
        });
        assert!(matches!(store.load(), Err(ArtifactError::Signature(_))));
    }

    #[test]
    fn test_signature_without_key_is_rejected() {
        let (_temp, store) = saved_store();
        sign_dir(store.dir(), &signing_key());
        assert!(matches!(store.load(), Err(ArtifactError::Signature(_))));
    }

    #[test]
    fn test_required_signature_missing() {
        let (_temp, store) = saved_store();
        let store = store.with_policy(SignaturePolicy {
            require_signature: true,
            verifying_key: Some(signing_key().verifying_key()),
        });
        assert!(matches!(store.load(), Err(ArtifactError::MissingSignature)));
    }

    #[test]
    fn test_resave_removes_stale_signature() {
        let (_temp, store) = saved_store();
        sign_dir(store.dir(), &signing_key());
        store.save(&scaler(), &forest()).expect("Should re-save");
        assert!(!store.dir().join(SIGNATURE_FILE).exists());
    }

    #[test]
    fn test_verifying_key_from_b64() {
        let key = signing_key().verifying_key();
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.to_bytes());
        assert_eq!(
            verifying_key_from_b64(&format!("{b64}\n")).expect("Should decode"),
            key
        );
        assert!(verifying_key_from_b64("not base64!").is_err());
        assert!(verifying_key_from_b64("AAAA").is_err());
    }

    #[test]
    fn test_verify_manifest_files() {
        let (_temp, store) = saved_store();
        let path = store.dir().join(MANIFEST_FILE);
        let manifest: ArtifactManifest =
            serde_json::from_slice(&fs::read(&path).expect("read")).expect("parse");
        assert!(verify_manifest_files(store.dir(), &manifest).is_ok());

        fs::write(store.dir().join(SCALER_FILE), b"{}").expect("write");
        assert!(matches!(
            verify_manifest_files(store.dir(), &manifest),
            Err(ArtifactError::HashMismatch(name)) if name == SCALER_FILE
        ));
    }

    #[test]
    fn test_manifest_names_outside_dir_are_rejected() {
        let outer = tempdir().expect("tempdir");
        let inner = outer.path().join("artifacts");
        fs::create_dir(&inner).expect("mkdir");
        let secret = b"not an artifact";
        fs::write(outer.path().join("secret.txt"), secret).expect("write");

        for name in ["../secret.txt", "..\\secret.txt", "/etc/hostname", "..", ""] {
            let manifest = ArtifactManifest {
                version: MANIFEST_VERSION,
                created_at: Utc::now(),
                feature_names: feature_names(),
                scaler_columns: Vec::new(),
                files: BTreeMap::from([(name.to_string(), sha256_hex(secret))]),
            };
            assert!(
                matches!(
                    verify_manifest_files(&inner, &manifest),
                    Err(ArtifactError::UnsafeFileName(_))
                ),
                "{name:?} was accepted"
            );
        }
    }

    #[test]
    fn test_constant_time_eq_str() {
        assert!(constant_time_eq_str("abc", "abc"));
        assert!(!constant_time_eq_str("abc", "abd"));
        assert!(!constant_time_eq_str("abc", "abcd"));
    }
}
