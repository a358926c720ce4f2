//! Server-side trust store: a directory of authorized public keys.

use std::path::PathBuf;

use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// The set of public keys a server accepts signatures from.
///
/// The directory is re-enumerated on every handshake attempt rather
/// than cached, so revoking a peer is deleting its `.pem` file — no
/// restart, no cache invalidation. Files added or removed while an
/// enumeration is in flight are picked up best-effort on the next one.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The trust-store directory.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Enumerate the currently authorized keys.
    ///
    /// Unreadable or malformed entries are skipped with a warning; a
    /// missing directory yields the empty set (which rejects everyone).
    pub fn authorized_keys(&self) -> Vec<VerifyingKey> {
        let mut keys = Vec::new();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot read trust store {}: {e}", self.dir.display());
                return keys;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "pem") {
                continue;
            }

            let pem = match std::fs::read_to_string(&path) {
                Ok(pem) => pem,
                Err(e) => {
                    warn!("skipping unreadable key {}: {e}", path.display());
                    continue;
                }
            };

            match VerifyingKey::from_public_key_pem(&pem) {
                Ok(key) => keys.push(key),
                Err(e) => warn!("skipping malformed key {}: {e}", path.display()),
            }
        }

        debug!("trust store holds {} key(s)", keys.len());
        keys
    }

    /// Check a signature over the SHA-256 digest of `challenge`
    /// against every currently authorized key, until the first match
    /// or exhaustion.
    pub fn verify(&self, challenge: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };

        let digest = Sha256::digest(challenge);
        self.authorized_keys()
            .iter()
            .any(|key| key.verify(&digest, &signature).is_ok())
    }
}
