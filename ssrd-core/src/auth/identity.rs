//! Client-side signing identity.

use std::path::Path;

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::SsrdError;

/// An Ed25519 signing identity loaded from a PKCS#8 PEM file.
///
/// Proves possession of the private key during the handshake; the key
/// itself never leaves this process.
pub struct Identity {
    key: SigningKey,
}

impl Identity {
    /// Load the private key from a PKCS#8 PEM file.
    pub fn from_pem_file(path: &Path) -> Result<Self, SsrdError> {
        let pem = std::fs::read_to_string(path).map_err(|e| SsrdError::Key {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let key = SigningKey::from_pkcs8_pem(&pem).map_err(|e| SsrdError::Key {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { key })
    }

    /// Wrap an in-memory signing key.
    pub fn from_signing_key(key: SigningKey) -> Self {
        Self { key }
    }

    /// Sign the SHA-256 digest of a received challenge.
    pub fn sign_challenge(&self, challenge: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(challenge);
        self.key.sign(&digest).to_bytes().to_vec()
    }

    /// The public half of this identity.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never prints key material.
        f.debug_struct("Identity")
            .field("public", &self.key.verifying_key())
            .finish()
    }
}
