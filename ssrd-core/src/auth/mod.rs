//! Challenge–response mutual authentication.
//!
//! Runs once per connection, before any other traffic is accepted.
//! All three handshake messages are raw transport frames, not
//! field-codec sequences:
//!
//! ```text
//! server ──► client   challenge (256 random bytes)
//! client ──► server   signature over SHA-256(challenge)
//! server ──► client   outcome byte (nonzero = accepted)
//! ```
//!
//! Server progression: AwaitingClient → ChallengeSent → Verifying →
//! Authenticated | Rejected. Client progression: AwaitingChallenge →
//! Signing → AwaitingOutcome → Authenticated | Rejected.
//!
//! This proves possession of a private key matching one of the
//! currently authorized public keys — nothing more. No session key is
//! derived; traffic after the handshake is cleartext on the same
//! connection.

mod identity;
mod keystore;

pub use identity::Identity;
pub use keystore::KeyStore;

use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::error::SsrdError;
use crate::transport::Connection;

/// Size of the random challenge in bytes.
pub const CHALLENGE_SIZE: usize = 256;

const OUTCOME_ACCEPTED: [u8; 1] = [0x01];
const OUTCOME_REJECTED: [u8; 1] = [0x00];

/// A fresh, single-use random challenge. Never persisted; its lifetime
/// is one handshake attempt.
fn fresh_challenge() -> [u8; CHALLENGE_SIZE] {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    OsRng.fill_bytes(&mut challenge);
    challenge
}

/// Server side: challenge the connecting peer and verify its signature
/// against the trust store.
///
/// On rejection an outcome byte of zero is sent before the error is
/// returned; the caller closes this connection and resumes listening.
/// A rejection never terminates the server process.
pub async fn verify_peer<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut Connection<S>,
    keys: &KeyStore,
) -> Result<(), SsrdError> {
    let challenge = fresh_challenge();
    conn.send(Bytes::copy_from_slice(&challenge)).await?;
    debug!("challenge sent");

    let signature = match conn.recv().await? {
        Some(signature) if !signature.is_empty() => signature,
        Some(_) => {
            warn!("peer sent an empty signature");
            conn.send(Bytes::from_static(&OUTCOME_REJECTED)).await?;
            return Err(SsrdError::Authentication("missing signature"));
        }
        None => {
            return Err(SsrdError::Authentication(
                "peer disconnected before signing",
            ));
        }
    };

    debug!("verifying signature ({} bytes)", signature.len());
    let accepted = keys.verify(&challenge, &signature);

    let outcome = if accepted {
        OUTCOME_ACCEPTED
    } else {
        OUTCOME_REJECTED
    };
    conn.send(Bytes::copy_from_slice(&outcome)).await?;

    if accepted {
        info!("peer authenticated");
        Ok(())
    } else {
        Err(SsrdError::Authentication("no authorized key matched"))
    }
}

/// Client side: sign the server's challenge with the local identity
/// and await the outcome byte.
pub async fn prove_possession<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut Connection<S>,
    identity: &Identity,
) -> Result<(), SsrdError> {
    let challenge = conn
        .recv()
        .await?
        .ok_or(SsrdError::Authentication("server closed before challenge"))?;
    debug!("received {}-byte challenge", challenge.len());

    let signature = identity.sign_challenge(&challenge);
    conn.send(Bytes::from(signature)).await?;
    debug!("signature sent");

    let outcome = conn
        .recv()
        .await?
        .ok_or(SsrdError::Authentication("server closed before outcome"))?;

    match outcome.first() {
        Some(&byte) if byte != 0 => {
            info!("authenticated to server");
            Ok(())
        }
        _ => Err(SsrdError::Authentication("rejected by server")),
    }
}

// ── Tests ────────────────────────────────────────────────────────
