//! Handshake credentials for the backend socket.
//!
//! Each connection attempt presents two headers: `Timestamp`, the current
//! Unix time in seconds, and `Authorization`, the hex HMAC-SHA256 of that
//! timestamp keyed with the shared application secret. Credentials are
//! derived fresh for every attempt so a reconnect never replays an old
//! timestamp.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const TIMESTAMP_HEADER: &str = "Timestamp";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("shared secret is not usable as an HMAC key")]
    Key,
    #[error("timestamp {0:?} is not a Unix time in seconds")]
    BadTimestamp(String),
    #[error("timestamp is {skew_secs}s away from now")]
    Expired { skew_secs: i64 },
    #[error("authorization hash does not match")]
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub authorization: String,
    pub timestamp: String,
}

impl Credentials {
    pub fn derive(secret: &str, now: DateTime<Utc>) -> Result<Self, CredentialError> {
        let timestamp = now.timestamp().to_string();
        let authorization = hex::encode(keyed_hash(secret, &timestamp)?);
        Ok(Self {
            authorization,
            timestamp,
        })
    }

    /// The handshake headers, in the order they are sent.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (AUTHORIZATION_HEADER, self.authorization.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
        ]
    }
}

fn mac_for(secret: &str, timestamp: &str) -> Result<HmacSha256, CredentialError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| CredentialError::Key)?;
    mac.update(timestamp.as_bytes());
    Ok(mac)
}

fn keyed_hash(secret: &str, timestamp: &str) -> Result<Vec<u8>, CredentialError> {
    Ok(mac_for(secret, timestamp)?.finalize().into_bytes().to_vec())
}

/// Check a presented header pair the way the backend does: the timestamp
/// must be within `max_skew_secs` of `now` and the hash must match.
pub fn verify(
    secret: &str,
    authorization: &str,
    timestamp: &str,
    now: DateTime<Utc>,
    max_skew_secs: i64,
) -> Result<(), CredentialError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| CredentialError::BadTimestamp(timestamp.to_string()))?;

    let skew_secs = now.timestamp() - ts;
    if skew_secs.abs() > max_skew_secs {
        return Err(CredentialError::Expired { skew_secs });
    }

    let presented = hex::decode(authorization).map_err(|_| CredentialError::Mismatch)?;
    // verify_slice compares in constant time
    mac_for(secret, timestamp)?
        .verify_slice(&presented)
        .map_err(|_| CredentialError::Mismatch)
}
