// src/core/cluster/token.rs

//! Minting and verification of the cluster-scoped hop credential.
//!
//! Operator auth token *format* and verification are explicitly out of
//! scope; this module only covers the cross-node credential the router
//! mints for a forwarded call, so a receiving node can tell the hop came
//! from a trusted peer rather than re-deriving the caller's own session.
//! It is HMAC-SHA256 signed with a cluster-wide shared secret distributed
//! at join time and deliberately not a JWT: there is no header, no
//! algorithm negotiation, just `payload_b64.sig_b64`.

use crate::core::errors::FleetError;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TTL_SECS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClusterTokenClaims {
    /// The node that minted the token (issuer).
    iss: Uuid,
    /// The node the token is scoped to use at (audience); empty means "any peer".
    aud: String,
    /// The original caller identity, carried opaquely — never the caller's
    /// own session token.
    sub: String,
    exp: i64,
}

pub struct ClusterTokenIssuer {
    secret: Vec<u8>,
    node_uuid: Uuid,
}

impl ClusterTokenIssuer {
    pub fn new(secret: Vec<u8>, node_uuid: Uuid) -> Self {
        Self { secret, node_uuid }
    }

    pub fn mint(&self, caller_identity: &str, audience: &str) -> FleetResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| FleetError::Internal(e.to_string()))?
            .as_secs() as i64;
        let claims = ClusterTokenClaims {
            iss: self.node_uuid,
            aud: audience.to_string(),
            sub: caller_identity.to_string(),
            exp: now + DEFAULT_TTL_SECS,
        };
        let payload = serde_json::to_vec(&claims)?;
        let payload_b64 = base64_encode(&payload);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| FleetError::Internal(format!("bad cluster secret: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let sig = mac.finalize().into_bytes();
        let sig_b64 = base64_encode(&sig);

        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    pub fn verify(&self, token: &str) -> FleetResult<String> {
        let (payload_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| FleetError::PermissionDenied("malformed cluster token".into()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| FleetError::Internal(format!("bad cluster secret: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let expected_sig = mac.finalize().into_bytes();
        let expected_sig_b64 = base64_encode(&expected_sig);

        if !constant_time_eq(expected_sig_b64.as_bytes(), sig_b64.as_bytes()) {
            return Err(FleetError::PermissionDenied("cluster token signature mismatch".into()));
        }

        let payload = base64_decode(payload_b64)
            .ok_or_else(|| FleetError::PermissionDenied("malformed cluster token payload".into()))?;
        let claims: ClusterTokenClaims = serde_json::from_slice(&payload)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| FleetError::Internal(e.to_string()))?
            .as_secs() as i64;
        if claims.exp < now {
            return Err(FleetError::PermissionDenied("cluster token expired".into()));
        }

        Ok(claims.sub)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Minimal base64url (no padding) so the token stays header-safe without
// pulling in the `base64` crate for two functions.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
        let n = ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32);
        out.push(ALPHABET[(n >> 18 & 0x3f) as usize] as char);
        out.push(ALPHABET[(n >> 12 & 0x3f) as usize] as char);
        if chunk.len() > 1 {
            out.push(ALPHABET[(n >> 6 & 0x3f) as usize] as char);
        }
        if chunk.len() > 2 {
            out.push(ALPHABET[(n & 0x3f) as usize] as char);
        }
    }
    out
}

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    let rev = |c: u8| ALPHABET.iter().position(|&a| a == c).map(|p| p as u32);
    let mut out = Vec::with_capacity(s.len() * 3 / 4);
    let chars: Vec<u8> = s.bytes().collect();
    for chunk in chars.chunks(4) {
        let vals: Vec<u32> = chunk.iter().map(|&c| rev(c)).collect::<Option<Vec<_>>>()?;
        let n = vals.iter().enumerate().fold(0u32, |acc, (i, v)| acc | (v << (18 - 6 * i)));
        out.push((n >> 16) as u8);
        if vals.len() > 2 {
            out.push((n >> 8) as u8);
        }
        if vals.len() > 3 {
            out.push(n as u8);
        }
    }
    Some(out)
}

use crate::core::errors::FleetResult;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_then_verify_roundtrips_caller_identity() {
        let issuer = ClusterTokenIssuer::new(b"shared-secret".to_vec(), Uuid::new_v4());
        let token = issuer.mint("user:alice", "node-b").unwrap();
        let sub = issuer.verify(&token).unwrap();
        assert_eq!(sub, "user:alice");
    }

    #[test]
    fn tampered_token_fails_verification() {
        let issuer = ClusterTokenIssuer::new(b"shared-secret".to_vec(), Uuid::new_v4());
        let mut token = issuer.mint("user:alice", "node-b").unwrap();
        token.push('x');
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let issuer_a = ClusterTokenIssuer::new(b"secret-a".to_vec(), Uuid::new_v4());
        let issuer_b = ClusterTokenIssuer::new(b"secret-b".to_vec(), Uuid::new_v4());
        let token = issuer_a.mint("user:alice", "node-b").unwrap();
        assert!(issuer_b.verify(&token).is_err());
    }
}
