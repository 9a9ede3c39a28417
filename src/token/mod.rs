//! ES384 session tokens.
//!
//! A session token is a compact JWT (`header.claims.signature`, base64url)
//! signed with the server's P-384 key. The codec is a pure cryptographic
//! boundary: it signs and verifies claims but holds no session state, and
//! verification deliberately does not check elapsed time. Expiry is enforced
//! against the authoritative session table, so a signed token for a vanished
//! session still verifies and is refused one step later with `403`.

use base64ct::{Base64UrlUnpadded, Encoding};
use p384::ecdsa::{
    signature::{SignatureEncoding, Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed session TTL applied at issuance: 30 minutes, in milliseconds.
pub const TOKEN_TTL_MS: i64 = 1_800_000;

const JWT_ALG: &str = "ES384";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn es384() -> Self {
        Self {
            alg: JWT_ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims embedded in a session token.
///
/// Wire names (`uuid`, `timestamp`, `expires`) are the protocol's; the token
/// carries nothing else, all other session state stays server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Client-chosen opaque identity.
    pub uuid: String,
    /// Issue time, Unix milliseconds.
    #[serde(rename = "timestamp")]
    pub issued_at: i64,
    /// Time-to-live, milliseconds.
    #[serde(rename = "expires")]
    pub ttl_ms: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an ES384 signed session token (JWT).
///
/// # Errors
///
/// Returns an error if the header or claims cannot be encoded as JSON.
pub fn sign_es384(signing_key: &SigningKey, claims: &SessionClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::es384())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an ES384 session token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the header names any algorithm other than `ES384`,
/// - the signature does not verify against the server public key.
pub fn verify_es384(token: &str, verifying_key: &VerifyingKey) -> Result<SessionClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != JWT_ALG {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let sig_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| Error::InvalidSignature)?;

    let signing_input = format!("{header_b64}.{claims_b64}");
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    b64d_json(claims_b64)
}
