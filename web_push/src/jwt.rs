//! Minimal compact JWT signing for the VAPID `t=` token. Only ES256 over
//! the fixed claim set `{aud, exp, sub}` is needed, and the signature must
//! be the JOSE fixed-width `r || s` form rather than ASN.1 DER, so this is
//! built directly on `p256::ecdsa` instead of a general JWT crate.

use base64::engine::general_purpose::GeneralPurpose;
use base64::Engine;
use p256::ecdsa::signature::RandomizedSigner;
use p256::ecdsa::{Signature, SigningKey};
use rand_core::CryptoRngCore;
use serde::Serialize;

use crate::error::{Error, Result};

const HEADER: &[u8] = br#"{"alg":"ES256","typ":"JWT"}"#;

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: u64,
    sub: &'a str,
}

/// Builds and signs `header.payload.signature`. Signing is randomized, so
/// two tokens over identical claims still differ.
pub(crate) fn sign_es256(
    key: &SigningKey,
    rng: &mut impl CryptoRngCore,
    engine: &GeneralPurpose,
    audience: &str,
    subject: &str,
    expires_at: u64,
) -> Result<String> {
    let claims = Claims {
        aud: audience,
        exp: expires_at,
        sub: subject,
    };
    let payload = serde_json::to_vec(&claims).map_err(|err| Error::Encryption(Box::new(err)))?;

    let mut token = String::with_capacity(256);
    token.push_str(&engine.encode(HEADER));
    token.push('.');
    token.push_str(&engine.encode(&payload));

    let signature: Signature = key
        .try_sign_with_rng(rng, token.as_bytes())
        .map_err(|err| Error::Encryption(Box::new(err)))?;
    token.push('.');
    token.push_str(&engine.encode(signature.to_bytes()));

    Ok(token)
}
