use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;

use crate::line::error::CredentialError;

/// Private key and its `kid`, as resolved from the secret provider.
#[derive(Clone)]
pub struct SigningMaterial {
    pub key: EncodingKey,
    pub key_id: String,
}

/// RSA private key in JWK form, as generated by the LINE Developers console tooling.
#[derive(Debug, Deserialize)]
struct RsaPrivateJwk {
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    d: String,
    p: Option<String>,
    q: Option<String>,
}

/// Accepts a JWK JSON object or a PEM (PKCS#1 / PKCS#8) RSA private key.
pub fn encoding_key_from_secret(secret: &str) -> Result<EncodingKey, CredentialError> {
    let secret = secret.trim();
    if secret.starts_with('{') {
        let jwk: RsaPrivateJwk = serde_json::from_str(secret)
            .map_err(|e| CredentialError::SigningError(format!("invalid JWK: {}", e)))?;
        return encoding_key_from_jwk(&jwk);
    }
    EncodingKey::from_rsa_pem(secret.as_bytes())
        .map_err(|e| CredentialError::SigningError(format!("invalid PEM key: {}", e)))
}

fn encoding_key_from_jwk(jwk: &RsaPrivateJwk) -> Result<EncodingKey, CredentialError> {
    if jwk.kty != "RSA" {
        return Err(CredentialError::SigningError(format!("unsupported key type '{}'", jwk.kty)));
    }
    if let Some(alg) = jwk.alg.as_deref().filter(|alg| *alg != "RS256") {
        return Err(CredentialError::SigningError(format!("unsupported algorithm '{}'", alg)));
    }

    let mut primes = Vec::with_capacity(2);
    if let (Some(p), Some(q)) = (&jwk.p, &jwk.q) {
        primes.push(jwk_uint("p", p)?);
        primes.push(jwk_uint("q", q)?);
    }
    let key = RsaPrivateKey::from_components(
        jwk_uint("n", &jwk.n)?,
        jwk_uint("e", &jwk.e)?,
        jwk_uint("d", &jwk.d)?,
        primes,
    )
    .and_then(|key| key.validate().map(|_| key))
    .map_err(|e| CredentialError::SigningError(format!("invalid RSA key: {}", e)))?;

    let der = key
        .to_pkcs1_der()
        .map_err(|e| CredentialError::SigningError(format!("encode RSA key: {}", e)))?;
    Ok(EncodingKey::from_rsa_der(der.as_bytes()))
}

fn jwk_uint(field: &str, value: &str) -> Result<BigUint, CredentialError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map(|bytes| BigUint::from_bytes_be(&bytes))
        .map_err(|e| CredentialError::SigningError(format!("JWK field '{}': {}", field, e)))
}
