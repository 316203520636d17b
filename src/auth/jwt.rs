//! JWT signature and claim validation.

use crate::auth::claims::{Claims, Identity};
use crate::config::{AuthConfig, JwtKeySource};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Token is invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("Token header has no key id")]
    MissingKeyId,
    #[error("No signing key with id '{0}'")]
    UnknownKeyId(String),
    #[error("Invalid verification key: {0}")]
    InvalidKey(String),
    #[error("Failed to fetch JWKS: {0}")]
    Jwks(String),
}

enum Keys {
    Single(DecodingKey),
    ByKeyId(HashMap<String, DecodingKey>),
}

/// Validates bearer tokens against the configured issuer and audience.
///
/// Expiry and not-before are enforced with 30 seconds of clock skew tolerance.
pub struct JwtValidator {
    keys: Keys,
    validation: Validation,
    client_id: String,
}

impl JwtValidator {
    fn validation(algorithm: Algorithm, issuer: &str, audience: &str) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 30;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation
    }

    /// Create validator with HS256 (symmetric secret)
    pub fn with_hs256(secret: &[u8], issuer: &str, audience: &str, client_id: &str) -> Self {
        Self {
            keys: Keys::Single(DecodingKey::from_secret(secret)),
            validation: Self::validation(Algorithm::HS256, issuer, audience),
            client_id: client_id.to_string(),
        }
    }

    /// Create validator with RS256 (asymmetric public key)
    pub fn with_rs256_pem(
        public_key_pem: &str,
        issuer: &str,
        audience: &str,
        client_id: &str,
    ) -> Result<Self, JwtError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

        Ok(Self {
            keys: Keys::Single(key),
            validation: Self::validation(Algorithm::RS256, issuer, audience),
            client_id: client_id.to_string(),
        })
    }

    /// Create validator from a JWKS document; tokens pick their key by `kid`.
    pub fn with_jwks(
        jwks: &JwkSet,
        issuer: &str,
        audience: &str,
        client_id: &str,
    ) -> Result<Self, JwtError> {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => tracing::warn!(kid, error = %e, "Skipping unusable JWK"),
            }
        }

        if keys.is_empty() {
            return Err(JwtError::Jwks("no usable keys in JWKS".to_string()));
        }

        Ok(Self {
            keys: Keys::ByKeyId(keys),
            validation: Self::validation(Algorithm::RS256, issuer, audience),
            client_id: client_id.to_string(),
        })
    }

    /// Builds the validator for the configured key source, fetching the JWKS if needed.
    pub async fn from_config(auth: &AuthConfig) -> Result<Self, JwtError> {
        let source = auth
            .key_source()
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;

        match source {
            JwtKeySource::Secret(secret) => Ok(Self::with_hs256(
                secret.as_bytes(),
                &auth.issuer,
                &auth.audience,
                &auth.client_id,
            )),
            JwtKeySource::PublicKeyPem(pem) => {
                Self::with_rs256_pem(&pem, &auth.issuer, &auth.audience, &auth.client_id)
            }
            JwtKeySource::Jwks(url) => {
                let jwks = fetch_jwks(&url).await?;
                tracing::info!(keys = jwks.keys.len(), "Loaded JWKS from {}", url);
                Self::with_jwks(&jwks, &auth.issuer, &auth.audience, &auth.client_id)
            }
        }
    }

    /// Validates a token and returns the caller's identity.
    pub fn validate(&self, token: &str) -> Result<Identity, JwtError> {
        let key = match &self.keys {
            Keys::Single(key) => key,
            Keys::ByKeyId(keys) => {
                let header = decode_header(token)?;
                let kid = header.kid.ok_or(JwtError::MissingKeyId)?;
                keys.get(&kid).ok_or(JwtError::UnknownKeyId(kid))?
            }
        };

        let data = decode::<Claims>(token, key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e),
        })?;

        Ok(data.claims.into_identity(&self.client_id))
    }
}

async fn fetch_jwks(url: &str) -> Result<JwkSet, JwtError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| JwtError::Jwks(e.to_string()))?;

    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| JwtError::Jwks(e.to_string()))?
        .json::<JwkSet>()
        .await
        .map_err(|e| JwtError::Jwks(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &[u8] = b"unit-test-secret";
    const ISSUER: &str = "http://idp/realms/dev-habit";
    const AUDIENCE: &str = "dev-habit-api";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn token(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn validator() -> JwtValidator {
        JwtValidator::with_hs256(SECRET, ISSUER, AUDIENCE, "public-client")
    }

    #[test]
    fn test_valid_token() {
        let t = token(json!({
            "sub": "kc-1", "exp": now() + 600, "iss": ISSUER, "aud": AUDIENCE,
            "email": "a@b.c", "realm_access": { "roles": ["member"] }
        }));

        let identity = validator().validate(&t).unwrap();
        assert_eq!(identity.subject, "kc-1");
        assert!(identity.has_role("member"));
    }

    #[test]
    fn test_expired_token() {
        let t = token(json!({ "sub": "kc-1", "exp": now() - 3600, "iss": ISSUER, "aud": AUDIENCE }));
        assert!(matches!(validator().validate(&t), Err(JwtError::Expired)));
    }

    #[test]
    fn test_leeway_accepts_recently_expired() {
        let t = token(json!({ "sub": "kc-1", "exp": now() - 5, "iss": ISSUER, "aud": AUDIENCE }));
        assert!(validator().validate(&t).is_ok());
    }

    #[test]
    fn test_wrong_issuer_or_audience() {
        let t = token(json!({ "sub": "kc-1", "exp": now() + 600, "iss": "http://evil", "aud": AUDIENCE }));
        assert!(validator().validate(&t).is_err());

        let t = token(json!({ "sub": "kc-1", "exp": now() + 600, "iss": ISSUER, "aud": "other" }));
        assert!(validator().validate(&t).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let t = encode(
            &Header::default(),
            &json!({ "sub": "kc-1", "exp": now() + 600, "iss": ISSUER, "aud": AUDIENCE }),
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();
        assert!(validator().validate(&t).is_err());
    }

    #[test]
    fn test_garbage_token() {
        assert!(validator().validate("not.a.jwt").is_err());
    }

    #[test]
    fn test_jwks_without_usable_keys() {
        let jwks: JwkSet = serde_json::from_value(json!({ "keys": [] })).unwrap();
        assert!(JwtValidator::with_jwks(&jwks, ISSUER, AUDIENCE, "public-client").is_err());
    }
}
