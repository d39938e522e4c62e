//! Bearer token codec. A token names a user id and an expiry and is signed
//! with a shared HMAC secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Failed to encode token: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id, rendered as a string per RFC 7519.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, JwtError> {
        self.sub
            .parse()
            .map_err(|_| JwtError::Invalid(format!("subject is not a user id: {}", self.sub)))
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "sub"].into_iter().map(String::from).collect();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|err| JwtError::Encode(err.to_string()))
    }

    /// Verifies the signature and expiry and returns the user id it names.
    pub fn verify_user_id(&self, token: &str) -> Result<i64, JwtError> {
        self.verify(token)?.user_id()
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(JwtError::Expired),
                _ => Err(JwtError::Invalid(err.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn issued_token_verifies_to_same_user() {
        let codec = TokenCodec::new(SECRET, Duration::days(7));
        let token = codec.issue(42).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new(SECRET, Duration::days(7));
        let now = Utc::now().timestamp();
        let token = codec
            .encode(&Claims {
                sub: "1".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(codec.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = TokenCodec::new(b"other-secret", Duration::hours(1));
        let verifier = TokenCodec::new(SECRET, Duration::hours(1));
        let token = issuer.issue(7).unwrap();
        assert!(matches!(verifier.verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let codec = TokenCodec::new(SECRET, Duration::hours(1));
        let now = Utc::now().timestamp();
        let token = codec
            .encode(&Claims {
                sub: "admin".to_string(),
                iat: now,
                exp: now + 600,
            })
            .unwrap();
        assert!(matches!(
            codec.verify_user_id(&token),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = TokenCodec::new(SECRET, Duration::hours(1));
        assert!(matches!(
            codec.verify("not-a-token"),
            Err(JwtError::Invalid(_))
        ));
    }
}
