use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{role::Role, session::Principal};

/// Lifetime of every issued token.
pub const TOKEN_TTL_HOURS: i64 = 24;
/// The `iss` claim written into, and required from, every token.
pub const ISSUER: &str = "blog-backend";

/// Errors produced by the token codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Empty, malformed, forged, or signed with another key or algorithm.
    #[error("invalid token")]
    InvalidToken,
    /// The signature is fine but `exp` has passed.
    #[error("token has expired")]
    ExpiredToken,
    /// The codec was built without a secret.
    #[error("JWT_SECRET environment variable not set")]
    MissingSigningSecret,
    /// Encoding failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// The signed identity claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id, as a decimal string.
    pub sub: String,
    pub role: Role,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds. Always `iat + 24h`.
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn subject_id(&self) -> Result<i32, TokenError> {
        self.sub.parse().map_err(|_| TokenError::InvalidToken)
    }

    pub fn principal(&self) -> Result<Principal, TokenError> {
        Ok(Principal {
            subject_id: self.subject_id()?,
            role: self.role,
        })
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// HS256 signer and verifier for [`Claims`].
///
/// Only HS256 is accepted on the way in: tokens carrying `none`, an RSA/EC
/// algorithm, or another HMAC width are rejected before the signature is
/// even looked at.
#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<CodecInner>,
}

struct CodecInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Builds a codec from the server secret.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSigningSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an injectable clock in `verify_at`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            inner: Arc::new(CodecInner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
            }),
        })
    }

    /// Signs a claim for `subject_id` valid for the next 24 hours.
    pub fn issue(&self, subject_id: i32, role: Role) -> Result<String, TokenError> {
        self.issue_at(subject_id, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject_id: i32,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Checks signature, algorithm, issuer and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::InvalidToken);
        }

        let data = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                TokenError::InvalidToken
            })?;
        let claims = data.claims;

        if claims.exp - claims.iat != Duration::hours(TOKEN_TTL_HOURS).num_seconds() {
            return Err(TokenError::InvalidToken);
        }
        claims.subject_id()?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::ExpiredToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).unwrap()
    }

    #[test]
    fn issued_token_verifies_and_recovers_identity() {
        let codec = codec();
        for role in Role::ALL {
            let token = codec.issue(42, role).unwrap();
            let claims = codec.verify(&token).unwrap();
            assert_eq!(claims.subject_id().unwrap(), 42);
            assert_eq!(claims.role, role);
            assert_eq!(claims.iss, ISSUER);
            assert_eq!(claims.exp - claims.iat, 24 * 3600);
        }
    }

    #[test]
    fn any_single_bit_flip_is_rejected() {
        let codec = codec();
        let token = codec.issue(1, Role::Admin).unwrap();
        let bytes = token.as_bytes();

        for index in 0..bytes.len() {
            // Bits 0..7 keep the byte ASCII, so the result is still a &str.
            for bit in 0..7 {
                let mut tampered = bytes.to_vec();
                tampered[index] ^= 1 << bit;
                let tampered = String::from_utf8(tampered).unwrap();
                assert_eq!(
                    codec.verify(&tampered),
                    Err(TokenError::InvalidToken),
                    "flip of bit {} at byte {} was accepted",
                    bit,
                    index
                );
            }
        }
    }

    #[test]
    fn expires_exactly_at_ttl() {
        let codec = codec();
        let issued = Utc::now();
        let token = codec.issue_at(5, Role::NonPrivileged, issued).unwrap();

        let just_before = issued + Duration::hours(24) - Duration::seconds(1);
        assert!(codec.verify_at(&token, just_before).is_ok());

        let at_expiry = issued + Duration::hours(24);
        assert_eq!(codec.verify_at(&token, at_expiry), Err(TokenError::ExpiredToken));
        assert_eq!(
            codec.verify_at(&token, at_expiry + Duration::days(3)),
            Err(TokenError::ExpiredToken)
        );
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = TokenCodec::new(b"some-other-secret")
            .unwrap()
            .issue(3, Role::Admin)
            .unwrap();
        assert_eq!(codec().verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let codec = codec();
        let genuine = codec.issue(3, Role::Admin).unwrap();
        let payload = genuine.split('.').nth(1).unwrap();

        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let unsigned = format!("{}.{}.", none_header, payload);
        assert_eq!(codec.verify(&unsigned), Err(TokenError::InvalidToken));

        let claims = codec.verify(&genuine).unwrap();
        let hs384 = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(codec.verify(&hs384), Err(TokenError::InvalidToken));
    }

    #[test]
    fn empty_and_garbage_tokens_are_invalid() {
        let codec = codec();
        assert_eq!(codec.verify(""), Err(TokenError::InvalidToken));
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::InvalidToken));
        assert_eq!(codec.verify("a.b.c"), Err(TokenError::InvalidToken));
    }

    #[test]
    fn missing_secret_is_reported() {
        assert!(matches!(
            TokenCodec::new(b""),
            Err(TokenError::MissingSigningSecret)
        ));
    }
}
