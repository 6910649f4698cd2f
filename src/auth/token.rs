use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::config::AuthConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

/// Signs and validates access tokens with the process-wide secret.
/// Built once at startup from config; never re-reads the environment.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> anyhow::Result<Self> {
        let algorithm = config
            .algorithm
            .parse::<Algorithm>()
            .map_err(|e| anyhow::anyhow!("unsupported signing algorithm {:?}: {e}", config.algorithm))?;
        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
            algorithm,
            access_ttl: Duration::minutes(config.access_ttl_minutes),
        })
    }

    /// Issue a token for `subject` with the configured default TTL.
    pub fn issue(&self, subject: &str) -> anyhow::Result<String> {
        self.issue_with_ttl(subject, self.access_ttl)
    }

    pub fn issue_with_ttl(&self, subject: &str, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(subject = %subject, "token signed");
        Ok(token)
    }

    /// Validate a token and return its subject. Expiry is checked with zero
    /// leeway so a stale token is reported as `Expired`, not `Invalid`.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(subject = %data.claims.sub, "token verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            secret_key: secret.into(),
            algorithm: "HS256".into(),
            access_ttl_minutes: 30,
        })
        .expect("issuer should construct")
    }

    #[test]
    fn issue_and_validate_roundtrip() {
        let issuer = make_issuer("dev-secret");
        let token = issuer.issue("alice@x.com").expect("issue");
        let subject = issuer.validate(&token).expect("validate");
        assert_eq!(subject, "alice@x.com");
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let issuer = make_issuer("dev-secret");
        let token = issuer
            .issue_with_ttl("alice@x.com", Duration::seconds(-1))
            .expect("issue");
        assert_eq!(issuer.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let issuer = make_issuer("dev-secret");
        let token = issuer.issue("alice@x.com").expect("issue");
        let mut tampered = token.clone();
        // flip the last character of the signature segment
        let last = tampered.pop().expect("token is non-empty");
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        assert_eq!(issuer.validate(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn token_from_another_secret_is_invalid() {
        let issuer = make_issuer("dev-secret");
        let other = make_issuer("other-secret");
        let token = other.issue("alice@x.com").expect("issue");
        assert_eq!(issuer.validate(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn unsupported_algorithm_is_rejected_at_startup() {
        let err = TokenIssuer::new(&AuthConfig {
            secret_key: "dev-secret".into(),
            algorithm: "NOT-AN-ALG".into(),
            access_ttl_minutes: 30,
        })
        .unwrap_err();
        assert!(err.to_string().contains("unsupported signing algorithm"));
    }
}
