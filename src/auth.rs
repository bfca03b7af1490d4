//! # Credentials
//!
//! Credential access for the submission client plus a shared best-effort
//! JWT claims decoder.
//!
//! Tokens are fetched per call, never cached by the client: long-queued
//! entries can outlive a token's validity, and a replayed submission must
//! carry whatever credential is current at retry time.
//!
//! The claims decoder is a pure function of the token string. It never
//! verifies signatures (that is the server's job) and fails closed: any
//! malformed input yields empty claims rather than an error.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

/// Supplies the current authentication credentials for outgoing requests.
///
/// Implemented by the host application's session layer.
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, or `None` when not authenticated
    fn bearer_token(&self) -> Option<String>;

    /// Device-scoped secondary credential, used when the sync target is a
    /// device-scoped endpoint
    fn device_token(&self) -> Option<String> {
        None
    }
}

/// Fixed credentials, mainly useful for tests and simple hosts.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: std::sync::RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: std::sync::RwLock::new(Some(token.into())),
        }
    }

    /// Set the bearer token
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    /// Clear the token (logout)
    pub fn clear_token(&self) {
        self.set_token(None);
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Claims extracted from a bearer token, best effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenClaims {
    /// `sub` claim, if present
    pub subject: Option<String>,
    /// `exp` claim as a UTC timestamp, if present
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenClaims {
    /// Whether the token has expired relative to `now`.
    ///
    /// Tokens without an `exp` claim are treated as unexpired.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp <= now,
            None => false,
        }
    }
}

/// Decode the claims section of a JWT-shaped token.
///
/// Returns empty claims for anything that is not a well-formed
/// `header.payload.signature` token with base64url JSON claims.
pub fn decode_claims(token: &str) -> TokenClaims {
    let Some(payload) = token.split('.').nth(1) else {
        return TokenClaims::default();
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim()) else {
        return TokenClaims::default();
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return TokenClaims::default();
    };

    let subject = value
        .get("sub")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let expires_at = value
        .get("exp")
        .and_then(|v| v.as_i64())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    TokenClaims { subject, expires_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_decode_valid_claims() {
        let token = make_token(&serde_json::json!({
            "sub": "operator-7",
            "exp": 1735689600i64, // 2025-01-01T00:00:00Z
        }));
        let claims = decode_claims(&token);
        assert_eq!(claims.subject.as_deref(), Some("operator-7"));
        assert_eq!(
            claims.expires_at,
            DateTime::from_timestamp(1735689600, 0)
        );
    }

    #[test]
    fn test_decode_fails_closed_on_garbage() {
        assert_eq!(decode_claims(""), TokenClaims::default());
        assert_eq!(decode_claims("not a token"), TokenClaims::default());
        assert_eq!(decode_claims("a.%%%.c"), TokenClaims::default());

        // Valid base64 but not JSON
        let bogus = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"));
        assert_eq!(decode_claims(&bogus), TokenClaims::default());
    }

    #[test]
    fn test_expired_at() {
        let token = make_token(&serde_json::json!({ "exp": 1000i64 }));
        let claims = decode_claims(&token);
        assert!(claims.expired_at(Utc::now()));

        // No exp claim: treated as unexpired
        let claims = decode_claims(&make_token(&serde_json::json!({ "sub": "x" })));
        assert!(!claims.expired_at(Utc::now()));
    }

    #[test]
    fn test_static_credentials() {
        let creds = StaticCredentials::new("token-1");
        assert_eq!(creds.bearer_token().as_deref(), Some("token-1"));

        creds.set_token(Some("token-2".to_string()));
        assert_eq!(creds.bearer_token().as_deref(), Some("token-2"));

        creds.clear_token();
        assert!(creds.bearer_token().is_none());
    }
}
