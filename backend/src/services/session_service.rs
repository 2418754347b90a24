//! Session resolution.
//!
//! Session issuance lives with the identity provider; this side only turns
//! an inbound request into `{user_id, role}` or nothing.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Identity attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    /// Role as carried by the token. Parsed by the gate so unknown values
    /// can be denied rather than rejected as malformed.
    pub role: String,
    pub attributes: Map<String, Value>,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the caller. `Ok(None)` means anonymous; `Err` means the
    /// credentials were present but invalid.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>>;
}

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Extra attributes for conditional permissions
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}

/// HS256 bearer token sessions.
pub struct JwtSessionProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionProvider {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `user_id`. Used by tooling and tests; production
    /// tokens come from the identity provider.
    pub fn issue(
        &self,
        user_id: &str,
        role: &str,
        attrs: Map<String, Value>,
        ttl_secs: i64,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + ttl_secs,
            attrs,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    pub fn validate(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Pull a bearer token from the Authorization header.
///
/// `Ok(None)` when the header is absent; an error when it is present but
/// not a bearer credential.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed Authorization header".into()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::Unauthorized(
            "Authorization header must use the Bearer scheme".into(),
        )),
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        let Some(token) = extract_bearer_token(headers)? else {
            return Ok(None);
        };
        let claims = self.validate(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;
        Ok(Some(Session {
            user_id: claims.sub,
            role: claims.role,
            attributes: claims.attrs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_resolve_valid_token() {
        let provider = JwtSessionProvider::new("test-secret");
        let mut attrs = Map::new();
        attrs.insert("verified".into(), Value::Bool(true));
        let token = provider.issue("user-1", "DEVELOPER", attrs, 300).unwrap();

        let session = provider
            .resolve(&headers_with(&format!("Bearer {}", token)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.role, "DEVELOPER");
        assert_eq!(session.attributes.get("verified"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_resolve_without_header_is_anonymous() {
        let provider = JwtSessionProvider::new("test-secret");
        assert!(provider.resolve(&HeaderMap::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_rejects_wrong_secret() {
        let issuer = JwtSessionProvider::new("secret-a");
        let verifier = JwtSessionProvider::new("secret-b");
        let token = issuer.issue("u", "PLAYER", Map::new(), 300).unwrap();

        let err = verifier
            .resolve(&headers_with(&format!("Bearer {}", token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_resolve_rejects_expired_token() {
        let provider = JwtSessionProvider::new("test-secret");
        let token = provider.issue("u", "PLAYER", Map::new(), -60).unwrap();
        let result = provider
            .resolve(&headers_with(&format!("Bearer {}", token)))
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer abc")).unwrap(),
            Some("abc")
        );
        assert!(extract_bearer_token(&HeaderMap::new()).unwrap().is_none());
        assert!(extract_bearer_token(&headers_with("Basic dXNlcjpwYXNz")).is_err());
        assert!(extract_bearer_token(&headers_with("Bearer ")).is_err());
    }
}
