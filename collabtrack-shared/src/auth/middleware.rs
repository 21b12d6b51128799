/// Request authentication
///
/// Every authenticated request carries `Authorization: Bearer <access token>`.
/// The token is validated here and turned into an [`AuthContext`], which the API
/// stores in the request extensions for handlers to pick up with
/// `Extension<AuthContext>`.
///
/// Verification state travels in the token, so unverified users can be turned
/// away without a database round trip.
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap};
/// use collabtrack_shared::auth::middleware::{authenticate, AuthError};
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
///
/// assert_eq!(authenticate(&headers, "secret"), Err(AuthError::InvalidFormat));
/// ```

use axum::http::{header, HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            email_verified: claims.email_verified,
        }
    }
}

/// Authentication failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("Expected Bearer token")]
    InvalidFormat,

    #[error("{0}")]
    InvalidToken(String),

    #[error("Please verify your email address to continue.")]
    Unverified,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::Unverified => StatusCode::FORBIDDEN,
        }
    }
}

/// Bearer token from the `Authorization` header, if there is one
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or(AuthError::InvalidFormat)
}

/// Validates the bearer token in `headers`
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?.ok_or(AuthError::MissingCredentials)?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    Ok(AuthContext::from_claims(&claims))
}

/// Like [`authenticate`], but a missing, malformed or invalid token is `None`
pub fn authenticate_optional(headers: &HeaderMap, secret: &str) -> Option<AuthContext> {
    match authenticate(headers, secret) {
        Ok(auth) => Some(auth),
        Err(AuthError::MissingCredentials) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unusable bearer token");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, TokenType};
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()), Ok(None));
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Ok(Some("abc")));
        assert_eq!(
            bearer_token(&headers_with("Basic abc")),
            Err(AuthError::InvalidFormat)
        );
    }

    #[test]
    fn test_authenticate_valid_token() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "ada@example.com", true, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        let auth = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.email, "ada@example.com");
        assert!(auth.email_verified);
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let claims = Claims::new(Uuid::new_v4(), "a@b.io", true, TokenType::Refresh);
        let token = create_token(&claims, SECRET).unwrap();

        let result = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_authenticate_optional_treats_garbage_as_absent() {
        assert!(authenticate_optional(&HeaderMap::new(), SECRET).is_none());
        assert!(authenticate_optional(&headers_with("Bearer nope"), SECRET).is_none());
        assert!(authenticate_optional(&headers_with("Token nope"), SECRET).is_none());
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(AuthError::MissingCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidFormat.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Unverified.status(), StatusCode::FORBIDDEN);
    }
}
