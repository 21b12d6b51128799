/// One-time tokens for email verification and password reset
///
/// Only the SHA-256 hash of a token is stored. The plaintext goes out once, in
/// the email link, and is hashed again when it comes back.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE auth_token_purpose AS ENUM ('email_verification', 'password_reset');
///
/// CREATE TABLE auth_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     purpose auth_token_purpose NOT NULL,
///     token_hash CHAR(64) NOT NULL UNIQUE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     consumed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::token::{generate_token, hash_token};

/// What a one-time token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_token_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    /// How long a freshly issued token stays valid
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenPurpose::EmailVerification => Duration::hours(24),
            TokenPurpose::PasswordReset => Duration::hours(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,

    /// SHA-256 hex of the plaintext token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    /// Issues a new token and returns it with its plaintext
    ///
    /// Outstanding tokens of the same purpose for the user are consumed first,
    /// so only the newest link works.
    pub async fn issue(
        pool: &PgPool,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<(Self, String), sqlx::Error> {
        let (plaintext, token_hash) = generate_token();
        let expires_at = Utc::now() + purpose.lifetime();

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE auth_tokens SET consumed_at = NOW()
            WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .execute(&mut *tx)
        .await?;

        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (user_id, purpose, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, purpose, token_hash, expires_at, consumed_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((token, plaintext))
    }

    /// Marks a token used and returns its user
    ///
    /// Returns None if the token is unknown, already used, expired or was issued
    /// for another purpose. Two concurrent calls cannot both succeed.
    pub async fn consume(
        pool: &PgPool,
        plaintext: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE auth_tokens SET consumed_at = NOW()
            WHERE token_hash = $1
              AND purpose = $2
              AND consumed_at IS NULL
              AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(hash_token(plaintext.trim()))
        .bind(purpose)
        .fetch_optional(pool)
        .await?;

        Ok(user_id)
    }

    pub fn is_valid(&self) -> bool {
        self.consumed_at.is_none() && self.expires_at > Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifetimes() {
        assert_eq!(TokenPurpose::EmailVerification.lifetime(), Duration::hours(24));
        assert_eq!(TokenPurpose::PasswordReset.lifetime(), Duration::hours(1));
    }

    #[test]
    fn test_is_valid() {
        let mut token = AuthToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            purpose: TokenPurpose::PasswordReset,
            token_hash: hash_token("secret"),
            expires_at: Utc::now() + Duration::minutes(5),
            consumed_at: None,
            created_at: Utc::now(),
        };
        assert!(token.is_valid());

        token.consumed_at = Some(Utc::now());
        assert!(!token.is_valid());

        token.consumed_at = None;
        token.expires_at = Utc::now() - Duration::seconds(1);
        assert!(!token.is_valid());
    }

    #[test]
    fn test_purpose_serialization() {
        let json = serde_json::to_string(&TokenPurpose::EmailVerification).unwrap();
        assert_eq!(json, "\"email_verification\"");
        assert_eq!(TokenPurpose::PasswordReset.as_str(), "password_reset");
    }
}
