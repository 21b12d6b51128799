/// Federated sign-in
///
/// The client completes the provider's OAuth flow on its own and hands us the
/// provider access token. We exchange it for the provider's userinfo document
/// and trust the email address (and its verification flag) found there.
///
/// Google's OpenID userinfo endpoint is the default; any endpoint returning the
/// same standard claims (`sub`, `email`, `email_verified`, `name`, `picture`)
/// works.
///
/// # Example
///
/// ```no_run
/// use collabtrack_shared::auth::federated::{fetch_userinfo, GOOGLE_USERINFO_URL};
///
/// # async fn example(access_token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let client = reqwest::Client::new();
/// let identity = fetch_userinfo(&client, GOOGLE_USERINFO_URL, access_token).await?;
/// println!("{} (verified: {})", identity.email, identity.email_verified);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};

use crate::membership::normalize_email;

pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, thiserror::Error)]
pub enum FederatedError {
    /// The provider refused the access token
    #[error("Identity provider rejected the access token")]
    Rejected,

    /// The userinfo document has no usable email
    #[error("Identity provider did not return an email address")]
    MissingEmail,

    #[error("Identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Standard OpenID Connect userinfo claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub picture: Option<String>,
}

/// Identity the provider vouches for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl TryFrom<UserInfo> for FederatedIdentity {
    type Error = FederatedError;

    fn try_from(info: UserInfo) -> Result<Self, Self::Error> {
        let email = info
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or(FederatedError::MissingEmail)?;

        Ok(Self {
            subject: info.sub,
            email,
            email_verified: info.email_verified,
            name: info.name.filter(|n| !n.trim().is_empty()),
            avatar_url: info.picture,
        })
    }
}

/// Exchanges a provider access token for the caller's identity
pub async fn fetch_userinfo(
    client: &reqwest::Client,
    userinfo_url: &str,
    access_token: &str,
) -> Result<FederatedIdentity, FederatedError> {
    let response = client
        .get(userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        tracing::debug!(status = %status, "Userinfo request rejected");
        return Err(FederatedError::Rejected);
    }

    let info: UserInfo = response.error_for_status()?.json().await?;
    FederatedIdentity::try_from(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_userinfo() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": " Ada@Example.com ",
            "email_verified": true,
            "name": "Ada Lovelace",
            "picture": "https://example.com/ada.png"
        }))
        .unwrap();

        let identity = FederatedIdentity::try_from(info).unwrap();
        assert_eq!(identity.email, "ada@example.com");
        assert!(identity.email_verified);
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(identity.avatar_url.as_deref(), Some("https://example.com/ada.png"));
    }

    #[test]
    fn test_missing_fields_default() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": "grace@example.com"
        }))
        .unwrap();

        let identity = FederatedIdentity::try_from(info).unwrap();
        assert!(!identity.email_verified);
        assert!(identity.name.is_none());
    }

    #[test]
    fn test_missing_email_rejected() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({ "sub": "1234" })).unwrap();
        assert!(matches!(
            FederatedIdentity::try_from(info),
            Err(FederatedError::MissingEmail)
        ));
    }
}
