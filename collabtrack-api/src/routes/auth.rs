/// Identity endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Sign up with email and password
/// - `POST /v1/auth/login` - Sign in with email and password
/// - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
/// - `POST /v1/auth/federated` - Sign in with an identity provider access token
/// - `POST /v1/auth/verify-email` - Consume an email verification token
/// - `POST /v1/auth/verify-email/resend` - Mail a new verification link
/// - `POST /v1/auth/password-reset` - Mail a password reset link
/// - `POST /v1/auth/password-reset/confirm` - Set a new password with a reset token
/// - `GET /v1/auth/session` - Reload the session (bearer)
/// - `PATCH /v1/auth/profile` - Update display name and avatar (bearer)
///
/// Endpoints that take an email address and mail a link answer 202 whether or
/// not an account exists.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use collabtrack_shared::{
    auth::{
        federated::fetch_userinfo,
        jwt::{self, Claims, TokenPair, TokenType},
        middleware::AuthContext,
        password,
    },
    mail::Mail,
    models::{
        auth_token::{AuthToken, TokenPurpose},
        user::{CreateUser, UpdateProfile, User, UserProfile},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const FILL_ALL_FIELDS: &str = "Please fill out all fields.";
const INVALID_CREDENTIALS: &str = "Invalid email or password";
const UNVERIFIED_SIGN_IN: &str = "Please verify your email address before signing in.";
const UNVERIFIED_FEDERATED: &str =
    "Your identity provider has not verified this email address. Sign in with your password instead.";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct FederatedRequest {
    /// Access token issued by the identity provider
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmResetRequest {
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// Empty string clears the name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Empty string clears the avatar
    #[validate(length(max = 512, message = "Avatar URL must be at most 512 characters"))]
    pub avatar_url: Option<String>,
}

/// Full session: profile plus access and refresh tokens
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Profile plus a fresh access token
#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AccessTokenResponse {
    fn for_user(user: &User, secret: &str) -> ApiResult<Self> {
        let claims = Claims::for_user(user, TokenType::Access);

        Ok(Self {
            user: user.profile(),
            access_token: jwt::create_token(&claims, secret)?,
            token_type: "Bearer".to_string(),
            expires_in: TokenType::Access.default_expiration().num_seconds(),
        })
    }
}

fn session_for(user: &User, secret: &str) -> ApiResult<SessionResponse> {
    Ok(SessionResponse {
        user: user.profile(),
        tokens: jwt::issue_token_pair(user, secret)?,
    })
}

/// One "Please fill out all fields." entry per blank field
fn require_fields(fields: &[(&str, &str)]) -> ApiResult<()> {
    let missing: Vec<ValidationErrorDetail> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| ValidationErrorDetail {
            field: field.to_string(),
            message: FILL_ALL_FIELDS.to_string(),
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationError(missing))
    }
}

/// Checks a new password and its confirmation
fn check_new_password(password: &str, confirm_password: &str) -> ApiResult<()> {
    if password != confirm_password {
        return Err(ApiError::field("confirm_password", "Passwords do not match."));
    }

    password::validate_password_strength(password)
        .map_err(|message| ApiError::field("password", message))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Issues a verification token and mails its link
async fn send_verification(state: &AppState, user: &User) -> ApiResult<()> {
    let (_, token) = AuthToken::issue(&state.db, user.id, TokenPurpose::EmailVerification).await?;
    let link = state.config.verification_link(&token);
    state.send_mail(Mail::verification(&user.email, &link)).await;
    Ok(())
}

/// Sign up
///
/// ```text
/// POST /v1/auth/register
///
/// {
///   "name": "Ada",
///   "email": "ada@example.com",
///   "password": "Kanban!Board9",
///   "confirm_password": "Kanban!Board9"
/// }
/// ```
///
/// Creates an unverified account, mails a verification link and returns a
/// session whose token carries `email_verified = false`.
///
/// # Errors
///
/// - `422`: missing fields, mismatched or weak password, bad email
/// - `409`: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    require_fields(&[
        ("name", req.name.as_str()),
        ("email", req.email.as_str()),
        ("password", req.password.as_str()),
        ("confirm_password", req.confirm_password.as_str()),
    ])?;
    req.validate()?;
    check_new_password(&req.password, &req.confirm_password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash: Some(password_hash),
            name: non_blank(req.name),
            avatar_url: None,
            email_verified: false,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    send_verification(&state, &user).await?;

    Ok((StatusCode::CREATED, Json(session_for(&user, state.jwt_secret())?)))
}

/// Sign in
///
/// # Errors
///
/// - `422`: missing email or password
/// - `401`: unknown email, wrong password or password-less account
/// - `403`: email not verified yet
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    require_fields(&[("email", req.email.as_str()), ("password", req.password.as_str())])?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    // Federated-only accounts have no password
    let Some(hash) = user.password_hash.as_deref() else {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !password::verify_password(&req.password, hash)? {
        tracing::debug!(user_id = %user.id, "Wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if !user.email_verified {
        return Err(ApiError::Forbidden(UNVERIFIED_SIGN_IN.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(session_for(&user, state.jwt_secret())?))
}

/// Exchanges a refresh token for a new access token
///
/// Claims are rebuilt from the stored user, so a user who verified their
/// email since the refresh token was issued gets `email_verified = true`.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AccessTokenResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(AccessTokenResponse::for_user(&user, state.jwt_secret())?))
}

/// Sign in through the identity provider
///
/// Finds or creates the account by email. The provider's verification flag is
/// copied to new accounts and upgrades existing unverified ones. An existing
/// account is only matched when the provider has verified the address.
///
/// # Errors
///
/// - `401`: the provider rejected the access token
/// - `403`: the email belongs to an existing account but the provider has not
///   verified it
pub async fn federated(
    State(state): State<AppState>,
    Json(req): Json<FederatedRequest>,
) -> ApiResult<Json<SessionResponse>> {
    if req.access_token.trim().is_empty() {
        return Err(ApiError::field("access_token", FILL_ALL_FIELDS));
    }

    let identity = fetch_userinfo(
        &state.http,
        &state.config.federated.userinfo_url,
        req.access_token.trim(),
    )
    .await?;

    let user = match User::find_by_email(&state.db, &identity.email).await? {
        Some(user) if !identity.email_verified => {
            tracing::warn!(
                user_id = %user.id,
                subject = %identity.subject,
                "Federated sign-in with an unverified email matching an existing account"
            );
            return Err(ApiError::Forbidden(UNVERIFIED_FEDERATED.to_string()));
        }
        Some(user) if !user.email_verified => {
            User::mark_email_verified(&state.db, user.id)
                .await?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
        }
        Some(user) => user,
        None => {
            let user = User::create(
                &state.db,
                CreateUser {
                    email: identity.email.clone(),
                    password_hash: None,
                    name: identity.name.clone(),
                    avatar_url: identity.avatar_url.clone(),
                    email_verified: identity.email_verified,
                },
            )
            .await?;

            tracing::info!(user_id = %user.id, subject = %identity.subject, "User created from federated sign-in");

            if !user.email_verified {
                send_verification(&state, &user).await?;
            }
            user
        }
    };

    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(session_for(&user, state.jwt_secret())?))
}

/// Consumes an email verification token
///
/// # Errors
///
/// - `400`: unknown, used or expired token
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<UserProfile>> {
    let invalid = || ApiError::BadRequest("This verification link is invalid or has expired.".to_string());

    if req.token.trim().is_empty() {
        return Err(invalid());
    }

    let user_id = AuthToken::consume(&state.db, &req.token, TokenPurpose::EmailVerification)
        .await?
        .ok_or_else(invalid)?;

    let user = User::mark_email_verified(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Email verified");

    Ok(Json(user.profile()))
}

/// Mails a new verification link to an unverified account
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<StatusCode> {
    require_fields(&[("email", req.email.as_str())])?;
    req.validate()?;

    match User::find_by_email(&state.db, &req.email).await? {
        Some(user) if !user.email_verified => send_verification(&state, &user).await?,
        _ => tracing::debug!("Verification resend for unknown or verified email ignored"),
    }

    Ok(StatusCode::ACCEPTED)
}

/// Mails a password reset link if the account exists
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<StatusCode> {
    require_fields(&[("email", req.email.as_str())])?;
    req.validate()?;

    if let Some(user) = User::find_by_email(&state.db, &req.email).await? {
        let (_, token) = AuthToken::issue(&state.db, user.id, TokenPurpose::PasswordReset).await?;
        let link = state.config.password_reset_link(&token);
        state.send_mail(Mail::password_reset(&user.email, &link)).await;

        tracing::info!(user_id = %user.id, "Password reset requested");
    }

    Ok(StatusCode::ACCEPTED)
}

/// Sets a new password with a reset token
///
/// The password is checked before the token is consumed, so a rejected
/// password leaves the link usable.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<ConfirmResetRequest>,
) -> ApiResult<StatusCode> {
    require_fields(&[
        ("token", req.token.as_str()),
        ("password", req.password.as_str()),
        ("confirm_password", req.confirm_password.as_str()),
    ])?;
    check_new_password(&req.password, &req.confirm_password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user_id = AuthToken::consume(&state.db, &req.token, TokenPurpose::PasswordReset)
        .await?
        .ok_or_else(|| ApiError::BadRequest("This reset link is invalid or has expired.".to_string()))?;

    User::set_password_hash(&state.db, user_id, &password_hash).await?;

    tracing::info!(user_id = %user_id, "Password reset");

    Ok(StatusCode::NO_CONTENT)
}

/// Reloads the session
///
/// Returns the current profile and an access token reflecting the stored
/// verification state; the verify-email page polls this.
pub async fn session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AccessTokenResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(AccessTokenResponse::for_user(&user, state.jwt_secret())?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    req.validate()?;

    let update = UpdateProfile {
        name: req.name.map(non_blank),
        avatar_url: req.avatar_url.map(non_blank),
    };

    let user = User::update_profile(&state.db, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.profile()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_fields_reports_each_blank_field() {
        let err = require_fields(&[("name", " "), ("email", "a@b.io"), ("password", "")])
            .unwrap_err();

        match err {
            ApiError::ValidationError(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "password"]);
                assert!(details.iter().all(|d| d.message == FILL_ALL_FIELDS));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(require_fields(&[("email", "a@b.io")]).is_ok());
    }

    #[test]
    fn test_check_new_password() {
        match check_new_password("Kanban!Board9", "Kanban!Board8") {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details[0].message, "Passwords do not match.");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(matches!(
            check_new_password("short", "short"),
            Err(ApiError::ValidationError(_))
        ));
        assert!(check_new_password("Kanban!Board9", "Kanban!Board9").is_ok());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  Ada ".to_string()), Some("Ada".to_string()));
        assert_eq!(non_blank("   ".to_string()), None);
    }
}
