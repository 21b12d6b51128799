/// Project membership endpoints
///
/// # Endpoints
///
/// - `POST /v1/projects/:id/members` - Invite by email (any member)
/// - `DELETE /v1/projects/:id/members/:user_id` - Remove a member (admin) or leave (self)
/// - `DELETE /v1/projects/:id/invitations/:email` - Withdraw an invitation (admin)
///
/// An invite resolves the email against registered users: a registered user
/// becomes a member immediately, anyone else gets a pending invitation and an
/// email with the join link.
///
/// All roster updates run under the project's row lock, and the permission
/// check is made against the locked roster.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::projects::ProjectDetail,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use collabtrack_shared::{
    auth::{
        authorization::{ensure_admin, ensure_can_remove, ensure_member},
        middleware::AuthContext,
    },
    live::ChangeEvent,
    mail::Mail,
    membership::{normalize_email, InviteOutcome, RosterError},
    models::{
        project::{Project, RosterChange},
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[serde(default)]
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
}

impl InviteRequest {
    /// Trimmed, lower-cased address, validated after normalization
    fn normalized_email(mut self) -> ApiResult<String> {
        self.email = normalize_email(&self.email);
        if self.email.is_empty() {
            return Err(RosterError::MissingEmail.into());
        }
        self.validate()?;
        Ok(self.email)
    }
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub outcome: InviteOutcome,
    pub project: ProjectDetail,
}

fn project_not_found() -> ApiError {
    ApiError::NotFound("Project not found".to_string())
}

/// Publishes a roster change to everyone who could see the project
fn publish_roster_change<T>(state: &AppState, change: &RosterChange<T>) {
    if change.changed {
        state.publish(ChangeEvent::ProjectChanged {
            project_id: change.project.id,
            audience: change.audience(),
        });
    }
}

/// Invite by email
///
/// ```text
/// POST /v1/projects/:id/members
///
/// { "email": "grace@example.com" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "outcome": { "kind": "invited", "value": "grace@example.com" },
///   "project": { ... }
/// }
/// ```
///
/// # Errors
///
/// - `422`: missing or malformed email
/// - `403`: caller is not a member
/// - `404`: no such project
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<InviteResponse>> {
    let email = req.normalized_email()?;

    let registered = User::find_by_email(&state.db, &email).await?.map(|u| u.id);

    let change = Project::modify_roster(&state.db, project_id, |roster| -> ApiResult<InviteOutcome> {
        ensure_member(roster, auth.user_id)?;
        Ok(roster.invite(&email, registered)?)
    })
    .await?
    .ok_or_else(project_not_found)?;

    tracing::info!(
        project_id = %project_id,
        invited_by = %auth.user_id,
        outcome = ?change.outcome,
        changed = change.changed,
        "Invite resolved"
    );

    publish_roster_change(&state, &change);

    if let InviteOutcome::Invited(email) = &change.outcome {
        if change.changed {
            let link = state.config.join_link(project_id);
            let mail = Mail::invitation(email, &change.project.name, &auth.email, &link);
            state.send_mail(mail).await;
        }
    }

    let RosterChange {
        project, outcome, ..
    } = change;

    Ok(Json(InviteResponse {
        outcome,
        project: ProjectDetail::load(&state.db, project).await?,
    }))
}

/// Remove a member
///
/// The admin may remove any other member; a member may remove themselves.
///
/// # Errors
///
/// - `400`: target is the admin
/// - `403`: caller is neither the admin nor the target
/// - `404`: no such project, or the target is not a member
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ProjectDetail>> {
    let change = Project::modify_roster(&state.db, project_id, |roster| -> ApiResult<()> {
        ensure_can_remove(roster, auth.user_id, user_id)?;
        if !roster.remove_member(user_id)? {
            return Err(ApiError::NotFound(
                "User is not a member of this project".to_string(),
            ));
        }
        Ok(())
    })
    .await?
    .ok_or_else(project_not_found)?;

    tracing::info!(project_id = %project_id, user_id = %user_id, removed_by = %auth.user_id, "Member removed");

    publish_roster_change(&state, &change);

    Ok(Json(ProjectDetail::load(&state.db, change.project).await?))
}

/// Withdraw a pending invitation
///
/// # Errors
///
/// - `403`: caller is not the admin
/// - `404`: no such project or invitation
pub async fn remove_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, email)): Path<(Uuid, String)>,
) -> ApiResult<Json<ProjectDetail>> {
    let change = Project::modify_roster(&state.db, project_id, |roster| -> ApiResult<()> {
        ensure_admin(roster, auth.user_id)?;
        if !roster.remove_invitation(&email) {
            return Err(ApiError::NotFound("Invitation not found".to_string()));
        }
        Ok(())
    })
    .await?
    .ok_or_else(project_not_found)?;

    tracing::info!(project_id = %project_id, "Invitation withdrawn");

    publish_roster_change(&state, &change);

    Ok(Json(ProjectDetail::load(&state.db, change.project).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(email: &str) -> InviteRequest {
        InviteRequest {
            email: email.to_string(),
        }
    }

    #[test]
    fn test_invite_email_is_normalized_before_validation() {
        let email = invite("  Grace.Hopper@Example.COM ").normalized_email().unwrap();
        assert_eq!(email, "grace.hopper@example.com");
    }

    #[test]
    fn test_invite_email_rejections() {
        let err = invite("   ").normalized_email().unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = invite(" not-an-address ").normalized_email().unwrap_err();
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "email");
                assert_eq!(details[0].message, "Please enter a valid email address.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
