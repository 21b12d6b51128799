/// Team endpoints
///
/// - `GET /v1/teams` - Teams the caller belongs to, with the caller's role
/// - `POST /v1/teams` - Create a team; the creator becomes its admin

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use collabtrack_shared::{
    auth::middleware::AuthContext,
    models::team::{CreateTeam, Team, TeamPrivacy, TeamWithRole},
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Team name must be at most 100 characters"))]
    pub name: String,

    #[serde(default)]
    pub privacy: TeamPrivacy,
}

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TeamWithRole>>> {
    let teams = Team::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(teams))
}

/// Create a team
///
/// ```text
/// POST /v1/teams
///
/// { "name": "Platform", "privacy": "private" }
/// ```
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::field("name", "Please enter a team name."));
    }
    req.validate()?;

    let team = Team::create(
        &state.db,
        CreateTeam {
            name: req.name,
            privacy: req.privacy,
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(team_id = %team.id, created_by = %auth.user_id, "Team created");

    Ok((StatusCode::CREATED, Json(team)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_defaults_to_public() {
        let req: CreateTeamRequest =
            serde_json::from_value(serde_json::json!({ "name": "Platform" })).unwrap();
        assert_eq!(req.privacy, TeamPrivacy::Public);

        let req: CreateTeamRequest = serde_json::from_value(serde_json::json!({
            "name": "Platform",
            "privacy": "private"
        }))
        .unwrap();
        assert_eq!(req.privacy, TeamPrivacy::Private);
    }
}
