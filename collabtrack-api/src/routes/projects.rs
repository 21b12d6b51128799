/// Project endpoints
///
/// # Endpoints
///
/// - `GET /v1/projects` - Projects the caller is a member of, newest first
/// - `POST /v1/projects` - Create a project; the caller becomes its admin
/// - `GET /v1/projects/live` - Live query of the project list (SSE)
/// - `GET /v1/projects/:id` - Project with member profiles
/// - `POST /v1/projects/:id/join` - Join by link

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::live::snapshot_stream,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Extension, Json,
};
use collabtrack_shared::{
    auth::{authorization::require_project_member, middleware::AuthContext},
    live::ChangeEvent,
    models::{
        project::{CreateProject, Project},
        user::{User, UserProfile},
    },
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::convert::Infallible;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Project name must be at most 100 characters"))]
    pub name: String,
}

/// Project with its members resolved to profiles
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,

    pub member_profiles: Vec<UserProfile>,
}

impl ProjectDetail {
    pub async fn load(pool: &PgPool, project: Project) -> ApiResult<Self> {
        let users = User::find_by_ids(pool, &project.members).await?;

        // Keep roster order
        let member_profiles = project
            .members
            .iter()
            .filter_map(|id| users.iter().find(|u| u.id == *id))
            .map(User::profile)
            .collect();

        Ok(Self {
            project,
            member_profiles,
        })
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = Project::list_for_member(&state.db, auth.user_id).await?;
    Ok(Json(projects))
}

/// Create a project
///
/// ```text
/// POST /v1/projects
///
/// { "name": "Launch" }
/// ```
///
/// # Errors
///
/// - `422`: blank name ("Please enter a project name.")
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", "Please enter a project name."));
    }
    req.validate()?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: name.to_string(),
            admin_id: auth.user_id,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, admin_id = %auth.user_id, "Project created");

    state.publish(ChangeEvent::ProjectChanged {
        project_id: project.id,
        audience: project.members.clone(),
    });

    Ok((StatusCode::CREATED, Json(project)))
}

/// Live project list
///
/// Sends a `projects` event with the full list on connect and whenever a
/// project the caller belongs to, or just stopped belonging to, changes.
pub async fn live_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let user_id = auth.user_id;
    let db = state.db.clone();

    let refreshes = state.live.refreshes(move |event| event.concerns_user(user_id));

    snapshot_stream("projects", refreshes, move || {
        let db = db.clone();
        async move {
            Project::list_for_member(&db, user_id)
                .await
                .map_err(ApiError::from)
        }
    })
}

/// Project detail
///
/// # Errors
///
/// - `404`: no such project
/// - `403`: caller is not a member
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    let project = require_project_member(&state.db, project_id, auth.user_id).await?;
    Ok(Json(ProjectDetail::load(&state.db, project).await?))
}

/// Join by link
///
/// Adds the caller to the members and drops their pending invitation in one
/// write. Joining again changes nothing and returns the same project.
pub async fn join_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    let change = Project::modify_roster::<_, ApiError, _>(&state.db, project_id, |roster| {
        Ok(roster.join(auth.user_id, &auth.email))
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    if change.changed {
        tracing::info!(project_id = %project_id, user_id = %auth.user_id, "User joined project");

        state.publish(ChangeEvent::ProjectChanged {
            project_id,
            audience: change.audience(),
        });
    }

    Ok(Json(ProjectDetail::load(&state.db, change.project).await?))
}
