/// Kanban board and task endpoints
///
/// # Endpoints
///
/// - `GET /v1/projects/:id/board?q=` - Board snapshot, optionally filtered
/// - `GET /v1/projects/:id/board/live?q=` - Live board (SSE)
/// - `POST /v1/projects/:id/tasks` - Create a task at the end of its column
/// - `PATCH /v1/projects/:id/tasks/:task_id` - Edit a task
/// - `DELETE /v1/projects/:id/tasks/:task_id` - Delete a task
/// - `POST /v1/projects/:id/tasks/:task_id/move` - Drag-and-drop move
///
/// Every endpoint requires project membership. Concurrent edits to one task are
/// last-write-wins.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::live::snapshot_stream,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use collabtrack_shared::{
    auth::{authorization::require_project_member, middleware::AuthContext},
    board::{Board, DragEvent},
    live::ChangeEvent,
    models::{
        project::Project,
        task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
        user::{User, UserProfile},
    },
};
use futures::Stream;
use serde::{Deserialize, Deserializer};
use sqlx::PgPool;
use std::{collections::HashMap, convert::Infallible};
use uuid::Uuid;
use validator::Validate;

const TITLE_REQUIRED: &str = "Please enter a task title.";

#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    /// Search over title, description and assignee emails
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[serde(default)]
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    pub priority: Option<TaskPriority>,

    #[serde(default)]
    pub assignees: Vec<Uuid>,

    pub due_date: Option<DateTime<Utc>>,
}

/// Absent fields are left alone; `null` clears `priority` and `due_date`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,

    #[serde(default, deserialize_with = "present")]
    pub priority: Option<Option<TaskPriority>>,

    pub assignees: Option<Vec<Uuid>>,

    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Marks a field that was present in the body, even as `null`
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Deduplicates assignees and checks they are project members
fn checked_assignees(project: &Project, assignees: Vec<Uuid>) -> ApiResult<Vec<Uuid>> {
    let mut unique = Vec::with_capacity(assignees.len());
    for id in assignees {
        if !project.is_member(id) {
            return Err(ApiError::field(
                "assignees",
                "Tasks can only be assigned to project members.",
            ));
        }
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    Ok(unique)
}

fn checked_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::field("title", TITLE_REQUIRED));
    }
    Ok(title.to_string())
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

/// Loads a board snapshot for a member
///
/// Membership is checked on every load, so a live board stops for a member
/// who was removed.
pub async fn load_board(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    query: &str,
) -> ApiResult<Board> {
    require_project_member(pool, project_id, user_id).await?;

    let tasks = Task::list_for_project(pool, project_id).await?;

    let mut assignee_ids: Vec<Uuid> = tasks.iter().flat_map(|t| t.assignees.iter().copied()).collect();
    assignee_ids.sort_unstable();
    assignee_ids.dedup();

    let users: HashMap<Uuid, UserProfile> = User::find_by_ids(pool, &assignee_ids)
        .await?
        .iter()
        .map(|user| (user.id, user.profile()))
        .collect();

    Ok(Board::build(tasks, &users, query))
}

pub async fn get_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<BoardQuery>,
) -> ApiResult<Json<Board>> {
    let board = load_board(&state.db, project_id, auth.user_id, &query.q).await?;
    Ok(Json(board))
}

/// Live board
///
/// Checks membership before opening the stream, then sends a `board` event
/// on connect and after every change to the project or its tasks.
pub async fn live_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<BoardQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>> {
    require_project_member(&state.db, project_id, auth.user_id).await?;

    let user_id = auth.user_id;
    let db = state.db.clone();
    let search = query.q;

    let refreshes = state
        .live
        .refreshes(move |event| event.concerns_project(project_id));

    Ok(snapshot_stream("board", refreshes, move || {
        let db = db.clone();
        let search = search.clone();
        async move { load_board(&db, project_id, user_id, &search).await }
    }))
}

/// Create a task
///
/// ```text
/// POST /v1/projects/:id/tasks
///
/// {
///   "title": "Write release notes",
///   "description": "",
///   "status": "todo",
///   "priority": "high",
///   "assignees": ["uuid"],
///   "due_date": "2025-02-01T00:00:00Z"
/// }
/// ```
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let title = checked_title(&req.title)?;
    req.validate()?;

    let project = require_project_member(&state.db, project_id, auth.user_id).await?;
    let assignees = checked_assignees(&project, req.assignees)?;

    let task = Task::create(
        &state.db,
        CreateTask {
            project_id,
            title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            assignees,
            created_by: Some(auth.user_id),
            due_date: req.due_date,
        },
    )
    .await?;

    tracing::info!(project_id = %project_id, task_id = %task.id, status = task.status.as_str(), "Task created");

    state.publish(ChangeEvent::TasksChanged { project_id });

    Ok((StatusCode::CREATED, Json(task)))
}

/// Edit a task
///
/// Changing `status` here appends the task to the end of its new column.
///
/// # Errors
///
/// - `400`: empty edit
/// - `422`: blank title or non-member assignee
/// - `404`: task not in the project
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;

    let project = require_project_member(&state.db, project_id, auth.user_id).await?;

    let update = UpdateTask {
        title: req.title.as_deref().map(checked_title).transpose()?,
        description: req.description,
        status: req.status,
        priority: req.priority,
        assignees: req
            .assignees
            .map(|ids| checked_assignees(&project, ids))
            .transpose()?,
        due_date: req.due_date,
    };

    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let task = Task::update(&state.db, project_id, task_id, update)
        .await?
        .ok_or_else(task_not_found)?;

    state.publish(ChangeEvent::TasksChanged { project_id });

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_project_member(&state.db, project_id, auth.user_id).await?;

    if !Task::delete(&state.db, project_id, task_id).await? {
        return Err(task_not_found());
    }

    tracing::info!(project_id = %project_id, task_id = %task_id, "Task deleted");

    state.publish(ChangeEvent::TasksChanged { project_id });

    Ok(StatusCode::NO_CONTENT)
}

/// Drag-and-drop move
///
/// ```text
/// POST /v1/projects/:id/tasks/:task_id/move
///
/// { "source": "todo", "destination": "in-progress", "index": 0 }
/// ```
///
/// Only `status`, `rank` and `updated_at` change. Whether the card stays in
/// its column is decided from the stored status, so a stale `source` cannot
/// misplace it.
pub async fn move_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(drag): Json<DragEvent>,
) -> ApiResult<Json<Task>> {
    require_project_member(&state.db, project_id, auth.user_id).await?;

    let outcome = Task::move_to(&state.db, project_id, task_id, drag.destination, drag.index)
        .await?
        .ok_or_else(task_not_found)?;

    if outcome.changed {
        tracing::debug!(
            task_id = %task_id,
            source = drag.source.as_str(),
            destination = drag.destination.as_str(),
            index = drag.index,
            crosses_columns = drag.crosses_columns(),
            "Task moved"
        );
        state.publish(ChangeEvent::TasksChanged { project_id });
    }

    Ok(Json(outcome.task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateTaskRequest = serde_json::from_value(serde_json::json!({
            "priority": null,
            "title": "Renamed"
        }))
        .unwrap();

        assert_eq!(req.priority, Some(None));
        assert_eq!(req.due_date, None);
        assert_eq!(req.title.as_deref(), Some("Renamed"));

        let req: UpdateTaskRequest = serde_json::from_value(serde_json::json!({
            "priority": "high",
            "due_date": "2025-02-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(req.priority, Some(Some(TaskPriority::High)));
        assert!(matches!(req.due_date, Some(Some(_))));
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateTaskRequest =
            serde_json::from_value(serde_json::json!({ "title": "Ship" })).unwrap();

        assert_eq!(req.status, TaskStatus::Todo);
        assert!(req.description.is_empty());
        assert!(req.assignees.is_empty());
        assert!(req.priority.is_none());
    }

    #[test]
    fn test_checked_title() {
        assert_eq!(checked_title("  Ship it ").unwrap(), "Ship it");
        assert!(matches!(checked_title("   "), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn test_checked_assignees() {
        let admin = Uuid::new_v4();
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: "Launch".to_string(),
            admin_id: admin,
            members: vec![admin],
            invitations: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        assert_eq!(checked_assignees(&project, vec![admin, admin]).unwrap(), vec![admin]);
        assert!(checked_assignees(&project, vec![Uuid::new_v4()]).is_err());
    }
}
